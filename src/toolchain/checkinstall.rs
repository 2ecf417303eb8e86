use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

use super::{command, run, CommandError, Packager};
use crate::version::Version;

const CHECKINSTALL: &str = "checkinstall";

/// Wraps `make install` in checkinstall to also emit a `.deb`.
#[derive(Clone, Debug)]
pub struct Checkinstall {
    pub elevated: bool,
    pub release: String,
}

impl Checkinstall {
    pub fn new(elevated: bool, release: &str) -> Self {
        Self {
            elevated,
            release: release.to_string(),
        }
    }
}

/// Looks in `source_dir` for `<program>_<version>-<release>*.deb`.
pub fn find_package(
    source_dir: &Path,
    program: &str,
    version: &Version,
    release: &str,
) -> Option<PathBuf> {
    let prefix = format!("{}_{}-{}", program, version, release);

    WalkDir::new(source_dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.starts_with(&prefix) && name.ends_with(".deb")
        })
        .map(|entry| entry.into_path())
}

#[async_trait]
impl Packager for Checkinstall {
    async fn package_install(
        &self,
        source_dir: &Path,
        program: &str,
        version: &Version,
    ) -> Result<Option<PathBuf>, CommandError> {
        if which::which(CHECKINSTALL).is_err() {
            return Err(CommandError::NotFound(CHECKINSTALL.to_string()));
        }

        let mut checkinstall = command(CHECKINSTALL, self.elevated);

        checkinstall.current_dir(source_dir);
        checkinstall.args([
            "-y".to_string(),
            format!("--pkgname={}", program),
            format!("--pkgversion={}", version),
            format!("--pkgrelease={}", self.release),
            "--nodoc".to_string(),
            "make".to_string(),
            "install".to_string(),
        ]);

        run(checkinstall).await?;

        let package = find_package(source_dir, program, version, &self.release);

        match &package {
            Some(path) => info!("package created: {}", path.display()),
            None => info!("no package found for {}-{}", program, version),
        }

        Ok(package)
    }
}
