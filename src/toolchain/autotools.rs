use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use super::{command, run, CommandError, Toolchain};

/// `./configure && make` driver for the W1HKJ source trees.
#[derive(Clone, Debug)]
pub struct Autotools {
    pub elevated: bool,
}

impl Autotools {
    pub fn new(elevated: bool) -> Self {
        Self { elevated }
    }
}

fn make(source_dir: &Path, elevated: bool) -> Command {
    let mut make = command("make", elevated);
    make.current_dir(source_dir);
    make
}

#[async_trait]
impl Toolchain for Autotools {
    async fn configure(
        &self,
        source_dir: &Path,
        prefix: &Path,
        flags: &[String],
    ) -> Result<(), CommandError> {
        // the script path must not depend on the child's working directory
        let source_dir = tokio::fs::canonicalize(source_dir)
            .await
            .map_err(|source| CommandError::Spawn {
                command: source_dir.join("configure").display().to_string(),
                source,
            })?;

        let mut configure = Command::new(source_dir.join("configure"));

        configure.current_dir(&source_dir);
        configure.arg(format!("--prefix={}", prefix.display()));
        configure.args(flags);

        run(configure).await
    }

    async fn clean(&self, source_dir: &Path) -> Result<(), CommandError> {
        let mut clean = make(source_dir, false);
        clean.arg("clean");
        run(clean).await
    }

    async fn build(&self, source_dir: &Path, jobs: usize) -> Result<(), CommandError> {
        let mut build = make(source_dir, false);
        build.arg(format!("-j{}", jobs));
        run(build).await
    }

    async fn install(&self, source_dir: &Path) -> Result<(), CommandError> {
        let mut install = make(source_dir, self.elevated);
        install.arg("install");
        run(install).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;
    use tokio::fs::{read_to_string, set_permissions, write};

    const CONFIGURE: &str = "#!/bin/sh\necho \"$@\" > configure.args\n";

    const MAKEFILE: &str = "all:\n\techo built > built.txt\n\nclean:\n\trm -f built.txt\n";

    async fn source_tree() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let configure = temp_dir.path().join("configure");

        write(&configure, CONFIGURE).await.unwrap();
        set_permissions(&configure, Permissions::from_mode(0o755))
            .await
            .unwrap();
        write(temp_dir.path().join("Makefile"), MAKEFILE)
            .await
            .unwrap();

        temp_dir
    }

    #[tokio::test]
    async fn test_configure_passes_prefix_and_flags() {
        let source = source_tree().await;
        let flags = vec!["CFLAGS=-O2".to_string(), "--enable-static".to_string()];

        Autotools::new(false)
            .configure(source.path(), Path::new("/opt/flrig"), &flags)
            .await
            .unwrap();

        let args = read_to_string(source.path().join("configure.args"))
            .await
            .unwrap();

        assert_eq!(args.trim(), "--prefix=/opt/flrig CFLAGS=-O2 --enable-static");
    }

    #[tokio::test]
    async fn test_configure_relative_source_dir() {
        let source = TempDir::new_in(".").unwrap();
        let configure = source.path().join("configure");

        write(&configure, CONFIGURE).await.unwrap();
        set_permissions(&configure, Permissions::from_mode(0o755))
            .await
            .unwrap();

        let relative = Path::new(".").join(source.path().file_name().unwrap());

        Autotools::new(false)
            .configure(&relative, Path::new("/opt/flrig"), &[])
            .await
            .unwrap();

        let args = read_to_string(source.path().join("configure.args"))
            .await
            .unwrap();

        assert_eq!(args.trim(), "--prefix=/opt/flrig");
    }

    #[tokio::test]
    async fn test_configure_missing_source_dir() {
        let result = Autotools::new(false)
            .configure(
                Path::new("./hamforge-missing-1.0"),
                Path::new("/opt/flrig"),
                &[],
            )
            .await;

        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_configure_missing_script() {
        let temp_dir = TempDir::new().unwrap();

        let result = Autotools::new(false)
            .configure(temp_dir.path(), Path::new("/opt/flrig"), &[])
            .await;

        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_build_and_clean() {
        if which::which("make").is_err() {
            return;
        }

        let source = source_tree().await;
        let toolchain = Autotools::new(false);

        toolchain.build(source.path(), 2).await.unwrap();

        assert!(source.path().join("built.txt").is_file());

        toolchain.clean(source.path()).await.unwrap();

        assert!(!source.path().join("built.txt").exists());
    }

    #[tokio::test]
    async fn test_clean_without_makefile_fails() {
        if which::which("make").is_err() {
            return;
        }

        let temp_dir = TempDir::new().unwrap();

        assert!(matches!(
            Autotools::new(false).clean(temp_dir.path()).await,
            Err(CommandError::Status { .. })
        ));
    }
}
