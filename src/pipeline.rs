use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::archives::{unpack_gzip, ArchiveError};
use crate::config::{Config, InstallMode, ProgramSource};
use crate::remote::{download_archive, FetchError, HttpRemote, Remote};
use crate::toolchain::{
    Apt, Autotools, Checkinstall, CommandError, PackageManager, Packager, Toolchain,
};
use crate::version::{find_latest, Version, VersionError};

#[derive(thiserror::Error, Debug)]
pub enum StepError {
    #[error("{program}: {source}")]
    Version {
        program: String,
        source: VersionError,
    },

    #[error("{program}: download failed: {source}")]
    Download { program: String, source: FetchError },

    #[error("{program}: extraction failed: {source}")]
    Extract {
        program: String,
        source: ArchiveError,
    },

    #[error("{program}: source directory missing after extraction: {path}")]
    SourceMissing { program: String, path: PathBuf },

    #[error("dependency install failed: {source}")]
    Dependencies { source: CommandError },

    #[error("{program}: configure failed: {source}")]
    Configure {
        program: String,
        source: CommandError,
    },

    #[error("{program}: build failed: {source}")]
    Build {
        program: String,
        source: CommandError,
    },

    #[error("{program}: install failed: {source}")]
    Install {
        program: String,
        source: CommandError,
    },
}

impl StepError {
    /// Fatal failures stop the whole run; everything else skips one program.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StepError::Dependencies { .. } | StepError::Configure { .. } | StepError::Build { .. }
        )
    }
}

/// What one program's pass through the pipeline produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Build {
    pub version: Version,
    pub archive: PathBuf,
    pub source_dir: PathBuf,
    pub built: bool,
    pub installed: bool,
    pub package: Option<PathBuf>,
}

#[derive(Debug)]
pub struct Outcome {
    pub program: String,
    pub result: Result<Build, StepError>,
}

#[derive(Debug, Default)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
}

impl Report {
    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

pub struct Pipeline {
    remote: Box<dyn Remote>,
    package_manager: Box<dyn PackageManager>,
    toolchain: Box<dyn Toolchain>,
    packager: Box<dyn Packager>,
}

impl Pipeline {
    pub fn new(
        remote: Box<dyn Remote>,
        package_manager: Box<dyn PackageManager>,
        toolchain: Box<dyn Toolchain>,
        packager: Box<dyn Packager>,
    ) -> Self {
        Self {
            remote,
            package_manager,
            toolchain,
            packager,
        }
    }

    /// A pipeline backed by HTTP, apt-get, autotools and checkinstall.
    pub fn system(config: &Config) -> Result<Self, FetchError> {
        Ok(Self::new(
            Box::new(HttpRemote::new()?),
            Box::new(Apt::new(config.use_sudo)),
            Box::new(Autotools::new(config.use_sudo)),
            Box::new(Checkinstall::new(config.use_sudo, &config.package_release)),
        ))
    }

    /// Processes every program in order, stopping only on a fatal failure.
    pub async fn run(&self, config: &Config) -> Result<Report, StepError> {
        let mut report = Report::default();

        for (program, source) in &config.programs {
            info!("{}: starting", program);

            match self.run_program(config, program, source).await {
                Ok(build) => {
                    info!("{}: finished {}", program, build.version);

                    report.outcomes.push(Outcome {
                        program: program.clone(),
                        result: Ok(build),
                    });
                }

                Err(err) if err.is_fatal() => {
                    error!("{}", err);
                    return Err(err);
                }

                Err(err) => {
                    error!("{}", err);

                    report.outcomes.push(Outcome {
                        program: program.clone(),
                        result: Err(err),
                    });
                }
            }
        }

        Ok(report)
    }

    pub async fn run_program(
        &self,
        config: &Config,
        program: &str,
        source: &ProgramSource,
    ) -> Result<Build, StepError> {
        let version = self.resolve(program, source).await?;
        let (archive, source_dir) = self.fetch(config, program, source, &version).await?;

        let mut build = Build {
            version,
            archive,
            source_dir,
            built: false,
            installed: false,
            package: None,
        };

        if !config.build {
            info!(
                "{}: build disabled, leaving {}",
                program,
                build.source_dir.display()
            );
            return Ok(build);
        }

        if config.install_dependencies {
            self.package_manager
                .install(&config.dependencies)
                .await
                .map_err(|source| StepError::Dependencies { source })?;
        }

        self.compile(config, program, &build.source_dir).await?;

        build.built = true;

        match config.install {
            InstallMode::None => {}

            InstallMode::System => {
                self.install(program, &build.source_dir).await?;
                build.installed = true;
            }

            InstallMode::Package => {
                build.package = self.package(program, &build.source_dir, &build.version).await?;
                build.installed = true;
            }
        }

        Ok(build)
    }

    pub async fn resolve(
        &self,
        program: &str,
        source: &ProgramSource,
    ) -> Result<Version, StepError> {
        find_latest(self.remote.as_ref(), source.index_url(), program)
            .await
            .map_err(|source| StepError::Version {
                program: program.to_string(),
                source,
            })
    }

    /// Downloads and unpacks `version`, returning the archive and source tree paths.
    pub async fn fetch(
        &self,
        config: &Config,
        program: &str,
        source: &ProgramSource,
        version: &Version,
    ) -> Result<(PathBuf, PathBuf), StepError> {
        let artifact = download_archive(
            self.remote.as_ref(),
            &source.base_url,
            program,
            version,
            &config.workdir,
        )
        .await
        .map_err(|source| StepError::Download {
            program: program.to_string(),
            source,
        })?;

        unpack_gzip(&config.workdir, &artifact.path)
            .await
            .map_err(|source| StepError::Extract {
                program: program.to_string(),
                source,
            })?;

        let source_dir = config.workdir.join(format!("{}-{}", program, version));

        if !source_dir.is_dir() {
            return Err(StepError::SourceMissing {
                program: program.to_string(),
                path: source_dir,
            });
        }

        Ok((artifact.path, source_dir))
    }

    async fn compile(
        &self,
        config: &Config,
        program: &str,
        source_dir: &Path,
    ) -> Result<(), StepError> {
        let prefix = config.install_prefix(program);

        self.toolchain
            .configure(source_dir, &prefix, &config.configure_flags)
            .await
            .map_err(|source| StepError::Configure {
                program: program.to_string(),
                source,
            })?;

        if config.clean {
            if let Err(err) = self.toolchain.clean(source_dir).await {
                warn!("{}: clean skipped: {}", program, err);
            }
        }

        self.toolchain
            .build(source_dir, config.jobs)
            .await
            .map_err(|source| StepError::Build {
                program: program.to_string(),
                source,
            })
    }

    async fn install(&self, program: &str, source_dir: &Path) -> Result<(), StepError> {
        self.toolchain
            .install(source_dir)
            .await
            .map_err(|source| StepError::Install {
                program: program.to_string(),
                source,
            })
    }

    async fn package(
        &self,
        program: &str,
        source_dir: &Path,
        version: &Version,
    ) -> Result<Option<PathBuf>, StepError> {
        match self.packager.package_install(source_dir, program, version).await {
            Ok(package) => Ok(package),

            Err(err) => {
                warn!("{}: packaging failed, installing directly: {}", program, err);
                self.install(program, source_dir).await?;
                Ok(None)
            }
        }
    }
}
