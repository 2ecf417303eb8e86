use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::{wrappers::SplitStream, StreamExt};
use tracing::{debug, info, warn};

use crate::version::Version;

pub mod apt;
pub mod autotools;
pub mod checkinstall;

pub use apt::Apt;
pub use autotools::Autotools;
pub use checkinstall::Checkinstall;

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("'{0}' not found on PATH")]
    NotFound(String),

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("failed to read output of '{command}': {source}")]
    Output {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}")]
    Status { command: String, status: ExitStatus },
}

/// Installs native build prerequisites.
#[async_trait]
pub trait PackageManager: Send + Sync {
    async fn install(&self, packages: &[String]) -> Result<(), CommandError>;
}

/// Configures, compiles and installs an extracted source tree.
#[async_trait]
pub trait Toolchain: Send + Sync {
    async fn configure(
        &self,
        source_dir: &Path,
        prefix: &Path,
        flags: &[String],
    ) -> Result<(), CommandError>;

    async fn clean(&self, source_dir: &Path) -> Result<(), CommandError>;

    async fn build(&self, source_dir: &Path, jobs: usize) -> Result<(), CommandError>;

    async fn install(&self, source_dir: &Path) -> Result<(), CommandError>;
}

/// Installs a built tree while producing a distributable package.
#[async_trait]
pub trait Packager: Send + Sync {
    /// Returns the package file, or `None` when the tool produced nothing.
    async fn package_install(
        &self,
        source_dir: &Path,
        program: &str,
        version: &Version,
    ) -> Result<Option<PathBuf>, CommandError>;
}

/// Builds a command, prefixed with `sudo` when `elevated` and not already root.
pub fn command(program: &str, elevated: bool) -> Command {
    if elevated && !nix::unistd::geteuid().is_root() {
        let mut command = Command::new("sudo");
        command.arg(program);
        return command;
    }

    Command::new(program)
}

fn describe(command: &Command) -> String {
    let command = command.as_std();

    let mut parts = vec![command.get_program().to_string_lossy().to_string()];

    for arg in command.get_args() {
        parts.push(arg.to_string_lossy().to_string());
    }

    parts.join(" ")
}

/// Runs `command` to completion, forwarding its merged output to the log.
///
/// Output is decoded lossily. The exit status alone decides success; the
/// child is always waited on, even when reading its output fails.
pub async fn run(mut command: Command) -> Result<(), CommandError> {
    let description = describe(&command);

    info!("running: {}", description);

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| CommandError::Spawn {
            command: description.clone(),
            source,
        })?;

    if let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) {
        let stdout = SplitStream::new(BufReader::new(stdout).split(b'\n'));
        let stderr = SplitStream::new(BufReader::new(stderr).split(b'\n'));

        let mut stdio_merged = StreamExt::merge(stdout, stderr);

        while let Some(line) = stdio_merged.next().await {
            match line {
                Ok(line) => debug!("{}", String::from_utf8_lossy(&line).trim_end()),

                // dropping the pipes lets the child run on to exit
                Err(err) => {
                    warn!("stopped reading output of '{}': {}", description, err);
                    break;
                }
            }
        }
    }

    let status = child.wait().await.map_err(|source| CommandError::Output {
        command: description.clone(),
        source,
    })?;

    if !status.success() {
        return Err(CommandError::Status {
            command: description,
            status,
        });
    }

    Ok(())
}
