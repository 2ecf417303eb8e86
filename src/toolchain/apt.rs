use async_trait::async_trait;
use tracing::info;

use super::{command, run, CommandError, PackageManager};

/// Debian/Ubuntu package manager.
#[derive(Clone, Debug)]
pub struct Apt {
    pub elevated: bool,
}

impl Apt {
    pub fn new(elevated: bool) -> Self {
        Self { elevated }
    }
}

#[async_trait]
impl PackageManager for Apt {
    async fn install(&self, packages: &[String]) -> Result<(), CommandError> {
        if packages.is_empty() {
            return Ok(());
        }

        info!("installing dependencies: {}", packages.join(" "));

        let mut apt = command("apt-get", self.elevated);

        apt.args(["install", "-y", "--no-install-recommends"]);
        apt.args(packages);

        run(apt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_install_nothing() {
        assert!(Apt::new(false).install(&[]).await.is_ok());
    }
}
