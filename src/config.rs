use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

pub const CONFIG_FILE_NAME: &str = "hamforge.toml";

const DEFAULT_INSTALL_ROOT: &str = "/opt";

const DEFAULT_JOBS: usize = 4;

const DEFAULT_PACKAGE_RELEASE: &str = "1";

const DEFAULT_CONFIGURE_FLAGS: &[&str] = &["CFLAGS=-O2 -g", "CXXFLAGS=-O2 -g"];

const DEFAULT_DEPENDENCIES: &[&str] = &[
    "build-essential",
    "pkg-config",
    "libfltk1.3-dev",
    "libx11-dev",
    "libxft-dev",
    "libxinerama-dev",
    "libxcursor-dev",
    "libjpeg-dev",
    "libpng-dev",
    "libsndfile1-dev",
    "libsamplerate0-dev",
    "portaudio19-dev",
    "libpulse-dev",
    "libusb-1.0-0-dev",
    "libudev-dev",
];

// (program, download base, file listing)
const DEFAULT_PROGRAMS: &[(&str, &str, &str)] = &[
    (
        "fldigi",
        "https://www.w1hkj.org/files/fldigi/",
        "https://sourceforge.net/projects/fldigi/files/fldigi/",
    ),
    (
        "flrig",
        "https://www.w1hkj.org/files/flrig/",
        "https://sourceforge.net/projects/fldigi/files/flrig/",
    ),
    (
        "flmsg",
        "https://www.w1hkj.org/files/flmsg/",
        "https://sourceforge.net/projects/fldigi/files/flmsg/",
    ),
    (
        "flamp",
        "https://www.w1hkj.org/files/flamp/",
        "https://sourceforge.net/projects/fldigi/files/flamp/",
    ),
];

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("'programs' is empty")]
    NoPrograms,

    #[error("invalid program name: {0:?}")]
    InvalidProgram(String),

    #[error("'programs.{program}' has invalid url {url:?}")]
    InvalidUrl { program: String, url: String },

    #[error("program not found: {0}")]
    UnknownProgram(String),

    #[error("'jobs' must be at least 1")]
    InvalidJobs,
}

/// Where a program's releases are listed and downloaded from.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ProgramSource {
    pub base_url: String,

    #[serde(default)]
    pub index_url: Option<String>,
}

impl ProgramSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            index_url: None,
        }
    }

    pub fn with_index(base_url: &str, index_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            index_url: Some(index_url.to_string()),
        }
    }

    /// The listing scanned for versions; the download base unless overridden.
    pub fn index_url(&self) -> &str {
        self.index_url.as_deref().unwrap_or(&self.base_url)
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    /// Leave the built tree in place.
    None,
    /// Run `make install`.
    System,
    /// Wrap `make install` in checkinstall, falling back to `System`.
    #[default]
    Package,
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallMode::None => f.write_str("none"),
            InstallMode::System => f.write_str("system"),
            InstallMode::Package => f.write_str("package"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub workdir: PathBuf,
    pub install_root: PathBuf,
    pub build: bool,
    pub install_dependencies: bool,
    pub clean: bool,
    pub jobs: usize,
    pub install: InstallMode,
    pub package_release: String,
    pub use_sudo: bool,
    pub configure_flags: Vec<String>,
    pub dependencies: Vec<String>,
    pub programs: IndexMap<String, ProgramSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            install_root: PathBuf::from(DEFAULT_INSTALL_ROOT),
            build: true,
            install_dependencies: true,
            clean: true,
            jobs: DEFAULT_JOBS,
            install: InstallMode::default(),
            package_release: DEFAULT_PACKAGE_RELEASE.to_string(),
            use_sudo: true,
            configure_flags: to_strings(DEFAULT_CONFIGURE_FLAGS),
            dependencies: to_strings(DEFAULT_DEPENDENCIES),
            programs: DEFAULT_PROGRAMS
                .iter()
                .map(|(name, base_url, index_url)| {
                    (name.to_string(), ProgramSource::with_index(base_url, index_url))
                })
                .collect(),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn get_home_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hamforge").join(CONFIG_FILE_NAME))
}

impl Config {
    /// Parses a TOML document; missing keys keep their defaults.
    ///
    /// A `[programs]` table replaces the built-in registry instead of
    /// extending it, and programs run in the order they are declared.
    pub fn from_toml(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;

        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_toml(path, &content)
    }

    /// Loads `path` when given, else the per-user config if present, else defaults.
    pub async fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path).await;
        }

        match get_home_config_path() {
            Some(home) if home.exists() => Self::load(&home).await,
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs == 0 {
            return Err(ConfigError::InvalidJobs);
        }

        if self.programs.is_empty() {
            return Err(ConfigError::NoPrograms);
        }

        for (name, source) in &self.programs {
            if name.is_empty() || name.contains('/') || name.contains(char::is_whitespace) {
                return Err(ConfigError::InvalidProgram(name.clone()));
            }

            for url in [source.base_url.as_str(), source.index_url()] {
                let valid = Url::parse(url)
                    .map(|u| u.scheme() == "http" || u.scheme() == "https")
                    .unwrap_or(false);

                if !valid {
                    return Err(ConfigError::InvalidUrl {
                        program: name.clone(),
                        url: url.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Restricts the registry to `names`; an empty list keeps every program.
    pub fn select(mut self, names: &[String]) -> Result<Self, ConfigError> {
        if names.is_empty() {
            return Ok(self);
        }

        if let Some(unknown) = names.iter().find(|n| !self.programs.contains_key(*n)) {
            return Err(ConfigError::UnknownProgram(unknown.clone()));
        }

        self.programs.retain(|name, _| names.contains(name));

        Ok(self)
    }

    pub fn program(&self, name: &str) -> Result<&ProgramSource, ConfigError> {
        self.programs
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProgram(name.to_string()))
    }

    pub fn install_prefix(&self, program: &str) -> PathBuf {
        self.install_root.join(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.jobs, 4);
        assert_eq!(config.install, InstallMode::Package);
        assert_eq!(
            config.programs.keys().collect::<Vec<_>>(),
            vec!["fldigi", "flrig", "flmsg", "flamp"]
        );
        assert_eq!(
            config.programs["flrig"].index_url(),
            "https://sourceforge.net/projects/fldigi/files/flrig/"
        );
    }

    #[test]
    fn test_index_url_defaults_to_base_url() {
        let source = ProgramSource::new("https://example/flrig/");

        assert_eq!(source.index_url(), "https://example/flrig/");
    }

    #[test]
    fn test_install_prefix() {
        let config = Config::default();

        assert_eq!(config.install_prefix("flrig"), PathBuf::from("/opt/flrig"));
    }

    #[test]
    fn test_from_toml_partial() {
        let content = r#"
workdir = "/tmp/ham"
jobs = 8
install = "system"

[programs.flrig]
base_url = "https://example/flrig/"
"#;

        let config = Config::from_toml(Path::new("hamforge.toml"), content).unwrap();

        assert_eq!(config.workdir, PathBuf::from("/tmp/ham"));
        assert_eq!(config.jobs, 8);
        assert_eq!(config.install, InstallMode::System);
        assert!(config.build);
        assert_eq!(config.dependencies, Config::default().dependencies);
        assert_eq!(config.programs.len(), 1);
        assert_eq!(
            config.programs["flrig"],
            ProgramSource::new("https://example/flrig/")
        );
    }

    #[test]
    fn test_from_toml_keeps_declaration_order() {
        let content = r#"
[programs.flrig]
base_url = "https://example/flrig/"

[programs.fldigi]
base_url = "https://example/fldigi/"

[programs.flamp]
base_url = "https://example/flamp/"
"#;

        let config = Config::from_toml(Path::new("hamforge.toml"), content).unwrap();

        assert_eq!(
            config.programs.keys().collect::<Vec<_>>(),
            vec!["flrig", "fldigi", "flamp"]
        );
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let result = Config::from_toml(Path::new("hamforge.toml"), "parallelism = 3\n");

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_from_toml_rejects_bad_url() {
        let content = r#"
[programs.flrig]
base_url = "ftp://example/flrig/"
"#;

        let result = Config::from_toml(Path::new("hamforge.toml"), content);

        assert!(matches!(
            result,
            Err(ConfigError::InvalidUrl { program, .. }) if program == "flrig"
        ));
    }

    #[test]
    fn test_from_toml_rejects_zero_jobs() {
        let result = Config::from_toml(Path::new("hamforge.toml"), "jobs = 0\n");

        assert!(matches!(result, Err(ConfigError::InvalidJobs)));
    }

    #[test]
    fn test_select() {
        let config = Config::default()
            .select(&["flrig".to_string(), "fldigi".to_string()])
            .unwrap();

        assert_eq!(
            config.programs.keys().collect::<Vec<_>>(),
            vec!["fldigi", "flrig"]
        );

        let result = Config::default().select(&["wsjtx".to_string()]);

        assert!(matches!(result, Err(ConfigError::UnknownProgram(p)) if p == "wsjtx"));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/hamforge.toml")).await;

        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_load_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        tokio::fs::write(&path, "build = false\nuse_sudo = false\n")
            .await
            .unwrap();

        let config = Config::load(&path).await.unwrap();

        assert!(!config.build);
        assert!(!config.use_sudo);
        assert_eq!(config.programs, Config::default().programs);
    }
}
