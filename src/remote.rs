use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_stream::StreamExt;
use tracing::info;
use url::Url;

use crate::version::{Version, ARCHIVE_SUFFIX};

const DEFAULT_CHUNKS_SIZE: usize = 8192;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),

    #[error("invalid url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("scheme not supported: {0}")]
    UnsupportedScheme(String),

    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: StatusCode },

    #[error("request to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// HTTP capability used by the pipeline.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Returns the body of a successful GET as text.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// Streams the body of a successful GET into `path`, returning the byte count.
    async fn download(&self, url: &str, path: &Path) -> Result<u64, FetchError>;
}

#[derive(Clone, Debug)]
pub struct HttpRemote {
    client: Client,
}

impl HttpRemote {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("hamforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let http_path = parse_http_url(url)?;

        let response = self
            .client
            .get(http_path)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        info!("GET {}: {}", url, response.status());

        // any other status, 2xx included, carries no usable body
        if response.status() != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Remote for HttpRemote {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })
    }

    async fn download(&self, url: &str, path: &Path) -> Result<u64, FetchError> {
        let response = self.get(url).await?;

        let io_err = |source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).await.map_err(io_err)?;
        let mut writer = BufWriter::with_capacity(DEFAULT_CHUNKS_SIZE, file);
        let mut stream = response.bytes_stream();
        let mut size = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

            writer.write_all(&chunk).await.map_err(io_err)?;

            size += chunk.len() as u64;
        }

        writer.flush().await.map_err(io_err)?;

        Ok(size)
    }
}

fn parse_http_url(url: &str) -> Result<Url, FetchError> {
    let http_path = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    if http_path.scheme() != "http" && http_path.scheme() != "https" {
        return Err(FetchError::UnsupportedScheme(http_path.scheme().to_string()));
    }

    Ok(http_path)
}

/// A release archive written to disk by [`download_archive`].
#[derive(Clone, Debug, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub program: String,
    pub version: Version,
}

pub fn get_archive_name(program: &str, version: &Version) -> String {
    format!("{}-{}{}", program, version, ARCHIVE_SUFFIX)
}

pub fn get_download_url(base_url: &str, file_name: &str) -> String {
    if base_url.ends_with('/') {
        format!("{}{}", base_url, file_name)
    } else {
        format!("{}/{}", base_url, file_name)
    }
}

pub async fn download_archive<R: Remote + ?Sized>(
    remote: &R,
    base_url: &str,
    program: &str,
    version: &Version,
    workdir: &Path,
) -> Result<Artifact, FetchError> {
    let file_name = get_archive_name(program, version);
    let download_url = get_download_url(base_url, &file_name);
    let path = workdir.join(&file_name);

    info!("downloading: {}", download_url);

    let size = remote.download(&download_url, &path).await?;

    info!("downloaded: {} ({} bytes)", path.display(), size);

    Ok(Artifact {
        path,
        program: program.to_string(),
        version: version.clone(),
    })
}
