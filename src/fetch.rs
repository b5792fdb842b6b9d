//! Image byte sources.
//!
//! Rendering never reaches for storage directly: callers hand the report
//! builder an [`ImageFetcher`] that resolves a location to bytes.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default upper bound for a single HTTP image download.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while resolving an image location.
#[derive(Debug)]
pub enum FetchError {
    /// Reading a local file failed.
    Io { path: PathBuf, source: io::Error },
    /// The HTTP request failed or returned an error status.
    Http(reqwest::Error),
    /// No fetcher handles the location's scheme.
    UnsupportedScheme(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "Failed to read {}: {}", path.display(), source),
            Self::Http(err) => write!(f, "HTTP fetch failed: {err}"),
            Self::UnsupportedScheme(location) => {
                write!(f, "No fetcher configured for location {location}")
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Http(err) => Some(err),
            Self::UnsupportedScheme(_) => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

/// Resolves an image location to its raw bytes.
pub trait ImageFetcher {
    /// Returns the bytes stored at `location`.
    fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError>;
}

impl<F> ImageFetcher for F
where
    F: Fn(&str) -> Result<Vec<u8>, FetchError>,
{
    fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        self(location)
    }
}

fn is_http(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Reads images from the local filesystem.
///
/// Accepts plain paths and `file://` URIs; relative paths are resolved against
/// the configured root.
#[derive(Clone, Debug, Default)]
pub struct FileFetcher {
    root: Option<PathBuf>,
}

impl FileFetcher {
    /// Creates a fetcher resolving relative paths against the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves relative locations against `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location.strip_prefix("file://").unwrap_or(location));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ImageFetcher for FileFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        if is_http(location) {
            return Err(FetchError::UnsupportedScheme(location.to_owned()));
        }
        let path = self.resolve(location);
        fs::read(&path).map_err(|source| FetchError::Io { path, source })
    }
}

/// Downloads images with a blocking HTTP client and a bounded timeout.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        if !is_http(location) {
            return Err(FetchError::UnsupportedScheme(location.to_owned()));
        }
        let response = self.client.get(location).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

/// Routes `http(s)://` locations to an [`HttpFetcher`] and everything else to
/// a [`FileFetcher`].
#[derive(Clone, Debug)]
pub struct SourceFetcher {
    files: FileFetcher,
    http: Option<HttpFetcher>,
}

impl SourceFetcher {
    /// Creates a router; without an HTTP fetcher remote locations are rejected.
    pub fn new(files: FileFetcher, http: Option<HttpFetcher>) -> Self {
        Self { files, http }
    }
}

impl ImageFetcher for SourceFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        match &self.http {
            Some(http) if is_http(location) => http.fetch(location),
            _ => self.files.fetch(location),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_fetcher_resolves_relative_paths_and_file_uris() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("photo.bin"), b"abc").unwrap();

        let fetcher = FileFetcher::new().with_root(dir.path());
        assert_eq!(fetcher.fetch("photo.bin").unwrap(), b"abc");

        let uri = format!("file://{}", dir.path().join("photo.bin").display());
        assert_eq!(FileFetcher::new().fetch(&uri).unwrap(), b"abc");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = FileFetcher::new().fetch("/__qc_missing__/x.jpg").unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
        assert!(err.to_string().contains("/__qc_missing__/x.jpg"));
    }

    #[test]
    fn router_without_http_rejects_remote_locations() {
        let fetcher = SourceFetcher::new(FileFetcher::new(), None);
        let err = fetcher.fetch("https://example.com/a.jpg").unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedScheme(_)));
    }

    #[test]
    fn closures_act_as_fetchers() {
        let fetcher = |location: &str| Ok::<_, FetchError>(location.as_bytes().to_vec());
        assert_eq!(ImageFetcher::fetch(&fetcher, "xy").unwrap(), b"xy");
    }
}
