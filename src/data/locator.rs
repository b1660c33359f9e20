use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use url::Url;

// ---------------------------------------------------------------------------
// FileLocator – where a FITS file lives
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLocator {
    Local(PathBuf),
    Remote(Url),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid URL '{0}': {1}")]
    InvalidUrl(String, url::ParseError),
    #[error("'{0}' is not a local file URL")]
    NotAFilePath(String),
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("downloading {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("I/O error while fetching {0}: {1}")]
    Io(String, #[source] io::Error),
}

impl FileLocator {
    /// Interpret a user supplied location.
    ///
    /// `http://` and `https://` become [`FileLocator::Remote`], `file://` URLs
    /// are percent-decoded into a local path, anything else is a plain path.
    pub fn parse(location: &str) -> Result<Self, FetchError> {
        let location = location.trim();
        let lower = location.to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(location)
                .map_err(|e| FetchError::InvalidUrl(location.to_string(), e))?;
            return Ok(FileLocator::Remote(url));
        }
        if lower.starts_with("file://") {
            let url = Url::parse(location)
                .map_err(|e| FetchError::InvalidUrl(location.to_string(), e))?;
            let path = url
                .to_file_path()
                .map_err(|_| FetchError::NotAFilePath(location.to_string()))?;
            return Ok(FileLocator::Local(path));
        }
        Ok(FileLocator::Local(PathBuf::from(location)))
    }

    /// Make the file available on the local filesystem.
    ///
    /// Remote files are streamed into a temporary file that lives as long as
    /// the returned [`FetchedFile`].
    pub fn fetch(&self) -> Result<FetchedFile, FetchError> {
        match self {
            FileLocator::Local(path) => {
                if !path.is_file() {
                    return Err(FetchError::NotFound(path.clone()));
                }
                Ok(FetchedFile {
                    path: path.clone(),
                    download: None,
                })
            }
            FileLocator::Remote(url) => download(url),
        }
    }

    /// Last path segment, used for naming saved products.
    pub fn file_name(&self) -> Option<String> {
        match self {
            FileLocator::Local(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
            FileLocator::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

impl fmt::Display for FileLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileLocator::Local(path) => write!(f, "{}", path.display()),
            FileLocator::Remote(url) => write!(f, "{url}"),
        }
    }
}

// ---------------------------------------------------------------------------
// FetchedFile – scoped local copy
// ---------------------------------------------------------------------------

/// A file ready to be opened. Downloads are deleted when this is dropped.
#[derive(Debug)]
pub struct FetchedFile {
    path: PathBuf,
    download: Option<NamedTempFile>,
}

impl FetchedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_download(&self) -> bool {
        self.download.is_some()
    }
}

fn download(url: &Url) -> Result<FetchedFile, FetchError> {
    let io_err = |e: io::Error| FetchError::Io(url.to_string(), e);

    log::info!("Downloading {url}");
    let response = ureq::get(url.as_str())
        .call()
        .map_err(|e| FetchError::Http {
            url: url.to_string(),
            source: Box::new(e),
        })?;

    let mut temp = tempfile::Builder::new()
        .prefix("tess-quicklook-")
        .suffix(".fits")
        .tempfile()
        .map_err(io_err)?;

    let mut reader = response.into_body().into_reader();
    let bytes = io::copy(&mut reader, temp.as_file_mut()).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    log::info!("Downloaded {bytes} bytes to {}", temp.path().display());

    Ok(FetchedFile {
        path: temp.path().to_path_buf(),
        download: Some(temp),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path_is_local() {
        assert_eq!(
            FileLocator::parse("data/cutout.fits").unwrap(),
            FileLocator::Local(PathBuf::from("data/cutout.fits"))
        );
    }

    #[test]
    fn test_https_is_remote() {
        let url = "https://archive.stsci.edu/missions/tess/ffi/s0001/2018/206/4-2/\
                   tess2018206192942-s0001-4-2-0120-s_ffic.fits";
        let locator = FileLocator::parse(url).unwrap();
        assert!(matches!(locator, FileLocator::Remote(_)));
        assert_eq!(
            locator.file_name().as_deref(),
            Some("tess2018206192942-s0001-4-2-0120-s_ffic.fits")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_url_is_percent_decoded() {
        let locator =
            FileLocator::parse("file:///data/Fits%20files/tess-s0002-1-2_10x15_astrocut.fits")
                .unwrap();
        assert_eq!(
            locator,
            FileLocator::Local(PathBuf::from("/data/Fits files/tess-s0002-1-2_10x15_astrocut.fits"))
        );
    }

    #[test]
    fn test_missing_local_file_is_an_error() {
        let locator = FileLocator::parse("does/not/exist.fits").unwrap();
        assert!(matches!(locator.fetch(), Err(FetchError::NotFound(_))));
    }

    /// Answer one GET on 127.0.0.1 with `body` and return the file URL.
    fn serve_once(body: &'static [u8]) -> (Url, std::thread::JoinHandle<()>) {
        use std::io::{BufRead, BufReader, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }
            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/fits\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            )
            .unwrap();
            stream.write_all(body).unwrap();
            stream.flush().unwrap();
        });
        let url = Url::parse(&format!("http://127.0.0.1:{port}/cutouts/tess-s0001-4-2_cutout.fits")).unwrap();
        (url, server)
    }

    #[test]
    fn test_remote_fetch_downloads_to_scoped_temp_file() {
        const PAYLOAD: &[u8] = b"SIMPLE  =                    T / conforms to FITS standard";
        let (url, server) = serve_once(PAYLOAD);

        let locator = FileLocator::parse(url.as_str()).unwrap();
        assert!(matches!(locator, FileLocator::Remote(_)));
        let fetched = locator.fetch().unwrap();
        server.join().unwrap();

        assert!(fetched.is_download());
        let temp_path = fetched.path().to_path_buf();
        assert_eq!(std::fs::read(&temp_path).unwrap(), PAYLOAD);

        drop(fetched);
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_local_fetch_uses_file_in_place() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"SIMPLE  =                    T").unwrap();

        let locator = FileLocator::Local(file.path().to_path_buf());
        let fetched = locator.fetch().unwrap();
        assert!(!fetched.is_download());
        assert_eq!(fetched.path(), file.path());

        let head = std::fs::read_to_string(fetched.path()).unwrap();
        assert!(head.starts_with("SIMPLE"));
    }
}
