use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model file {0} does not exist")]
    MissingFile(PathBuf),
    #[error("model {0} is not cached and no download URL is configured")]
    NotFound(String),
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where a model file may come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    /// File name under the cache / bundled directories.
    pub name: String,
    /// `http(s)://` URL to download from, or a local file path.
    pub location: Option<String>,
}

impl ModelSource {
    pub fn new(name: &str, location: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            location: location.map(str::to_string),
        }
    }

    fn remote_url(&self) -> Option<&str> {
        self.location
            .as_deref()
            .filter(|l| l.starts_with("http://") || l.starts_with("https://"))
    }

    /// Custom URLs are cached under their own file name so they never shadow
    /// the default model of the same kind.
    fn cache_name(&self) -> String {
        self.remote_url()
            .and_then(|url| url.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
            .map_or_else(|| self.name.clone(), str::to_string)
    }
}

/// Resolve a model file, checking local locations before downloading.
///
/// Resolution order:
/// 1. Local file path given as the location
/// 2. User cache directory (platform-specific)
/// 3. Bundled path (for development / pre-packaged installs)
/// 4. Download from the location URL to cache
pub fn resolve(
    source: &ModelSource,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cache_dir = model_cache_dir()?;
    resolve_in(&cache_dir, source, bundled_dir, progress)
}

fn resolve_in(
    cache_dir: &Path,
    source: &ModelSource,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(location) = source.location.as_deref() {
        if source.remote_url().is_none() {
            let path = PathBuf::from(location);
            return if path.is_file() {
                Ok(path)
            } else {
                Err(ModelResolveError::MissingFile(path))
            };
        }
    }

    let cache_name = source.cache_name();
    let cached_path = cache_dir.join(&cache_name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    if let Some(dir) = bundled_dir {
        let bundled_path = dir.join(&cache_name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    let url = source
        .remote_url()
        .ok_or_else(|| ModelResolveError::NotFound(source.name.clone()))?;
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {cache_name} from {url}");
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceShape/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceShape/models/` or `~/.cache/FaceShape/models/`
/// - Windows: `%LOCALAPPDATA%/FaceShape/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("FaceShape").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("FaceShape").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| ModelResolveError::Write { path, source }
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut file = fs::File::create(temp_path).map_err(write_err(temp_path))?;

    // Landmark models are small, but stream anyway so progress is meaningful
    // on slow links.
    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err(temp_path))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err(temp_path))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err(temp_path))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(write_err(dest))?;
    Ok(())
}
