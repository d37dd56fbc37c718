use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::constants::APP_DIR_NAME;

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
    #[error("model file not found: {0}")]
    NotFound(PathBuf),
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Resolves a model file, downloading it into the user cache on first use.
///
/// Resolution order:
/// 1. Explicit path (must exist)
/// 2. User cache directory (platform-specific)
/// 3. Download from URL to cache
pub fn resolve(
    name: &str,
    url: &str,
    explicit: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = explicit {
        return existing(path);
    }
    resolve_in(&model_cache_dir()?, name, url, progress)
}

/// Same as [`resolve`] without the explicit override, against `cache_dir`.
pub fn resolve_in(
    cache_dir: &Path,
    name: &str,
    url: &str,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(name);
    if cached_path.exists() {
        return Ok(cached_path);
    }
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading model {name}");
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

fn existing(path: &Path) -> Result<PathBuf, ModelResolveError> {
    if path.exists() {
        Ok(path.to_path_buf())
    } else {
        Err(ModelResolveError::NotFound(path.to_path_buf()))
    }
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/AttendCam/models/`
/// - Linux: `$XDG_CACHE_HOME/AttendCam/models/` or `~/.cache/AttendCam/models/`
/// - Windows: `%LOCALAPPDATA%/AttendCam/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
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
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let write_err = |path: &Path, e: std::io::Error| ModelResolveError::Write {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = fs::File::create(temp_path).map_err(|e| write_err(temp_path, e))?;

    // Stream in 1MB chunks; embedding models are 100MB+.
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response
            .read(&mut buf)
            .map_err(|e| write_err(temp_path, e))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .map_err(|e| write_err(temp_path, e))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(|e| write_err(temp_path, e))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| write_err(dest, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_in_returns_cached_file_without_download() {
        let tmp = TempDir::new().unwrap();
        let model_path = tmp.path().join("face.onnx");
        fs::write(&model_path, b"cached").unwrap();

        let resolved = resolve_in(
            tmp.path(),
            "face.onnx",
            "http://invalid.nonexistent.example.com/face.onnx",
            None,
        )
        .unwrap();
        assert_eq!(resolved, model_path);
    }

    #[test]
    fn test_explicit_path_wins() {
        let tmp = TempDir::new().unwrap();
        let explicit = tmp.path().join("custom.onnx");
        fs::write(&explicit, b"custom").unwrap();

        let resolved = resolve("face.onnx", "http://unused", Some(&explicit), None).unwrap();
        assert_eq!(resolved, explicit);
    }

    #[test]
    fn test_missing_explicit_path_is_not_found() {
        let result = resolve(
            "hand.onnx",
            "http://unused.invalid/hand.onnx",
            Some(Path::new("/nonexistent/hand.onnx")),
            None,
        );
        assert!(matches!(result, Err(ModelResolveError::NotFound(_))));
    }

    #[test]
    fn test_model_cache_dir_is_app_specific() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains(APP_DIR_NAME));
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_failed_download_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let result = resolve_in(
            tmp.path(),
            "model.onnx",
            "http://invalid.nonexistent.example.com/model",
            None,
        );
        assert!(result.is_err());
        assert!(!tmp.path().join("model.onnx").exists());
        assert!(!tmp.path().join("model.part").exists());
    }
}
