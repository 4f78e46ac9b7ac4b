//! Model downloading and caching adapter.

use anyhow::{Context, Result};
use pose_lambda_core::inference::ModelSet;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Placeholder checksum indicating verification should be skipped.
const PLACEHOLDER_CHECKSUM: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

const DOWNLOAD_CHUNK: usize = 64 * 1024;

/// Model metadata.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name/identifier.
    pub name: &'static str,
    /// Expected SHA256 hash. All zeros skips verification.
    pub sha256: &'static str,
    /// Filename in models directory.
    pub filename: &'static str,
}

/// Known models.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "pose_landmark_lite",
        sha256: PLACEHOLDER_CHECKSUM,
        filename: "pose_landmark_lite.onnx",
    },
    ModelInfo {
        name: "pose_landmark_full",
        sha256: PLACEHOLDER_CHECKSUM,
        filename: "pose_landmark_full.onnx",
    },
    ModelInfo {
        name: "pose_landmark_heavy",
        sha256: PLACEHOLDER_CHECKSUM,
        filename: "pose_landmark_heavy.onnx",
    },
    ModelInfo {
        name: "face_landmark",
        sha256: PLACEHOLDER_CHECKSUM,
        filename: "face_landmark.onnx",
    },
];

/// Download progress callback: model name, bytes so far, total if known.
pub type ProgressCallback = Box<dyn Fn(&str, u64, Option<u64>) + Send + Sync>;

/// Returns the default models directory path.
///
/// Uses `XDG_DATA_HOME/pose-lambda/models` or `~/.local/share/pose-lambda/models`.
#[must_use]
pub fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pose-lambda")
        .join("models")
}

/// Returns the path to a specific model file in `dir`.
#[must_use]
pub fn model_path(dir: &Path, name: &str) -> Option<PathBuf> {
    MODELS
        .iter()
        .find(|m| m.name == name)
        .map(|m| dir.join(m.filename))
}

/// Returns the model files the estimator loads from `dir`.
#[must_use]
pub fn model_set(dir: &Path) -> ModelSet {
    let path = |name: &str| {
        model_path(dir, name).unwrap_or_else(|| dir.join(format!("{name}.onnx")))
    };

    ModelSet {
        pose_lite: path("pose_landmark_lite"),
        pose_full: path("pose_landmark_full"),
        pose_heavy: path("pose_landmark_heavy"),
        face: Some(path("face_landmark")),
    }
}

/// Checks if all models are installed.
#[must_use]
pub fn all_models_installed(dir: &Path) -> bool {
    MODELS.iter().all(|m| dir.join(m.filename).exists())
}

/// Lists models with their install status.
#[must_use]
pub fn list_models(dir: &Path) -> Vec<(String, bool)> {
    MODELS
        .iter()
        .map(|m| (m.name.to_string(), dir.join(m.filename).exists()))
        .collect()
}

/// Ensures all models are present in `dir`, downloading missing ones from
/// `{base_url}/{filename}`.
///
/// # Errors
///
/// Returns an error if:
/// - The models directory cannot be created
/// - A model download fails
/// - A model's checksum doesn't match
pub fn ensure_models(
    dir: &Path,
    base_url: &str,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    fs::create_dir_all(dir).context("Failed to create models directory")?;

    for model in MODELS {
        let path = dir.join(model.filename);
        if path.exists() {
            debug!("Model {} already exists", model.name);
        } else {
            let url = model_url(base_url, model);
            download_model(model, &url, &path, progress)?;
        }
    }

    Ok(())
}

fn model_url(base_url: &str, model: &ModelInfo) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), model.filename)
}

/// Downloads a model, writing to a temporary file that is renamed into
/// place once the checksum matches.
fn download_model(
    model: &ModelInfo,
    url: &str,
    path: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    info!("Downloading model: {} from {url}", model.name);

    let response = reqwest::blocking::get(url)
        .with_context(|| format!("Failed to download {}", model.name))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status: {}", response.status());
    }

    let total = response.content_length();
    let downloaded = install_stream(model, response, total, path, progress)?;

    info!("Downloaded {} ({downloaded} bytes)", model.name);
    Ok(())
}

/// Streams `reader` into `path` via a `.part` file. The partial file is
/// removed on any failure.
fn install_stream(
    model: &ModelInfo,
    reader: impl Read,
    total: Option<u64>,
    path: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<u64> {
    let partial = path.with_extension("onnx.part");

    let result = write_verified(model, reader, total, &partial, progress).and_then(|downloaded| {
        fs::rename(&partial, path).with_context(|| format!("Failed to install {}", model.name))?;
        Ok(downloaded)
    });

    if result.is_err() {
        if let Err(e) = fs::remove_file(&partial) {
            debug!("Could not remove {}: {e}", partial.display());
        }
    }

    result
}

/// Writes the stream to `partial`, hashing as it goes, and checks the
/// digest. Returns the number of bytes written.
fn write_verified(
    model: &ModelInfo,
    mut reader: impl Read,
    total: Option<u64>,
    partial: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<u64> {
    let mut file = fs::File::create(partial)
        .with_context(|| format!("Failed to create {}", partial.display()))?;

    let mut hasher = Sha256::new();
    let mut downloaded = 0u64;
    let mut buf = vec![0u8; DOWNLOAD_CHUNK];
    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read response for {}", model.name))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n])
            .with_context(|| format!("Failed to write {}", model.name))?;
        downloaded += n as u64;
        if let Some(cb) = progress {
            cb(model.name, downloaded, total);
        }
    }
    file.flush()
        .with_context(|| format!("Failed to write {}", model.name))?;

    // Verify checksum (skip if placeholder)
    if model.sha256 == PLACEHOLDER_CHECKSUM {
        debug!(
            "Skipping checksum verification for {} (placeholder checksum)",
            model.name
        );
    } else {
        let hash = format!("{:x}", hasher.finalize());
        if hash != model.sha256 {
            anyhow::bail!(
                "Checksum mismatch for {}: expected {}, got {}",
                model.name,
                model.sha256,
                hash
            );
        }
    }

    Ok(downloaded)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_dir() {
        let dir = default_models_dir();
        assert!(dir.ends_with("pose-lambda/models"));
    }

    #[test]
    fn test_model_path() {
        let path = model_path(Path::new("/models"), "pose_landmark_heavy").unwrap();
        assert_eq!(path, PathBuf::from("/models/pose_landmark_heavy.onnx"));
    }

    #[test]
    fn test_model_path_unknown() {
        assert!(model_path(Path::new("/models"), "unknown").is_none());
    }

    #[test]
    fn test_model_set_covers_every_tier() {
        let set = model_set(Path::new("/models"));
        assert!(set.pose_lite.ends_with("pose_landmark_lite.onnx"));
        assert!(set.pose_full.ends_with("pose_landmark_full.onnx"));
        assert!(set.pose_heavy.ends_with("pose_landmark_heavy.onnx"));
        assert_eq!(set.face, Some(PathBuf::from("/models/face_landmark.onnx")));
    }

    #[test]
    fn test_model_url() {
        let url = model_url("https://example.com/models/v1/", &MODELS[0]);
        assert_eq!(url, "https://example.com/models/v1/pose_landmark_lite.onnx");
    }

    #[test]
    fn test_list_and_installed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!all_models_installed(dir.path()));
        assert!(list_models(dir.path()).iter().all(|(_, installed)| !installed));

        for model in MODELS {
            fs::write(dir.path().join(model.filename), b"onnx").unwrap();
        }

        assert!(all_models_installed(dir.path()));
        assert_eq!(list_models(dir.path()).len(), MODELS.len());
    }

    #[test]
    fn test_ensure_models_skips_installed() {
        let dir = tempfile::tempdir().unwrap();
        for model in MODELS {
            fs::write(dir.path().join(model.filename), b"onnx").unwrap();
        }

        // Nothing to download, so the URL is never contacted.
        ensure_models(dir.path(), "http://127.0.0.1:9", None).unwrap();
    }

    const PAYLOAD: &[u8] = b"onnx model bytes";

    fn test_model(sha256: &'static str) -> ModelInfo {
        ModelInfo {
            name: "test_model",
            sha256,
            filename: "test_model.onnx",
        }
    }

    /// Yields a chunk, then fails like a dropped connection.
    struct DroppedConnection {
        sent: bool,
    }

    impl Read for DroppedConnection {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.sent {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                ));
            }
            self.sent = true;
            buf[..PAYLOAD.len()].copy_from_slice(PAYLOAD);
            Ok(PAYLOAD.len())
        }
    }

    #[test]
    fn test_install_stream_verifies_and_renames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_model.onnx");
        let model = test_model("b03219da40078956cd0e8efa4399a6f9e7fb8cc1f8e71536dd0236e245ebd9d6");

        let seen = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
        let sink = std::sync::Arc::clone(&seen);
        let progress: ProgressCallback = Box::new(move |_: &str, done: u64, _: Option<u64>| {
            sink.store(done, std::sync::atomic::Ordering::SeqCst);
        });

        let written = install_stream(&model, PAYLOAD, Some(16), &path, Some(&progress)).unwrap();

        assert_eq!(written, PAYLOAD.len() as u64);
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), written);
        assert_eq!(fs::read(&path).unwrap(), PAYLOAD);
        assert!(!path.with_extension("onnx.part").exists());
    }

    #[test]
    fn test_install_stream_removes_partial_on_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_model.onnx");

        let err = install_stream(
            &test_model(PLACEHOLDER_CHECKSUM),
            DroppedConnection { sent: false },
            None,
            &path,
            None,
        )
        .unwrap_err();

        assert!(format!("{err:#}").contains("Failed to read response"));
        assert!(!path.with_extension("onnx.part").exists());
        assert!(!path.exists());
    }

    #[test]
    fn test_install_stream_removes_partial_on_checksum_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_model.onnx");
        let model = test_model("1111111111111111111111111111111111111111111111111111111111111111");

        let err = install_stream(&model, PAYLOAD, None, &path, None).unwrap_err();

        assert!(err.to_string().contains("Checksum mismatch"));
        assert!(!path.with_extension("onnx.part").exists());
        assert!(!path.exists());
    }

    #[test]
    fn test_install_stream_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("test_model.onnx");

        let result = install_stream(&test_model(PLACEHOLDER_CHECKSUM), PAYLOAD, None, &path, None);

        assert!(result.is_err());
        assert!(!path.with_extension("onnx.part").exists());
    }
}
