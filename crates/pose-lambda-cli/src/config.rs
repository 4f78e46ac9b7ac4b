//! Configuration file support for pose-lambda.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/pose-lambda/config.toml` (lowest priority)
//! - Project-local: `.pose-lambda.toml` (searched up directory tree)
//! - Environment: `S3_BUCKET_NAME`, `POSE_LAMBDA_MODELS_DIR`,
//!   `POSE_LAMBDA_MODELS_URL`
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use pose_lambda_adapters::default_models_dir;
use pose_lambda_core::{EstimatorOptions, HandlerConfig, ModelComplexity};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Environment variable naming the default bucket.
pub const BUCKET_ENV: &str = "S3_BUCKET_NAME";
/// Environment variable overriding the models directory.
pub const MODELS_DIR_ENV: &str = "POSE_LAMBDA_MODELS_DIR";
/// Environment variable giving the model download base URL.
pub const MODELS_URL_ENV: &str = "POSE_LAMBDA_MODELS_URL";

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Object storage settings.
    pub storage: StorageConfig,
    /// Pose estimator settings.
    pub estimator: EstimatorConfig,
    /// Model settings.
    pub models: ModelsConfig,
}

/// Object storage configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bucket used when a request names none.
    pub default_bucket: Option<String>,
    /// Store used by `invoke`: "s3" or "fs".
    pub backend: Option<String>,
    /// Root directory for the "fs" store.
    pub root: Option<PathBuf>,
}

/// Pose estimator configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Model tier (0, 1 or 2).
    pub model_complexity: Option<u8>,
    /// Produce a segmentation mask.
    pub enable_segmentation: Option<bool>,
    /// Minimum pose/face score (0.0-1.0).
    pub min_detection_confidence: Option<f32>,
    /// Treat each image independently.
    pub static_image_mode: Option<bool>,
    /// Intra-op threads per inference session (0 = runtime default).
    pub threads: Option<usize>,
}

/// Model configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Custom models directory path.
    pub dir: Option<PathBuf>,
    /// Base URL model files are downloaded from.
    pub base_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files, then the
    /// environment.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/pose-lambda/config.toml`
    /// 2. Project-local: `.pose-lambda.toml` (searched up from cwd)
    /// 3. Environment variables
    ///
    /// Missing files are silently ignored. Invalid values are logged as warnings.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load XDG config (lowest priority)
        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        // Load project-local config (higher priority, merged)
        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        config.apply_env(|name| std::env::var(name).ok());

        if let Err(e) = config.validate() {
            warn!("{e}");
            eprintln!("warning: {e}");
        }

        config
    }

    /// Apply environment overrides. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(bucket) = var(BUCKET_ENV) {
            debug!("Default bucket from {BUCKET_ENV}");
            self.storage.default_bucket = Some(bucket);
        }
        if let Some(dir) = var(MODELS_DIR_ENV) {
            self.models.dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = var(MODELS_URL_ENV) {
            self.models.base_url = Some(url);
        }
    }

    /// Validate configuration values are within acceptable ranges.
    fn validate(&self) -> Result<(), String> {
        if let Some(c) = self.estimator.model_complexity {
            if ModelComplexity::try_from(c).is_err() {
                return Err(format!("estimator.model_complexity must be 0, 1 or 2, got {c}"));
            }
        }
        if let Some(t) = self.estimator.min_detection_confidence {
            if !(0.0..=1.0).contains(&t) {
                return Err(format!(
                    "estimator.min_detection_confidence must be 0.0-1.0, got {t}"
                ));
            }
        }
        if let Some(ref b) = self.storage.backend {
            if b != "s3" && b != "fs" {
                return Err(format!("storage.backend must be 's3' or 'fs', got '{b}'"));
            }
        }

        Ok(())
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        // Storage
        self.storage.default_bucket = other
            .storage
            .default_bucket
            .or_else(|| self.storage.default_bucket.take());
        self.storage.backend = other.storage.backend.or_else(|| self.storage.backend.take());
        self.storage.root = other.storage.root.or_else(|| self.storage.root.take());

        // Estimator
        self.estimator.model_complexity = other
            .estimator
            .model_complexity
            .or(self.estimator.model_complexity);
        self.estimator.enable_segmentation = other
            .estimator
            .enable_segmentation
            .or(self.estimator.enable_segmentation);
        self.estimator.min_detection_confidence = other
            .estimator
            .min_detection_confidence
            .or(self.estimator.min_detection_confidence);
        self.estimator.static_image_mode = other
            .estimator
            .static_image_mode
            .or(self.estimator.static_image_mode);
        self.estimator.threads = other.estimator.threads.or(self.estimator.threads);

        // Models
        self.models.dir = other.models.dir.or_else(|| self.models.dir.take());
        self.models.base_url = other.models.base_url.or_else(|| self.models.base_url.take());
    }

    /// Estimator options, with out-of-range values replaced by defaults.
    pub fn estimator_options(&self) -> EstimatorOptions {
        let defaults = EstimatorOptions::default();
        let model_complexity = self
            .estimator
            .model_complexity
            .and_then(|c| ModelComplexity::try_from(c).ok())
            .unwrap_or(defaults.model_complexity);
        let min_detection_confidence = self
            .estimator
            .min_detection_confidence
            .filter(|t| (0.0..=1.0).contains(t))
            .unwrap_or(defaults.min_detection_confidence);

        EstimatorOptions {
            static_image_mode: self
                .estimator
                .static_image_mode
                .unwrap_or(defaults.static_image_mode),
            model_complexity,
            enable_segmentation: self
                .estimator
                .enable_segmentation
                .unwrap_or(defaults.enable_segmentation),
            min_detection_confidence,
        }
    }

    /// Handler configuration for this process.
    pub fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            default_bucket: self.storage.default_bucket.clone(),
            estimator: self.estimator_options(),
        }
    }

    /// Models directory, falling back to the XDG data directory.
    pub fn models_dir(&self) -> PathBuf {
        self.models.dir.clone().unwrap_or_else(default_models_dir)
    }

    /// Intra-op threads per session.
    pub fn threads(&self) -> usize {
        self.estimator.threads.unwrap_or(0)
    }
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pose-lambda").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.pose-lambda.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let config_path = dir.join(".pose-lambda.toml");
        if config_path.exists() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    None
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.storage.default_bucket.is_none());
        assert_eq!(config.estimator_options(), EstimatorOptions::default());
        assert_eq!(config.threads(), 0);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r"
[storage]
default_bucket = 'photos'
backend = 'fs'
root = '/srv/buckets'

[estimator]
model_complexity = 1
enable_segmentation = false
min_detection_confidence = 0.7
static_image_mode = false
threads = 2

[models]
dir = '/opt/models'
base_url = 'https://example.com/models'
";
        let config: AppConfig = toml::from_str(toml).expect("parse full config");

        assert_eq!(config.storage.default_bucket.as_deref(), Some("photos"));
        assert_eq!(config.storage.root, Some(PathBuf::from("/srv/buckets")));
        assert_eq!(config.threads(), 2);
        assert_eq!(config.models_dir(), PathBuf::from("/opt/models"));

        let options = config.estimator_options();
        assert_eq!(options.model_complexity, ModelComplexity::Full);
        assert!(!options.enable_segmentation);
        assert!(!options.static_image_mode);
        assert!((options.min_detection_confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_merge_preserves_base_when_override_is_none() {
        let mut base: AppConfig = toml::from_str(
            r"
[storage]
default_bucket = 'base-bucket'

[estimator]
threads = 4
",
        )
        .expect("parse base");

        let override_config: AppConfig = toml::from_str(
            r"
[estimator]
model_complexity = 0
",
        )
        .expect("parse override");

        base.merge(override_config);

        assert_eq!(base.storage.default_bucket.as_deref(), Some("base-bucket"));
        assert_eq!(base.estimator.threads, Some(4));
        assert_eq!(base.estimator.model_complexity, Some(0));
    }

    #[test]
    fn test_merge_override_wins() {
        let mut base: AppConfig = toml::from_str("[storage]\ndefault_bucket = 'a'\n").unwrap();
        let other: AppConfig = toml::from_str("[storage]\ndefault_bucket = 'b'\n").unwrap();

        base.merge(other);
        assert_eq!(base.storage.default_bucket.as_deref(), Some("b"));
    }

    #[test]
    fn test_env_overrides_files() {
        let mut config: AppConfig = toml::from_str(
            r"
[storage]
default_bucket = 'from-file'

[models]
dir = '/from/file'
",
        )
        .unwrap();

        config.apply_env(env(&[
            (BUCKET_ENV, "from-env"),
            (MODELS_DIR_ENV, "/from/env"),
            (MODELS_URL_ENV, "https://example.com/m"),
        ]));

        assert_eq!(config.storage.default_bucket.as_deref(), Some("from-env"));
        assert_eq!(config.models_dir(), PathBuf::from("/from/env"));
        assert_eq!(config.models.base_url.as_deref(), Some("https://example.com/m"));
    }

    #[test]
    fn test_empty_env_is_ignored() {
        let mut config: AppConfig = toml::from_str("[storage]\ndefault_bucket = 'kept'\n").unwrap();
        config.apply_env(env(&[(BUCKET_ENV, "")]));
        assert_eq!(config.storage.default_bucket.as_deref(), Some("kept"));
    }

    #[test]
    fn test_handler_config_carries_bucket() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[(BUCKET_ENV, "photos")]));

        let handler = config.handler_config();
        assert_eq!(handler.default_bucket.as_deref(), Some("photos"));
        assert_eq!(handler.estimator, EstimatorOptions::default());
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let mut config = AppConfig::default();
        config.estimator.model_complexity = Some(7);
        config.estimator.min_detection_confidence = Some(1.5);

        let options = config.estimator_options();
        assert_eq!(options.model_complexity, ModelComplexity::Heavy);
        assert!((options.min_detection_confidence - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_invalid_field_type_handled() {
        let toml = r#"
[estimator]
model_complexity = "heavy"
"#;
        let result: Result<AppConfig, _> = toml::from_str(toml);
        assert!(result.is_err(), "type mismatch should return error");
    }

    #[test]
    fn test_validate() {
        assert!(AppConfig::default().validate().is_ok());

        let mut config = AppConfig::default();
        config.estimator.model_complexity = Some(3);
        assert!(config.validate().unwrap_err().contains("model_complexity"));

        let mut config = AppConfig::default();
        config.estimator.min_detection_confidence = Some(-0.1);
        assert!(config
            .validate()
            .unwrap_err()
            .contains("min_detection_confidence"));

        let mut config = AppConfig::default();
        config.storage.backend = Some("gcs".to_string());
        assert!(config.validate().unwrap_err().contains("storage.backend"));
    }

    #[test]
    fn test_find_config_in_parents() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join(".pose-lambda.toml"), "").unwrap();

        let found = find_config_in_parents(&nested).unwrap();
        assert_eq!(found, root.path().join(".pose-lambda.toml"));
    }
}
