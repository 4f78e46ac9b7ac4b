//! Invoke command - handle one request locally.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use pose_lambda_adapters::{model_set, FsObjectStore, S3ObjectStore};
use pose_lambda_core::inference::OnnxEstimatorFactory;
use pose_lambda_core::{InvocationContext, LambdaResponse, ObjectStore, PoseHandler, PoseRequest};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::AppConfig;

/// Object store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Amazon S3, credentials from the environment
    S3,
    /// Local directory, one subdirectory per bucket
    Fs,
}

/// Arguments for the invoke command
#[derive(Args, Debug, Default)]
pub struct InvokeArgs {
    /// Bucket holding the image (defaults to the configured bucket)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Object key of the image
    #[arg(long)]
    pub key: Option<String>,

    /// Raw event JSON; overrides --bucket and --key
    #[arg(long, value_name = "JSON", conflicts_with_all = ["bucket", "key"])]
    pub event: Option<String>,

    /// Object store backend [default: s3]
    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,

    /// Root directory for the fs store
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Pretty-print the response
    #[arg(long)]
    pub pretty: bool,
}

impl InvokeArgs {
    /// Builds the event payload the runtime would deliver.
    ///
    /// # Errors
    ///
    /// Returns an error if `--event` is not valid JSON.
    pub fn event(&self) -> Result<Value> {
        if let Some(raw) = &self.event {
            return serde_json::from_str(raw).context("--event is not valid JSON");
        }

        let mut event = Map::new();
        if let Some(bucket) = &self.bucket {
            event.insert("bucket".into(), Value::String(bucket.clone()));
        }
        if let Some(key) = &self.key {
            event.insert("key".into(), Value::String(key.clone()));
        }
        Ok(Value::Object(event))
    }

    /// Store backend: CLI flag, then config, then S3.
    fn store_kind(&self, config: &AppConfig) -> StoreKind {
        self.store.unwrap_or_else(|| match config.storage.backend.as_deref() {
            Some("fs") => StoreKind::Fs,
            _ => StoreKind::S3,
        })
    }
}

/// Run the invoke command, printing the response envelope to stdout.
///
/// Envelopes with non-200 status codes are printed like any other response;
/// only unhandled failures are returned as errors.
pub fn run(args: &InvokeArgs, config: &AppConfig) -> Result<()> {
    let event = args.event()?;
    debug!("Event: {event}");
    let request = PoseRequest::from_event(&event);

    let factory = OnnxEstimatorFactory::new(model_set(&config.models_dir()), config.threads());
    let context = InvocationContext::new("local");

    let response = match args.store_kind(config) {
        StoreKind::Fs => {
            let root = args
                .root
                .clone()
                .or_else(|| config.storage.root.clone())
                .context("The fs store needs --root or storage.root")?;
            info!("Using filesystem store at {}", root.display());
            invoke(FsObjectStore::new(root), factory, config, &request, &context)?
        }
        StoreKind::S3 => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            let store = runtime.block_on(S3ObjectStore::from_env(runtime.handle().clone()));
            invoke(store, factory, config, &request, &context)?
        }
    };

    let output = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{output}");

    Ok(())
}

fn invoke<S: ObjectStore>(
    store: S,
    factory: OnnxEstimatorFactory,
    config: &AppConfig,
    request: &PoseRequest,
    context: &InvocationContext,
) -> Result<LambdaResponse> {
    let handler = PoseHandler::new(store, factory, config.handler_config());
    let outcome = handler.handle(request, context)?;
    info!("Status {}", outcome.status_code());
    Ok(outcome.into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_from_flags() {
        let args = InvokeArgs {
            bucket: Some("photos".into()),
            key: Some("a.jpg".into()),
            ..InvokeArgs::default()
        };
        assert_eq!(args.event().unwrap(), json!({"bucket": "photos", "key": "a.jpg"}));

        assert_eq!(InvokeArgs::default().event().unwrap(), json!({}));
    }

    #[test]
    fn test_raw_event() {
        let args = InvokeArgs {
            event: Some(r#"{"key": 5}"#.into()),
            ..InvokeArgs::default()
        };
        assert_eq!(args.event().unwrap(), json!({"key": 5}));

        let bad = InvokeArgs {
            event: Some("{not json".into()),
            ..InvokeArgs::default()
        };
        assert!(bad.event().is_err());
    }

    #[test]
    fn test_store_kind_precedence() {
        let mut config = AppConfig::default();
        assert_eq!(InvokeArgs::default().store_kind(&config), StoreKind::S3);

        config.storage.backend = Some("fs".into());
        assert_eq!(InvokeArgs::default().store_kind(&config), StoreKind::Fs);

        let args = InvokeArgs {
            store: Some(StoreKind::S3),
            ..InvokeArgs::default()
        };
        assert_eq!(args.store_kind(&config), StoreKind::S3);
    }
}
