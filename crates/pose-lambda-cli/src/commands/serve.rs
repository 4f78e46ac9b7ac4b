//! Serve command - run the Lambda runtime loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use lambda_runtime::{service_fn, LambdaEvent};
use pose_lambda_adapters::{model_set, S3ObjectStore};
use pose_lambda_core::inference::OnnxEstimatorFactory;
use pose_lambda_core::{InvocationContext, LambdaResponse, PoseHandler, PoseRequest};
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::info;

use crate::config::AppConfig;

type Handler = PoseHandler<S3ObjectStore, OnnxEstimatorFactory>;

/// Run the serve command.
///
/// Blocks until the runtime shuts down.
pub fn run(config: &AppConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(serve(config))
}

async fn serve(config: &AppConfig) -> Result<()> {
    let models_dir = config.models_dir();
    info!("Loading models from {}", models_dir.display());

    let store = S3ObjectStore::from_env(Handle::current()).await;
    let factory = OnnxEstimatorFactory::new(model_set(&models_dir), config.threads());
    let handler_config = config.handler_config();
    match handler_config.default_bucket.as_deref() {
        Some(bucket) => info!("Default bucket: {bucket}"),
        None => info!("No default bucket configured"),
    }

    let handler = Arc::new(PoseHandler::new(store, factory, handler_config));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let handler = Arc::clone(&handler);
        async move { handle_event(handler, event).await }
    }))
    .await
    .map_err(|e| anyhow::anyhow!("Lambda runtime failed: {e}"))
}

/// Runs one invocation on a blocking thread and shapes the response.
///
/// Errors are returned to the runtime, which reports them as a failed
/// invocation.
async fn handle_event(
    handler: Arc<Handler>,
    event: LambdaEvent<Value>,
) -> Result<LambdaResponse, lambda_runtime::Error> {
    let (payload, context) = event.into_parts();
    let request = PoseRequest::from_event(&payload);
    let context = InvocationContext::new(context.request_id);

    let outcome =
        tokio::task::spawn_blocking(move || handler.handle(&request, &context)).await??;

    Ok(outcome.into_response())
}
