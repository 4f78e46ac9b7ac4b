//! Request handler: validate, fetch, decode, estimate, map.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use tracing::{debug, info, info_span, warn};

use crate::domain::{Outcome, PoseData, PoseRequest};
use crate::ports::{EstimatorFactory, EstimatorOptions, ObjectStore};

/// Handler configuration, fixed for the lifetime of the process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerConfig {
    /// Bucket used when a request does not name one.
    pub default_bucket: Option<String>,
    /// Options every estimator is constructed with.
    pub estimator: EstimatorOptions,
}

impl HandlerConfig {
    /// Sets the default bucket.
    #[must_use]
    pub fn with_default_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.default_bucket = Some(bucket.into());
        self
    }

    /// Sets the estimator options.
    #[must_use]
    pub fn with_estimator(mut self, estimator: EstimatorOptions) -> Self {
        self.estimator = estimator;
        self
    }
}

/// Per-invocation metadata supplied by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    /// Runtime request id, used for log correlation.
    pub request_id: Option<String>,
}

impl InvocationContext {
    /// Creates a context for the given request id.
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
        }
    }
}

/// Handles pose estimation requests.
pub struct PoseHandler<S, F> {
    store: S,
    factory: F,
    config: HandlerConfig,
}

impl<S: ObjectStore, F: EstimatorFactory> PoseHandler<S, F> {
    /// Creates a handler over the given store and estimator factory.
    pub const fn new(store: S, factory: F, config: HandlerConfig) -> Self {
        Self {
            store,
            factory,
            config,
        }
    }

    /// Returns the handler configuration.
    pub const fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Returns the object store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the estimator factory.
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    /// Handles a single request.
    ///
    /// Missing input and an image without a pose are reported through the
    /// returned [`Outcome`].
    ///
    /// # Errors
    ///
    /// Storage, decoding and inference failures are returned as errors and
    /// left to the runtime to report.
    pub fn handle(&self, request: &PoseRequest, context: &InvocationContext) -> Result<Outcome> {
        let _span = info_span!(
            "invocation",
            request_id = context.request_id.as_deref().unwrap_or("-")
        )
        .entered();

        let Some(location) = request.resolve(self.config.default_bucket.as_deref()) else {
            warn!(
                "Rejecting request: bucket={:?} key={:?}",
                request.bucket, request.key
            );
            return Ok(Outcome::bad_request());
        };

        info!("Processing {location}");

        let bytes = self
            .store
            .fetch(&location)
            .with_context(|| format!("Failed to fetch {location}"))?;
        debug!("Fetched {} bytes", bytes.len());

        let image =
            decode_image(&bytes).with_context(|| format!("Failed to decode {location}"))?;
        debug!("Decoded {}x{} image", image.width(), image.height());

        let mut estimator = self
            .factory
            .create(&self.config.estimator)
            .context("Failed to create pose estimator")?;

        let result = estimator
            .detect(&image)
            .with_context(|| format!("Pose estimation failed for {location}"))?;

        match PoseData::from_result(result) {
            Some(data) => {
                info!(
                    "Pose detected: {} landmarks, face={}",
                    data.pose_landmarks.len(),
                    data.face_landmarks.is_some()
                );
                Ok(Outcome::Success { data })
            }
            None => {
                info!("No pose detected in {location}");
                Ok(Outcome::pose_not_detected())
            }
        }
    }
}

/// Decodes image bytes into an RGB pixel grid, upright per the EXIF
/// orientation tag.
///
/// # Errors
///
/// Returns an error if the bytes are not a supported image format.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("Failed to read image data")?
        .into_decoder()
        .context("Unrecognized or corrupt image data")?;
    let orientation = decoder
        .orientation()
        .context("Failed to read image orientation")?;

    let mut image =
        DynamicImage::from_decoder(decoder).context("Unrecognized or corrupt image data")?;
    image.apply_orientation(orientation);
    Ok(image.to_rgb8())
}
