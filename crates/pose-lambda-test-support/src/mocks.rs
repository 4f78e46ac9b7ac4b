//! Mock implementations of core port traits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use image::RgbImage;
use pose_lambda_core::domain::{LandmarkResult, ObjectLocation};
use pose_lambda_core::ports::{EstimatorFactory, EstimatorOptions, ObjectStore, PoseEstimator};

use crate::builders::LandmarkResultBuilder;

/// Mock implementation of `ObjectStore` for testing.
///
/// Serves objects from memory and records every fetch. Fetching an object
/// that was never added fails like a missing key would.
#[derive(Default)]
pub struct MockObjectStore {
    objects: HashMap<ObjectLocation, Vec<u8>>,
    fetches: Arc<Mutex<Vec<ObjectLocation>>>,
}

impl MockObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object.
    #[must_use]
    pub fn with_object(
        mut self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.objects.insert(ObjectLocation::new(bucket, key), bytes);
        self
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Returns every location fetched so far, in order.
    #[must_use]
    pub fn fetches(&self) -> Vec<ObjectLocation> {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of fetches.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches().len()
    }
}

impl ObjectStore for MockObjectStore {
    fn fetch(&self, location: &ObjectLocation) -> anyhow::Result<Vec<u8>> {
        self.fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(location.clone());

        self.objects
            .get(location)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("NoSuchKey: {location}"))
    }
}

#[derive(Default)]
struct FactoryState {
    created: usize,
    detections: usize,
    options: Vec<EstimatorOptions>,
}

/// Mock implementation of `EstimatorFactory` for testing.
///
/// Every estimator it creates returns the same scripted result (or error)
/// and reports back to the factory, so tests can count constructions,
/// detections, and the options passed in.
pub struct MockEstimatorFactory {
    result: Result<LandmarkResult, String>,
    fail_create: Option<String>,
    state: Arc<Mutex<FactoryState>>,
}

impl MockEstimatorFactory {
    /// Creates a factory whose estimators return `result`.
    #[must_use]
    pub fn returning(result: LandmarkResult) -> Self {
        Self {
            result: Ok(result),
            fail_create: None,
            state: Arc::new(Mutex::new(FactoryState::default())),
        }
    }

    /// Estimators find a full pose with face landmarks.
    #[must_use]
    pub fn detecting_pose() -> Self {
        Self::returning(LandmarkResultBuilder::full_pose().build())
    }

    /// Estimators find nothing.
    #[must_use]
    pub fn detecting_nothing() -> Self {
        Self::returning(LandmarkResult::empty())
    }

    /// Estimators fail during `detect` with `message`.
    #[must_use]
    pub fn failing_detection(message: impl Into<String>) -> Self {
        Self {
            result: Err(message.into()),
            ..Self::detecting_nothing()
        }
    }

    /// The factory itself fails with `message`, like a missing model file.
    #[must_use]
    pub fn failing_create(message: impl Into<String>) -> Self {
        Self {
            fail_create: Some(message.into()),
            ..Self::detecting_nothing()
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FactoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the number of estimators created.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.state().created
    }

    /// Returns the number of `detect` calls across all estimators.
    #[must_use]
    pub fn detection_count(&self) -> usize {
        self.state().detections
    }

    /// Returns the options each estimator was created with.
    #[must_use]
    pub fn options(&self) -> Vec<EstimatorOptions> {
        self.state().options.clone()
    }
}

impl EstimatorFactory for MockEstimatorFactory {
    fn create(&self, options: &EstimatorOptions) -> anyhow::Result<Box<dyn PoseEstimator>> {
        if let Some(message) = &self.fail_create {
            anyhow::bail!("{message}");
        }

        let mut state = self.state();
        state.created += 1;
        state.options.push(options.clone());

        Ok(Box::new(MockEstimator {
            result: self.result.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

/// Estimator handed out by [`MockEstimatorFactory`].
pub struct MockEstimator {
    result: Result<LandmarkResult, String>,
    state: Arc<Mutex<FactoryState>>,
}

impl PoseEstimator for MockEstimator {
    fn detect(&mut self, _image: &RgbImage) -> anyhow::Result<LandmarkResult> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .detections += 1;

        self.result.clone().map_err(|message| anyhow::anyhow!(message))
    }
}
