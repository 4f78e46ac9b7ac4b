//! Integration tests for the request handler.
//!
//! Run the handler against mock storage and estimators and check the
//! response envelope end to end.

#![allow(clippy::unwrap_used)]

use pose_lambda_core::domain::{PoseRequest, BAD_REQUEST_MESSAGE, POSE_NOT_DETECTED_MESSAGE};
use pose_lambda_core::{EstimatorOptions, HandlerConfig, InvocationContext, Outcome, PoseHandler};
use pose_lambda_test_support::{
    LandmarkResultBuilder, MockEstimatorFactory, MockObjectStore, SyntheticImageBuilder,
};
use serde_json::{json, Value};

fn store_with_person() -> MockObjectStore {
    MockObjectStore::new()
        .with_object("photos", "person.jpg", SyntheticImageBuilder::jpeg_bytes(64, 96))
        .with_object("defaults", "person.png", SyntheticImageBuilder::png_bytes(64, 96))
}

fn build_handler(
    factory: MockEstimatorFactory,
    default_bucket: Option<&str>,
) -> PoseHandler<MockObjectStore, MockEstimatorFactory> {
    let mut config = HandlerConfig::default();
    if let Some(bucket) = default_bucket {
        config = config.with_default_bucket(bucket);
    }
    PoseHandler::new(store_with_person(), factory, config)
}

fn invoke(
    handler: &PoseHandler<MockObjectStore, MockEstimatorFactory>,
    event: &Value,
) -> anyhow::Result<Value> {
    let request = PoseRequest::from_event(event);
    let outcome = handler.handle(&request, &InvocationContext::new("test-request"))?;
    Ok(serde_json::to_value(outcome.into_response())?)
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_empty_event_is_bad_request() {
    let factory = MockEstimatorFactory::detecting_pose();
    let handler = build_handler(factory, None);

    let response = invoke(&handler, &json!({})).unwrap();
    assert_eq!(
        response,
        json!({"statusCode": 409, "body": {"message": BAD_REQUEST_MESSAGE, "data": null}})
    );
}

#[test]
fn test_bad_request_does_no_work() {
    let factory = MockEstimatorFactory::detecting_pose();
    let handler = PoseHandler::new(MockObjectStore::new(), factory, HandlerConfig::default());

    let outcome = handler
        .handle(&PoseRequest::default(), &InvocationContext::default())
        .unwrap();
    assert_eq!(outcome, Outcome::bad_request());

    let response = invoke(&handler, &json!({"bucket": "photos"})).unwrap();
    assert_eq!(response["statusCode"], 409);

    assert_eq!(handler.store().fetch_count(), 0);
    assert_eq!(handler.factory().created_count(), 0);
}

#[test]
fn test_key_without_any_bucket_is_bad_request() {
    let handler = build_handler(MockEstimatorFactory::detecting_pose(), None);

    let response = invoke(&handler, &json!({"key": "blank.jpg"})).unwrap();
    assert_eq!(response["statusCode"], 409);
    assert_eq!(response["body"]["message"], BAD_REQUEST_MESSAGE);
}

#[test]
fn test_non_string_fields_are_bad_request() {
    let handler = build_handler(MockEstimatorFactory::detecting_pose(), Some("defaults"));

    for event in [json!(null), json!("person.png"), json!({"key": 42}), json!({"key": ""})] {
        let response = invoke(&handler, &event).unwrap();
        assert_eq!(response["statusCode"], 409, "event: {event}");
    }
}

// ============================================================================
// Success
// ============================================================================

#[test]
fn test_detected_pose_returns_landmarks() {
    let handler = build_handler(MockEstimatorFactory::detecting_pose(), None);

    let response = invoke(&handler, &json!({"bucket": "photos", "key": "person.jpg"})).unwrap();
    assert_eq!(response["statusCode"], 200);
    assert_eq!(response["body"]["message"], Value::Null);

    let data = &response["body"]["data"];
    let pose = data["pose_landmarks"].as_array().unwrap();
    assert_eq!(pose.len(), 33);
    for landmark in pose {
        let x = landmark["x"].as_f64().unwrap();
        let y = landmark["y"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&x));
        assert!((0.0..=1.0).contains(&y));
        assert!(landmark["visibility"].is_number());
    }

    assert_eq!(data["pose_world_landmarks"].as_array().unwrap().len(), 33);
    assert_eq!(data["face_landmarks"].as_array().unwrap().len(), 468);
}

#[test]
fn test_default_bucket_fallback() {
    let handler = build_handler(MockEstimatorFactory::detecting_pose(), Some("defaults"));

    let response = invoke(&handler, &json!({"key": "person.png"})).unwrap();
    assert_eq!(response["statusCode"], 200);
}

#[test]
fn test_request_bucket_overrides_default() {
    let handler = build_handler(MockEstimatorFactory::detecting_pose(), Some("defaults"));

    let response = invoke(&handler, &json!({"bucket": "photos", "key": "person.jpg"})).unwrap();
    assert_eq!(response["statusCode"], 200);
}

#[test]
fn test_missing_face_is_null() {
    let result = LandmarkResultBuilder::full_pose().without_face().build();
    let handler = build_handler(MockEstimatorFactory::returning(result), None);

    let response = invoke(&handler, &json!({"bucket": "photos", "key": "person.jpg"})).unwrap();
    assert_eq!(response["statusCode"], 200);
    assert_eq!(response["body"]["data"]["face_landmarks"], Value::Null);
}

#[test]
fn test_same_request_same_response() {
    let handler = build_handler(MockEstimatorFactory::detecting_pose(), None);
    let event = json!({"bucket": "photos", "key": "person.jpg"});

    let first = invoke(&handler, &event).unwrap();
    let second = invoke(&handler, &event).unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// No pose
// ============================================================================

#[test]
fn test_no_pose_is_reported_as_500() {
    let handler = build_handler(MockEstimatorFactory::detecting_nothing(), None);

    let response = invoke(&handler, &json!({"bucket": "photos", "key": "person.jpg"})).unwrap();
    assert_eq!(
        response,
        json!({"statusCode": 500, "body": {"message": POSE_NOT_DETECTED_MESSAGE, "data": null}})
    );
}

#[test]
fn test_face_without_pose_is_not_detected() {
    let mut result = LandmarkResultBuilder::full_pose().build();
    result.pose_landmarks = None;
    let handler = build_handler(MockEstimatorFactory::returning(result), None);

    let response = invoke(&handler, &json!({"bucket": "photos", "key": "person.jpg"})).unwrap();
    assert_eq!(response["statusCode"], 500);
}

// ============================================================================
// Envelope
// ============================================================================

#[test]
fn test_envelope_has_exactly_one_of_message_and_data() {
    let cases = [
        (MockEstimatorFactory::detecting_pose(), json!({"bucket": "photos", "key": "person.jpg"})),
        (MockEstimatorFactory::detecting_nothing(), json!({"bucket": "photos", "key": "person.jpg"})),
        (MockEstimatorFactory::detecting_pose(), json!({})),
    ];

    for (factory, event) in cases {
        let handler = build_handler(factory, None);
        let response = invoke(&handler, &event).unwrap();
        let body = response["body"].as_object().unwrap();

        assert!(body.contains_key("message"));
        assert!(body.contains_key("data"));
        assert_ne!(body["message"].is_null(), body["data"].is_null());
    }
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_missing_object_is_an_error() {
    let handler = build_handler(MockEstimatorFactory::detecting_pose(), None);

    let err = invoke(&handler, &json!({"bucket": "photos", "key": "nope.jpg"})).unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("Failed to fetch photos/nope.jpg"));
    assert!(chain.contains("NoSuchKey"));
}

#[test]
fn test_undecodable_object_is_an_error() {
    let store = MockObjectStore::new().with_object(
        "photos",
        "broken.jpg",
        SyntheticImageBuilder::corrupt_bytes(),
    );
    let factory = MockEstimatorFactory::detecting_pose();
    let handler = PoseHandler::new(store, factory, HandlerConfig::default());

    let request = PoseRequest::new(Some("photos"), "broken.jpg");
    let err = handler
        .handle(&request, &InvocationContext::default())
        .unwrap_err();
    assert!(format!("{err:#}").contains("Failed to decode photos/broken.jpg"));
}

#[test]
fn test_estimator_failures_propagate() {
    let handler = build_handler(MockEstimatorFactory::failing_detection("inference blew up"), None);
    let err = invoke(&handler, &json!({"bucket": "photos", "key": "person.jpg"})).unwrap_err();
    assert!(format!("{err:#}").contains("inference blew up"));

    let handler = build_handler(MockEstimatorFactory::failing_create("model missing"), None);
    let err = invoke(&handler, &json!({"bucket": "photos", "key": "person.jpg"})).unwrap_err();
    assert!(format!("{err:#}").contains("model missing"));
}

// ============================================================================
// Estimator lifecycle
// ============================================================================

#[test]
fn test_fresh_estimator_per_request() {
    let factory = MockEstimatorFactory::detecting_pose();
    let handler = build_handler(factory, None);
    let event = json!({"bucket": "photos", "key": "person.jpg"});

    invoke(&handler, &event).unwrap();
    invoke(&handler, &event).unwrap();
    invoke(&handler, &json!({})).unwrap();

    assert_eq!(handler.factory().created_count(), 2);
    assert_eq!(handler.factory().detection_count(), 2);
    assert_eq!(handler.store().fetch_count(), 2);

    let options = handler.factory().options();
    assert!(options.iter().all(|o| *o == EstimatorOptions::default()));
}

#[test]
fn test_estimator_options_are_fixed() {
    let options = EstimatorOptions::default();
    assert!(options.static_image_mode);
    assert_eq!(u8::from(options.model_complexity), 2);
    assert!(options.enable_segmentation);
    assert!((options.min_detection_confidence - 0.5).abs() < f32::EPSILON);
}
