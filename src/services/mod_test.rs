use super::*;

#[test]
fn store_conflict_maps_to_conflict() {
    let err: ServiceError = StoreError::Conflict("vote".into()).into();
    assert!(matches!(err, ServiceError::Conflict(_)));
    assert_eq!(err.error_code(), "E_CONFLICT");
    assert!(err.retryable());
}

#[test]
fn store_backend_maps_to_transient_failure() {
    let err: ServiceError = StoreError::Backend("connection reset".into()).into();
    assert!(matches!(err, ServiceError::TransientStoreFailure(ref m) if m == "connection reset"));
    assert_eq!(err.error_code(), "E_STORE_UNAVAILABLE");
    assert!(err.retryable());
}

#[test]
fn store_not_found_maps_to_not_found() {
    let err: ServiceError = StoreError::NotFound("report".into()).into();
    assert_eq!(err.to_string(), "report not found");
}

#[test]
fn blob_error_maps_to_transient_failure() {
    let err: ServiceError = BlobError::Rejected("bad path".into()).into();
    assert!(matches!(err, ServiceError::TransientStoreFailure(_)));
}

#[test]
fn client_errors_are_not_retryable() {
    assert!(!ServiceError::Unauthenticated.retryable());
    assert!(!ServiceError::Validation("x".into()).retryable());
    assert!(!ServiceError::NotFound("x".into()).retryable());
}

#[test]
fn required_text_trims() {
    assert_eq!(required_text("title", "  Pothole  ", 10).unwrap(), "Pothole");
}

#[test]
fn required_text_rejects_blank() {
    let err = required_text("title", " \n\t ", 10).unwrap_err();
    assert!(matches!(err, ServiceError::Validation(ref m) if m == "title must not be empty"));
}

#[test]
fn required_text_counts_chars_not_bytes() {
    assert!(required_text("title", "ééééé", 5).is_ok());
    assert!(required_text("title", "éééééé", 5).is_err());
}
