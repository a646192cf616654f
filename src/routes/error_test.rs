use super::*;

#[test]
fn service_errors_map_to_statuses() {
    let cases = [
        (ServiceError::Unauthenticated, StatusCode::UNAUTHORIZED, "E_UNAUTHENTICATED"),
        (ServiceError::Validation("title".into()), StatusCode::BAD_REQUEST, "E_VALIDATION"),
        (ServiceError::NotFound("report".into()), StatusCode::NOT_FOUND, "E_NOT_FOUND"),
        (ServiceError::Conflict("vote".into()), StatusCode::CONFLICT, "E_CONFLICT"),
        (ServiceError::TransientStoreFailure("down".into()), StatusCode::SERVICE_UNAVAILABLE, "E_STORE_UNAVAILABLE"),
    ];
    for (err, status, code) in cases {
        let api = ApiError::from(err);
        assert_eq!(api.status, status);
        assert_eq!(api.code, code);
    }
}

#[test]
fn auth_errors_map_to_statuses() {
    let cases = [
        (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED, "E_INVALID_CREDENTIALS"),
        (AuthError::AlreadyRegistered, StatusCode::CONFLICT, "E_ALREADY_REGISTERED"),
        (AuthError::Validation("email".into()), StatusCode::BAD_REQUEST, "E_VALIDATION"),
        (AuthError::Service("down".into()), StatusCode::SERVICE_UNAVAILABLE, "E_STORE_UNAVAILABLE"),
    ];
    for (err, status, code) in cases {
        let api = ApiError::from(err);
        assert_eq!(api.status, status);
        assert_eq!(api.code, code);
    }
}

#[test]
fn retryable_flag_follows_error() {
    assert!(ApiError::from(ServiceError::Conflict("vote".into())).retryable);
    assert!(!ApiError::from(ServiceError::NotFound("report".into())).retryable);
}

#[test]
fn bad_request_is_validation() {
    let api = ApiError::bad_request("missing field");
    assert_eq!(api.status, StatusCode::BAD_REQUEST);
    assert_eq!(api.code, "E_VALIDATION");
    assert_eq!(api.message, "invalid input: missing field");
}

#[test]
fn into_response_keeps_status() {
    let response = ApiError::from(ServiceError::Unauthenticated).into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
