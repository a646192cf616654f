use axum::http::Request;

use super::*;
use crate::state::test_helpers::test_config;

fn parts_with(headers: &[(&str, &str)]) -> Parts {
    let mut builder = Request::builder().uri("/api/auth/me");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(()).unwrap().into_parts().0
}

// =============================================================================
// request_token
// =============================================================================

#[test]
fn token_from_cookie() {
    let parts = parts_with(&[("cookie", "theme=dark; session_token=abc123")]);
    assert_eq!(request_token(&parts).as_deref(), Some("abc123"));
}

#[test]
fn bearer_takes_precedence_over_cookie() {
    let parts = parts_with(&[("authorization", "Bearer fromheader"), ("cookie", "session_token=fromcookie")]);
    assert_eq!(request_token(&parts).as_deref(), Some("fromheader"));
}

#[test]
fn empty_tokens_are_ignored() {
    assert_eq!(request_token(&parts_with(&[("cookie", "session_token=")])), None);
    assert_eq!(request_token(&parts_with(&[("authorization", "Bearer   ")])), None);
    assert_eq!(request_token(&parts_with(&[])), None);
}

#[test]
fn non_bearer_authorization_falls_back_to_cookie() {
    let parts = parts_with(&[("authorization", "Basic dXNlcjpwdw=="), ("cookie", "session_token=c")]);
    assert_eq!(request_token(&parts).as_deref(), Some("c"));
}

// =============================================================================
// cookies
// =============================================================================

#[test]
fn session_cookie_attributes() {
    let mut config = test_config();
    config.cookie_secure = true;
    let cookie = session_cookie("tok".into(), &config);

    assert_eq!(cookie.name(), COOKIE_NAME);
    assert_eq!(cookie.value(), "tok");
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.max_age(), Some(config.session_ttl));
}

#[test]
fn cleared_cookie_expires_immediately() {
    let config = test_config();
    let cookie = cleared_cookie(&config);
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    assert_eq!(cookie.secure(), Some(false));
}

#[test]
fn signed_in_response_does_not_borrow_config() {
    let signed_in = SignedIn {
        session: Session { user_id: uuid::Uuid::new_v4(), email: "a@example.com".into(), display_name: "a".into() },
        token: "tok".into(),
    };
    let (status, jar, Json(body)) = {
        let config = test_config();
        signed_in_response(StatusCode::CREATED, signed_in, &config)
    };
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(jar.get(COOKIE_NAME).map(Cookie::value), Some("tok"));
    assert_eq!(body.token, "tok");
    assert_eq!(body.user.email, "a@example.com");
}
