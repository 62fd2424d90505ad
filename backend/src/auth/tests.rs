use super::*;
use axum::http::Request;
use jsonwebtoken::{EncodingKey, Header, encode};

const SECRET: &str = "supersecretjwtsecretforunittesting123";
const USER_ID: &str = "123e4567-e89b-12d3-a456-426614174000";

#[derive(Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    role: &'a str,
    aud: &'a str,
    email: Option<&'a str>,
    exp: usize,
}

fn token(secret: &str, sub: &str, role: &str, exp: usize) -> String {
    let claims = TestClaims {
        sub,
        role,
        aud: "authenticated",
        email: Some("test@example.com"),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[test]
fn test_validate_supabase_jwt_success() {
    let verifier = SupabaseJwtVerifier::new(SECRET);
    let claims = verifier
        .validate(&token(SECRET, USER_ID, "authenticated", 9999999999))
        .expect("Valid token should pass");

    assert_eq!(claims.sub.as_deref(), Some(USER_ID));
    assert_eq!(claims.email.as_deref(), Some("test@example.com"));
}

#[test]
fn test_validate_supabase_jwt_expired() {
    let verifier = SupabaseJwtVerifier::new(SECRET);
    let result = verifier.validate(&token(SECRET, USER_ID, "authenticated", 1));
    assert!(result.is_err());
}

#[test]
fn test_validate_supabase_jwt_invalid_signature() {
    let verifier = SupabaseJwtVerifier::new(SECRET);
    let result = verifier.validate(&token("wrongsecret", USER_ID, "authenticated", 9999999999));
    assert!(result.is_err());
}

async fn extract(authorization: Option<String>) -> Result<AuthUser, ApiError> {
    let mut builder = Request::builder().uri("/api/v1/bookings");
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    let (mut parts, _) = builder.body(()).unwrap().into_parts();
    parts
        .extensions
        .insert(Arc::new(SupabaseJwtVerifier::new(SECRET)));

    AuthUser::from_request_parts(&mut parts, &()).await
}

#[tokio::test]
async fn extractor_accepts_bearer_token() {
    let bearer = format!("Bearer {}", token(SECRET, USER_ID, "authenticated", 9999999999));
    let auth = extract(Some(bearer)).await.unwrap();

    assert_eq!(auth.user_id.to_string(), USER_ID);
    assert!(!auth.is_service_role());
}

#[tokio::test]
async fn extractor_rejects_missing_header() {
    let err = extract(None).await.unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn extractor_rejects_non_bearer_scheme() {
    let err = extract(Some("Basic dXNlcjpwYXNz".to_string())).await.unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn extractor_rejects_non_uuid_subject() {
    let bearer = format!("Bearer {}", token(SECRET, "not-a-uuid", "authenticated", 9999999999));
    let err = extract(Some(bearer)).await.unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}

#[derive(Serialize)]
struct ServiceRoleClaims<'a> {
    iss: &'a str,
    role: &'a str,
    exp: usize,
}

fn service_role_key(role: &str) -> String {
    encode(
        &Header::default(),
        &ServiceRoleClaims {
            iss: "supabase",
            role,
            exp: 9999999999,
        },
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

#[test]
fn service_role_key_without_sub_or_aud_is_valid() {
    let verifier = SupabaseJwtVerifier::new(SECRET);
    let claims = verifier
        .validate(&service_role_key("service_role"))
        .expect("service role key should pass");

    assert!(claims.is_service_role());
    assert!(claims.sub.is_none());
}

#[test]
fn user_token_without_audience_is_rejected() {
    let verifier = SupabaseJwtVerifier::new(SECRET);
    assert!(verifier.validate(&service_role_key("authenticated")).is_err());
}

#[tokio::test]
async fn extractor_maps_service_role_key_to_service_caller() {
    let bearer = format!("Bearer {}", service_role_key("service_role"));
    let auth = extract(Some(bearer)).await.unwrap();

    assert!(auth.is_service_role());
    assert_eq!(auth.account_id(), None);
}
