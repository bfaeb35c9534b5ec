use chrono::Utc;
use storefront::{
    config::parse_email_list,
    error::AppError,
    middleware::auth::{AuthUser, decode_token, has_admin_access},
    models::User,
    services::auth_service::{
        hash_password, issue_token, normalize_email, validate_password, verify_password,
    },
};
use uuid::Uuid;

const SECRET: &str = "test-secret";

fn user(role: &str, email: &str) -> User {
    User {
        id: Uuid::new_v4(),
        name: "Test".into(),
        email: email.into(),
        password_hash: String::new(),
        role: role.into(),
        phone: None,
        address: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn admin_role_or_allow_listed_email_grants_access() {
    let allow = parse_email_list(" Owner@Shop.test , ,ops@shop.test");
    assert_eq!(allow, vec!["owner@shop.test", "ops@shop.test"]);

    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        email: "someone@shop.test".into(),
        role: "admin".into(),
    };
    let listed = AuthUser {
        user_id: Uuid::new_v4(),
        email: "OWNER@shop.test".into(),
        role: "user".into(),
    };
    let plain = AuthUser {
        user_id: Uuid::new_v4(),
        email: "plain@shop.test".into(),
        role: "user".into(),
    };

    assert!(has_admin_access(&admin, &[]));
    assert!(has_admin_access(&listed, &allow));
    assert!(!has_admin_access(&plain, &allow));
}

#[test]
fn issued_tokens_decode_to_the_same_identity() {
    let user = user("admin", "boss@shop.test");
    let token = issue_token(&user, SECRET).unwrap();

    let auth = decode_token(&token, SECRET).unwrap();
    assert_eq!(auth.user_id, user.id);
    assert_eq!(auth.email, "boss@shop.test");
    assert_eq!(auth.role, "admin");
}

#[test]
fn tokens_signed_with_another_secret_are_rejected() {
    let token = issue_token(&user("user", "a@shop.test"), "other").unwrap();
    assert!(matches!(
        decode_token(&token, SECRET),
        Err(AppError::Unauthorized)
    ));
    assert!(matches!(
        decode_token("garbage", SECRET),
        Err(AppError::Unauthorized)
    ));
}

#[test]
fn password_hashing_round_trip() {
    let hash = hash_password("correct horse").unwrap();
    assert!(verify_password("correct horse", &hash).unwrap());
    assert!(!verify_password("wrong horse", &hash).unwrap());
}

#[test]
fn password_and_email_validation() {
    assert!(validate_password("short").is_err());
    assert!(validate_password("long enough").is_ok());

    assert_eq!(normalize_email("  Mixed@Case.Test ").unwrap(), "mixed@case.test");
    assert!(normalize_email("no-at-sign").is_err());
    assert!(normalize_email("@missing.local").is_err());
    assert!(normalize_email("user@nodot").is_err());
}
