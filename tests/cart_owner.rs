use axum::http::{HeaderMap, HeaderValue, header};
use storefront::{
    middleware::{
        auth::AuthUser,
        cart_owner::{CartOwner, GUEST_COOKIE, guest_cookie_value, read_cookie},
    },
    services::cart_service::ItemTarget,
};
use uuid::Uuid;

fn headers_with_cookie(cookie: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
    headers
}

#[test]
fn signed_in_user_owns_the_cart_even_with_a_guest_cookie() {
    let user = AuthUser {
        user_id: Uuid::new_v4(),
        email: "shopper@example.com".into(),
        role: "user".into(),
    };
    let headers = headers_with_cookie("guest_cart_id=abc123");

    let owner = CartOwner::resolve(Some(&user), &headers);
    assert_eq!(owner, CartOwner::User(user.user_id));
    assert!(owner.cookie_headers().is_empty());
}

#[test]
fn guest_cookie_is_reused() {
    let headers = headers_with_cookie("theme=dark; guest_cart_id=abc-123_x; other=1");
    let owner = CartOwner::resolve(None, &headers);
    assert_eq!(owner, CartOwner::Guest("abc-123_x".into()));
    assert_eq!(owner.guest_id(), Some("abc-123_x"));
    assert_eq!(owner.user_id(), None);
}

#[test]
fn missing_or_unusable_cookie_mints_a_uuid() {
    for headers in [
        HeaderMap::new(),
        headers_with_cookie("guest_cart_id="),
        headers_with_cookie("guest_cart_id=bad value;"),
        headers_with_cookie(&format!("guest_cart_id={}", "x".repeat(65))),
    ] {
        match CartOwner::resolve(None, &headers) {
            CartOwner::Guest(id) => assert!(Uuid::parse_str(&id).is_ok(), "minted {id}"),
            other => panic!("expected guest owner, got {other:?}"),
        }
    }
}

#[test]
fn guest_responses_set_a_thirty_day_cookie() {
    let owner = CartOwner::Guest("abc".into());
    let headers = owner.cookie_headers();
    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();

    assert_eq!(cookie, guest_cookie_value("abc"));
    assert_eq!(
        cookie,
        "guest_cart_id=abc; Path=/; Max-Age=2592000; HttpOnly; SameSite=Lax"
    );
}

#[test]
fn read_cookie_scans_every_cookie_header() {
    let mut headers = HeaderMap::new();
    headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
    headers.append(header::COOKIE, HeaderValue::from_static("guest_cart_id=\"q1\""));

    assert_eq!(read_cookie(&headers, GUEST_COOKIE).as_deref(), Some("q1"));
    assert_eq!(read_cookie(&headers, "a").as_deref(), Some("1"));
    assert_eq!(read_cookie(&headers, "missing"), None);
}

#[test]
fn item_ids_parse_into_targets() {
    let row = Uuid::new_v4();
    assert_eq!(ItemTarget::parse(&row.to_string()), Some(ItemTarget::Row(row)));
    assert_eq!(
        ItemTarget::parse("temp_7_1760000000000"),
        Some(ItemTarget::Product(7))
    );
    assert_eq!(ItemTarget::parse("nonsense"), None);
}
