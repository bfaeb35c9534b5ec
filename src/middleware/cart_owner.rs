use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, HeaderValue, header, request::Parts},
};
use uuid::Uuid;

use crate::{error::AppError, middleware::auth::AuthUser, state::AppState};

pub const GUEST_COOKIE: &str = "guest_cart_id";
/// Thirty days.
pub const GUEST_COOKIE_MAX_AGE: i64 = 60 * 60 * 24 * 30;

/// Identity a cart belongs to: a signed-in user or a cookie-tracked guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(Uuid),
    Guest(String),
}

impl CartOwner {
    /// Signed-in user wins; otherwise the guest cookie, minting one when absent or unusable.
    pub fn resolve(user: Option<&AuthUser>, headers: &HeaderMap) -> Self {
        if let Some(user) = user {
            return CartOwner::User(user.user_id);
        }
        match read_cookie(headers, GUEST_COOKIE).filter(|id| is_valid_guest_id(id)) {
            Some(id) => CartOwner::Guest(id),
            None => CartOwner::Guest(Uuid::new_v4().to_string()),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            CartOwner::User(id) => Some(*id),
            CartOwner::Guest(_) => None,
        }
    }

    pub fn guest_id(&self) -> Option<&str> {
        match self {
            CartOwner::User(_) => None,
            CartOwner::Guest(id) => Some(id),
        }
    }

    /// `Set-Cookie` for guests so the cookie outlives each response by thirty days.
    pub fn cookie_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let CartOwner::Guest(id) = self {
            if let Ok(value) = HeaderValue::from_str(&guest_cookie_value(id)) {
                headers.insert(header::SET_COOKIE, value);
            }
        }
        headers
    }
}

pub fn guest_cookie_value(guest_id: &str) -> String {
    format!(
        "{GUEST_COOKIE}={guest_id}; Path=/; Max-Age={GUEST_COOKIE_MAX_AGE}; HttpOnly; SameSite=Lax"
    )
}

/// Value of the named cookie across every `Cookie` header.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}

fn is_valid_guest_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl FromRequestParts<AppState> for CartOwner {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user =
            <AuthUser as OptionalFromRequestParts<AppState>>::from_request_parts(parts, state)
                .await?;
        Ok(CartOwner::resolve(user.as_ref(), &parts.headers))
    }
}
