pub mod auth;
pub mod cart_owner;
