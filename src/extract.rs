use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// `Json` with body rejections reported as 400 through [`AppError`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Query` with rejections reported as 400 through [`AppError`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
