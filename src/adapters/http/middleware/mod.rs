//! HTTP middleware for axum.
//!
//! - `admin_auth` - Bearer-token guard for the operator API

pub mod admin_auth;

pub use admin_auth::{
    admin_auth_middleware, AdminOperator, AdminRejection, AdminTokenState, RequireAdmin,
    OPERATOR_HEADER,
};
