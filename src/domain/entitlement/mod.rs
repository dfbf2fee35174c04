//! Entitlement domain: who may see which purchased resource.

mod access_right;

pub use access_right::{AccessLevel, AccessRight, AccessRightKey, ResourceType};
