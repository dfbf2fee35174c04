//! Access rights on purchasable resources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{DiagnosisId, PurchaseId, Timestamp, UserId, ValidationError};

/// How much of a resource a user may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    None,
    Preview,
    Full,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::None => "none",
            AccessLevel::Preview => "preview",
            AccessLevel::Full => "full",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AccessLevel::None),
            "preview" => Ok(AccessLevel::Preview),
            "full" => Ok(AccessLevel::Full),
            other => Err(ValidationError::invalid_format(
                "access_level",
                format!("unknown access level '{}'", other),
            )),
        }
    }
}

/// Kind of resource an access right covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Diagnosis,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Diagnosis => "diagnosis",
        }
    }
}

impl FromStr for ResourceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diagnosis" => Ok(ResourceType::Diagnosis),
            other => Err(ValidationError::invalid_format(
                "resource_type",
                format!("unknown resource type '{}'", other),
            )),
        }
    }
}

/// Upsert conflict target: at most one access right per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AccessRightKey {
    pub user_id: UserId,
    pub resource_type: ResourceType,
    pub resource_id: DiagnosisId,
}

impl AccessRightKey {
    pub fn diagnosis(user_id: UserId, diagnosis_id: DiagnosisId) -> Self {
        Self {
            user_id,
            resource_type: ResourceType::Diagnosis,
            resource_id: diagnosis_id,
        }
    }
}

impl fmt::Display for AccessRightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.user_id,
            self.resource_type.as_str(),
            self.resource_id
        )
    }
}

/// A user's entitlement on one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessRight {
    pub key: AccessRightKey,
    pub access_level: AccessLevel,
    /// Purchase the current level derives from.
    pub purchase_id: Option<PurchaseId>,
    pub valid_from: Timestamp,
    /// `None` means permanent.
    pub valid_until: Option<Timestamp>,
}

impl AccessRight {
    /// Permanent full access backed by `purchase_id`.
    pub fn full(key: AccessRightKey, purchase_id: PurchaseId, now: Timestamp) -> Self {
        Self {
            key,
            access_level: AccessLevel::Full,
            purchase_id: Some(purchase_id),
            valid_from: now,
            valid_until: None,
        }
    }

    /// Downgraded access after the backing purchase was refunded.
    pub fn preview(key: AccessRightKey, purchase_id: PurchaseId, now: Timestamp) -> Self {
        Self {
            key,
            access_level: AccessLevel::Preview,
            purchase_id: Some(purchase_id),
            valid_from: now,
            valid_until: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.access_level == AccessLevel::Full
    }

    /// True if the row already grants full access through `purchase_id`.
    pub fn is_full_via(&self, purchase_id: &PurchaseId) -> bool {
        self.is_full() && self.purchase_id.as_ref() == Some(purchase_id)
    }

    /// Effective at `at`, honouring the validity window.
    pub fn is_active_at(&self, at: &Timestamp) -> bool {
        !at.is_before(&self.valid_from)
            && self.valid_until.map_or(true, |until| at.is_before(&until))
    }
}
