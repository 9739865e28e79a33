//! Delivery address model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A delivery address owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    /// Short name such as "Home" or "Site office"
    pub label: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    /// Six-digit postal code
    pub pincode: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAddressInput {
    pub label: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub is_default: bool,
}

/// Partial update, `None` leaves the field unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateAddressInput {
    pub label: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub is_default: Option<bool>,
}

impl UpdateAddressInput {
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.line1.is_none()
            && self.line2.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.pincode.is_none()
            && self.is_default.is_none()
    }

    /// Apply the present fields to an existing address
    pub fn apply_to(&self, address: &mut Address) {
        if let Some(label) = &self.label {
            address.label = label.clone();
        }
        if let Some(line1) = &self.line1 {
            address.line1 = line1.clone();
        }
        if let Some(line2) = &self.line2 {
            address.line2 = Some(line2.clone());
        }
        if let Some(city) = &self.city {
            address.city = city.clone();
        }
        if let Some(state) = &self.state {
            address.state = state.clone();
        }
        if let Some(pincode) = &self.pincode {
            address.pincode = pincode.clone();
        }
        if let Some(is_default) = self.is_default {
            address.is_default = is_default;
        }
    }
}
