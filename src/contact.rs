//! Customer contact details

use serde::Deserialize;

/// Who a booking or order belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,

    #[serde(default)]
    pub phone: Option<String>,
}

impl CustomerInfo {
    /// Create contact details without a phone number.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: None,
        }
    }
}
