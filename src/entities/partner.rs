// 🤝 Partner Entity - customers buying the factory's products
//
// A partner's discount is never stored here: it is derived on demand from
// the sales history (see `crate::sales` and `crate::discount`).

use crate::error::{DiscountError, Result};
use serde::{Deserialize, Serialize};

/// Highest rating a partner can be given
pub const MAX_RATING: u8 = 10;

// ============================================================================
// PARTNER TYPE
// ============================================================================

/// Legal form of a partner (e.g. "ООО", "ЗАО", "ИП")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerType {
    pub id: i64,
    pub name: String,
}

// ============================================================================
// LEGAL ADDRESS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalAddress {
    pub id: i64,
    pub postal_index: String,
    pub region: String,
    pub city: String,
    pub street: String,
    pub house: String,
}

impl LegalAddress {
    /// Single-line form used in partner listings: "city, street, house"
    pub fn short_form(&self) -> String {
        format!("{}, {}, {}", self.city, self.street, self.house)
    }
}

// ============================================================================
// PARTNER ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: i64,

    #[serde(default)]
    pub partner_type_id: Option<i64>,

    pub name: String,

    #[serde(default)]
    pub legal_address_id: Option<i64>,

    /// Taxpayer identification number (INN)
    #[serde(default)]
    pub inn: String,

    #[serde(default)]
    pub director: String,

    #[serde(default)]
    pub phone: String,

    #[serde(default)]
    pub email: String,

    /// 0..=10, enforced by `set_rating` and `validate`
    #[serde(default)]
    pub rating: u8,

    #[serde(default)]
    pub sales_places: String,
}

impl Partner {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Partner {
            id,
            partner_type_id: None,
            name: name.into(),
            legal_address_id: None,
            inn: String::new(),
            director: String::new(),
            phone: String::new(),
            email: String::new(),
            rating: 0,
            sales_places: String::new(),
        }
    }

    pub fn set_rating(&mut self, rating: u8) -> Result<()> {
        if rating > MAX_RATING {
            return Err(DiscountError::invalid_argument(format!(
                "partner rating must be between 0 and {}, got {}",
                MAX_RATING, rating
            )));
        }
        self.rating = rating;
        Ok(())
    }

    /// Check invariants on a partner built outside `set_rating` (CSV rows, DB rows)
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DiscountError::invalid_argument(format!(
                "partner {} has an empty name",
                self.id
            )));
        }
        if self.rating > MAX_RATING {
            return Err(DiscountError::invalid_argument(format!(
                "partner {} rating {} exceeds {}",
                self.id, self.rating, MAX_RATING
            )));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
