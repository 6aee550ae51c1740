// 📦 Product Entity

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,

    #[serde(default)]
    pub product_type_id: Option<i64>,

    pub name: String,

    /// Minimum price for partners, kept as entered
    #[serde(default)]
    pub min_partner_price: String,
}

impl Product {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Product {
            id,
            product_type_id: None,
            name: name.into(),
            min_partner_price: String::new(),
        }
    }
}
