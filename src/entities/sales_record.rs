// 🧾 Sales Record - one sale of a product quantity to a partner
//
// Quantity is kept exactly as stored (text, possibly NULL). Parsing happens
// at aggregation time so a bad row is reported with its identifiers instead
// of being rejected silently at load time.

use crate::error::{DiscountError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub partner_id: i64,
    pub product_id: i64,

    /// Raw quantity text; expected to be a base-10 non-negative integer
    #[serde(default)]
    pub quantity: Option<String>,

    #[serde(default)]
    pub sale_date: Option<NaiveDate>,

    /// File the row was imported from; `None` for rows built in code
    #[serde(skip)]
    pub source_file: Option<String>,

    /// 1-based line within `source_file`
    #[serde(skip)]
    pub line_number: Option<u64>,
}

impl SalesRecord {
    pub fn new(partner_id: i64, product_id: i64, quantity: impl Into<String>) -> Self {
        SalesRecord {
            partner_id,
            product_id,
            quantity: Some(quantity.into()),
            sale_date: None,
            source_file: None,
            line_number: None,
        }
    }

    pub fn with_sale_date(mut self, sale_date: NaiveDate) -> Self {
        self.sale_date = Some(sale_date);
        self
    }

    pub fn with_source(mut self, source_file: impl Into<String>, line_number: u64) -> Self {
        self.source_file = Some(source_file.into());
        self.line_number = Some(line_number);
        self
    }

    /// Parse the stored quantity.
    ///
    /// Accepts ASCII digits with optional surrounding whitespace. Signs,
    /// decimal points, digit separators, empty and NULL values are all
    /// `DiscountError::MalformedRecord`.
    pub fn parsed_quantity(&self) -> Result<i64> {
        let malformed = || DiscountError::MalformedRecord {
            partner_id: self.partner_id,
            product_id: self.product_id,
            quantity: self.quantity.clone(),
        };

        let raw = self.quantity.as_deref().ok_or_else(malformed)?.trim();

        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }

        // Digits only, so the only possible failure left is overflow
        raw.parse::<i64>().map_err(|_| malformed())
    }

    /// Hash of the row's origin (file and line), used to skip a row that
    /// was already imported.
    ///
    /// Content is not hashed: identical sales on different lines are
    /// distinct sales. Rows without an origin have no hash and are always
    /// inserted.
    pub fn compute_idempotency_hash(&self) -> Option<String> {
        let source_file = self.source_file.as_deref()?;
        let line_number = self.line_number?;

        let mut hasher = Sha256::new();
        hasher.update(format!("{}|{}", source_file, line_number));
        Some(format!("{:x}", hasher.finalize()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(quantity: Option<&str>) -> SalesRecord {
        SalesRecord {
            partner_id: 1,
            product_id: 2,
            quantity: quantity.map(|q| q.to_string()),
            sale_date: None,
            source_file: None,
            line_number: None,
        }
    }

    #[test]
    fn test_parse_plain_integer() {
        assert_eq!(record(Some("15500")).parsed_quantity().unwrap(), 15500);
        assert_eq!(record(Some("0")).parsed_quantity().unwrap(), 0);
    }

    #[test]
    fn test_parse_tolerates_surrounding_whitespace() {
        assert_eq!(record(Some(" 250 ")).parsed_quantity().unwrap(), 250);
        assert_eq!(record(Some("42\n")).parsed_quantity().unwrap(), 42);
    }

    #[test]
    fn test_parse_rejects_non_integer_forms() {
        for bad in ["abc", "", "   ", "-5", "+5", "12.5", "1 000", "1_000", "1e3"] {
            let result = record(Some(bad)).parsed_quantity();
            assert!(
                matches!(result, Err(DiscountError::MalformedRecord { .. })),
                "{:?} should be malformed",
                bad
            );
        }
    }

    #[test]
    fn test_parse_missing_quantity() {
        match record(None).parsed_quantity() {
            Err(DiscountError::MalformedRecord {
                partner_id,
                product_id,
                quantity,
            }) => {
                assert_eq!(partner_id, 1);
                assert_eq!(product_id, 2);
                assert!(quantity.is_none());
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_overflow_is_malformed() {
        let result = record(Some("99999999999999999999")).parsed_quantity();
        assert!(matches!(result, Err(DiscountError::MalformedRecord { .. })));
    }

    #[test]
    fn test_idempotency_hash_follows_origin_not_content() {
        let date = NaiveDate::from_ymd_opt(2023, 3, 23).unwrap();
        let first = SalesRecord::new(1, 2, "100")
            .with_sale_date(date)
            .with_source("sales.csv", 2);
        let same_line = SalesRecord::new(1, 2, "100")
            .with_sale_date(date)
            .with_source("sales.csv", 2);
        let next_line = SalesRecord::new(1, 2, "100")
            .with_sale_date(date)
            .with_source("sales.csv", 3);

        let hash = first.compute_idempotency_hash().unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(same_line.compute_idempotency_hash(), Some(hash.clone()));
        assert_ne!(next_line.compute_idempotency_hash(), Some(hash));
    }

    #[test]
    fn test_record_without_origin_has_no_hash() {
        let record = SalesRecord::new(1, 2, "100");
        assert_eq!(record.compute_idempotency_hash(), None);
    }
}
