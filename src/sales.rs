// 📊 Sales Aggregator
// Sums a partner's full sales history on every call; nothing is cached.

use crate::error::{DiscountError, Result};
use crate::store::SalesHistoryStore;
use tracing::{debug, warn};

/// Total quantity sold to `partner_id` across its whole history.
///
/// An unknown partner has no rows and therefore a total of 0. The first
/// record whose quantity does not parse aborts the sum with
/// `DiscountError::MalformedRecord`; no partial total is returned.
/// Storage failures pass through as `DiscountError::Storage`.
pub fn total_sales<S: SalesHistoryStore + ?Sized>(store: &S, partner_id: i64) -> Result<i64> {
    let records = store.find_sales_history(partner_id)?;

    let mut total: i64 = 0;
    for record in &records {
        let quantity = record.parsed_quantity().inspect_err(|err| {
            warn!(partner_id, product_id = record.product_id, "{}", err);
        })?;

        total = total
            .checked_add(quantity)
            .ok_or(DiscountError::SalesOverflow { partner_id })?;
    }

    debug!(partner_id, records = records.len(), total, "aggregated sales history");
    Ok(total)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::SalesRecord;
    use crate::error::StorageError;
    use crate::store::{MemoryStore, StoreResult};

    fn store_with(partner_id: i64, quantities: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for (i, quantity) in quantities.iter().enumerate() {
            store
                .add_sale(SalesRecord::new(partner_id, i as i64 + 1, *quantity))
                .unwrap();
        }
        store
    }

    struct FailingStore;

    impl SalesHistoryStore for FailingStore {
        fn find_sales_history(&self, _partner_id: i64) -> StoreResult<Vec<SalesRecord>> {
            Err(StorageError::Poisoned("connection lost".to_string()))
        }
    }

    #[test]
    fn test_no_history_is_zero() {
        let store = MemoryStore::new();
        assert_eq!(total_sales(&store, 1).unwrap(), 0);
    }

    #[test]
    fn test_sums_all_records() {
        let store = store_with(1, &["100", "250", "5"]);
        assert_eq!(total_sales(&store, 1).unwrap(), 355);
    }

    #[test]
    fn test_ignores_other_partners() {
        let store = store_with(1, &["100", "250"]);
        store.add_sale(SalesRecord::new(2, 1, "99999")).unwrap();

        assert_eq!(total_sales(&store, 1).unwrap(), 350);
        assert_eq!(total_sales(&store, 2).unwrap(), 99999);
    }

    #[test]
    fn test_malformed_quantity_aborts() {
        let store = store_with(1, &["abc"]);

        match total_sales(&store, 1) {
            Err(DiscountError::MalformedRecord {
                partner_id,
                product_id,
                quantity,
            }) => {
                assert_eq!(partner_id, 1);
                assert_eq!(product_id, 1);
                assert_eq!(quantity.as_deref(), Some("abc"));
            }
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_among_valid_returns_no_partial_sum() {
        let store = store_with(1, &["100", "n/a", "5"]);

        let result = total_sales(&store, 1);
        assert!(matches!(
            result,
            Err(DiscountError::MalformedRecord { product_id: 2, .. })
        ));
    }

    #[test]
    fn test_missing_quantity_is_malformed() {
        let store = MemoryStore::new();
        store
            .add_sale(SalesRecord {
                partner_id: 4,
                product_id: 9,
                quantity: None,
                ..SalesRecord::new(4, 9, "")
            })
            .unwrap();

        assert!(matches!(
            total_sales(&store, 4),
            Err(DiscountError::MalformedRecord { partner_id: 4, product_id: 9, .. })
        ));
    }

    #[test]
    fn test_overflow_is_reported() {
        let max = i64::MAX.to_string();
        let store = store_with(1, &[max.as_str(), "1"]);

        assert!(matches!(
            total_sales(&store, 1),
            Err(DiscountError::SalesOverflow { partner_id: 1 })
        ));
    }

    #[test]
    fn test_storage_failure_propagates() {
        let result = total_sales(&FailingStore, 1);

        match result {
            Err(DiscountError::Storage(StorageError::Poisoned(msg))) => {
                assert_eq!(msg, "connection lost");
            }
            other => panic!("expected Storage error, got {:?}", other),
        }
    }
}
