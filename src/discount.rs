// 🏷️ Discount Classifier - volume tiers as data
// Maps a partner's total sales volume to a discount percentage.

use crate::error::{DiscountError, Result};
use crate::sales::total_sales;
use crate::store::SalesHistoryStore;
use serde::Serialize;

// ============================================================================
// TIER DEFINITION
// ============================================================================

/// One half-open band `[lower_bound, upper_bound)` of total sales volume.
/// `upper_bound == None` means the band is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscountTier {
    pub lower_bound: i64,
    pub upper_bound: Option<i64>,
    pub percent: u8,
}

impl DiscountTier {
    pub fn contains(&self, total_sales: i64) -> bool {
        total_sales >= self.lower_bound && self.upper_bound.map_or(true, |upper| total_sales < upper)
    }

    /// Human-readable band, e.g. "[10000, 50000)" or "[300000, ∞)"
    pub fn range_label(&self) -> String {
        match self.upper_bound {
            Some(upper) => format!("[{}, {})", self.lower_bound, upper),
            None => format!("[{}, ∞)", self.lower_bound),
        }
    }
}

/// The fixed volume bands, ordered bottom-up.
pub static STANDARD_TIERS: [DiscountTier; 4] = [
    DiscountTier {
        lower_bound: 0,
        upper_bound: Some(10_000),
        percent: 0,
    },
    DiscountTier {
        lower_bound: 10_000,
        upper_bound: Some(50_000),
        percent: 5,
    },
    DiscountTier {
        lower_bound: 50_000,
        upper_bound: Some(300_000),
        percent: 10,
    },
    DiscountTier {
        lower_bound: 300_000,
        upper_bound: None,
        percent: 15,
    },
];

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Band containing `total_sales`. Bands are checked bottom-up and the first
/// match wins, so a boundary value lands in the upper band.
pub fn tier_for(total_sales: i64) -> Result<&'static DiscountTier> {
    if total_sales < 0 {
        return Err(DiscountError::invalid_argument(format!(
            "total sales must be non-negative, got {}",
            total_sales
        )));
    }

    STANDARD_TIERS
        .iter()
        .find(|tier| tier.contains(total_sales))
        .ok_or_else(|| {
            DiscountError::invalid_argument(format!("no discount tier covers {}", total_sales))
        })
}

/// Discount percentage (0, 5, 10 or 15) for a total sales volume
pub fn discount_for(total_sales: i64) -> Result<u8> {
    tier_for(total_sales).map(|tier| tier.percent)
}

/// Discount a partner currently earns, recomputed from its full history
pub fn partner_discount<S: SalesHistoryStore + ?Sized>(store: &S, partner_id: i64) -> Result<u8> {
    discount_for(total_sales(store, partner_id)?)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::SalesRecord;
    use crate::store::MemoryStore;

    #[test]
    fn test_boundary_values() {
        assert_eq!(discount_for(0).unwrap(), 0);
        assert_eq!(discount_for(9_999).unwrap(), 0);
        assert_eq!(discount_for(10_000).unwrap(), 5);
        assert_eq!(discount_for(49_999).unwrap(), 5);
        assert_eq!(discount_for(50_000).unwrap(), 10);
        assert_eq!(discount_for(299_999).unwrap(), 10);
        assert_eq!(discount_for(300_000).unwrap(), 15);
        assert_eq!(discount_for(i64::MAX).unwrap(), 15);
    }

    #[test]
    fn test_negative_total_is_rejected() {
        assert!(matches!(
            discount_for(-1),
            Err(DiscountError::InvalidArgument { .. })
        ));
        assert!(matches!(
            discount_for(i64::MIN),
            Err(DiscountError::InvalidArgument { .. })
        ));
        assert!(tier_for(-300_000).is_err());
    }

    #[test]
    fn test_discount_is_monotonic() {
        let mut samples: Vec<i64> = (0..400_000).step_by(997).collect();
        for tier in STANDARD_TIERS.iter() {
            samples.extend([tier.lower_bound - 1, tier.lower_bound, tier.lower_bound + 1]);
        }
        samples.retain(|t| *t >= 0);
        samples.sort_unstable();

        let discounts: Vec<u8> = samples.iter().map(|t| discount_for(*t).unwrap()).collect();
        assert!(
            discounts.windows(2).all(|w| w[0] <= w[1]),
            "Discount must never decrease as sales grow"
        );
    }

    #[test]
    fn test_tiers_are_contiguous() {
        assert_eq!(STANDARD_TIERS[0].lower_bound, 0);
        for pair in STANDARD_TIERS.windows(2) {
            assert_eq!(pair[0].upper_bound, Some(pair[1].lower_bound));
        }
        assert_eq!(STANDARD_TIERS[STANDARD_TIERS.len() - 1].upper_bound, None);
    }

    #[test]
    fn test_tier_for_and_labels() {
        let tier = tier_for(75_000).unwrap();
        assert_eq!(tier.percent, 10);
        assert_eq!(tier.range_label(), "[50000, 300000)");

        assert_eq!(tier_for(300_000).unwrap().range_label(), "[300000, ∞)");
    }

    #[test]
    fn test_partner_discount_end_to_end() {
        let store = MemoryStore::new();
        for (product_id, quantity) in [(1, "30000"), (2, "25000"), (3, "20000")] {
            store.add_sale(SalesRecord::new(7, product_id, quantity)).unwrap();
        }

        assert_eq!(total_sales(&store, 7).unwrap(), 75_000);
        assert_eq!(partner_discount(&store, 7).unwrap(), 10);
    }

    #[test]
    fn test_partner_discount_unknown_partner() {
        let store = MemoryStore::new();
        assert_eq!(partner_discount(&store, 404).unwrap(), 0);
    }

    #[test]
    fn test_partner_discount_propagates_malformed_record() {
        let store = MemoryStore::new();
        store.add_sale(SalesRecord::new(1, 1, "400000")).unwrap();
        store.add_sale(SalesRecord::new(1, 2, "abc")).unwrap();

        assert!(matches!(
            partner_discount(&store, 1),
            Err(DiscountError::MalformedRecord { .. })
        ));
    }
}
