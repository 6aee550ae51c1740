// 📋 Partner Discount Report
// One row per partner with its current volume and discount, plus a per-tier summary.

use crate::discount::{tier_for, STANDARD_TIERS};
use crate::error::{Result, StorageError};
use crate::sales::total_sales;
use crate::store::{PartnerStore, SalesHistoryStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use tracing::info;

/// A partner card: who the partner is and what discount it earns today
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerDiscount {
    pub partner_id: i64,
    pub name: String,
    pub partner_type: Option<String>,
    /// Legal address as "city, street, house"
    pub address: Option<String>,
    pub director: String,
    pub phone: String,
    pub rating: u8,
    pub total_sales: i64,
    pub discount_percent: u8,
}

/// Discount line for every partner, ordered by partner id.
///
/// Fails on the first partner whose history cannot be aggregated; the
/// error names that partner's offending record.
pub fn partner_discounts<S>(store: &S) -> Result<Vec<PartnerDiscount>>
where
    S: PartnerStore + SalesHistoryStore + ?Sized,
{
    let partners = store.list_partners()?;
    let mut rows = Vec::with_capacity(partners.len());

    for partner in partners {
        let total = total_sales(store, partner.id)?;
        let tier = tier_for(total)?;

        let partner_type = match partner.partner_type_id {
            Some(type_id) => store.partner_type_name(type_id)?,
            None => None,
        };

        let address = match partner.legal_address_id {
            Some(address_id) => store.legal_address(address_id)?.map(|a| a.short_form()),
            None => None,
        };

        rows.push(PartnerDiscount {
            partner_id: partner.id,
            name: partner.name,
            partner_type,
            address,
            director: partner.director,
            phone: partner.phone,
            rating: partner.rating,
            total_sales: total,
            discount_percent: tier.percent,
        });
    }

    Ok(rows)
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierSummary {
    pub range: String,
    pub discount_percent: u8,
    pub partner_count: usize,
    pub total_sales: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscountReport {
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<PartnerDiscount>,
}

impl DiscountReport {
    pub fn build<S>(store: &S) -> Result<Self>
    where
        S: PartnerStore + SalesHistoryStore + ?Sized,
    {
        let rows = partner_discounts(store)?;
        info!(partners = rows.len(), "built discount report");

        Ok(DiscountReport {
            generated_at: Utc::now(),
            rows,
        })
    }

    /// Partner count and volume per tier, in tier order (empty tiers included)
    pub fn tier_summary(&self) -> Vec<TierSummary> {
        STANDARD_TIERS
            .iter()
            .map(|tier| {
                let in_tier: Vec<&PartnerDiscount> = self
                    .rows
                    .iter()
                    .filter(|row| tier.contains(row.total_sales))
                    .collect();

                TierSummary {
                    range: tier.range_label(),
                    discount_percent: tier.percent,
                    partner_count: in_tier.len(),
                    total_sales: in_tier.iter().map(|row| row.total_sales).sum(),
                }
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        let discounted = self.rows.iter().filter(|r| r.discount_percent > 0).count();
        format!(
            "{} partners, {} with a discount (generated {})",
            self.rows.len(),
            discounted,
            self.generated_at.format("%Y-%m-%d %H:%M")
        )
    }

    /// Write the rows as CSV (header included)
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        for row in &self.rows {
            wtr.serialize(row).map_err(StorageError::from)?;
        }
        wtr.flush().map_err(StorageError::from)?;

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{LegalAddress, Partner, SalesRecord};
    use crate::error::DiscountError;
    use crate::store::MemoryStore;

    fn sample_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_partner_type(1, "ЗАО").unwrap();
        store
            .add_legal_address(LegalAddress {
                id: 4,
                postal_index: "164500".to_string(),
                region: "Архангельская область".to_string(),
                city: "Северодвинск".to_string(),
                street: "ул. Строителей".to_string(),
                house: "18".to_string(),
            })
            .unwrap();

        let mut partner = Partner::new(1, "База Строитель");
        partner.partner_type_id = Some(1);
        partner.legal_address_id = Some(4);
        partner.set_rating(7).unwrap();
        store.add_partner(partner).unwrap();
        store.add_partner(Partner::new(2, "Паркет 29")).unwrap();
        store.add_partner(Partner::new(3, "Стройсервис")).unwrap();

        store.add_sale(SalesRecord::new(1, 1, "15500")).unwrap();
        store.add_sale(SalesRecord::new(1, 2, "12350")).unwrap();
        store.add_sale(SalesRecord::new(2, 1, "300000")).unwrap();
        store
    }

    #[test]
    fn test_partner_discounts_rows() {
        let rows = partner_discounts(&sample_store()).unwrap();

        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].partner_id, 1);
        assert_eq!(rows[0].partner_type.as_deref(), Some("ЗАО"));
        assert_eq!(rows[0].total_sales, 27850);
        assert_eq!(rows[0].discount_percent, 5);
        assert_eq!(rows[0].rating, 7);
        assert_eq!(
            rows[0].address.as_deref(),
            Some("Северодвинск, ул. Строителей, 18")
        );

        assert_eq!(rows[1].discount_percent, 15);
        assert_eq!(rows[2].total_sales, 0);
        assert_eq!(rows[2].discount_percent, 0);
        assert_eq!(rows[2].partner_type, None);
        assert_eq!(rows[2].address, None);
    }

    #[test]
    fn test_partner_discounts_fails_on_malformed_history() {
        let store = sample_store();
        store.add_sale(SalesRecord::new(3, 1, "many")).unwrap();

        let result = partner_discounts(&store);
        assert!(matches!(
            result,
            Err(DiscountError::MalformedRecord { partner_id: 3, .. })
        ));
    }

    #[test]
    fn test_tier_summary_counts() {
        let report = DiscountReport::build(&sample_store()).unwrap();
        let summary = report.tier_summary();

        assert_eq!(summary.len(), 4);
        assert_eq!(summary[0].partner_count, 1);
        assert_eq!(summary[1].partner_count, 1);
        assert_eq!(summary[1].total_sales, 27850);
        assert_eq!(summary[2].partner_count, 0);
        assert_eq!(summary[3].partner_count, 1);
        assert_eq!(summary[3].range, "[300000, ∞)");

        assert!(report.summary().starts_with("3 partners, 2 with a discount"));
    }

    #[test]
    fn test_write_csv() {
        let report = DiscountReport::build(&sample_store()).unwrap();
        let mut buffer = Vec::new();

        report.write_csv(&mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "partner_id,name,partner_type,address,director,phone,rating,total_sales,discount_percent"
        );
        assert_eq!(
            lines[1],
            "1,База Строитель,ЗАО,\"Северодвинск, ул. Строителей, 18\",,,7,27850,5"
        );
        assert_eq!(lines.len(), 4);
    }
}
