// 🗃️ Storage collaborator interfaces
// The discount engine depends on these traits only; each backend implements them.

use crate::entities::{LegalAddress, Partner, PartnerType, SalesRecord};
use crate::error::StorageError;
use std::sync::{Arc, RwLock};

pub type StoreResult<T> = std::result::Result<T, StorageError>;

/// Source of sales history rows
pub trait SalesHistoryStore {
    /// Every record attributed to `partner_id`, unordered and unfiltered.
    /// An unknown partner yields an empty list.
    fn find_sales_history(&self, partner_id: i64) -> StoreResult<Vec<SalesRecord>>;
}

/// Partner lookups needed by callers of the engine (listings, reports)
pub trait PartnerStore {
    fn list_partners(&self) -> StoreResult<Vec<Partner>>;

    fn find_partner(&self, partner_id: i64) -> StoreResult<Option<Partner>>;

    /// Display name of a partner type, if the backend knows it
    fn partner_type_name(&self, _partner_type_id: i64) -> StoreResult<Option<String>> {
        Ok(None)
    }

    /// Registered legal address, if the backend keeps addresses
    fn legal_address(&self, _address_id: i64) -> StoreResult<Option<LegalAddress>> {
        Ok(None)
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-process backend, for tests and for embedding without SQLite.
///
/// Clones share the same underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    partners: Arc<RwLock<Vec<Partner>>>,
    partner_types: Arc<RwLock<Vec<PartnerType>>>,
    addresses: Arc<RwLock<Vec<LegalAddress>>>,
    sales: Arc<RwLock<Vec<SalesRecord>>>,
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Poisoned("memory store".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a partner by id
    pub fn add_partner(&self, partner: Partner) -> StoreResult<()> {
        let mut partners = self.partners.write().map_err(poisoned)?;
        partners.retain(|p| p.id != partner.id);
        partners.push(partner);
        Ok(())
    }

    pub fn add_partner_type(&self, id: i64, name: impl Into<String>) -> StoreResult<()> {
        let mut types = self.partner_types.write().map_err(poisoned)?;
        types.retain(|t| t.id != id);
        types.push(PartnerType {
            id,
            name: name.into(),
        });
        Ok(())
    }

    pub fn add_legal_address(&self, address: LegalAddress) -> StoreResult<()> {
        let mut addresses = self.addresses.write().map_err(poisoned)?;
        addresses.retain(|a| a.id != address.id);
        addresses.push(address);
        Ok(())
    }

    pub fn add_sale(&self, record: SalesRecord) -> StoreResult<()> {
        self.sales.write().map_err(poisoned)?.push(record);
        Ok(())
    }
}

impl SalesHistoryStore for MemoryStore {
    fn find_sales_history(&self, partner_id: i64) -> StoreResult<Vec<SalesRecord>> {
        let sales = self.sales.read().map_err(poisoned)?;
        Ok(sales
            .iter()
            .filter(|r| r.partner_id == partner_id)
            .cloned()
            .collect())
    }
}

impl PartnerStore for MemoryStore {
    fn list_partners(&self) -> StoreResult<Vec<Partner>> {
        let mut partners = self.partners.read().map_err(poisoned)?.clone();
        partners.sort_by_key(|p| p.id);
        Ok(partners)
    }

    fn find_partner(&self, partner_id: i64) -> StoreResult<Option<Partner>> {
        let partners = self.partners.read().map_err(poisoned)?;
        Ok(partners.iter().find(|p| p.id == partner_id).cloned())
    }

    fn partner_type_name(&self, partner_type_id: i64) -> StoreResult<Option<String>> {
        let types = self.partner_types.read().map_err(poisoned)?;
        Ok(types
            .iter()
            .find(|t| t.id == partner_type_id)
            .map(|t| t.name.clone()))
    }

    fn legal_address(&self, address_id: i64) -> StoreResult<Option<LegalAddress>> {
        let addresses = self.addresses.read().map_err(poisoned)?;
        Ok(addresses.iter().find(|a| a.id == address_id).cloned())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_sales_history_filters_by_partner() {
        let store = MemoryStore::new();
        store.add_sale(SalesRecord::new(1, 10, "100")).unwrap();
        store.add_sale(SalesRecord::new(2, 10, "200")).unwrap();
        store.add_sale(SalesRecord::new(1, 11, "300")).unwrap();

        let history = store.find_sales_history(1).unwrap();

        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.partner_id == 1));
        assert!(store.find_sales_history(99).unwrap().is_empty());
    }

    #[test]
    fn test_add_partner_replaces_same_id() {
        let store = MemoryStore::new();
        store.add_partner(Partner::new(1, "Old name")).unwrap();
        store.add_partner(Partner::new(1, "New name")).unwrap();

        let partners = store.list_partners().unwrap();
        assert_eq!(partners.len(), 1);
        assert_eq!(partners[0].name, "New name");
    }

    #[test]
    fn test_list_partners_sorted_by_id() {
        let store = MemoryStore::new();
        store.add_partner(Partner::new(3, "C")).unwrap();
        store.add_partner(Partner::new(1, "A")).unwrap();
        store.add_partner(Partner::new(2, "B")).unwrap();

        let ids: Vec<i64> = store.list_partners().unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_clones_share_data() {
        let store = MemoryStore::new();
        let handle = store.clone();
        handle.add_sale(SalesRecord::new(1, 1, "5")).unwrap();

        assert_eq!(store.find_sales_history(1).unwrap().len(), 1);
    }

    #[test]
    fn test_partner_type_name_lookup() {
        let store = MemoryStore::new();
        store.add_partner_type(1, "ООО").unwrap();

        assert_eq!(store.partner_type_name(1).unwrap(), Some("ООО".to_string()));
        assert_eq!(store.partner_type_name(2).unwrap(), None);
    }

    #[test]
    fn test_legal_address_lookup() {
        let store = MemoryStore::new();
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

        let address = store.legal_address(4).unwrap().unwrap();
        assert_eq!(address.short_form(), "Северодвинск, ул. Строителей, 18");
        assert_eq!(store.legal_address(5).unwrap(), None);
    }
}
