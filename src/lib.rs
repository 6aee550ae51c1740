// Partner Discount Engine - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod discount;
pub mod entities;
pub mod error;
pub mod logging;
pub mod report;
pub mod sales;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{
    Event, ImportSummary, PartnerImportRow, SalesHistoryEntry, SqliteStore,
    count_sales_records, get_events_for_entity, insert_event, insert_legal_addresses,
    insert_partners, insert_products, insert_sales_records, load_legal_addresses_csv,
    load_partners_csv, load_products_csv, load_sales_csv, open_database, setup_database,
    upsert_partner,
};
pub use discount::{discount_for, partner_discount, tier_for, DiscountTier, STANDARD_TIERS};
pub use entities::{LegalAddress, Partner, PartnerType, Product, SalesRecord, MAX_RATING};
pub use error::{DiscountError, Result, StorageError};
pub use report::{partner_discounts, DiscountReport, PartnerDiscount, TierSummary};
pub use sales::total_sales;
pub use store::{MemoryStore, PartnerStore, SalesHistoryStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
