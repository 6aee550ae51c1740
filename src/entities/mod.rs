// Entity Models
// Plain value records read from and written to the storage backends.
// None of them hold a connection or lazy relationship.

pub mod partner;
pub mod product;
pub mod sales_record;

pub use partner::{LegalAddress, Partner, PartnerType, MAX_RATING};
pub use product::Product;
pub use sales_record::SalesRecord;
