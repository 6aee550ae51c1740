// ⚠️ Error taxonomy for the discount engine
// Data faults, caller contract violations and storage failures stay distinct

use thiserror::Error;

/// Failures raised by a storage backend.
///
/// The core never translates these; they reach the caller as
/// `DiscountError::Storage` with the backend error as the source.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned: {0}")]
    Poisoned(String),
}

#[derive(Error, Debug)]
pub enum DiscountError {
    /// A sales record whose quantity is not a non-negative base-10 integer
    #[error(
        "Malformed sales record (partner {partner_id}, product {product_id}): quantity {quantity:?} is not a non-negative integer"
    )]
    MalformedRecord {
        partner_id: i64,
        product_id: i64,
        /// Raw stored value; `None` when the column is NULL
        quantity: Option<String>,
    },

    #[error("Total sales for partner {partner_id} overflowed")]
    SalesOverflow { partner_id: i64 },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DiscountError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        DiscountError::InvalidArgument {
            message: message.into(),
        }
    }

    /// True when the failure comes from stored data rather than the caller or the backend
    pub fn is_data_fault(&self) -> bool {
        matches!(
            self,
            DiscountError::MalformedRecord { .. } | DiscountError::SalesOverflow { .. }
        )
    }
}

impl From<rusqlite::Error> for DiscountError {
    fn from(err: rusqlite::Error) -> Self {
        DiscountError::Storage(StorageError::Sqlite(err))
    }
}

pub type Result<T> = std::result::Result<T, DiscountError>;
