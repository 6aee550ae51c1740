use crate::entities::{LegalAddress, Partner, Product, SalesRecord};
use crate::error::{Result, StorageError};
use crate::store::{PartnerStore, SalesHistoryStore, StoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Audit entry written by the importers.
///
/// Sales are filed under their partner (`entity_type = "partner"`), so a
/// partner's trail shows both its own imports and every sale recorded for it.
/// Addresses are filed under `"legal_address"`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    /// "partner_imported", "sale_recorded" or "address_imported"
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    /// What the importer wrote, as JSON
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: impl ToString,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Actor recorded on events written by the CSV imports
const CSV_IMPORTER: &str = "csv_importer";

/// Outcome of a bulk import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Partner row as it appears in an import CSV; the type is given by name
#[derive(Debug, Clone, Deserialize)]
pub struct PartnerImportRow {
    pub id: i64,
    #[serde(default)]
    pub partner_type: String,
    pub name: String,
    #[serde(default)]
    pub legal_address_id: Option<i64>,
    #[serde(default)]
    pub inn: String,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    /// Empty or missing means unrated (0)
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub sales_places: String,
}

/// One line of the sales history screen: names instead of ids
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesHistoryEntry {
    pub partner_id: i64,
    pub partner_name: String,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: Option<String>,
    pub sale_date: Option<NaiveDate>,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Sales must point at a known partner and product
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS partner_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS legal_addresses (
            id INTEGER PRIMARY KEY,
            postal_index TEXT NOT NULL,
            region TEXT NOT NULL,
            city TEXT NOT NULL,
            street TEXT NOT NULL,
            house TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS partners (
            id INTEGER PRIMARY KEY,
            partner_type_id INTEGER REFERENCES partner_types(id),
            name TEXT NOT NULL,
            legal_address_id INTEGER REFERENCES legal_addresses(id),
            inn TEXT NOT NULL DEFAULT '',
            director TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            rating INTEGER NOT NULL DEFAULT 0,
            sales_places TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY,
            product_type_id INTEGER,
            name TEXT NOT NULL,
            min_partner_price TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    // Quantity stays TEXT: the aggregator decides what a valid quantity is.
    // idempotency_hash is NULL for rows with no source file; UNIQUE ignores NULLs.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sales_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE,
            partner_id INTEGER NOT NULL REFERENCES partners(id),
            product_id INTEGER NOT NULL REFERENCES products(id),
            quantity TEXT,
            sale_date TEXT,
            source_file TEXT,
            line_number INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sales_partner ON sales_history(partner_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// CSV LOADING
// ============================================================================

fn load_csv<T: DeserializeOwned>(csv_path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(csv_path).map_err(StorageError::from)?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        rows.push(result.map_err(StorageError::from)?);
    }

    Ok(rows)
}

pub fn load_partners_csv(csv_path: &Path) -> Result<Vec<PartnerImportRow>> {
    load_csv(csv_path)
}

pub fn load_legal_addresses_csv(csv_path: &Path) -> Result<Vec<LegalAddress>> {
    load_csv(csv_path)
}

pub fn load_products_csv(csv_path: &Path) -> Result<Vec<Product>> {
    load_csv(csv_path)
}

/// Sales rows stamped with the file they came from and their line in it
pub fn load_sales_csv(csv_path: &Path) -> Result<Vec<SalesRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path).map_err(StorageError::from)?;
    let source_file = std::fs::canonicalize(csv_path)
        .map_err(StorageError::from)?
        .display()
        .to_string();
    let headers = rdr.headers().map_err(StorageError::from)?.clone();

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result.map_err(StorageError::from)?;
        let line_number = row.position().map_or(0, |pos| pos.line());
        let record: SalesRecord = row
            .deserialize(Some(&headers))
            .map_err(StorageError::from)?;

        records.push(record.with_source(source_file.as_str(), line_number));
    }

    Ok(records)
}

// ============================================================================
// WRITES
// ============================================================================

/// Id of the partner type called `name`, creating it if needed
pub fn ensure_partner_type(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO partner_types (name) VALUES (?1)",
        params![name],
    )?;

    let id = conn.query_row(
        "SELECT id FROM partner_types WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;

    Ok(id)
}

/// Insert or update legal addresses by id
pub fn insert_legal_addresses(conn: &Connection, addresses: &[LegalAddress]) -> Result<usize> {
    for address in addresses {
        conn.execute(
            "INSERT INTO legal_addresses (id, postal_index, region, city, street, house)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                postal_index = excluded.postal_index,
                region = excluded.region,
                city = excluded.city,
                street = excluded.street,
                house = excluded.house",
            params![
                address.id,
                address.postal_index,
                address.region,
                address.city,
                address.street,
                address.house,
            ],
        )?;

        let event = Event::new(
            "address_imported",
            "legal_address",
            address.id,
            serde_json::json!({ "address": address.short_form() }),
            CSV_IMPORTER,
        );
        insert_event(conn, &event)?;
    }

    info!(addresses = addresses.len(), "imported legal addresses");
    Ok(addresses.len())
}

/// Insert or update a partner by id
pub fn upsert_partner(conn: &Connection, partner: &Partner) -> Result<()> {
    partner.validate()?;

    conn.execute(
        "INSERT INTO partners (
            id, partner_type_id, name, legal_address_id, inn, director,
            phone, email, rating, sales_places
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(id) DO UPDATE SET
            partner_type_id = excluded.partner_type_id,
            name = excluded.name,
            legal_address_id = excluded.legal_address_id,
            inn = excluded.inn,
            director = excluded.director,
            phone = excluded.phone,
            email = excluded.email,
            rating = excluded.rating,
            sales_places = excluded.sales_places",
        params![
            partner.id,
            partner.partner_type_id,
            partner.name,
            partner.legal_address_id,
            partner.inn,
            partner.director,
            partner.phone,
            partner.email,
            partner.rating,
            partner.sales_places,
        ],
    )?;
    Ok(())
}

/// Import partners. A `legal_address_id` must already be imported.
pub fn insert_partners(conn: &Connection, rows: &[PartnerImportRow]) -> Result<usize> {
    let mut written = 0;

    for row in rows {
        let partner_type_id = if row.partner_type.trim().is_empty() {
            None
        } else {
            Some(ensure_partner_type(conn, row.partner_type.trim())?)
        };

        let partner = Partner {
            id: row.id,
            partner_type_id,
            name: row.name.clone(),
            legal_address_id: row.legal_address_id,
            inn: row.inn.clone(),
            director: row.director.clone(),
            phone: row.phone.clone(),
            email: row.email.clone(),
            rating: row.rating.unwrap_or(0),
            sales_places: row.sales_places.clone(),
        };
        upsert_partner(conn, &partner)?;
        written += 1;

        let event = Event::new(
            "partner_imported",
            "partner",
            partner.id,
            serde_json::json!({ "name": partner.name, "rating": partner.rating }),
            CSV_IMPORTER,
        );
        insert_event(conn, &event)?;
    }

    info!(partners = written, "imported partners");
    Ok(written)
}

pub fn insert_products(conn: &Connection, products: &[Product]) -> Result<usize> {
    for product in products {
        conn.execute(
            "INSERT INTO products (id, product_type_id, name, min_partner_price)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                product_type_id = excluded.product_type_id,
                name = excluded.name,
                min_partner_price = excluded.min_partner_price",
            params![
                product.id,
                product.product_type_id,
                product.name,
                product.min_partner_price,
            ],
        )?;
    }

    info!(products = products.len(), "imported products");
    Ok(products.len())
}

/// Insert sales history rows, skipping rows whose source line was already
/// imported.
///
/// Quantities are stored as given; unparsable ones are only warned about
/// here and reported as `MalformedRecord` when the partner is aggregated.
/// A row naming an unknown partner or product fails the import with a
/// storage error; rows before it stay inserted.
pub fn insert_sales_records(conn: &Connection, records: &[SalesRecord]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for record in records {
        if let Err(err) = record.parsed_quantity() {
            warn!("importing sales row with bad quantity: {}", err);
        }

        let changed = conn
            .execute(
                "INSERT INTO sales_history (
                    idempotency_hash, partner_id, product_id, quantity, sale_date,
                    source_file, line_number
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(idempotency_hash) DO NOTHING",
                params![
                    record.compute_idempotency_hash(),
                    record.partner_id,
                    record.product_id,
                    record.quantity,
                    record.sale_date.map(|d| d.to_string()),
                    record.source_file,
                    record.line_number,
                ],
            )
            .inspect_err(|e| {
                warn!(
                    partner_id = record.partner_id,
                    product_id = record.product_id,
                    line = ?record.line_number,
                    "sales row rejected: {}",
                    e
                )
            })?;

        if changed == 0 {
            summary.duplicates += 1;
            continue;
        }
        summary.inserted += 1;

        let event = Event::new(
            "sale_recorded",
            "partner",
            record.partner_id,
            serde_json::json!({
                "product_id": record.product_id,
                "quantity": record.quantity,
                "source_file": record.source_file,
                "line_number": record.line_number,
            }),
            CSV_IMPORTER,
        );
        insert_event(conn, &event)?;
    }

    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        "imported sales history"
    );
    Ok(summary)
}

/// Append an import event to the audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data).map_err(StorageError::from)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Audit trail of one partner (or address), newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

pub fn count_sales_records(conn: &Connection) -> Result<i64> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM sales_history", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// Read side of the SQLite backend, borrowing an open connection
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        SqliteStore { conn }
    }

    /// Sales history joined with partner and product names, oldest sale
    /// first. `None` lists every partner.
    pub fn sales_history_view(
        &self,
        partner_id: Option<i64>,
    ) -> StoreResult<Vec<SalesHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.partner_id, p.name, s.product_id, pr.name, s.quantity, s.sale_date
             FROM sales_history s
             JOIN partners p ON p.id = s.partner_id
             JOIN products pr ON pr.id = s.product_id
             WHERE ?1 IS NULL OR s.partner_id = ?1
             ORDER BY s.sale_date, s.id",
        )?;

        let entries = stmt
            .query_map(params![partner_id], |row| {
                Ok(SalesHistoryEntry {
                    partner_id: row.get(0)?,
                    partner_name: row.get(1)?,
                    product_id: row.get(2)?,
                    product_name: row.get(3)?,
                    quantity: quantity_from_row(row, 4)?,
                    sale_date: sale_date_from_row(row, 5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

/// Quantity column as text whatever storage class SQLite kept it in
fn quantity_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    })
}

/// Sale dates are written as `%Y-%m-%d`; anything else is a conversion error
fn sale_date_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;

    raw.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn partner_from_row(row: &Row<'_>) -> rusqlite::Result<Partner> {
    Ok(Partner {
        id: row.get(0)?,
        partner_type_id: row.get(1)?,
        name: row.get(2)?,
        legal_address_id: row.get(3)?,
        inn: row.get(4)?,
        director: row.get(5)?,
        phone: row.get(6)?,
        email: row.get(7)?,
        rating: row.get(8)?,
        sales_places: row.get(9)?,
    })
}

const PARTNER_COLUMNS: &str = "id, partner_type_id, name, legal_address_id, inn, director,
                               phone, email, rating, sales_places";

impl SalesHistoryStore for SqliteStore<'_> {
    fn find_sales_history(&self, partner_id: i64) -> StoreResult<Vec<SalesRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT partner_id, product_id, quantity, sale_date, source_file, line_number
             FROM sales_history
             WHERE partner_id = ?1",
        )?;

        let records = stmt
            .query_map(params![partner_id], |row| {
                Ok(SalesRecord {
                    partner_id: row.get(0)?,
                    product_id: row.get(1)?,
                    quantity: quantity_from_row(row, 2)?,
                    sale_date: sale_date_from_row(row, 3)?,
                    source_file: row.get(4)?,
                    line_number: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

impl PartnerStore for SqliteStore<'_> {
    fn list_partners(&self) -> StoreResult<Vec<Partner>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM partners ORDER BY id",
            PARTNER_COLUMNS
        ))?;

        let partners = stmt
            .query_map([], partner_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(partners)
    }

    fn find_partner(&self, partner_id: i64) -> StoreResult<Option<Partner>> {
        let partner = self
            .conn
            .query_row(
                &format!("SELECT {} FROM partners WHERE id = ?1", PARTNER_COLUMNS),
                params![partner_id],
                partner_from_row,
            )
            .optional()?;

        Ok(partner)
    }

    fn partner_type_name(&self, partner_type_id: i64) -> StoreResult<Option<String>> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM partner_types WHERE id = ?1",
                params![partner_type_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(name)
    }

    fn legal_address(&self, address_id: i64) -> StoreResult<Option<LegalAddress>> {
        let address = self
            .conn
            .query_row(
                "SELECT id, postal_index, region, city, street, house
                 FROM legal_addresses WHERE id = ?1",
                params![address_id],
                |row| {
                    Ok(LegalAddress {
                        id: row.get(0)?,
                        postal_index: row.get(1)?,
                        region: row.get(2)?,
                        city: row.get(3)?,
                        street: row.get(4)?,
                        house: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(address)
    }
}

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    setup_database(&conn)?;
    Ok(conn)
}
