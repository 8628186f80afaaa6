//! # Medicine Repository
//!
//! Database operations for medicines and their batch ledgers.
//!
//! ## Row Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  medicines                        medicine_batches                      │
//! │  ┌──────────────────────┐         ┌─────────────────────────────┐      │
//! │  │ id (UUID)            │ 1     n │ medicine_id (FK, cascade)   │      │
//! │  │ name/generic/brand   │◄────────│ batch_number                │      │
//! │  │ current_stock        │         │ expiry_date                 │      │
//! │  │ version              │         │ price_cents / quantity      │      │
//! │  └──────────────────────┘         └─────────────────────────────┘      │
//! │                                                                         │
//! │  A domain Medicine is always loaded WITH its batches; the ledger is    │
//! │  meaningless without them.                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Strategy
//! Batches are persisted by full replacement (delete + insert) under the
//! medicine's version-checked update. Ledgers are small (a handful of lots
//! per medicine) and replacement keeps the write path identical for merge,
//! append, deplete and remove.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use medistock_core::{Batch, Medicine};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct MedicineRow {
    id: String,
    name: String,
    generic: String,
    brand: String,
    category: Option<String>,
    form: Option<String>,
    strength: Option<String>,
    min_stock_level: i64,
    current_stock: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct BatchRow {
    batch_number: String,
    expiry_date: DateTime<Utc>,
    price_cents: i64,
    quantity: i64,
}

const MEDICINE_COLUMNS: &str = "id, name, generic, brand, category, form, strength, \
                                min_stock_level, current_stock, created_at, updated_at, version";

fn assemble(row: MedicineRow, batches: Vec<BatchRow>) -> Medicine {
    Medicine {
        id: row.id,
        name: row.name,
        generic: row.generic,
        brand: row.brand,
        category: row.category,
        form: row.form,
        strength: row.strength,
        min_stock_level: row.min_stock_level,
        current_stock: row.current_stock,
        batches: batches
            .into_iter()
            .map(|b| Batch {
                batch_number: b.batch_number,
                expiry_date: b.expiry_date,
                price_cents: b.price_cents,
                quantity: b.quantity,
            })
            .collect(),
        created_at: row.created_at,
        updated_at: row.updated_at,
        version: row.version,
    }
}

// =============================================================================
// Connection-Scoped Helpers (compose inside one transaction)
// =============================================================================

async fn fetch_batches(conn: &mut SqliteConnection, medicine_id: &str) -> DbResult<Vec<BatchRow>> {
    let batches = sqlx::query_as::<_, BatchRow>(
        "SELECT batch_number, expiry_date, price_cents, quantity \
         FROM medicine_batches WHERE medicine_id = ?1 ORDER BY expiry_date, batch_number",
    )
    .bind(medicine_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(batches)
}

async fn load(conn: &mut SqliteConnection, row: Option<MedicineRow>) -> DbResult<Option<Medicine>> {
    match row {
        Some(row) => {
            let batches = fetch_batches(&mut *conn, &row.id).await?;
            Ok(Some(assemble(row, batches)))
        }
        None => Ok(None),
    }
}

/// Fetches a medicine (with its batch ledger) by ID.
pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Medicine>> {
    let row = sqlx::query_as::<_, MedicineRow>(&format!(
        "SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    load(conn, row).await
}

/// Fetches a medicine by its business identity (name, generic, brand).
///
/// At most one row can match: the identity carries a unique index.
pub(crate) async fn fetch_by_identity(
    conn: &mut SqliteConnection,
    name: &str,
    generic: &str,
    brand: &str,
) -> DbResult<Option<Medicine>> {
    let row = sqlx::query_as::<_, MedicineRow>(&format!(
        "SELECT {MEDICINE_COLUMNS} FROM medicines \
         WHERE name = ?1 AND generic = ?2 AND brand = ?3"
    ))
    .bind(name)
    .bind(generic)
    .bind(brand)
    .fetch_optional(&mut *conn)
    .await?;

    load(conn, row).await
}

/// Fetches the medicine that owns a (name, batch_number) pair.
///
/// Catalog-maintenance entry point: the original callers address batches by
/// medicine name + batch number rather than UUID.
pub(crate) async fn fetch_by_name_and_batch(
    conn: &mut SqliteConnection,
    name: &str,
    batch_number: &str,
) -> DbResult<Option<Medicine>> {
    let row = sqlx::query_as::<_, MedicineRow>(&format!(
        "SELECT {MEDICINE_COLUMNS} FROM medicines m \
         WHERE m.name = ?1 AND EXISTS (\
             SELECT 1 FROM medicine_batches b \
             WHERE b.medicine_id = m.id AND b.batch_number = ?2)"
    ))
    .bind(name)
    .bind(batch_number)
    .fetch_optional(&mut *conn)
    .await?;

    load(conn, row).await
}

async fn replace_batches(
    conn: &mut SqliteConnection,
    medicine_id: &str,
    batches: &[Batch],
) -> DbResult<()> {
    sqlx::query("DELETE FROM medicine_batches WHERE medicine_id = ?1")
        .bind(medicine_id)
        .execute(&mut *conn)
        .await?;

    for batch in batches {
        sqlx::query(
            "INSERT INTO medicine_batches \
             (medicine_id, batch_number, expiry_date, price_cents, quantity) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(medicine_id)
        .bind(&batch.batch_number)
        .bind(batch.expiry_date)
        .bind(batch.price_cents)
        .bind(batch.quantity)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Inserts a new medicine with its batches.
pub(crate) async fn insert(conn: &mut SqliteConnection, medicine: &Medicine) -> DbResult<()> {
    debug!(id = %medicine.id, name = %medicine.name, "Inserting medicine");

    sqlx::query(
        "INSERT INTO medicines \
         (id, name, generic, brand, category, form, strength, \
          min_stock_level, current_stock, created_at, updated_at, version) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )
    .bind(&medicine.id)
    .bind(&medicine.name)
    .bind(&medicine.generic)
    .bind(&medicine.brand)
    .bind(&medicine.category)
    .bind(&medicine.form)
    .bind(&medicine.strength)
    .bind(medicine.min_stock_level)
    .bind(medicine.current_stock)
    .bind(medicine.created_at)
    .bind(medicine.updated_at)
    .bind(medicine.version)
    .execute(&mut *conn)
    .await?;

    replace_batches(conn, &medicine.id, &medicine.batches).await
}

/// Updates a medicine and replaces its batch ledger.
///
/// ## Optimistic Concurrency
/// The UPDATE is conditional on the version read at fetch time. Zero rows
/// affected means another writer committed in between (or the medicine was
/// pruned); the caller's transaction rolls back and the whole operation may
/// be retried from the top.
pub(crate) async fn update(conn: &mut SqliteConnection, medicine: &Medicine) -> DbResult<()> {
    debug!(id = %medicine.id, stock = medicine.current_stock, "Updating medicine");

    let result = sqlx::query(
        "UPDATE medicines SET \
             name = ?2, generic = ?3, brand = ?4, category = ?5, form = ?6, \
             strength = ?7, min_stock_level = ?8, current_stock = ?9, \
             updated_at = ?10, version = version + 1 \
         WHERE id = ?1 AND version = ?11",
    )
    .bind(&medicine.id)
    .bind(&medicine.name)
    .bind(&medicine.generic)
    .bind(&medicine.brand)
    .bind(&medicine.category)
    .bind(&medicine.form)
    .bind(&medicine.strength)
    .bind(medicine.min_stock_level)
    .bind(medicine.current_stock)
    .bind(medicine.updated_at)
    .bind(medicine.version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict("Medicine", &medicine.id));
    }

    replace_batches(conn, &medicine.id, &medicine.batches).await
}

/// Deletes a medicine; its batches cascade.
pub(crate) async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    debug!(id = %id, "Deleting medicine");

    let result = sqlx::query("DELETE FROM medicines WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Medicine", id));
    }

    Ok(())
}

// =============================================================================
// Repository (pool-based reads)
// =============================================================================

/// Repository for medicine reads.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.medicines();
///
/// let all = repo.list_all().await?;
/// let by_brand = repo.find_by_brand("BrandX").await?;
/// ```
#[derive(Debug, Clone)]
pub struct MedicineRepository {
    pool: SqlitePool,
}

impl MedicineRepository {
    /// Creates a new MedicineRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MedicineRepository { pool }
    }

    /// Gets a medicine by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Medicine>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Gets a medicine by its business identity.
    pub async fn find_by_identity(
        &self,
        name: &str,
        generic: &str,
        brand: &str,
    ) -> DbResult<Option<Medicine>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_identity(&mut conn, name, generic, brand).await
    }

    /// Lists all medicines sorted by name.
    pub async fn list_all(&self) -> DbResult<Vec<Medicine>> {
        let rows = sqlx::query_as::<_, MedicineRow>(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.load_all(rows).await
    }

    /// Finds medicines by exact name, including `"name ..."` variants
    /// (case-insensitive), sorted alphabetically.
    ///
    /// "Paracetamol" matches "Paracetamol" and "Paracetamol 500", but not
    /// "Paracetamol-Forte" or "Co-Paracetamol".
    pub async fn find_by_name(&self, name: &str) -> DbResult<Vec<Medicine>> {
        debug!(name = %name, "Searching medicines by name");

        let rows = sqlx::query_as::<_, MedicineRow>(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines \
             WHERE name = ?1 COLLATE NOCASE \
                OR name LIKE ?1 || ' %' COLLATE NOCASE \
             ORDER BY name"
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        self.load_all(rows).await
    }

    /// Finds medicines by exact generic name.
    pub async fn find_by_generic(&self, generic: &str) -> DbResult<Vec<Medicine>> {
        debug!(generic = %generic, "Searching medicines by generic");

        let rows = sqlx::query_as::<_, MedicineRow>(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines WHERE generic = ?1 ORDER BY name"
        ))
        .bind(generic)
        .fetch_all(&self.pool)
        .await?;

        self.load_all(rows).await
    }

    /// Finds medicines by brand substring (case-insensitive), sorted by brand.
    pub async fn find_by_brand(&self, brand: &str) -> DbResult<Vec<Medicine>> {
        debug!(brand = %brand, "Searching medicines by brand");

        let rows = sqlx::query_as::<_, MedicineRow>(&format!(
            "SELECT {MEDICINE_COLUMNS} FROM medicines \
             WHERE brand LIKE '%' || ?1 || '%' COLLATE NOCASE \
             ORDER BY brand"
        ))
        .bind(brand)
        .fetch_all(&self.pool)
        .await?;

        self.load_all(rows).await
    }

    /// Counts all medicines.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medicines")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Counts medicines at or below their reorder threshold.
    pub async fn low_stock_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM medicines WHERE current_stock <= min_stock_level",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Counts medicines holding at least one expired batch as of `now`.
    pub async fn expired_count(&self, now: DateTime<Utc>) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT medicine_id) FROM medicine_batches WHERE expiry_date <= ?1",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn load_all(&self, rows: Vec<MedicineRow>) -> DbResult<Vec<Medicine>> {
        let mut conn = self.pool.acquire().await?;
        let mut medicines = Vec::with_capacity(rows.len());
        for row in rows {
            let batches = fetch_batches(&mut conn, &row.id).await?;
            medicines.push(assemble(row, batches));
        }
        Ok(medicines)
    }
}

/// Helper to generate a new medicine ID.
pub fn generate_medicine_id() -> String {
    Uuid::new_v4().to_string()
}
