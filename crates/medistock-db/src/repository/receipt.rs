//! # Receipt Repository
//!
//! Database operations for receipts and their lines.
//!
//! ## Snapshot Pattern
//! Receipt lines carry frozen copies of the medicine's name/generic/brand and
//! the unit price at transaction time. Catalog edits - or the medicine being
//! pruned entirely - never change what a stored receipt says was dispensed.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use medistock_core::{Receipt, ReceiptLine};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ReceiptRow {
    id: String,
    patient_id: String,
    total_cents: i64,
    receipt_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    id: String,
    medicine_id: String,
    batch_number: String,
    name_snapshot: String,
    generic_snapshot: String,
    brand_snapshot: String,
    unit_price_cents: i64,
    quantity: i64,
    line_total_cents: i64,
}

impl From<LineRow> for ReceiptLine {
    fn from(row: LineRow) -> Self {
        ReceiptLine {
            id: row.id,
            medicine_id: row.medicine_id,
            batch_number: row.batch_number,
            name_snapshot: row.name_snapshot,
            generic_snapshot: row.generic_snapshot,
            brand_snapshot: row.brand_snapshot,
            unit_price_cents: row.unit_price_cents,
            quantity: row.quantity,
            line_total_cents: row.line_total_cents,
        }
    }
}

fn assemble(row: ReceiptRow, lines: Vec<LineRow>) -> Receipt {
    Receipt {
        id: row.id,
        patient_id: row.patient_id,
        lines: lines.into_iter().map(ReceiptLine::from).collect(),
        total_cents: row.total_cents,
        receipt_date: row.receipt_date,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

// =============================================================================
// Connection-Scoped Helpers (compose inside one transaction)
// =============================================================================

async fn fetch_lines(conn: &mut SqliteConnection, receipt_id: &str) -> DbResult<Vec<LineRow>> {
    let lines = sqlx::query_as::<_, LineRow>(
        "SELECT id, medicine_id, batch_number, name_snapshot, generic_snapshot, \
                brand_snapshot, unit_price_cents, quantity, line_total_cents \
         FROM receipt_lines WHERE receipt_id = ?1 ORDER BY rowid",
    )
    .bind(receipt_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

/// Fetches a receipt with its lines by ID.
pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Receipt>> {
    let row = sqlx::query_as::<_, ReceiptRow>(
        "SELECT id, patient_id, total_cents, receipt_date, created_at, updated_at \
         FROM receipts WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let lines = fetch_lines(conn, &row.id).await?;
            Ok(Some(assemble(row, lines)))
        }
        None => Ok(None),
    }
}

async fn insert_lines(
    conn: &mut SqliteConnection,
    receipt_id: &str,
    lines: &[ReceiptLine],
) -> DbResult<()> {
    for line in lines {
        sqlx::query(
            "INSERT INTO receipt_lines \
             (id, receipt_id, medicine_id, batch_number, name_snapshot, \
              generic_snapshot, brand_snapshot, unit_price_cents, quantity, \
              line_total_cents) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&line.id)
        .bind(receipt_id)
        .bind(&line.medicine_id)
        .bind(&line.batch_number)
        .bind(&line.name_snapshot)
        .bind(&line.generic_snapshot)
        .bind(&line.brand_snapshot)
        .bind(line.unit_price_cents)
        .bind(line.quantity)
        .bind(line.line_total_cents)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Inserts a receipt with its lines.
pub(crate) async fn insert(conn: &mut SqliteConnection, receipt: &Receipt) -> DbResult<()> {
    debug!(id = %receipt.id, total = receipt.total_cents, "Inserting receipt");

    sqlx::query(
        "INSERT INTO receipts (id, patient_id, total_cents, receipt_date, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&receipt.id)
    .bind(&receipt.patient_id)
    .bind(receipt.total_cents)
    .bind(receipt.receipt_date)
    .bind(receipt.created_at)
    .bind(receipt.updated_at)
    .execute(&mut *conn)
    .await?;

    insert_lines(conn, &receipt.id, &receipt.lines).await
}

/// Updates a receipt in place, replacing all of its lines.
pub(crate) async fn update(conn: &mut SqliteConnection, receipt: &Receipt) -> DbResult<()> {
    debug!(id = %receipt.id, total = receipt.total_cents, "Updating receipt");

    let result = sqlx::query(
        "UPDATE receipts SET patient_id = ?2, total_cents = ?3, receipt_date = ?4, \
         updated_at = ?5 WHERE id = ?1",
    )
    .bind(&receipt.id)
    .bind(&receipt.patient_id)
    .bind(receipt.total_cents)
    .bind(receipt.receipt_date)
    .bind(receipt.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Receipt", &receipt.id));
    }

    sqlx::query("DELETE FROM receipt_lines WHERE receipt_id = ?1")
        .bind(&receipt.id)
        .execute(&mut *conn)
        .await?;

    insert_lines(conn, &receipt.id, &receipt.lines).await
}

/// Deletes a receipt; its lines cascade.
pub(crate) async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    debug!(id = %id, "Deleting receipt");

    let result = sqlx::query("DELETE FROM receipts WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Receipt", id));
    }

    Ok(())
}

// =============================================================================
// Repository (pool-based reads)
// =============================================================================

/// Repository for receipt reads.
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    pool: SqlitePool,
}

impl ReceiptRepository {
    /// Creates a new ReceiptRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReceiptRepository { pool }
    }

    /// Gets a receipt by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Receipt>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Lists the most recent receipts, newest first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Receipt>> {
        let rows = sqlx::query_as::<_, ReceiptRow>(
            "SELECT id, patient_id, total_cents, receipt_date, created_at, updated_at \
             FROM receipts ORDER BY receipt_date DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        let mut receipts = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = fetch_lines(&mut conn, &row.id).await?;
            receipts.push(assemble(row, lines));
        }

        Ok(receipts)
    }

    /// Counts receipts with `receipt_date` in `[start, end)`.
    pub async fn count_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM receipts WHERE receipt_date >= ?1 AND receipt_date < ?2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Sums receipt totals with `receipt_date` in `[start, end)`.
    pub async fn revenue_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(total_cents) FROM receipts \
             WHERE receipt_date >= ?1 AND receipt_date < ?2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }

    /// Counts all receipts.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM receipts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Generates a new receipt ID.
pub fn generate_receipt_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new receipt line ID.
pub fn generate_line_id() -> String {
    Uuid::new_v4().to_string()
}
