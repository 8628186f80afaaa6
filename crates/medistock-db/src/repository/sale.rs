//! # Pharmacy Sale Repository
//!
//! Database operations for pharmacy sales, their items and the daily
//! sale-number counter.
//!
//! ## Sale Numbering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Daily Sale Number Allocation                           │
//! │                                                                         │
//! │  BEGIN TRANSACTION                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT INTO sale_counters (day, next_seq) VALUES ('2026-08-07', 2)    │
//! │  ON CONFLICT(day) DO UPDATE SET next_seq = next_seq + 1                │
//! │  RETURNING next_seq            ← atomic claim of one sequence value    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  "SALE-20260807-0001"  (seq = returned - 1, zero-padded to 4)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT INTO pharmacy_sales (..., sale_number, ...)                    │
//! │       │                                                                 │
//! │  COMMIT  ← number + sale land together or not at all                   │
//! │                                                                         │
//! │  Two concurrent creates CANNOT observe the same count: the upsert      │
//! │  serializes on the row, unlike the old count-then-format read.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use medistock_core::{PaymentMethod, PharmacySale, ReceiptLine};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    sale_number: String,
    customer_name: String,
    customer_phone: Option<String>,
    subtotal_cents: i64,
    tax_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    payment_method: PaymentMethod,
    sale_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
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

fn assemble(row: SaleRow, items: Vec<ItemRow>) -> PharmacySale {
    PharmacySale {
        id: row.id,
        sale_number: row.sale_number,
        customer_name: row.customer_name,
        customer_phone: row.customer_phone,
        items: items
            .into_iter()
            .map(|i| ReceiptLine {
                id: i.id,
                medicine_id: i.medicine_id,
                batch_number: i.batch_number,
                name_snapshot: i.name_snapshot,
                generic_snapshot: i.generic_snapshot,
                brand_snapshot: i.brand_snapshot,
                unit_price_cents: i.unit_price_cents,
                quantity: i.quantity,
                line_total_cents: i.line_total_cents,
            })
            .collect(),
        subtotal_cents: row.subtotal_cents,
        tax_cents: row.tax_cents,
        discount_cents: row.discount_cents,
        total_cents: row.total_cents,
        payment_method: row.payment_method,
        sale_date: row.sale_date,
        created_at: row.created_at,
    }
}

// =============================================================================
// Connection-Scoped Helpers (compose inside one transaction)
// =============================================================================

/// Claims the next sale number for `day`, atomically.
///
/// Must run inside the same transaction as the sale insert so the number
/// can never be claimed without its sale (and vice versa).
pub(crate) async fn next_sale_number(
    conn: &mut SqliteConnection,
    day: NaiveDate,
) -> DbResult<String> {
    let day_key = day.format("%Y-%m-%d").to_string();

    // First insert claims seq 1 (storing next_seq=2); later upserts bump it
    let next_seq: i64 = sqlx::query_scalar(
        "INSERT INTO sale_counters (day, next_seq) VALUES (?1, 2) \
         ON CONFLICT(day) DO UPDATE SET next_seq = next_seq + 1 \
         RETURNING next_seq",
    )
    .bind(&day_key)
    .fetch_one(&mut *conn)
    .await?;

    let seq = next_seq - 1;
    Ok(format!("SALE-{}-{:04}", day.format("%Y%m%d"), seq))
}

async fn insert_items(
    conn: &mut SqliteConnection,
    sale_id: &str,
    items: &[ReceiptLine],
) -> DbResult<()> {
    for item in items {
        sqlx::query(
            "INSERT INTO sale_items \
             (id, sale_id, medicine_id, batch_number, name_snapshot, \
              generic_snapshot, brand_snapshot, unit_price_cents, quantity, \
              line_total_cents) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&item.id)
        .bind(sale_id)
        .bind(&item.medicine_id)
        .bind(&item.batch_number)
        .bind(&item.name_snapshot)
        .bind(&item.generic_snapshot)
        .bind(&item.brand_snapshot)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.line_total_cents)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Inserts a sale with its items.
pub(crate) async fn insert(conn: &mut SqliteConnection, sale: &PharmacySale) -> DbResult<()> {
    debug!(id = %sale.id, sale_number = %sale.sale_number, total = sale.total_cents, "Inserting sale");

    sqlx::query(
        "INSERT INTO pharmacy_sales \
         (id, sale_number, customer_name, customer_phone, subtotal_cents, \
          tax_cents, discount_cents, total_cents, payment_method, sale_date, \
          created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(&sale.id)
    .bind(&sale.sale_number)
    .bind(&sale.customer_name)
    .bind(&sale.customer_phone)
    .bind(sale.subtotal_cents)
    .bind(sale.tax_cents)
    .bind(sale.discount_cents)
    .bind(sale.total_cents)
    .bind(sale.payment_method)
    .bind(sale.sale_date)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;

    insert_items(conn, &sale.id, &sale.items).await
}

// =============================================================================
// Repository (pool-based reads)
// =============================================================================

/// Repository for pharmacy sale reads.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PharmacySale>> {
        let row = sqlx::query_as::<_, SaleRow>(
            "SELECT id, sale_number, customer_name, customer_phone, subtotal_cents, \
                    tax_cents, discount_cents, total_cents, payment_method, sale_date, \
                    created_at \
             FROM pharmacy_sales WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let items = self.fetch_items(&row.id).await?;
                Ok(Some(assemble(row, items)))
            }
            None => Ok(None),
        }
    }

    /// Gets a sale by its sale number.
    pub async fn get_by_number(&self, sale_number: &str) -> DbResult<Option<PharmacySale>> {
        let row = sqlx::query_as::<_, SaleRow>(
            "SELECT id, sale_number, customer_name, customer_phone, subtotal_cents, \
                    tax_cents, discount_cents, total_cents, payment_method, sale_date, \
                    created_at \
             FROM pharmacy_sales WHERE sale_number = ?1",
        )
        .bind(sale_number)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let items = self.fetch_items(&row.id).await?;
                Ok(Some(assemble(row, items)))
            }
            None => Ok(None),
        }
    }

    /// Lists sales with `sale_date` in `[start, end)`, newest first.
    pub async fn list_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<PharmacySale>> {
        let rows = sqlx::query_as::<_, SaleRow>(
            "SELECT id, sale_number, customer_name, customer_phone, subtotal_cents, \
                    tax_cents, discount_cents, total_cents, payment_method, sale_date, \
                    created_at \
             FROM pharmacy_sales \
             WHERE sale_date >= ?1 AND sale_date < ?2 \
             ORDER BY sale_date DESC LIMIT ?3",
        )
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut sales = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.fetch_items(&row.id).await?;
            sales.push(assemble(row, items));
        }

        Ok(sales)
    }

    /// Counts sales with `sale_date` in `[start, end)`.
    pub async fn count_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pharmacy_sales WHERE sale_date >= ?1 AND sale_date < ?2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Sums sale totals with `sale_date` in `[start, end)`.
    pub async fn revenue_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(total_cents) FROM pharmacy_sales \
             WHERE sale_date >= ?1 AND sale_date < ?2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }

    /// Counts all sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pharmacy_sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Sums all sale totals.
    pub async fn total_revenue(&self) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar("SELECT SUM(total_cents) FROM pharmacy_sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(total.unwrap_or(0))
    }

    async fn fetch_items(&self, sale_id: &str) -> DbResult<Vec<ItemRow>> {
        let items = sqlx::query_as::<_, ItemRow>(
            "SELECT id, medicine_id, batch_number, name_snapshot, generic_snapshot, \
                    brand_snapshot, unit_price_cents, quantity, line_total_cents \
             FROM sale_items WHERE sale_id = ?1 ORDER BY rowid",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

/// Generates a new sale ID.
pub fn generate_sale_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new sale item ID.
pub fn generate_sale_item_id() -> String {
    Uuid::new_v4().to_string()
}
