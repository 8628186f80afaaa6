//! # Pharmacy Sales
//!
//! Over-the-counter sale creation and sale statistics. Shares the pricing
//! and depletion path with receipts, adding subtotal/tax/discount accounting
//! and the atomic daily sale number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DbError;
use crate::repository::sale::{self, generate_sale_id, generate_sale_item_id};
use crate::service::{
    fetch_referenced_medicines, persist_ledgers, utc_day_bounds, PharmacyService, ServiceResult,
};
use medistock_core::receipt::{apply_lines, price_lines, sale_totals};
use medistock_core::validation::validate_name;
use medistock_core::{CoreError, LineRequest, PaymentMethod, PharmacySale};

// =============================================================================
// DTOs
// =============================================================================

/// Request to create a pharmacy sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSaleRequest {
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub lines: Vec<LineRequest>,
    /// Flat tax amount in cents (not a rate).
    pub tax_cents: i64,
    /// Flat discount amount in cents.
    pub discount_cents: i64,
    pub payment_method: PaymentMethod,
    /// Defaults to now when absent.
    pub sale_date: Option<DateTime<Utc>>,
}

/// Sales statistics rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesStats {
    pub total_sales: i64,
    pub today_sales: i64,
    pub today_revenue_cents: i64,
    pub total_revenue_cents: i64,
}

// =============================================================================
// Operations
// =============================================================================

impl PharmacyService {
    /// Creates a sale, depleting the referenced batches and allocating the
    /// day's next sale number.
    ///
    /// The number is claimed inside the same transaction as the insert, so
    /// concurrent sales can never produce duplicates (the old count-then-
    /// format approach could).
    pub async fn create_sale(&self, request: CreateSaleRequest) -> ServiceResult<PharmacySale> {
        validate_name("customer_name", &request.customer_name).map_err(CoreError::from)?;

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;
        let now = Utc::now();

        let mut medicines = fetch_referenced_medicines(
            &mut tx,
            request.lines.iter().map(|l| l.medicine_id.as_str()),
        )
        .await?;

        let priced = price_lines(&medicines, &request.lines)?;
        let totals = sale_totals(&priced, request.tax_cents, request.discount_cents)?;
        apply_lines(&mut medicines, &priced)?;
        persist_ledgers(&mut tx, medicines, now).await?;

        let sale_number = sale::next_sale_number(&mut tx, now.date_naive()).await?;

        let sale = PharmacySale {
            id: generate_sale_id(),
            sale_number,
            customer_name: request.customer_name,
            customer_phone: request.customer_phone,
            items: priced
                .into_iter()
                .map(|p| p.into_receipt_line(generate_sale_item_id()))
                .collect(),
            subtotal_cents: totals.subtotal_cents,
            tax_cents: totals.tax_cents,
            discount_cents: totals.discount_cents,
            total_cents: totals.total_cents,
            payment_method: request.payment_method,
            sale_date: request.sale_date.unwrap_or(now),
            created_at: now,
        };

        sale::insert(&mut tx, &sale).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            sale_id = %sale.id,
            sale_number = %sale.sale_number,
            items = sale.items.len(),
            total = sale.total_cents,
            "Sale created"
        );

        Ok(sale)
    }

    /// Sales statistics: lifetime and current-UTC-day counts and revenue.
    pub async fn sales_stats(&self) -> ServiceResult<SalesStats> {
        let sales = self.db.sales();
        let (start, end) = utc_day_bounds(Utc::now());

        let total_sales = sales.count().await?;
        let today_sales = sales.count_in_range(start, end).await?;
        let today_revenue_cents = sales.revenue_in_range(start, end).await?;
        let total_revenue_cents = sales.total_revenue().await?;

        Ok(SalesStats {
            total_sales,
            today_sales,
            today_revenue_cents,
            total_revenue_cents,
        })
    }
}
