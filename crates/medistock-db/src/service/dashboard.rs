//! # Dashboard Aggregator
//!
//! Read-only rollups over the ledgers, receipts and sales. Nothing here
//! mutates anything; every number is computed from what is already stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::service::{utc_day_bounds, PharmacyService, ServiceResult};

// =============================================================================
// DTOs
// =============================================================================

/// Medicine catalog rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineStats {
    pub total: i64,
    /// Medicines with `current_stock <= min_stock_level`.
    pub low_stock: i64,
    /// Medicines holding at least one expired batch.
    pub expired: i64,
}

/// Receipt rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptStats {
    pub total: i64,
    pub today: i64,
    pub today_revenue_cents: i64,
}

/// Sale rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDayStats {
    pub today_count: i64,
    pub today_revenue_cents: i64,
    pub total_count: i64,
    pub total_revenue_cents: i64,
}

/// The dashboard: everything the landing page shows, in one round of reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub medicines: MedicineStats,
    pub receipts: ReceiptStats,
    pub sales: SaleDayStats,
}

/// Per-medicine stock status flags for inventory review screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineStockStatus {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub current_stock: i64,
    pub min_stock_level: i64,
    pub is_low_stock: bool,
    pub has_expired_batch: bool,
}

// =============================================================================
// Operations
// =============================================================================

impl PharmacyService {
    /// Computes the dashboard statistics as of now (UTC day boundaries).
    pub async fn dashboard_stats(&self) -> ServiceResult<DashboardStats> {
        let now = Utc::now();
        let (start, end) = utc_day_bounds(now);

        let medicines = self.db.medicines();
        let receipts = self.db.receipts();
        let sales = self.db.sales();

        Ok(DashboardStats {
            medicines: MedicineStats {
                total: medicines.count().await?,
                low_stock: medicines.low_stock_count().await?,
                expired: medicines.expired_count(now).await?,
            },
            receipts: ReceiptStats {
                total: receipts.count().await?,
                today: receipts.count_in_range(start, end).await?,
                today_revenue_cents: receipts.revenue_in_range(start, end).await?,
            },
            sales: SaleDayStats {
                today_count: sales.count_in_range(start, end).await?,
                today_revenue_cents: sales.revenue_in_range(start, end).await?,
                total_count: sales.count().await?,
                total_revenue_cents: sales.total_revenue().await?,
            },
        })
    }

    /// Per-medicine low-stock/expiry flags, sorted by name.
    pub async fn stock_overview(&self) -> ServiceResult<Vec<MedicineStockStatus>> {
        self.stock_overview_at(Utc::now()).await
    }

    /// Like [`PharmacyService::stock_overview`] with an explicit "now",
    /// useful for reporting against a past date.
    pub async fn stock_overview_at(
        &self,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<MedicineStockStatus>> {
        let medicines = self.db.medicines().list_all().await?;

        Ok(medicines
            .into_iter()
            .map(|m| MedicineStockStatus {
                is_low_stock: m.is_low_stock(),
                has_expired_batch: m.has_expired_batch(now),
                id: m.id,
                name: m.name,
                brand: m.brand,
                current_stock: m.current_stock,
                min_stock_level: m.min_stock_level,
            })
            .collect())
    }
}
