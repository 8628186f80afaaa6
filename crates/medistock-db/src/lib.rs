//! # medistock-db: Database Layer for MediStock
//!
//! This crate provides database access and the transactional services for
//! the MediStock pharmacy backend. It uses SQLite for local storage with
//! sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       MediStock Data Flow                               │
//! │                                                                         │
//! │  Request handler (create_receipt, record_intake, ...)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    medistock-db (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Services    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (service/*)   │───►│ (repository/*)│    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ PharmacySvc   │    │ MedicineRepo  │    │ 001_init.sql │  │   │
//! │  │   │ intake/       │    │ ReceiptRepo   │    │ ...          │  │   │
//! │  │   │ receipts/     │    │ SaleRepo      │    │              │  │   │
//! │  │   │ sales/dash    │    │               │    │              │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           │  one transaction   │                               │   │
//! │  │           ▼  per write path    ▼                               │   │
//! │  │   ┌───────────────────────────────────┐                        │   │
//! │  │   │       Database (pool.rs)          │                        │   │
//! │  │   └───────────────────────────────────┘                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) - medicines, batches, receipts, sales, counters          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (medicine, receipt, sale)
//! - [`service`] - Transactional services (intake, receipts, sales, dashboard)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medistock_db::{Database, DbConfig, PharmacyService};
//!
//! let db = Database::new(DbConfig::new("path/to/medistock.db")).await?;
//! let service = PharmacyService::new(db);
//!
//! let report = service.record_intake(intake).await?;
//! let receipt = service.create_receipt(request).await?;
//! let stats = service.dashboard_stats().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::medicine::MedicineRepository;
pub use repository::receipt::ReceiptRepository;
pub use repository::sale::SaleRepository;

// Service re-exports
pub use service::{
    BatchUpdate, CreateReceiptRequest, CreateSaleRequest, DashboardStats, IntakeReport,
    MedicineStockStatus, PharmacyService, ReceiptWriteReport, RemovedBatch, SalesStats,
    ServiceError, ServiceResult,
};
