//! # Repository Module
//!
//! Database repository implementations for MediStock.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  Two access shapes live side by side:                                  │
//! │                                                                         │
//! │  1. Pool-holding structs for plain reads                               │
//! │     db.medicines().find_by_brand("BrandX")                             │
//! │          │                                                              │
//! │          ▼                                                              │
//! │     MedicineRepository ──► SQL ──► SQLite                              │
//! │                                                                         │
//! │  2. Connection-scoped helpers for transactional writes                 │
//! │     let mut tx = pool.begin().await?;                                  │
//! │     medicine::fetch(&mut *tx, id)                                      │
//! │     medicine::update(&mut *tx, &med)   ← version-checked               │
//! │     receipt::insert(&mut *tx, &receipt)                                │
//! │     tx.commit().await?;                                                │
//! │                                                                         │
//! │  The helpers compose into ONE atomic unit - the transactional          │
//! │  boundary the stock logic depends on.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`medicine::MedicineRepository`] - Medicine catalog + batch ledger rows
//! - [`receipt::ReceiptRepository`] - Receipts and their lines
//! - [`sale::SaleRepository`] - Pharmacy sales, items and the daily counter

pub mod medicine;
pub mod receipt;
pub mod sale;
