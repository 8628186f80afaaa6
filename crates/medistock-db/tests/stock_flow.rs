//! End-to-end stock flow tests against an in-memory database.
//!
//! These walk the full path the request layer takes: service call →
//! transaction → repositories → SQLite, asserting the ledger invariants
//! after every step.

use chrono::{DateTime, Duration, TimeZone, Utc};

use medistock_core::{
    CoreError, IntakeOutcome, LineRequest, PaymentMethod, RestorePolicy, StockIntake,
};
use medistock_db::{
    CreateReceiptRequest, CreateSaleRequest, Database, DbConfig, PharmacyService, ServiceError,
};

// =============================================================================
// Helpers
// =============================================================================

async fn service() -> PharmacyService {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    PharmacyService::new(db)
}

fn expiry() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2027, 6, 30, 0, 0, 0).unwrap()
}

fn intake(batch_number: &str, price_cents: i64, quantity: i64) -> StockIntake {
    StockIntake {
        name: "Paracetamol".to_string(),
        generic: "Acetaminophen".to_string(),
        brand: "BrandX".to_string(),
        category: Some("Analgesic".to_string()),
        form: Some("tablet".to_string()),
        strength: Some("500mg".to_string()),
        min_stock_level: Some(10),
        batch_number: batch_number.to_string(),
        expiry_date: expiry(),
        price_cents,
        quantity,
    }
}

fn line(medicine_id: &str, batch_number: &str, quantity: i64) -> LineRequest {
    LineRequest {
        medicine_id: medicine_id.to_string(),
        batch_number: batch_number.to_string(),
        quantity,
    }
}

fn receipt_request(medicine_id: &str, batch_number: &str, quantity: i64) -> CreateReceiptRequest {
    CreateReceiptRequest {
        patient_id: "patient-1".to_string(),
        lines: vec![line(medicine_id, batch_number, quantity)],
        receipt_date: None,
    }
}

/// Asserts the stored medicine still satisfies `current_stock == Σ batches`.
async fn assert_stock_invariant(service: &PharmacyService, medicine_id: &str) {
    let med = service
        .database()
        .medicines()
        .get_by_id(medicine_id)
        .await
        .unwrap()
        .expect("medicine should exist");
    let sum: i64 = med.batches.iter().map(|b| b.quantity).sum();
    assert_eq!(med.current_stock, sum);
}

// =============================================================================
// Intake Reconciliation
// =============================================================================

#[tokio::test]
async fn intake_merges_appends_and_creates() {
    let service = service().await;

    // First delivery creates the medicine
    let report = service.record_intake(intake("B1", 200, 100)).await.unwrap();
    assert_eq!(report.outcome, IntakeOutcome::CreatedMedicine);
    assert_eq!(report.medicine.current_stock, 100);
    let id = report.medicine.id.clone();
    assert_stock_invariant(&service, &id).await;

    // Identical identity merges into the same batch
    let report = service.record_intake(intake("B1", 200, 50)).await.unwrap();
    assert_eq!(report.outcome, IntakeOutcome::MergedBatch);
    assert_eq!(report.medicine.id, id);
    assert_eq!(report.medicine.current_stock, 150);
    assert_eq!(report.medicine.batches.len(), 1);
    assert_stock_invariant(&service, &id).await;

    // Same drug, different batch identity appends a second lot
    let report = service.record_intake(intake("B2", 250, 30)).await.unwrap();
    assert_eq!(report.outcome, IntakeOutcome::AppendedBatch);
    assert_eq!(report.medicine.current_stock, 180);
    assert_eq!(report.medicine.batches.len(), 2);
    assert_stock_invariant(&service, &id).await;

    // A different drug concept creates a second medicine
    let mut other = intake("B1", 200, 10);
    other.name = "Ibuprofen".to_string();
    other.generic = "Ibuprofen".to_string();
    let report = service.record_intake(other).await.unwrap();
    assert_eq!(report.outcome, IntakeOutcome::CreatedMedicine);
    assert_ne!(report.medicine.id, id);

    assert_eq!(service.database().medicines().count().await.unwrap(), 2);
}

#[tokio::test]
async fn intake_rejects_batch_identity_collision() {
    let service = service().await;
    service.record_intake(intake("B1", 200, 100)).await.unwrap();

    // Same batch number, different price: identity collision
    let err = service.record_intake(intake("B1", 250, 10)).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Core(CoreError::DuplicateBatch { .. })
    ));
}

#[tokio::test]
async fn intake_rejects_invalid_input_before_mutation() {
    let service = service().await;

    let err = service.record_intake(intake("B1", 200, 0)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Core(CoreError::Validation(_))));

    let err = service.record_intake(intake("B1", -5, 10)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Core(CoreError::Validation(_))));

    // Nothing was created
    assert_eq!(service.database().medicines().count().await.unwrap(), 0);
}

// =============================================================================
// Receipts
// =============================================================================

#[tokio::test]
async fn receipt_over_depletion_fails_and_leaves_ledger_unchanged() {
    let service = service().await;
    let med = service
        .record_intake(intake("B1", 200, 150))
        .await
        .unwrap()
        .medicine;

    let err = service
        .create_receipt(receipt_request(&med.id, "B1", 160))
        .await
        .unwrap_err();

    match err {
        ServiceError::Core(CoreError::InsufficientStock {
            available,
            requested,
            ..
        }) => {
            assert_eq!(available, 150);
            assert_eq!(requested, 160);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // Ledger untouched, no receipt stored
    let stored = service
        .database()
        .medicines()
        .get_by_id(&med.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.current_stock, 150);
    assert_eq!(service.database().receipts().count().await.unwrap(), 0);
}

#[tokio::test]
async fn receipt_create_then_delete_round_trips_stock() {
    let service = service().await;
    let med = service
        .record_intake(intake("B1", 200, 150))
        .await
        .unwrap()
        .medicine;

    let receipt = service
        .create_receipt(receipt_request(&med.id, "B1", 50))
        .await
        .unwrap();

    assert_eq!(receipt.total_cents, 50 * 200);
    assert_eq!(receipt.lines.len(), 1);
    assert_eq!(receipt.lines[0].name_snapshot, "Paracetamol");

    let stored = service
        .database()
        .medicines()
        .get_by_id(&med.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.current_stock, 100);
    assert_stock_invariant(&service, &med.id).await;

    // Deleting the receipt restores the batch exactly
    let skipped = service.delete_receipt(&receipt.id).await.unwrap();
    assert!(skipped.is_empty());

    let stored = service
        .database()
        .medicines()
        .get_by_id(&med.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.current_stock, 150);
    assert_eq!(stored.find_batch("B1").unwrap().quantity, 150);
    assert_eq!(service.database().receipts().count().await.unwrap(), 0);
}

#[tokio::test]
async fn receipt_total_keeps_creation_time_prices() {
    let service = service().await;
    let med = service
        .record_intake(intake("B1", 200, 100))
        .await
        .unwrap()
        .medicine;

    let receipt = service
        .create_receipt(receipt_request(&med.id, "B1", 10))
        .await
        .unwrap();
    assert_eq!(receipt.total_cents, 2000);

    // A later catalog price change must not alter the stored receipt
    service
        .update_batch(
            "Paracetamol",
            "B1",
            medistock_db::BatchUpdate {
                price_cents: Some(999),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stored = service
        .database()
        .receipts()
        .get_by_id(&receipt.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total_cents, 2000);
    assert_eq!(stored.lines[0].unit_price_cents, 200);
    assert_eq!(stored.computed_total(), stored.total_cents);
}

#[tokio::test]
async fn depleting_batch_to_zero_removes_it_and_prunes_empty_medicine() {
    let service = service().await;
    let med = service
        .record_intake(intake("B1", 200, 40))
        .await
        .unwrap()
        .medicine;
    service.record_intake(intake("B2", 250, 10)).await.unwrap();

    // Deplete B2 to exactly zero: batch removed, medicine survives
    service
        .create_receipt(receipt_request(&med.id, "B2", 10))
        .await
        .unwrap();

    let stored = service
        .database()
        .medicines()
        .get_by_id(&med.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.find_batch("B2").is_none());
    assert_eq!(stored.batches.len(), 1);
    assert_eq!(stored.current_stock, 40);

    // Deplete the last batch: the medicine record itself is gone
    service
        .create_receipt(receipt_request(&med.id, "B1", 40))
        .await
        .unwrap();

    let gone = service
        .database()
        .medicines()
        .get_by_id(&med.id)
        .await
        .unwrap();
    assert!(gone.is_none());
}

#[tokio::test]
async fn receipt_update_reverses_then_applies() {
    let service = service().await;
    let med = service
        .record_intake(intake("B1", 200, 100))
        .await
        .unwrap()
        .medicine;
    service.record_intake(intake("B2", 250, 50)).await.unwrap();

    let receipt = service
        .create_receipt(receipt_request(&med.id, "B1", 60))
        .await
        .unwrap();

    // Replace the 60-from-B1 receipt with 20-from-B2
    let report = service
        .update_receipt(&receipt.id, receipt_request(&med.id, "B2", 20))
        .await
        .unwrap();

    assert!(report.skipped_restores.is_empty());
    assert_eq!(report.receipt.total_cents, 20 * 250);
    assert_eq!(report.receipt.id, receipt.id);

    let stored = service
        .database()
        .medicines()
        .get_by_id(&med.id)
        .await
        .unwrap()
        .unwrap();
    // B1 restored to 100, B2 down to 30
    assert_eq!(stored.find_batch("B1").unwrap().quantity, 100);
    assert_eq!(stored.find_batch("B2").unwrap().quantity, 30);
    assert_stock_invariant(&service, &med.id).await;
}

#[tokio::test]
async fn receipt_update_insufficient_new_lines_rolls_everything_back() {
    let service = service().await;
    let med = service
        .record_intake(intake("B1", 200, 100))
        .await
        .unwrap()
        .medicine;

    let receipt = service
        .create_receipt(receipt_request(&med.id, "B1", 60))
        .await
        .unwrap();

    // 150 > 100 even after the 60 are notionally restored
    let err = service
        .update_receipt(&receipt.id, receipt_request(&med.id, "B1", 150))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Core(CoreError::InsufficientStock { .. })
    ));

    // The failed update must not have restored anything
    let stored = service
        .database()
        .medicines()
        .get_by_id(&med.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.current_stock, 40);

    let stored_receipt = service
        .database()
        .receipts()
        .get_by_id(&receipt.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored_receipt.lines[0].quantity, 60);
}

#[tokio::test]
async fn receipt_delete_after_full_depletion_skips_restoration_best_effort() {
    let service = service().await;
    let med = service
        .record_intake(intake("B1", 200, 40))
        .await
        .unwrap()
        .medicine;

    // Receipt consumes the whole batch; the medicine is pruned
    let receipt = service
        .create_receipt(receipt_request(&med.id, "B1", 40))
        .await
        .unwrap();
    assert!(service
        .database()
        .medicines()
        .get_by_id(&med.id)
        .await
        .unwrap()
        .is_none());

    // Best-effort delete: restoration is skipped and reported, not an error
    let skipped = service.delete_receipt(&receipt.id).await.unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].medicine_id, med.id);
    assert_eq!(skipped[0].quantity, 40);

    // The medicine stays gone; stock history is best-effort here by design
    assert!(service
        .database()
        .medicines()
        .get_by_id(&med.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn receipt_delete_after_full_depletion_fails_under_strict_policy() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let service = PharmacyService::new(db).with_restore_policy(RestorePolicy::Strict);

    let med = service
        .record_intake(intake("B1", 200, 40))
        .await
        .unwrap()
        .medicine;
    let receipt = service
        .create_receipt(receipt_request(&med.id, "B1", 40))
        .await
        .unwrap();

    let err = service.delete_receipt(&receipt.id).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Core(CoreError::MedicineNotFound(_))
    ));

    // Strict mode blocked the delete: the receipt is still there
    assert_eq!(service.database().receipts().count().await.unwrap(), 1);
}

#[tokio::test]
async fn receipt_rejects_unknown_medicine_or_receipt() {
    let service = service().await;

    let err = service
        .create_receipt(receipt_request("no-such-id", "B1", 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Core(CoreError::MedicineNotFound(_))
    ));

    let err = service.delete_receipt("no-such-receipt").await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Core(CoreError::ReceiptNotFound(_))
    ));
}

// =============================================================================
// Sales
// =============================================================================

#[tokio::test]
async fn sale_numbers_are_sequential_and_gap_free_within_a_day() {
    let service = service().await;
    let med = service
        .record_intake(intake("B1", 200, 500))
        .await
        .unwrap()
        .medicine;

    let day = Utc::now().format("%Y%m%d").to_string();

    for expected_seq in 1..=3 {
        let sale = service
            .create_sale(CreateSaleRequest {
                customer_name: "Walk-in".to_string(),
                customer_phone: None,
                lines: vec![line(&med.id, "B1", 5)],
                tax_cents: 0,
                discount_cents: 0,
                payment_method: PaymentMethod::Cash,
                sale_date: None,
            })
            .await
            .unwrap();

        assert_eq!(sale.sale_number, format!("SALE-{day}-{expected_seq:04}"));
    }

    // Depleted 3 × 5 units
    let stored = service
        .database()
        .medicines()
        .get_by_id(&med.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.current_stock, 485);
}

#[tokio::test]
async fn sale_totals_reconcile_and_stats_roll_up() {
    let service = service().await;
    let med = service
        .record_intake(intake("B1", 200, 100))
        .await
        .unwrap()
        .medicine;

    let sale = service
        .create_sale(CreateSaleRequest {
            customer_name: "Jordan Lee".to_string(),
            customer_phone: Some("555-0101".to_string()),
            lines: vec![line(&med.id, "B1", 10)],
            tax_cents: 150,
            discount_cents: 50,
            payment_method: PaymentMethod::Card,
            sale_date: None,
        })
        .await
        .unwrap();

    assert_eq!(sale.subtotal_cents, 2000);
    assert_eq!(sale.total_cents, 2000 + 150 - 50);
    let items_total: i64 = sale.items.iter().map(|i| i.line_total_cents).sum();
    assert_eq!(sale.subtotal_cents, items_total);

    let stats = service.sales_stats().await.unwrap();
    assert_eq!(stats.total_sales, 1);
    assert_eq!(stats.today_sales, 1);
    assert_eq!(stats.today_revenue_cents, sale.total_cents);
    assert_eq!(stats.total_revenue_cents, sale.total_cents);

    let fetched = service
        .database()
        .sales()
        .get_by_number(&sale.sale_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.id, sale.id);
    assert_eq!(fetched.items.len(), 1);
}

// =============================================================================
// Catalog Reads & Dashboard
// =============================================================================

#[tokio::test]
async fn catalog_lookups_find_by_name_generic_and_brand() {
    let service = service().await;
    service.record_intake(intake("B1", 200, 100)).await.unwrap();

    let mut variant = intake("B1", 300, 50);
    variant.name = "Paracetamol Forte".to_string();
    service.record_intake(variant).await.unwrap();

    let repo = service.database().medicines();

    // Exact name plus "name ..." variants
    let by_name = repo.find_by_name("Paracetamol").await.unwrap();
    assert_eq!(by_name.len(), 2);
    assert_eq!(by_name[0].name, "Paracetamol");
    assert_eq!(by_name[1].name, "Paracetamol Forte");

    let by_generic = repo.find_by_generic("Acetaminophen").await.unwrap();
    assert_eq!(by_generic.len(), 2);

    // Case-insensitive substring on brand
    let by_brand = repo.find_by_brand("brandx").await.unwrap();
    assert_eq!(by_brand.len(), 2);

    assert!(repo.find_by_name("Ibuprofen").await.unwrap().is_empty());
}

#[tokio::test]
async fn dashboard_flags_low_stock_and_expired() {
    let service = service().await;

    // Healthy stock, far expiry
    service.record_intake(intake("B1", 200, 100)).await.unwrap();

    // Low stock (5 <= min 10) with an already-expired batch
    let mut expired = intake("E1", 120, 5);
    expired.name = "Aspirin".to_string();
    expired.generic = "Acetylsalicylic Acid".to_string();
    expired.expiry_date = Utc::now() - Duration::days(30);
    service.record_intake(expired).await.unwrap();

    let stats = service.dashboard_stats().await.unwrap();
    assert_eq!(stats.medicines.total, 2);
    assert_eq!(stats.medicines.low_stock, 1);
    assert_eq!(stats.medicines.expired, 1);

    let overview = service.stock_overview().await.unwrap();
    assert_eq!(overview.len(), 2);
    let aspirin = overview.iter().find(|m| m.name == "Aspirin").unwrap();
    assert!(aspirin.is_low_stock);
    assert!(aspirin.has_expired_batch);
    let paracetamol = overview.iter().find(|m| m.name == "Paracetamol").unwrap();
    assert!(!paracetamol.is_low_stock);
    assert!(!paracetamol.has_expired_batch);
}

#[tokio::test]
async fn batch_maintenance_update_and_remove() {
    let service = service().await;
    let med = service
        .record_intake(intake("B1", 200, 100))
        .await
        .unwrap()
        .medicine;
    service.record_intake(intake("B2", 250, 30)).await.unwrap();

    // Adjust quantity directly: aggregate follows
    let updated = service
        .update_batch(
            "Paracetamol",
            "B1",
            medistock_db::BatchUpdate {
                quantity: Some(80),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.current_stock, 110);
    assert_stock_invariant(&service, &med.id).await;

    // Remove one batch
    let removed = service.remove_batch("Paracetamol", "B2").await.unwrap();
    assert!(!removed.medicine_deleted);
    assert_eq!(removed.batch.quantity, 30);
    assert_stock_invariant(&service, &med.id).await;

    // Removing the last batch deletes the medicine entirely
    let removed = service.remove_batch("Paracetamol", "B1").await.unwrap();
    assert!(removed.medicine_deleted);
    assert!(service
        .database()
        .medicines()
        .get_by_id(&med.id)
        .await
        .unwrap()
        .is_none());
}
