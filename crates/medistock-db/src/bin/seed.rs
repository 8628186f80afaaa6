//! # Seed Data Generator
//!
//! Populates the database with a demo formulary for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p medistock-db --bin seed
//!
//! # Specify database path
//! cargo run -p medistock-db --bin seed -- --db ./data/medistock.db
//! ```
//!
//! Every medicine is created through `PharmacyService::record_intake`, so the
//! seed run exercises the same reconciliation path production traffic takes:
//! repeated deliveries of the same lot merge, new lots append.

use chrono::{Duration, Utc};
use std::env;

use medistock_core::StockIntake;
use medistock_db::{Database, DbConfig, PharmacyService};

/// Demo formulary: (name, generic, brand, category, form, strength, price cents)
const MEDICINES: &[(&str, &str, &str, &str, &str, &str, i64)] = &[
    ("Paracetamol 500", "Acetaminophen", "BrandX", "Analgesic", "tablet", "500mg", 200),
    ("Paracetamol Syrup", "Acetaminophen", "BrandX", "Analgesic", "syrup", "120mg/5ml", 450),
    ("Ibuprofen 400", "Ibuprofen", "BrandY", "NSAID", "tablet", "400mg", 150),
    ("Amoxicillin 250", "Amoxicillin", "CurePharm", "Antibiotic", "capsule", "250mg", 550),
    ("Amoxicillin 500", "Amoxicillin", "CurePharm", "Antibiotic", "capsule", "500mg", 900),
    ("Omeprazole 20", "Omeprazole", "GastroCare", "Antacid", "capsule", "20mg", 700),
    ("Cetirizine 10", "Cetirizine", "AllerFree", "Antihistamine", "tablet", "10mg", 120),
    ("Metformin 500", "Metformin", "GlucoWell", "Antidiabetic", "tablet", "500mg", 320),
    ("Amlodipine 5", "Amlodipine", "CardioPlus", "Antihypertensive", "tablet", "5mg", 280),
    ("Salbutamol Inhaler", "Salbutamol", "BreathEasy", "Bronchodilator", "inhaler", "100mcg", 1250),
    ("ORS Sachet", "Oral Rehydration Salts", "HydraLife", "Electrolyte", "powder", "20.5g", 80),
    ("Azithromycin 500", "Azithromycin", "CurePharm", "Antibiotic", "tablet", "500mg", 1100),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./medistock_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("MediStock Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./medistock_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 MediStock Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing medicines
    let existing = db.medicines().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} medicines", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let service = PharmacyService::new(db.clone());

    println!();
    println!("Recording stock intakes...");

    let now = Utc::now();
    let mut intakes = 0;

    for (idx, (name, generic, brand, category, form, strength, price)) in
        MEDICINES.iter().enumerate()
    {
        // Two lots per medicine: a near-expiry one and a fresh one
        for (lot, months_to_expiry, quantity) in
            [(1u32, 4 + (idx as i64 % 6), 60), (2u32, 18, 140)]
        {
            let intake = StockIntake {
                name: name.to_string(),
                generic: generic.to_string(),
                brand: brand.to_string(),
                category: Some(category.to_string()),
                form: Some(form.to_string()),
                strength: Some(strength.to_string()),
                min_stock_level: Some(20),
                batch_number: format!("B{:03}-{}", idx + 1, lot),
                expiry_date: now + Duration::days(30 * months_to_expiry),
                price_cents: *price,
                quantity,
            };

            service.record_intake(intake).await?;
            intakes += 1;
        }
    }

    println!("✓ Recorded {} intakes", intakes);

    let medicines = db.medicines().count().await?;
    let stats = service.dashboard_stats().await?;

    println!();
    println!("Summary");
    println!("  Medicines:  {}", medicines);
    println!("  Low stock:  {}", stats.medicines.low_stock);
    println!("  Expired:    {}", stats.medicines.expired);
    println!();
    println!("Dashboard snapshot:");
    println!("{}", serde_json::to_string_pretty(&stats)?);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}
