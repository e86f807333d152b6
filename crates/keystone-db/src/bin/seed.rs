//! # Seed Data Generator
//!
//! Creates a demo branch with stock for development.
//!
//! ## Usage
//! ```bash
//! # Demo branch with 60 products (default)
//! cargo run -p keystone-db --bin seed
//!
//! # Custom amount
//! cargo run -p keystone-db --bin seed -- --count 200
//!
//! # Specify database path
//! cargo run -p keystone-db --bin seed -- --db ./data/keystone.db
//! ```
//!
//! ## Generated Data
//! - Branch "Demo Branch" with a front ("Sales Floor") and a reserve
//!   ("Warehouse") location
//! - Products across categories, SKU `{CATEGORY}-{NAME}-{INDEX}`; every
//!   third product carries a wholesale price
//! - Opening stock received as IN movements: a few units on the front,
//!   the rest in reserve

use std::env;
use std::sync::Arc;

use chrono::Utc;
use keystone_core::{LocationRole, Money, Product, Quantity};
use keystone_db::{init_tracing, Database, DbConfig, InventoryService, SystemClock};
use uuid::Uuid;

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Cola", "Lemon Soda", "Mineral Water", "Orange Juice", "Apple Juice", "Iced Tea",
            "Energy Drink", "Ground Coffee", "Hot Chocolate", "Tonic Water",
        ],
    ),
    (
        "SNK",
        &[
            "Potato Chips", "Tortilla Chips", "Salted Peanuts", "Chocolate Bar", "Gummy Bears",
            "Butter Cookies", "Pretzels", "Popcorn", "Granola Bar", "Crackers",
        ],
    ),
    (
        "DRY",
        &[
            "Whole Milk", "Skim Milk", "Oat Milk", "Cheddar Cheese", "Mozzarella", "Butter",
            "Greek Yogurt", "Sour Cream", "Eggs Dozen", "Cream Cheese",
        ],
    ),
    (
        "GRO",
        &[
            "Spaghetti", "White Rice", "Black Beans", "Canned Tuna", "Tomato Sauce", "Olive Oil",
            "Wheat Flour", "Sugar", "Table Salt", "Oatmeal",
        ],
    ),
];

/// Sizes with price add-ons (cents)
const SIZES: &[(&str, i64)] = &[("Small", 0), ("Regular", 75), ("Large", 150)];

/// Tax rates in basis points
const TAX_RATES: &[u32] = &[0, 500, 825, 1600];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 60;
    let mut db_path = String::from("./keystone_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(60);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Keystone POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 60)");
                println!("  -d, --db <PATH>    Database file path (default: ./keystone_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Keystone POS Seed Data Generator");
    println!("===================================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Branch and locations
    let now = Utc::now();
    let branch = db.branches().insert("Demo Branch", now).await?;
    let front = db
        .branches()
        .insert_location(&branch.id, "Sales Floor", Some(LocationRole::Front), now)
        .await?;
    let reserve = db
        .branches()
        .insert_location(&branch.id, "Warehouse", Some(LocationRole::Reserve), now)
        .await?;

    println!("✓ Branch {} ({})", branch.name, branch.id);
    println!("  front:   {} ({})", front.name, front.id);
    println!("  reserve: {} ({})", reserve.name, reserve.id);

    // Products and opening stock
    println!();
    println!("Generating products...");

    let inventory = InventoryService::new(db.clone(), Arc::new(SystemClock));
    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for (category_idx, (category_code, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size_name, price_addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + name_idx * 20 + size_idx;
                let product = generate_product(category_code, name, size_name, *price_addon, seed);

                if let Err(e) = db.products().insert(&product).await {
                    eprintln!("Failed to insert {}: {}", product.sku, e);
                    continue;
                }

                let front_units = (seed % 7) as i64;
                let reserve_units = 10 + (seed % 40) as i64;
                let unit_cost = Some(Money::from_cents(product.sale_price.cents() * 65 / 100));

                for (location_id, units) in [(&front.id, front_units), (&reserve.id, reserve_units)] {
                    if units == 0 {
                        continue;
                    }
                    inventory
                        .receive(
                            &branch.id,
                            "seed",
                            location_id,
                            &product.id,
                            Quantity::from_units(units),
                            unit_cost,
                            "Opening stock",
                        )
                        .await?;
                }

                generated += 1;
                if generated % 50 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products with stock in {:?}", generated, elapsed);

    println!();
    println!("✓ Seed complete!");
    println!("  Branch id for testing: {}", branch.id);

    Ok(())
}

/// Generates a single product with realistic data.
fn generate_product(category: &str, name: &str, size: &str, price_addon: i64, seed: usize) -> Product {
    let now = Utc::now();

    let compact: String = name.chars().filter(|c| c.is_alphanumeric()).take(3).collect();
    let sku = format!("{}-{}-{:04}", category, compact.to_uppercase(), seed);

    // EAN-13 shaped, checksum not valid
    let barcode = Some(format!("750{:010}", seed));

    // $1.49 - $9.48 plus size addon
    let sale_cents = 149 + ((seed * 17) % 800) as i64 + price_addon;

    // Every third product sells cheaper by the dozen
    let wholesale_price = (seed % 3 == 0).then(|| Money::from_cents(sale_cents * 85 / 100));

    Product {
        id: Uuid::new_v4().to_string(),
        sku,
        barcode,
        name: format!("{} {}", name, size),
        sale_price: Money::from_cents(sale_cents),
        wholesale_price,
        tax_rate_bps: TAX_RATES[seed % TAX_RATES.len()],
        is_active: true,
        is_archived: false,
        created_at: now,
        updated_at: now,
    }
}
