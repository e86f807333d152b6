//! Shared fixtures for service tests.
//!
//! A branch with a flagged front location and a reserve found by name,
//! three products, and a manual clock at 2024-03-01 14:00 UTC. The branch
//! calendar is UTC with a 22:00 cutoff.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::clock::{Clock, ManualClock};
use crate::events::SaleEvents;
use crate::pool::{Database, DbConfig};
use crate::repository::stock::StockRepository;
use crate::services::{CheckoutService, InventoryService, RegisterService};
use keystone_core::{BusinessCalendar, LocationRole, Money, PricingPolicy, Product, Quantity};

pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub fn units(n: i64) -> Quantity {
    Quantity::from_units(n)
}

pub struct Fixture {
    pub db: Database,
    pub clock: Arc<ManualClock>,
    pub events: SaleEvents,
    pub branch_id: String,
    pub front_id: String,
    pub reserve_id: String,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_config(DbConfig::in_memory()).await
    }

    pub async fn with_config(config: DbConfig) -> Self {
        let db = Database::new(config).await.unwrap();
        let clock = Arc::new(ManualClock::new(utc("2024-03-01T14:00:00Z")));
        let now = clock.now();

        let branch = db.branches().insert("Centro", now).await.unwrap();
        let front = db
            .branches()
            .insert_location(&branch.id, "Mostrador", Some(LocationRole::Front), now)
            .await
            .unwrap();
        let reserve = db
            .branches()
            .insert_location(&branch.id, "Back Room", None, now)
            .await
            .unwrap();

        for (id, price, wholesale, archived) in [
            ("p1", 1_000, Some(800), false),
            ("p2", 500, None, false),
            ("archived", 700, None, true),
        ] {
            db.products()
                .insert(&Product {
                    id: id.to_string(),
                    sku: format!("SKU-{}", id),
                    barcode: None,
                    name: format!("Product {}", id),
                    sale_price: Money::from_cents(price),
                    wholesale_price: wholesale.map(Money::from_cents),
                    tax_rate_bps: 0,
                    is_active: true,
                    is_archived: archived,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }

        Fixture {
            db,
            clock,
            events: SaleEvents::new(),
            branch_id: branch.id,
            front_id: front.id,
            reserve_id: reserve.id,
        }
    }

    pub fn calendar() -> BusinessCalendar {
        BusinessCalendar::parse("UTC", "22:00").unwrap()
    }

    fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn inventory(&self) -> InventoryService {
        InventoryService::new(self.db.clone(), self.clock())
    }

    pub fn register(&self) -> RegisterService {
        RegisterService::new(self.db.clone(), Self::calendar(), self.clock())
    }

    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(
            self.db.clone(),
            self.register(),
            PricingPolicy::default(),
            self.events.clone(),
            self.clock(),
        )
    }

    pub async fn stock_front(&self, product_id: &str, quantity: Quantity) {
        self.stock(product_id, &self.front_id, quantity).await;
    }

    pub async fn stock_reserve(&self, product_id: &str, quantity: Quantity) {
        self.stock(product_id, &self.reserve_id, quantity).await;
    }

    async fn stock(&self, product_id: &str, location_id: &str, quantity: Quantity) {
        let mut tx = self.db.begin().await.unwrap();
        StockRepository::credit(&mut *tx, product_id, location_id, quantity, self.clock.now())
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    pub async fn front_qty(&self, product_id: &str) -> Quantity {
        self.db.stock().quantity(product_id, &self.front_id).await.unwrap()
    }

    pub async fn reserve_qty(&self, product_id: &str) -> Quantity {
        self.db.stock().quantity(product_id, &self.reserve_id).await.unwrap()
    }

    pub async fn movement_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM movements")
            .fetch_one(self.db.pool())
            .await
            .unwrap()
    }
}
