//! # Sale Events
//!
//! Notifies observers (dashboards, receipt printers) of confirmed sales.
//!
//! ```text
//!   CheckoutService::commit_sale
//!        │
//!        │ tx.commit() succeeded
//!        ▼
//!   SaleEvents::publish(SaleConfirmed) ──► broadcast::Sender
//!                                              │
//!                          ┌───────────────────┼───────────────────┐
//!                          ▼                   ▼                   ▼
//!                     subscriber 1        subscriber 2        subscriber N
//! ```
//!
//! Events are published only after the transaction commits, so an observer
//! never hears about a sale that was rolled back. A slow subscriber that
//! falls more than the channel capacity behind sees `Lagged` and can catch
//! up with `SaleRepository::confirmed_since`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use keystone_core::Money;

const CHANNEL_CAPACITY: usize = 256;

/// A sale that has been committed as CONFIRMED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleConfirmed {
    pub sale_id: String,
    pub receipt_number: String,
    pub branch_id: String,
    pub operator_id: String,
    pub total: Money,
    pub confirmed_at: DateTime<Utc>,
}

/// Fan-out of sale events. Clones share the same channel.
#[derive(Debug, Clone)]
pub struct SaleEvents {
    tx: broadcast::Sender<SaleConfirmed>,
}

impl SaleEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        SaleEvents { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaleConfirmed> {
        self.tx.subscribe()
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn publish(&self, event: SaleConfirmed) {
        let sale_id = event.sale_id.clone();
        match self.tx.send(event) {
            Ok(receivers) => debug!(%sale_id, receivers, "Published SaleConfirmed"),
            Err(_) => debug!(%sale_id, "No subscribers for SaleConfirmed"),
        }
    }
}

impl Default for SaleEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> SaleConfirmed {
        SaleConfirmed {
            sale_id: id.to_string(),
            receipt_number: "20240301-0001".to_string(),
            branch_id: "b1".to_string(),
            operator_id: "op".to_string(),
            total: Money::from_cents(1_000),
            confirmed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let events = SaleEvents::new();
        let mut a = events.subscribe();
        let mut b = events.clone().subscribe();

        events.publish(event("s1"));

        assert_eq!(a.recv().await.unwrap().sale_id, "s1");
        assert_eq!(b.recv().await.unwrap().sale_id, "s1");
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let events = SaleEvents::new();
        events.publish(event("s1"));
    }
}
