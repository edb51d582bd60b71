// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Observable holder for the latest forecast.
//!
//! The store is passed explicitly to its consumers. Each consumer takes a
//! [`StoreSubscription`] and drops (or [`unsubscribe`](StoreSubscription::unsubscribe)s)
//! it when it is torn down.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::watch;

use crate::forecast::ForecastPayload;
use crate::geo::Coordinate;

/// A forecast together with the coordinate it was requested for.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSnapshot {
    /// The requested coordinate (the payload carries the grid-snapped one).
    pub coordinate: Coordinate,
    pub payload: ForecastPayload,
    pub fetched_at: DateTime<Utc>,
}

impl ForecastSnapshot {
    #[must_use]
    pub fn new(coordinate: Coordinate, payload: ForecastPayload) -> Self {
        Self {
            coordinate,
            payload,
            fetched_at: Utc::now(),
        }
    }
}

type Slot = Option<Arc<ForecastSnapshot>>;

/// Process-wide holder of the latest forecast; cheap to clone.
#[derive(Debug, Clone)]
pub struct WeatherDataStore {
    tx: Arc<watch::Sender<Slot>>,
}

impl WeatherDataStore {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the stored snapshot and notify every subscriber.
    pub fn publish(&self, snapshot: ForecastSnapshot) {
        debug!(
            "Publishing forecast for {} to {} subscriber(s)",
            snapshot.coordinate,
            self.tx.receiver_count()
        );
        self.tx.send_replace(Some(Arc::new(snapshot)));
    }

    /// The most recently published snapshot, if any.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<ForecastSnapshot>> {
        self.tx.borrow().clone()
    }

    /// Subscribe to updates. A snapshot already present is delivered first.
    #[must_use]
    pub fn subscribe(&self) -> StoreSubscription {
        let rx = self.tx.subscribe();
        let pending = rx.borrow().clone();
        StoreSubscription { rx, pending }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for WeatherDataStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription handle; dropping it unsubscribes.
#[derive(Debug)]
pub struct StoreSubscription {
    rx: watch::Receiver<Slot>,
    pending: Slot,
}

impl StoreSubscription {
    /// Wait for the next snapshot.
    ///
    /// Returns `None` once every store handle has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<ForecastSnapshot>> {
        if let Some(snapshot) = self.pending.take() {
            return Some(snapshot);
        }

        loop {
            self.rx.changed().await.ok()?;
            if let Some(snapshot) = self.rx.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }

    /// Non-blocking variant of [`changed`](Self::changed) for polling from a UI frame.
    pub fn poll(&mut self) -> Option<Arc<ForecastSnapshot>> {
        if let Some(snapshot) = self.pending.take() {
            return Some(snapshot);
        }

        match self.rx.has_changed() {
            Ok(true) => self.rx.borrow_and_update().clone(),
            _ => None,
        }
    }

    /// Explicitly end the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::payload::fixtures::SAMPLE;

    fn snapshot(lat: f64) -> ForecastSnapshot {
        ForecastSnapshot::new(
            Coordinate::try_new(lat, 77.59).unwrap(),
            ForecastPayload::from_json(SAMPLE).unwrap(),
        )
    }

    #[test]
    fn test_publish_and_latest() {
        let store = WeatherDataStore::new();
        assert!(store.latest().is_none());

        store.publish(snapshot(12.0));
        assert_eq!(store.latest().unwrap().coordinate.latitude(), 12.0);
    }

    #[test]
    fn test_poll_sees_only_new_values() {
        let store = WeatherDataStore::new();
        let mut sub = store.subscribe();
        assert!(sub.poll().is_none());

        store.publish(snapshot(1.0));
        assert_eq!(sub.poll().unwrap().coordinate.latitude(), 1.0);
        assert!(sub.poll().is_none());

        store.publish(snapshot(2.0));
        store.publish(snapshot(3.0));
        assert_eq!(sub.poll().unwrap().coordinate.latitude(), 3.0);
    }

    #[test]
    fn test_late_subscriber_gets_current_value() {
        let store = WeatherDataStore::new();
        store.publish(snapshot(5.0));

        let mut sub = store.subscribe();
        assert_eq!(sub.poll().unwrap().coordinate.latitude(), 5.0);
        assert!(sub.poll().is_none());
    }

    #[test]
    fn test_unsubscribe_releases_receiver() {
        let store = WeatherDataStore::new();
        let a = store.subscribe();
        let b = store.subscribe();
        assert_eq!(store.subscriber_count(), 2);

        a.unsubscribe();
        assert_eq!(store.subscriber_count(), 1);
        drop(b);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_changed_waits_for_publish() {
        let store = WeatherDataStore::new();
        let mut sub = store.subscribe();

        let publisher = store.clone();
        tokio::spawn(async move {
            publisher.publish(snapshot(7.0));
        });

        let got = sub.changed().await.unwrap();
        assert_eq!(got.coordinate.latitude(), 7.0);
    }

    #[tokio::test]
    async fn test_changed_ends_when_store_dropped() {
        let store = WeatherDataStore::new();
        let mut sub = store.subscribe();
        drop(store);
        assert!(sub.changed().await.is_none());
    }
}
