use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use mongodb::bson::Document;

use crate::models::{DailyTimings, NewMosque};
use crate::store::{DocumentStore, MemoryStore, StoreError};
use crate::timings_client::{ProviderError, TimingProvider};

pub fn memory_store() -> Arc<dyn DocumentStore> {
    Arc::new(MemoryStore::new())
}

pub fn new_mosque(name: &str) -> NewMosque {
    NewMosque {
        name: name.to_string(),
        phone: Some("+1 555 0100".to_string()),
        alternate_phone: None,
        address: "123 Main Street".to_string(),
        district: None,
        city: "New York".to_string(),
        state: Some("NY".to_string()),
        country: "USA".to_string(),
        latitude: Some(40.7128),
        longitude: Some(-74.0060),
    }
}

pub fn timings(fajr: &str, dhuhr: &str, asr: &str, maghrib: &str, isha: &str) -> DailyTimings {
    DailyTimings {
        fajr: fajr.to_string(),
        dhuhr: dhuhr.to_string(),
        asr: asr.to_string(),
        maghrib: maghrib.to_string(),
        isha: isha.to_string(),
    }
}

/// Provider double that counts calls and answers with a fixed result.
pub struct FakeProvider {
    response: Option<DailyTimings>,
    calls: AtomicUsize,
    last_request: Mutex<Option<(NaiveDate, f64, f64)>>,
}

impl FakeProvider {
    pub fn answering(timings: DailyTimings) -> Arc<Self> {
        Arc::new(Self {
            response: Some(timings),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            response: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(NaiveDate, f64, f64)> {
        *self.last_request.lock().unwrap()
    }
}

#[async_trait]
impl TimingProvider for FakeProvider {
    async fn fetch(
        &self,
        date: NaiveDate,
        latitude: f64,
        longitude: f64,
    ) -> Result<DailyTimings, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some((date, latitude, longitude));
        self.response
            .clone()
            .ok_or_else(|| ProviderError::Malformed("upstream timed out".to_string()))
    }
}

/// A `MemoryStore` that can act as if it lost a race with another writer.
///
/// `hide_lookups(c, n)` makes the next `n` `find_one` calls on `c` miss even when a document
/// matches; `fail_deletes(c)` makes every delete on `c` fail.
#[derive(Default)]
pub struct RacingStore {
    inner: MemoryStore,
    hidden: Mutex<HashMap<String, usize>>,
    failing_deletes: Mutex<HashSet<String>>,
}

impl RacingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn hide_lookups(&self, collection: &str, count: usize) {
        self.hidden
            .lock()
            .unwrap()
            .insert(collection.to_string(), count);
    }

    pub fn fail_deletes(&self, collection: &str) {
        self.failing_deletes
            .lock()
            .unwrap()
            .insert(collection.to_string());
    }

    fn take_hidden(&self, collection: &str) -> bool {
        let mut hidden = self.hidden.lock().unwrap();
        match hidden.get_mut(collection) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl DocumentStore for RacingStore {
    async fn ensure_unique(&self, collection: &str, fields: &[&str]) -> Result<(), StoreError> {
        self.inner.ensure_unique(collection, fields).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        if self.take_hidden(collection) {
            return Ok(None);
        }
        self.inner.find_one(collection, filter).await
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
        limit: Option<i64>,
    ) -> Result<Vec<Document>, StoreError> {
        self.inner.find_many(collection, filter, sort, limit).await
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        self.inner.insert(collection, document).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<u64, StoreError> {
        self.inner.update_one(collection, filter, update).await
    }

    async fn replace_or_insert(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
    ) -> Result<(), StoreError> {
        self.inner.replace_or_insert(collection, filter, document).await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, StoreError> {
        if self.failing_deletes.lock().unwrap().contains(collection) {
            return Err(StoreError::Unavailable(format!("delete on {} refused", collection)));
        }
        self.inner.delete_many(collection, filter).await
    }
}
