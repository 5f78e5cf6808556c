use std::sync::Arc;

use log::{debug, error, info};
use mongodb::bson::{doc, Document};
use serde::Deserialize;

use super::mosques::MosqueDirectory;
use crate::error::ServiceError;
use crate::models::{parse_date, DailyTimings, PrayerTimeRecord, DATE_FORMAT, PRAYER_TIMES};
use crate::store::{from_record, to_record, DocumentStore, StoreError};
use crate::timings_client::TimingProvider;

/// Admin-entered times for one mosque and date.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualTimes {
    pub mosque_id: String,
    pub date: String,
    #[serde(flatten)]
    pub timings: DailyTimings,
}

/// Decides which times a mosque observes on a date.
///
/// A manual record wins over a cached one; with neither, the provider is asked once and
/// its answer is cached without expiry.
#[derive(Clone)]
pub struct PrayerTimeResolver {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn TimingProvider>,
    mosques: MosqueDirectory,
}

fn key(mosque_id: &str, date: &str, is_manual: bool) -> Document {
    doc! { "mosque_id": mosque_id, "date": date, "is_manual": is_manual }
}

impl PrayerTimeResolver {
    pub fn new(store: Arc<dyn DocumentStore>, provider: Arc<dyn TimingProvider>) -> Self {
        Self {
            mosques: MosqueDirectory::new(store.clone()),
            store,
            provider,
        }
    }

    /// At most one manual and one cached record per (mosque, date).
    pub async fn prepare(&self) -> Result<(), ServiceError> {
        self.store
            .ensure_unique(PRAYER_TIMES, &["mosque_id", "date", "is_manual"])
            .await?;
        Ok(())
    }

    pub async fn resolve(&self, mosque_id: &str, date: &str) -> Result<PrayerTimeRecord, ServiceError> {
        let day = parse_date(date)?;
        let date = day.format(DATE_FORMAT).to_string();

        if let Some(record) = self.lookup(mosque_id, &date, true).await? {
            return Ok(record);
        }
        if let Some(record) = self.lookup(mosque_id, &date, false).await? {
            debug!("Serving cached prayer times for {} on {}", mosque_id, date);
            return Ok(record);
        }

        let mosque = self.mosques.require(mosque_id).await?;
        let (latitude, longitude) = mosque.coordinates().ok_or(ServiceError::MissingCoordinates)?;

        let timings = self
            .provider
            .fetch(day, latitude, longitude)
            .await
            .map_err(|err| {
                error!(
                    "{} failed for mosque {} on {}: {}",
                    self.provider.name(),
                    mosque_id,
                    date,
                    err
                );
                ServiceError::ProviderUnavailable
            })?;

        let record = PrayerTimeRecord::new(mosque_id, day, timings, false);
        match self.store.insert(PRAYER_TIMES, to_record(&record)?).await {
            Ok(()) => {
                info!("Cached provider prayer times for {} on {}", mosque_id, date);
                Ok(record)
            }
            // a concurrent resolve cached first; serve what it stored
            Err(StoreError::Conflict(_)) => Ok(self
                .lookup(mosque_id, &date, false)
                .await?
                .unwrap_or(record)),
            Err(err) => Err(err.into()),
        }
    }

    /// Replaces whatever is recorded for the mosque and date with manual times.
    pub async fn set_manual(&self, manual: ManualTimes) -> Result<PrayerTimeRecord, ServiceError> {
        let day = parse_date(&manual.date)?;
        if let Some(field) = manual.timings.first_missing() {
            return Err(ServiceError::MissingField(field));
        }
        self.mosques.require(&manual.mosque_id).await?;

        let record = PrayerTimeRecord::new(&manual.mosque_id, day, manual.timings, true);
        self.store
            .replace_or_insert(
                PRAYER_TIMES,
                key(&record.mosque_id, &record.date, true),
                to_record(&record)?,
            )
            .await?;
        // the manual record is already visible, so readers never see an empty gap
        let dropped = self
            .store
            .delete_many(PRAYER_TIMES, key(&record.mosque_id, &record.date, false))
            .await?;
        info!(
            "Manual prayer times set for {} on {} ({} cached record(s) superseded)",
            record.mosque_id, record.date, dropped
        );
        Ok(record)
    }

    async fn lookup(
        &self,
        mosque_id: &str,
        date: &str,
        is_manual: bool,
    ) -> Result<Option<PrayerTimeRecord>, ServiceError> {
        match self
            .store
            .find_one(PRAYER_TIMES, key(mosque_id, date, is_manual))
            .await?
        {
            Some(document) => Ok(Some(from_record(document)?)),
            None => Ok(None),
        }
    }
}
