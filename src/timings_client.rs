use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::config::TimingsConfig;
use crate::models::DailyTimings;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider responded with {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed timings payload: {0}")]
    Malformed(String),
}

/// Source of computed daily prayer times for a coordinate.
#[async_trait]
pub trait TimingProvider: Send + Sync {
    async fn fetch(
        &self,
        date: NaiveDate,
        latitude: f64,
        longitude: f64,
    ) -> Result<DailyTimings, ProviderError>;

    /// Used in logs.
    fn name(&self) -> &str {
        "TimingProvider"
    }
}

/// Client for the Aladhan `/timings/{date}` endpoint.
pub struct AladhanClient {
    http: reqwest::Client,
    base_url: String,
    method: u8,
}

impl AladhanClient {
    pub fn new(config: &TimingsConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            method: config.method,
        })
    }
}

#[derive(Deserialize)]
struct TimingsEnvelope {
    data: TimingsData,
}

#[derive(Deserialize)]
struct TimingsData {
    timings: ProviderTimings,
}

#[derive(Deserialize)]
struct ProviderTimings {
    #[serde(rename = "Fajr")]
    fajr: String,
    #[serde(rename = "Dhuhr")]
    dhuhr: String,
    #[serde(rename = "Asr")]
    asr: String,
    #[serde(rename = "Maghrib")]
    maghrib: String,
    #[serde(rename = "Isha")]
    isha: String,
}

/// Pulls the five daily times out of an Aladhan response body.
pub fn parse_timings(body: &str) -> Result<DailyTimings, ProviderError> {
    let envelope: TimingsEnvelope =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    let t = envelope.data.timings;
    let timings = DailyTimings {
        fajr: t.fajr,
        dhuhr: t.dhuhr,
        asr: t.asr,
        maghrib: t.maghrib,
        isha: t.isha,
    };
    match timings.first_missing() {
        Some(field) => Err(ProviderError::Malformed(format!("empty {}", field))),
        None => Ok(timings),
    }
}

#[async_trait]
impl TimingProvider for AladhanClient {
    async fn fetch(
        &self,
        date: NaiveDate,
        latitude: f64,
        longitude: f64,
    ) -> Result<DailyTimings, ProviderError> {
        // the provider wants DD-MM-YYYY in the path
        let url = format!("{}/timings/{}", self.base_url, date.format("%d-%m-%Y"));
        debug!("Fetching timings from {} for ({}, {})", url, latitude, longitude);

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("method", self.method.to_string()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ProviderError::Status(resp.status()));
        }
        let body = resp.text().await?;
        parse_timings(&body)
    }

    fn name(&self) -> &str {
        "aladhan"
    }
}
