use std::sync::Arc;

use chrono::Utc;
use log::info;
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;

use super::{normalize_base64, require_text, search_pattern, LIST_LIMIT};
use crate::error::ServiceError;
use crate::models::{Mosque, NewMosque, MOSQUES};
use crate::store::{from_record, to_record, DocumentStore};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MosqueSort {
    #[default]
    Name,
    City,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Default, Deserialize)]
pub struct MosqueQuery {
    pub search: Option<String>,
    pub city: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<MosqueSort>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<SortOrder>,
}

/// Plain mosque records. No approval workflow: a mosque is visible once created.
#[derive(Clone)]
pub struct MosqueDirectory {
    store: Arc<dyn DocumentStore>,
}

impl MosqueDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new: NewMosque) -> Result<Mosque, ServiceError> {
        require_text("name", &new.name)?;
        require_text("address", &new.address)?;
        require_text("city", &new.city)?;
        require_text("country", &new.country)?;

        let mosque = Mosque {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            phone: new.phone,
            alternate_phone: new.alternate_phone,
            address: new.address,
            district: new.district,
            city: new.city,
            state: new.state,
            country: new.country,
            latitude: new.latitude,
            longitude: new.longitude,
            donation_qr_code: None,
            created_at: Utc::now(),
        };
        self.store.insert(MOSQUES, to_record(&mosque)?).await?;
        info!("Mosque created: {} ({})", mosque.name, mosque.id);
        Ok(mosque)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Mosque>, ServiceError> {
        match self.store.find_one(MOSQUES, doc! { "id": id }).await? {
            Some(document) => Ok(Some(from_record(document)?)),
            None => Ok(None),
        }
    }

    pub async fn require(&self, id: &str) -> Result<Mosque, ServiceError> {
        self.get(id).await?.ok_or(ServiceError::MosqueNotFound)
    }

    pub async fn list(&self, query: &MosqueQuery) -> Result<Vec<Mosque>, ServiceError> {
        let documents = self
            .store
            .find_many(MOSQUES, doc! {}, None, Some(LIST_LIMIT))
            .await?;
        let mut mosques = documents
            .into_iter()
            .map(from_record::<Mosque>)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = search_pattern(search)?;
            mosques.retain(|m| pattern.is_match(&m.name));
        }
        if let Some(city) = query.city.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = search_pattern(city)?;
            mosques.retain(|m| pattern.is_match(&m.city));
        }

        let sort_by = query.sort_by.unwrap_or_default();
        mosques.sort_by(|a, b| match sort_by {
            MosqueSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            MosqueSort::City => a.city.to_lowercase().cmp(&b.city.to_lowercase()),
            MosqueSort::CreatedAt => a.created_at.cmp(&b.created_at),
        });
        if let SortOrder::Desc = query.sort_order.unwrap_or_default() {
            mosques.reverse();
        }
        Ok(mosques)
    }

    /// Mosques for the given ids; unknown ids are skipped.
    pub async fn many(&self, ids: &[String]) -> Result<Vec<Mosque>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let documents = self
            .store
            .find_many(MOSQUES, doc! { "id": { "$in": ids } }, None, Some(LIST_LIMIT))
            .await?;
        documents
            .into_iter()
            .map(|d| from_record(d).map_err(ServiceError::from))
            .collect()
    }

    pub async fn set_donation_qr(&self, id: &str, encoded: &str) -> Result<(), ServiceError> {
        let qr = normalize_base64("donation_qr_code", encoded)?;
        let matched = self
            .store
            .update_one(MOSQUES, doc! { "id": id }, doc! { "$set": { "donation_qr_code": qr } })
            .await?;
        if matched == 0 {
            return Err(ServiceError::MosqueNotFound);
        }
        info!("Donation QR updated for mosque {}", id);
        Ok(())
    }

    pub(crate) async fn remove(&self, id: &str) -> Result<(), ServiceError> {
        self.store.delete_many(MOSQUES, doc! { "id": id }).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{new_mosque, memory_store};

    #[tokio::test]
    async fn list_searches_and_sorts_case_insensitively() {
        let mosques = MosqueDirectory::new(memory_store());
        for (name, city) in [
            ("masjid al-rahman", "Los Angeles"),
            ("Al-Noor Mosque", "New York"),
            ("Baitul Mukarram", "new york"),
        ] {
            let mut new = new_mosque(name);
            new.city = city.to_string();
            mosques.create(new).await.unwrap();
        }

        let all = mosques.list(&MosqueQuery::default()).await.unwrap();
        let names: Vec<&str> = all.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Al-Noor Mosque", "Baitul Mukarram", "masjid al-rahman"]);

        let query = MosqueQuery {
            city: Some("NEW YORK".into()),
            sort_order: Some(SortOrder::Desc),
            ..Default::default()
        };
        let names: Vec<String> = mosques
            .list(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["Baitul Mukarram", "Al-Noor Mosque"]);

        let query = MosqueQuery {
            search: Some("noor".into()),
            ..Default::default()
        };
        assert_eq!(mosques.list(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_requires_core_fields() {
        let mosques = MosqueDirectory::new(memory_store());
        let mut new = new_mosque("Al-Noor");
        new.country = "  ".into();
        assert!(matches!(
            mosques.create(new).await,
            Err(ServiceError::MissingField("country"))
        ));
    }

    #[tokio::test]
    async fn donation_qr_needs_existing_mosque() {
        let mosques = MosqueDirectory::new(memory_store());
        assert!(matches!(
            mosques.set_donation_qr("nope", "aGVsbG8=").await,
            Err(ServiceError::MosqueNotFound)
        ));

        let mosque = mosques.create(new_mosque("Al-Noor")).await.unwrap();
        mosques.set_donation_qr(&mosque.id, "aGVsbG8=").await.unwrap();
        let stored = mosques.require(&mosque.id).await.unwrap();
        assert_eq!(stored.donation_qr_code.as_deref(), Some("aGVsbG8="));
    }
}
