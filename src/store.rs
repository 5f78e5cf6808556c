use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use mongodb::bson::{self, Bson, Document};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated in {0}")]
    Conflict(String),

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("unsupported update operator {0}")]
    Unsupported(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Flat document storage keyed by collection name.
///
/// Filters are equality predicates; a `{ "$in": [...] }` value matches any listed value.
/// Updates take `$set`, `$addToSet` and `$pull`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Declares that no two documents in `collection` may share values for all of `fields`.
    async fn ensure_unique(&self, collection: &str, fields: &[&str]) -> Result<(), StoreError>;

    async fn find_one(&self, collection: &str, filter: Document)
        -> Result<Option<Document>, StoreError>;

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
        limit: Option<i64>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Fails with `Conflict` if a unique constraint would be violated.
    async fn insert(&self, collection: &str, document: Document) -> Result<(), StoreError>;

    /// Returns the number of matched documents (0 or 1).
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<u64, StoreError>;

    /// Atomically replaces the first document matching `filter`, or inserts `document`.
    async fn replace_or_insert(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
    ) -> Result<(), StoreError>;

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, StoreError>;
}

pub fn to_record<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    bson::to_document(value).map_err(|e| StoreError::Malformed(e.to_string()))
}

pub fn from_record<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    bson::from_document(document).map_err(|e| StoreError::Malformed(e.to_string()))
}

#[derive(Default)]
struct Collections {
    documents: HashMap<String, Vec<Document>>,
    unique: HashMap<String, Vec<Vec<String>>>,
}

/// In-process store. Every operation runs under one lock, so each is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Collections) -> Result<R, StoreError>) -> Result<R, StoreError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        f(&mut guard)
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| {
        let actual = document.get(key);
        match expected {
            Bson::Document(op) if op.contains_key("$in") => match op.get_array("$in") {
                Ok(options) => options.iter().any(|option| actual == Some(option)),
                Err(_) => false,
            },
            Bson::Null => matches!(actual, None | Some(Bson::Null)),
            _ => actual == Some(expected),
        }
    })
}

fn compare(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    fn number(value: &Bson) -> Option<f64> {
        match value {
            Bson::Double(n) => Some(*n),
            Bson::Int32(n) => Some(f64::from(*n)),
            Bson::Int64(n) => Some(*n as f64),
            _ => None,
        }
    }

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Bson::String(x)), Some(Bson::String(y))) => x.cmp(y),
        (Some(Bson::Boolean(x)), Some(Bson::Boolean(y))) => x.cmp(y),
        (Some(x), Some(y)) => match (number(x), number(y)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

fn apply_update(document: &mut Document, update: &Document) -> Result<(), StoreError> {
    for (operator, fields) in update {
        let fields = match fields {
            Bson::Document(fields) => fields,
            _ => return Err(StoreError::Malformed(format!("{} expects a document", operator))),
        };
        match operator.as_str() {
            "$set" => {
                for (key, value) in fields {
                    document.insert(key.clone(), value.clone());
                }
            }
            "$addToSet" => {
                for (key, value) in fields {
                    let mut items = match document.get(key) {
                        Some(Bson::Array(items)) => items.clone(),
                        _ => Vec::new(),
                    };
                    if !items.contains(value) {
                        items.push(value.clone());
                    }
                    document.insert(key.clone(), Bson::Array(items));
                }
            }
            "$pull" => {
                for (key, value) in fields {
                    if let Some(Bson::Array(items)) = document.get_mut(key) {
                        items.retain(|item| item != value);
                    }
                }
            }
            other => return Err(StoreError::Unsupported(other.to_string())),
        }
    }
    Ok(())
}

fn violates_unique(
    collections: &Collections,
    collection: &str,
    candidate: &Document,
    skip: Option<usize>,
) -> bool {
    let Some(constraints) = collections.unique.get(collection) else {
        return false;
    };
    let Some(existing) = collections.documents.get(collection) else {
        return false;
    };
    constraints.iter().any(|fields| {
        existing.iter().enumerate().any(|(index, doc)| {
            Some(index) != skip
                && fields
                    .iter()
                    .all(|field| doc.get(field) == candidate.get(field))
        })
    })
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ensure_unique(&self, collection: &str, fields: &[&str]) -> Result<(), StoreError> {
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        self.with(|c| {
            let constraints = c.unique.entry(collection.to_string()).or_default();
            if !constraints.contains(&fields) {
                constraints.push(fields);
            }
            Ok(())
        })
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        self.with(|c| {
            Ok(c.documents
                .get(collection)
                .and_then(|docs| docs.iter().find(|doc| matches(doc, &filter)).cloned()))
        })
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
        limit: Option<i64>,
    ) -> Result<Vec<Document>, StoreError> {
        let mut found = self.with(|c| {
            Ok(c.documents
                .get(collection)
                .map(|docs| {
                    docs.iter()
                        .filter(|doc| matches(doc, &filter))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default())
        })?;

        if let Some(sort) = sort {
            found.sort_by(|a, b| {
                sort.iter()
                    .map(|(key, direction)| {
                        let ordering = compare(a.get(key), b.get(key));
                        let descending = matches!(direction, Bson::Int32(d) if *d < 0)
                            || matches!(direction, Bson::Int64(d) if *d < 0);
                        if descending {
                            ordering.reverse()
                        } else {
                            ordering
                        }
                    })
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }
        if let Some(limit) = limit {
            found.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(found)
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        self.with(|c| {
            if violates_unique(c, collection, &document, None) {
                return Err(StoreError::Conflict(collection.to_string()));
            }
            c.documents
                .entry(collection.to_string())
                .or_default()
                .push(document);
            Ok(())
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<u64, StoreError> {
        self.with(|c| {
            let Some(docs) = c.documents.get_mut(collection) else {
                return Ok(0);
            };
            match docs.iter_mut().find(|doc| matches(doc, &filter)) {
                Some(doc) => {
                    apply_update(doc, &update)?;
                    Ok(1)
                }
                None => Ok(0),
            }
        })
    }

    async fn replace_or_insert(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
    ) -> Result<(), StoreError> {
        self.with(|c| {
            let position = c
                .documents
                .get(collection)
                .and_then(|docs| docs.iter().position(|doc| matches(doc, &filter)));
            if violates_unique(c, collection, &document, position) {
                return Err(StoreError::Conflict(collection.to_string()));
            }
            let docs = c.documents.entry(collection.to_string()).or_default();
            match position {
                Some(index) => docs[index] = document,
                None => docs.push(document),
            }
            Ok(())
        })
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, StoreError> {
        self.with(|c| {
            let Some(docs) = c.documents.get_mut(collection) else {
                return Ok(0);
            };
            let before = docs.len();
            docs.retain(|doc| !matches(doc, &filter));
            Ok((before - docs.len()) as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[tokio::test]
    async fn unique_constraint_rejects_second_insert() {
        let store = MemoryStore::new();
        store.ensure_unique("users", &["email"]).await.unwrap();
        store
            .insert("users", doc! { "id": "1", "email": "a@x.com" })
            .await
            .unwrap();

        let err = store
            .insert("users", doc! { "id": "2", "email": "a@x.com" })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // case-sensitive as stored
        store
            .insert("users", doc! { "id": "3", "email": "A@x.com" })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn in_filter_and_descending_sort() {
        let store = MemoryStore::new();
        for (id, created) in [("a", "2025-01-01"), ("b", "2025-03-01"), ("c", "2025-02-01")] {
            store
                .insert("posts", doc! { "id": id, "created_at": created })
                .await
                .unwrap();
        }

        let docs = store
            .find_many(
                "posts",
                doc! { "id": { "$in": ["a", "b"] } },
                Some(doc! { "created_at": -1 }),
                None,
            )
            .await
            .unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.get_str("id").unwrap()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let limited = store
            .find_many("posts", doc! {}, Some(doc! { "created_at": 1 }), Some(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].get_str("id").unwrap(), "a");
    }

    #[tokio::test]
    async fn set_operators_keep_membership_semantics() {
        let store = MemoryStore::new();
        store
            .insert("users", doc! { "id": "u1", "favorite_mosques": [] })
            .await
            .unwrap();

        for _ in 0..2 {
            let matched = store
                .update_one(
                    "users",
                    doc! { "id": "u1" },
                    doc! { "$addToSet": { "favorite_mosques": "m1" } },
                )
                .await
                .unwrap();
            assert_eq!(matched, 1);
        }
        let user = store.find_one("users", doc! { "id": "u1" }).await.unwrap().unwrap();
        assert_eq!(user.get_array("favorite_mosques").unwrap().len(), 1);

        store
            .update_one(
                "users",
                doc! { "id": "u1" },
                doc! { "$pull": { "favorite_mosques": "m1" } },
            )
            .await
            .unwrap();
        let user = store.find_one("users", doc! { "id": "u1" }).await.unwrap().unwrap();
        assert!(user.get_array("favorite_mosques").unwrap().is_empty());

        let err = store
            .update_one("users", doc! { "id": "u1" }, doc! { "$inc": { "n": 1 } })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }

    #[tokio::test]
    async fn replace_or_insert_keeps_a_single_match() {
        let store = MemoryStore::new();
        let key = doc! { "mosque_id": "m1", "date": "2025-01-01", "is_manual": true };

        let mut first = key.clone();
        first.insert("fajr", "05:10");
        store
            .replace_or_insert("prayer_times", key.clone(), first)
            .await
            .unwrap();

        let mut second = key.clone();
        second.insert("fajr", "05:11");
        store
            .replace_or_insert("prayer_times", key.clone(), second)
            .await
            .unwrap();

        let all = store
            .find_many("prayer_times", key, None, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].get_str("fajr").unwrap(), "05:11");
    }

    #[tokio::test]
    async fn delete_many_reports_count() {
        let store = MemoryStore::new();
        store.insert("p", doc! { "k": 1, "v": "x" }).await.unwrap();
        store.insert("p", doc! { "k": 1, "v": "y" }).await.unwrap();
        store.insert("p", doc! { "k": 2, "v": "z" }).await.unwrap();

        assert_eq!(store.delete_many("p", doc! { "k": 1 }).await.unwrap(), 2);
        assert_eq!(store.delete_many("missing", doc! {}).await.unwrap(), 0);
    }
}
