use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info};
use mongodb::bson::Document;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};

use crate::store::{DocumentStore, StoreError};

const DUPLICATE_KEY: i32 = 11000;

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn init(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        let client_options = ClientOptions::parse(uri).await.map_err(unavailable)?;
        let client = Client::with_options(client_options).map_err(unavailable)?;
        let db = client.database(db_name);
        info!("Connected to MongoDB database {}", db_name);
        Ok(MongoStore { db })
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

fn unavailable(err: mongodb::error::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn write_error(collection: &str, err: mongodb::error::Error) -> StoreError {
    if is_duplicate_key(&err) {
        StoreError::Conflict(collection.to_string())
    } else {
        unavailable(err)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn ensure_unique(&self, collection: &str, fields: &[&str]) -> Result<(), StoreError> {
        let mut keys = Document::new();
        for field in fields {
            keys.insert(*field, 1);
        }
        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection(collection)
            .create_index(index)
            .await
            .map_err(unavailable)?;
        debug!("Unique index on {}{:?} ready", collection, fields);
        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        self.collection(collection)
            .find_one(filter)
            .await
            .map_err(unavailable)
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        sort: Option<Document>,
        limit: Option<i64>,
    ) -> Result<Vec<Document>, StoreError> {
        let coll = self.collection(collection);
        let mut find = coll.find(filter);
        if let Some(sort) = sort {
            find = find.sort(sort);
        }
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        let mut cursor = find.await.map_err(unavailable)?;

        let mut documents = Vec::new();
        while let Some(result) = cursor.next().await {
            documents.push(result.map_err(unavailable)?);
        }
        Ok(documents)
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        self.collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| write_error(collection, e))?;
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<u64, StoreError> {
        let result = self
            .collection(collection)
            .update_one(filter, update)
            .await
            .map_err(|e| write_error(collection, e))?;
        Ok(result.matched_count)
    }

    async fn replace_or_insert(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
    ) -> Result<(), StoreError> {
        self.collection(collection)
            .replace_one(filter, document)
            .upsert(true)
            .await
            .map_err(|e| write_error(collection, e))?;
        Ok(())
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> Result<u64, StoreError> {
        let result = self
            .collection(collection)
            .delete_many(filter)
            .await
            .map_err(unavailable)?;
        Ok(result.deleted_count)
    }
}
