use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{normalize_base64, require_text, search_pattern, LIST_LIMIT};
use crate::error::ServiceError;
use crate::models::{Account, ApprovalStatus, Post, POSTS};
use crate::store::{from_record, to_record, DocumentStore};

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub mosque_id: Option<String>,
    pub status: Option<ApprovalStatus>,
    pub search: Option<String>,
}

/// A new post as submitted by its author.
#[derive(Debug, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub content: Option<String>,
    /// Base64 image bytes.
    pub image: Option<String>,
    pub event_start_date: Option<DateTime<Utc>>,
    pub event_end_date: Option<DateTime<Utc>>,
}

/// Fields to change on an existing post; absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
pub struct PostEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub event_start_date: Option<DateTime<Utc>>,
    pub event_end_date: Option<DateTime<Utc>>,
}

#[derive(Default, Serialize)]
struct PostChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_end_date: Option<DateTime<Utc>>,
}

fn check_window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ServiceError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ServiceError::InvalidEventWindow),
        _ => Ok(()),
    }
}

/// Community posts. Status changes go through the moderation gate, not through here.
#[derive(Clone)]
pub struct PostDirectory {
    store: Arc<dyn DocumentStore>,
}

impl PostDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// New posts start `pending` and belong to the author's mosque.
    /// A post needs text or an image.
    pub async fn create(&self, author: &Account, draft: PostDraft) -> Result<Post, ServiceError> {
        if !author.is_approved_admin() {
            return Err(ServiceError::Forbidden("only approved mosque admins can post"));
        }
        let mosque_id = author
            .mosque_id
            .clone()
            .ok_or(ServiceError::Forbidden("admin has no mosque"))?;
        require_text("title", &draft.title)?;

        let content = draft.content.filter(|c| !c.trim().is_empty());
        let image = draft
            .image
            .map(|encoded| normalize_base64("image", &encoded))
            .transpose()?;
        if content.is_none() && image.is_none() {
            return Err(ServiceError::MissingField("content or image"));
        }
        check_window(draft.event_start_date, draft.event_end_date)?;

        let post = Post {
            id: Uuid::new_v4().to_string(),
            mosque_id,
            admin_id: author.id.clone(),
            title: draft.title,
            content,
            image,
            event_start_date: draft.event_start_date,
            event_end_date: draft.event_end_date,
            status: ApprovalStatus::Pending,
            created_at: Utc::now(),
        };
        self.store.insert(POSTS, to_record(&post)?).await?;
        info!("Post {} created by {} (pending)", post.id, post.admin_id);
        Ok(post)
    }

    pub async fn get(&self, id: &str) -> Result<Post, ServiceError> {
        match self.store.find_one(POSTS, doc! { "id": id }).await? {
            Some(document) => Ok(from_record(document)?),
            None => Err(ServiceError::NotFound("Post")),
        }
    }

    /// Newest first.
    pub async fn feed(&self, query: &FeedQuery) -> Result<Vec<Post>, ServiceError> {
        let mut filter = Document::new();
        if let Some(mosque_id) = &query.mosque_id {
            filter.insert("mosque_id", mosque_id.as_str());
        }
        if let Some(status) = query.status {
            filter.insert("status", status.as_str());
        }
        let mut posts = self.list(filter).await?;

        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = search_pattern(search)?;
            posts.retain(|p| pattern.is_match(&p.title));
        }
        Ok(posts)
    }

    pub async fn pending(&self) -> Result<Vec<Post>, ServiceError> {
        self.list(doc! { "status": ApprovalStatus::Pending.as_str() }).await
    }

    pub async fn update(&self, id: &str, edit: PostEdit) -> Result<Post, ServiceError> {
        let current = self.get(id).await?;

        let mut changes = PostChanges::default();
        if let Some(title) = edit.title {
            require_text("title", &title)?;
            changes.title = Some(title);
        }
        if let Some(content) = edit.content {
            require_text("content", &content)?;
            changes.content = Some(content);
        }
        if let Some(encoded) = edit.image {
            changes.image = Some(normalize_base64("image", &encoded)?);
        }
        check_window(
            edit.event_start_date.or(current.event_start_date),
            edit.event_end_date.or(current.event_end_date),
        )?;
        changes.event_start_date = edit.event_start_date;
        changes.event_end_date = edit.event_end_date;

        let fields = to_record(&changes)?;
        if fields.is_empty() {
            return Err(ServiceError::MissingField("title, content, image or event dates"));
        }

        let matched = self
            .store
            .update_one(POSTS, doc! { "id": id }, doc! { "$set": fields })
            .await?;
        if matched == 0 {
            return Err(ServiceError::NotFound("Post"));
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let deleted = self.store.delete_many(POSTS, doc! { "id": id }).await?;
        if deleted == 0 {
            return Err(ServiceError::NotFound("Post"));
        }
        info!("Post {} deleted", id);
        Ok(())
    }

    async fn list(&self, filter: Document) -> Result<Vec<Post>, ServiceError> {
        let documents = self
            .store
            .find_many(POSTS, filter, Some(doc! { "created_at": -1 }), Some(LIST_LIMIT))
            .await?;
        documents
            .into_iter()
            .map(|d| from_record(d).map_err(ServiceError::from))
            .collect()
    }
}
