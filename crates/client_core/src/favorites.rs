//! Favorites: per-user documents in the cloud store, keyed by source id,
//! live-subscribed over the sync service's WebSocket. The store trait is the
//! seam; the repository binds it to the auth session.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use reqwest::Client;
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use uuid::Uuid;

use shared::{
    domain::{FavoriteNews, SourceId, UserId},
    protocol::{ClearFavoritesResponse, FavoriteDocument, SyncEvent, ToggleFavoriteResponse},
};

use crate::{
    auth::AuthRepository,
    http::{expect_success, websocket_url},
};

/// A live favorites query. Snapshots arrive in write order; dropping (or
/// calling [`close`](Self::close)) releases the underlying listener
/// deterministically.
pub struct FavoritesSubscription {
    id: Uuid,
    receiver: mpsc::Receiver<Vec<FavoriteDocument>>,
    task: Option<JoinHandle<()>>,
}

impl FavoritesSubscription {
    pub fn new(receiver: mpsc::Receiver<Vec<FavoriteDocument>>, task: Option<JoinHandle<()>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            receiver,
            task,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next pushed snapshot; `None` once the stream has ended.
    pub async fn next_snapshot(&mut self) -> Option<Vec<FavoriteDocument>> {
        self.receiver.recv().await
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(subscription_id = %self.id, "favorites: subscription released");
        }
    }
}

impl Drop for FavoritesSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
pub trait FavoritesStore: Send + Sync {
    async fn list(&self, user_id: &UserId) -> Result<Vec<FavoriteDocument>>;
    async fn put(&self, user_id: &UserId, document: &FavoriteDocument) -> Result<()>;
    async fn delete(&self, user_id: &UserId, source_id: &SourceId) -> Result<()>;
    /// Atomic upsert/delete-if-exists; returns whether the document is a
    /// favorite afterwards. One call, no client-side pre-read.
    async fn toggle(&self, user_id: &UserId, document: &FavoriteDocument) -> Result<bool>;
    /// One batched delete of every document under the user.
    async fn clear_all(&self, user_id: &UserId) -> Result<u64>;
    async fn subscribe(&self, user_id: &UserId) -> Result<FavoritesSubscription>;
}

pub struct HttpFavoritesStore {
    http: Client,
    base_url: String,
}

impl HttpFavoritesStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl FavoritesStore for HttpFavoritesStore {
    async fn list(&self, user_id: &UserId) -> Result<Vec<FavoriteDocument>> {
        let response = self
            .http
            .get(format!("{}/favorites/{}", self.base_url, user_id))
            .send()
            .await?;
        Ok(expect_success(response).await?.json().await?)
    }

    async fn put(&self, user_id: &UserId, document: &FavoriteDocument) -> Result<()> {
        let response = self
            .http
            .put(format!(
                "{}/favorites/{}/{}",
                self.base_url, user_id, document.id
            ))
            .json(document)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn delete(&self, user_id: &UserId, source_id: &SourceId) -> Result<()> {
        let response = self
            .http
            .delete(format!(
                "{}/favorites/{}/{}",
                self.base_url, user_id, source_id
            ))
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn toggle(&self, user_id: &UserId, document: &FavoriteDocument) -> Result<bool> {
        let response = self
            .http
            .post(format!("{}/favorites/{}/toggle", self.base_url, user_id))
            .json(document)
            .send()
            .await?;
        let body: ToggleFavoriteResponse = expect_success(response).await?.json().await?;
        Ok(body.now_favorite)
    }

    async fn clear_all(&self, user_id: &UserId) -> Result<u64> {
        let response = self
            .http
            .delete(format!("{}/favorites/{}", self.base_url, user_id))
            .send()
            .await?;
        let body: ClearFavoritesResponse = expect_success(response).await?.json().await?;
        Ok(body.removed)
    }

    async fn subscribe(&self, user_id: &UserId) -> Result<FavoritesSubscription> {
        let url = websocket_url(&self.base_url, &format!("/favorites/{user_id}/ws"))?;
        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (_, mut ws_reader) = ws_stream.split();

        let (tx, rx) = mpsc::channel(16);
        let subscribed_user = user_id.clone();
        let task = tokio::spawn(async move {
            while let Some(message) = ws_reader.next().await {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<SyncEvent>(&text) {
                        Ok(SyncEvent::FavoritesChanged { user_id, favorites })
                            if user_id == subscribed_user =>
                        {
                            if tx.send(favorites).await.is_err() {
                                break;
                            }
                        }
                        Ok(SyncEvent::Error(err)) => {
                            warn!(user_id = %subscribed_user, code = ?err.code, "favorites: service error on stream: {}", err.message);
                        }
                        Ok(_) => {}
                        Err(err) => {
                            warn!(user_id = %subscribed_user, "favorites: invalid event on stream: {err}");
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(user_id = %subscribed_user, "favorites: stream receive failed: {err}");
                        break;
                    }
                }
            }
        });

        Ok(FavoritesSubscription::new(rx, Some(task)))
    }
}

/// Null object installed when no sync service is configured.
pub struct MissingFavoritesStore;

macro_rules! favorites_unavailable {
    () => {
        Err(anyhow::anyhow!(
            "favorites store unavailable; no sync service configured"
        ))
    };
}

#[async_trait]
impl FavoritesStore for MissingFavoritesStore {
    async fn list(&self, _user_id: &UserId) -> Result<Vec<FavoriteDocument>> {
        favorites_unavailable!()
    }

    async fn put(&self, _user_id: &UserId, _document: &FavoriteDocument) -> Result<()> {
        favorites_unavailable!()
    }

    async fn delete(&self, _user_id: &UserId, _source_id: &SourceId) -> Result<()> {
        favorites_unavailable!()
    }

    async fn toggle(&self, _user_id: &UserId, _document: &FavoriteDocument) -> Result<bool> {
        favorites_unavailable!()
    }

    async fn clear_all(&self, _user_id: &UserId) -> Result<u64> {
        favorites_unavailable!()
    }

    async fn subscribe(&self, _user_id: &UserId) -> Result<FavoritesSubscription> {
        favorites_unavailable!()
    }
}

pub fn document_from_news(news: &FavoriteNews) -> FavoriteDocument {
    FavoriteDocument {
        id: news.id.clone(),
        title: news.title.clone(),
        description: news.description.clone(),
        image_url: news.image_url.clone(),
        url: news.url.clone(),
        is_favorite: true,
        added_at: Utc::now(),
    }
}

pub fn news_from_document(document: &FavoriteDocument) -> FavoriteNews {
    FavoriteNews {
        id: document.id.clone(),
        title: document.title.clone(),
        description: document.description.clone(),
        image_url: document.image_url.clone(),
        url: document.url.clone(),
        is_favorite: document.is_favorite,
    }
}

/// Store operations scoped to the signed-in user. Every call fails fast
/// with [`crate::NotSignedIn`] when there is no session.
pub struct FavoritesRepository {
    store: Arc<dyn FavoritesStore>,
    auth: Arc<AuthRepository>,
}

impl FavoritesRepository {
    pub fn new(store: Arc<dyn FavoritesStore>, auth: Arc<AuthRepository>) -> Arc<Self> {
        Arc::new(Self { store, auth })
    }

    pub async fn favorites(&self) -> Result<Vec<FavoriteNews>> {
        let user_id = self.auth.user_id().await?;
        let documents = self.store.list(&user_id).await?;
        Ok(documents.iter().map(news_from_document).collect())
    }

    pub async fn add(&self, news: &FavoriteNews) -> Result<()> {
        let user_id = self.auth.user_id().await?;
        self.store.put(&user_id, &document_from_news(news)).await
    }

    pub async fn remove(&self, source_id: &SourceId) -> Result<()> {
        let user_id = self.auth.user_id().await?;
        self.store.delete(&user_id, source_id).await
    }

    /// Returns whether the record is a favorite after the toggle.
    pub async fn toggle(&self, news: &FavoriteNews) -> Result<bool> {
        let user_id = self.auth.user_id().await?;
        self.store.toggle(&user_id, &document_from_news(news)).await
    }

    pub async fn clear_all(&self) -> Result<u64> {
        let user_id = self.auth.user_id().await?;
        self.store.clear_all(&user_id).await
    }

    pub async fn subscribe(&self) -> Result<FavoritesSubscription> {
        let user_id = self.auth.user_id().await?;
        self.store.subscribe(&user_id).await
    }
}
