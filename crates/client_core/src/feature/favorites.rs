//! Favorites screen. List updates arrive exclusively through the live
//! subscription; add/remove/toggle fire the write and wait for the pushed
//! snapshot, so the screen can never drift from the store.

use async_trait::async_trait;
use std::sync::Arc;

use shared::domain::{FavoriteNews, SourceId};

use crate::{
    favorites::{news_from_document, FavoritesRepository},
    mvi::{Processor, Publisher, Reducer},
};

#[derive(Debug, Clone)]
pub enum FavoritesIntent {
    Refresh,
    Add(FavoriteNews),
    Remove(SourceId),
    Toggle(FavoriteNews),
    ClearAll,
    ClearError,
    /// Dispatched internally by the subscription pump.
    SnapshotPushed(Vec<FavoriteNews>),
    /// Dispatched internally when the live subscription cannot be opened.
    SubscriptionFailed(String),
}

#[derive(Debug, Clone, Default)]
pub struct FavoritesState {
    pub favorites: Vec<FavoriteNews>,
    pub is_loading: bool,
    pub error_message: Option<String>,
}

pub struct FavoritesFeature {
    repo: Arc<FavoritesRepository>,
}

impl FavoritesFeature {
    pub fn new(repo: Arc<FavoritesRepository>) -> Self {
        Self { repo }
    }

    /// Spawns the processor with the live subscription pump attached; the
    /// pump stops when the processor shuts down, releasing the listener.
    pub fn spawn(repo: Arc<FavoritesRepository>) -> Processor<Self> {
        let mut processor = Processor::spawn(Self::new(repo.clone()));
        processor.dispatch(FavoritesIntent::Refresh);
        let pump = spawn_snapshot_pump(repo, processor.dispatcher());
        processor.attach(pump);
        processor
    }

    fn with_error(state: FavoritesState, err: impl std::fmt::Display, what: &str) -> FavoritesState {
        FavoritesState {
            is_loading: false,
            error_message: Some(format!("failed to {what}: {err}")),
            ..state
        }
    }
}

fn spawn_snapshot_pump(
    repo: Arc<FavoritesRepository>,
    dispatcher: crate::mvi::Dispatcher<FavoritesIntent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match repo.subscribe().await {
            Ok(mut subscription) => {
                while let Some(snapshot) = subscription.next_snapshot().await {
                    let favorites = snapshot.iter().map(news_from_document).collect();
                    if !dispatcher.dispatch(FavoritesIntent::SnapshotPushed(favorites)) {
                        break;
                    }
                }
            }
            Err(err) => {
                dispatcher.dispatch(FavoritesIntent::SubscriptionFailed(err.to_string()));
            }
        }
    })
}

#[async_trait]
impl Reducer for FavoritesFeature {
    type Intent = FavoritesIntent;
    type State = FavoritesState;

    fn initial_state(&self) -> FavoritesState {
        FavoritesState::default()
    }

    async fn reduce(
        &mut self,
        state: FavoritesState,
        intent: FavoritesIntent,
        publisher: &Publisher<FavoritesState>,
    ) -> FavoritesState {
        match intent {
            FavoritesIntent::Refresh => {
                publisher.publish(FavoritesState {
                    is_loading: true,
                    error_message: None,
                    ..state.clone()
                });
                match self.repo.favorites().await {
                    Ok(favorites) => FavoritesState {
                        favorites,
                        is_loading: false,
                        error_message: None,
                    },
                    Err(err) => Self::with_error(state, err, "load favorites"),
                }
            }
            FavoritesIntent::Add(news) => match self.repo.add(&news).await {
                // The pushed snapshot updates the list.
                Ok(()) => state,
                Err(err) => Self::with_error(state, err, "add favorite"),
            },
            FavoritesIntent::Remove(source_id) => match self.repo.remove(&source_id).await {
                Ok(()) => state,
                Err(err) => Self::with_error(state, err, "remove favorite"),
            },
            FavoritesIntent::Toggle(news) => match self.repo.toggle(&news).await {
                Ok(_) => state,
                Err(err) => Self::with_error(state, err, "toggle favorite"),
            },
            FavoritesIntent::ClearAll => match self.repo.clear_all().await {
                Ok(_) => state,
                Err(err) => Self::with_error(state, err, "clear favorites"),
            },
            FavoritesIntent::ClearError => FavoritesState {
                error_message: None,
                ..state
            },
            FavoritesIntent::SnapshotPushed(favorites) => FavoritesState {
                favorites,
                is_loading: false,
                error_message: state.error_message,
            },
            FavoritesIntent::SubscriptionFailed(message) => FavoritesState {
                is_loading: false,
                error_message: Some(format!("failed to load favorites: {message}")),
                ..state
            },
        }
    }
}
