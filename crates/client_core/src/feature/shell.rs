//! Top-level shell: which screen is selected, plus favorite toggling
//! straight from a source listing (the news screen's star button). Keeps
//! its own favorites subscription so the badge count stays live on every
//! screen.

use async_trait::async_trait;
use std::sync::Arc;

use shared::domain::{FavoriteNews, NewsSource, Screen, SourceId};

use crate::{
    favorites::{news_from_document, FavoritesRepository},
    mvi::{Dispatcher, Processor, Publisher, Reducer},
};

#[derive(Debug, Clone)]
pub enum ShellIntent {
    SelectScreen(Screen),
    ToggleFavorite(NewsSource),
    RemoveFavorite(SourceId),
    ClearError,
    /// Dispatched internally by the subscription pump.
    SnapshotPushed(Vec<FavoriteNews>),
    /// Dispatched internally when the live subscription cannot be opened.
    SubscriptionFailed(String),
}

#[derive(Debug, Clone, Default)]
pub struct ShellState {
    pub selected_screen: Screen,
    pub favorites: Vec<FavoriteNews>,
    pub error_message: Option<String>,
}

pub struct ShellFeature {
    favorites: Arc<FavoritesRepository>,
}

impl ShellFeature {
    pub fn new(favorites: Arc<FavoritesRepository>) -> Self {
        Self { favorites }
    }

    pub fn spawn(favorites: Arc<FavoritesRepository>) -> Processor<Self> {
        let mut processor = Processor::spawn(Self::new(favorites.clone()));
        let pump = spawn_snapshot_pump(favorites, processor.dispatcher());
        processor.attach(pump);
        processor
    }
}

fn spawn_snapshot_pump(
    repo: Arc<FavoritesRepository>,
    dispatcher: Dispatcher<ShellIntent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match repo.subscribe().await {
            Ok(mut subscription) => {
                while let Some(snapshot) = subscription.next_snapshot().await {
                    let favorites = snapshot.iter().map(news_from_document).collect();
                    if !dispatcher.dispatch(ShellIntent::SnapshotPushed(favorites)) {
                        break;
                    }
                }
            }
            Err(err) => {
                dispatcher.dispatch(ShellIntent::SubscriptionFailed(err.to_string()));
            }
        }
    })
}

#[async_trait]
impl Reducer for ShellFeature {
    type Intent = ShellIntent;
    type State = ShellState;

    fn initial_state(&self) -> ShellState {
        ShellState::default()
    }

    async fn reduce(
        &mut self,
        state: ShellState,
        intent: ShellIntent,
        _publisher: &Publisher<ShellState>,
    ) -> ShellState {
        match intent {
            ShellIntent::SelectScreen(screen) => ShellState {
                selected_screen: screen,
                ..state
            },
            ShellIntent::ToggleFavorite(source) => {
                let Some(favorite) = FavoriteNews::from_source(&source) else {
                    return ShellState {
                        error_message: Some("source has no id; cannot favorite".to_string()),
                        ..state
                    };
                };
                match self.favorites.toggle(&favorite).await {
                    // The pushed snapshot updates the list.
                    Ok(_) => state,
                    Err(err) => ShellState {
                        error_message: Some(format!("failed to toggle favorite: {err}")),
                        ..state
                    },
                }
            }
            ShellIntent::RemoveFavorite(source_id) => {
                match self.favorites.remove(&source_id).await {
                    Ok(()) => state,
                    Err(err) => ShellState {
                        error_message: Some(format!("failed to remove favorite: {err}")),
                        ..state
                    },
                }
            }
            ShellIntent::ClearError => ShellState {
                error_message: None,
                ..state
            },
            ShellIntent::SnapshotPushed(favorites) => ShellState { favorites, ..state },
            ShellIntent::SubscriptionFailed(message) => ShellState {
                error_message: Some(format!("failed to load favorites: {message}")),
                ..state
            },
        }
    }
}
