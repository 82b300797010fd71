//! Source listing screen: fetch by country, filter by category.

use async_trait::async_trait;
use std::sync::Arc;

use shared::domain::NewsSource;

use crate::{
    mvi::{Processor, Publisher, Reducer},
    news::{derive_categories, filter_by_category, NewsRepository},
};

#[derive(Debug, Clone)]
pub enum HomeIntent {
    Load,
    Retry { country: String },
    FilterByCategory(Option<String>),
}

#[derive(Debug, Clone, Default)]
pub struct HomeState {
    pub is_loading: bool,
    pub sources: Vec<NewsSource>,
    pub filtered_sources: Vec<NewsSource>,
    pub available_categories: Vec<String>,
    pub selected_category: Option<String>,
    pub error_message: Option<String>,
}

pub struct HomeFeature {
    news: Arc<NewsRepository>,
    default_country: String,
}

impl HomeFeature {
    pub fn new(news: Arc<NewsRepository>, default_country: impl Into<String>) -> Self {
        Self {
            news,
            default_country: default_country.into(),
        }
    }

    pub fn spawn(news: Arc<NewsRepository>, default_country: impl Into<String>) -> Processor<Self> {
        Processor::spawn(Self::new(news, default_country))
    }

    async fn load(
        &self,
        state: HomeState,
        country: &str,
        publisher: &Publisher<HomeState>,
    ) -> HomeState {
        publisher.publish(HomeState {
            is_loading: true,
            error_message: None,
            ..state.clone()
        });

        match self.news.sources(country).await {
            Ok(sources) => {
                let available_categories = derive_categories(&sources);
                HomeState {
                    is_loading: false,
                    filtered_sources: sources.clone(),
                    sources,
                    available_categories,
                    selected_category: None,
                    error_message: None,
                }
            }
            Err(err) => HomeState {
                is_loading: false,
                sources: Vec::new(),
                filtered_sources: Vec::new(),
                available_categories: Vec::new(),
                selected_category: state.selected_category,
                error_message: Some(err.to_string()),
            },
        }
    }
}

#[async_trait]
impl Reducer for HomeFeature {
    type Intent = HomeIntent;
    type State = HomeState;

    fn initial_state(&self) -> HomeState {
        HomeState::default()
    }

    async fn reduce(
        &mut self,
        state: HomeState,
        intent: HomeIntent,
        publisher: &Publisher<HomeState>,
    ) -> HomeState {
        match intent {
            HomeIntent::Load => {
                let country = self.default_country.clone();
                self.load(state, &country, publisher).await
            }
            HomeIntent::Retry { country } => self.load(state, &country, publisher).await,
            HomeIntent::FilterByCategory(category) => {
                let filtered_sources = filter_by_category(&state.sources, category.as_deref());
                HomeState {
                    filtered_sources,
                    selected_category: category,
                    ..state
                }
            }
        }
    }
}
