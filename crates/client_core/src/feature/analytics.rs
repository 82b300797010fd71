//! Usage-counter screen: per-action counts for the signed-in user.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    analytics::AnalyticsRepository,
    auth::AuthRepository,
    mvi::{Processor, Publisher, Reducer},
};

#[derive(Debug, Clone)]
pub enum AnalyticsIntent {
    Log(String),
    Refresh,
    Clear,
    ClearError,
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticsState {
    pub events: BTreeMap<String, i64>,
    pub is_loading: bool,
    pub error_message: Option<String>,
}

pub struct AnalyticsFeature {
    analytics: Arc<AnalyticsRepository>,
    auth: Arc<AuthRepository>,
}

impl AnalyticsFeature {
    pub fn new(analytics: Arc<AnalyticsRepository>, auth: Arc<AuthRepository>) -> Self {
        Self { analytics, auth }
    }

    pub fn spawn(
        analytics: Arc<AnalyticsRepository>,
        auth: Arc<AuthRepository>,
    ) -> Processor<Self> {
        let processor = Processor::spawn(Self::new(analytics, auth));
        processor.dispatch(AnalyticsIntent::Refresh);
        processor
    }

    async fn refreshed(&self, state: AnalyticsState) -> AnalyticsState {
        let user_id = match self.auth.user_id().await {
            Ok(user_id) => user_id,
            Err(err) => {
                return AnalyticsState {
                    is_loading: false,
                    error_message: Some(err.to_string()),
                    ..state
                }
            }
        };
        match self.analytics.summary(&user_id).await {
            Ok(events) => AnalyticsState {
                events,
                is_loading: false,
                error_message: None,
            },
            Err(err) => AnalyticsState {
                is_loading: false,
                error_message: Some(err.to_string()),
                ..state
            },
        }
    }
}

#[async_trait]
impl Reducer for AnalyticsFeature {
    type Intent = AnalyticsIntent;
    type State = AnalyticsState;

    fn initial_state(&self) -> AnalyticsState {
        AnalyticsState::default()
    }

    async fn reduce(
        &mut self,
        state: AnalyticsState,
        intent: AnalyticsIntent,
        publisher: &Publisher<AnalyticsState>,
    ) -> AnalyticsState {
        match intent {
            AnalyticsIntent::Log(action) => {
                let user_id = match self.auth.user_id().await {
                    Ok(user_id) => user_id,
                    Err(err) => {
                        return AnalyticsState {
                            error_message: Some(err.to_string()),
                            ..state
                        }
                    }
                };
                match self.analytics.log_action(&user_id, &action).await {
                    Ok(count) => {
                        let mut events = state.events.clone();
                        events.insert(action, count);
                        AnalyticsState { events, ..state }
                    }
                    Err(err) => AnalyticsState {
                        error_message: Some(format!("failed to log action: {err}")),
                        ..state
                    },
                }
            }
            AnalyticsIntent::Refresh => {
                publisher.publish(AnalyticsState {
                    is_loading: true,
                    error_message: None,
                    ..state.clone()
                });
                self.refreshed(state).await
            }
            AnalyticsIntent::Clear => {
                let user_id = match self.auth.user_id().await {
                    Ok(user_id) => user_id,
                    Err(err) => {
                        return AnalyticsState {
                            error_message: Some(err.to_string()),
                            ..state
                        }
                    }
                };
                match self.analytics.clear(&user_id).await {
                    Ok(()) => AnalyticsState {
                        events: BTreeMap::new(),
                        is_loading: false,
                        error_message: None,
                    },
                    Err(err) => AnalyticsState {
                        error_message: Some(format!("failed to clear analytics: {err}")),
                        ..state
                    },
                }
            }
            AnalyticsIntent::ClearError => AnalyticsState {
                error_message: None,
                ..state
            },
        }
    }
}
