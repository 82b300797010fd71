//! Settings screen: theme flag, cumulative reading-time counter, and the
//! two notification opt-ins, written through to the local store.

use async_trait::async_trait;
use storage::Storage;

use shared::domain::Preferences;

use crate::mvi::{Processor, Publisher, Reducer};

#[derive(Debug, Clone)]
pub enum SettingsIntent {
    Reload,
    ToggleTheme,
    /// Ignored when the amount is not positive.
    AddReadingSeconds(i64),
    SetBreakingOptIn(bool),
    SetDailyOptIn(bool),
    ClearError,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsState {
    pub preferences: Preferences,
    pub is_loaded: bool,
    pub error_message: Option<String>,
}

pub struct SettingsFeature {
    storage: Storage,
}

impl SettingsFeature {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn spawn(storage: Storage) -> Processor<Self> {
        let processor = Processor::spawn(Self::new(storage));
        processor.dispatch(SettingsIntent::Reload);
        processor
    }

    async fn reload(&self, state: SettingsState) -> SettingsState {
        match self.storage.preferences().await {
            Ok(preferences) => SettingsState {
                preferences,
                is_loaded: true,
                error_message: None,
            },
            Err(err) => SettingsState {
                error_message: Some(err.to_string()),
                ..state
            },
        }
    }
}

#[async_trait]
impl Reducer for SettingsFeature {
    type Intent = SettingsIntent;
    type State = SettingsState;

    fn initial_state(&self) -> SettingsState {
        SettingsState::default()
    }

    async fn reduce(
        &mut self,
        state: SettingsState,
        intent: SettingsIntent,
        _publisher: &Publisher<SettingsState>,
    ) -> SettingsState {
        match intent {
            SettingsIntent::Reload => self.reload(state).await,
            SettingsIntent::ToggleTheme => match self.storage.toggle_dark_theme().await {
                Ok(dark_theme) => SettingsState {
                    preferences: Preferences {
                        dark_theme,
                        ..state.preferences
                    },
                    ..state
                },
                Err(err) => SettingsState {
                    error_message: Some(err.to_string()),
                    ..state
                },
            },
            SettingsIntent::AddReadingSeconds(seconds) => {
                if seconds <= 0 {
                    return state;
                }
                match self.storage.add_reading_seconds(seconds).await {
                    Ok(reading_seconds_total) => SettingsState {
                        preferences: Preferences {
                            reading_seconds_total,
                            ..state.preferences
                        },
                        ..state
                    },
                    Err(err) => SettingsState {
                        error_message: Some(err.to_string()),
                        ..state
                    },
                }
            }
            SettingsIntent::SetBreakingOptIn(enabled) => {
                match self.storage.set_breaking_opt_in(enabled).await {
                    Ok(()) => SettingsState {
                        preferences: Preferences {
                            notif_breaking: enabled,
                            ..state.preferences
                        },
                        ..state
                    },
                    Err(err) => SettingsState {
                        error_message: Some(err.to_string()),
                        ..state
                    },
                }
            }
            SettingsIntent::SetDailyOptIn(enabled) => {
                match self.storage.set_daily_opt_in(enabled).await {
                    Ok(()) => SettingsState {
                        preferences: Preferences {
                            notif_daily: enabled,
                            ..state.preferences
                        },
                        ..state
                    },
                    Err(err) => SettingsState {
                        error_message: Some(err.to_string()),
                        ..state
                    },
                }
            }
            SettingsIntent::ClearError => SettingsState {
                error_message: None,
                ..state
            },
        }
    }
}
