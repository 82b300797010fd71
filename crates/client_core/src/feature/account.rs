//! Session lifecycle: sign-in/out, sign-up, profile update, account
//! deletion. The signed-in account's profile is cached in the local store
//! so the shell can render it without a network round-trip.

use async_trait::async_trait;
use std::sync::Arc;
use storage::{Storage, StoredUserProfile};
use tracing::warn;

use shared::protocol::AuthUserPayload;

use crate::{
    auth::AuthRepository,
    mvi::{Processor, Publisher, Reducer},
};

#[derive(Debug, Clone)]
pub enum AccountIntent {
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        email: String,
        password: String,
        display_name: Option<String>,
    },
    UpdateProfile {
        display_name: Option<String>,
        photo_url: Option<String>,
    },
    SendPasswordReset {
        email: String,
    },
    SignOut,
    DeleteAccount,
    ClearError,
}

#[derive(Debug, Clone, Default)]
pub struct AccountState {
    pub is_loading: bool,
    pub is_signed_in: bool,
    pub user: Option<AuthUserPayload>,
    pub profile: Option<StoredUserProfile>,
    pub password_reset_sent: bool,
    pub error_message: Option<String>,
}

pub struct AccountFeature {
    auth: Arc<AuthRepository>,
    storage: Storage,
}

impl AccountFeature {
    pub fn new(auth: Arc<AuthRepository>, storage: Storage) -> Self {
        Self { auth, storage }
    }

    pub fn spawn(auth: Arc<AuthRepository>, storage: Storage) -> Processor<Self> {
        Processor::spawn(Self::new(auth, storage))
    }

    async fn cached_profile(&self, user: &AuthUserPayload) -> Option<StoredUserProfile> {
        match self.storage.user_profile(&user.user_id).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(user_id = %user.user_id, "account: profile cache read failed: {err}");
                None
            }
        }
    }

    fn loading(state: &AccountState, publisher: &Publisher<AccountState>) {
        publisher.publish(AccountState {
            is_loading: true,
            error_message: None,
            ..state.clone()
        });
    }
}

#[async_trait]
impl Reducer for AccountFeature {
    type Intent = AccountIntent;
    type State = AccountState;

    fn initial_state(&self) -> AccountState {
        AccountState::default()
    }

    async fn reduce(
        &mut self,
        state: AccountState,
        intent: AccountIntent,
        publisher: &Publisher<AccountState>,
    ) -> AccountState {
        match intent {
            AccountIntent::SignIn { email, password } => {
                Self::loading(&state, publisher);
                match self.auth.sign_in(&email, &password).await {
                    Ok(user) => {
                        let profile = self.cached_profile(&user).await;
                        AccountState {
                            is_loading: false,
                            is_signed_in: true,
                            user: Some(user),
                            profile,
                            ..state
                        }
                    }
                    Err(err) => AccountState {
                        is_loading: false,
                        error_message: Some(err.to_string()),
                        ..state
                    },
                }
            }
            AccountIntent::SignUp {
                email,
                password,
                display_name,
            } => {
                Self::loading(&state, publisher);
                match self
                    .auth
                    .sign_up(&email, &password, display_name.as_deref())
                    .await
                {
                    Ok(user) => {
                        if let Err(err) = self
                            .storage
                            .upsert_user_profile(
                                &user.user_id,
                                &user.email,
                                user.display_name.as_deref(),
                                user.photo_url.as_deref(),
                            )
                            .await
                        {
                            warn!(user_id = %user.user_id, "account: profile cache write failed: {err}");
                        }
                        let profile = self.cached_profile(&user).await;
                        AccountState {
                            is_loading: false,
                            is_signed_in: true,
                            user: Some(user),
                            profile,
                            ..state
                        }
                    }
                    Err(err) => AccountState {
                        is_loading: false,
                        error_message: Some(err.to_string()),
                        ..state
                    },
                }
            }
            AccountIntent::UpdateProfile {
                display_name,
                photo_url,
            } => {
                Self::loading(&state, publisher);
                match self
                    .auth
                    .update_profile(display_name.as_deref(), photo_url.as_deref())
                    .await
                {
                    Ok(user) => {
                        if let Err(err) = self
                            .storage
                            .upsert_user_profile(
                                &user.user_id,
                                &user.email,
                                user.display_name.as_deref(),
                                user.photo_url.as_deref(),
                            )
                            .await
                        {
                            warn!(user_id = %user.user_id, "account: profile cache write failed: {err}");
                        }
                        let profile = self.cached_profile(&user).await;
                        AccountState {
                            is_loading: false,
                            user: Some(user),
                            profile,
                            ..state
                        }
                    }
                    Err(err) => AccountState {
                        is_loading: false,
                        error_message: Some(err.to_string()),
                        ..state
                    },
                }
            }
            AccountIntent::SendPasswordReset { email } => {
                Self::loading(&state, publisher);
                match self.auth.send_password_reset(&email).await {
                    Ok(()) => AccountState {
                        is_loading: false,
                        password_reset_sent: true,
                        ..state
                    },
                    Err(err) => AccountState {
                        is_loading: false,
                        error_message: Some(err.to_string()),
                        ..state
                    },
                }
            }
            AccountIntent::SignOut => {
                Self::loading(&state, publisher);
                match self.auth.sign_out().await {
                    Ok(()) => AccountState {
                        is_loading: false,
                        ..AccountState::default()
                    },
                    Err(err) => AccountState {
                        is_loading: false,
                        error_message: Some(err.to_string()),
                        ..state
                    },
                }
            }
            AccountIntent::DeleteAccount => {
                Self::loading(&state, publisher);
                let user_id = state.user.as_ref().map(|u| u.user_id.clone());
                match self.auth.delete_account().await {
                    Ok(()) => {
                        if let Some(user_id) = user_id {
                            if let Err(err) = self.storage.delete_user_profile(&user_id).await {
                                warn!(user_id = %user_id, "account: profile cache delete failed: {err}");
                            }
                        }
                        AccountState {
                            is_loading: false,
                            ..AccountState::default()
                        }
                    }
                    Err(err) => AccountState {
                        is_loading: false,
                        error_message: Some(err.to_string()),
                        ..state
                    },
                }
            }
            AccountIntent::ClearError => AccountState {
                error_message: None,
                ..state
            },
        }
    }
}
