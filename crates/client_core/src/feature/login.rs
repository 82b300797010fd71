//! Sign-in form. Field-level validation runs before any external call;
//! a blank field never reaches the auth service.

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    auth::AuthRepository,
    mvi::{Processor, Publisher, Reducer},
};

#[derive(Debug, Clone)]
pub enum LoginIntent {
    UpdateEmail(String),
    UpdatePassword(String),
    TogglePasswordVisibility,
    Submit,
    ClearErrors,
}

#[derive(Debug, Clone, Default)]
pub struct LoginState {
    pub email: String,
    pub password: String,
    pub is_password_visible: bool,
    pub email_error: Option<String>,
    pub password_error: Option<String>,
    pub is_loading: bool,
    pub signed_in: bool,
    pub error_message: Option<String>,
}

pub(crate) fn validate_login(email: &str, password: &str) -> (Option<String>, Option<String>) {
    let email_error = email
        .trim()
        .is_empty()
        .then(|| "Email is required".to_string());
    let password_error = password
        .is_empty()
        .then(|| "Password is required".to_string());
    (email_error, password_error)
}

pub struct LoginFeature {
    auth: Arc<AuthRepository>,
}

impl LoginFeature {
    pub fn new(auth: Arc<AuthRepository>) -> Self {
        Self { auth }
    }

    pub fn spawn(auth: Arc<AuthRepository>) -> Processor<Self> {
        Processor::spawn(Self::new(auth))
    }
}

#[async_trait]
impl Reducer for LoginFeature {
    type Intent = LoginIntent;
    type State = LoginState;

    fn initial_state(&self) -> LoginState {
        LoginState::default()
    }

    async fn reduce(
        &mut self,
        state: LoginState,
        intent: LoginIntent,
        publisher: &Publisher<LoginState>,
    ) -> LoginState {
        match intent {
            LoginIntent::UpdateEmail(email) => LoginState {
                email,
                email_error: None,
                ..state
            },
            LoginIntent::UpdatePassword(password) => LoginState {
                password,
                password_error: None,
                ..state
            },
            LoginIntent::TogglePasswordVisibility => LoginState {
                is_password_visible: !state.is_password_visible,
                ..state
            },
            LoginIntent::Submit => {
                let (email_error, password_error) = validate_login(&state.email, &state.password);
                if email_error.is_some() || password_error.is_some() {
                    return LoginState {
                        email_error,
                        password_error,
                        is_loading: false,
                        ..state
                    };
                }

                publisher.publish(LoginState {
                    is_loading: true,
                    error_message: None,
                    ..state.clone()
                });

                match self.auth.sign_in(&state.email, &state.password).await {
                    Ok(_) => LoginState {
                        is_loading: false,
                        signed_in: true,
                        error_message: None,
                        ..state
                    },
                    Err(err) => LoginState {
                        is_loading: false,
                        signed_in: false,
                        error_message: Some(err.to_string()),
                        ..state
                    },
                }
            }
            LoginIntent::ClearErrors => LoginState {
                email_error: None,
                password_error: None,
                error_message: None,
                ..state
            },
        }
    }
}
