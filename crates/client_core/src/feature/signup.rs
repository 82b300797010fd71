//! Account-creation form. Validation mirrors the sign-up screen rules:
//! required email and password, minimum password length of 6, and a
//! matching confirmation. A failed validation never issues an external
//! call.

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    auth::AuthRepository,
    mvi::{Processor, Publisher, Reducer},
};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
pub enum SignUpIntent {
    UpdateEmail(String),
    UpdatePassword(String),
    UpdateConfirmPassword(String),
    UpdateDisplayName(String),
    TogglePasswordVisibility,
    ToggleConfirmVisibility,
    Submit,
    ClearErrors,
}

#[derive(Debug, Clone, Default)]
pub struct SignUpState {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub display_name: String,
    pub is_password_visible: bool,
    pub is_confirm_visible: bool,
    pub email_error: Option<String>,
    pub password_error: Option<String>,
    pub confirm_error: Option<String>,
    pub is_loading: bool,
    pub account_created: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SignUpValidation {
    pub email_error: Option<String>,
    pub password_error: Option<String>,
    pub confirm_error: Option<String>,
}

impl SignUpValidation {
    pub fn is_ok(&self) -> bool {
        self.email_error.is_none() && self.password_error.is_none() && self.confirm_error.is_none()
    }
}

pub(crate) fn validate_sign_up(email: &str, password: &str, confirm: &str) -> SignUpValidation {
    let email_error = email
        .trim()
        .is_empty()
        .then(|| "Email is required".to_string());
    let password_error = if password.is_empty() {
        Some("Password is required".to_string())
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        Some(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ))
    } else {
        None
    };
    let confirm_error = (password != confirm).then(|| "Passwords do not match".to_string());
    SignUpValidation {
        email_error,
        password_error,
        confirm_error,
    }
}

pub struct SignUpFeature {
    auth: Arc<AuthRepository>,
}

impl SignUpFeature {
    pub fn new(auth: Arc<AuthRepository>) -> Self {
        Self { auth }
    }

    pub fn spawn(auth: Arc<AuthRepository>) -> Processor<Self> {
        Processor::spawn(Self::new(auth))
    }
}

#[async_trait]
impl Reducer for SignUpFeature {
    type Intent = SignUpIntent;
    type State = SignUpState;

    fn initial_state(&self) -> SignUpState {
        SignUpState::default()
    }

    async fn reduce(
        &mut self,
        state: SignUpState,
        intent: SignUpIntent,
        publisher: &Publisher<SignUpState>,
    ) -> SignUpState {
        match intent {
            SignUpIntent::UpdateEmail(email) => SignUpState {
                email,
                email_error: None,
                ..state
            },
            SignUpIntent::UpdatePassword(password) => SignUpState {
                password,
                password_error: None,
                confirm_error: None,
                ..state
            },
            SignUpIntent::UpdateConfirmPassword(confirm_password) => SignUpState {
                confirm_password,
                confirm_error: None,
                ..state
            },
            SignUpIntent::UpdateDisplayName(display_name) => SignUpState {
                display_name,
                ..state
            },
            SignUpIntent::TogglePasswordVisibility => SignUpState {
                is_password_visible: !state.is_password_visible,
                ..state
            },
            SignUpIntent::ToggleConfirmVisibility => SignUpState {
                is_confirm_visible: !state.is_confirm_visible,
                ..state
            },
            SignUpIntent::Submit => {
                let validation =
                    validate_sign_up(&state.email, &state.password, &state.confirm_password);
                if !validation.is_ok() {
                    return SignUpState {
                        email_error: validation.email_error,
                        password_error: validation.password_error,
                        confirm_error: validation.confirm_error,
                        is_loading: false,
                        ..state
                    };
                }

                publisher.publish(SignUpState {
                    is_loading: true,
                    error_message: None,
                    ..state.clone()
                });

                let display_name =
                    (!state.display_name.trim().is_empty()).then_some(state.display_name.as_str());
                match self
                    .auth
                    .sign_up(&state.email, &state.password, display_name)
                    .await
                {
                    Ok(_) => SignUpState {
                        is_loading: false,
                        account_created: true,
                        error_message: None,
                        ..state
                    },
                    Err(err) => SignUpState {
                        is_loading: false,
                        account_created: false,
                        error_message: Some(err.to_string()),
                        ..state
                    },
                }
            }
            SignUpIntent::ClearErrors => SignUpState {
                email_error: None,
                password_error: None,
                confirm_error: None,
                error_message: None,
                ..state
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_passwords_are_a_validation_error() {
        let v = validate_sign_up("a@example.com", "secret1", "secret2");
        assert_eq!(v.confirm_error.as_deref(), Some("Passwords do not match"));
        assert!(!v.is_ok());
    }

    #[test]
    fn short_password_is_rejected() {
        let v = validate_sign_up("a@example.com", "abc", "abc");
        assert_eq!(
            v.password_error.as_deref(),
            Some("Password must be at least 6 characters")
        );
    }

    #[test]
    fn valid_input_passes() {
        let v = validate_sign_up("a@example.com", "secret", "secret");
        assert!(v.is_ok());
    }

    #[test]
    fn blank_fields_are_required() {
        let v = validate_sign_up("", "", "");
        assert_eq!(v.email_error.as_deref(), Some("Email is required"));
        assert_eq!(v.password_error.as_deref(), Some("Password is required"));
        // An empty confirmation matches the empty password; the password
        // error is the one that fires.
        assert!(v.confirm_error.is_none());
    }
}
