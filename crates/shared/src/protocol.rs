use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{NotificationChannel, SourceId, UserId},
    error::ApiError,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUserPayload {
    pub user_id: UserId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Returned by sign-in and sign-up. The token is opaque to the client and
/// replayed verbatim on authenticated calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: AuthUserPayload,
    pub id_token: String,
}

/// One favorite document as stored by the sync service, keyed by
/// (user, source id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteDocument {
    pub id: SourceId,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub is_favorite: bool,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleFavoriteResponse {
    pub now_favorite: bool,
}

/// Response to the batched clear-all delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearFavoritesResponse {
    pub removed: u64,
}

/// Events pushed by the sync service over its WebSocket. The favorites
/// snapshot is re-sent in full after every write; notifications carry an
/// optional article URL for deep linking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SyncEvent {
    FavoritesChanged {
        user_id: UserId,
        favorites: Vec<FavoriteDocument>,
    },
    Notification {
        channel: NotificationChannel,
        title: String,
        body: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        article_url: Option<String>,
    },
    Error(ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_event_round_trips_as_tagged_json() {
        let event = SyncEvent::Notification {
            channel: NotificationChannel::BreakingNews,
            title: "Quake".into(),
            body: "Magnitude 6.1 offshore".into(),
            article_url: Some("https://news.example/quake".into()),
        };
        let raw = serde_json::to_string(&event).expect("serialize");
        assert!(raw.contains("\"type\":\"notification\""));
        assert!(raw.contains("\"channel\":\"breaking_news\""));

        match serde_json::from_str::<SyncEvent>(&raw).expect("deserialize") {
            SyncEvent::Notification { channel, article_url, .. } => {
                assert_eq!(channel, NotificationChannel::BreakingNews);
                assert_eq!(article_url.as_deref(), Some("https://news.example/quake"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
