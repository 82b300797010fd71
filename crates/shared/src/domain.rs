use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(SourceId);

/// One news source as returned by the listing provider. Every field except
/// the id is optional on the wire; records are replaced wholesale on each
/// fetch and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsSource {
    pub id: Option<String>,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Vec<String>>,
    pub url: Option<String>,
    pub website: Option<String>,
    pub link: Option<String>,
}

impl NewsSource {
    pub fn categories(&self) -> &[String] {
        self.category.as_deref().unwrap_or_default()
    }

    /// Providers populate one of three alternate URL fields; `url` wins over
    /// `website`, which wins over `link`.
    pub fn best_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.website.as_deref())
            .or(self.link.as_deref())
    }
}

/// A favorited source as the user sees it. Persisted remotely per user,
/// keyed by source id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteNews {
    pub id: SourceId,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub url: Option<String>,
    pub is_favorite: bool,
}

impl FavoriteNews {
    /// Lossy conversion used when favoriting straight from a source listing.
    /// Returns `None` for sources without an id; those cannot be keyed.
    pub fn from_source(source: &NewsSource) -> Option<Self> {
        let id = source.id.as_deref()?;
        if id.is_empty() {
            return None;
        }
        Some(Self {
            id: SourceId(id.to_string()),
            title: source.name.clone().unwrap_or_default(),
            description: source.description.clone().unwrap_or_default(),
            image_url: source.icon.clone(),
            url: source.best_url().map(str::to_string),
            is_favorite: true,
        })
    }
}

/// Locally persisted user preferences. Not keyed by user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub dark_theme: bool,
    pub reading_seconds_total: i64,
    pub notif_breaking: bool,
    pub notif_daily: bool,
}

/// Top-level screens the shell can select between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    #[default]
    News,
    Favorites,
    Settings,
    Analytics,
}

/// Notification channels with their fixed wire identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    BreakingNews,
    DailyDigest,
    CategoryNews,
}

impl NotificationChannel {
    pub fn channel_id(self) -> &'static str {
        match self {
            NotificationChannel::BreakingNews => "breaking_news",
            NotificationChannel::DailyDigest => "daily_digest",
            NotificationChannel::CategoryNews => "category_news",
        }
    }
}
