use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Settings {
    pub news_api_base_url: String,
    pub news_api_key: String,
    pub sync_service_url: Option<String>,
    pub database_url: String,
    pub default_country: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            news_api_base_url: "https://newsdata.io/api/1".into(),
            news_api_key: String::new(),
            sync_service_url: None,
            database_url: "sqlite://./data/reader.db".into(),
            default_country: "us".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("reader.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("news_api_base_url") {
                settings.news_api_base_url = v.clone();
            }
            if let Some(v) = file_cfg.get("news_api_key") {
                settings.news_api_key = v.clone();
            }
            if let Some(v) = file_cfg.get("sync_service_url") {
                settings.sync_service_url = Some(v.clone());
            }
            if let Some(v) = file_cfg.get("database_url") {
                settings.database_url = v.clone();
            }
            if let Some(v) = file_cfg.get("default_country") {
                settings.default_country = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("NEWS_API_BASE_URL") {
        settings.news_api_base_url = v;
    }
    if let Ok(v) = std::env::var("APP__NEWS_API_BASE_URL") {
        settings.news_api_base_url = v;
    }

    if let Ok(v) = std::env::var("NEWS_API_KEY") {
        settings.news_api_key = v;
    }
    if let Ok(v) = std::env::var("APP__NEWS_API_KEY") {
        settings.news_api_key = v;
    }

    if let Ok(v) = std::env::var("SYNC_SERVICE_URL") {
        settings.sync_service_url = Some(v);
    }
    if let Ok(v) = std::env::var("APP__SYNC_SERVICE_URL") {
        settings.sync_service_url = Some(v);
    }

    if let Ok(v) = std::env::var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Ok(v) = std::env::var("DEFAULT_COUNTRY") {
        settings.default_country = v;
    }

    settings
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}
