use super::*;
use tempfile::TempDir;

async fn temp_storage() -> (TempDir, Storage) {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("reader.db");
    let url = format!("sqlite://{}", db_path.display().to_string().replace('\\', "/"));
    let storage = Storage::new(&url).await.expect("open storage");
    (dir, storage)
}

#[tokio::test]
async fn preferences_start_at_defaults_and_persist_updates() {
    let (_dir, storage) = temp_storage().await;

    let prefs = storage.preferences().await.expect("load");
    assert_eq!(prefs, Preferences::default());

    assert!(storage.toggle_dark_theme().await.expect("toggle"));
    assert!(!storage.toggle_dark_theme().await.expect("toggle back"));

    storage.set_breaking_opt_in(true).await.expect("breaking");
    storage.set_daily_opt_in(true).await.expect("daily");

    let prefs = storage.preferences().await.expect("reload");
    assert!(!prefs.dark_theme);
    assert!(prefs.notif_breaking);
    assert!(prefs.notif_daily);
}

#[tokio::test]
async fn reading_seconds_accumulate_and_reject_non_positive() {
    let (_dir, storage) = temp_storage().await;

    assert_eq!(storage.add_reading_seconds(90).await.expect("add"), 90);
    assert_eq!(storage.add_reading_seconds(30).await.expect("add"), 120);

    assert!(storage.add_reading_seconds(0).await.is_err());
    assert!(storage.add_reading_seconds(-5).await.is_err());

    let prefs = storage.preferences().await.expect("reload");
    assert_eq!(prefs.reading_seconds_total, 120);
}

#[tokio::test]
async fn analytics_counters_increment_per_user_and_action() {
    let (_dir, storage) = temp_storage().await;
    let alice = UserId("alice".into());
    let bob = UserId("bob".into());

    assert_eq!(storage.log_action(&alice, "open_article").await.expect("log"), 1);
    assert_eq!(storage.log_action(&alice, "open_article").await.expect("log"), 2);
    assert_eq!(storage.log_action(&alice, "toggle_favorite").await.expect("log"), 1);
    assert_eq!(storage.log_action(&bob, "open_article").await.expect("log"), 1);

    let summary = storage.analytics_summary(&alice).await.expect("summary");
    assert_eq!(
        summary,
        vec![("open_article".to_string(), 2), ("toggle_favorite".to_string(), 1)]
    );
}

#[tokio::test]
async fn clearing_one_user_leaves_other_users_untouched() {
    let (_dir, storage) = temp_storage().await;
    let alice = UserId("alice".into());
    let bob = UserId("bob".into());

    storage.log_action(&alice, "open_article").await.expect("log");
    storage.log_action(&alice, "share").await.expect("log");
    storage.log_action(&bob, "open_article").await.expect("log");

    let removed = storage.clear_analytics(&alice).await.expect("clear");
    assert_eq!(removed, 2);

    assert!(storage.analytics_summary(&alice).await.expect("alice").is_empty());
    assert_eq!(
        storage.analytics_summary(&bob).await.expect("bob"),
        vec![("open_article".to_string(), 1)]
    );
}

#[tokio::test]
async fn clear_action_removes_only_that_counter() {
    let (_dir, storage) = temp_storage().await;
    let alice = UserId("alice".into());

    storage.log_action(&alice, "open_article").await.expect("log");
    storage.log_action(&alice, "share").await.expect("log");
    storage.clear_action(&alice, "share").await.expect("clear action");

    assert_eq!(
        storage.analytics_summary(&alice).await.expect("summary"),
        vec![("open_article".to_string(), 1)]
    );
}

#[tokio::test]
async fn user_profile_round_trip_and_delete() {
    let (_dir, storage) = temp_storage().await;
    let uid = UserId("uid-1".into());

    storage
        .upsert_user_profile(&uid, "a@example.com", Some("Alice"), None)
        .await
        .expect("insert");
    storage
        .upsert_user_profile(&uid, "a@example.com", Some("Alice B"), Some("https://img"))
        .await
        .expect("update");

    let profile = storage.user_profile(&uid).await.expect("load").expect("present");
    assert_eq!(profile.email, "a@example.com");
    assert_eq!(profile.display_name.as_deref(), Some("Alice B"));
    assert_eq!(profile.photo_url.as_deref(), Some("https://img"));

    storage.delete_user_profile(&uid).await.expect("delete");
    assert!(storage.user_profile(&uid).await.expect("load").is_none());
}

#[tokio::test]
async fn creates_parent_dir_for_nested_database_path() {
    let dir = TempDir::new().expect("temp dir");
    let nested = dir.path().join("data").join("inner").join("reader.db");
    let url = format!("sqlite://{}", nested.display().to_string().replace('\\', "/"));

    let storage = Storage::new(&url).await.expect("open nested");
    storage.health_check().await.expect("ping");
    assert!(nested.parent().expect("parent").exists());
}
