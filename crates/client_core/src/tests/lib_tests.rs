use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::{net::TcpListener, sync::broadcast, sync::Mutex};

use shared::{
    domain::{FavoriteNews, NotificationChannel, SourceId, UserId},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{
        AuthUserPayload, ClearFavoritesResponse, FavoriteDocument, SessionResponse, SignInRequest,
        SignUpRequest, SyncEvent, ToggleFavoriteResponse, UpdateProfileRequest,
    },
};

use crate::{
    auth::{AuthRepository, HttpAuthApi, NotSignedIn},
    favorites::{FavoritesRepository, HttpFavoritesStore},
    news::{HttpSourcesApi, NewsRepository, SourcesApi},
    notifications::NotificationListener,
};

const TEST_API_KEY: &str = "k-test";

// -- fake news provider ------------------------------------------------------

async fn handle_sources(Query(params): Query<HashMap<String, String>>) -> Response {
    if params.get("apikey").map(String::as_str) != Some(TEST_API_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new(ErrorCode::Unauthorized, "bad api key")),
        )
            .into_response();
    }
    let country = params.get("country").cloned().unwrap_or_default();
    let body = serde_json::json!({
        "status": "success",
        "totalResults": 2,
        "results": [
            {
                "id": format!("{country}-times"),
                "name": "The Times",
                "icon": "https://icons.example/times.png",
                "description": "General news",
                "category": ["Top", "World"],
                "url": "https://times.example",
            },
            {
                "id": format!("{country}-sport"),
                "name": "Sport Daily",
                "category": ["Sports"],
                "website": "https://sport.example",
            },
        ],
    });
    Json(body).into_response()
}

async fn spawn_news_server() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().route("/sources", get(handle_sources));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

// -- fake sync service -------------------------------------------------------

#[derive(Clone)]
struct SyncState {
    favorites: Arc<Mutex<HashMap<String, BTreeMap<String, FavoriteDocument>>>>,
    events: broadcast::Sender<String>,
}

impl SyncState {
    fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            favorites: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    async fn snapshot_event(&self, user: &str) -> String {
        let favorites = self
            .favorites
            .lock()
            .await
            .get(user)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        serde_json::to_string(&SyncEvent::FavoritesChanged {
            user_id: UserId(user.to_string()),
            favorites,
        })
        .expect("serialize event")
    }

    async fn push_snapshot(&self, user: &str) {
        let event = self.snapshot_event(user).await;
        let _ = self.events.send(event);
    }
}

fn test_session(email: &str) -> SessionResponse {
    SessionResponse {
        user: AuthUserPayload {
            user_id: UserId("uid-1".into()),
            email: email.to_string(),
            display_name: None,
            photo_url: None,
        },
        id_token: "token-1".into(),
    }
}

async fn handle_sign_in(Json(request): Json<SignInRequest>) -> Response {
    if request.password == "secret" {
        Json(test_session(&request.email)).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new(ErrorCode::Unauthorized, "wrong password")),
        )
            .into_response()
    }
}

async fn handle_sign_up(Json(request): Json<SignUpRequest>) -> Response {
    let mut session = test_session(&request.email);
    session.user.display_name = request.display_name;
    Json(session).into_response()
}

async fn handle_profile(Json(request): Json<UpdateProfileRequest>) -> Response {
    let mut user = test_session("a@example.com").user;
    user.display_name = request.display_name;
    user.photo_url = request.photo_url;
    Json(user).into_response()
}

async fn handle_list_favorites(
    State(state): State<SyncState>,
    Path(user): Path<String>,
) -> Response {
    let favorites: Vec<FavoriteDocument> = state
        .favorites
        .lock()
        .await
        .get(&user)
        .map(|docs| docs.values().cloned().collect())
        .unwrap_or_default();
    Json(favorites).into_response()
}

async fn handle_put_favorite(
    State(state): State<SyncState>,
    Path((user, id)): Path<(String, String)>,
    Json(document): Json<FavoriteDocument>,
) -> Response {
    state
        .favorites
        .lock()
        .await
        .entry(user.clone())
        .or_default()
        .insert(id, document);
    state.push_snapshot(&user).await;
    StatusCode::NO_CONTENT.into_response()
}

async fn handle_delete_favorite(
    State(state): State<SyncState>,
    Path((user, id)): Path<(String, String)>,
) -> Response {
    if let Some(docs) = state.favorites.lock().await.get_mut(&user) {
        docs.remove(&id);
    }
    state.push_snapshot(&user).await;
    StatusCode::NO_CONTENT.into_response()
}

async fn handle_toggle_favorite(
    State(state): State<SyncState>,
    Path(user): Path<String>,
    Json(document): Json<FavoriteDocument>,
) -> Response {
    let now_favorite = {
        let mut favorites = state.favorites.lock().await;
        let docs = favorites.entry(user.clone()).or_default();
        if docs.remove(document.id.as_str()).is_some() {
            false
        } else {
            docs.insert(document.id.to_string(), document);
            true
        }
    };
    state.push_snapshot(&user).await;
    Json(ToggleFavoriteResponse { now_favorite }).into_response()
}

async fn handle_clear_favorites(
    State(state): State<SyncState>,
    Path(user): Path<String>,
) -> Response {
    let removed = {
        let mut favorites = state.favorites.lock().await;
        favorites
            .get_mut(&user)
            .map(|docs| {
                let removed = docs.len() as u64;
                docs.clear();
                removed
            })
            .unwrap_or(0)
    };
    state.push_snapshot(&user).await;
    Json(ClearFavoritesResponse { removed }).into_response()
}

async fn handle_favorites_ws(
    State(state): State<SyncState>,
    Path(user): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    // Subscribe during the upgrade request so writes issued right after the
    // client sees the connection are never lost.
    let rx = state.events.subscribe();
    ws.on_upgrade(move |socket| favorites_ws_loop(socket, user, state, rx))
}

async fn favorites_ws_loop(
    mut socket: WebSocket,
    user: String,
    state: SyncState,
    mut rx: broadcast::Receiver<String>,
) {
    let initial = state.snapshot_event(&user).await;
    if socket.send(WsMessage::Text(initial)).await.is_err() {
        return;
    }
    while let Ok(event) = rx.recv().await {
        if socket.send(WsMessage::Text(event)).await.is_err() {
            break;
        }
    }
}

async fn handle_notifications_ws(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|mut socket| async move {
        // The client attaches its receiver right after connecting; push the
        // alert once it has had the chance to.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let event = serde_json::to_string(&SyncEvent::Notification {
            channel: NotificationChannel::BreakingNews,
            title: "Quake".into(),
            body: "Magnitude 6.1 offshore".into(),
            article_url: Some("https://news.example/quake".into()),
        })
        .expect("serialize event");
        if socket.send(WsMessage::Text(event)).await.is_err() {
            return;
        }
        // Keep the stream open; the client closes it.
        std::future::pending::<()>().await;
    })
}

async fn spawn_sync_server() -> Result<(String, SyncState)> {
    let state = SyncState::new();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/auth/sign_in", post(handle_sign_in))
        .route("/auth/sign_up", post(handle_sign_up))
        .route("/auth/profile", post(handle_profile))
        .route(
            "/auth/password_reset",
            post(|| async { StatusCode::NO_CONTENT }),
        )
        .route("/auth/sign_out", post(|| async { StatusCode::NO_CONTENT }))
        .route(
            "/auth/account",
            axum::routing::delete(|| async { StatusCode::NO_CONTENT }),
        )
        .route(
            "/favorites/:user",
            get(handle_list_favorites).delete(handle_clear_favorites),
        )
        .route(
            "/favorites/:user/toggle",
            post(handle_toggle_favorite),
        )
        .route("/favorites/:user/ws", get(handle_favorites_ws))
        .route(
            "/favorites/:user/:id",
            axum::routing::put(handle_put_favorite).delete(handle_delete_favorite),
        )
        .route("/notifications/ws", get(handle_notifications_ws))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

fn favorite(id: &str) -> FavoriteNews {
    FavoriteNews {
        id: SourceId(id.to_string()),
        title: id.to_string(),
        description: String::new(),
        image_url: None,
        url: Some(format!("https://{id}.example")),
        is_favorite: true,
    }
}

async fn signed_in_repos(base_url: &str) -> (Arc<AuthRepository>, Arc<FavoritesRepository>) {
    let auth = AuthRepository::new(Arc::new(HttpAuthApi::new(base_url)));
    auth.sign_in("a@example.com", "secret").await.expect("sign in");
    let store = Arc::new(HttpFavoritesStore::new(base_url));
    let favorites = FavoritesRepository::new(store, auth.clone());
    (auth, favorites)
}

// -- tests -------------------------------------------------------------------

#[tokio::test]
async fn sources_fetch_decodes_the_provider_shape() {
    let base_url = spawn_news_server().await.expect("spawn news server");
    let api = HttpSourcesApi::new(&base_url, TEST_API_KEY);

    let response = api.fetch_sources("us").await.expect("fetch");
    assert_eq!(response.status.as_deref(), Some("success"));
    assert_eq!(response.total_results, Some(2));

    let repo = NewsRepository::new(Arc::new(api));
    let sources = repo.sources("us").await.expect("sources");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].id.as_deref(), Some("us-times"));
    assert_eq!(sources[1].best_url(), Some("https://sport.example"));
}

#[tokio::test]
async fn bad_api_key_maps_to_the_error_envelope() {
    let base_url = spawn_news_server().await.expect("spawn news server");
    let api = HttpSourcesApi::new(&base_url, "wrong-key");

    let err = api.fetch_sources("us").await.expect_err("must fail");
    let api_err = err.downcast_ref::<ApiException>().expect("ApiException");
    assert_eq!(api_err.code, ErrorCode::Unauthorized);
}

#[tokio::test]
async fn sign_in_failure_carries_the_service_message() {
    let (base_url, _state) = spawn_sync_server().await.expect("spawn sync server");
    let auth = AuthRepository::new(Arc::new(HttpAuthApi::new(&base_url)));

    let err = auth
        .sign_in("a@example.com", "nope")
        .await
        .expect_err("must fail");
    let api_err = err.downcast_ref::<ApiException>().expect("ApiException");
    assert_eq!(api_err.code, ErrorCode::Unauthorized);
    assert_eq!(api_err.message, "wrong password");
    assert!(!auth.is_signed_in().await);
}

#[tokio::test]
async fn sign_up_and_profile_update_keep_the_session_current() {
    let (base_url, _state) = spawn_sync_server().await.expect("spawn sync server");
    let auth = AuthRepository::new(Arc::new(HttpAuthApi::new(&base_url)));

    let user = auth
        .sign_up("a@example.com", "secret", Some("Alice"))
        .await
        .expect("sign up");
    assert_eq!(user.display_name.as_deref(), Some("Alice"));

    let updated = auth
        .update_profile(Some("Alice B"), Some("https://img"))
        .await
        .expect("update profile");
    assert_eq!(updated.display_name.as_deref(), Some("Alice B"));
    let current = auth.current_user().await.expect("current user");
    assert_eq!(current.display_name.as_deref(), Some("Alice B"));
}

#[tokio::test]
async fn favorites_toggle_round_trips_over_http() {
    let (base_url, _state) = spawn_sync_server().await.expect("spawn sync server");
    let (_auth, favorites) = signed_in_repos(&base_url).await;

    assert!(favorites.toggle(&favorite("bbc-news")).await.expect("toggle on"));
    let listed = favorites.favorites().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, SourceId("bbc-news".into()));

    assert!(!favorites.toggle(&favorite("bbc-news")).await.expect("toggle off"));
    assert!(favorites.favorites().await.expect("list").is_empty());
}

#[tokio::test]
async fn clear_all_is_one_batched_delete() {
    let (base_url, _state) = spawn_sync_server().await.expect("spawn sync server");
    let (_auth, favorites) = signed_in_repos(&base_url).await;

    favorites.add(&favorite("a")).await.expect("add");
    favorites.add(&favorite("b")).await.expect("add");
    favorites.add(&favorite("c")).await.expect("add");

    assert_eq!(favorites.clear_all().await.expect("clear"), 3);
    assert!(favorites.favorites().await.expect("list").is_empty());
}

#[tokio::test]
async fn subscription_receives_snapshots_for_every_write() {
    let (base_url, _state) = spawn_sync_server().await.expect("spawn sync server");
    let (_auth, favorites) = signed_in_repos(&base_url).await;

    let mut subscription = favorites.subscribe().await.expect("subscribe");
    let initial = subscription.next_snapshot().await.expect("initial snapshot");
    assert!(initial.is_empty());

    favorites.add(&favorite("bbc-news")).await.expect("add");
    let snapshot = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = subscription.next_snapshot().await.expect("snapshot");
            if !snapshot.is_empty() {
                return snapshot;
            }
        }
    })
    .await
    .expect("snapshot within deadline");
    assert_eq!(snapshot[0].id, SourceId("bbc-news".into()));
    assert!(snapshot[0].is_favorite);

    subscription.close();
}

#[tokio::test]
async fn operations_without_a_session_fail_fast() {
    let (base_url, _state) = spawn_sync_server().await.expect("spawn sync server");
    let auth = AuthRepository::new(Arc::new(HttpAuthApi::new(&base_url)));
    let favorites = FavoritesRepository::new(Arc::new(HttpFavoritesStore::new(&base_url)), auth);

    let err = favorites.favorites().await.expect_err("must fail");
    assert!(err.downcast_ref::<NotSignedIn>().is_some());
    let err = favorites.toggle(&favorite("x")).await.expect_err("must fail");
    assert!(err.downcast_ref::<NotSignedIn>().is_some());
}

#[tokio::test]
async fn sign_out_invalidates_the_session_for_later_calls() {
    let (base_url, _state) = spawn_sync_server().await.expect("spawn sync server");
    let (auth, favorites) = signed_in_repos(&base_url).await;

    favorites.add(&favorite("a")).await.expect("add");
    auth.sign_out().await.expect("sign out");

    let err = favorites.favorites().await.expect_err("must fail");
    assert!(err.downcast_ref::<NotSignedIn>().is_some());
}

#[tokio::test]
async fn notification_listener_delivers_inbound_payloads() {
    let (base_url, _state) = spawn_sync_server().await.expect("spawn sync server");
    let listener = NotificationListener::connect(&base_url)
        .await
        .expect("connect");
    let mut events = listener.subscribe();

    let notification = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("within deadline")
        .expect("notification");
    assert_eq!(notification.channel, NotificationChannel::BreakingNews);
    assert_eq!(notification.channel.channel_id(), "breaking_news");
    assert_eq!(
        notification.article_url.as_deref(),
        Some("https://news.example/quake")
    );

    listener.close();
}
