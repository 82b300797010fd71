use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use client_core::{
    analytics::AnalyticsRepository,
    auth::{AuthApi, HttpAuthApi, MissingAuthApi},
    favorites::{FavoritesStore, HttpFavoritesStore, MissingFavoritesStore},
    feature::{
        analytics::{AnalyticsFeature, AnalyticsIntent},
        favorites::{FavoritesFeature, FavoritesIntent},
        home::{HomeFeature, HomeIntent},
        login::{LoginFeature, LoginIntent},
        settings::{SettingsFeature, SettingsIntent},
        signup::{SignUpFeature, SignUpIntent},
    },
    news::HttpSourcesApi,
    notifications::NotificationListener,
    AuthRepository, FavoritesRepository, NewsRepository,
};
use shared::domain::{FavoriteNews, SourceId};
use storage::Storage;

mod config;

#[derive(Parser, Debug)]
#[command(about = "Terminal news reader")]
struct Cli {
    /// Account email for commands that need a session.
    #[arg(long, global = true)]
    email: Option<String>,
    /// Account password for commands that need a session.
    #[arg(long, global = true)]
    password: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List news sources, optionally filtered by category.
    Sources {
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Sign in through the login form flow.
    Login,
    /// Create an account through the sign-up form flow.
    Signup {
        #[arg(long)]
        confirm_password: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Manage favorites (requires --email/--password).
    Favorites {
        #[command(subcommand)]
        command: FavoritesCommand,
    },
    /// Show or change local settings.
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Per-user usage counters (requires --email/--password).
    Analytics {
        #[command(subcommand)]
        command: AnalyticsCommand,
    },
    /// Stream live favorites snapshots and inbound notifications.
    Watch,
}

#[derive(Subcommand, Debug)]
enum FavoritesCommand {
    List,
    Toggle {
        id: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long)]
        url: Option<String>,
    },
    Remove {
        id: String,
    },
    Clear,
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    Show,
    ToggleTheme,
    AddReading { seconds: i64 },
    SetBreaking { enabled: bool },
    SetDaily { enabled: bool },
}

#[derive(Subcommand, Debug)]
enum AnalyticsCommand {
    Show,
    Log { action: String },
    Clear,
}

#[derive(Debug, Clone)]
struct Credentials {
    email: Option<String>,
    password: Option<String>,
}

impl Credentials {
    fn require(&self) -> Result<(&str, &str)> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => bail!("this command needs --email and --password"),
        }
    }
}

struct App {
    storage: Storage,
    news: Arc<NewsRepository>,
    auth: Arc<AuthRepository>,
    favorites: Arc<FavoritesRepository>,
    analytics: Arc<AnalyticsRepository>,
    default_country: String,
    sync_service_url: Option<String>,
}

async fn build_app(settings: &config::Settings) -> Result<App> {
    let database_url = config::prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await?;

    let news = Arc::new(NewsRepository::new(Arc::new(HttpSourcesApi::new(
        &settings.news_api_base_url,
        &settings.news_api_key,
    ))));

    let (auth_api, favorites_store): (Arc<dyn AuthApi>, Arc<dyn FavoritesStore>) =
        match &settings.sync_service_url {
            Some(url) => (
                Arc::new(HttpAuthApi::new(url)),
                Arc::new(HttpFavoritesStore::new(url)),
            ),
            None => (Arc::new(MissingAuthApi), Arc::new(MissingFavoritesStore)),
        };
    let auth = AuthRepository::new(auth_api);
    let favorites = FavoritesRepository::new(favorites_store, auth.clone());
    let analytics = AnalyticsRepository::new(storage.clone());

    Ok(App {
        storage,
        news,
        auth,
        favorites,
        analytics,
        default_country: settings.default_country.clone(),
        sync_service_url: settings.sync_service_url.clone(),
    })
}

impl App {
    async fn sign_in(&self, credentials: &Credentials) -> Result<()> {
        let (email, password) = credentials.require()?;
        let user = self.auth.sign_in(email, password).await?;
        info!(user_id = %user.user_id, "session established");
        Ok(())
    }

    async fn run_sources(&self, country: Option<String>, category: Option<String>) -> Result<()> {
        let processor = HomeFeature::spawn(self.news.clone(), self.default_country.clone());
        match country {
            Some(country) => processor.dispatch(HomeIntent::Retry { country }),
            None => processor.dispatch(HomeIntent::Load),
        }
        processor.drained().await;
        let state = processor.state();
        if let Some(message) = &state.error_message {
            bail!("source listing failed: {message}");
        }

        let state = match category {
            Some(category) => {
                processor.dispatch(HomeIntent::FilterByCategory(Some(category)));
                processor.drained().await;
                processor.state()
            }
            None => state,
        };

        println!("categories: {}", state.available_categories.join(", "));
        for source in &state.filtered_sources {
            println!(
                "{:24} {:32} {}",
                source.id.as_deref().unwrap_or("-"),
                source.name.as_deref().unwrap_or("-"),
                source.best_url().unwrap_or("-"),
            );
        }
        println!(
            "{} of {} sources",
            state.filtered_sources.len(),
            state.sources.len()
        );
        Ok(())
    }

    async fn run_login(&self, credentials: &Credentials) -> Result<()> {
        let (email, password) = credentials.require()?;
        let processor = LoginFeature::spawn(self.auth.clone());
        processor.dispatch(LoginIntent::UpdateEmail(email.to_string()));
        processor.dispatch(LoginIntent::UpdatePassword(password.to_string()));
        processor.dispatch(LoginIntent::Submit);

        processor.drained().await;
        let state = processor.state();
        if state.signed_in {
            println!("signed in as {}", state.email);
            return Ok(());
        }
        for err in [&state.email_error, &state.password_error, &state.error_message]
            .into_iter()
            .flatten()
        {
            println!("error: {err}");
        }
        bail!("sign in failed");
    }

    async fn run_signup(
        &self,
        credentials: &Credentials,
        confirm_password: String,
        display_name: Option<String>,
    ) -> Result<()> {
        let (email, password) = credentials.require()?;
        let processor = SignUpFeature::spawn(self.auth.clone());
        processor.dispatch(SignUpIntent::UpdateEmail(email.to_string()));
        processor.dispatch(SignUpIntent::UpdatePassword(password.to_string()));
        processor.dispatch(SignUpIntent::UpdateConfirmPassword(confirm_password));
        if let Some(display_name) = display_name {
            processor.dispatch(SignUpIntent::UpdateDisplayName(display_name));
        }
        processor.dispatch(SignUpIntent::Submit);

        processor.drained().await;
        let state = processor.state();
        if state.account_created {
            println!("account created for {}", state.email);
            return Ok(());
        }
        for err in [
            &state.email_error,
            &state.password_error,
            &state.confirm_error,
            &state.error_message,
        ]
        .into_iter()
        .flatten()
        {
            println!("error: {err}");
        }
        bail!("sign up failed");
    }

    async fn run_favorites(
        &self,
        credentials: &Credentials,
        command: FavoritesCommand,
    ) -> Result<()> {
        self.sign_in(credentials).await?;
        let processor = FavoritesFeature::spawn(self.favorites.clone());

        match command {
            FavoritesCommand::List => {}
            FavoritesCommand::Toggle { id, title, url } => {
                processor.dispatch(FavoritesIntent::Toggle(FavoriteNews {
                    id: SourceId(id.clone()),
                    title: if title.is_empty() { id } else { title },
                    description: String::new(),
                    image_url: None,
                    url,
                    is_favorite: true,
                }));
            }
            FavoritesCommand::Remove { id } => {
                processor.dispatch(FavoritesIntent::Remove(SourceId(id)));
            }
            FavoritesCommand::Clear => {
                processor.dispatch(FavoritesIntent::ClearAll);
            }
        }

        // A trailing refresh re-lists after the write, serialized behind it.
        processor.dispatch(FavoritesIntent::Refresh);
        processor.drained().await;
        let state = processor.state();
        if let Some(message) = &state.error_message {
            bail!("favorites operation failed: {message}");
        }
        if state.favorites.is_empty() {
            println!("no favorites");
        }
        for favorite in &state.favorites {
            println!(
                "{:24} {:32} {}",
                favorite.id,
                favorite.title,
                favorite.url.as_deref().unwrap_or("-"),
            );
        }
        Ok(())
    }

    async fn run_settings(&self, command: SettingsCommand) -> Result<()> {
        let processor = SettingsFeature::spawn(self.storage.clone());
        processor.drained().await;

        match command {
            SettingsCommand::Show => {}
            SettingsCommand::ToggleTheme => processor.dispatch(SettingsIntent::ToggleTheme),
            SettingsCommand::AddReading { seconds } => {
                processor.dispatch(SettingsIntent::AddReadingSeconds(seconds));
            }
            SettingsCommand::SetBreaking { enabled } => {
                processor.dispatch(SettingsIntent::SetBreakingOptIn(enabled));
            }
            SettingsCommand::SetDaily { enabled } => {
                processor.dispatch(SettingsIntent::SetDailyOptIn(enabled));
            }
        }
        // Reload so the printout shows what actually persisted.
        processor.dispatch(SettingsIntent::Reload);
        processor.drained().await;
        let state = processor.state();
        if let Some(message) = &state.error_message {
            bail!("settings operation failed: {message}");
        }
        let prefs = &state.preferences;
        println!("dark theme:        {}", prefs.dark_theme);
        println!("reading seconds:   {}", prefs.reading_seconds_total);
        println!("breaking alerts:   {}", prefs.notif_breaking);
        println!("daily digest:      {}", prefs.notif_daily);
        Ok(())
    }

    async fn run_analytics(
        &self,
        credentials: &Credentials,
        command: AnalyticsCommand,
    ) -> Result<()> {
        self.sign_in(credentials).await?;
        let processor = AnalyticsFeature::spawn(self.analytics.clone(), self.auth.clone());
        processor.drained().await;

        match command {
            AnalyticsCommand::Show => {}
            AnalyticsCommand::Log { action } => {
                processor.dispatch(AnalyticsIntent::Log(action));
            }
            AnalyticsCommand::Clear => processor.dispatch(AnalyticsIntent::Clear),
        }
        processor.dispatch(AnalyticsIntent::Refresh);
        processor.drained().await;
        let state = processor.state();
        if let Some(message) = &state.error_message {
            bail!("analytics operation failed: {message}");
        }
        if state.events.is_empty() {
            println!("no recorded actions");
        }
        for (action, count) in &state.events {
            println!("{action:32} {count}");
        }
        Ok(())
    }

    async fn run_watch(&self, credentials: &Credentials) -> Result<()> {
        let Some(sync_url) = &self.sync_service_url else {
            bail!("watch needs a configured sync_service_url");
        };
        self.sign_in(credentials).await?;

        let mut subscription = self.favorites.subscribe().await?;
        let listener = NotificationListener::connect(sync_url).await?;
        let mut notifications = listener.subscribe();
        println!("watching; ctrl-c to stop");

        loop {
            tokio::select! {
                snapshot = subscription.next_snapshot() => {
                    let Some(snapshot) = snapshot else { break };
                    println!("favorites ({}):", snapshot.len());
                    for doc in &snapshot {
                        println!("  {:24} {}", doc.id, doc.title);
                    }
                }
                notification = notifications.recv() => {
                    let Ok(n) = notification else { break };
                    println!(
                        "[{}] {}: {}{}",
                        n.channel.channel_id(),
                        n.title,
                        n.body,
                        n.article_url.map(|u| format!(" ({u})")).unwrap_or_default(),
                    );
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        subscription.close();
        listener.close();
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let credentials = Credentials {
        email: cli.email,
        password: cli.password,
    };
    let settings = config::load_settings();
    let app = build_app(&settings).await?;

    match cli.command {
        Command::Sources { country, category } => app.run_sources(country, category).await,
        Command::Login => app.run_login(&credentials).await,
        Command::Signup {
            confirm_password,
            display_name,
        } => {
            app.run_signup(&credentials, confirm_password, display_name)
                .await
        }
        Command::Favorites { command } => app.run_favorites(&credentials, command).await,
        Command::Settings { command } => app.run_settings(command).await,
        Command::Analytics { command } => app.run_analytics(&credentials, command).await,
        Command::Watch => app.run_watch(&credentials).await,
    }
}
