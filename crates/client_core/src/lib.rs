//! Headless core of the news reader: repositories over the external
//! services (news listing, auth, favorites sync, local store) and one
//! intent processor per feature. Views subscribe to state snapshots and
//! dispatch intents; everything else flows through here.

pub mod analytics;
pub mod auth;
pub mod favorites;
pub mod feature;
mod http;
pub mod mvi;
pub mod news;
pub mod notifications;

pub use auth::{AuthRepository, NotSignedIn};
pub use favorites::FavoritesRepository;
pub use mvi::{Dispatcher, Processor, Publisher, Reducer};
pub use news::NewsRepository;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
