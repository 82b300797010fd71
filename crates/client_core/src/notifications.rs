//! Inbound push notifications. The sync service fans news alerts out on a
//! WebSocket; the listener decodes them and re-broadcasts locally. Channel
//! identifiers are fixed by [`NotificationChannel`].

use anyhow::Result;
use futures::StreamExt;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

use shared::{domain::NotificationChannel, protocol::SyncEvent};

use crate::http::websocket_url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundNotification {
    pub channel: NotificationChannel,
    pub title: String,
    pub body: String,
    pub article_url: Option<String>,
}

/// Open connection to the notification stream. Dropping (or `close`)
/// stops delivery; in-flight service writes are never affected.
pub struct NotificationListener {
    events: broadcast::Sender<InboundNotification>,
    task: JoinHandle<()>,
}

impl NotificationListener {
    pub async fn connect(sync_url: &str) -> Result<Self> {
        let url = websocket_url(sync_url, "/notifications/ws")?;
        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (_, mut ws_reader) = ws_stream.split();

        let (events, _) = broadcast::channel(64);
        let sender = events.clone();
        let task = tokio::spawn(async move {
            while let Some(message) = ws_reader.next().await {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<SyncEvent>(&text) {
                        Ok(SyncEvent::Notification {
                            channel,
                            title,
                            body,
                            article_url,
                        }) => {
                            info!(channel = channel.channel_id(), %title, "notification received");
                            let _ = sender.send(InboundNotification {
                                channel,
                                title,
                                body,
                                article_url,
                            });
                        }
                        Ok(_) => {}
                        Err(err) => {
                            warn!("notifications: invalid event on stream: {err}");
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("notifications: stream receive failed: {err}");
                        break;
                    }
                }
            }
        });

        Ok(Self { events, task })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InboundNotification> {
        self.events.subscribe()
    }

    pub fn close(self) {
        self.task.abort();
    }
}

impl Drop for NotificationListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}
