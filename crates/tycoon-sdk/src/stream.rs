//! Notification stream for real-time updates.

use futures::StreamExt;
use serde::Deserialize;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
};
use tracing::debug;
use tycoon_core::{Notification, Result, TycoonError, UserId};

use crate::client::USER_HEADER;

/// Event types from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// A message for this user or a public announcement.
    Notification(Notification),

    /// The node dropped `skipped` notifications because this stream fell behind.
    Lagged { skipped: u64 },
}

/// WebSocket message from server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsMessage {
    Connected {
        #[allow(dead_code)]
        user_id: UserId,
    },
    Notification {
        notification: Notification,
    },
    Lagged {
        skipped: u64,
    },
}

impl WsMessage {
    fn into_event(self) -> Option<NotificationEvent> {
        match self {
            WsMessage::Connected { .. } => None,
            WsMessage::Notification { notification } => Some(NotificationEvent::Notification(notification)),
            WsMessage::Lagged { skipped } => Some(NotificationEvent::Lagged { skipped }),
        }
    }
}

/// Stream of notifications for one user.
pub struct NotificationStream {
    user_id: UserId,
    receiver: tokio::sync::mpsc::Receiver<NotificationEvent>,
    _handle: tokio::task::JoinHandle<()>,
}

impl NotificationStream {
    /// Connect to the notification stream at `ws_url` as `user_id`.
    pub async fn connect(ws_url: &str, user_id: UserId) -> Result<Self> {
        let mut request = ws_url
            .into_client_request()
            .map_err(|e| TycoonError::ConnectionError(e.to_string()))?;
        request
            .headers_mut()
            .insert(USER_HEADER, HeaderValue::from(user_id.get()));
        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| TycoonError::ConnectionError(e.to_string()))?;

        let (tx, rx) = tokio::sync::mpsc::channel(100);

        let handle = tokio::spawn(async move {
            let (_, mut read) = ws_stream.split();

            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<WsMessage>(&text) {
                        Ok(ws_msg) => {
                            let Some(event) = ws_msg.into_event() else {
                                continue;
                            };
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!("Ignoring unknown stream frame: {}", e),
                    },
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
        });

        Ok(Self {
            user_id,
            receiver: rx,
            _handle: handle,
        })
    }

    /// The user this stream is for.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Get the next event.
    pub async fn next(&mut self) -> Option<NotificationEvent> {
        self.receiver.recv().await
    }
}
