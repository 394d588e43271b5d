//! WebSocket notification stream.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};
use tycoon_core::{Notification, TycoonError, UserId};

use super::{ApiError, Caller};
use crate::state::AppState;

/// Frame sent over a notification stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationStreamMessage {
    /// First frame after the upgrade.
    Connected { user_id: UserId },

    /// A notification addressed to the user or to the public channel.
    Notification { notification: Notification },

    /// The stream fell behind and dropped `skipped` notifications.
    Lagged { skipped: u64 },
}

impl NotificationStreamMessage {
    /// The frame for `notification`, or `None` when `user_id` must not see it.
    pub fn for_user(notification: Notification, user_id: UserId) -> Option<Self> {
        notification
            .is_visible_to(user_id)
            .then_some(NotificationStreamMessage::Notification { notification })
    }
}

/// A caller may only open the stream of its own user.
pub fn authorize_stream(caller: UserId, user_id: UserId) -> Result<UserId, ApiError> {
    if caller != user_id {
        warn!(caller = %caller, user_id = %user_id, "Rejected notification stream for another user");
        return Err(ApiError(TycoonError::Unauthorized { user_id: caller }));
    }
    Ok(user_id)
}

/// Notifications for one user, plus public announcements.
pub async fn notification_stream(
    Caller(caller): Caller,
    Path(user_id): Path<UserId>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = authorize_stream(caller, user_id)?;
    // Subscribe before the upgrade so nothing sent in between is lost.
    let stream = BroadcastStream::new(state.notifier.subscribe());
    Ok(ws.on_upgrade(move |socket| handle_notification_stream(socket, user_id, stream)))
}

async fn send(socket: &mut WebSocket, msg: &NotificationStreamMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to encode stream frame: {}", e);
            return false;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_notification_stream(
    mut socket: WebSocket,
    user_id: UserId,
    mut stream: BroadcastStream<Notification>,
) {
    debug!(user_id = %user_id, "Notification stream opened");
    if !send(&mut socket, &NotificationStreamMessage::Connected { user_id }).await {
        return;
    }

    loop {
        tokio::select! {
            next = stream.next() => {
                let frame = match next {
                    Some(Ok(notification)) => {
                        match NotificationStreamMessage::for_user(notification, user_id) {
                            Some(frame) => frame,
                            None => continue,
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        warn!(user_id = %user_id, skipped, "Notification stream lagged");
                        NotificationStreamMessage::Lagged { skipped }
                    }
                    None => break,
                };
                if !send(&mut socket, &frame).await {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = socket.send(Message::Pong(data)).await;
                    }
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
    debug!(user_id = %user_id, "Notification stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_filtered_per_user() {
        let direct = Notification::to_user(UserId(1), "Your company received 50");
        assert!(NotificationStreamMessage::for_user(direct.clone(), UserId(2)).is_none());
        assert_eq!(
            NotificationStreamMessage::for_user(direct.clone(), UserId(1)),
            Some(NotificationStreamMessage::Notification { notification: direct })
        );

        let public = Notification::to_channel("A new company appeared: Swift");
        assert!(NotificationStreamMessage::for_user(public, UserId(9)).is_some());
    }

    #[test]
    fn test_stream_is_limited_to_its_owner() {
        assert_eq!(authorize_stream(UserId(4), UserId(4)).unwrap(), UserId(4));
        let err = authorize_stream(UserId(4), UserId(5)).unwrap_err();
        assert_eq!(err.status_and_code().1, "unauthorized");
    }

    #[test]
    fn test_frame_wire_format() {
        let json = serde_json::to_value(NotificationStreamMessage::Lagged { skipped: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "lagged", "skipped": 3}));
    }
}
