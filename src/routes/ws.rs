//! Realtime notification socket. Clients join rooms with
//! `join-notification-room` frames; the server forwards whatever the hub
//! publishes to those rooms until the socket closes.

use std::collections::HashMap;

use axum::{
    Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::{
    error::AppError,
    middleware::auth::{AuthUser, decode_token},
    realtime::{self, ClientEvent, ServerEvent},
    state::AppState,
};

/// Events queued for one socket before backpressure kicks in.
const SOCKET_BUFFER: usize = 32;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(upgrade))
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT for an authenticated socket; guests connect without one.
    pub token: Option<String>,
}

/// A present-but-invalid token fails the upgrade, mirroring the REST
/// extractor; connecting without a token yields a guest-only socket.
pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let identity = match query.token.as_deref() {
        Some(token) => Some(decode_token(&state.config, token)?),
        None => None,
    };
    Ok(ws.on_upgrade(move |socket| handle_socket(state, identity, socket)))
}

/// Room access: guest rooms are open to anyone holding the session key
/// (the room name is the credential, like order codes); user rooms require
/// the matching token, except admins may watch any user room.
fn may_join(identity: Option<&AuthUser>, room: &str) -> bool {
    if realtime::is_guest_room(room) {
        return true;
    }
    match identity {
        Some(user) if user.is_admin() => realtime::is_user_room(room),
        Some(user) => room == realtime::user_room(user.user_id),
        None => false,
    }
}

async fn handle_socket(state: AppState, identity: Option<AuthUser>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(SOCKET_BUFFER);

    // Single writer task; every joined room funnels into it.
    let writer: JoinHandle<()> = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut forwarders: HashMap<String, JoinHandle<()>> = HashMap::new();

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(event) = serde_json::from_str::<ClientEvent>(&text) else {
            tracing::debug!("unparseable socket frame dropped");
            continue;
        };
        match event {
            ClientEvent::JoinRoom { room } => {
                if !may_join(identity.as_ref(), &room) {
                    tracing::debug!(room, "room join rejected");
                    continue;
                }
                if forwarders.contains_key(&room) {
                    continue;
                }
                let mut room_rx = state.hub.join(&room).await;
                let tx = tx.clone();
                let handle = tokio::spawn(async move {
                    loop {
                        match room_rx.recv().await {
                            Ok(event) => {
                                if tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            // A lagged receiver just misses events.
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                });
                forwarders.insert(room, handle);
            }
            ClientEvent::LeaveRoom { room } => {
                if let Some(handle) = forwarders.remove(&room) {
                    handle.abort();
                }
            }
        }
    }

    for handle in forwarders.into_values() {
        handle.abort();
    }
    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn guest_rooms_are_open() {
        assert!(may_join(None, "guest_abc"));
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            role: "user".into(),
        };
        assert!(may_join(Some(&user), "guest_abc"));
    }

    #[test]
    fn user_rooms_require_matching_identity() {
        let id = Uuid::new_v4();
        let user = AuthUser {
            user_id: id,
            role: "user".into(),
        };
        assert!(may_join(Some(&user), &realtime::user_room(id)));
        assert!(!may_join(Some(&user), &realtime::user_room(Uuid::new_v4())));
        assert!(!may_join(None, &realtime::user_room(id)));
    }

    #[test]
    fn admins_may_watch_any_user_room() {
        let admin = AuthUser {
            user_id: Uuid::new_v4(),
            role: "admin".into(),
        };
        assert!(may_join(Some(&admin), &realtime::user_room(Uuid::new_v4())));
        assert!(!may_join(Some(&admin), "lobby"));
    }
}
