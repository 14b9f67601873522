//! Realtime ledger feed over WebSocket.
//!
//! The socket carries one JSON message per event for the authenticated
//! account. When the client falls behind, it receives
//! `{"type":"lagged","missed":N}` and should refetch its history.

use axum::{
    Router,
    body::Bytes,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, header::AUTHORIZATION},
    response::IntoResponse,
    routing::get,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use bluepay_core::ledger::{AccountFeed, FeedItem};
use bluepay_shared::AppError;
use bluepay_shared::types::AccountId;

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{extract_bearer_token, verify};

/// Interval between server pings.
const HEARTBEAT_SECS: u64 = 30;

/// Creates the event routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", get(ws_handler))
}

/// Query parameters for the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// GET `/events` - Upgrade to the realtime feed.
///
/// The bearer token may come from the `Authorization` header or, for
/// browsers, the `token` query parameter.
async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(params): Query<WsQuery>,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token)
        .map(str::to_string)
        .or(params.token)
        .ok_or_else(|| ApiError::from(AppError::Unauthorized("token is required".to_string())))?;

    let account = verify(&state.jwt_service, &token)?.account_id();
    let feed = state.ledger.events().subscribe_account(account);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, account, feed)))
}

/// Serializes one feed item.
fn encode(item: &FeedItem) -> Option<String> {
    let encoded = match item {
        FeedItem::Event(event) => serde_json::to_string(event),
        FeedItem::Lagged(missed) => serde_json::to_string(&json!({
            "type": "lagged",
            "missed": missed,
        })),
    };
    encoded
        .map_err(|e| error!(error = %e, "Failed to serialize ledger event"))
        .ok()
}

/// Handle one WebSocket connection.
async fn handle_socket(socket: WebSocket, account: AccountId, mut feed: AccountFeed) {
    let (mut sender, mut receiver) = socket.split();
    info!(account_id = %account, "Event feed connected");

    // Client messages are ignored apart from close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(tokio::time::Duration::from_secs(HEARTBEAT_SECS));

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
                item = feed.next() => {
                    let Some(item) = item else {
                        debug!("Event bus closed");
                        break;
                    };
                    if let FeedItem::Lagged(missed) = item {
                        warn!(account_id = %account, missed, "Event feed lagged");
                    }
                    let Some(text) = encode(&item) else {
                        continue;
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    info!(account_id = %account, "Event feed disconnected");
}
