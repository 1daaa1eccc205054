//! WebSocket endpoints: `/ws/spicetify` (C6) and `/events` (push
//! `NowPlaying` so clients that support it don't need to poll).

use crate::state::AppContext;
use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;

pub async fn spicetify_ws(
    ws: WebSocketUpgrade,
    State(ctx): State<AppContext>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        ctx.bridge.clone().handle_connection(socket).await;
    })
}

pub async fn events_ws(
    ws: WebSocketUpgrade,
    State(ctx): State<AppContext>,
) -> impl IntoResponse {
    ws.on_upgrade(move |mut socket| async move {
        let mut rx = ctx.subscribe_now_playing();
        loop {
            tokio::select! {
                msg = socket.recv() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(_)) => break,
                    }
                }
                update = rx.recv() => {
                    match update {
                        Ok(now_playing) => {
                            let Ok(text) = serde_json::to_string(&now_playing) else { continue };
                            if socket.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    })
}
