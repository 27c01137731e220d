//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, StreamExt};
use std::fmt::Display;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{MatchHandle, MatchScore, SceneCommand};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

impl From<ClientMsg> for SceneCommand {
    fn from(msg: ClientMsg) -> Self {
        match msg {
            ClientMsg::Keys { keys } => SceneCommand::Keys(keys),
            ClientMsg::Pressed { codes } => SceneCommand::Pressed(codes),
            ClientMsg::Focus { focused } => SceneCommand::Focus(focused),
            ClientMsg::RemotePose { x, y, facing_right } => {
                SceneCommand::RemotePose { x, y, facing_right }
            }
            ClientMsg::SyncScore { player1, player2 } => {
                SceneCommand::SyncScore(MatchScore { player1, player2 })
            }
            ClientMsg::Ping { t } => SceneCommand::Ping { t },
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(scene_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Response {
    // Refuse before upgrading when the scene is unknown
    match state.match_registry.get(&scene_id) {
        Some(handle) => {
            info!(scene_id = %scene_id, "WebSocket upgrade for scene");
            ws.on_upgrade(move |socket| handle_socket(socket, handle))
        }
        None => {
            warn!(scene_id = %scene_id, "WebSocket upgrade for unknown scene");
            (StatusCode::NOT_FOUND, "Unknown scene").into_response()
        }
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, handle: MatchHandle) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, scene_id = %handle.id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before the welcome so no event falls between the two
    let event_rx = handle.subscribe();

    if let Err(e) = send_msg(&mut ws_sink, &welcome(connection_id, &handle)).await {
        error!(connection_id = %connection_id, error = %e, "Failed to send welcome");
        return;
    }

    run_session(connection_id, &handle, ws_sink, ws_stream, event_rx).await;

    info!(connection_id = %connection_id, scene_id = %handle.id, "WebSocket connection closed");
}

/// First message on every connection. Carries the scene status so a late
/// connection still learns what earlier broadcasts announced.
fn welcome(connection_id: Uuid, handle: &MatchHandle) -> ServerMsg {
    ServerMsg::Welcome {
        connection_id,
        scene_id: handle.id,
        server_time: unix_millis(),
        status: handle.status(),
    }
}

/// Run the WebSocket session with read/write split
async fn run_session(
    connection_id: Uuid,
    handle: &MatchHandle,
    ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    event_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new();
    // Replies meant for this connection only
    let (reply_tx, reply_rx) = mpsc::channel::<ServerMsg>(16);

    // Spawn writer task: scene events and replies -> WebSocket
    let writer_handle = tokio::spawn(write_events(connection_id, ws_sink, event_rx, reply_rx));

    // Reader loop: WebSocket -> scene
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !handle_text(connection_id, &text, &rate_limiter, handle, &reply_tx).await {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(connection_id = %connection_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(connection_id = %connection_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Handle one inbound text frame. Returns false once the scene stopped taking commands.
async fn handle_text(
    connection_id: Uuid,
    text: &str,
    rate_limiter: &ConnectionRateLimiter,
    handle: &MatchHandle,
    reply_tx: &mpsc::Sender<ServerMsg>,
) -> bool {
    if !rate_limiter.check_input() {
        warn!(connection_id = %connection_id, "Rate limited input message");
        return true;
    }

    match serde_json::from_str::<ClientMsg>(text) {
        Ok(client_msg) => {
            if handle.command_tx.send(client_msg.into()).await.is_err() {
                debug!(connection_id = %connection_id, "Scene command channel closed");
                return false;
            }
        }
        Err(e) => {
            warn!(connection_id = %connection_id, error = %e, "Failed to parse client message");
            let _ = reply_tx
                .send(ServerMsg::Error {
                    code: "bad_message".to_string(),
                    message: e.to_string(),
                })
                .await;
        }
    }
    true
}

/// Forward scene events and this connection's replies to the socket.
/// Closes the socket after `scene_ended`.
async fn write_events<S>(
    connection_id: Uuid,
    mut sink: S,
    mut event_rx: broadcast::Receiver<ServerMsg>,
    mut reply_rx: mpsc::Receiver<ServerMsg>,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    loop {
        let msg = tokio::select! {
            biased;
            Some(reply) = reply_rx.recv() => reply,
            event = event_rx.recv() => match event {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        connection_id = %connection_id,
                        lagged_count = n,
                        "Client lagged, skipping {} events", n
                    );
                    // Continue - don't disconnect for lag
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(connection_id = %connection_id, "Event channel closed");
                    break;
                }
            },
        };

        let ended = matches!(msg, ServerMsg::SceneEnded { .. });
        if let Err(e) = send_msg(&mut sink, &msg).await {
            debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
            break;
        }
        if ended {
            let _ = sink.send(Message::Close(None)).await;
            break;
        }
    }
}

/// Send a message over WebSocket
async fn send_msg<S>(sink: &mut S, msg: &ServerMsg) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{HttpAssetLoader, TextureCache};
    use crate::game::r#match::MatchPhase;
    use crate::game::{Iteration, MatchRegistry, MatchSettings};
    use crate::ws::protocol::{Character, KeyState, SceneEntry};
    use futures::channel::mpsc as sink_channel;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn entry() -> SceneEntry {
        SceneEntry {
            match_id: Some("socket".to_string()),
            is_host: true,
            ..SceneEntry::default()
        }
    }

    fn decode(msg: Message) -> ServerMsg {
        match msg {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {:?}", other),
        }
    }

    fn ended(reason: &str) -> ServerMsg {
        ServerMsg::SceneEnded {
            reason: reason.to_string(),
            player1_score: 0,
            player2_score: 0,
        }
    }

    #[tokio::test]
    async fn bad_json_gets_a_private_error_reply() {
        let (handle, mut command_rx) = MatchHandle::detached(entry());
        let mut broadcast_rx = handle.subscribe();
        let (reply_tx, mut reply_rx) = mpsc::channel(4);
        let limiter = ConnectionRateLimiter::new();

        assert!(handle_text(Uuid::new_v4(), "{not json", &limiter, &handle, &reply_tx).await);

        match reply_rx.try_recv() {
            Ok(ServerMsg::Error { code, .. }) => assert_eq!(code, "bad_message"),
            other => panic!("unexpected reply: {:?}", other),
        }
        assert!(broadcast_rx.try_recv().is_err());
        assert!(command_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn valid_text_is_forwarded_as_a_command() {
        let (handle, mut command_rx) = MatchHandle::detached(entry());
        let (reply_tx, mut reply_rx) = mpsc::channel(4);
        let limiter = ConnectionRateLimiter::new();

        let text = r#"{"type":"focus","focused":true}"#;
        assert!(handle_text(Uuid::new_v4(), text, &limiter, &handle, &reply_tx).await);

        assert_eq!(command_rx.try_recv().ok(), Some(SceneCommand::Focus(true)));
        assert!(reply_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn messages_over_the_rate_are_dropped() {
        let (handle, mut command_rx) = MatchHandle::detached(entry());
        let (reply_tx, _reply_rx) = mpsc::channel(4);
        let limiter = ConnectionRateLimiter::with_rate(2);

        for t in 0..3 {
            let text = format!(r#"{{"type":"ping","t":{t}}}"#);
            assert!(handle_text(Uuid::new_v4(), &text, &limiter, &handle, &reply_tx).await);
        }

        assert_eq!(command_rx.try_recv().ok(), Some(SceneCommand::Ping { t: 0 }));
        assert_eq!(command_rx.try_recv().ok(), Some(SceneCommand::Ping { t: 1 }));
        assert!(command_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_scene_stops_the_reader() {
        let (handle, command_rx) = MatchHandle::detached(entry());
        drop(command_rx);
        let (reply_tx, _reply_rx) = mpsc::channel(4);
        let limiter = ConnectionRateLimiter::new();

        let text = r#"{"type":"ping","t":1}"#;
        assert!(!handle_text(Uuid::new_v4(), text, &limiter, &handle, &reply_tx).await);
    }

    #[tokio::test]
    async fn writer_closes_the_socket_after_scene_ended() {
        let (handle, _command_rx) = MatchHandle::detached(entry());
        let (sink, mut sent) = sink_channel::unbounded::<Message>();
        let (_reply_tx, reply_rx) = mpsc::channel(4);
        let writer = tokio::spawn(write_events(Uuid::new_v4(), sink, handle.subscribe(), reply_rx));

        handle.event_tx.send(ServerMsg::Pong { t: 9 }).unwrap();
        handle.event_tx.send(ended("stopped")).unwrap();

        timeout(Duration::from_secs(2), writer).await.unwrap().unwrap();

        assert!(matches!(decode(sent.next().await.unwrap()), ServerMsg::Pong { t: 9 }));
        assert!(matches!(decode(sent.next().await.unwrap()), ServerMsg::SceneEnded { .. }));
        assert!(matches!(sent.next().await, Some(Message::Close(None))));
        assert!(sent.next().await.is_none());
    }

    #[tokio::test]
    async fn replies_reach_only_their_own_connection() {
        let (handle, _command_rx) = MatchHandle::detached(entry());
        let (sink_a, mut sent_a) = sink_channel::unbounded::<Message>();
        let (sink_b, mut sent_b) = sink_channel::unbounded::<Message>();
        let (reply_a, reply_rx_a) = mpsc::channel(4);
        let (_reply_b, reply_rx_b) = mpsc::channel(4);
        let writer_a = tokio::spawn(write_events(Uuid::new_v4(), sink_a, handle.subscribe(), reply_rx_a));
        let writer_b = tokio::spawn(write_events(Uuid::new_v4(), sink_b, handle.subscribe(), reply_rx_b));

        reply_a
            .send(ServerMsg::Error { code: "bad_message".into(), message: "oops".into() })
            .await
            .unwrap();
        assert!(matches!(decode(sent_a.next().await.unwrap()), ServerMsg::Error { .. }));

        handle.event_tx.send(ended("done")).unwrap();
        timeout(Duration::from_secs(2), writer_a).await.unwrap().unwrap();
        timeout(Duration::from_secs(2), writer_b).await.unwrap().unwrap();

        assert!(matches!(decode(sent_a.next().await.unwrap()), ServerMsg::SceneEnded { .. }));
        // b saw the broadcast but never a's reply
        assert!(matches!(decode(sent_b.next().await.unwrap()), ServerMsg::SceneEnded { .. }));
        assert!(matches!(sent_b.next().await, Some(Message::Close(None))));
    }

    #[tokio::test]
    async fn late_welcome_reports_the_running_scene() {
        let registry = Arc::new(MatchRegistry::new());
        let settings = MatchSettings {
            iteration: Iteration::Final,
            frame_rate: 60,
            snapshot_rate: 20,
            preload_assets: false,
        };
        let loader = HttpAssetLoader::new(Duration::from_secs(1)).unwrap();
        let handle = registry.start(entry(), settings, loader, TextureCache::new()).unwrap();

        // scene_started has already gone out by the time this connection arrives
        tokio::time::sleep(Duration::from_millis(100)).await;

        match welcome(Uuid::new_v4(), &handle) {
            ServerMsg::Welcome { scene_id, status, .. } => {
                assert_eq!(scene_id, handle.id);
                assert_eq!(status.phase, MatchPhase::Playing);
                assert_eq!(status.iteration, Iteration::Final);
                assert_eq!(status.player1, Character::Messi);
                assert_eq!(status.player2, Character::Ronaldo);
                assert_eq!(status.load_progress, 1.0);
            }
            other => panic!("unexpected message: {:?}", other),
        }
        registry.shutdown_all("done", Duration::from_secs(2)).await;
    }

    fn command(json: &str) -> SceneCommand {
        serde_json::from_str::<ClientMsg>(json).unwrap().into()
    }

    #[test]
    fn client_messages_become_scene_commands() {
        assert_eq!(
            command(r#"{"type":"keys","keys":{"right":true}}"#),
            SceneCommand::Keys(KeyState { right: true, ..KeyState::default() })
        );
        assert_eq!(
            command(r#"{"type":"pressed","codes":["ArrowUp"]}"#),
            SceneCommand::Pressed(vec!["ArrowUp".to_string()])
        );
        assert_eq!(command(r#"{"type":"focus","focused":true}"#), SceneCommand::Focus(true));
        assert_eq!(
            command(r#"{"type":"sync_score","player1":3,"player2":1}"#),
            SceneCommand::SyncScore(MatchScore { player1: 3, player2: 1 })
        );
        assert_eq!(
            command(r#"{"type":"remote_pose","x":10.0,"y":20.0,"facing_right":false}"#),
            SceneCommand::RemotePose { x: 10.0, y: 20.0, facing_right: Some(false) }
        );
        assert_eq!(command(r#"{"type":"ping","t":7}"#), SceneCommand::Ping { t: 7 });
    }
}
