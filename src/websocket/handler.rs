use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, State},
    response::Response,
};
use tracing::{info, error, debug};
use futures_util::{StreamExt, SinkExt};
use uuid::Uuid;

use crate::AppState;
use crate::ws::{hub::{Hub, SharedHub}, session::Session};


/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    debug!("New WebSocket connection attempt");
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// Owns a connection's session and releases it from the hub exactly once,
/// whether the connection task finishes normally or is dropped mid-await.
struct ConnectionGuard {
    hub: SharedHub,
    session: Option<Session>,
}

impl ConnectionGuard {
    fn new(hub: SharedHub, session: Session) -> Self {
        Self { hub, session: Some(session) }
    }

    /// Process one inbound frame under the hub lock
    async fn handle_text(&mut self, text: &str) {
        let mut hub = self.hub.lock().await;
        if let Some(session) = self.session.as_mut() {
            session.handle_text(&mut *hub, text);
        }
    }

    async fn release(mut self) {
        if let Some(mut session) = self.session.take() {
            let mut hub = self.hub.lock().await;
            release_connection(&mut hub, &mut session);
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        debug!("Connection {} dropped before release", session.connection_id());
        match self.hub.try_lock() {
            Ok(mut hub) => release_connection(&mut hub, &mut session),
            Err(_) => {
                // Hub is busy; finish the release on the runtime
                let hub = self.hub.clone();
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        runtime.spawn(async move {
                            let mut hub = hub.lock().await;
                            release_connection(&mut hub, &mut session);
                        });
                    }
                    Err(_) => error!(
                        "Connection {} could not be released: no runtime",
                        session.connection_id()
                    ),
                }
            }
        }
    }
}

fn release_connection(hub: &mut Hub, session: &mut Session) {
    match (session.room_id(), session.user()) {
        (Some(room_id), Some(user)) => info!(
            "User disconnected: {} ({}) from room {}",
            session.connection_id(),
            user.name,
            room_id
        ),
        _ => info!("User disconnected: {} (never joined a room)", session.connection_id()),
    }
    session.teardown(hub);
    hub.transport.disconnect(session.connection_id());
}

/// Handle one WebSocket connection from upgrade to close
async fn handle_socket(socket: WebSocket, hub: SharedHub) {

    // Generate unique connection ID to identify this client
    let connection_id = Uuid::new_v4().to_string();
    info!("User connected: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();

    // Register with the transport before reading anything so replies have somewhere to go
    let mut outbox = hub.lock().await.transport.connect(&connection_id);
    let mut guard = ConnectionGuard::new(hub, Session::new(connection_id.clone()));

    // Writer: drain the outbound queue onto the socket. Ends when the
    // transport drops the queue on release.
    let writer_id = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = outbox.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode message for connection {}: {}", writer_id, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Reader: one frame at a time, each fully processed under the hub lock
    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => guard.handle_text(&text).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    // Binary frames carry nothing in this protocol; ping/pong is answered by axum
                }
                Some(Err(e)) => {
                    debug!("WebSocket error on connection {}: {}", connection_id, e);
                    break;
                }
            },
            _ = &mut send_task => break,
        }
    }

    guard.release().await;
    send_task.abort();
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};

    use crate::config::Config;
    use crate::models::SendMessage;
    use crate::routes::api::create_app;
    use crate::ws::{hub::Hub, registry::EVICTION_GRACE_PERIOD, session::Session, transport::ChannelTransport};
    use crate::AppState;
    use super::ConnectionGuard;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn spawn_server() -> (SocketAddr, AppState) {
        let state = AppState {
            hub: Hub::start(ChannelTransport::new(), EVICTION_GRACE_PERIOD),
        };
        let app = create_app(state.clone(), &Config::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, state)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        client
    }

    async fn send(client: &mut Client, frame: serde_json::Value) {
        client
            .send(tungstenite::Message::Text(frame.to_string().into()))
            .await
            .unwrap();
    }

    async fn next_event(client: &mut Client) -> SendMessage {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("connection closed")
                .unwrap();
            if let tungstenite::Message::Text(text) = frame {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    /// Plain HTTP/1.1 GET; returns the status line and the decoded JSON body
    async fn http_get(addr: SocketAddr, path: &str) -> (String, serde_json::Value) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        let (head, body) = response.split_once("\r\n\r\n").unwrap();
        let status = head.lines().next().unwrap().to_string();
        (status, serde_json::from_str(body).unwrap())
    }

    fn join(room_id: &str, name: &str) -> serde_json::Value {
        json!({ "event": "join-room", "data": { "roomId": room_id, "user": { "name": name } } })
    }

    #[tokio::test]
    async fn test_two_clients_share_a_room_over_websocket() {
        let (addr, state) = spawn_server().await;
        let mut alice = connect(addr).await;
        let mut bob = connect(addr).await;

        send(&mut alice, join("r1", "Alice")).await;
        let alice_id = match next_event(&mut alice).await {
            SendMessage::Init(init) => {
                assert!(init.content.contains("Room: r1"));
                assert_eq!(init.users.len(), 1);
                init.users[0].id.clone()
            }
            other => panic!("unexpected event {:?}", other),
        };
        assert!(matches!(next_event(&mut alice).await, SendMessage::UsersUpdate(users) if users.len() == 1));

        send(&mut bob, join("r1", "Bob")).await;
        assert!(matches!(next_event(&mut bob).await, SendMessage::Init(_)));
        assert!(matches!(next_event(&mut bob).await, SendMessage::UsersUpdate(users) if users.len() == 2));
        let bob_id = match next_event(&mut alice).await {
            SendMessage::UserJoined(joined) => {
                assert_eq!(joined.user.name, "Bob");
                joined.id
            }
            other => panic!("unexpected event {:?}", other),
        };
        assert!(matches!(next_event(&mut alice).await, SendMessage::UsersUpdate(users) if users.len() == 2));

        send(
            &mut bob,
            json!({ "event": "text-change", "data": { "roomId": "r1", "content": "console.log(2)", "cursorPos": 5 } }),
        )
        .await;
        match next_event(&mut alice).await {
            SendMessage::TextUpdate(update) => {
                assert_eq!(update.content, "console.log(2)");
                assert_eq!(update.user_id, bob_id);
                assert_eq!(update.cursor_pos, json!(5));
            }
            other => panic!("unexpected event {:?}", other),
        }

        alice.close(None).await.unwrap();
        match next_event(&mut bob).await {
            SendMessage::UserLeft(left) => assert_eq!(left.id, alice_id),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(next_event(&mut bob).await, SendMessage::UsersUpdate(users) if users.len() == 1));

        let hub = state.hub.lock().await;
        assert_eq!(hub.registry.get("r1").unwrap().content, "console.log(2)");
        assert_eq!(hub.registry.get("r1").unwrap().participant_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_frame_gets_error_event() {
        let (addr, _state) = spawn_server().await;
        let mut client = connect(addr).await;

        client
            .send(tungstenite::Message::Text("{\"event\":\"join-room\"}".to_string().into()))
            .await
            .unwrap();
        match next_event(&mut client).await {
            SendMessage::Error(e) => assert_eq!(e.kind, crate::models::ErrorKind::InvalidPayload),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, _state) = spawn_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        stream
            .write_all(b"GET /api/health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"status\":\"ok\""));
    }

    #[tokio::test]
    async fn test_unknown_room_is_404_and_not_created() {
        let (addr, state) = spawn_server().await;

        let (status, body) = http_get(addr, "/api/v1/rooms/ghost").await;
        assert!(status.starts_with("HTTP/1.1 404"), "{}", status);
        assert_eq!(body["code"], 404);
        assert_eq!(state.hub.lock().await.registry.room_count(), 0);
    }

    #[tokio::test]
    async fn test_room_info_leaves_pending_eviction_alone() {
        let (addr, state) = spawn_server().await;
        let mut client = connect(addr).await;
        send(&mut client, join("r1", "Alice")).await;
        assert!(matches!(next_event(&mut client).await, SendMessage::Init(_)));
        client.close(None).await.unwrap();

        let mut pending = false;
        for _ in 0..50 {
            if state.hub.lock().await.registry.is_eviction_pending("r1") {
                pending = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(pending, "teardown never scheduled an eviction");

        let (status, body) = http_get(addr, "/api/v1/rooms/r1").await;
        assert!(status.starts_with("HTTP/1.1 200"), "{}", status);
        assert_eq!(body["id"], "r1");
        assert_eq!(body["n_participants"], 0);
        assert_eq!(body["eviction_pending"], true);

        let hub = state.hub.lock().await;
        assert!(hub.registry.contains("r1"));
        assert!(hub.registry.is_eviction_pending("r1"));
        assert_eq!(hub.registry.pending_eviction_count(), 1);
    }

    #[tokio::test]
    async fn test_diagnostics_counts_after_join() {
        let (addr, _state) = spawn_server().await;
        let mut client = connect(addr).await;
        send(&mut client, join("r1", "Alice")).await;
        assert!(matches!(next_event(&mut client).await, SendMessage::Init(_)));

        let (status, body) = http_get(addr, "/api/v1/diagnostics").await;
        assert!(status.starts_with("HTTP/1.1 200"), "{}", status);
        assert_eq!(body["n_conn"], 1);
        assert_eq!(body["n_participants"], 1);
        assert_eq!(body["n_rooms"], 1);
        assert_eq!(body["n_pending_evictions"], 0);
    }

    #[tokio::test]
    async fn test_dropped_guard_still_tears_down() {
        let hub = Hub::start(ChannelTransport::new(), EVICTION_GRACE_PERIOD);
        let join_frame = join("r1", "Alice").to_string();

        let _outbox = hub.lock().await.transport.connect("c1");
        let mut guard = ConnectionGuard::new(hub.clone(), Session::new("c1".to_string()));
        guard.handle_text(&join_frame).await;
        drop(guard);

        let locked = hub.lock().await;
        assert_eq!(locked.registry.get("r1").unwrap().participant_count(), 0);
        assert!(locked.registry.is_eviction_pending("r1"));
        assert_eq!(locked.transport.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_guard_waits_for_busy_hub() {
        let hub = Hub::start(ChannelTransport::new(), EVICTION_GRACE_PERIOD);
        let join_frame = join("r1", "Alice").to_string();

        let mut guard = ConnectionGuard::new(hub.clone(), Session::new("c1".to_string()));
        let _outbox = hub.lock().await.transport.connect("c1");
        guard.handle_text(&join_frame).await;

        {
            let _busy = hub.lock().await;
            drop(guard);
        }
        for _ in 0..50 {
            if hub.lock().await.registry.is_eviction_pending("r1") {
                break;
            }
            tokio::task::yield_now().await;
        }

        let locked = hub.lock().await;
        assert_eq!(locked.registry.get("r1").unwrap().participant_count(), 0);
        assert!(locked.registry.is_eviction_pending("r1"));
    }
}
