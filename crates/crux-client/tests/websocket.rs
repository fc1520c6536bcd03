//! End-to-end tests for the connection manager over a real WebSocket.
//!
//! Each test runs a tiny loopback server with `tokio-tungstenite` and
//! points a default (WebSocket) [`ConnectionManager`] at it.

use std::time::Duration;

use crux_client::{ClientStatus, ConnectionManager, ConnectionState, StateReader};
use crux_protocol::{Color, GameState, Planet, Player, Position, encode_game_state};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let addr = listener.local_addr().expect("should have local addr");
    (listener, format!("ws://{addr}"))
}

async fn accept(listener: &TcpListener) -> ServerWs {
    let (stream, _) = listener.accept().await.expect("should accept");
    tokio_tungstenite::accept_async(stream)
        .await
        .expect("handshake should succeed")
}

async fn wait_for(
    reader: &mut StateReader,
    predicate: impl FnMut(&ClientStatus) -> bool,
) -> ClientStatus {
    tokio::time::timeout(Duration::from_secs(5), reader.wait_for(predicate))
        .await
        .expect("timed out waiting for client status")
        .expect("manager dropped")
}

fn world() -> GameState {
    GameState::new(
        vec![Planet::new(
            12.0,
            [
                Color::new(10, 20, 30),
                Color::new(40, 50, 60),
                Color::new(70, 80, 90),
            ],
            2,
            Position::new(100.0, -50.0, 25.0),
        )],
        vec![Player {
            id: 1,
            name: "pilot".into(),
            level: 9,
            position: Position::new(0.5, 0.5, 0.5),
        }],
        Position::new(3.0, 4.0, 5.0),
    )
}

#[tokio::test]
async fn test_snapshot_in_position_out() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        ws.send(Message::Text("Welcome to Crux Server!".into()))
            .await
            .unwrap();
        ws.send(Message::Binary(encode_game_state(&world()).into()))
            .await
            .unwrap();
        let msg = ws.next().await.unwrap().unwrap();
        msg.into_data().to_vec()
    });

    let manager = ConnectionManager::builder().url(url).build().unwrap();
    let mut reader = manager.reader();
    manager.connect().unwrap();

    let status = wait_for(&mut reader, |s| s.game_state.is_some()).await;
    assert!(status.is_connected());
    assert_eq!(*status.game_state.unwrap(), world());

    assert!(manager.send_position(1.5, -2.25, 0.0));
    let received = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should finish")
        .expect("server task should not panic");
    assert_eq!(
        received,
        [0x00, 0x00, 0xC0, 0x3F, 0x00, 0x00, 0x10, 0xC0, 0x00, 0x00, 0x00, 0x00]
    );
}

#[tokio::test]
async fn test_server_close_returns_to_idle() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        // Close only after the client proves it is open.
        let _ = ws.next().await;
        ws.close(None).await.unwrap();
        // Drain until the client acknowledges the close.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let manager = ConnectionManager::builder().url(url).build().unwrap();
    let mut reader = manager.reader();
    manager.connect().unwrap();
    wait_for(&mut reader, |s| s.is_connected()).await;
    assert!(manager.send_position(1.0, 1.0, 1.0));

    let status = wait_for(&mut reader, |s| s.connection == ConnectionState::Idle).await;
    assert!(!status.is_connected());
    assert!(status.last_error.is_none());
    server.await.unwrap();

    // Nothing is live any more, so this is dropped.
    assert!(!manager.send_position(2.0, 2.0, 2.0));
}

#[tokio::test]
async fn test_unreachable_server_records_error() {
    let (listener, url) = listen().await;
    drop(listener);

    let manager = ConnectionManager::builder().url(url).build().unwrap();
    let mut reader = manager.reader();
    manager.connect().unwrap();

    let status = wait_for(&mut reader, |s| s.last_error.is_some()).await;
    assert_eq!(status.connection, ConnectionState::Idle);
    assert!(status.last_error.unwrap().starts_with("connect to ws://127.0.0.1:"));
    assert!(status.game_state.is_none());
}

#[tokio::test]
async fn test_reconnect_reaches_new_server_session() {
    let (listener, url) = listen().await;
    let server = tokio::spawn(async move {
        // First session: accept and keep it until the client goes away.
        let mut first = accept(&listener).await;
        let second = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            ws.send(Message::Binary(encode_game_state(&world()).into()))
                .await
                .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });
        while let Some(Ok(_)) = first.next().await {}
        second.await.unwrap();
    });

    let manager = ConnectionManager::builder().url(url).build().unwrap();
    let mut reader = manager.reader();
    manager.connect().unwrap();
    wait_for(&mut reader, |s| s.is_connected()).await;
    let before = manager.generation();

    let after = manager.reconnect().unwrap();
    assert!(after > before);
    let status = wait_for(&mut reader, |s| s.game_state.is_some()).await;
    assert!(status.is_connected());
    assert_eq!(manager.generation(), after);

    manager.shutdown();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should see both sessions end")
        .unwrap();
}
