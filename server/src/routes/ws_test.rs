use super::*;
use crate::state::test_helpers::{attach_session, test_app_state};
use futures_util::{SinkExt, StreamExt};
use protocol::{ClientEvent, ServerEvent};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

async fn assert_channel_has_event(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("event receive timed out")
        .expect("channel closed")
}

async fn assert_channel_empty(rx: &mut mpsc::Receiver<ServerEvent>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected channel to remain empty"
    );
}

// =============================================================================
// DELIVERY
// =============================================================================

#[tokio::test]
async fn room_actions_reach_members_except_excluded_sender() {
    let state = test_app_state();
    let mut sync = state.sync.write().await;
    let (sender, mut rx_sender) = attach_session(&mut sync, Some("a"));
    let (_peer, mut rx_peer) = attach_session(&mut sync, Some("a"));
    let (_other_room, mut rx_other) = attach_session(&mut sync, Some("b"));

    let event = ServerEvent::UpdatePixel { x: 5, y: 5, pan: [0, 0], value: 7 };
    apply_actions(
        &sync,
        &state.notifier,
        sender,
        vec![Action::Room { room: "a".into(), event: event.clone(), exclude: Some(sender) }],
    );
    drop(sync);

    assert_eq!(assert_channel_has_event(&mut rx_peer).await, event);
    assert_channel_empty(&mut rx_sender).await;
    assert_channel_empty(&mut rx_other).await;
}

#[tokio::test]
async fn all_actions_reach_lobby_sessions_too() {
    let state = test_app_state();
    let mut sync = state.sync.write().await;
    let (roomed, mut rx_roomed) = attach_session(&mut sync, Some("a"));
    let (_lobby, mut rx_lobby) = attach_session(&mut sync, None);

    let event = ServerEvent::RoomCounts { counts: sync.presence.counts_by_room() };
    apply_actions(&sync, &state.notifier, roomed, vec![Action::All(event.clone())]);
    drop(sync);

    assert_eq!(assert_channel_has_event(&mut rx_roomed).await, event);
    assert_eq!(assert_channel_has_event(&mut rx_lobby).await, event);
}

#[tokio::test]
async fn reply_actions_reach_only_the_sender() {
    let state = test_app_state();
    let mut sync = state.sync.write().await;
    let (sender, mut rx_sender) = attach_session(&mut sync, Some("a"));
    let (_peer, mut rx_peer) = attach_session(&mut sync, Some("a"));

    let event = ServerEvent::MemberList { members: vec![sender.to_string()] };
    apply_actions(&sync, &state.notifier, sender, vec![Action::Reply(event.clone())]);
    drop(sync);

    assert_eq!(assert_channel_has_event(&mut rx_sender).await, event);
    assert_channel_empty(&mut rx_peer).await;
}

// =============================================================================
// TRANSPORT
// =============================================================================

async fn spawn_server() -> std::net::SocketAddr {
    let state = test_app_state();
    let app = crate::routes::app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server failed");
    });
    addr
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(addr: std::net::SocketAddr, room: Option<&str>) -> WsStream {
    let url = match room {
        Some(room) => format!("ws://{addr}/socket?room={room}"),
        None => format!("ws://{addr}/socket"),
    };
    let (stream, _) = connect_async(url).await.expect("websocket connect");
    stream
}

async fn recv_event(ws: &mut WsStream) -> ServerEvent {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("ws receive timed out")
            .expect("ws stream ended")
            .expect("ws transport error");
        if let WsMessage::Text(text) = msg {
            return protocol::decode_server_event(text.as_str()).expect("server event decodes");
        }
    }
}

/// Drain events until one matches `pred`, with an overall timeout.
async fn recv_until(ws: &mut WsStream, pred: impl Fn(&ServerEvent) -> bool) -> ServerEvent {
    for _ in 0..16 {
        let event = recv_event(ws).await;
        if pred(&event) {
            return event;
        }
    }
    panic!("expected event did not arrive");
}

async fn assert_no_event(ws: &mut WsStream) {
    assert!(
        timeout(Duration::from_millis(120), ws.next()).await.is_err(),
        "expected no further websocket traffic"
    );
}

async fn send_event(ws: &mut WsStream, event: &ClientEvent) {
    let json = protocol::encode_client_event(event).expect("encode");
    ws.send(WsMessage::Text(json.into())).await.expect("ws send");
}

#[tokio::test]
async fn connect_rejects_unknown_room_before_upgrade() {
    let addr = spawn_server().await;
    let result = connect_async(format!("ws://{addr}/socket?room=zz")).await;
    assert!(result.is_err(), "unknown room must not upgrade");
}

#[tokio::test]
async fn join_delivers_member_list_and_counts() {
    let addr = spawn_server().await;
    let mut ws = connect(addr, Some("a")).await;

    let ServerEvent::MemberList { members } = recv_event(&mut ws).await else {
        panic!("expected member list first");
    };
    assert_eq!(members.len(), 1);

    let ServerEvent::RoomCounts { counts } = recv_event(&mut ws).await else {
        panic!("expected room counts second");
    };
    assert_eq!(counts.get("a"), Some(&1));
    assert_eq!(counts.get("b"), Some(&0));
}

#[tokio::test]
async fn pixel_edits_fan_out_to_peers_but_not_the_sender() {
    let addr = spawn_server().await;
    let mut ws_a = connect(addr, Some("a")).await;
    let mut ws_b = connect(addr, Some("a")).await;

    // Both see the two-member room before the edit.
    recv_until(&mut ws_a, |e| {
        matches!(e, ServerEvent::MemberList { members } if members.len() == 2)
    })
    .await;
    // Drain B's join traffic fully (member list, then counts) so the
    // no-echo assertion below starts from an empty queue.
    recv_until(&mut ws_b, |e| {
        matches!(e, ServerEvent::RoomCounts { counts } if counts.get("a") == Some(&2))
    })
    .await;

    send_event(&mut ws_b, &ClientEvent::SetPixel { x: 5, y: 5, pan: [0, 0], value: 7 })
        .await;

    let update = recv_until(&mut ws_a, |e| matches!(e, ServerEvent::UpdatePixel { .. })).await;
    assert_eq!(update, ServerEvent::UpdatePixel { x: 5, y: 5, pan: [0, 0], value: 7 });

    // The sender's optimistic local apply already holds the edit; no echo.
    assert_no_event(&mut ws_b).await;
}

#[tokio::test]
async fn fetch_state_returns_snapshot_reflecting_prior_edits() {
    let addr = spawn_server().await;
    let mut ws = connect(addr, Some("c")).await;

    // Events on one connection are processed in order, so the snapshot
    // requested after the edit must contain it.
    send_event(&mut ws, &ClientEvent::SetPixel { x: 1, y: 2, pan: [0, 0], value: 3 }).await;
    send_event(&mut ws, &ClientEvent::FetchState).await;

    let snapshot = recv_until(&mut ws, |e| matches!(e, ServerEvent::StateSnapshot { .. })).await;
    let ServerEvent::StateSnapshot { grid, members } = snapshot else {
        panic!("recv_until returned a non-snapshot event");
    };
    assert_eq!(grid.get(1, 2), Ok(3));
    assert_eq!(members.len(), 1);
}

#[tokio::test]
async fn lobby_connection_sees_counts_but_no_canvas_traffic() {
    let addr = spawn_server().await;
    let mut lobby = connect(addr, None).await;

    let ServerEvent::RoomCounts { counts } = recv_event(&mut lobby).await else {
        panic!("expected initial room counts");
    };
    assert_eq!(counts.values().sum::<usize>(), 0);

    // A room join updates the lobby's counts...
    let mut ws_a = connect(addr, Some("a")).await;
    recv_until(&mut lobby, |e| {
        matches!(e, ServerEvent::RoomCounts { counts } if counts.get("a") == Some(&1))
    })
    .await;

    // ...but canvas edits in the room never reach the lobby.
    send_event(&mut ws_a, &ClientEvent::SetPixel { x: 0, y: 0, pan: [0, 0], value: 1 })
        .await;
    assert_no_event(&mut lobby).await;
}

#[tokio::test]
async fn disconnect_updates_member_list_for_remaining_peers() {
    let addr = spawn_server().await;
    let mut ws_a = connect(addr, Some("d")).await;
    let ws_b = connect(addr, Some("d")).await;

    recv_until(&mut ws_a, |e| {
        matches!(e, ServerEvent::MemberList { members } if members.len() == 2)
    })
    .await;

    drop(ws_b);

    recv_until(&mut ws_a, |e| {
        matches!(e, ServerEvent::MemberList { members } if members.len() == 1)
    })
    .await;
    recv_until(&mut ws_a, |e| {
        matches!(e, ServerEvent::RoomCounts { counts } if counts.get("d") == Some(&1))
    })
    .await;
}
