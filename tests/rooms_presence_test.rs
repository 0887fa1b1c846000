//! Room routing and presence through the session layer: join scoping,
//! teardown cleanup, and single-edge presence transitions.

mod common;

use common::{connect, drain, event_types, open_room, test_state};
use loadboard_chat_service::models::MessageKind;
use loadboard_chat_service::presence::PresenceStatus;
use loadboard_chat_service::ws::events::{ClientEvent, ServerEvent};
use loadboard_chat_service::ws::handlers::{close_session, dispatch, open_session};
use uuid::Uuid;

#[tokio::test]
async fn test_events_stay_inside_their_room() {
    let state = test_state();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let carol = Uuid::new_v4();
    let ab = open_room(&state, alice, bob).await;
    let ac = open_room(&state, alice, carol).await;

    let (bob_conn, mut bob_rx) = connect(&state, bob).await;
    let (carol_conn, mut carol_rx) = connect(&state, carol).await;
    dispatch(&state, bob, bob_conn, ClientEvent::ConversationJoin { conversation_id: ab.id })
        .await
        .unwrap();
    dispatch(&state, carol, carol_conn, ClientEvent::ConversationJoin { conversation_id: ac.id })
        .await
        .unwrap();
    drain(&mut bob_rx);
    drain(&mut carol_rx);

    state
        .messages
        .send(ab.id, alice, "for bob only".into(), MessageKind::Text, None, None)
        .await
        .unwrap();

    assert_eq!(event_types(&drain(&mut bob_rx)), vec!["message.new"]);
    assert!(drain(&mut carol_rx).is_empty());
}

#[tokio::test]
async fn test_join_requires_membership() {
    let state = test_state();
    let convo = open_room(&state, Uuid::new_v4(), Uuid::new_v4()).await;
    let stranger = Uuid::new_v4();
    let (conn, _rx) = connect(&state, stranger).await;

    assert!(dispatch(
        &state,
        stranger,
        conn,
        ClientEvent::ConversationJoin { conversation_id: convo.id },
    )
    .await
    .is_err());
    assert_eq!(state.registry.member_count(convo.id).await, 0);
}

#[tokio::test]
async fn test_close_session_cleans_every_room() {
    let state = test_state();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let carol = Uuid::new_v4();
    let ab = open_room(&state, alice, bob).await;
    let ac = open_room(&state, alice, carol).await;

    let (conn, _rx) = connect(&state, alice).await;
    dispatch(&state, alice, conn, ClientEvent::ConversationJoin { conversation_id: ab.id })
        .await
        .unwrap();
    dispatch(&state, alice, conn, ClientEvent::ConversationJoin { conversation_id: ac.id })
        .await
        .unwrap();
    assert_eq!(state.registry.member_count(ab.id).await, 1);

    close_session(&state, conn).await;
    assert_eq!(state.registry.member_count(ab.id).await, 0);
    assert_eq!(state.registry.member_count(ac.id).await, 0);
    assert!(!state.presence.is_online(alice).await);
}

#[tokio::test]
async fn test_presence_transition_fires_once_per_edge() {
    let state = test_state();
    let watcher = Uuid::new_v4();
    let user = Uuid::new_v4();
    let (_watcher_conn, mut watcher_rx) = connect(&state, watcher).await;

    // first device: one online event
    let (first, _rx1) = connect(&state, user).await;
    let events = drain(&mut watcher_rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServerEvent::PresenceChanged { user_id, status, .. } => {
            assert_eq!(*user_id, user);
            assert_eq!(*status, PresenceStatus::Online);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // second device: no transition
    let (second, _rx2) = connect(&state, user).await;
    assert!(drain(&mut watcher_rx).is_empty());

    // first device drops: still online, no event
    close_session(&state, first).await;
    assert!(drain(&mut watcher_rx).is_empty());
    assert!(state.presence.is_online(user).await);

    // last device drops: one offline event
    close_session(&state, second).await;
    let events = drain(&mut watcher_rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServerEvent::PresenceChanged { status, .. } => {
            assert_eq!(*status, PresenceStatus::Offline);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_established_arrives_first() {
    let state = test_state();
    let user = Uuid::new_v4();
    let (connection_id, mut rx) = open_session(&state, user).await;

    match rx.recv().await.unwrap() {
        ServerEvent::ConnectionEstablished { connection_id: c, user_id } => {
            assert_eq!(c, connection_id);
            assert_eq!(user_id, user);
        }
        other => panic!("expected connection.established, got {other:?}"),
    }
}

#[tokio::test]
async fn test_presence_online_bulk_joins_and_offline_leaves() {
    let state = test_state();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let ab = open_room(&state, alice, bob).await;
    let other = open_room(&state, alice, Uuid::new_v4()).await;

    let (conn, _rx) = connect(&state, alice).await;
    dispatch(
        &state,
        alice,
        conn,
        ClientEvent::PresenceOnline { conversation_ids: vec![ab.id, other.id] },
    )
    .await
    .unwrap();
    assert!(state.registry.is_joined(conn, ab.id).await);
    assert!(state.registry.is_joined(conn, other.id).await);

    // backgrounding leaves rooms but keeps the connection and presence
    dispatch(&state, alice, conn, ClientEvent::PresenceOffline).await.unwrap();
    assert!(!state.registry.is_joined(conn, ab.id).await);
    assert!(!state.registry.is_joined(conn, other.id).await);
    assert!(state.presence.is_online(alice).await);
}

#[tokio::test]
async fn test_explicit_leave_stops_delivery() {
    let state = test_state();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let convo = open_room(&state, alice, bob).await;

    let (bob_conn, mut bob_rx) = connect(&state, bob).await;
    dispatch(&state, bob, bob_conn, ClientEvent::ConversationJoin { conversation_id: convo.id })
        .await
        .unwrap();
    dispatch(&state, bob, bob_conn, ClientEvent::ConversationLeave { conversation_id: convo.id })
        .await
        .unwrap();
    drain(&mut bob_rx);

    state
        .messages
        .send(convo.id, alice, "anyone there?".into(), MessageKind::Text, None, None)
        .await
        .unwrap();
    assert!(drain(&mut bob_rx).is_empty());
}
