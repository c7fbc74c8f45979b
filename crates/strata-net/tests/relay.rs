use strata_blocks::STONE;
use strata_chunk::{ChunkBuf, ChunkCoord, split_world};
use strata_net::{
    ClientMessage, ConnId, ErrorReason, Position, Relay, RemoteSync, SPAWN, ServerMessage,
};
use strata_runtime::{VoxelEdit, World, WorldOptions};
use strata_store::Storage;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

fn relay() -> Relay {
    Relay::new(3, Storage::memory())
}

fn connect(relay: &mut Relay, id: ConnId) -> UnboundedReceiver<ServerMessage> {
    let (tx, rx) = unbounded_channel();
    relay.connect(id, tx);
    rx
}

fn drain<T>(rx: &mut UnboundedReceiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn create(code: &str, seed: Option<&str>, peer: &str) -> ClientMessage {
    ClientMessage::Create {
        code: Some(code.into()),
        seed: seed.map(Into::into),
        peer_id: Some(peer.into()),
    }
}

fn join(code: &str, peer: &str) -> ClientMessage {
    ClientMessage::Join {
        code: Some(code.into()),
        peer_id: Some(peer.into()),
    }
}

fn edit(x: i32, y: i32, z: i32, id: u8) -> VoxelEdit {
    VoxelEdit { x, y, z, id }
}

/// Two connections in "room1": 1 created it as "a", 2 joined as "b".
fn two_peers() -> (Relay, UnboundedReceiver<ServerMessage>, UnboundedReceiver<ServerMessage>) {
    let mut r = relay();
    let mut a = connect(&mut r, 1);
    let mut b = connect(&mut r, 2);
    r.handle(1, create("room1", Some("alpha"), "a"));
    r.handle(2, join("room1", "b"));
    drain(&mut a);
    drain(&mut b);
    (r, a, b)
}

#[test]
fn create_then_join_lists_players() {
    let mut r = relay();
    let mut a = connect(&mut r, 1);
    let mut b = connect(&mut r, 2);

    r.handle(1, create("room1", Some("alpha"), "a"));
    assert_eq!(
        drain(&mut a),
        vec![ServerMessage::Created {
            code: "room1".into(),
            seed: "alpha".into()
        }]
    );

    r.handle(2, join("room1", "b"));
    let got = drain(&mut b);
    assert_eq!(got.len(), 2);
    assert_eq!(
        got[0],
        ServerMessage::Joined {
            code: "room1".into(),
            seed: "alpha".into()
        }
    );
    let ServerMessage::Players { players } = &got[1] else {
        panic!("expected players, got {:?}", got[1]);
    };
    assert!(players.contains(&("a".to_string(), Position::new(0.0, 70.0, 0.0))));

    assert_eq!(
        drain(&mut a),
        vec![ServerMessage::PlayerJoined {
            peer_id: "b".into()
        }]
    );
    assert_eq!(r.membership(2), Some(("room1", "b")));
}

#[test]
fn edit_is_applied_and_relayed_to_others() {
    let (mut r, mut a, mut b) = two_peers();
    r.handle(1, ClientMessage::Edit {
        payload: edit(5, 70, 5, STONE),
    });

    let session = r.sessions().get_session("room1").unwrap();
    assert_eq!(session.world.voxel(5, 70, 5), STONE);
    assert_eq!(drain(&mut b), vec![ServerMessage::Edit(edit(5, 70, 5, STONE))]);
    assert!(drain(&mut a).is_empty());
}

#[test]
fn rejected_edit_is_not_relayed() {
    let (mut r, _a, mut b) = two_peers();
    r.handle(1, ClientMessage::Edit {
        payload: edit(0, 0, 0, 0),
    });
    r.handle(1, ClientMessage::Edit {
        payload: edit(0, 300, 0, STONE),
    });
    assert!(drain(&mut b).is_empty());
}

#[test]
fn chunk_request_reflects_committed_edits() {
    let (mut r, _a, mut b) = two_peers();
    r.handle(1, ClientMessage::Edit {
        payload: edit(5, 70, 5, STONE),
    });
    drain(&mut b);

    let (coord, (lx, ly, lz)) = split_world(5, 70, 5);
    r.handle(2, ClientMessage::ChunkRequest { payload: coord });
    let got = drain(&mut b);
    let [ServerMessage::ChunkData { chunk }] = got.as_slice() else {
        panic!("expected one chunkData, got {got:?}");
    };
    assert_eq!(chunk.coord(), coord);
    let buf = ChunkBuf::try_from_bytes(coord, chunk.data.clone()).unwrap();
    assert_eq!(buf.get_local(lx, ly, lz), STONE);
}

#[test]
fn out_of_range_chunk_request_keeps_the_connection() {
    let (mut r, mut a, mut b) = two_peers();
    r.handle_line(
        2,
        r#"{"action":"chunkRequest","payload":{"cx":100000000,"cy":0,"cz":0}}"#,
    );
    r.handle(2, ClientMessage::Edit {
        payload: edit(i32::MIN, 70, 0, STONE),
    });
    assert!(drain(&mut b).is_empty());
    assert!(drain(&mut a).is_empty());

    let coord = ChunkCoord::new(0, 2, 0);
    r.handle(2, ClientMessage::ChunkRequest { payload: coord });
    let got = drain(&mut b);
    assert!(matches!(
        got.as_slice(),
        [ServerMessage::ChunkData { chunk }] if chunk.coord() == coord
    ));
}

#[test]
fn fourth_session_is_unavailable() {
    let mut r = relay();
    for (id, code) in [(1, "r1"), (2, "r2"), (3, "r3")] {
        let mut rx = connect(&mut r, id);
        r.handle(id, create(code, None, &format!("p{id}")));
        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::Created { .. }]));
    }
    let mut late = connect(&mut r, 4);
    r.handle(4, create("r4", None, "p4"));
    assert_eq!(
        drain(&mut late),
        vec![ServerMessage::Error {
            reason: ErrorReason::SessionUnavailable
        }]
    );
    assert_eq!(r.sessions().len(), 3);
    for code in ["r1", "r2", "r3"] {
        assert!(r.sessions().get_session(code).is_some());
    }
    assert_eq!(r.membership(4), None);
}

#[test]
fn duplicate_code_is_unavailable() {
    let (mut r, _a, _b) = two_peers();
    let mut c = connect(&mut r, 3);
    r.handle(3, create("room1", Some("beta"), "c"));
    assert_eq!(
        drain(&mut c),
        vec![ServerMessage::Error {
            reason: ErrorReason::SessionUnavailable
        }]
    );
    assert_eq!(r.sessions().get_session("room1").unwrap().seed, "alpha");
}

#[test]
fn missing_seed_defaults() {
    let mut r = relay();
    let mut a = connect(&mut r, 1);
    r.handle(1, create("room", None, "a"));
    assert_eq!(
        drain(&mut a),
        vec![ServerMessage::Created {
            code: "room".into(),
            seed: "default".into()
        }]
    );
}

#[test]
fn join_failures_reply_not_found() {
    let mut r = relay();
    let mut a = connect(&mut r, 1);
    r.handle(1, join("nowhere", "a"));
    r.handle_line(1, r#"{"action":"join","code":"nowhere"}"#);
    let not_found = ServerMessage::Error {
        reason: ErrorReason::NotFound,
    };
    assert_eq!(drain(&mut a), vec![not_found.clone(), not_found]);
}

#[test]
fn incomplete_create_is_dropped() {
    let mut r = relay();
    let mut a = connect(&mut r, 1);
    r.handle_line(1, r#"{"action":"create","code":"room"}"#);
    r.handle_line(1, r#"{"action":"create","peerId":"a"}"#);
    assert!(drain(&mut a).is_empty());
    assert!(r.sessions().is_empty());
}

#[test]
fn actions_before_handshake_are_ignored() {
    let (mut r, _a, mut b) = two_peers();
    let mut c = connect(&mut r, 3);
    let before = r.sessions().get_session("room1").unwrap().world.voxel(1, 80, 1);

    r.handle(3, ClientMessage::Edit {
        payload: edit(1, 80, 1, STONE),
    });
    r.handle(3, ClientMessage::ChunkRequest {
        payload: ChunkCoord::new(0, 2, 0),
    });
    r.handle(3, ClientMessage::State {
        payload: Position::new(1.0, 2.0, 3.0),
    });

    assert!(drain(&mut c).is_empty());
    assert!(drain(&mut b).is_empty());
    assert_eq!(
        r.sessions().get_session("room1").unwrap().world.voxel(1, 80, 1),
        before
    );
}

#[test]
fn malformed_lines_keep_the_connection() {
    let (mut r, mut a, mut b) = two_peers();
    r.handle_line(2, "{not json");
    r.handle_line(2, r#"{"action":"edit","payload":{"x":1}}"#);
    r.handle_line(2, r#"{"action":"teleport"}"#);
    assert!(drain(&mut b).is_empty());

    r.handle_line(2, r#"{"action":"state","payload":{"x":1,"y":2,"z":3}}"#);
    assert_eq!(
        drain(&mut a),
        vec![ServerMessage::State {
            peer_id: "b".into(),
            x: 1.0,
            y: 2.0,
            z: 3.0
        }]
    );
    assert_eq!(r.connection_count(), 2);
}

#[test]
fn state_updates_position_and_skips_sender() {
    let (mut r, mut a, mut b) = two_peers();
    r.handle(2, ClientMessage::State {
        payload: Position::new(4.0, 71.5, -2.0),
    });
    assert!(drain(&mut b).is_empty());
    assert_eq!(drain(&mut a).len(), 1);
    let session = r.sessions().get_session("room1").unwrap();
    assert_eq!(session.players["b"], Position::new(4.0, 71.5, -2.0));
    assert_eq!(session.players["a"], SPAWN);
}

#[test]
fn disconnect_cleans_up_and_removes_empty_sessions() {
    let (mut r, _a, _b) = two_peers();
    r.disconnect(2);
    let session = r.sessions().get_session("room1").unwrap();
    assert!(!session.players.contains_key("b"));
    assert!(!session.peers.contains(&2));

    r.disconnect(1);
    assert!(r.sessions().get_session("room1").is_none());
    assert_eq!(r.connection_count(), 0);
}

#[test]
fn rehandshake_leaves_previous_session() {
    let mut r = relay();
    let mut a = connect(&mut r, 1);
    r.handle(1, create("first", None, "a"));
    r.handle(1, create("second", None, "a"));
    assert_eq!(drain(&mut a).len(), 2);
    assert!(r.sessions().get_session("first").is_none());
    assert_eq!(r.membership(1), Some(("second", "a")));
}

#[test]
fn remote_sync_round_trip() {
    let (mut r, _a, mut b_in) = two_peers();
    let storage = Storage::memory();

    let (a_tx, mut a_out) = unbounded_channel();
    let mut world_a = World::new("alpha", &storage, WorldOptions::headless());
    let mut sync_a = RemoteSync::with_outbox("a".into(), a_tx);
    sync_a.attach(&mut world_a);

    let (b_tx, mut b_out) = unbounded_channel();
    let mut world_b = World::new("alpha-b", &storage, WorldOptions::headless());
    let mut sync_b = RemoteSync::with_outbox("b".into(), b_tx);
    sync_b.attach(&mut world_b);

    // B pulls the chunk it is about to see edited
    let (coord, _) = split_world(5, 70, 5);
    world_b.ensure_chunk(coord);
    assert_eq!(sync_b.sync_resident(&world_b), 1);
    assert_eq!(sync_b.sync_resident(&world_b), 0);
    assert_eq!(sync_b.pending(), 1);
    for msg in drain(&mut b_out) {
        r.handle(2, msg);
    }

    // A edits locally; the hook forwards it
    assert!(world_a.set_voxel(5, 70, 5, STONE));
    let forwarded = drain(&mut a_out);
    assert_eq!(
        forwarded,
        vec![ClientMessage::Edit {
            payload: edit(5, 70, 5, STONE)
        }]
    );
    for msg in forwarded {
        r.handle(1, msg);
    }

    // B applies the chunk data and the relayed edit
    let inbound = drain(&mut b_in);
    assert_eq!(inbound.len(), 2);
    for msg in inbound {
        sync_b.apply(&mut world_b, msg);
    }
    assert_eq!(sync_b.pending(), 0);
    assert_eq!(world_b.voxel(5, 70, 5), STONE);
    // remote edits never fire the hook, so nothing is echoed
    assert!(drain(&mut b_out).is_empty());
    assert_eq!(sync_b.sync_resident(&world_b), 0);
}

#[test]
fn remote_sync_tracks_other_players() {
    let (tx, _rx) = unbounded_channel();
    let mut world = World::new("w", &Storage::memory(), WorldOptions::headless());
    let mut sync = RemoteSync::with_outbox("me".into(), tx);

    sync.apply(
        &mut world,
        ServerMessage::Players {
            players: vec![("me".into(), SPAWN), ("other".into(), SPAWN)],
        },
    );
    sync.apply(
        &mut world,
        ServerMessage::PlayerJoined {
            peer_id: "me".into(),
        },
    );
    sync.apply(
        &mut world,
        ServerMessage::State {
            peer_id: "other".into(),
            x: 1.0,
            y: 2.0,
            z: 3.0,
        },
    );
    let players: Vec<_> = sync.remote_players().iter().collect();
    assert_eq!(players, vec![(&"other".to_string(), &Position::new(1.0, 2.0, 3.0))]);
}
