use std::net::SocketAddr;
use std::time::Duration;

use strata_blocks::STONE;
use strata_chunk::{ChunkBuf, split_world};
use strata_net::{
    ClientTls, ErrorReason, Hello, MAX_FRAME, NetClient, NetError, SPAWN, Server, ServerConfig,
    ServerMessage, TlsFiles, Welcome,
};
use strata_runtime::VoxelEdit;
use strata_store::Storage;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;

fn fixture(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

async fn start(config: ServerConfig) -> SocketAddr {
    let server = Server::bind(&config, Storage::memory()).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

fn local_config() -> ServerConfig {
    ServerConfig {
        addr: "127.0.0.1:0".parse().unwrap(),
        ..ServerConfig::default()
    }
}

async fn next(client: &mut NetClient) -> ServerMessage {
    timeout(Duration::from_secs(5), client.next_message())
        .await
        .expect("timed out waiting for the server")
        .unwrap()
        .expect("server closed the connection")
}

fn create(code: &str, seed: &str) -> Hello {
    Hello::Create {
        code: code.into(),
        seed: Some(seed.into()),
    }
}

#[tokio::test]
async fn peers_share_one_world_over_tcp() {
    let addr = start(local_config()).await;

    let (mut a, welcome) = NetClient::connect(addr, create("room1", "alpha"))
        .await
        .unwrap();
    assert_eq!(
        welcome,
        Welcome {
            code: "room1".into(),
            seed: "alpha".into(),
            created: true
        }
    );

    let (mut b, welcome) = NetClient::connect(addr, Hello::Join { code: "room1".into() })
        .await
        .unwrap();
    assert!(!welcome.created);
    let ServerMessage::Players { players } = next(&mut b).await else {
        panic!("expected a players listing");
    };
    assert!(players.contains(&(a.peer_id().to_string(), SPAWN)));

    assert_eq!(
        next(&mut a).await,
        ServerMessage::PlayerJoined {
            peer_id: b.peer_id().to_string()
        }
    );

    let edit = VoxelEdit {
        x: 5,
        y: 70,
        z: 5,
        id: STONE,
    };
    a.send_edit(edit).unwrap();
    assert_eq!(next(&mut b).await, ServerMessage::Edit(edit));

    let (coord, (lx, ly, lz)) = split_world(5, 70, 5);
    b.request_chunk(coord).unwrap();
    let ServerMessage::ChunkData { chunk } = next(&mut b).await else {
        panic!("expected chunk data");
    };
    let buf = ChunkBuf::try_from_bytes(coord, chunk.data).unwrap();
    assert_eq!(buf.get_local(lx, ly, lz), STONE);
}

#[tokio::test]
async fn handshake_errors_surface_as_rejections() {
    let addr = start(ServerConfig {
        max_sessions: 1,
        ..local_config()
    })
    .await;

    let (_a, _) = NetClient::connect(addr, create("only", "s")).await.unwrap();
    let err = NetClient::connect(addr, create("another", "s"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, NetError::Rejected(ErrorReason::SessionUnavailable)));

    let err = NetClient::connect(addr, Hello::Join { code: "missing".into() })
        .await
        .err()
        .unwrap();
    assert!(matches!(err, NetError::Rejected(ErrorReason::NotFound)));
}

#[tokio::test]
async fn unreadable_tls_files_fall_back_to_plain_tcp() {
    let config = ServerConfig {
        tls: Some(TlsFiles {
            key: "/nonexistent/key.pem".into(),
            cert: "/nonexistent/cert.pem".into(),
        }),
        ..local_config()
    };
    let server = Server::bind(&config, Storage::memory()).await.unwrap();
    assert!(!server.is_tls());
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let (_client, welcome) = NetClient::connect(addr, create("plain", "s")).await.unwrap();
    assert!(welcome.created);
}

#[tokio::test]
async fn tls_clients_reach_a_tls_server() {
    let config = ServerConfig {
        tls: Some(TlsFiles {
            key: fixture("key.pem"),
            cert: fixture("cert.pem"),
        }),
        ..local_config()
    };
    let server = Server::bind(&config, Storage::memory()).await.unwrap();
    assert!(server.is_tls());
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let tls = ClientTls::new(&fixture("ca.pem"), "localhost").unwrap();
    let (a, welcome) = NetClient::connect_tls(addr, &tls, create("secure", "s"))
        .await
        .unwrap();
    assert!(welcome.created);

    let (mut b, _) = NetClient::connect_tls(addr, &tls, Hello::Join { code: "secure".into() })
        .await
        .unwrap();
    let ServerMessage::Players { players } = next(&mut b).await else {
        panic!("expected a players listing");
    };
    assert!(players.iter().any(|(id, _)| id == a.peer_id()));
}

#[tokio::test]
async fn oversize_frames_are_skipped() {
    let addr = start(local_config()).await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();

    let mut junk = vec![b'x'; MAX_FRAME * 2];
    junk.push(b'\n');
    write_half.write_all(&junk).await.unwrap();
    write_half
        .write_all(b"{\"action\":\"create\",\"code\":\"big\",\"peerId\":\"p\"}\n")
        .await
        .unwrap();

    let mut lines = BufReader::new(read_half).lines();
    let line = timeout(Duration::from_secs(5), lines.next_line())
        .await
        .expect("timed out waiting for the server")
        .unwrap()
        .expect("server closed the connection");
    let reply: ServerMessage = serde_json::from_str(&line).unwrap();
    assert_eq!(
        reply,
        ServerMessage::Created {
            code: "big".into(),
            seed: "default".into()
        }
    );
}

#[tokio::test]
async fn shutdown_flushes_pending_saves() {
    let storage = Storage::memory();
    let server = Server::bind(&local_config(), storage.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));

    let (mut a, _) = NetClient::connect(addr, create("room", "persisted"))
        .await
        .unwrap();
    a.send_edit(VoxelEdit {
        x: 5,
        y: 70,
        z: 5,
        id: STONE,
    })
    .unwrap();
    // replies are ordered, so this one means the edit was applied
    let (coord, (lx, ly, lz)) = split_world(5, 70, 5);
    a.request_chunk(coord).unwrap();
    assert!(matches!(next(&mut a).await, ServerMessage::ChunkData { .. }));

    stop.send(()).unwrap();
    handle.await.unwrap().unwrap();

    let export = storage.world("persisted").export().unwrap();
    let record = export
        .chunks
        .iter()
        .find(|r| r.coord() == coord)
        .expect("edited chunk was written");
    let buf = ChunkBuf::try_from_bytes(coord, record.data.clone()).unwrap();
    assert_eq!(buf.get_local(lx, ly, lz), STONE);
}
