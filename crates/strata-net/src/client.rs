//! Client side: a line-framed connection to the relay, and [`RemoteSync`],
//! which keeps a local [`World`] in step with the authoritative one.

use std::collections::{BTreeMap, VecDeque};

use hashbrown::HashSet;
use strata_chunk::{ChunkBuf, ChunkCoord};
use strata_runtime::{VoxelEdit, World};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, ReadHalf,
};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use crate::protocol::{ClientMessage, Position, SPAWN, ServerMessage, decode_line, encode_line};
use crate::tls::ClientTls;
use crate::NetError;

trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

type Conn = Box<dyn Transport>;

const PEER_ID_LEN: usize = 8;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random lowercase base-36 peer id.
pub fn random_peer_id() -> String {
    (0..PEER_ID_LEN)
        .map(|_| BASE36[fastrand::usize(..BASE36.len())] as char)
        .collect()
}

/// Opening request of a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Hello {
    Create { code: String, seed: Option<String> },
    Join { code: String },
}

/// Accepted handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Welcome {
    pub code: String,
    pub seed: String,
    /// True for `created`, false for `joined`.
    pub created: bool,
}

/// One connection to the relay, over plain TCP or TLS.
pub struct NetClient {
    peer_id: String,
    outbox: UnboundedSender<ClientMessage>,
    lines: Lines<BufReader<ReadHalf<Conn>>>,
    /// Messages that arrived while waiting for the welcome.
    backlog: VecDeque<ServerMessage>,
    writer: JoinHandle<()>,
}

impl NetClient {
    /// Connects and performs the handshake with a fresh peer id.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        hello: Hello,
    ) -> Result<(Self, Welcome), NetError> {
        Self::connect_as(addr, hello, random_peer_id()).await
    }

    pub async fn connect_as(
        addr: impl ToSocketAddrs,
        hello: Hello,
        peer_id: String,
    ) -> Result<(Self, Welcome), NetError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Self::handshake(Box::new(stream), hello, peer_id).await
    }

    /// Like [`NetClient::connect`], over TLS.
    pub async fn connect_tls(
        addr: impl ToSocketAddrs,
        tls: &ClientTls,
        hello: Hello,
    ) -> Result<(Self, Welcome), NetError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let stream = tls
            .connector
            .connect(tls.server_name.clone(), stream)
            .await?;
        Self::handshake(Box::new(stream), hello, random_peer_id()).await
    }

    async fn handshake(
        stream: Conn,
        hello: Hello,
        peer_id: String,
    ) -> Result<(Self, Welcome), NetError> {
        let (read_half, mut write_half) = tokio::io::split(stream);

        let (outbox, mut outgoing) = mpsc::unbounded_channel::<ClientMessage>();
        let writer = tokio::spawn(async move {
            while let Some(msg) = outgoing.recv().await {
                let line = match encode_line(&msg) {
                    Ok(line) => line,
                    Err(e) => {
                        log::error!("encode failed: {e}");
                        continue;
                    }
                };
                if let Err(e) = write_half.write_all(line.as_bytes()).await {
                    log::debug!("write failed: {e}");
                    break;
                }
                if let Err(e) = write_half.flush().await {
                    log::debug!("flush failed: {e}");
                    break;
                }
            }
        });

        let mut client = Self {
            peer_id,
            outbox,
            lines: BufReader::new(read_half).lines(),
            backlog: VecDeque::new(),
            writer,
        };
        let request = match hello {
            Hello::Create { code, seed } => ClientMessage::Create {
                code: Some(code),
                seed,
                peer_id: Some(client.peer_id.clone()),
            },
            Hello::Join { code } => ClientMessage::Join {
                code: Some(code),
                peer_id: Some(client.peer_id.clone()),
            },
        };
        client.send(request)?;

        loop {
            let Some(msg) = client.read_message().await? else {
                return Err(NetError::Closed);
            };
            match msg {
                ServerMessage::Created { code, seed } => {
                    return Ok((client, Welcome { code, seed, created: true }));
                }
                ServerMessage::Joined { code, seed } => {
                    return Ok((client, Welcome { code, seed, created: false }));
                }
                ServerMessage::Error { reason } => return Err(NetError::Rejected(reason)),
                other => client.backlog.push_back(other),
            }
        }
    }

    #[inline]
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Sender that queues messages on this connection; usable from sync code.
    pub fn outbox(&self) -> UnboundedSender<ClientMessage> {
        self.outbox.clone()
    }

    pub fn send(&self, msg: ClientMessage) -> Result<(), NetError> {
        self.outbox.send(msg).map_err(|_| NetError::Closed)
    }

    pub fn request_chunk(&self, coord: ChunkCoord) -> Result<(), NetError> {
        self.send(ClientMessage::ChunkRequest { payload: coord })
    }

    pub fn send_edit(&self, edit: VoxelEdit) -> Result<(), NetError> {
        self.send(ClientMessage::Edit { payload: edit })
    }

    pub fn send_state(&self, pos: Position) -> Result<(), NetError> {
        self.send(ClientMessage::State { payload: pos })
    }

    /// Next server message, or `None` once the server closed the connection.
    pub async fn next_message(&mut self) -> Result<Option<ServerMessage>, NetError> {
        if let Some(msg) = self.backlog.pop_front() {
            return Ok(Some(msg));
        }
        self.read_message().await
    }

    async fn read_message(&mut self) -> Result<Option<ServerMessage>, NetError> {
        while let Some(line) = self.lines.next_line().await? {
            if let Some(msg) = decode_line(&line) {
                return Ok(Some(msg));
            }
        }
        Ok(None)
    }
}

impl Drop for NetClient {
    fn drop(&mut self) {
        self.writer.abort();
    }
}

/// Client-side view of a session: forwards local edits, requests chunks
/// once per residency, and applies what the server sends back.
pub struct RemoteSync {
    peer_id: String,
    outbox: UnboundedSender<ClientMessage>,
    pending: HashSet<ChunkCoord>,
    synced: HashSet<ChunkCoord>,
    remote_players: BTreeMap<String, Position>,
}

impl RemoteSync {
    pub fn new(client: &NetClient) -> Self {
        Self::with_outbox(client.peer_id().to_string(), client.outbox())
    }

    pub fn with_outbox(peer_id: String, outbox: UnboundedSender<ClientMessage>) -> Self {
        Self {
            peer_id,
            outbox,
            pending: HashSet::new(),
            synced: HashSet::new(),
            remote_players: BTreeMap::new(),
        }
    }

    /// Routes every local edit of `world` to the server.
    pub fn attach(&mut self, world: &mut World) {
        let outbox = self.outbox.clone();
        world.set_edit_hook(Box::new(move |edit| {
            let _ = outbox.send(ClientMessage::Edit { payload: edit });
        }));
        self.pending.clear();
        self.synced.clear();
    }

    pub fn detach(&mut self, world: &mut World) {
        world.clear_edit_hook();
        self.pending.clear();
        self.synced.clear();
        self.remote_players.clear();
    }

    /// Asks for `coord` unless a request is already outstanding.
    pub fn request_chunk(&mut self, coord: ChunkCoord) -> bool {
        if !self.pending.insert(coord) {
            return false;
        }
        if self
            .outbox
            .send(ClientMessage::ChunkRequest { payload: coord })
            .is_err()
        {
            self.pending.remove(&coord);
            return false;
        }
        true
    }

    /// Requests every resident chunk not yet received from the server, and
    /// forgets chunks the world has dropped. Returns how many were requested.
    pub fn sync_resident(&mut self, world: &World) -> usize {
        self.synced.retain(|c| world.is_loaded(*c));
        self.pending.retain(|c| world.is_loaded(*c));
        let wanted: Vec<ChunkCoord> = world
            .loaded_coords()
            .filter(|c| !self.synced.contains(c))
            .collect();
        wanted.into_iter().filter(|&c| self.request_chunk(c)).count()
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Other players' last known positions.
    pub fn remote_players(&self) -> &BTreeMap<String, Position> {
        &self.remote_players
    }

    pub fn send_state(&self, pos: Position) -> Result<(), NetError> {
        self.outbox
            .send(ClientMessage::State { payload: pos })
            .map_err(|_| NetError::Closed)
    }

    pub fn apply(&mut self, world: &mut World, msg: ServerMessage) {
        match msg {
            ServerMessage::ChunkData { chunk } => {
                let coord = chunk.coord();
                self.pending.remove(&coord);
                match ChunkBuf::try_from_bytes(coord, chunk.data) {
                    Some(buf) => {
                        world.replace_chunk(buf);
                        self.synced.insert(coord);
                    }
                    None => log::warn!("chunk {coord} from server has the wrong size"),
                }
            }
            ServerMessage::Edit(edit) => {
                world.apply_remote_edit(edit);
            }
            ServerMessage::State { peer_id, x, y, z } => {
                if peer_id != self.peer_id {
                    self.remote_players.insert(peer_id, Position { x, y, z });
                }
            }
            ServerMessage::Players { players } => {
                self.remote_players = players
                    .into_iter()
                    .filter(|(id, _)| *id != self.peer_id)
                    .collect();
            }
            ServerMessage::PlayerJoined { peer_id } => {
                if peer_id != self.peer_id {
                    self.remote_players.entry(peer_id).or_insert(SPAWN);
                }
            }
            ServerMessage::Error { reason } => log::warn!("server error: {reason:?}"),
            ServerMessage::Created { .. } | ServerMessage::Joined { .. } => {}
        }
    }
}
