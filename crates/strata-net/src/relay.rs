//! Session membership and message routing. The relay is plain synchronous
//! state; the server feeds it connection events one at a time, which is
//! what serializes every mutation of a session's world.

use std::time::Instant;

use hashbrown::HashMap;
use strata_chunk::ChunkRecord;
use strata_store::Storage;
use tokio::sync::mpsc::UnboundedSender;

use crate::protocol::{ClientMessage, ErrorReason, Position, SPAWN, ServerMessage, decode_line};
use crate::session::{ConnId, SessionManager};

struct Conn {
    outbox: UnboundedSender<ServerMessage>,
    /// `(room code, peer id)` once the handshake succeeded.
    member: Option<(String, String)>,
}

fn send_to(conns: &HashMap<ConnId, Conn>, id: ConnId, msg: ServerMessage) {
    if let Some(conn) = conns.get(&id) {
        // a closed outbox means the connection is already going away
        let _ = conn.outbox.send(msg);
    }
}

fn broadcast<'a>(
    conns: &HashMap<ConnId, Conn>,
    peers: impl IntoIterator<Item = &'a ConnId>,
    msg: &ServerMessage,
    exclude: ConnId,
) {
    for &peer in peers {
        if peer != exclude {
            send_to(conns, peer, msg.clone());
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

pub struct Relay {
    sessions: SessionManager,
    conns: HashMap<ConnId, Conn>,
}

impl Relay {
    pub fn new(max_sessions: usize, storage: Storage) -> Self {
        Self {
            sessions: SessionManager::new(max_sessions, storage),
            conns: HashMap::new(),
        }
    }

    #[inline]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[inline]
    pub fn connection_count(&self) -> usize {
        self.conns.len()
    }

    /// Room code and peer id of `id`, if it has joined a session.
    pub fn membership(&self, id: ConnId) -> Option<(&str, &str)> {
        self.conns
            .get(&id)
            .and_then(|c| c.member.as_ref())
            .map(|(code, peer)| (code.as_str(), peer.as_str()))
    }

    pub fn connect(&mut self, id: ConnId, outbox: UnboundedSender<ServerMessage>) {
        self.conns.insert(
            id,
            Conn {
                outbox,
                member: None,
            },
        );
    }

    /// Handles one raw frame; malformed frames are dropped.
    pub fn handle_line(&mut self, id: ConnId, line: &str) {
        if let Some(msg) = decode_line::<ClientMessage>(line) {
            self.handle(id, msg);
        }
    }

    pub fn handle(&mut self, id: ConnId, msg: ClientMessage) {
        if !self.conns.contains_key(&id) {
            log::debug!("message from unknown connection {id}");
            return;
        }
        match msg {
            ClientMessage::Create {
                code,
                seed,
                peer_id,
            } => self.on_create(id, code, seed, peer_id),
            ClientMessage::Join { code, peer_id } => self.on_join(id, code, peer_id),
            other => self.on_action(id, other),
        }
    }

    /// Removes `id` from its session (if any) and forgets the connection.
    pub fn disconnect(&mut self, id: ConnId) {
        self.leave(id);
        self.conns.remove(&id);
    }

    pub fn tick(&mut self, now: Instant) {
        self.sessions.tick(now);
    }

    /// Writes out every session's pending saves.
    pub fn shutdown(&mut self) {
        self.sessions.flush_all();
    }

    fn leave(&mut self, id: ConnId) {
        let Some(conn) = self.conns.get_mut(&id) else {
            return;
        };
        let Some((code, peer_id)) = conn.member.take() else {
            return;
        };
        if let Some(session) = self.sessions.get_session_mut(&code) {
            session.players.remove(&peer_id);
            session.peers.remove(&id);
        }
        log::info!("peer '{peer_id}' left session '{code}'");
        self.sessions.remove_empty_session(&code);
    }

    fn on_create(
        &mut self,
        id: ConnId,
        code: Option<String>,
        seed: Option<String>,
        peer_id: Option<String>,
    ) {
        let (Some(code), Some(peer_id)) = (non_empty(code), non_empty(peer_id)) else {
            log::debug!("connection {id}: create without code or peer id");
            return;
        };
        self.leave(id);
        let seed = non_empty(seed).unwrap_or_else(|| "default".to_string());
        let Some(session) = self.sessions.create_session(&code, &seed) else {
            log::info!("connection {id}: session '{code}' unavailable");
            send_to(
                &self.conns,
                id,
                ServerMessage::Error {
                    reason: ErrorReason::SessionUnavailable,
                },
            );
            return;
        };
        session.players.insert(peer_id.clone(), SPAWN);
        session.peers.insert(id);
        let reply = ServerMessage::Created {
            code: code.clone(),
            seed: session.seed.clone(),
        };
        log::info!("peer '{peer_id}' created session '{code}'");
        if let Some(conn) = self.conns.get_mut(&id) {
            conn.member = Some((code, peer_id));
        }
        send_to(&self.conns, id, reply);
    }

    fn on_join(&mut self, id: ConnId, code: Option<String>, peer_id: Option<String>) {
        let not_found = ServerMessage::Error {
            reason: ErrorReason::NotFound,
        };
        let (Some(code), Some(peer_id)) = (code, non_empty(peer_id)) else {
            send_to(&self.conns, id, not_found);
            return;
        };
        self.leave(id);
        let Some(session) = self.sessions.get_session_mut(&code) else {
            send_to(&self.conns, id, not_found);
            return;
        };
        session.players.insert(peer_id.clone(), SPAWN);
        session.peers.insert(id);
        log::info!("peer '{peer_id}' joined session '{code}'");

        send_to(
            &self.conns,
            id,
            ServerMessage::Joined {
                code: code.clone(),
                seed: session.seed.clone(),
            },
        );
        send_to(
            &self.conns,
            id,
            ServerMessage::Players {
                players: session.players_list(),
            },
        );
        broadcast(
            &self.conns,
            &session.peers,
            &ServerMessage::PlayerJoined {
                peer_id: peer_id.clone(),
            },
            id,
        );
        if let Some(conn) = self.conns.get_mut(&id) {
            conn.member = Some((code, peer_id));
        }
    }

    fn on_action(&mut self, id: ConnId, msg: ClientMessage) {
        let Some((code, peer_id)) = self.conns.get(&id).and_then(|c| c.member.clone()) else {
            log::debug!("connection {id}: ignoring action before handshake");
            return;
        };
        let Some(session) = self.sessions.get_session_mut(&code) else {
            return;
        };
        match msg {
            ClientMessage::ChunkRequest { payload } => {
                let Some(buf) = session.world.ensure_chunk(payload) else {
                    log::debug!("connection {id}: chunk {payload} is out of range");
                    return;
                };
                let chunk = ChunkRecord::from(buf);
                send_to(&self.conns, id, ServerMessage::ChunkData { chunk });
            }
            ClientMessage::Edit { payload } => {
                if session
                    .world
                    .set_voxel(payload.x, payload.y, payload.z, payload.id)
                {
                    broadcast(&self.conns, &session.peers, &ServerMessage::Edit(payload), id);
                }
            }
            ClientMessage::State { payload } => {
                let Position { x, y, z } = payload;
                session.players.insert(peer_id.clone(), payload);
                broadcast(
                    &self.conns,
                    &session.peers,
                    &ServerMessage::State { peer_id, x, y, z },
                    id,
                );
            }
            ClientMessage::Create { .. } | ClientMessage::Join { .. } => {}
        }
    }
}
