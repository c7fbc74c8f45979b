use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use strata_runtime::{World, WorldOptions};
use strata_store::Storage;

use crate::protocol::Position;

/// Relay-assigned connection id.
pub type ConnId = u64;

/// Default bound on concurrently active sessions.
pub const MAX_SESSIONS: usize = 3;

/// One room: an authoritative world shared by every connected peer.
pub struct Session {
    pub code: String,
    pub seed: String,
    pub world: World,
    /// Peer id → last reported position.
    pub players: BTreeMap<String, Position>,
    /// Connections currently in this room.
    pub peers: BTreeSet<ConnId>,
}

impl Session {
    fn new(code: &str, seed: &str, storage: &Storage) -> Self {
        let world = World::new(seed, storage, WorldOptions::headless());
        Self {
            code: code.to_string(),
            seed: world.seed().to_string(),
            world,
            players: BTreeMap::new(),
            peers: BTreeSet::new(),
        }
    }

    pub fn players_list(&self) -> Vec<(String, Position)> {
        self.players
            .iter()
            .map(|(id, pos)| (id.clone(), *pos))
            .collect()
    }
}

/// Bounded set of sessions keyed by room code.
pub struct SessionManager {
    max: usize,
    storage: Storage,
    sessions: BTreeMap<String, Session>,
}

impl SessionManager {
    pub fn new(max: usize, storage: Storage) -> Self {
        Self {
            max,
            storage,
            sessions: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn max_sessions(&self) -> usize {
        self.max
    }

    /// Allocates a session, or `None` when the bound is reached or `code` is taken.
    pub fn create_session(&mut self, code: &str, seed: &str) -> Option<&mut Session> {
        if self.sessions.len() >= self.max || self.sessions.contains_key(code) {
            return None;
        }
        let session = Session::new(code, seed, &self.storage);
        log::info!(
            "session '{code}' created with seed '{}' ({}/{})",
            session.seed,
            self.sessions.len() + 1,
            self.max
        );
        Some(self.sessions.entry(code.to_string()).or_insert(session))
    }

    #[inline]
    pub fn get_session(&self, code: &str) -> Option<&Session> {
        self.sessions.get(code)
    }

    #[inline]
    pub fn get_session_mut(&mut self, code: &str) -> Option<&mut Session> {
        self.sessions.get_mut(code)
    }

    /// Drops the session if nobody is left in it. Returns whether it was removed.
    pub fn remove_empty_session(&mut self, code: &str) -> bool {
        let empty = self
            .sessions
            .get(code)
            .is_some_and(|s| s.players.is_empty());
        if empty {
            if let Some(mut session) = self.sessions.remove(code) {
                if let Err(e) = session.world.flush_persistence() {
                    log::warn!("session '{code}' flush failed: {e}");
                }
            }
            log::info!("session '{code}' removed");
        }
        empty
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub fn flush_all(&mut self) {
        for session in self.sessions.values_mut() {
            if let Err(e) = session.world.flush_persistence() {
                log::warn!("session '{}' flush failed: {e}", session.code);
            }
        }
    }

    /// Applies storage completions and due saves in every session world.
    pub fn tick(&mut self, now: Instant) {
        for session in self.sessions.values_mut() {
            session.world.pump(now);
        }
    }
}
