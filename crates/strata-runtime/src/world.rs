use std::collections::VecDeque;
use std::time::Instant;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use strata_blocks::{AIR, BEDROCK, MaterialId, MaterialTable};
use strata_chunk::{CHUNK_SIZE, ChunkBuf, ChunkCoord, split_world};
use strata_geom::Vec3;
use strata_mesh_cpu::{ChunkMesh, build_chunk_mesh};
use strata_store::{ChunkStore, Settings, SlotInfo, Storage, StoreError, WorldExport};
use strata_world::{MIN_HEIGHT, TerrainGen, in_vertical_bounds};

use crate::WorldOptions;

/// Chunks remeshed by a reload before returning.
const RELOAD_REMESH_BATCH: usize = 16;

/// A single voxel write, as forwarded to and received from peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelEdit {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub id: MaterialId,
}

/// Called after every successful local edit.
pub type EditHook = Box<dyn FnMut(VoxelEdit) + Send>;

struct Chunk {
    buf: ChunkBuf,
    surface: Option<ChunkMesh>,
    dirty: bool,
    queued: bool,
    /// Identifies the outstanding storage load; results with another ticket are stale.
    load_ticket: u64,
    /// Writes made while the storage load is in flight, replayed over the
    /// loaded data. `None` once the load has resolved.
    unresolved: Option<Vec<(usize, usize, usize, MaterialId)>>,
}

impl Chunk {
    fn new(buf: ChunkBuf, load_ticket: u64) -> Self {
        Self {
            buf,
            surface: None,
            dirty: true,
            queued: false,
            load_ticket,
            unresolved: None,
        }
    }
}

fn enqueue(queue: &mut VecDeque<ChunkCoord>, enabled: bool, coord: ChunkCoord, chunk: &mut Chunk) {
    if !enabled || chunk.queued {
        return;
    }
    chunk.queued = true;
    queue.push_back(coord);
}

/// Sparse, lazily generated voxel world backed by a [`ChunkStore`].
pub struct World {
    seed: String,
    terrain: TerrainGen,
    opts: WorldOptions,
    store: ChunkStore,
    chunks: HashMap<ChunkCoord, Chunk>,
    remesh: VecDeque<ChunkCoord>,
    next_ticket: u64,
    on_edit: Option<EditHook>,
}

impl World {
    /// World generated from `seed`; the seed string is also the storage world id.
    pub fn new(seed: &str, storage: &Storage, opts: WorldOptions) -> Self {
        let seed = if seed.trim().is_empty() { "default" } else { seed };
        log::info!("world '{seed}' created");
        Self {
            seed: seed.to_string(),
            terrain: TerrainGen::from_seed_str(seed),
            opts,
            store: storage.world(seed),
            chunks: HashMap::new(),
            remesh: VecDeque::new(),
            next_ticket: 1,
            on_edit: None,
        }
    }

    #[inline]
    pub fn seed(&self) -> &str {
        &self.seed
    }

    #[inline]
    pub fn terrain(&self) -> &TerrainGen {
        &self.terrain
    }

    pub fn set_edit_hook(&mut self, hook: EditHook) {
        self.on_edit = Some(hook);
    }

    pub fn clear_edit_hook(&mut self) {
        self.on_edit = None;
    }

    // --- residency ---

    fn take_ticket(&mut self) -> u64 {
        let t = self.next_ticket;
        self.next_ticket += 1;
        t
    }

    fn create_chunk(&mut self, coord: ChunkCoord) {
        let mut buf = self.terrain.generate(coord);
        let ticket = self.take_ticket();
        let mut unresolved = None;
        if self.opts.blocking_loads {
            match self.store.load_blocking(coord) {
                Ok(Some(data)) => match ChunkBuf::try_from_bytes(coord, data) {
                    Some(stored) => buf = stored,
                    None => log::warn!("stored chunk {coord} has the wrong size; regenerating"),
                },
                Ok(None) => self.store.queue_save(coord, buf.as_bytes(), Instant::now()),
                Err(e) => log::warn!("chunk {coord} load failed: {e}"),
            }
        } else {
            self.store.request_load(coord, ticket);
            unresolved = Some(Vec::new());
        }
        let mut chunk = Chunk::new(buf, ticket);
        chunk.unresolved = unresolved;
        enqueue(&mut self.remesh, self.opts.remesh, coord, &mut chunk);
        self.chunks.insert(coord, chunk);
    }

    /// Returns the resident chunk at `coord`, generating it (and starting its
    /// storage load) if needed. `None` for chunks that are not addressable.
    pub fn ensure_chunk(&mut self, coord: ChunkCoord) -> Option<&ChunkBuf> {
        if !coord.is_addressable() {
            return None;
        }
        if !self.chunks.contains_key(&coord) {
            self.create_chunk(coord);
        }
        self.chunks.get(&coord).map(|c| &c.buf)
    }

    #[inline]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&ChunkBuf> {
        self.chunks.get(&coord).map(|c| &c.buf)
    }

    #[inline]
    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    #[inline]
    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn loaded_coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    #[inline]
    pub fn surface(&self, coord: ChunkCoord) -> Option<&ChunkMesh> {
        self.chunks.get(&coord).and_then(|c| c.surface.as_ref())
    }

    #[inline]
    pub fn is_dirty(&self, coord: ChunkCoord) -> bool {
        self.chunks.get(&coord).is_some_and(|c| c.dirty)
    }

    #[inline]
    pub fn remesh_pending(&self) -> usize {
        self.remesh.len()
    }

    /// Installs `buf` as the chunk's content, creating the chunk if absent.
    /// Any storage load still in flight for it is invalidated.
    pub fn replace_chunk(&mut self, buf: ChunkBuf) {
        let coord = buf.coord;
        let ticket = self.take_ticket();
        self.store.queue_save(coord, buf.as_bytes(), Instant::now());
        let chunk = self
            .chunks
            .entry(coord)
            .or_insert_with(|| Chunk::new(ChunkBuf::empty(coord), ticket));
        chunk.buf = buf;
        chunk.dirty = true;
        chunk.load_ticket = ticket;
        chunk.unresolved = None;
        enqueue(&mut self.remesh, self.opts.remesh, coord, chunk);
    }

    // --- voxel access ---

    /// Non-creating read. Above the ceiling and below the floor is air; the
    /// floor itself is always bedrock; non-resident chunks read as air.
    pub fn voxel(&self, wx: i32, wy: i32, wz: i32) -> MaterialId {
        if wy == MIN_HEIGHT {
            return BEDROCK;
        }
        if !in_vertical_bounds(wy) {
            return AIR;
        }
        let (coord, (lx, ly, lz)) = split_world(wx, wy, wz);
        self.chunks
            .get(&coord)
            .map_or(AIR, |c| c.buf.get_local(lx, ly, lz))
    }

    pub fn get_voxel(&mut self, wx: i32, wy: i32, wz: i32, create: bool) -> MaterialId {
        if create && in_vertical_bounds(wy) {
            self.ensure_chunk(ChunkCoord::containing(wx, wy, wz));
        }
        self.voxel(wx, wy, wz)
    }

    #[inline]
    pub fn is_solid(&self, wx: i32, wy: i32, wz: i32) -> bool {
        self.voxel(wx, wy, wz) != AIR
    }

    /// Local edit: applies the write and notifies the edit hook.
    pub fn set_voxel(&mut self, wx: i32, wy: i32, wz: i32, id: MaterialId) -> bool {
        if !self.write_voxel(wx, wy, wz, id) {
            return false;
        }
        if let Some(hook) = self.on_edit.as_mut() {
            hook(VoxelEdit {
                x: wx,
                y: wy,
                z: wz,
                id,
            });
        }
        true
    }

    /// Edit received from a peer: same write path, no hook, so it is never echoed.
    pub fn apply_remote_edit(&mut self, edit: VoxelEdit) -> bool {
        self.write_voxel(edit.x, edit.y, edit.z, edit.id)
    }

    fn write_voxel(&mut self, wx: i32, wy: i32, wz: i32, id: MaterialId) -> bool {
        if !in_vertical_bounds(wy) {
            return false;
        }
        // the floor plane stays bedrock
        if wy == MIN_HEIGHT && id != BEDROCK {
            return false;
        }
        let (coord, (lx, ly, lz)) = split_world(wx, wy, wz);
        if self.ensure_chunk(coord).is_none() {
            return false;
        }
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return false;
        };
        chunk.buf.set_local(lx, ly, lz, id);
        if let Some(pending) = chunk.unresolved.as_mut() {
            pending.push((lx, ly, lz, id));
        }
        chunk.dirty = true;
        enqueue(&mut self.remesh, self.opts.remesh, coord, chunk);
        self.store
            .queue_save(coord, chunk.buf.as_bytes(), Instant::now());

        let last = CHUNK_SIZE - 1;
        let borders = [
            (lx == 0, (-1, 0, 0)),
            (lx == last, (1, 0, 0)),
            (ly == 0, (0, -1, 0)),
            (ly == last, (0, 1, 0)),
            (lz == 0, (0, 0, -1)),
            (lz == last, (0, 0, 1)),
        ];
        for (touches, (dx, dy, dz)) in borders {
            if !touches {
                continue;
            }
            let n = coord.offset(dx, dy, dz);
            if let Some(neighbor) = self.chunks.get_mut(&n) {
                enqueue(&mut self.remesh, self.opts.remesh, n, neighbor);
            }
        }
        true
    }

    // --- per-tick passes ---

    /// Creates missing chunks around `center` (nearest first, at most
    /// `visibility_batch` per call) and drops chunks beyond the unload
    /// distance. Returns how many chunks were created.
    pub fn update_visible(&mut self, center: Vec3) -> usize {
        let (vx, vy, vz) = center.voxel();
        let cc = ChunkCoord::containing(vx, vy, vz);
        let (r, ry) = (self.opts.view_radius, self.opts.view_radius_y);

        let mut missing = Vec::new();
        for dy in -ry..=ry {
            for dz in -r..=r {
                for dx in -r..=r {
                    let c = cc.offset(dx, dy, dz);
                    if c.is_addressable() && !self.chunks.contains_key(&c) {
                        missing.push(c);
                    }
                }
            }
        }
        missing.sort_by_key(|c| c.distance_sq(cc));
        if let Some(batch) = self.opts.visibility_batch {
            missing.truncate(batch);
        }
        let created = missing.len();
        for c in missing {
            self.create_chunk(c);
        }

        let keep = self.opts.unload_distance();
        let before = self.chunks.len();
        self.chunks.retain(|c, _| c.chebyshev(cc) <= keep);
        let dropped = before - self.chunks.len();
        if dropped > 0 {
            self.remesh.retain(|c| self.chunks.contains_key(c));
            log::debug!("unloaded {dropped} chunks around {cc}");
        }
        created
    }

    /// Rebuilds surfaces for up to `max` queued chunks in FIFO order.
    pub fn process_remesh_queue(&mut self, max: usize) -> usize {
        let materials = MaterialTable::builtin();
        let mut done = 0;
        while done < max {
            let Some(coord) = self.remesh.pop_front() else {
                break;
            };
            let Some(chunk) = self.chunks.get(&coord) else {
                continue;
            };
            let neighbors = |x: i32, y: i32, z: i32| self.voxel(x, y, z);
            let surface = build_chunk_mesh(&chunk.buf, &neighbors, materials);
            if let Some(chunk) = self.chunks.get_mut(&coord) {
                chunk.surface = surface;
                chunk.dirty = false;
                chunk.queued = false;
            }
            done += 1;
        }
        done
    }

    /// Applies finished storage loads and flushes staged saves whose
    /// debounce window has elapsed. Returns how many chunks took stored data.
    pub fn pump(&mut self, now: Instant) -> usize {
        let mut applied = 0;
        for done in self.store.drain_loads() {
            let coord = done.coord;
            let Some(chunk) = self.chunks.get_mut(&coord) else {
                continue;
            };
            if chunk.load_ticket != done.ticket {
                continue;
            }
            let replay = chunk.unresolved.take().unwrap_or_default();
            match done.data {
                Ok(Some(data)) => match ChunkBuf::try_from_bytes(coord, data) {
                    Some(mut stored) => {
                        for &(lx, ly, lz, id) in &replay {
                            stored.set_local(lx, ly, lz, id);
                        }
                        chunk.buf = stored;
                        chunk.dirty = true;
                        enqueue(&mut self.remesh, self.opts.remesh, coord, chunk);
                        if !replay.is_empty() {
                            self.store.queue_save(coord, chunk.buf.as_bytes(), now);
                        }
                        applied += 1;
                    }
                    None => log::warn!("stored chunk {coord} has the wrong size; keeping generated"),
                },
                Ok(None) => self.store.queue_save(coord, chunk.buf.as_bytes(), now),
                Err(e) => log::warn!("chunk {coord} load failed: {e}"),
            }
        }
        self.store.poll(now);
        applied
    }

    // --- persistence ---

    /// Writes every staged save and waits for the store to finish.
    pub fn flush_persistence(&mut self) -> Result<(), StoreError> {
        self.store.flush()
    }

    /// Flushes, drops every resident chunk, then rebuilds around `center`.
    pub fn reload_from_storage(&mut self, center: Vec3) -> Result<(), StoreError> {
        self.flush_persistence()?;
        self.chunks.clear();
        self.remesh.clear();
        self.update_visible(center);
        self.process_remesh_queue(RELOAD_REMESH_BATCH);
        Ok(())
    }

    pub fn export(&mut self) -> Result<WorldExport, StoreError> {
        self.flush_persistence()?;
        self.store.export()
    }

    /// Imports `export` into this world's storage and reloads around `center`.
    pub fn import(&mut self, export: &WorldExport, center: Vec3) -> Result<usize, StoreError> {
        self.flush_persistence()?;
        let n = self.store.import(export)?;
        self.reload_from_storage(center)?;
        Ok(n)
    }

    pub fn list_slots(&self) -> Result<Vec<SlotInfo>, StoreError> {
        self.store.list_slots()
    }

    pub fn save_slot(&mut self, slot: u8) -> Result<SlotInfo, StoreError> {
        let payload = self.export()?;
        self.store.save_slot(slot, payload)
    }

    /// Returns false when the slot is empty.
    pub fn load_slot(&mut self, slot: u8, center: Vec3) -> Result<bool, StoreError> {
        match self.store.load_slot(slot)? {
            Some(payload) => {
                self.import(&payload, center)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn delete_slot(&self, slot: u8) -> Result<(), StoreError> {
        self.store.delete_slot(slot)
    }

    /// Deletes this world's stored chunks and slots and drops resident chunks.
    pub fn clear_world(&mut self) -> Result<(), StoreError> {
        self.store.clear_world()?;
        self.chunks.clear();
        self.remesh.clear();
        log::info!("world '{}' cleared", self.seed);
        Ok(())
    }

    pub fn load_settings(&self) -> Result<Settings, StoreError> {
        self.store.storage().load_settings()
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.store.storage().save_settings(settings)
    }
}
