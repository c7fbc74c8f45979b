use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use strata_chunk::ChunkCoord;

use crate::{Settings, SlotInfo, SlotRecord, StoreBackend, StoreError};

/// Filesystem backend.
///
/// Layout under `root`:
/// `worlds/<world id, url-safe base64>/chunks/c_<cx>_<cy>_<cz>.bin`,
/// `worlds/<..>/slots/slot_<n>.json` and `settings.json`.
pub struct DiskBackend {
    root: PathBuf,
}

impl DiskBackend {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join("worlds"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn world_dir(&self, world: &str) -> PathBuf {
        self.root
            .join("worlds")
            .join(URL_SAFE_NO_PAD.encode(world.as_bytes()))
    }

    fn chunk_path(&self, world: &str, coord: ChunkCoord) -> PathBuf {
        self.world_dir(world)
            .join("chunks")
            .join(format!("c_{}_{}_{}.bin", coord.cx, coord.cy, coord.cz))
    }

    fn slot_path(&self, world: &str, slot: u8) -> PathBuf {
        self.world_dir(world)
            .join("slots")
            .join(format!("slot_{slot}.json"))
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn remove_optional(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

fn parse_chunk_name(name: &str) -> Option<ChunkCoord> {
    let stem = name.strip_prefix("c_")?.strip_suffix(".bin")?;
    let mut parts = stem.split('_').map(str::parse::<i32>);
    let cx = parts.next()?.ok()?;
    let cy = parts.next()?.ok()?;
    let cz = parts.next()?.ok()?;
    parts.next().is_none().then_some(ChunkCoord::new(cx, cy, cz))
}

fn parse_slot_name(name: &str) -> Option<u8> {
    name.strip_prefix("slot_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

fn dir_entries(dir: &Path) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let rd = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut out = Vec::new();
    for entry in rd {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            out.push((name.to_string(), entry.path()));
        }
    }
    Ok(out)
}

impl StoreBackend for DiskBackend {
    fn get_chunk(&self, world: &str, coord: ChunkCoord) -> Result<Option<Vec<u8>>, StoreError> {
        read_optional(&self.chunk_path(world, coord))
    }

    fn put_chunk(
        &mut self,
        world: &str,
        coord: ChunkCoord,
        data: &[u8],
    ) -> Result<(), StoreError> {
        write_file(&self.chunk_path(world, coord), data)
    }

    fn list_chunks(&self, world: &str) -> Result<Vec<(ChunkCoord, Vec<u8>)>, StoreError> {
        let mut out = Vec::new();
        for (name, path) in dir_entries(&self.world_dir(world).join("chunks"))? {
            let Some(coord) = parse_chunk_name(&name) else {
                log::debug!("skipping stray file {}", path.display());
                continue;
            };
            out.push((coord, fs::read(&path)?));
        }
        out.sort_by_key(|(c, _)| *c);
        Ok(out)
    }

    fn get_slot(&self, world: &str, slot: u8) -> Result<Option<SlotRecord>, StoreError> {
        match read_optional(&self.slot_path(world, slot))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_slot(&mut self, world: &str, slot: u8, record: &SlotRecord) -> Result<(), StoreError> {
        write_file(&self.slot_path(world, slot), &serde_json::to_vec(record)?)
    }

    fn delete_slot(&mut self, world: &str, slot: u8) -> Result<(), StoreError> {
        remove_optional(&self.slot_path(world, slot))
    }

    fn list_slots(&self, world: &str) -> Result<Vec<SlotInfo>, StoreError> {
        let mut out = Vec::new();
        for (name, _) in dir_entries(&self.world_dir(world).join("slots"))? {
            let Some(slot) = parse_slot_name(&name) else {
                continue;
            };
            let saved_at = self.get_slot(world, slot)?.map(|r| r.saved_at);
            out.push(SlotInfo { slot, saved_at });
        }
        out.sort_by_key(|s| s.slot);
        Ok(out)
    }

    fn clear_world(&mut self, world: &str) -> Result<(), StoreError> {
        match fs::remove_dir_all(self.world_dir(world)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn get_settings(&self) -> Result<Option<Settings>, StoreError> {
        match read_optional(&self.settings_path())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_settings(&mut self, settings: &Settings) -> Result<(), StoreError> {
        write_file(&self.settings_path(), &serde_json::to_vec(settings)?)
    }
}
