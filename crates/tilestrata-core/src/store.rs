//! Tile persistence.
//!
//! Tiles are addressed by path. [`FsTileStore`] keeps them as GeoTIFF files
//! on disk; [`MemoryTileStore`] keeps them in a map and backs tests and dry
//! runs. Next to the tiles every folder may carry a [`TileIndex`] sidecar,
//! which is the authoritative record of each tile's scores and stratum.
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::census::StrataCensus;
use crate::error::{Result, StrataError};
use crate::geotiff;
use crate::raster::Raster;
use crate::strata::LabeledTile;
use crate::tiling::TileId;

/// File name of the per-folder label sidecar.
pub const INDEX_FILE_NAME: &str = "strata_index.json";

pub trait TileStore {
    /// Persist `raster` as `dir/<id>.tif` and return its location.
    fn write(&mut self, dir: &Path, id: &TileId, raster: &Raster) -> Result<PathBuf>;

    /// Copy the tile at `location` into `dest_dir`, keeping its file name.
    /// Any failure is reported as [`StrataError::CopyFailure`].
    fn copy(&mut self, location: &Path, dest_dir: &Path) -> Result<PathBuf>;

    /// Rename the tile at `location` within its folder.
    fn rename(&mut self, location: &Path, new_name: &str) -> Result<PathBuf>;

    /// Remove `dir` and everything in it.
    fn purge(&mut self, dir: &Path) -> Result<()>;

    /// Sorted `.tif` file names directly inside `dir`.
    fn list(&self, dir: &Path) -> Result<Vec<String>>;

    fn write_index(&mut self, dir: &Path, index: &TileIndex) -> Result<()>;

    /// The sidecar index of `dir`, if one was written.
    fn read_index(&self, dir: &Path) -> Result<Option<TileIndex>>;
}

// ── Sidecar index ────────────────────────────────────────────────────────────

/// One labelled tile and the file it is currently stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub file_name: String,
    pub tile: LabeledTile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileIndex {
    pub entries: Vec<IndexEntry>,
}

impl TileIndex {
    pub fn new(entries: Vec<IndexEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn census(&self) -> StrataCensus {
        StrataCensus::from_labels(self.entries.iter().map(|e| e.tile.label))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

fn file_name_of(location: &Path) -> Result<&str> {
    location
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StrataError::InvalidConfig(format!("{} has no file name", location.display())))
}

// ── Filesystem ───────────────────────────────────────────────────────────────

/// GeoTIFF tiles in plain folders.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTileStore;

impl TileStore for FsTileStore {
    fn write(&mut self, dir: &Path, id: &TileId, raster: &Raster) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(id.file_name());
        geotiff::write_raster(&path, raster)?;
        Ok(path)
    }

    fn copy(&mut self, location: &Path, dest_dir: &Path) -> Result<PathBuf> {
        let to = dest_dir.join(file_name_of(location)?);
        let failure = |source: io::Error| StrataError::CopyFailure {
            from: location.to_path_buf(),
            to: to.clone(),
            source,
        };
        fs::create_dir_all(dest_dir).map_err(failure)?;
        fs::copy(location, &to).map_err(failure)?;
        Ok(to)
    }

    fn rename(&mut self, location: &Path, new_name: &str) -> Result<PathBuf> {
        let to = location.with_file_name(new_name);
        fs::rename(location, &to)?;
        Ok(to)
    }

    fn purge(&mut self, dir: &Path) -> Result<()> {
        match fs::remove_dir_all(dir) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => Ok(other?),
        }
    }

    fn list(&self, dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".tif") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn write_index(&mut self, dir: &Path, index: &TileIndex) -> Result<()> {
        fs::create_dir_all(dir)?;
        index.save(&dir.join(INDEX_FILE_NAME))
    }

    fn read_index(&self, dir: &Path) -> Result<Option<TileIndex>> {
        let path = dir.join(INDEX_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        TileIndex::load(&path).map(Some)
    }
}

// ── In memory ────────────────────────────────────────────────────────────────

/// Tiles held in memory, keyed by the path they would have on disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryTileStore {
    tiles: BTreeMap<PathBuf, Raster>,
    indexes: BTreeMap<PathBuf, TileIndex>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: &Path) -> Option<&Raster> {
        self.tiles.get(location)
    }

    pub fn contains(&self, location: &Path) -> bool {
        self.tiles.contains_key(location)
    }

    /// Number of tiles across all folders.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl TileStore for MemoryTileStore {
    fn write(&mut self, dir: &Path, id: &TileId, raster: &Raster) -> Result<PathBuf> {
        let path = dir.join(id.file_name());
        self.tiles.insert(path.clone(), raster.clone());
        Ok(path)
    }

    fn copy(&mut self, location: &Path, dest_dir: &Path) -> Result<PathBuf> {
        let to = dest_dir.join(file_name_of(location)?);
        let raster = self.tiles.get(location).cloned().ok_or_else(|| StrataError::CopyFailure {
            from: location.to_path_buf(),
            to: to.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such tile"),
        })?;
        self.tiles.insert(to.clone(), raster);
        Ok(to)
    }

    fn rename(&mut self, location: &Path, new_name: &str) -> Result<PathBuf> {
        let raster = self.tiles.remove(location).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no tile at {}", location.display()))
        })?;
        let to = location.with_file_name(new_name);
        self.tiles.insert(to.clone(), raster);
        Ok(to)
    }

    fn purge(&mut self, dir: &Path) -> Result<()> {
        self.tiles.retain(|path, _| !path.starts_with(dir));
        self.indexes.retain(|path, _| !path.starts_with(dir));
        Ok(())
    }

    fn list(&self, dir: &Path) -> Result<Vec<String>> {
        Ok(self
            .tiles
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect())
    }

    fn write_index(&mut self, dir: &Path, index: &TileIndex) -> Result<()> {
        self.indexes.insert(dir.to_path_buf(), index.clone());
        Ok(())
    }

    fn read_index(&self, dir: &Path) -> Result<Option<TileIndex>> {
        Ok(self.indexes.get(dir).cloned())
    }
}
