//! Tile persistence.
//!
//! Rows passed to a [`TileStore`] are already in the TMS scheme (row 0 at
//! the bottom). Stores reject duplicate keys; they never overwrite.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors a tile store can report on insert.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Tile {zoom}/{column}/{row} already exists")]
    Conflict { zoom: u8, column: u32, row: u32 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Tile store error: {0}")]
    Backend(String),
}

/// Insert-only sink for encoded tiles keyed by (zoom, column, row).
pub trait TileStore {
    /// Store one payload. A key that is already present must fail with
    /// [`StoreError::Conflict`] and leave the stored payload untouched.
    fn insert_tile(
        &mut self,
        zoom: u8,
        column: u32,
        row: u32,
        data: &[u8],
    ) -> Result<(), StoreError>;
}

impl<S: TileStore + ?Sized> TileStore for &mut S {
    fn insert_tile(
        &mut self,
        zoom: u8,
        column: u32,
        row: u32,
        data: &[u8],
    ) -> Result<(), StoreError> {
        (**self).insert_tile(zoom, column, row, data)
    }
}

impl<S: TileStore + ?Sized> TileStore for Box<S> {
    fn insert_tile(
        &mut self,
        zoom: u8,
        column: u32,
        row: u32,
        data: &[u8],
    ) -> Result<(), StoreError> {
        (**self).insert_tile(zoom, column, row, data)
    }
}

/// In-memory store, ordered by key.
#[derive(Debug, Default, Clone)]
pub struct MemoryTileStore {
    tiles: BTreeMap<(u8, u32, u32), Vec<u8>>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn get(&self, zoom: u8, column: u32, row: u32) -> Option<&[u8]> {
        self.tiles.get(&(zoom, column, row)).map(Vec::as_slice)
    }

    /// Stored keys as (zoom, column, row), ascending.
    pub fn keys(&self) -> impl Iterator<Item = (u8, u32, u32)> + '_ {
        self.tiles.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((u8, u32, u32), &[u8])> + '_ {
        self.tiles.iter().map(|(k, v)| (*k, v.as_slice()))
    }
}

impl TileStore for MemoryTileStore {
    fn insert_tile(
        &mut self,
        zoom: u8,
        column: u32,
        row: u32,
        data: &[u8],
    ) -> Result<(), StoreError> {
        use std::collections::btree_map::Entry;

        match self.tiles.entry((zoom, column, row)) {
            Entry::Occupied(_) => Err(StoreError::Conflict { zoom, column, row }),
            Entry::Vacant(slot) => {
                slot.insert(data.to_vec());
                Ok(())
            }
        }
    }
}

/// Writes each tile to `<root>/<zoom>/<column>/<row>.mvt.gz`.
#[derive(Debug, Clone)]
pub struct DirectoryTileStore {
    root: PathBuf,
}

impl DirectoryTileStore {
    /// Use `root` as the tile directory, creating it if needed.
    pub fn create<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tile_path(&self, zoom: u8, column: u32, row: u32) -> PathBuf {
        self.root
            .join(zoom.to_string())
            .join(column.to_string())
            .join(format!("{row}.mvt.gz"))
    }
}

impl TileStore for DirectoryTileStore {
    fn insert_tile(
        &mut self,
        zoom: u8,
        column: u32,
        row: u32,
        data: &[u8],
    ) -> Result<(), StoreError> {
        let path = self.tile_path(zoom, column, row);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::Conflict { zoom, column, row });
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(data)?;
        Ok(())
    }
}
