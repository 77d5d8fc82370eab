//! Core library for splitting a feature set into a Web-Mercator vector tile
//! pyramid.
//!
//! Features are partitioned down a quadtree below a root tile, clipped into
//! each child tile with a pixel buffer, simplified onto the tile grid, and
//! encoded as gzip-compressed Mapbox Vector Tiles. The deepest zoom is
//! guessed from how tightly the input vertices are packed.
//!
//! # Examples
//!
//! ```no_run
//! use pyramid_tiles_core::{split_tile, FeatureCollection, MemoryTileStore};
//!
//! let text = std::fs::read_to_string("input.geojson").unwrap();
//! let features = FeatureCollection::from_geojson_str(&text).unwrap();
//!
//! let mut store = MemoryTileStore::new();
//! let (max_zoom, tiles) = split_tile(&mut store, &features, "features", 0, 0, 0);
//! println!("{} tiles down to zoom {}", tiles, max_zoom);
//! ```

use thiserror::Error;

pub mod clip;
pub mod compression;
pub mod encoder;
pub mod feature;
pub mod mvt;
pub mod pipeline;
pub mod projection;
pub mod simplify;
pub mod sink;
pub mod splitter;
pub mod store;
pub mod tile;
pub mod vector_tile;
pub mod zoom;

pub use encoder::decode_tile;
pub use feature::{Feature, FeatureCollection};
pub use pipeline::{split_tile, SplitReport, Tiler, TilerConfig};
pub use store::{DirectoryTileStore, MemoryTileStore, StoreError, TileStore};
pub use tile::{TileBounds, TileCoord};

/// Errors that can occur while building a tile pyramid
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid tile address {0}")]
    InvalidTile(TileCoord),

    #[error("MVT encoding failed: {0}")]
    MvtEncoding(String),

    #[error("MVT decoding failed: {0}")]
    MvtDecode(String),

    #[error("Tile store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid GeoJSON: {0}")]
    GeoJson(String),
}

pub type Result<T> = std::result::Result<T, Error>;
