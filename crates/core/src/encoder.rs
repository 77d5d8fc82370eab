//! Turns one quadtree work item into a gzip-compressed vector tile.

use prost::Message;

use crate::compression::{gunzip, gzip, is_gzip};
use crate::mvt::{LayerBuilder, TileBuilder};
use crate::pipeline::TilerConfig;
use crate::simplify::{remove_empty, simplify_geometry, to_tile_local};
use crate::splitter::VectorTile;
use crate::tile::TileCoord;
use crate::vector_tile::Tile;
use crate::{Error, Result};

/// A tile ready for the store: XYZ address plus gzip MVT bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTile {
    pub coord: TileCoord,
    pub data: Vec<u8>,
}

/// Encode a work item.
///
/// Every feature is moved onto the tile's pixel grid, simplified, and
/// pruned. `Ok(None)` means the tile was dropped because nothing
/// renderable survived; that is not an error.
pub fn encode_tile(
    tile: VectorTile,
    layer_name: &str,
    config: &TilerConfig,
) -> Result<Option<EncodedTile>> {
    let coord = tile.coord;
    let mut layer = LayerBuilder::new(layer_name).with_extent(config.extent);

    for feature in &tile.features {
        let local = to_tile_local(&feature.geometry, coord, config.extent);
        let simplified = simplify_geometry(&local, config.simplify_tolerance);
        if let Some(geometry) =
            remove_empty(simplified, config.min_line_length, config.min_polygon_area)
        {
            layer.add_feature(feature.id, &geometry, &feature.properties);
        }
    }

    if layer.is_empty() {
        log::debug!(
            "Tile {}: all {} features collapsed, dropping",
            coord,
            tile.feature_count
        );
        return Ok(None);
    }
    let kept = layer.len();

    let mut builder = TileBuilder::new();
    builder.add_layer(layer.build());
    let bytes = builder.build().encode_to_vec();
    if bytes.is_empty() {
        log::debug!("Tile {}: empty payload, dropping", coord);
        return Ok(None);
    }

    let data = gzip(&bytes).map_err(|e| Error::MvtEncoding(format!("gzip failed: {}", e)))?;
    log::trace!(
        "Tile {}: {} of {} features, {} bytes ({} gzipped)",
        coord,
        kept,
        tile.feature_count,
        bytes.len(),
        data.len()
    );

    Ok(Some(EncodedTile { coord, data }))
}

/// Inflate and parse a stored tile payload.
///
/// A payload without the gzip header is an `MvtDecode` error; a truncated
/// gzip stream is an `Io` error.
pub fn decode_tile(data: &[u8]) -> Result<Tile> {
    if !is_gzip(data) {
        return Err(Error::MvtDecode("payload is not gzip".to_string()));
    }
    let raw = gunzip(data)?;
    Tile::decode(raw.as_slice()).map_err(|e| Error::MvtDecode(e.to_string()))
}
