//! Quadtree partitioning of a feature set into a tile pyramid.
//!
//! Nodes are visited breadth-first from a work list. Each node below the
//! target zoom has its features clipped into its four children in parallel,
//! one scoped thread per child, and all four are joined before the node is
//! handed downstream. Children that end up with no features are pruned
//! together with their whole subtree.

use std::collections::VecDeque;
use std::thread;

use flume::Sender;

use crate::clip::clip_features;
use crate::feature::Feature;
use crate::pipeline::TilerConfig;
use crate::tile::{padding_degrees, TileBounds, TileCoord};

/// One node of the quadtree: a tile address plus the features clipped to
/// its padded bounds.
#[derive(Debug, Clone)]
pub struct VectorTile {
    pub coord: TileCoord,
    pub features: Vec<Feature>,
    /// False when no feature reached this tile; the node is pruned.
    pub valid: bool,
    pub feature_count: usize,
    /// Total vertices over all features.
    pub point_count: usize,
    pub bounds: TileBounds,
}

impl VectorTile {
    pub fn new(coord: TileCoord, features: Vec<Feature>) -> Self {
        let point_count = features.iter().map(Feature::vertex_count).sum();
        Self {
            coord,
            valid: !features.is_empty(),
            feature_count: features.len(),
            point_count,
            bounds: coord.bounds(),
            features,
        }
    }
}

/// Walks the quadtree below a root tile down to `max_zoom`.
#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    max_zoom: u8,
    buffer_pixels: u32,
    extent: u32,
}

impl Splitter {
    pub fn new(max_zoom: u8, config: &TilerConfig) -> Self {
        Self {
            max_zoom,
            buffer_pixels: config.buffer_pixels,
            extent: config.extent,
        }
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// Clip `parent`'s features into each of its four children, one thread
    /// per child, and return the children that kept at least one feature.
    ///
    /// The parent is only borrowed; all four threads read the same features.
    pub fn split_children(&self, parent: &VectorTile) -> Vec<VectorTile> {
        let children = parent.coord.children();
        let pad = padding_degrees(children[0].z, self.buffer_pixels, self.extent);

        let results = thread::scope(|s| {
            let handles = children.map(|child| {
                s.spawn(move || {
                    let clipped = clip_features(&parent.features, &child.bounds(), pad);
                    VectorTile::new(child, clipped)
                })
            });
            handles.map(|h| h.join())
        });

        let mut kept = Vec::with_capacity(4);
        for (child, result) in children.iter().zip(results) {
            match result {
                Ok(tile) if tile.valid => kept.push(tile),
                Ok(_) => log::trace!("Tile {} has no features, pruned", child),
                Err(_) => log::error!("Clipping into tile {} panicked, pruned", child),
            }
        }
        kept
    }

    /// Visit every node from `root` down, sending each one to `tx` after its
    /// children have been clipped. Returns the number of nodes sent.
    ///
    /// `tx` is dropped on return, which closes the queue for the consumer.
    pub fn run(&self, root: VectorTile, tx: Sender<VectorTile>) -> usize {
        let mut queue = VecDeque::from([root]);
        let mut visited = 0;

        while let Some(tile) = queue.pop_front() {
            if tile.coord.z < self.max_zoom {
                queue.extend(self.split_children(&tile));
            }

            log::trace!(
                "Tile {}: {} features, {} points",
                tile.coord,
                tile.feature_count,
                tile.point_count
            );
            if tx.send(tile).is_err() {
                log::warn!("Encode queue closed, stopping after {} tiles", visited);
                break;
            }
            visited += 1;
        }

        log::debug!("Split finished: {} tiles visited", visited);
        visited
    }
}
