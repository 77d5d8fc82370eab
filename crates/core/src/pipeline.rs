//! Tiler pipeline: wires the quadtree splitter, the tile encoder, and the
//! store sink together.
//!
//! Three stages connected by bounded queues:
//! 1. The splitter walks the quadtree below the root and sends every node.
//! 2. A fixed set of encode workers drains the nodes and encodes them.
//! 3. A single sink thread inserts encoded tiles into the store.
//!
//! Everything runs inside [`std::thread::scope`], so the store and the input
//! features are borrowed, never cloned into `'static` tasks. Closing happens
//! in stage order: the splitter drops its sender when its work list drains,
//! the workers drop their sink senders once the split queue is closed and
//! empty, and the sink returns once its queue is empty.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use flume::{Receiver, Sender};
use geo::BoundingRect;

use crate::encoder::{encode_tile, EncodedTile};
use crate::feature::{Feature, FeatureCollection};
use crate::sink::{run_sink, SinkCounters};
use crate::simplify::{
    DEFAULT_MIN_LINE_LENGTH, DEFAULT_MIN_POLYGON_AREA, DEFAULT_PIXEL_TOLERANCE,
};
use crate::splitter::{Splitter, VectorTile};
use crate::store::TileStore;
use crate::tile::TileCoord;
use crate::zoom::guess_max_zoom;
use crate::{Error, Result};

/// Default buffer in pixels around each tile
pub const DEFAULT_BUFFER_PIXELS: u32 = 64;

/// Default tile extent (4096 as per MVT spec)
pub const DEFAULT_EXTENT: u32 = 4096;

/// Default capacity of both inter-stage queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Configuration for the tiling pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TilerConfig {
    /// Tile extent in pixels (default: 4096)
    pub extent: u32,
    /// Buffer in pixels around tile bounds (default: 64)
    pub buffer_pixels: u32,
    /// Douglas-Peucker tolerance in tile-local units
    pub simplify_tolerance: f64,
    /// Lines shorter than this, in tile-local units, are dropped
    pub min_line_length: f64,
    /// Polygons smaller than this, in square tile-local units, are dropped
    pub min_polygon_area: f64,
    /// Capacity of the split and encode queues
    pub queue_capacity: usize,
    /// Number of encode worker threads (default: one per CPU)
    pub encode_workers: usize,
}

impl Default for TilerConfig {
    fn default() -> Self {
        Self {
            extent: DEFAULT_EXTENT,
            buffer_pixels: DEFAULT_BUFFER_PIXELS,
            simplify_tolerance: DEFAULT_PIXEL_TOLERANCE,
            min_line_length: DEFAULT_MIN_LINE_LENGTH,
            min_polygon_area: DEFAULT_MIN_POLYGON_AREA,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            encode_workers: num_cpus::get(),
        }
    }
}

impl TilerConfig {
    /// Set the tile extent.
    pub fn with_extent(mut self, extent: u32) -> Self {
        self.extent = extent;
        self
    }

    /// Set the buffer in pixels.
    pub fn with_buffer(mut self, buffer_pixels: u32) -> Self {
        self.buffer_pixels = buffer_pixels;
        self
    }

    pub fn with_simplify_tolerance(mut self, tolerance: f64) -> Self {
        self.simplify_tolerance = tolerance;
        self
    }

    pub fn with_min_line_length(mut self, length: f64) -> Self {
        self.min_line_length = length;
        self
    }

    pub fn with_min_polygon_area(mut self, area: f64) -> Self {
        self.min_polygon_area = area;
        self
    }

    /// Set the queue capacity. Zero is raised to one so the stages can
    /// still hand off.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the number of encode workers, at least one.
    pub fn with_encode_workers(mut self, workers: usize) -> Self {
        self.encode_workers = workers.max(1);
        self
    }
}

/// What one run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitReport {
    /// Deepest zoom the pyramid was split to
    pub max_zoom: u8,
    /// Quadtree nodes sent to the encoder
    pub tiles_visited: usize,
    /// Tiles the store accepted
    pub tiles_written: usize,
    /// Tiles with nothing left after simplification, or that failed to encode
    pub tiles_dropped: usize,
    /// Inserts rejected because the key already existed
    pub store_conflicts: usize,
    /// Inserts that failed for any other reason
    pub store_failures: usize,
    /// Encodes that panicked; also counted in `tiles_dropped`
    pub encode_panics: usize,
}

/// Builds a tile pyramid below a root tile and writes it to a store.
#[derive(Debug, Clone, Default)]
pub struct Tiler {
    config: TilerConfig,
}

impl Tiler {
    pub fn new(config: TilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TilerConfig {
        &self.config
    }

    /// Tile every feature touching `root` into `store`, down to the zoom
    /// picked by [`guess_max_zoom`].
    ///
    /// Store errors are logged and counted in the report, never returned.
    /// The only error is an invalid root address.
    pub fn run<S>(
        &self,
        store: &mut S,
        features: &FeatureCollection,
        layer_name: &str,
        root: TileCoord,
    ) -> Result<SplitReport>
    where
        S: TileStore + Send + ?Sized,
    {
        if !root.is_valid() {
            return Err(Error::InvalidTile(root));
        }

        let root_bounds = root.bounds();
        let selected: Vec<Feature> = features
            .iter()
            .filter(|f| {
                f.geometry
                    .bounding_rect()
                    .is_some_and(|rect| root_bounds.intersects_rect(&rect))
            })
            .cloned()
            .collect();

        if selected.is_empty() {
            log::info!("No features inside tile {}, nothing to do", root);
            return Ok(SplitReport::default());
        }

        let max_zoom = guess_max_zoom(&selected);
        log::info!(
            "Splitting {} of {} features below tile {} down to zoom {}",
            selected.len(),
            features.len(),
            root,
            max_zoom
        );

        let splitter = Splitter::new(max_zoom, &self.config);
        let root_tile = VectorTile::new(root, selected);

        let counters = SinkCounters::default();
        let tallies = EncodeTallies::default();
        let (split_tx, split_rx) = flume::bounded::<VectorTile>(self.config.queue_capacity);
        let (sink_tx, sink_rx) = flume::bounded(self.config.queue_capacity);

        let tiles_visited = thread::scope(|s| {
            let sink = s.spawn(|| run_sink(store, sink_rx, &counters));
            let split = s.spawn(move || splitter.run(root_tile, split_tx));

            let config = &self.config;
            let tallies = &tallies;
            let workers: Vec<_> = (0..config.encode_workers)
                .map(|_| {
                    let rx = split_rx.clone();
                    let tx = sink_tx.clone();
                    s.spawn(move || encode_worker(rx, tx, layer_name, config, tallies))
                })
                .collect();
            drop(split_rx);
            drop(sink_tx);

            for worker in workers {
                if worker.join().is_err() {
                    log::error!("Encode worker panicked");
                }
            }

            let visited = split.join().unwrap_or_else(|_| {
                log::error!("Splitter panicked");
                0
            });
            if sink.join().is_err() {
                log::error!("Sink panicked");
            }
            visited
        });

        let report = SplitReport {
            max_zoom,
            tiles_visited,
            tiles_written: counters.written(),
            tiles_dropped: tallies.dropped.into_inner(),
            encode_panics: tallies.panicked.into_inner(),
            store_conflicts: counters.conflicts(),
            store_failures: counters.failures(),
        };
        log::info!(
            "Tile {}: {} visited, {} written, {} dropped, {} conflicts, {} failures",
            root,
            report.tiles_visited,
            report.tiles_written,
            report.tiles_dropped,
            report.store_conflicts,
            report.store_failures
        );
        if report.encode_panics > 0 {
            log::warn!("{} tiles panicked while encoding", report.encode_panics);
        }
        Ok(report)
    }
}

#[derive(Debug, Default)]
struct EncodeTallies {
    dropped: AtomicUsize,
    panicked: AtomicUsize,
}

/// Drain split nodes until the splitter hangs up, forwarding every tile
/// that encodes to the sink. A panic in one encode is contained to that tile.
fn encode_worker(
    tiles: Receiver<VectorTile>,
    sink: Sender<EncodedTile>,
    layer_name: &str,
    config: &TilerConfig,
    tallies: &EncodeTallies,
) {
    while let Ok(tile) = tiles.recv() {
        let coord = tile.coord;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            encode_tile(tile, layer_name, config)
        }));
        match outcome {
            Ok(Ok(Some(encoded))) => {
                if sink.send(encoded).is_err() {
                    log::error!("Sink gone, tile {} lost", coord);
                }
            }
            Ok(Ok(None)) => {
                tallies.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                log::error!("Failed to encode tile {}: {}", coord, e);
                tallies.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                log::error!("Encoding tile {} panicked", coord);
                tallies.dropped.fetch_add(1, Ordering::Relaxed);
                tallies.panicked.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Tile `features` below `z/x/y` into `store` with the default config.
///
/// Returns the zoom the pyramid was split to and the number of tiles the
/// store accepted. Nothing touching the root, or an invalid root, yields
/// `(0, 0)`.
pub fn split_tile<S>(
    store: &mut S,
    features: &FeatureCollection,
    layer_name: &str,
    z: u8,
    x: u32,
    y: u32,
) -> (u8, usize)
where
    S: TileStore + Send + ?Sized,
{
    match Tiler::default().run(store, features, layer_name, TileCoord::new(x, y, z)) {
        Ok(report) => (report.max_zoom, report.tiles_written),
        Err(e) => {
            log::error!("Split of {}/{}/{} failed: {}", z, x, y, e);
            (0, 0)
        }
    }
}
