//! Last pipeline stage: serial insertion into the tile store.

use std::sync::atomic::{AtomicUsize, Ordering};

use flume::Receiver;

use crate::encoder::EncodedTile;
use crate::store::{StoreError, TileStore};

/// Outcome counters, shared with the coordinator.
#[derive(Debug, Default)]
pub struct SinkCounters {
    pub written: AtomicUsize,
    pub conflicts: AtomicUsize,
    pub failures: AtomicUsize,
}

impl SinkCounters {
    pub fn written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    pub fn conflicts(&self) -> usize {
        self.conflicts.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Insert one tile, flipping its row to TMS. Store errors are logged and
/// counted, never returned.
pub fn store_tile<S: TileStore + ?Sized>(
    store: &mut S,
    tile: &EncodedTile,
    counters: &SinkCounters,
) {
    let coord = tile.coord;

    match store.insert_tile(coord.z, coord.x, coord.tms_row(), &tile.data) {
        Ok(()) => {
            counters.written.fetch_add(1, Ordering::Relaxed);
        }
        Err(e @ StoreError::Conflict { .. }) => {
            log::warn!("Skipping tile {}: {}", coord, e);
            counters.conflicts.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            log::error!("Failed to store tile {}: {}", coord, e);
            counters.failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Drain `rx` into `store` until every sender is gone.
pub fn run_sink<S: TileStore + ?Sized>(
    store: &mut S,
    rx: Receiver<EncodedTile>,
    counters: &SinkCounters,
) {
    while let Ok(tile) = rx.recv() {
        store_tile(store, &tile, counters);
    }
    log::debug!(
        "Sink finished: {} written, {} conflicts, {} failures",
        counters.written(),
        counters.conflicts(),
        counters.failures()
    );
}
