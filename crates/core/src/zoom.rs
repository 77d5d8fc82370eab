//! Depth heuristic for the tile pyramid.
//!
//! The deepest zoom is derived from how tightly packed the input vertices
//! are: sort every vertex quadkey, take the geometric mean of the gaps
//! between distinct neighbours, turn that into a ground distance, and pick
//! the zoom at which that distance is still resolvable on a tile.

use crate::feature::Feature;
use crate::projection::geometry_quadkeys;

/// Zoom levels of detail a single tile carries below its own zoom.
pub const FULL_DETAIL: u8 = 12;

/// Upper bound for the guessed zoom (`32 - FULL_DETAIL`).
pub const MAX_ZOOM_LIMIT: u8 = 32 - FULL_DETAIL;

/// Quadkey units per foot, empirically.
const FEET_DIVISOR: f64 = 33.0;

/// Target spacing, as a fraction of the mean vertex distance.
const SPACING_FRACTION: f64 = 8.0;

/// Degrees per foot at the equator.
const DEGREES_PER_FOOT: f64 = 2.74e-6;

/// Mean of `ln(gap)` over adjacent distinct keys, after sorting `keys`.
///
/// Returns `None` when no two keys differ.
pub fn mean_log_gap(keys: &mut [u64]) -> Option<f64> {
    keys.sort_unstable();

    let mut sum = 0.0;
    let mut count = 0usize;
    for pair in keys.windows(2) {
        if pair[1] != pair[0] {
            sum += ((pair[1] - pair[0]) as f64).ln();
            count += 1;
        }
    }

    (count > 0).then(|| sum / count as f64)
}

/// Guess the deepest zoom level worth generating for `features`.
///
/// Coincident or absent vertices give zoom 0.
pub fn guess_max_zoom<'a, I>(features: I) -> u8
where
    I: IntoIterator<Item = &'a Feature>,
{
    let mut keys: Vec<u64> = features
        .into_iter()
        .flat_map(|f| geometry_quadkeys(&f.geometry))
        .collect();

    let Some(mean) = mean_log_gap(&mut keys) else {
        log::debug!("No distinct vertices among {} keys, max zoom 0", keys.len());
        return 0;
    };

    let avg_gap = mean.exp();
    let dist_ft = avg_gap.sqrt() / FEET_DIVISOR;
    let want = dist_ft / SPACING_FRACTION;
    let raw = ((360.0 / (want * DEGREES_PER_FOOT)).ln() / std::f64::consts::LN_2
        - f64::from(FULL_DETAIL))
    .ceil();

    let zoom = if raw.is_nan() {
        0
    } else {
        raw.clamp(0.0, f64::from(MAX_ZOOM_LIMIT)) as u8
    };

    log::debug!(
        "Guessed max zoom {} from {} vertices (avg gap {:.3e}, {:.1} ft)",
        zoom,
        keys.len(),
        avg_gap,
        dist_ft
    );
    zoom
}
