//! Robustness tests for geometry clipping on degenerate input.
//!
//! These tests verify that `clip_geometry` handles malformed geometries
//! without panicking: self-intersecting rings, spikes, holes that cross the
//! shell, repeated vertices, zero-area rings, and edges lying on the clip
//! bound. Where a result is produced, it must stay inside the padded bound.
//!
//! Each fixture is clipped against a quadrant tile and a deep tile so both
//! the Sutherland-Hodgman path and the boolean-ops fallback get exercised.

use std::panic::{self, AssertUnwindSafe};

use geo::{
    line_string, point, polygon, Area, BoundingRect, Geometry, GeometryCollection, LineString,
    MultiPolygon, Polygon,
};
use pyramid_tiles_core::clip::{clip_features, clip_geometry};
use pyramid_tiles_core::tile::{padding_degrees, TileBounds, TileCoord};
use pyramid_tiles_core::Feature;

/// Outcome of clipping a single fixture
#[derive(Debug)]
enum FixtureResult {
    /// Clipping returned, with or without a geometry
    Pass(Option<Geometry<f64>>),
    /// Clipping panicked
    Panic(String),
}

fn run_clip(geom: &Geometry<f64>, bounds: &TileBounds, pad: f64) -> FixtureResult {
    let result = panic::catch_unwind(AssertUnwindSafe(|| clip_geometry(geom, bounds, pad)));
    match result {
        Ok(clipped) => FixtureResult::Pass(clipped),
        Err(e) => {
            let msg = e
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| e.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            FixtureResult::Panic(msg)
        }
    }
}

/// Tiles every fixture is clipped against: a zoom-1 quadrant touching the
/// origin and a zoom-6 tile cutting through it.
fn test_tiles() -> Vec<TileCoord> {
    vec![TileCoord::new(1, 0, 1), TileCoord::new(32, 31, 6)]
}

fn assert_clips_cleanly(name: &str, geom: Geometry<f64>) {
    for tile in test_tiles() {
        let bounds = tile.bounds();
        let pad = padding_degrees(tile.z, 64, 4096);
        let padded = bounds.padded(pad);

        match run_clip(&geom, &bounds, pad) {
            FixtureResult::Pass(Some(clipped)) => {
                if let Some(rect) = clipped.bounding_rect() {
                    let eps = 1e-9;
                    assert!(
                        rect.min().x >= padded.lng_min - eps
                            && rect.max().x <= padded.lng_max + eps
                            && rect.min().y >= padded.lat_min - eps
                            && rect.max().y <= padded.lat_max + eps,
                        "{} clipped into {} escapes the padded bound: {:?}",
                        name,
                        tile,
                        rect
                    );
                }
            }
            FixtureResult::Pass(None) => {}
            FixtureResult::Panic(msg) => panic!("{} panicked in {}: {}", name, tile, msg),
        }
    }
}

// ============================================================================
// Self-intersecting rings
// ============================================================================

#[test]
fn test_bowtie_polygon() {
    let bowtie = polygon![
        (x: -10.0, y: -10.0),
        (x: 10.0, y: 10.0),
        (x: 10.0, y: -10.0),
        (x: -10.0, y: 10.0),
    ];
    assert_clips_cleanly("bowtie", Geometry::Polygon(bowtie));
}

#[test]
fn test_figure_eight_crossing_many_tiles() {
    let ring = polygon![
        (x: -50.0, y: 0.0),
        (x: 0.0, y: 40.0),
        (x: 50.0, y: 0.0),
        (x: 0.0, y: -40.0),
        (x: 0.0, y: 40.0),
        (x: -50.0, y: 0.0),
    ];
    assert_clips_cleanly("figure-eight", Geometry::Polygon(ring));
}

#[test]
fn test_spike_polygon() {
    // Zero-width spike out of a square
    let spike = polygon![
        (x: 0.0, y: 0.0),
        (x: 20.0, y: 0.0),
        (x: 20.0, y: 10.0),
        (x: 60.0, y: 10.0),
        (x: 20.0, y: 10.0),
        (x: 20.0, y: 20.0),
        (x: 0.0, y: 20.0),
    ];
    assert_clips_cleanly("spike", Geometry::Polygon(spike));
}

// ============================================================================
// Holes
// ============================================================================

#[test]
fn test_hole_crossing_shell() {
    let shell = LineString::from(vec![
        (-20.0, -20.0),
        (20.0, -20.0),
        (20.0, 20.0),
        (-20.0, 20.0),
        (-20.0, -20.0),
    ]);
    let hole = LineString::from(vec![
        (10.0, 10.0),
        (30.0, 10.0),
        (30.0, 30.0),
        (10.0, 30.0),
        (10.0, 10.0),
    ]);
    assert_clips_cleanly(
        "hole-crossing-shell",
        Geometry::Polygon(Polygon::new(shell, vec![hole])),
    );
}

#[test]
fn test_hole_covering_tile() {
    // The tile falls entirely inside the hole
    let shell = LineString::from(vec![
        (-80.0, -60.0),
        (80.0, -60.0),
        (80.0, 60.0),
        (-80.0, 60.0),
        (-80.0, -60.0),
    ]);
    let hole = LineString::from(vec![
        (-70.0, -50.0),
        (70.0, -50.0),
        (70.0, 50.0),
        (-70.0, 50.0),
        (-70.0, -50.0),
    ]);
    let geom = Geometry::Polygon(Polygon::new(shell, vec![hole]));
    assert_clips_cleanly("hole-covering-tile", geom.clone());

    // Whatever survives for a tile inside the hole covers no area
    let tile = TileCoord::new(32, 31, 6);
    if let Some(clipped) = clip_geometry(&geom, &tile.bounds(), 0.0) {
        assert!(clipped.unsigned_area() < 1e-9, "{:?}", clipped);
    }
}

// ============================================================================
// Degenerate vertex sets
// ============================================================================

#[test]
fn test_repeated_vertices() {
    let ring = polygon![
        (x: 1.0, y: 1.0),
        (x: 1.0, y: 1.0),
        (x: 30.0, y: 1.0),
        (x: 30.0, y: 1.0),
        (x: 30.0, y: 30.0),
        (x: 1.0, y: 30.0),
    ];
    assert_clips_cleanly("repeated-vertices", Geometry::Polygon(ring));
}

#[test]
fn test_zero_area_ring() {
    let flat = polygon![
        (x: -10.0, y: 5.0),
        (x: 10.0, y: 5.0),
        (x: 30.0, y: 5.0),
    ];
    assert_clips_cleanly("zero-area", Geometry::Polygon(flat));
}

#[test]
fn test_empty_geometries() {
    assert_clips_cleanly(
        "empty-polygon",
        Geometry::Polygon(Polygon::new(LineString::new(vec![]), vec![])),
    );
    assert_clips_cleanly("empty-multipolygon", Geometry::MultiPolygon(MultiPolygon::new(vec![])));
    assert_clips_cleanly("empty-line", Geometry::LineString(LineString::new(vec![])));
    assert_clips_cleanly(
        "empty-collection",
        Geometry::GeometryCollection(GeometryCollection(vec![])),
    );
}

#[test]
fn test_single_point_line() {
    assert_clips_cleanly(
        "single-point-line",
        Geometry::LineString(line_string![(x: 5.0, y: 5.0)]),
    );
}

// ============================================================================
// Geometry on the clip bound
// ============================================================================

#[test]
fn test_edges_on_tile_boundary() {
    // Shares the meridian and equator with the zoom-1 quadrant
    let square = polygon![
        (x: 0.0, y: 0.0),
        (x: 0.0, y: 20.0),
        (x: -20.0, y: 20.0),
        (x: -20.0, y: 0.0),
    ];
    assert_clips_cleanly("boundary-square", Geometry::Polygon(square));
}

#[test]
fn test_point_on_boundary_is_kept_by_both_neighbours() {
    let geom = Geometry::Point(point!(x: 0.0, y: 10.0));
    let west = TileCoord::new(0, 0, 1).bounds();
    let east = TileCoord::new(1, 0, 1).bounds();

    assert!(clip_geometry(&geom, &west, 0.0).is_some());
    assert!(clip_geometry(&geom, &east, 0.0).is_some());
}

#[test]
fn test_line_tracing_boundary() {
    let line = line_string![(x: 0.0, y: -30.0), (x: 0.0, y: 30.0)];
    assert_clips_cleanly("boundary-line", Geometry::LineString(line));
}

// ============================================================================
// Whole feature sets
// ============================================================================

#[test]
fn test_mixed_feature_set_never_panics() {
    let features = vec![
        Feature::new(polygon![
            (x: -10.0, y: -10.0),
            (x: 10.0, y: 10.0),
            (x: 10.0, y: -10.0),
            (x: -10.0, y: 10.0),
        ]),
        Feature::new(line_string![(x: -100.0, y: 5.0), (x: 100.0, y: 5.0)]),
        Feature::new(point!(x: 170.0, y: -80.0)),
        Feature::new(Polygon::new(LineString::new(vec![]), vec![])),
    ];

    for tile in TileCoord::new(0, 0, 0).children() {
        let pad = padding_degrees(tile.z, 64, 4096);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            clip_features(&features, &tile.bounds(), pad)
        }));
        let clipped = result.unwrap_or_else(|_| panic!("clip_features panicked in {}", tile));
        assert!(clipped.len() <= features.len());
    }
}
