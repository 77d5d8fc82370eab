//! Tile-local reprojection, Douglas-Peucker simplification, and pruning of
//! geometry that collapses at tile resolution.
//!
//! Simplification happens in **tile-local pixel coordinates** (0 to extent),
//! never in degrees, so a tolerance of 1.0 means one pixel at every latitude:
//!
//! ```text
//! lon/lat → tile-local integer grid → simplify (pixels) → prune → encode
//! ```

use geo::{
    Area, Coord, Geometry, GeometryCollection, LineString, MapCoords, MultiLineString,
    MultiPolygon, Polygon, Simplify,
};

use crate::projection::world_fraction;
use crate::tile::TileCoord;

/// Default pixel tolerance for simplification
pub const DEFAULT_PIXEL_TOLERANCE: f64 = 1.0;

/// Lines shorter than this many pixels are dropped.
pub const DEFAULT_MIN_LINE_LENGTH: f64 = 1.0;

/// Polygons smaller than this many square pixels are dropped.
pub const DEFAULT_MIN_POLYGON_AREA: f64 = 1.0;

/// Project a lon/lat coordinate onto the pixel grid of `tile`, rounded down.
///
/// The origin is the tile's top-left corner and y grows downward. Points in
/// the padding around the tile land slightly outside `[0, extent)`.
pub fn tile_local_coord(c: Coord<f64>, tile: TileCoord, extent: u32) -> Coord<f64> {
    let (fx, fy) = world_fraction(c.x, c.y);
    let extent = f64::from(extent);
    let world = (1u64 << tile.z) as f64 * extent;

    Coord {
        x: (fx * world).floor() - f64::from(tile.x) * extent,
        y: (fy * world).floor() - f64::from(tile.y) * extent,
    }
}

/// Reproject a whole geometry with [`tile_local_coord`].
///
/// `Line`, `Rect` and `Triangle` come out as `LineString` / `Polygon`, the
/// only shapes the vector tile encoder knows about.
pub fn to_tile_local(geom: &Geometry<f64>, tile: TileCoord, extent: u32) -> Geometry<f64> {
    let project = |c: Coord<f64>| tile_local_coord(c, tile, extent);
    match geom {
        Geometry::Line(line) => Geometry::LineString(LineString::from(*line).map_coords(project)),
        Geometry::Rect(rect) => Geometry::Polygon(rect.to_polygon().map_coords(project)),
        Geometry::Triangle(tri) => Geometry::Polygon(tri.to_polygon().map_coords(project)),
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(GeometryCollection(
            gc.iter().map(|g| to_tile_local(g, tile, extent)).collect(),
        )),
        other => other.map_coords(project),
    }
}

/// Douglas-Peucker simplification of lines and polygons. Points pass
/// through unchanged.
pub fn simplify_geometry(geom: &Geometry<f64>, tolerance: f64) -> Geometry<f64> {
    if tolerance <= 0.0 {
        return geom.clone();
    }

    match geom {
        Geometry::LineString(ls) => Geometry::LineString(simplify_line(ls, tolerance)),
        Geometry::MultiLineString(mls) => Geometry::MultiLineString(MultiLineString::new(
            mls.iter().map(|ls| simplify_line(ls, tolerance)).collect(),
        )),
        Geometry::Polygon(poly) => Geometry::Polygon(poly.simplify(&tolerance)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.simplify(&tolerance)),
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(GeometryCollection(
            gc.iter().map(|g| simplify_geometry(g, tolerance)).collect(),
        )),
        other => other.clone(),
    }
}

// geo::Simplify needs at least two points
fn simplify_line(ls: &LineString<f64>, tolerance: f64) -> LineString<f64> {
    if ls.0.len() < 2 {
        ls.clone()
    } else {
        ls.simplify(&tolerance)
    }
}

fn line_length(ls: &LineString<f64>) -> f64 {
    ls.lines().map(|l| l.dx().hypot(l.dy())).sum()
}

fn ring_is_degenerate(ring: &LineString<f64>) -> bool {
    ring.0.len() < 4
}

fn prune_polygon(poly: Polygon<f64>, min_area: f64) -> Option<Polygon<f64>> {
    if ring_is_degenerate(poly.exterior()) || poly.unsigned_area() < min_area {
        return None;
    }
    let (exterior, interiors) = poly.into_inner();
    let interiors = interiors
        .into_iter()
        .filter(|ring| !ring_is_degenerate(ring))
        .collect();
    Some(Polygon::new(exterior, interiors))
}

/// Drop what no longer renders: lines shorter than `min_line_length`,
/// polygons under `min_polygon_area` or whose exterior has fewer than four
/// coordinates, holes with fewer than four coordinates, and multis or
/// collections left with no parts.
///
/// Returns `None` when nothing survives. Points always survive.
pub fn remove_empty(
    geom: Geometry<f64>,
    min_line_length: f64,
    min_polygon_area: f64,
) -> Option<Geometry<f64>> {
    match geom {
        Geometry::Point(_) => Some(geom),
        Geometry::MultiPoint(ref mp) if mp.0.is_empty() => None,
        Geometry::MultiPoint(_) => Some(geom),
        Geometry::LineString(ls) => {
            (line_length(&ls) >= min_line_length).then_some(Geometry::LineString(ls))
        }
        Geometry::MultiLineString(mls) => {
            let parts: Vec<_> = mls
                .into_iter()
                .filter(|ls| line_length(ls) >= min_line_length)
                .collect();
            (!parts.is_empty()).then(|| Geometry::MultiLineString(MultiLineString::new(parts)))
        }
        Geometry::Polygon(poly) => prune_polygon(poly, min_polygon_area).map(Geometry::Polygon),
        Geometry::MultiPolygon(mp) => {
            let parts: Vec<_> = mp
                .into_iter()
                .filter_map(|p| prune_polygon(p, min_polygon_area))
                .collect();
            (!parts.is_empty()).then(|| Geometry::MultiPolygon(MultiPolygon::new(parts)))
        }
        Geometry::GeometryCollection(gc) => {
            let parts: Vec<_> = gc
                .into_iter()
                .filter_map(|g| remove_empty(g, min_line_length, min_polygon_area))
                .collect();
            (!parts.is_empty()).then(|| Geometry::GeometryCollection(GeometryCollection(parts)))
        }
        // Reprojection already turned these into lines and polygons
        Geometry::Line(_) | Geometry::Rect(_) | Geometry::Triangle(_) => Some(geom),
    }
}
