//! Web Mercator tile-grid projection and quadkey (Z-order) indexing.
//!
//! A quadkey interleaves the bits of a point's 32-bit world X and Y
//! coordinates into one `u64`, most significant bit first, X bit before Y
//! bit at every level. Sorting by quadkey walks the plane along a Morton
//! curve, so nearby points mostly end up near each other in the ordering.
//!
//! # Example
//!
//! ```
//! use pyramid_tiles_core::projection::{decode_quadkey, encode_quadkey, project};
//!
//! let (x, y) = project(-122.4, 37.8, 32);
//! let key = encode_quadkey(x as u32, y as u32);
//! assert_eq!(decode_quadkey(key), (x as u32, y as u32));
//! ```

use std::f64::consts::PI;

use geo::{Coord, CoordsIter, Geometry, LineString, Point, Polygon};

/// Resolution used for quadkeys: 32 bits per axis.
pub const QUADKEY_ZOOM: u8 = 32;

/// Longitude substituted for non-finite input. Far outside the world so
/// callers can tell the result is unusable.
const LON_SENTINEL: f64 = 720.0;

/// Latitude limit applied before projecting.
const LAT_LIMIT: f64 = 89.9;

/// Longitude limit applied before projecting.
const LON_LIMIT: f64 = 360.0;

/// Project a longitude/latitude in degrees to tile-grid coordinates at `zoom`.
///
/// Inputs are sanitized rather than rejected:
/// - a non-finite longitude becomes 720 (and is not clamped afterwards),
///   any other longitude is clamped to `[-360, 360]`;
/// - a non-finite latitude becomes 89.9, and every latitude is clamped to
///   `[-89.9, 89.9]`.
///
/// Degenerate input therefore yields degenerate, but finite, output. At zoom
/// 32 a valid point lands in `[0, 2^32)` on both axes.
pub fn project(lon: f64, lat: f64, zoom: u8) -> (i64, i64) {
    let (fx, fy) = world_fraction(lon, lat);
    let n = (1u64 << zoom) as f64;
    ((n * fx) as i64, (n * fy) as i64)
}

/// Sanitized Web Mercator position as a fraction of the world, `(0, 0)` at
/// the top-left corner. [`project`] is this scaled by `2^zoom`.
pub fn world_fraction(lon: f64, lat: f64) -> (f64, f64) {
    let lon = if lon.is_finite() {
        lon.clamp(-LON_LIMIT, LON_LIMIT)
    } else {
        LON_SENTINEL
    };
    let lat = if lat.is_finite() { lat } else { LAT_LIMIT };
    let lat_rad = lat.clamp(-LAT_LIMIT, LAT_LIMIT).to_radians();

    let x = (lon + 180.0) / 360.0;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0;
    (x, y)
}

/// Inverse of [`project`]: the longitude/latitude of grid corner `(x, y)`.
///
/// This is the exact inverse of the grid formula, with none of the
/// sanitizing done by [`project`]. Only meant for diagnostics.
pub fn unproject(x: i64, y: i64, zoom: u8) -> (f64, f64) {
    let n = (1u64 << zoom) as f64;
    let lon = 360.0 * x as f64 / n - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan();
    (lon, lat_rad.to_degrees())
}

/// Encode (x, y) world coordinates to a quadkey.
///
/// Bit `i` of `wx` lands at output bit `2i + 1` and bit `i` of `wy` at
/// `2i`, so the most significant pair of the key holds the top bits of x
/// and y.
pub fn encode_quadkey(wx: u32, wy: u32) -> u64 {
    let mut out: u64 = 0;

    for i in 0..32 {
        let bit_pos = 31 - i;
        let vx = ((wx >> bit_pos) & 1) as u64;
        let vy = ((wy >> bit_pos) & 1) as u64;

        let out_pos = 62 - 2 * i;
        out |= (vx << 1 | vy) << out_pos;
    }

    out
}

/// Per-byte de-interleave tables: entry `b` holds the 4 x bits (resp. y
/// bits) packed in the byte `b` of a quadkey.
const DECODE_X: [u8; 256] = build_decode_table(1);
const DECODE_Y: [u8; 256] = build_decode_table(0);

const fn build_decode_table(shift: u32) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut byte = 0;
    while byte < 256 {
        let mut value = 0u8;
        let mut pair = 0;
        while pair < 4 {
            let bit = (byte >> (2 * pair + shift)) & 1;
            value |= (bit as u8) << pair;
            pair += 1;
        }
        table[byte] = value;
        byte += 1;
    }
    table
}

/// Decode a quadkey back to (x, y) world coordinates.
///
/// Inverse of [`encode_quadkey`]; works a byte at a time through a 256-entry
/// table computed at compile time.
pub fn decode_quadkey(key: u64) -> (u32, u32) {
    let mut wx: u32 = 0;
    let mut wy: u32 = 0;

    for i in 0..8 {
        let byte = ((key >> (8 * i)) & 0xff) as usize;
        wx |= u32::from(DECODE_X[byte]) << (4 * i);
        wy |= u32::from(DECODE_Y[byte]) << (4 * i);
    }

    (wx, wy)
}

/// Quadkey of a lon/lat point at full resolution.
///
/// Grid coordinates outside `[0, 2^32)` (sanitized degenerate input) keep
/// only their low 32 bits.
pub fn point_quadkey(point: &Point<f64>) -> u64 {
    coord_quadkey(&point.0)
}

fn coord_quadkey(coord: &Coord<f64>) -> u64 {
    let (x, y) = project(coord.x, coord.y, QUADKEY_ZOOM);
    encode_quadkey(x as u32, y as u32)
}

fn push_line(keys: &mut Vec<u64>, line: &LineString<f64>) {
    keys.extend(line.coords().map(coord_quadkey));
}

fn push_polygon(keys: &mut Vec<u64>, poly: &Polygon<f64>) {
    push_line(keys, poly.exterior());
    for ring in poly.interiors() {
        push_line(keys, ring);
    }
}

/// Quadkeys of every vertex of a geometry, in vertex order.
///
/// Polygons contribute all of their rings (closing coordinates included)
/// and a `Rect` contributes its four corners. A `GeometryCollection` is not
/// indexed and yields an empty vector.
pub fn geometry_quadkeys(geom: &Geometry<f64>) -> Vec<u64> {
    let mut keys = Vec::with_capacity(geom.coords_count());

    match geom {
        Geometry::Point(p) => keys.push(point_quadkey(p)),
        Geometry::MultiPoint(mp) => keys.extend(mp.iter().map(point_quadkey)),
        Geometry::Line(line) => {
            keys.push(coord_quadkey(&line.start));
            keys.push(coord_quadkey(&line.end));
        }
        Geometry::LineString(ls) => push_line(&mut keys, ls),
        Geometry::MultiLineString(mls) => {
            for ls in mls {
                push_line(&mut keys, ls);
            }
        }
        Geometry::Polygon(poly) => push_polygon(&mut keys, poly),
        Geometry::MultiPolygon(mp) => {
            for poly in mp {
                push_polygon(&mut keys, poly);
            }
        }
        Geometry::Rect(rect) => {
            let (min, max) = (rect.min(), rect.max());
            keys.push(coord_quadkey(&min));
            keys.push(coord_quadkey(&Coord { x: max.x, y: min.y }));
            keys.push(coord_quadkey(&max));
            keys.push(coord_quadkey(&Coord { x: min.x, y: max.y }));
        }
        Geometry::Triangle(tri) => {
            keys.extend(tri.to_array().iter().map(coord_quadkey));
        }
        Geometry::GeometryCollection(_) => {
            log::trace!("geometry collections are not indexed");
        }
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, line_string, point, polygon, GeometryCollection, MultiPoint, Rect};

    // ========== Projection ==========

    #[test]
    fn test_project_origin() {
        assert_eq!(project(0.0, 0.0, 0), (0, 0));
        assert_eq!(project(0.0, 0.0, 1), (1, 1));
        assert_eq!(project(0.0, 0.0, 32), (1 << 31, 1 << 31));
    }

    #[test]
    fn test_project_quadrants() {
        assert_eq!(project(-90.0, 45.0, 1), (0, 0));
        assert_eq!(project(90.0, 45.0, 1), (1, 0));
        assert_eq!(project(-90.0, -45.0, 1), (0, 1));
        assert_eq!(project(90.0, -45.0, 1), (1, 1));
    }

    #[test]
    fn test_project_antimeridian() {
        // lon 180 lands on the right edge, one past the last column
        assert_eq!(project(180.0, 0.0, 0).0, 1);
        assert_eq!(project(-180.0, 0.0, 3).0, 0);
    }

    #[test]
    fn test_project_non_finite_longitude_uses_sentinel() {
        // Sentinel 720: (720 + 180) / 360 * 16 = 40
        let row = project(0.0, 10.0, 4).1;
        assert_eq!(project(f64::NAN, 10.0, 4), (40, row));
        assert_eq!(project(f64::INFINITY, 10.0, 4), (40, row));
        assert_eq!(project(f64::NEG_INFINITY, 10.0, 4), (40, row));

        // A finite 720 is clamped like any other out-of-range longitude
        assert_eq!(project(720.0, 10.0, 4), project(360.0, 10.0, 4));
        assert_eq!(project(360.0, 10.0, 4).0, 24);
    }

    #[test]
    fn test_project_clamps_longitude() {
        assert_eq!(project(1000.0, 0.0, 4), project(360.0, 0.0, 4));
        assert_eq!(project(-1000.0, 0.0, 4), project(-360.0, 0.0, 4));
    }

    #[test]
    fn test_project_clamps_latitude() {
        assert_eq!(project(0.0, 95.0, 8), project(0.0, 89.9, 8));
        assert_eq!(project(0.0, -95.0, 8), project(0.0, -89.9, 8));
        assert_eq!(project(0.0, f64::NAN, 8), project(0.0, 89.9, 8));
        assert_eq!(project(0.0, f64::NEG_INFINITY, 8), project(0.0, 89.9, 8));
    }

    #[test]
    fn test_world_fraction_scales_to_project() {
        assert_eq!(world_fraction(0.0, 0.0), (0.5, 0.5));
        let (fx, fy) = world_fraction(-122.4, 37.8);
        let n = (1u64 << 14) as f64;
        assert_eq!(project(-122.4, 37.8, 14), ((n * fx) as i64, (n * fy) as i64));
    }

    #[test]
    fn test_unproject_inverts_grid_corners() {
        let (lon, lat) = unproject(0, 0, 0);
        assert!((lon + 180.0).abs() < 1e-9);
        assert!((lat - 85.0511287798).abs() < 1e-6);

        for zoom in [1u8, 5, 12, 20] {
            for (x, y) in [(0i64, 0i64), (1, 1), (3, 2)] {
                let (lon, lat) = unproject(x, y, zoom);
                // Nudge inwards so floor() lands on the same cell
                let eps = 1e-9;
                assert_eq!(project(lon + eps, lat - eps, zoom), (x, y));
            }
        }
    }

    // ========== Quadkeys ==========

    #[test]
    fn test_encode_quadkey_bit_layout() {
        assert_eq!(encode_quadkey(0, 0), 0);
        assert_eq!(encode_quadkey(1, 0), 0b10);
        assert_eq!(encode_quadkey(0, 1), 0b01);
        assert_eq!(encode_quadkey(0x8000_0000, 0x8000_0000), 0xC000_0000_0000_0000);
        assert_eq!(encode_quadkey(u32::MAX, 0), 0xAAAA_AAAA_AAAA_AAAA);
        assert_eq!(encode_quadkey(0, u32::MAX), 0x5555_5555_5555_5555);
        assert_eq!(encode_quadkey(u32::MAX, u32::MAX), u64::MAX);
    }

    #[test]
    fn test_decode_quadkey_roundtrip() {
        let samples = [
            0u32,
            1,
            2,
            3,
            0xff,
            0x1234_5678,
            0x8000_0000,
            0xdead_beef,
            0x7fff_ffff,
            u32::MAX - 1,
            u32::MAX,
        ];
        for &x in &samples {
            for &y in &samples {
                assert_eq!(decode_quadkey(encode_quadkey(x, y)), (x, y));
            }
        }
    }

    #[test]
    fn test_decode_quadkey_walks_every_byte_value() {
        // Place each byte value in every byte position to exercise the table
        for shift in 0..8 {
            for byte in 0u64..256 {
                let key = byte << (8 * shift);
                let (x, y) = decode_quadkey(key);
                assert_eq!(encode_quadkey(x, y), key);
            }
        }
    }

    #[test]
    fn test_quadkey_injective_on_neighbours() {
        let mut keys = Vec::new();
        for x in 1_000_000u32..1_000_016 {
            for y in 2_000_000u32..2_000_016 {
                keys.push(encode_quadkey(x, y));
            }
        }
        let len = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), len);
    }

    #[test]
    fn test_point_quadkey_is_deterministic() {
        let p = point!(x: 2.35, y: 48.85);
        assert_eq!(point_quadkey(&p), point_quadkey(&p));
        assert_ne!(point_quadkey(&p), point_quadkey(&point!(x: 2.36, y: 48.85)));
    }

    #[test]
    fn test_point_quadkey_origin() {
        // (2^31, 2^31) interleaves to the top pair set
        assert_eq!(point_quadkey(&point!(x: 0.0, y: 0.0)), 0xC000_0000_0000_0000);
    }

    // ========== Geometry quadkeys ==========

    #[test]
    fn test_geometry_quadkeys_point_and_multipoint() {
        let p = point!(x: 1.0, y: 2.0);
        assert_eq!(geometry_quadkeys(&Geometry::Point(p)), vec![point_quadkey(&p)]);

        let mp = MultiPoint::new(vec![point!(x: 1.0, y: 2.0), point!(x: 3.0, y: 4.0)]);
        assert_eq!(geometry_quadkeys(&Geometry::MultiPoint(mp)).len(), 2);
    }

    #[test]
    fn test_geometry_quadkeys_polygon_counts_all_rings() {
        let poly = polygon![
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 10.0, y: 0.0),
                (x: 10.0, y: 10.0),
                (x: 0.0, y: 10.0),
                (x: 0.0, y: 0.0),
            ],
            interiors: [
                [
                    (x: 2.0, y: 2.0),
                    (x: 2.0, y: 8.0),
                    (x: 8.0, y: 8.0),
                    (x: 2.0, y: 2.0),
                ],
            ],
        ];
        assert_eq!(geometry_quadkeys(&Geometry::Polygon(poly)).len(), 9);
    }

    #[test]
    fn test_geometry_quadkeys_linestring_order() {
        let ls = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        let keys = geometry_quadkeys(&Geometry::LineString(ls));
        assert_eq!(
            keys,
            vec![
                point_quadkey(&point!(x: 0.0, y: 0.0)),
                point_quadkey(&point!(x: 1.0, y: 1.0))
            ]
        );
    }

    #[test]
    fn test_geometry_quadkeys_rect_corners() {
        let rect = Rect::new(coord! { x: -1.0, y: -1.0 }, coord! { x: 1.0, y: 1.0 });
        let keys = geometry_quadkeys(&Geometry::Rect(rect));
        assert_eq!(keys.len(), 4);
        assert!(keys.contains(&point_quadkey(&point!(x: -1.0, y: 1.0))));
        assert!(keys.contains(&point_quadkey(&point!(x: 1.0, y: -1.0))));
    }

    #[test]
    fn test_geometry_quadkeys_collection_is_empty() {
        let gc = GeometryCollection(vec![Geometry::Point(point!(x: 0.0, y: 0.0))]);
        assert!(geometry_quadkeys(&Geometry::GeometryCollection(gc)).is_empty());
    }
}
