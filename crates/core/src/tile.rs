//! Tile addressing and geographic tile bounds.
//!
//! Tiles are addressed in the XYZ scheme (row 0 at the top). The tile store
//! uses the TMS scheme (row 0 at the bottom); [`TileCoord::tms_row`] does the
//! conversion.

use std::f64::consts::PI;
use std::fmt;

use geo::Rect;

/// Deepest zoom level a tile address may carry (exclusive).
pub const MAX_ZOOM: u8 = 32;

/// Tile coordinates: x, y, and zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    /// Create a new tile coordinate
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Number of tiles along one axis at this zoom.
    fn axis_len(&self) -> u64 {
        1u64 << self.z
    }

    /// Whether zoom is in `[0, 32)` and x/y are in `[0, 2^z)`.
    pub fn is_valid(&self) -> bool {
        self.z < MAX_ZOOM
            && u64::from(self.x) < self.axis_len()
            && u64::from(self.y) < self.axis_len()
    }

    /// The four quadrants at `z + 1`, in (0,0), (1,0), (0,1), (1,1) order.
    pub fn children(&self) -> [TileCoord; 4] {
        let (x, y, z) = (self.x * 2, self.y * 2, self.z + 1);
        [
            TileCoord::new(x, y, z),
            TileCoord::new(x + 1, y, z),
            TileCoord::new(x, y + 1, z),
            TileCoord::new(x + 1, y + 1, z),
        ]
    }

    /// Row index with the origin at the bottom-left (MBTiles/TMS convention).
    pub fn tms_row(&self) -> u32 {
        ((self.axis_len() - 1) - u64::from(self.y)) as u32
    }

    /// Get the bounding box of this tile in geographic coordinates (lng/lat)
    pub fn bounds(&self) -> TileBounds {
        let n = 2_f64.powi(self.z as i32);
        let lng_min = (self.x as f64) / n * 360.0 - 180.0;
        let lng_max = (self.x as f64 + 1.0) / n * 360.0 - 180.0;

        let lat_rad = |y: f64| {
            let y_rad = PI * (1.0 - 2.0 * y / n);
            y_rad.sinh().atan().to_degrees()
        };

        let lat_max = lat_rad(self.y as f64);
        let lat_min = lat_rad(self.y as f64 + 1.0);

        TileBounds {
            lng_min,
            lat_min,
            lng_max,
            lat_max,
        }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Padding, in degrees, applied around a tile at `zoom` before clipping.
///
/// `buffer_pixels` is measured on a tile `extent` units wide, so the pad
/// halves with every zoom level: `360 * buffer / extent / 2^zoom`.
pub fn padding_degrees(zoom: u8, buffer_pixels: u32, extent: u32) -> f64 {
    360.0 * f64::from(buffer_pixels) / f64::from(extent) / 2_f64.powi(i32::from(zoom))
}

/// Geographic bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub lng_min: f64,
    pub lat_min: f64,
    pub lng_max: f64,
    pub lat_max: f64,
}

impl TileBounds {
    /// Create a new bounding box
    pub fn new(lng_min: f64, lat_min: f64, lng_max: f64, lat_max: f64) -> Self {
        Self {
            lng_min,
            lat_min,
            lng_max,
            lat_max,
        }
    }

    /// Create an empty/invalid bounding box
    pub fn empty() -> Self {
        Self {
            lng_min: f64::INFINITY,
            lat_min: f64::INFINITY,
            lng_max: f64::NEG_INFINITY,
            lat_max: f64::NEG_INFINITY,
        }
    }

    /// Check if this is a valid bounding box
    pub fn is_valid(&self) -> bool {
        self.lng_min <= self.lng_max && self.lat_min <= self.lat_max
    }

    /// Expand this bounding box to include another
    pub fn expand(&mut self, other: &Self) {
        self.lng_min = self.lng_min.min(other.lng_min);
        self.lat_min = self.lat_min.min(other.lat_min);
        self.lng_max = self.lng_max.max(other.lng_max);
        self.lat_max = self.lat_max.max(other.lat_max);
    }

    /// A copy grown by `pad` degrees on every side.
    pub fn padded(&self, pad: f64) -> Self {
        Self {
            lng_min: self.lng_min - pad,
            lat_min: self.lat_min - pad,
            lng_max: self.lng_max + pad,
            lat_max: self.lat_max + pad,
        }
    }

    /// Closed-interval overlap test against a geometry's bounding rectangle.
    pub fn intersects_rect(&self, rect: &Rect<f64>) -> bool {
        rect.max().x >= self.lng_min
            && rect.min().x <= self.lng_max
            && rect.max().y >= self.lat_min
            && rect.min().y <= self.lat_max
    }

    /// Whether `rect` lies entirely inside these bounds.
    pub fn contains_rect(&self, rect: &Rect<f64>) -> bool {
        rect.min().x >= self.lng_min
            && rect.max().x <= self.lng_max
            && rect.min().y >= self.lat_min
            && rect.max().y <= self.lat_max
    }

    pub(crate) fn to_rect(self) -> Rect<f64> {
        Rect::new(
            geo::coord! { x: self.lng_min, y: self.lat_min },
            geo::coord! { x: self.lng_max, y: self.lat_max },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn test_tile_bounds() {
        // Tile 0,0,0 should cover the whole world
        let tile = TileCoord::new(0, 0, 0);
        let bounds = tile.bounds();

        assert!((bounds.lng_min - (-180.0)).abs() < 0.0001);
        assert!((bounds.lng_max - 180.0).abs() < 0.0001);
        // Lat bounds are Web Mercator limits (~85.05 degrees)
        assert!(bounds.lat_min < -85.0);
        assert!(bounds.lat_max > 85.0);
    }

    #[test]
    fn test_zoom_one_quadrants() {
        let nw = TileCoord::new(0, 0, 1).bounds();
        assert!((nw.lng_max - 0.0).abs() < 1e-9);
        assert!((nw.lat_min - 0.0).abs() < 1e-9);

        let se = TileCoord::new(1, 1, 1).bounds();
        assert!((se.lng_min - 0.0).abs() < 1e-9);
        assert!((se.lat_max - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_is_valid() {
        assert!(TileCoord::new(0, 0, 0).is_valid());
        assert!(TileCoord::new(3, 3, 2).is_valid());
        assert!(!TileCoord::new(4, 0, 2).is_valid());
        assert!(!TileCoord::new(0, 1, 0).is_valid());
        assert!(!TileCoord::new(0, 0, 32).is_valid());
        assert!(!TileCoord::new(u32::MAX, u32::MAX, 31).is_valid());
        assert!(TileCoord::new((1 << 31) - 1, 0, 31).is_valid());
    }

    #[test]
    fn test_children() {
        let children = TileCoord::new(1, 2, 3).children();
        assert_eq!(
            children,
            [
                TileCoord::new(2, 4, 4),
                TileCoord::new(3, 4, 4),
                TileCoord::new(2, 5, 4),
                TileCoord::new(3, 5, 4),
            ]
        );

        // Children tile their parent exactly
        let parent = TileCoord::new(1, 2, 3).bounds();
        let mut union = TileBounds::empty();
        for child in &children {
            union.expand(&child.bounds());
        }
        assert!((union.lng_min - parent.lng_min).abs() < 1e-9);
        assert!((union.lng_max - parent.lng_max).abs() < 1e-9);
        assert!((union.lat_min - parent.lat_min).abs() < 1e-9);
        assert!((union.lat_max - parent.lat_max).abs() < 1e-9);
    }

    #[test]
    fn test_tms_row() {
        assert_eq!(TileCoord::new(0, 0, 0).tms_row(), 0);
        assert_eq!(TileCoord::new(0, 0, 1).tms_row(), 1);
        assert_eq!(TileCoord::new(0, 1, 1).tms_row(), 0);
        assert_eq!(TileCoord::new(5, 2, 3).tms_row(), 5);

        for z in 0..12u8 {
            let max = (1u32 << z) - 1;
            for y in [0, max / 2, max] {
                let row = TileCoord::new(0, y, z).tms_row();
                assert_eq!(row, max - y);
                assert!(row <= max);
            }
        }

        // Deepest zoom does not overflow
        assert_eq!(TileCoord::new(0, 0, 31).tms_row(), (1u32 << 31) - 1);
    }

    #[test]
    fn test_padding_degrees() {
        // 360 * 64 / 4096 = 5.625 degrees at zoom 0
        assert!((padding_degrees(0, 64, 4096) - 5.625).abs() < 1e-12);
        assert!((padding_degrees(1, 64, 4096) - 2.8125).abs() < 1e-12);
        assert!((padding_degrees(10, 64, 4096) - 5.625 / 1024.0).abs() < 1e-12);
    }

    #[test]
    fn test_padded_and_intersects() {
        let bounds = TileBounds::new(0.0, 0.0, 10.0, 10.0);
        let outside = Rect::new(coord! { x: 11.0, y: 5.0 }, coord! { x: 12.0, y: 6.0 });
        assert!(!bounds.intersects_rect(&outside));
        assert!(bounds.padded(1.5).intersects_rect(&outside));

        let touching = Rect::new(coord! { x: 10.0, y: 10.0 }, coord! { x: 12.0, y: 12.0 });
        assert!(bounds.intersects_rect(&touching));
    }

    #[test]
    fn test_contains_rect() {
        let bounds = TileBounds::new(0.0, 0.0, 10.0, 10.0);
        let inside = Rect::new(coord! { x: 1.0, y: 1.0 }, coord! { x: 9.0, y: 9.0 });
        let partial = Rect::new(coord! { x: 5.0, y: 5.0 }, coord! { x: 15.0, y: 9.0 });
        assert!(bounds.contains_rect(&inside));
        assert!(!bounds.contains_rect(&partial));
    }

    #[test]
    fn test_bbox_expand() {
        let mut bbox1 = TileBounds::new(-10.0, -10.0, 10.0, 10.0);
        let bbox2 = TileBounds::new(-20.0, -5.0, 5.0, 15.0);

        bbox1.expand(&bbox2);

        assert_eq!(bbox1.lng_min, -20.0);
        assert_eq!(bbox1.lat_min, -10.0);
        assert_eq!(bbox1.lng_max, 10.0);
        assert_eq!(bbox1.lat_max, 15.0);
    }

    #[test]
    fn test_bbox_empty() {
        let bbox = TileBounds::empty();
        assert!(!bbox.is_valid());

        let mut bbox = TileBounds::empty();
        bbox.expand(&TileBounds::new(-10.0, -10.0, 10.0, 10.0));
        assert!(bbox.is_valid());
        assert_eq!(bbox.lng_min, -10.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(TileCoord::new(3, 5, 4).to_string(), "4/3/5");
    }
}
