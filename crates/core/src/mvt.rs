//! MVT (Mapbox Vector Tile) encoding.
//!
//! Geometries arriving here are already in tile-local integer coordinates
//! (see [`crate::simplify::to_tile_local`]). This module turns them into
//! command streams and groups them into a layer with deduplicated key and
//! value tables.
//!
//! - **Zigzag encoding**: signed deltas packed as unsigned varints
//! - **Command encoding**: `MoveTo`, `LineTo`, `ClosePath` with repeat counts
//! - **Layer encoding**: features plus shared keys/values
//!
//! Reference: <https://github.com/mapbox/vector-tile-spec>

use std::collections::HashMap;

use geo::orient::{Direction, Orient};
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Polygon};
use serde_json::Value as JsonValue;

use crate::feature::Properties;
use crate::vector_tile::tile::{Feature, GeomType, Layer, Value};
use crate::vector_tile::Tile;

/// Default tile extent (4096 as per MVT spec)
pub const DEFAULT_EXTENT: u32 = 4096;

/// Layer version written into every tile.
pub const LAYER_VERSION: u32 = 1;

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

// ============================================================================
// Zigzag / command encoding
// ============================================================================

/// Zigzag-encode a signed integer: 0 → 0, -1 → 1, 1 → 2, -2 → 3, ...
#[inline]
pub fn zigzag_encode(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

#[inline]
pub fn zigzag_decode(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Pack a command id with a repeat count: `id | (count << 3)`.
#[inline]
pub fn command_encode(command_id: u32, count: u32) -> u32 {
    (command_id & 0x7) | (count << 3)
}

/// Unpack a command into (command_id, count).
#[inline]
pub fn command_decode(command: u32) -> (u32, u32) {
    (command & 0x7, command >> 3)
}

// ============================================================================
// Geometry encoding
// ============================================================================

/// Cursor-relative command writer. The MVT cursor persists across the
/// parts of one feature, so a single writer is used per feature.
#[derive(Default)]
struct CommandWriter {
    commands: Vec<u32>,
    cursor: (i32, i32),
}

impl CommandWriter {
    fn push_coord(&mut self, c: &Coord<f64>) {
        let (x, y) = (c.x as i32, c.y as i32);
        self.commands.push(zigzag_encode(x - self.cursor.0));
        self.commands.push(zigzag_encode(y - self.cursor.1));
        self.cursor = (x, y);
    }

    fn points<'a>(&mut self, coords: impl ExactSizeIterator<Item = &'a Coord<f64>>) {
        if coords.len() == 0 {
            return;
        }
        self.commands.push(command_encode(CMD_MOVE_TO, coords.len() as u32));
        for c in coords {
            self.push_coord(c);
        }
    }

    fn line(&mut self, line: &LineString<f64>) {
        if line.0.len() < 2 {
            return;
        }
        self.commands.push(command_encode(CMD_MOVE_TO, 1));
        self.push_coord(&line.0[0]);
        self.commands
            .push(command_encode(CMD_LINE_TO, (line.0.len() - 1) as u32));
        for c in &line.0[1..] {
            self.push_coord(c);
        }
    }

    /// A closed ring; the repeated closing coordinate becomes `ClosePath`.
    fn ring(&mut self, ring: &LineString<f64>) {
        if ring.0.len() < 4 {
            return;
        }
        let open = &ring.0[..ring.0.len() - 1];
        self.commands.push(command_encode(CMD_MOVE_TO, 1));
        self.push_coord(&open[0]);
        self.commands
            .push(command_encode(CMD_LINE_TO, (open.len() - 1) as u32));
        for c in &open[1..] {
            self.push_coord(c);
        }
        self.commands.push(command_encode(CMD_CLOSE_PATH, 1));
    }

    fn polygon(&mut self, polygon: &Polygon<f64>) {
        if polygon.exterior().0.len() < 4 {
            return;
        }
        self.ring(polygon.exterior());
        for interior in polygon.interiors() {
            self.ring(interior);
        }
    }
}

/// Orient a polygon for MVT encoding.
///
/// In tile-local coordinates y grows downward, so geo's default direction
/// (exterior counter-clockwise, holes clockwise, positive shoelace area)
/// is what the MVT spec calls a clockwise exterior.
pub fn orient_polygon_for_mvt(polygon: &Polygon<f64>) -> Polygon<f64> {
    polygon.orient(Direction::Default)
}

pub fn orient_multi_polygon_for_mvt(multi: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    multi.orient(Direction::Default)
}

pub fn encode_multi_point(points: &MultiPoint<f64>) -> Vec<u32> {
    let mut w = CommandWriter::default();
    let coords: Vec<&Coord<f64>> = points.iter().map(|p| &p.0).collect();
    w.points(coords.into_iter());
    w.commands
}

pub fn encode_linestring(line: &LineString<f64>) -> Vec<u32> {
    let mut w = CommandWriter::default();
    w.line(line);
    w.commands
}

pub fn encode_multi_linestring(lines: &MultiLineString<f64>) -> Vec<u32> {
    let mut w = CommandWriter::default();
    for line in lines {
        w.line(line);
    }
    w.commands
}

/// Winding order is corrected before encoding.
pub fn encode_polygon(polygon: &Polygon<f64>) -> Vec<u32> {
    let mut w = CommandWriter::default();
    w.polygon(&orient_polygon_for_mvt(polygon));
    w.commands
}

pub fn encode_multi_polygon(polygons: &MultiPolygon<f64>) -> Vec<u32> {
    let mut w = CommandWriter::default();
    for polygon in &orient_multi_polygon_for_mvt(polygons) {
        w.polygon(polygon);
    }
    w.commands
}

/// Encode a tile-local geometry to commands plus its MVT type.
///
/// Geometry collections have no MVT representation and come back as
/// `(vec![], GeomType::Unknown)`; [`LayerBuilder::add_feature`] splits them.
pub fn encode_geometry(geom: &Geometry<f64>) -> (Vec<u32>, GeomType) {
    match geom {
        Geometry::Point(p) => {
            let mut w = CommandWriter::default();
            w.points(std::iter::once(&p.0));
            (w.commands, GeomType::Point)
        }
        Geometry::MultiPoint(mp) => (encode_multi_point(mp), GeomType::Point),
        Geometry::Line(l) => (encode_linestring(&LineString::from(*l)), GeomType::Linestring),
        Geometry::LineString(ls) => (encode_linestring(ls), GeomType::Linestring),
        Geometry::MultiLineString(mls) => (encode_multi_linestring(mls), GeomType::Linestring),
        Geometry::Polygon(p) => (encode_polygon(p), GeomType::Polygon),
        Geometry::MultiPolygon(mp) => (encode_multi_polygon(mp), GeomType::Polygon),
        Geometry::Rect(r) => (encode_polygon(&r.to_polygon()), GeomType::Polygon),
        Geometry::Triangle(t) => (encode_polygon(&t.to_polygon()), GeomType::Polygon),
        Geometry::GeometryCollection(_) => (vec![], GeomType::Unknown),
    }
}

/// Decode a command stream into its paths: one `Vec` per `MoveTo` run for
/// lines and polygons, one per point for points. Used for inspection.
pub fn decode_geometry(commands: &[u32]) -> Vec<Vec<(i32, i32)>> {
    let mut paths: Vec<Vec<(i32, i32)>> = Vec::new();
    let mut cursor = (0i32, 0i32);
    let mut i = 0;

    while i < commands.len() {
        let (id, count) = command_decode(commands[i]);
        i += 1;
        match id {
            CMD_MOVE_TO | CMD_LINE_TO => {
                for _ in 0..count {
                    let (Some(&dx), Some(&dy)) = (commands.get(i), commands.get(i + 1)) else {
                        return paths;
                    };
                    i += 2;
                    cursor = (cursor.0 + zigzag_decode(dx), cursor.1 + zigzag_decode(dy));
                    if id == CMD_MOVE_TO || paths.is_empty() {
                        paths.push(vec![cursor]);
                    } else if let Some(path) = paths.last_mut() {
                        path.push(cursor);
                    }
                }
            }
            CMD_CLOSE_PATH => {
                if let Some(path) = paths.last_mut() {
                    if let Some(&first) = path.first() {
                        path.push(first);
                    }
                }
            }
            _ => return paths,
        }
    }
    paths
}

// ============================================================================
// Attribute values
// ============================================================================

/// A property value that can be encoded in MVT.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Double(f64),
    Int(i64),
    UInt(u64),
    Bool(bool),
}

/// Hashable identity of a [`PropertyValue`] for value-table deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ValueKey {
    String(String),
    Double(u64),
    Int(i64),
    UInt(u64),
    Bool(bool),
}

impl PropertyValue {
    /// Map an attribute value. `null` has no MVT counterpart and yields
    /// `None`; arrays and objects are carried as their JSON text.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(b) => Some(Self::Bool(*b)),
            JsonValue::String(s) => Some(Self::String(s.clone())),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(if i < 0 { Self::Int(i) } else { Self::UInt(i as u64) })
                } else if let Some(u) = n.as_u64() {
                    Some(Self::UInt(u))
                } else {
                    n.as_f64().map(Self::Double)
                }
            }
            JsonValue::Array(_) | JsonValue::Object(_) => Some(Self::String(value.to_string())),
        }
    }

    pub fn to_mvt_value(&self) -> Value {
        match self {
            PropertyValue::String(s) => Value {
                string_value: Some(s.clone()),
                ..Default::default()
            },
            PropertyValue::Double(d) => Value {
                double_value: Some(*d),
                ..Default::default()
            },
            PropertyValue::Int(i) => Value {
                int_value: Some(*i),
                ..Default::default()
            },
            PropertyValue::UInt(u) => Value {
                uint_value: Some(*u),
                ..Default::default()
            },
            PropertyValue::Bool(b) => Value {
                bool_value: Some(*b),
                ..Default::default()
            },
        }
    }

    fn key(&self) -> ValueKey {
        match self {
            PropertyValue::String(s) => ValueKey::String(s.clone()),
            PropertyValue::Double(d) => ValueKey::Double(d.to_bits()),
            PropertyValue::Int(i) => ValueKey::Int(*i),
            PropertyValue::UInt(u) => ValueKey::UInt(*u),
            PropertyValue::Bool(b) => ValueKey::Bool(*b),
        }
    }
}

// ============================================================================
// Layer / tile builders
// ============================================================================

/// Builder for encoding features into an MVT layer.
pub struct LayerBuilder {
    name: String,
    extent: u32,
    features: Vec<Feature>,
    keys: Vec<String>,
    key_index: HashMap<String, u32>,
    values: Vec<Value>,
    value_index: HashMap<ValueKey, u32>,
}

impl LayerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extent: DEFAULT_EXTENT,
            features: Vec::new(),
            keys: Vec::new(),
            key_index: HashMap::new(),
            values: Vec::new(),
            value_index: HashMap::new(),
        }
    }

    pub fn with_extent(mut self, extent: u32) -> Self {
        self.extent = extent;
        self
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    fn key_idx(&mut self, key: &str) -> u32 {
        if let Some(&idx) = self.key_index.get(key) {
            return idx;
        }
        let idx = self.keys.len() as u32;
        self.keys.push(key.to_string());
        self.key_index.insert(key.to_string(), idx);
        idx
    }

    fn value_idx(&mut self, value: &PropertyValue) -> u32 {
        let key = value.key();
        if let Some(&idx) = self.value_index.get(&key) {
            return idx;
        }
        let idx = self.values.len() as u32;
        self.values.push(value.to_mvt_value());
        self.value_index.insert(key, idx);
        idx
    }

    /// Add a feature whose geometry is already in tile-local coordinates.
    ///
    /// Geometry collections become one MVT feature per member, all sharing
    /// the id and tags. Geometries that encode to no commands are skipped.
    pub fn add_feature(
        &mut self,
        id: Option<u64>,
        geometry: &Geometry<f64>,
        properties: &Properties,
    ) {
        if let Geometry::GeometryCollection(gc) = geometry {
            for member in gc {
                self.add_feature(id, member, properties);
            }
            return;
        }

        let (commands, geom_type) = encode_geometry(geometry);
        if commands.is_empty() {
            return;
        }

        let mut tags = Vec::with_capacity(properties.len() * 2);
        for (key, value) in properties {
            let Some(value) = PropertyValue::from_json(value) else {
                continue;
            };
            tags.push(self.key_idx(key));
            tags.push(self.value_idx(&value));
        }

        self.features.push(Feature {
            id,
            tags,
            r#type: Some(geom_type as i32),
            geometry: commands,
        });
    }

    pub fn build(self) -> Layer {
        Layer {
            version: LAYER_VERSION,
            name: self.name,
            features: self.features,
            keys: self.keys,
            values: self.values,
            extent: Some(self.extent),
        }
    }
}

/// Builder for encoding multiple layers into an MVT tile.
#[derive(Default)]
pub struct TileBuilder {
    layers: Vec<Layer>,
}

impl TileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn build(self) -> Tile {
        Tile {
            layers: self.layers,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
