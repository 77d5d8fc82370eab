//! Geometry clipping to padded tile bounds.
//!
//! Every function here borrows its input and returns a newly owned geometry,
//! so sibling tiles can clip the same parent features concurrently.
//!
//! Polygons go through Sutherland-Hodgman against the axis-aligned bound.
//! Rings that self-intersect fall back to `BooleanOps::intersection`, which
//! stays correct on bowties and spikes at the cost of speed. Lines use
//! `BooleanOps::clip` so a line leaving and re-entering the tile becomes a
//! multi-line.

use geo::{
    line_intersection::{line_intersection, LineIntersection},
    BooleanOps, BoundingRect, Coord, Geometry, GeometryCollection, Line, LineString,
    MapCoordsInPlace, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};

use crate::feature::Feature;
use crate::tile::TileBounds;

/// Clip a geometry to `bounds` grown by `pad` degrees on every side.
///
/// Returns `None` when nothing of the geometry lies inside the padded bound.
pub fn clip_geometry(geom: &Geometry<f64>, bounds: &TileBounds, pad: f64) -> Option<Geometry<f64>> {
    let padded = bounds.padded(pad);
    clip_to(geom, &padded)
}

/// Clip one feature, keeping its id and attributes.
pub fn clip_feature(feature: &Feature, bounds: &TileBounds, pad: f64) -> Option<Feature> {
    clip_geometry(&feature.geometry, bounds, pad).map(|g| feature.with_geometry(g))
}

/// Clip every feature, dropping the ones with nothing left.
pub fn clip_features<'a, I>(features: I, bounds: &TileBounds, pad: f64) -> Vec<Feature>
where
    I: IntoIterator<Item = &'a Feature>,
{
    let padded = bounds.padded(pad);
    features
        .into_iter()
        .filter_map(|f| clip_to(&f.geometry, &padded).map(|g| f.with_geometry(g)))
        .collect()
}

fn clip_to(geom: &Geometry<f64>, bounds: &TileBounds) -> Option<Geometry<f64>> {
    let rect = geom.bounding_rect()?;
    if !bounds.intersects_rect(&rect) {
        return None;
    }

    match geom {
        Geometry::Point(p) => clip_point(p, bounds).map(Geometry::Point),
        Geometry::MultiPoint(mp) => clip_multipoint(mp, bounds),
        Geometry::Line(line) => clip_linestring(&LineString::from(*line), bounds),
        Geometry::LineString(ls) => clip_linestring(ls, bounds),
        Geometry::MultiLineString(mls) => clip_multilinestring(mls, bounds),
        Geometry::Polygon(poly) => clip_polygon(poly, bounds),
        Geometry::MultiPolygon(mp) => clip_multipolygon(mp, bounds).map(Geometry::MultiPolygon),
        Geometry::Rect(r) => clip_polygon(&r.to_polygon(), bounds),
        Geometry::Triangle(t) => clip_polygon(&t.to_polygon(), bounds),
        Geometry::GeometryCollection(gc) => {
            let parts: Vec<Geometry<f64>> =
                gc.iter().filter_map(|g| clip_to(g, bounds)).collect();
            if parts.is_empty() {
                None
            } else {
                Some(Geometry::GeometryCollection(GeometryCollection(parts)))
            }
        }
    }
}

fn point_inside(c: &Coord<f64>, bounds: &TileBounds) -> bool {
    c.x >= bounds.lng_min && c.x <= bounds.lng_max && c.y >= bounds.lat_min && c.y <= bounds.lat_max
}

/// Clip a point to bounds (closed-interval containment)
fn clip_point(point: &Point<f64>, bounds: &TileBounds) -> Option<Point<f64>> {
    point_inside(&point.0, bounds).then_some(*point)
}

fn clip_multipoint(mp: &MultiPoint<f64>, bounds: &TileBounds) -> Option<Geometry<f64>> {
    let kept: Vec<Point<f64>> = mp.iter().filter_map(|p| clip_point(p, bounds)).collect();
    match kept.len() {
        0 => None,
        1 => Some(Geometry::Point(kept[0])),
        _ => Some(Geometry::MultiPoint(MultiPoint::new(kept))),
    }
}

fn clip_linestring(ls: &LineString<f64>, bounds: &TileBounds) -> Option<Geometry<f64>> {
    if let Some(rect) = ls.bounding_rect() {
        if bounds.contains_rect(&rect) {
            return Some(Geometry::LineString(ls.clone()));
        }
    }

    // polygon.clip(&multilinestring, invert): invert=false keeps the inside
    let mls = MultiLineString::new(vec![ls.clone()]);
    let mut clipped = bounds.to_rect().to_polygon().clip(&mls, false);
    clamp_into(&mut clipped, bounds);
    clipped.0.retain(|part| part.0.len() >= 2);

    match clipped.0.len() {
        0 => None,
        1 => clipped.0.pop().map(Geometry::LineString),
        _ => Some(Geometry::MultiLineString(clipped)),
    }
}

fn clip_multilinestring(mls: &MultiLineString<f64>, bounds: &TileBounds) -> Option<Geometry<f64>> {
    if let Some(rect) = mls.bounding_rect() {
        if bounds.contains_rect(&rect) {
            return Some(Geometry::MultiLineString(mls.clone()));
        }
    }

    let mut clipped = bounds.to_rect().to_polygon().clip(mls, false);
    clamp_into(&mut clipped, bounds);
    clipped.0.retain(|part| part.0.len() >= 2);

    if clipped.0.is_empty() {
        None
    } else {
        Some(Geometry::MultiLineString(clipped))
    }
}

/// Clip a polygon to bounds.
///
/// Returns `Geometry::MultiPolygon` when the cut separates the polygon into
/// disconnected parts (only possible on the `BooleanOps` path).
fn clip_polygon(poly: &Polygon<f64>, bounds: &TileBounds) -> Option<Geometry<f64>> {
    let rect = poly.bounding_rect()?;
    if !bounds.intersects_rect(&rect) {
        return None;
    }
    if bounds.contains_rect(&rect) {
        return Some(Geometry::Polygon(poly.clone()));
    }

    if polygon_is_simple(poly) {
        clip_polygon_sutherland_hodgman(poly, bounds)
    } else {
        log::trace!("Self-intersecting polygon, clipping with BooleanOps");
        clip_polygon_boolean_ops(poly, bounds)
    }
}

fn clip_polygon_sutherland_hodgman(
    poly: &Polygon<f64>,
    bounds: &TileBounds,
) -> Option<Geometry<f64>> {
    let exterior = sutherland_hodgman_clip(poly.exterior(), bounds);
    if exterior.0.len() < 4 {
        return None;
    }

    let interiors = poly
        .interiors()
        .iter()
        .map(|ring| sutherland_hodgman_clip(ring, bounds))
        .filter(|ring| ring.0.len() >= 4)
        .collect();

    Some(Geometry::Polygon(Polygon::new(exterior, interiors)))
}

fn clip_polygon_boolean_ops(poly: &Polygon<f64>, bounds: &TileBounds) -> Option<Geometry<f64>> {
    let mut result: MultiPolygon<f64> = poly.intersection(&bounds.to_rect().to_polygon());
    clamp_into(&mut result, bounds);

    match result.0.len() {
        0 => None,
        1 => result.0.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(result)),
    }
}

/// `BooleanOps` output can land a few ulps past the clip edge; pull every
/// coordinate back onto `bounds`.
fn clamp_into<G: MapCoordsInPlace<f64>>(geom: &mut G, bounds: &TileBounds) {
    geom.map_coords_in_place(|c| Coord {
        x: c.x.clamp(bounds.lng_min, bounds.lng_max),
        y: c.y.clamp(bounds.lat_min, bounds.lat_max),
    });
}

fn clip_multipolygon(mp: &MultiPolygon<f64>, bounds: &TileBounds) -> Option<MultiPolygon<f64>> {
    let rect = mp.bounding_rect()?;
    if bounds.contains_rect(&rect) {
        return Some(mp.clone());
    }

    let mut parts = Vec::new();
    for poly in &mp.0 {
        match clip_polygon(poly, bounds) {
            Some(Geometry::Polygon(p)) => parts.push(p),
            Some(Geometry::MultiPolygon(m)) => parts.extend(m.0),
            _ => {}
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(MultiPolygon::new(parts))
    }
}

/// Sutherland-Hodgman against the four edges of an axis-aligned bound.
/// The returned ring is closed unless it is empty.
fn sutherland_hodgman_clip(ring: &LineString<f64>, bounds: &TileBounds) -> LineString<f64> {
    let mut output: Vec<Coord<f64>> = ring.0.clone();

    output = clip_against_edge(
        &output,
        |c| c.x >= bounds.lng_min,
        |c1, c2| {
            let t = (bounds.lng_min - c1.x) / (c2.x - c1.x);
            Coord { x: bounds.lng_min, y: c1.y + t * (c2.y - c1.y) }
        },
    );
    output = clip_against_edge(
        &output,
        |c| c.x <= bounds.lng_max,
        |c1, c2| {
            let t = (bounds.lng_max - c1.x) / (c2.x - c1.x);
            Coord { x: bounds.lng_max, y: c1.y + t * (c2.y - c1.y) }
        },
    );
    output = clip_against_edge(
        &output,
        |c| c.y >= bounds.lat_min,
        |c1, c2| {
            let t = (bounds.lat_min - c1.y) / (c2.y - c1.y);
            Coord { x: c1.x + t * (c2.x - c1.x), y: bounds.lat_min }
        },
    );
    output = clip_against_edge(
        &output,
        |c| c.y <= bounds.lat_max,
        |c1, c2| {
            let t = (bounds.lat_max - c1.y) / (c2.y - c1.y);
            Coord { x: c1.x + t * (c2.x - c1.x), y: bounds.lat_max }
        },
    );

    if !output.is_empty() && output.first() != output.last() {
        output.push(output[0]);
    }

    LineString::new(output)
}

fn clip_against_edge<F, I>(vertices: &[Coord<f64>], inside: F, intersect: I) -> Vec<Coord<f64>>
where
    F: Fn(&Coord<f64>) -> bool,
    I: Fn(&Coord<f64>, &Coord<f64>) -> Coord<f64>,
{
    let mut output = Vec::with_capacity(vertices.len());

    for (i, current) in vertices.iter().enumerate() {
        let next = &vertices[(i + 1) % vertices.len()];
        match (inside(current), inside(next)) {
            (true, true) => output.push(*current),
            (true, false) => {
                output.push(*current);
                output.push(intersect(current, next));
            }
            (false, true) => output.push(intersect(current, next)),
            (false, false) => {}
        }
    }

    output
}

/// No ring of the polygon touches or crosses itself.
fn polygon_is_simple(poly: &Polygon<f64>) -> bool {
    std::iter::once(poly.exterior())
        .chain(poly.interiors())
        .all(|ring| !has_spike(ring) && !has_self_intersection(ring))
}

/// A vertex repeated at non-adjacent positions, e.g. `A → B → C → B → D`.
fn has_spike(ring: &LineString<f64>) -> bool {
    let coords = &ring.0;
    let n = if coords.first() == coords.last() {
        coords.len().saturating_sub(1)
    } else {
        coords.len()
    };

    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            if coords[i] == coords[j] {
                return true;
            }
        }
    }
    false
}

/// Any two non-adjacent edges cross or overlap.
fn has_self_intersection(ring: &LineString<f64>) -> bool {
    let coords = &ring.0;
    let len = coords.len();
    if len < 4 {
        return false;
    }
    let edges = if coords.first() == coords.last() { len - 1 } else { len };

    for i in 0..edges {
        let a = Line::new(coords[i], coords[(i + 1) % len]);
        for j in (i + 2)..edges {
            if i == 0 && j == edges - 1 {
                continue;
            }
            let b = Line::new(coords[j], coords[(j + 1) % len]);
            match line_intersection(a, b) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    let at_a = intersection == a.start || intersection == a.end;
                    let at_b = intersection == b.start || intersection == b.end;
                    if !(at_a && at_b) {
                        return true;
                    }
                }
                Some(LineIntersection::Collinear { .. }) => return true,
                None => {}
            }
        }
    }
    false
}
