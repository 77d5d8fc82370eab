//! In-memory feature collections fed to the tiler.

use geo::{BoundingRect, CoordsIter, Geometry};
use geojson::GeoJson;
use serde_json::{Map, Value};

use crate::tile::TileBounds;
use crate::{Error, Result};

/// Attribute map carried by a feature: name → scalar or structured value.
pub type Properties = Map<String, Value>;

/// A geometry in lon/lat degrees plus its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<u64>,
    pub geometry: Geometry<f64>,
    pub properties: Properties,
}

impl Feature {
    /// A feature with no id and no attributes.
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            id: None,
            geometry: geometry.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Set one attribute, replacing any previous value under `key`.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Same feature, different geometry. Used for clipped copies.
    pub fn with_geometry(&self, geometry: Geometry<f64>) -> Self {
        Self {
            id: self.id,
            geometry,
            properties: self.properties.clone(),
        }
    }

    /// Geographic bounds, or `None` for an empty geometry.
    pub fn bounds(&self) -> Option<TileBounds> {
        self.geometry.bounding_rect().map(|rect| {
            TileBounds::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
        })
    }

    /// Number of vertices in the geometry.
    pub fn vertex_count(&self) -> usize {
        self.geometry.coords_count()
    }
}

/// An ordered set of features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Bounds of every feature combined. Invalid (see
    /// [`TileBounds::is_valid`]) when the collection has no geometry.
    pub fn bounds(&self) -> TileBounds {
        let mut bounds = TileBounds::empty();
        for b in self.features.iter().filter_map(Feature::bounds) {
            bounds.expand(&b);
        }
        bounds
    }

    /// Total vertex count over all features.
    pub fn vertex_count(&self) -> usize {
        self.features.iter().map(Feature::vertex_count).sum()
    }

    /// Parse GeoJSON text (a FeatureCollection, a Feature, or a bare
    /// Geometry) into features.
    ///
    /// Features without a geometry, or whose geometry cannot be converted,
    /// are skipped with a warning.
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let geojson: GeoJson = text
            .parse()
            .map_err(|e| Error::GeoJson(format!("Failed to parse GeoJSON: {}", e)))?;

        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(g) => vec![geojson::Feature {
                geometry: Some(g),
                ..Default::default()
            }],
        };

        let mut collection = FeatureCollection::default();
        for (idx, feature) in features.into_iter().enumerate() {
            match convert_feature(feature) {
                Ok(Some(f)) => collection.push(f),
                Ok(None) => log::warn!("Skipping feature {} without geometry", idx),
                Err(e) => log::warn!("Skipping feature {}: {}", idx, e),
            }
        }

        log::debug!("Loaded {} features from GeoJSON", collection.len());
        Ok(collection)
    }
}

fn convert_feature(feature: geojson::Feature) -> Result<Option<Feature>> {
    let Some(geometry) = feature.geometry else {
        return Ok(None);
    };

    let geometry: Geometry<f64> = geometry
        .try_into()
        .map_err(|e: geojson::Error| Error::GeoJson(e.to_string()))?;

    let id = match feature.id {
        Some(geojson::feature::Id::Number(n)) => n.as_u64(),
        _ => None,
    };

    Ok(Some(Feature {
        id,
        geometry,
        properties: feature.properties.unwrap_or_default(),
    }))
}

impl From<Vec<Feature>> for FeatureCollection {
    fn from(features: Vec<Feature>) -> Self {
        Self::new(features)
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}
