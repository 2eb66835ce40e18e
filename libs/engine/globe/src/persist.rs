// This file is part of Terrella.
//
// Terrella is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Terrella is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Terrella.  If not, see <http://www.gnu.org/licenses/>.

// XML persistence of a body and its layer stacks. The document carries
// the tuning parameters and the constructable layer descriptors; static
// in-memory layers have nothing durable to record and are skipped with a
// note in the log.

use crate::body::{Body, BodyConfig};
use elevation::{ElevationLayer, ElevationSource};
use geo::{Extents, GridSize, ImageSize};
use geodesy::LandModel;
use jobs::JobManager;
use log::debug;
use raster::{LayerContext, NetworkFetcher, RasterLayer, RasterSource};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("xml: {0}")]
    Xml(String),
    #[error("unknown layer kind: {0}")]
    UnknownKind(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandModelDoc {
    pub kind: String,
    pub radius_equator: f64,
    pub radius_polar: f64,
}

impl From<&LandModel> for LandModelDoc {
    fn from(land: &LandModel) -> Self {
        let kind = match land {
            LandModel::Sphere { .. } => "sphere",
            LandModel::Ellipsoid { .. } => "ellipsoid",
        };
        Self {
            kind: kind.to_owned(),
            radius_equator: land.radius_equator(),
            radius_polar: land.radius_polar(),
        }
    }
}

impl From<&LandModelDoc> for LandModel {
    fn from(doc: &LandModelDoc) -> Self {
        if doc.kind == "sphere" {
            LandModel::sphere(doc.radius_equator)
        } else {
            LandModel::Ellipsoid {
                equator: doc.radius_equator,
                polar: doc.radius_polar,
            }
        }
    }
}

fn default_max_level() -> u32 {
    u32::MAX
}

fn default_alpha() -> f32 {
    1.
}

fn default_visible() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerDoc {
    /// Which stack the layer belongs to: "raster" or "elevation".
    pub stack: String,
    /// Transport: "network", "file", or "directory".
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    pub extents: Extents,
    #[serde(default)]
    pub min_level: u32,
    #[serde(default = "default_max_level")]
    pub max_level: u32,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename = "body")]
pub struct BodyDoc {
    pub land_model: LandModelDoc,
    pub max_level: u32,
    pub split_distance: f64,
    pub mesh_size: GridSize,
    pub use_skirts: bool,
    pub use_borders: bool,
    pub image_size: ImageSize,
    pub alpha: f32,
    pub number_of_rows: u32,
    pub number_of_columns: u32,
    pub extents: Extents,
    #[serde(default, rename = "layer")]
    pub layers: Vec<LayerDoc>,
}

pub fn body_to_doc(body: &Body) -> BodyDoc {
    let mut layers = Vec::new();
    for layer in body.raster_layers() {
        match raster_layer_doc(&layer) {
            Some(doc) => layers.push(doc),
            None => debug!("raster layer '{}' is not persistable", layer.name()),
        }
    }
    for layer in body.elevation_layers() {
        match elevation_layer_doc(&layer) {
            Some(doc) => layers.push(doc),
            None => debug!("elevation layer '{}' is not persistable", layer.name()),
        }
    }
    BodyDoc {
        land_model: LandModelDoc::from(body.land_model()),
        max_level: body.max_level(),
        split_distance: body.split_distance(),
        mesh_size: body.mesh_size(),
        use_skirts: body.use_skirts(),
        use_borders: body.use_borders(),
        image_size: body.image_size(),
        alpha: body.alpha(),
        number_of_rows: body.rows(),
        number_of_columns: body.columns(),
        extents: body.extents(),
        layers,
    }
}

pub fn save_body(body: &Body) -> Result<String, PersistError> {
    quick_xml::se::to_string(&body_to_doc(body)).map_err(|err| PersistError::Xml(err.to_string()))
}

pub fn parse_body(xml: &str) -> Result<BodyDoc, PersistError> {
    quick_xml::de::from_str(xml).map_err(|err| PersistError::Xml(err.to_string()))
}

/// Rebuild a body and its constructable layers from a parsed document.
pub fn body_from_doc(
    doc: &BodyDoc,
    jobs: Arc<JobManager>,
    context: LayerContext,
) -> Result<Body, PersistError> {
    let config = BodyConfig {
        rows: doc.number_of_rows,
        columns: doc.number_of_columns,
        extents: doc.extents,
        mesh_size: doc.mesh_size,
        image_size: doc.image_size,
        split_distance: doc.split_distance,
        max_level: doc.max_level,
        use_skirts: doc.use_skirts,
        use_borders: doc.use_borders,
        alpha: doc.alpha,
    };
    let body = Body::new(LandModel::from(&doc.land_model), jobs, config);
    for layer in &doc.layers {
        match layer.stack.as_str() {
            "raster" => body.raster_append(raster_layer_from_doc(layer, context.clone())?),
            "elevation" => {
                body.elevation_append(elevation_layer_from_doc(layer, context.clone())?)
            }
            other => return Err(PersistError::UnknownKind(other.to_owned())),
        }
    }
    Ok(body)
}

fn network_fetcher_from_doc(doc: &LayerDoc) -> Result<NetworkFetcher, PersistError> {
    let url = doc
        .url
        .as_ref()
        .ok_or_else(|| PersistError::UnknownKind("network layer without url".to_owned()))?;
    let mut fetcher = NetworkFetcher::new(url.clone());
    if let Some(timeout_ms) = doc.timeout_ms {
        fetcher = fetcher.with_timeout_ms(timeout_ms);
    }
    if let Some(max_attempts) = doc.max_attempts {
        fetcher = fetcher.with_max_attempts(max_attempts);
    }
    Ok(fetcher)
}

fn raster_layer_from_doc(
    doc: &LayerDoc,
    context: LayerContext,
) -> Result<Arc<RasterLayer>, PersistError> {
    let layer = match doc.kind.as_str() {
        "network" => RasterLayer::network(
            doc.name.clone(),
            network_fetcher_from_doc(doc)?,
            doc.extents,
            context,
        ),
        "file" => {
            let path = doc
                .path
                .as_ref()
                .ok_or_else(|| PersistError::UnknownKind("file layer without path".to_owned()))?;
            RasterLayer::from_file(doc.name.clone(), PathBuf::from(path), doc.extents, context)
        }
        "directory" => {
            let path = doc.path.as_ref().ok_or_else(|| {
                PersistError::UnknownKind("directory layer without path".to_owned())
            })?;
            RasterLayer::from_directory(
                doc.name.clone(),
                PathBuf::from(path),
                doc.extension.clone().unwrap_or_else(|| "png".to_owned()),
                doc.extents,
                context,
            )
        }
        other => return Err(PersistError::UnknownKind(other.to_owned())),
    };
    layer.set_level_range(doc.min_level, doc.max_level);
    layer.set_alpha(doc.alpha);
    layer.set_visible(doc.visible);
    Ok(layer)
}

fn elevation_layer_from_doc(
    doc: &LayerDoc,
    context: LayerContext,
) -> Result<Arc<ElevationLayer>, PersistError> {
    let source = match doc.kind.as_str() {
        "network" => ElevationSource::Network(network_fetcher_from_doc(doc)?),
        "directory" => {
            let path = doc.path.as_ref().ok_or_else(|| {
                PersistError::UnknownKind("directory layer without path".to_owned())
            })?;
            ElevationSource::Directory {
                root: PathBuf::from(path),
            }
        }
        other => return Err(PersistError::UnknownKind(other.to_owned())),
    };
    let layer = ElevationLayer::new(doc.name.clone(), source, doc.extents, context);
    layer.set_level_range(doc.min_level, doc.max_level);
    layer.set_visible(doc.visible);
    Ok(layer)
}

fn raster_layer_doc(layer: &RasterLayer) -> Option<LayerDoc> {
    let (min_level, max_level) = layer.level_range();
    let mut doc = LayerDoc {
        stack: "raster".to_owned(),
        kind: String::new(),
        name: layer.name().to_owned(),
        url: None,
        path: None,
        extension: None,
        extents: layer.extents(),
        min_level,
        max_level,
        alpha: layer.alpha(),
        visible: layer.visible(),
        timeout_ms: None,
        max_attempts: None,
    };
    match layer.source() {
        RasterSource::Network(fetcher) => {
            doc.kind = "network".to_owned();
            doc.url = Some(fetcher.url_template().to_owned());
            doc.timeout_ms = Some(fetcher.timeout_ms());
            doc.max_attempts = Some(fetcher.max_attempts());
        }
        RasterSource::File { path, .. } => {
            doc.kind = "file".to_owned();
            doc.path = Some(path.display().to_string());
        }
        RasterSource::Directory { root, extension } => {
            doc.kind = "directory".to_owned();
            doc.path = Some(root.display().to_string());
            doc.extension = Some(extension.clone());
        }
        RasterSource::Static(_) => return None,
    }
    Some(doc)
}

fn elevation_layer_doc(layer: &ElevationLayer) -> Option<LayerDoc> {
    let mut doc = LayerDoc {
        stack: "elevation".to_owned(),
        kind: String::new(),
        name: layer.name().to_owned(),
        url: None,
        path: None,
        extension: None,
        extents: layer.extents(),
        min_level: 0,
        max_level: default_max_level(),
        alpha: 1.,
        visible: layer.visible(),
        timeout_ms: None,
        max_attempts: None,
    };
    match layer.source() {
        ElevationSource::Network(fetcher) => {
            doc.kind = "network".to_owned();
            doc.url = Some(fetcher.url_template().to_owned());
            doc.timeout_ms = Some(fetcher.timeout_ms());
            doc.max_attempts = Some(fetcher.max_attempts());
        }
        ElevationSource::Directory { root } => {
            doc.kind = "directory".to_owned();
            doc.path = Some(root.display().to_string());
        }
        ElevationSource::Static(_) => return None,
    }
    Some(doc)
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_doc() -> BodyDoc {
        BodyDoc {
            land_model: LandModelDoc {
                kind: "ellipsoid".to_owned(),
                radius_equator: 6378137.,
                radius_polar: 6356752.314245179,
            },
            max_level: 18,
            split_distance: 19134111.,
            mesh_size: GridSize::new(17, 17),
            use_skirts: true,
            use_borders: false,
            image_size: ImageSize::new(256, 256),
            alpha: 1.,
            number_of_rows: 1,
            number_of_columns: 2,
            extents: Extents::WHOLE_GLOBE,
            layers: vec![LayerDoc {
                stack: "raster".to_owned(),
                kind: "network".to_owned(),
                name: "basemap".to_owned(),
                url: Some("http://tiles.example/{level}/{row}/{column}.png".to_owned()),
                path: None,
                extension: None,
                extents: Extents::WHOLE_GLOBE,
                min_level: 0,
                max_level: 18,
                alpha: 1.,
                visible: true,
                timeout_ms: Some(15000),
                max_attempts: Some(3),
            }],
        }
    }

    #[test]
    fn test_document_roundtrip() {
        let doc = sample_doc();
        let xml = quick_xml::se::to_string(&doc).unwrap();
        let parsed: BodyDoc = quick_xml::de::from_str(&xml).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_unknown_layer_kind_is_rejected() {
        let mut doc = sample_doc();
        doc.layers[0].kind = "carrier-pigeon".to_owned();
        let jobs = JobManager::inline();
        let context = LayerContext::new(
            Arc::new(tile_cache::MemoryCache::new()),
            Arc::new(tile_cache::ReaderRegistry::empty()),
        );
        assert!(body_from_doc(&doc, jobs, context).is_err());
    }

    #[test]
    fn test_body_reconstruction_restores_layers_and_tuning() {
        let doc = sample_doc();
        let jobs = JobManager::inline();
        let context = LayerContext::new(
            Arc::new(tile_cache::MemoryCache::new()),
            Arc::new(tile_cache::ReaderRegistry::empty()),
        );
        let body = body_from_doc(&doc, jobs, context).unwrap();
        assert_eq!(body.max_level(), 18);
        assert_eq!(body.top_tiles().len(), 2);
        assert_eq!(body.raster_layers().len(), 1);
        assert_eq!(body.raster_layers()[0].name(), "basemap");

        let saved = body_to_doc(&body);
        assert_eq!(saved.layers, doc.layers);
        assert_eq!(saved.extents, doc.extents);
    }
}
