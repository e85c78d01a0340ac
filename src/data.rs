use crate::error::DataLoadError;
use crate::types::{Color, Region, RegionId};
use geo::bounding_rect::BoundingRect;
use geo::{Coord, MultiPolygon, Rect};
use geojson::GeoJson;
use shapefile::dbase::FieldValue;
use shapefile::Reader;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Where a map's regions come from and which property names them.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub path: PathBuf,
    pub name_field: String,
}

/// The regions of one map, in load order, with their current colors.
#[derive(Debug, Clone)]
pub struct RegionStore {
    regions: Vec<Region>,
    default_color: Color,
}

impl RegionStore {
    pub fn load(source: &SourceSpec, default_color: Color) -> Result<Self, DataLoadError> {
        let features = read_features(source)?;
        Self::from_features(&source.path, features, default_color)
    }

    /// Builds a store from already-decoded `(name, geometry)` pairs.
    pub fn from_features(
        path: &Path,
        features: Vec<(String, MultiPolygon<f64>)>,
        default_color: Color,
    ) -> Result<Self, DataLoadError> {
        if features.is_empty() {
            return Err(DataLoadError::Empty {
                path: path.to_path_buf(),
            });
        }

        let regions = features
            .into_iter()
            .enumerate()
            .map(|(i, (name, geometry))| Region {
                id: RegionId(i),
                name,
                geometry,
                color: default_color,
            })
            .collect();

        Ok(Self {
            regions,
            default_color,
        })
    }

    pub fn default_color(&self) -> Color {
        self.default_color
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.0)
    }

    /// Regions in load order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Changes one region's color. Unknown ids are ignored.
    pub fn set_color(&mut self, id: RegionId, color: Color) {
        if let Some(region) = self.regions.get_mut(id.0) {
            region.color = color;
        }
    }

    pub fn colors(&self) -> impl Iterator<Item = (&Region, Color)> + '_ {
        self.regions.iter().map(|r| (r, r.color))
    }

    /// Bounding rectangle over every region, or `None` for degenerate geometry.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.regions
            .iter()
            .filter_map(|r| r.geometry.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            })
    }
}

/// Property fields and polygon count of a vector source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub fields: BTreeSet<String>,
    pub polygon_features: usize,
}

pub fn inspect_source(path: &Path) -> Result<SourceSummary, DataLoadError> {
    let mut fields = BTreeSet::new();
    let mut polygon_features = 0;

    match source_format(path)? {
        Format::GeoJson => {
            for feature in read_geojson_features(path)? {
                if let Some(props) = &feature.properties {
                    fields.extend(props.keys().cloned());
                }
                if let Some(geometry) = &feature.geometry {
                    if matches!(
                        geometry.value,
                        geojson::Value::Polygon(_) | geojson::Value::MultiPolygon(_)
                    ) {
                        polygon_features += 1;
                    }
                }
            }
        }
        Format::Shapefile => {
            let dbf = shapefile::dbase::Reader::from_path(path.with_extension("dbf"))
                .map_err(|e| parse_error(path, e))?;
            fields.extend(dbf.fields().iter().map(|f| f.name().to_string()));

            let mut reader = open_shapefile(path)?;
            for result in reader.iter_shapes_and_records() {
                let (shape, _) = result.map_err(|e| parse_error(path, e))?;
                if matches!(
                    shape,
                    shapefile::Shape::Polygon(_)
                        | shapefile::Shape::PolygonM(_)
                        | shapefile::Shape::PolygonZ(_)
                ) {
                    polygon_features += 1;
                }
            }
        }
    }

    Ok(SourceSummary {
        fields,
        polygon_features,
    })
}

enum Format {
    GeoJson,
    Shapefile,
}

fn source_format(path: &Path) -> Result<Format, DataLoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "json" | "geojson" => Ok(Format::GeoJson),
        "shp" => Ok(Format::Shapefile),
        _ => Err(DataLoadError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        }),
    }
}

fn read_features(source: &SourceSpec) -> Result<Vec<(String, MultiPolygon<f64>)>, DataLoadError> {
    tracing::info!("Loading regions from {:?}", source.path);
    let features = match source_format(&source.path)? {
        Format::GeoJson => load_geojson(source)?,
        Format::Shapefile => load_shapefile(source)?,
    };
    tracing::info!("Loaded {} regions from {:?}", features.len(), source.path);
    Ok(features)
}

fn parse_error(path: &Path, e: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn read_geojson_features(path: &Path) -> Result<Vec<geojson::Feature>, DataLoadError> {
    let file = File::open(path).map_err(|source| DataLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let geojson = GeoJson::from_reader(reader).map_err(|e| parse_error(path, e))?;
    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc.features),
        _ => Err(DataLoadError::NotFeatureCollection {
            path: path.to_path_buf(),
        }),
    }
}

fn load_geojson(source: &SourceSpec) -> Result<Vec<(String, MultiPolygon<f64>)>, DataLoadError> {
    let path = &source.path;
    let mut regions = Vec::new();

    for (index, feature) in read_geojson_features(path)?.into_iter().enumerate() {
        let Some(geometry) = feature.geometry else {
            tracing::debug!("Skipping feature {} without geometry", index);
            continue;
        };

        let geometry: geo::Geometry<f64> =
            geometry
                .value
                .try_into()
                .map_err(|e: geojson::Error| DataLoadError::Geometry {
                    path: path.clone(),
                    feature: index,
                    message: e.to_string(),
                })?;

        let geometry = match geometry {
            geo::Geometry::MultiPolygon(mp) => mp,
            geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
            _ => {
                tracing::debug!("Skipping non-polygon feature {}", index);
                continue;
            }
        };

        let name = match feature
            .properties
            .as_ref()
            .and_then(|props| props.get(&source.name_field))
        {
            Some(serde_json::Value::String(s)) => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(missing_name(source, index)),
        };

        regions.push((name, geometry));
    }

    Ok(regions)
}

fn open_shapefile(
    path: &Path,
) -> Result<Reader<BufReader<File>, BufReader<File>>, DataLoadError> {
    Reader::from_path(path).map_err(|e| match e {
        shapefile::Error::IoError(source) => DataLoadError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => parse_error(path, other),
    })
}

fn load_shapefile(source: &SourceSpec) -> Result<Vec<(String, MultiPolygon<f64>)>, DataLoadError> {
    let path = &source.path;
    let mut reader = open_shapefile(path)?;
    let mut regions = Vec::new();

    for (index, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result.map_err(|e| parse_error(path, e))?;

        let invalid = |message: String| DataLoadError::Geometry {
            path: path.clone(),
            feature: index,
            message,
        };
        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| invalid(format!("{:?}", e)))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| invalid(format!("{:?}", e)))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| invalid(format!("{:?}", e)))?,
            _ => {
                tracing::debug!("Skipping non-polygon shape {}", index);
                continue;
            }
        };

        let name = match record.get(&source.name_field) {
            Some(FieldValue::Character(Some(s))) => s.trim().to_string(),
            Some(FieldValue::Numeric(Some(n))) => n.to_string(),
            _ => return Err(missing_name(source, index)),
        };

        regions.push((name, geometry));
    }

    Ok(regions)
}

fn missing_name(source: &SourceSpec, feature: usize) -> DataLoadError {
    DataLoadError::MissingNameField {
        path: source.path.clone(),
        field: source.name_field.clone(),
        feature,
    }
}
