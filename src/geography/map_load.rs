use std::path::Path;

use anyhow::{Context, Result};
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::{dbase, PolygonRing, Shape};

use super::Municipality;

const DISTRICT_CODE_FIELD: &str = "LAU1_CODE";
const DISTRICT_NAME_FIELD: &str = "LAU1";
const MUNICIPALITY_CODE_FIELD: &str = "LAU2_CODE";
const MUNICIPALITY_NAME_FIELD: &str = "NM4";

macro_rules! get_char_entry {
    ($attr:expr, $record:ident) => {
        match $record.get($attr) {
            Some(dbase::FieldValue::Character(Some(entry))) => entry.trim().to_owned(),
            _ => String::new(),
        }
    };
}

/// Reads every polygon record of the municipality shapefile.
pub fn municipalities_from_shapefile(path: &Path) -> Result<Vec<(Municipality, String)>> {
    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("Opening shapefile {}", path.display()))?;

    let mut municipalities = Vec::new();
    for (index, shape_record) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = shape_record
            .with_context(|| format!("Reading record #{index} of {}", path.display()))?;

        let Some(geometry) = collect_shapes(&shape) else {
            tracing::warn!("Record #{index} is a {:?} shape, skipping", shape.shapetype());
            continue;
        };

        let code = get_char_entry!(MUNICIPALITY_CODE_FIELD, record);
        let district_code = get_char_entry!(DISTRICT_CODE_FIELD, record);
        if code.is_empty() || district_code.is_empty() {
            tracing::warn!("Record #{index} lacks {MUNICIPALITY_CODE_FIELD} or {DISTRICT_CODE_FIELD}, skipping");
            continue;
        }

        let municipality = Municipality {
            code,
            name: get_char_entry!(MUNICIPALITY_NAME_FIELD, record),
            district_code,
            geometry,
        };
        let district_name = get_char_entry!(DISTRICT_NAME_FIELD, record);
        municipalities.push((municipality, district_name));
    }

    tracing::info!("Loaded {} municipalities from {}", municipalities.len(), path.display());
    Ok(municipalities)
}

/// Outer rings start a new polygon; inner rings punch holes into the
/// polygon started by the preceding outer ring.
fn collect_shapes(shape: &Shape) -> Option<MultiPolygon<f64>> {
    let polygon = match shape {
        Shape::Polygon(p) => p,
        _ => return None,
    };

    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for ring in polygon.rings() {
        let line: LineString<f64> = ring.points()
            .iter()
            .map(|p| Coord { x: p.x, y: p.y })
            .collect();
        match (ring, polygons.last_mut()) {
            (PolygonRing::Inner(_), Some(outer)) => outer.interiors_push(line),
            _ => polygons.push(Polygon::new(line, vec![])),
        }
    }
    Some(MultiPolygon(polygons))
}
