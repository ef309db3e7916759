//! Input files: observation units, boundary and configuration.

use geo::Coord;
use plotmap_core::{GeoShape, LayoutConfig, Polygon, RawObservationUnit, UnitGeometry};
use plotmap_layout::{BoundaryEditor, BoundaryTool};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading or writing CLI files.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Layout error: {0}")]
    Layout(#[from] plotmap_core::Error),

    #[error("Invalid input: {0}")]
    Invalid(String),
}

/// Units file: either a bare array of records or `{ "data": [...] }`.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum UnitsFile {
    List(Vec<RawObservationUnit>),
    Wrapped { data: Vec<RawObservationUnit> },
}

/// Reads observation unit records from a JSON file.
pub fn load_units(path: &Path) -> Result<Vec<RawObservationUnit>, IoError> {
    let content = fs::read_to_string(path)?;
    let units = match serde_json::from_str::<UnitsFile>(&content)? {
        UnitsFile::List(units) => units,
        UnitsFile::Wrapped { data } => data,
    };
    log::debug!("Read {} unit records from {}", units.len(), path.display());
    Ok(units)
}

/// Reads a boundary polygon from a JSON geo-shape file.
pub fn load_boundary(path: &Path) -> Result<Polygon, IoError> {
    let content = fs::read_to_string(path)?;
    let shape: GeoShape = serde_json::from_str(&content)?;
    match shape.to_geometry()? {
        UnitGeometry::Polygon(polygon) => {
            let mut editor = BoundaryEditor::new();
            editor.set_boundary(polygon)?;
            editor
                .boundary()
                .cloned()
                .ok_or_else(|| IoError::Invalid("boundary was not stored".into()))
        }
        UnitGeometry::Point(_) => Err(IoError::Invalid(format!(
            "{} holds a point, expected a polygon boundary",
            path.display()
        ))),
    }
}

/// Builds a rectangular boundary from `[lon1, lat1, lon2, lat2]`.
pub fn rectangle_boundary(corners: &[f64]) -> Result<Polygon, IoError> {
    let [x1, y1, x2, y2] = corners else {
        return Err(IoError::Invalid(format!(
            "a rectangle needs 4 numbers (lon1,lat1,lon2,lat2), got {}",
            corners.len()
        )));
    };
    let mut editor = BoundaryEditor::new();
    BoundaryTool::NewRectangle.activate(&mut editor);
    editor.push_vertex(Coord { x: *x1, y: *y1 })?;
    editor.push_vertex(Coord { x: *x2, y: *y2 })?;
    editor
        .boundary()
        .cloned()
        .ok_or_else(|| IoError::Invalid("rectangle was not completed".into()))
}

/// Reads a layout configuration from TOML; missing keys keep their defaults.
pub fn load_config(path: &Path) -> Result<LayoutConfig, IoError> {
    let content = fs::read_to_string(path)?;
    let config: LayoutConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_units_both_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let bare = write(&dir, "bare.json", r#"[{"id": "a", "row": 1, "col": 2}]"#);
        let wrapped = write(&dir, "wrapped.json", r#"{"data": [{"id": "a"}, {"id": "b"}]}"#);
        let units = load_units(&bare).unwrap();
        assert_eq!(units[0].row, Some(1));
        assert_eq!(load_units(&wrapped).unwrap().len(), 2);
    }

    #[test]
    fn test_load_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "boundary.json",
            r#"{"type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 1], [0, 1], [0, 0]]]}"#,
        );
        let boundary = load_boundary(&path).unwrap();
        assert_eq!(boundary.exterior().0.len(), 5);

        let point = write(&dir, "point.json", r#"{"type": "Point", "coordinates": [0, 0]}"#);
        assert!(matches!(load_boundary(&point), Err(IoError::Invalid(_))));
    }

    #[test]
    fn test_rectangle_boundary() {
        assert!(rectangle_boundary(&[0.0, 0.0, 1.0, 1.0]).is_ok());
        assert!(rectangle_boundary(&[0.0, 0.0, 1.0]).is_err());
        assert!(rectangle_boundary(&[0.0, 0.0, 0.0, 1.0]).is_err());
    }

    #[test]
    fn test_load_config_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "config.toml", "plot_scale = 0.85\npage_size = 50\n");
        let config = load_config(&path).unwrap();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.plot_scale, 0.85);
        assert_eq!(config.point_scale, LayoutConfig::default().point_scale);
    }
}
