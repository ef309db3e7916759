//! Boundary drawing tools.
//!
//! A fixed set of tools drives a [`BoundaryEditor`], which collects vertices
//! and hands out the finished boundary polygon on demand.

use geo::Coord;
use plotmap_core::geom::{self, Coordinate, Polygon};
use plotmap_core::{Error, Result};

/// What the editor is currently drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    Idle,
    Polygon,
    Rectangle,
}

/// Toolbar actions that act on a boundary editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundaryTool {
    NewPolygon,
    NewRectangle,
    Clear,
}

impl BoundaryTool {
    pub const ALL: [BoundaryTool; 3] = [Self::NewPolygon, Self::NewRectangle, Self::Clear];

    /// Short name of the shape the tool creates.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewPolygon => "polygon",
            Self::NewRectangle => "rectangle",
            Self::Clear => "clear",
        }
    }

    /// Toolbar glyph.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NewPolygon => "▰",
            Self::NewRectangle => "⬛",
            Self::Clear => "✕",
        }
    }

    /// Applies the tool. Starting a new shape discards the current boundary.
    pub fn activate(&self, editor: &mut BoundaryEditor) {
        match self {
            Self::NewPolygon => editor.start(EditMode::Polygon),
            Self::NewRectangle => editor.start(EditMode::Rectangle),
            Self::Clear => editor.clear(),
        }
        log::debug!("Activated {} tool", self.kind());
    }
}

/// Collects a boundary polygon.
#[derive(Debug, Clone, Default)]
pub struct BoundaryEditor {
    mode: EditMode,
    vertices: Vec<Coordinate>,
    boundary: Option<Polygon>,
}

impl BoundaryEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// Vertices placed so far in the shape being drawn.
    pub fn vertices(&self) -> &[Coordinate] {
        &self.vertices
    }

    fn start(&mut self, mode: EditMode) {
        self.mode = mode;
        self.vertices.clear();
        self.boundary = None;
    }

    fn clear(&mut self) {
        self.start(EditMode::Idle);
    }

    /// Adds a vertex. In rectangle mode the second vertex completes the shape.
    pub fn push_vertex(&mut self, vertex: Coordinate) -> Result<()> {
        if !(vertex.x.is_finite() && vertex.y.is_finite()) {
            return Err(Error::InvalidGeometry("non-finite vertex".into()));
        }
        match self.mode {
            EditMode::Idle => Err(Error::InvalidInput(
                "no drawing tool is active".into(),
            )),
            EditMode::Polygon => {
                if self.vertices.last() != Some(&vertex) {
                    self.vertices.push(vertex);
                }
                Ok(())
            }
            EditMode::Rectangle => {
                self.vertices.push(vertex);
                if self.vertices.len() == 2 {
                    self.finish()?;
                }
                Ok(())
            }
        }
    }

    /// Closes the shape being drawn and makes it the boundary.
    pub fn finish(&mut self) -> Result<&Polygon> {
        let polygon = match self.mode {
            EditMode::Idle => {
                return Err(Error::InvalidInput("no drawing tool is active".into()));
            }
            EditMode::Polygon => {
                let mut ring = self.vertices.clone();
                if ring.len() > 1 && ring.first() == ring.last() {
                    ring.pop();
                }
                if ring.len() < 3 {
                    return Err(Error::InvalidGeometry(format!(
                        "a boundary needs at least 3 vertices, got {}",
                        ring.len()
                    )));
                }
                geom::polygon_from_ring(ring)
            }
            EditMode::Rectangle => match self.vertices.as_slice() {
                [a, b] => Self::rectangle(*a, *b)?,
                _ => {
                    return Err(Error::InvalidGeometry(
                        "a rectangle needs two corners".into(),
                    ));
                }
            },
        };
        geom::validate_polygon(&polygon)?;

        self.mode = EditMode::Idle;
        self.vertices.clear();
        let boundary: &Polygon = self.boundary.insert(polygon);
        Ok(boundary)
    }

    /// Axis-aligned rectangle spanned by two opposite corners.
    pub fn rectangle(a: Coordinate, b: Coordinate) -> Result<Polygon> {
        let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
        let (y0, y1) = (a.y.min(b.y), a.y.max(b.y));
        if x0 == x1 || y0 == y1 {
            return Err(Error::InvalidGeometry("rectangle has zero area".into()));
        }
        Ok(geom::polygon_from_ring(vec![
            Coord { x: x0, y: y0 },
            Coord { x: x1, y: y0 },
            Coord { x: x1, y: y1 },
            Coord { x: x0, y: y1 },
        ]))
    }

    /// The finished boundary, if any.
    pub fn boundary(&self) -> Option<&Polygon> {
        self.boundary.as_ref()
    }

    /// Replaces the boundary with an already drawn polygon.
    pub fn set_boundary(&mut self, polygon: Polygon) -> Result<()> {
        geom::validate_polygon(&polygon)?;
        self.mode = EditMode::Idle;
        self.vertices.clear();
        self.boundary = Some(polygon);
        Ok(())
    }
}
