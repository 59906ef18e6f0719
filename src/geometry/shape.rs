//! The shape entity: one planar fracture polygon

use serde::{Deserialize, Serialize};

use crate::core::types::{BoundaryFaces, FamilyId, Vec3};
use crate::geometry::distance::Segment;
use crate::geometry::polygon::{self, BoundingBox};

/// Outline of a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeKind {
    Rectangle,
    /// Ellipse approximated by `points` vertices of equal arc spacing
    Ellipse { points: usize },
    /// Outline given directly by vertex coordinates (user shapes only)
    Polygon { points: usize },
}

impl ShapeKind {
    pub fn vertex_count(&self) -> usize {
        match self {
            ShapeKind::Rectangle => 4,
            ShapeKind::Ellipse { points } | ShapeKind::Polygon { points } => *points,
        }
    }
}

/// A planar polygon in 3-D space
///
/// Built by the sampler as a candidate; once committed to the network it is
/// never mutated again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub family: FamilyId,
    pub kind: ShapeKind,
    /// Closed loop, last vertex connects back to the first
    pub vertices: Vec<Vec3>,
    /// Unit normal
    pub normal: Vec3,
    pub translation: Vec3,
    /// Sampled radius (half-width along the local x axis)
    pub x_radius: f64,
    pub y_radius: f64,
    /// In-plane twist about the normal, radians
    pub beta: f64,
    pub aperture: f64,
    /// Clipped against the domain walls
    pub truncated: bool,
    /// Domain faces this shape touches
    pub faces: BoundaryFaces,
    pub bbox: BoundingBox,
}

impl Shape {
    pub fn new(
        family: FamilyId,
        kind: ShapeKind,
        vertices: Vec<Vec3>,
        normal: Vec3,
        translation: Vec3,
        x_radius: f64,
        y_radius: f64,
        beta: f64,
        aperture: f64,
    ) -> Self {
        let bbox = BoundingBox::from_points(&vertices);
        Self {
            family,
            kind,
            vertices,
            normal,
            translation,
            x_radius,
            y_radius,
            beta,
            aperture,
            truncated: false,
            faces: BoundaryFaces::NONE,
            bbox,
        }
    }

    /// Characteristic size: the sampled radius
    pub fn radius(&self) -> f64 {
        self.x_radius
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.y_radius / self.x_radius
    }

    pub fn area(&self) -> f64 {
        polygon::area(&self.vertices)
    }

    pub fn edges(&self) -> impl Iterator<Item = Segment> + '_ {
        polygon::edges(&self.vertices)
    }

    /// Signed distance of `point` from this shape's plane
    pub fn plane_distance(&self, point: Vec3) -> f64 {
        (point - self.vertices[0]).dot(self.normal)
    }

    pub fn contains_point(&self, point: Vec3, eps: f64) -> bool {
        polygon::contains_point(&self.vertices, self.normal, point, eps)
    }

    /// Replace the outline after clipping, keeping the bounds in sync
    pub fn set_vertices(&mut self, vertices: Vec<Vec3>) {
        self.bbox = BoundingBox::from_points(&vertices);
        self.vertices = vertices;
    }

    /// Move the whole shape so its translation becomes `translation`
    pub fn moved_to(&self, translation: Vec3) -> Self {
        let offset = translation - self.translation;
        let vertices = self.vertices.iter().map(|v| *v + offset).collect();
        let mut moved = self.clone();
        moved.translation = translation;
        moved.set_vertices(vertices);
        moved
    }
}
