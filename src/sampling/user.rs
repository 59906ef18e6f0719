//! Deterministic shapes listed in the configuration
//!
//! User shapes skip every distribution: they are built once, exactly as
//! written, and then face the same admissibility checks as sampled
//! candidates. Rectangles and ellipses are given by their parameters, any
//! other planar outline by its vertex coordinates.

use serde::{Deserialize, Serialize};

use crate::core::types::{FamilyId, Vec3};
use crate::geometry::polygon;
use crate::geometry::shape::{Shape, ShapeKind};

fn default_aspect_ratio() -> f64 {
    1.0
}

fn default_aperture() -> f64 {
    1e-5
}

/// A rectangle or ellipse placed by radius, orientation and centre
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOutline {
    pub kind: ShapeKind,
    pub radius: f64,
    /// y-radius / x-radius
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: f64,
    /// In-plane twist about the normal, degrees
    #[serde(default)]
    pub beta: f64,
    /// Need not be unit length
    pub normal: Vec3,
    pub translation: Vec3,
    #[serde(default = "default_aperture")]
    pub aperture: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum UserShape {
    Parameters(UserOutline),
    /// Closed planar loop, last vertex joins the first
    Coordinates {
        vertices: Vec<Vec3>,
        #[serde(default = "default_aperture")]
        aperture: f64,
    },
}

impl UserShape {
    /// Check the shape is buildable and no smaller than the feature size `h`
    pub fn validate(&self, h: f64, eps: f64) -> std::result::Result<(), String> {
        match self {
            UserShape::Parameters(outline) => {
                match outline.kind {
                    ShapeKind::Rectangle => {}
                    ShapeKind::Ellipse { points } if points >= 3 => {}
                    ShapeKind::Ellipse { points } => {
                        return Err(format!("ellipses need at least 3 points, got {}", points));
                    }
                    ShapeKind::Polygon { .. } => {
                        return Err("polygons must be given by coordinates".into());
                    }
                }
                if !(outline.radius >= h) || !outline.radius.is_finite() {
                    return Err(format!("radius {} is below the feature size {}", outline.radius, h));
                }
                if !(outline.aspect_ratio > 0.0) || !outline.aspect_ratio.is_finite() {
                    return Err(format!("aspect_ratio must be positive, got {}", outline.aspect_ratio));
                }
                if !outline.beta.is_finite() || !outline.translation.is_finite() {
                    return Err("beta and translation must be finite".into());
                }
                if !outline.normal.is_finite() || !(outline.normal.length() > eps) {
                    return Err(format!("normal {} has no direction", outline.normal));
                }
                check_aperture(outline.aperture)
            }
            UserShape::Coordinates { vertices, aperture } => {
                if vertices.len() < 3 {
                    return Err(format!("polygons need at least 3 vertices, got {}", vertices.len()));
                }
                if !vertices.iter().all(|v| v.is_finite()) {
                    return Err("vertex coordinates must be finite".into());
                }
                let normal = polygon::newell_normal(vertices).normalize_or_zero();
                if normal == Vec3::ZERO {
                    return Err("vertices are collinear".into());
                }
                let error = polygon::planarity_error(vertices, normal);
                if error > eps {
                    return Err(format!("vertices leave their plane by {:e}", error));
                }
                if !polygon::is_simple(vertices, normal) {
                    return Err("outline crosses itself".into());
                }
                check_aperture(*aperture)
            }
        }
    }

    /// Build the candidate shape; call only after `validate` succeeded
    pub fn build(&self) -> Shape {
        match self {
            UserShape::Parameters(outline) => {
                let x_radius = outline.radius;
                let y_radius = x_radius * outline.aspect_ratio;
                let flat = match outline.kind {
                    ShapeKind::Ellipse { points } => {
                        let thetas = polygon::ellipse_thetas(outline.aspect_ratio, points);
                        polygon::ellipse_vertices(x_radius, y_radius, &thetas)
                    }
                    ShapeKind::Rectangle | ShapeKind::Polygon { .. } => polygon::rectangle_vertices(x_radius, y_radius),
                };
                let normal = outline.normal.normalize();
                let beta = outline.beta.to_radians();
                let vertices = polygon::place(&flat, beta, normal, outline.translation);
                Shape::new(
                    FamilyId::USER,
                    outline.kind,
                    vertices,
                    normal,
                    outline.translation,
                    x_radius,
                    y_radius,
                    beta,
                    outline.aperture,
                )
            }
            UserShape::Coordinates { vertices, aperture } => {
                let normal = polygon::newell_normal(vertices).normalize_or_zero();
                let centroid = vertices.iter().fold(Vec3::ZERO, |acc, v| acc + *v) / vertices.len() as f64;
                let radius = vertices.iter().map(|v| v.distance(centroid)).fold(0.0, f64::max);
                Shape::new(
                    FamilyId::USER,
                    ShapeKind::Polygon { points: vertices.len() },
                    vertices.clone(),
                    normal,
                    centroid,
                    radius,
                    radius,
                    0.0,
                    *aperture,
                )
            }
        }
    }
}

fn check_aperture(aperture: f64) -> std::result::Result<(), String> {
    if aperture > 0.0 && aperture.is_finite() {
        Ok(())
    } else {
        Err(format!("aperture must be positive, got {}", aperture))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> UserShape {
        UserShape::Parameters(UserOutline {
            kind: ShapeKind::Rectangle,
            radius: 1.0,
            aspect_ratio: 1.0,
            beta: 0.0,
            normal: Vec3::new(0.0, 0.0, 2.0),
            translation: Vec3::new(1.0, 2.0, 3.0),
            aperture: 1e-4,
        })
    }

    #[test]
    fn test_parameter_rectangle_is_placed() {
        let shape = square().build();
        assert_eq!(shape.family, FamilyId::USER);
        assert_eq!(shape.normal, Vec3::Z);
        assert!((shape.area() - 4.0).abs() < 1e-12);
        assert!(shape.vertices.iter().all(|v| (v.z - 3.0).abs() < 1e-12));
        assert_eq!(shape.aperture, 1e-4);
    }

    #[test]
    fn test_coordinates_become_polygon() {
        let triangle = UserShape::Coordinates {
            vertices: vec![Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), Vec3::new(0.0, 3.0, 0.0)],
            aperture: 1e-5,
        };
        assert!(triangle.validate(0.1, 1e-8).is_ok());
        let shape = triangle.build();
        assert_eq!(shape.kind, ShapeKind::Polygon { points: 3 });
        assert_eq!(shape.translation, Vec3::new(1.0, 1.0, 0.0));
        assert!((shape.normal.dot(Vec3::Z).abs() - 1.0).abs() < 1e-12);
        assert!((shape.area() - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_user_shapes_rejected() {
        let collinear = UserShape::Coordinates {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::new(2.0, 0.0, 0.0)],
            aperture: 1e-5,
        };
        assert!(collinear.validate(0.1, 1e-8).is_err());

        let warped = UserShape::Coordinates {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.5), Vec3::Y],
            aperture: 1e-5,
        };
        assert!(warped.validate(0.1, 1e-8).is_err());

        let UserShape::Parameters(base) = square() else { unreachable!() };
        let tiny = UserShape::Parameters(UserOutline { radius: 0.05, ..base.clone() });
        assert!(tiny.validate(0.1, 1e-8).is_err());
        let flat = UserShape::Parameters(UserOutline { normal: Vec3::ZERO, ..base.clone() });
        assert!(flat.validate(0.1, 1e-8).is_err());
        let polygon = UserShape::Parameters(UserOutline { kind: ShapeKind::Polygon { points: 5 }, ..base });
        assert!(polygon.validate(0.1, 1e-8).is_err());
    }

    #[test]
    fn test_parse_user_shapes() {
        #[derive(Deserialize)]
        struct List {
            user_shapes: Vec<UserShape>,
        }
        let toml = r#"
            [[user_shapes]]
            input = "parameters"
            kind = { type = "ellipse", points = 12 }
            radius = 2.0
            beta = 30.0
            normal = [0.0, 1.0, 0.0]
            translation = [0.0, 0.0, 0.0]

            [[user_shapes]]
            input = "coordinates"
            vertices = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]
        "#;
        let list: List = toml::from_str(toml).unwrap();
        assert_eq!(list.user_shapes.len(), 2);
        let UserShape::Parameters(outline) = &list.user_shapes[0] else { panic!("expected parameters") };
        assert_eq!(outline.kind, ShapeKind::Ellipse { points: 12 });
        assert_eq!(outline.aspect_ratio, 1.0);
        assert!(matches!(&list.user_shapes[1], UserShape::Coordinates { vertices, .. } if vertices.len() == 4));
    }
}
