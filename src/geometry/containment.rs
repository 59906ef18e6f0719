//! Coplanarity and enclosure tests between two shapes

use crate::geometry::distance::is_parallel;
use crate::geometry::polygon;
use crate::geometry::shape::Shape;

/// Same supporting plane, within `eps`
pub fn coplanar(a: &Shape, b: &Shape, eps: f64) -> bool {
    is_parallel(a.normal, b.normal, eps) && a.plane_distance(b.vertices[0]).abs() <= eps
}

/// `inner` lies in `outer`'s plane and entirely within its outline
pub fn is_enclosed(inner: &Shape, outer: &Shape, eps: f64) -> bool {
    coplanar(inner, outer, eps)
        && inner.bbox.overlaps(&outer.bbox, eps)
        && inner.vertices.iter().all(|v| outer.contains_point(*v, eps))
}

/// Coplanar shapes whose outlines overlap without one enclosing the other
pub fn coplanar_overlap(a: &Shape, b: &Shape, eps: f64) -> bool {
    if !coplanar(a, b, eps) || !a.bbox.overlaps(&b.bbox, eps) {
        return false;
    }
    a.vertices.iter().any(|v| b.contains_point(*v, eps))
        || b.vertices.iter().any(|v| a.contains_point(*v, eps))
        || polygon::edges_cross(&a.vertices, &b.vertices, a.normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FamilyId, Vec3};
    use crate::geometry::polygon::{place, rectangle_vertices};
    use crate::geometry::shape::ShapeKind;

    fn square(half: f64, normal: Vec3, center: Vec3) -> Shape {
        let verts = place(&rectangle_vertices(half, half), 0.0, normal, center);
        Shape::new(FamilyId(0), ShapeKind::Rectangle, verts, normal, center, half, half, 0.0, 1e-5)
    }

    #[test]
    fn test_small_square_enclosed() {
        let outer = square(2.0, Vec3::Z, Vec3::ZERO);
        let inner = square(0.5, Vec3::Z, Vec3::new(0.3, 0.2, 0.0));
        assert!(is_enclosed(&inner, &outer, 1e-9));
        assert!(!is_enclosed(&outer, &inner, 1e-9));
        assert!(coplanar_overlap(&outer, &inner, 1e-9));
    }

    #[test]
    fn test_offset_plane_not_enclosed() {
        let outer = square(2.0, Vec3::Z, Vec3::ZERO);
        let inner = square(0.5, Vec3::Z, Vec3::new(0.0, 0.0, 0.5));
        assert!(!coplanar(&inner, &outer, 1e-9));
        assert!(!is_enclosed(&inner, &outer, 1e-9));
    }

    #[test]
    fn test_coplanar_partial_overlap() {
        let a = square(1.0, Vec3::Z, Vec3::ZERO);
        let b = square(1.0, Vec3::Z, Vec3::new(1.5, 0.0, 0.0));
        assert!(!is_enclosed(&b, &a, 1e-9));
        assert!(coplanar_overlap(&a, &b, 1e-9));

        let far = square(1.0, Vec3::Z, Vec3::new(5.0, 0.0, 0.0));
        assert!(!coplanar_overlap(&a, &far, 1e-9));
    }
}
