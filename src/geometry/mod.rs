//! Geometry engine: stateless predicates and constructors over shapes
//!
//! Everything here is a pure function of its inputs. Floating point
//! comparisons always go through an explicit tolerance.

pub mod containment;
pub mod distance;
pub mod domain;
pub mod intersect;
pub mod polygon;
pub mod shape;
pub mod shrink;

pub use distance::Segment;
pub use domain::{BoxRegion, Domain, Truncation};
pub use intersect::intersect;
pub use polygon::BoundingBox;
pub use shape::{Shape, ShapeKind};
pub use shrink::{check_close_edge, shrink_intersection, EdgeViolation, ShrinkLimits, ShrinkOutcome};
