pub mod config;
pub mod error;
pub mod types;

pub use config::{FamilyConfig, FramConfig, GenerationConfig, StopCondition};
pub use error::{DfnError, Result};
pub use types::{BoundaryFaces, FamilyId, ShapeId, Vec3};
