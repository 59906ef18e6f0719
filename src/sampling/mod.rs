//! Shape family sampling

pub mod distribution;
pub mod sampler;
pub mod user;

pub use distribution::{ApertureModel, OrientationDistribution, RotationDistribution, SizeDistribution};
pub use sampler::{family_order, ShapeFamilySampler};
pub use user::{UserOutline, UserShape};
