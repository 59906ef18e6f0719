//! Fracture Net - stochastic discrete fracture network generation

pub mod core;
pub mod generation;
pub mod geometry;
pub mod output;
pub mod sampling;
