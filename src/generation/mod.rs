//! Generation: accept/reject policy, network assembly, statistics, and the
//! driving loop

pub mod control;
pub mod engine;
pub mod network;
pub mod rejection;
pub mod stats;

pub use control::{ControlAction, ControlFlag, ControlSignal, NoControl};
pub use engine::{generate, DfnGenerator};
pub use network::{Checkpoint, Cluster, GroupData, IntersectionSegment, NetworkAssembler};
pub use rejection::{Acceptance, Decision, RejectionController, RejectionReason};
pub use stats::{FamilyStats, RejectionCounts, Stats, StatsTracker};
