//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// 3-D point / vector type used by all geometry
pub type Vec3 = glam::DVec3;

/// Index of an accepted shape in the network's accepted sequence
///
/// Ids are handed out in commit order, so they double as arena indices for
/// the connectivity tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeId(pub u32);

impl ShapeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a shape family in the configuration's family list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FamilyId(pub u32);

impl FamilyId {
    /// Shapes placed from the user shape list rather than a stochastic family
    pub const USER: Self = Self(u32::MAX);

    #[inline]
    pub fn is_user(self) -> bool {
        self == Self::USER
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_user() {
            return f.write_str("user shapes");
        }
        // Families are numbered from 1 in user-facing text
        write!(f, "family {}", self.0 + 1)
    }
}

/// Domain boundary faces a shape or cluster touches
///
/// Bit layout: 0 = -x, 1 = +x, 2 = -y, 3 = +y, 4 = -z, 5 = +z
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundaryFaces(pub u8);

impl BoundaryFaces {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0b11_1111);

    pub fn from_flags(flags: [bool; 6]) -> Self {
        let mut bits = 0u8;
        for (i, set) in flags.iter().enumerate() {
            if *set {
                bits |= 1 << i;
            }
        }
        Self(bits)
    }

    /// Face index for an axis (0..3) and side (false = negative, true = positive)
    pub fn face(axis: usize, positive: bool) -> Self {
        Self(1 << (axis * 2 + usize::from(positive)))
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True when every face set in `required` is also set here
    pub fn covers(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }
}
