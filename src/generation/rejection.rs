//! Accept/reject policy for candidate shapes
//!
//! A candidate moves through `Shape` (generated) -> `CheckedCandidate`
//! (passed candidate-local geometry checks) -> `Decision`. Pairwise tests
//! against the accepted set are independent and may run on rayon; they are
//! always reduced in ascending partner id so the outcome never depends on
//! scheduling.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::config::{FramConfig, GenerationConfig};
use crate::core::types::{ShapeId, Vec3};
use crate::generation::network::{IntersectionSegment, NetworkAssembler};
use crate::geometry::containment::{coplanar_overlap, is_enclosed};
use crate::geometry::distance::{closest_approach, Segment};
use crate::geometry::domain::{truncate, Domain, Truncation};
use crate::geometry::intersect::intersect;
use crate::geometry::polygon;
use crate::geometry::shape::Shape;
use crate::geometry::shrink::{check_close_edge, EdgeViolation, ShrinkLimits};

/// cos(47°): triple intersections at shallower angles are rejected
const TRIPLE_MAX_COS: f64 = 0.68199836;

/// Minimum spacing between triple points on one intersection, in units of h
const TRIPLE_SPACING: f64 = 1.5;

/// Why a candidate was rejected
///
/// Every rejected candidate carries exactly one reason. `ALL` lists them in
/// tie-break priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Self-intersecting, collapsed by truncation, or overlapping a coplanar shape
    Degenerate,
    Outside,
    /// Lies inside an accepted coplanar shape
    Enclosed,
    ShortIntersection,
    CloseToNode,
    CloseToEdge,
    CloseToIntersection,
    TripleIntersection,
}

impl RejectionReason {
    pub const ALL: [RejectionReason; 8] = [
        RejectionReason::Degenerate,
        RejectionReason::Outside,
        RejectionReason::Enclosed,
        RejectionReason::ShortIntersection,
        RejectionReason::CloseToNode,
        RejectionReason::CloseToEdge,
        RejectionReason::CloseToIntersection,
        RejectionReason::TripleIntersection,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RejectionReason::Degenerate => "degenerate geometry",
            RejectionReason::Outside => "outside domain",
            RejectionReason::Enclosed => "enclosed by accepted shape",
            RejectionReason::ShortIntersection => "short intersection",
            RejectionReason::CloseToNode => "intersection close to vertex",
            RejectionReason::CloseToEdge => "intersection close to edge",
            RejectionReason::CloseToIntersection => "close to other intersection",
            RejectionReason::TripleIntersection => "triple intersection",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<EdgeViolation> for RejectionReason {
    fn from(v: EdgeViolation) -> Self {
        match v {
            EdgeViolation::CloseToEdge => RejectionReason::CloseToEdge,
            EdgeViolation::CloseToNode => RejectionReason::CloseToNode,
        }
    }
}

/// Intersection the candidate will form with an accepted shape
#[derive(Debug, Clone, PartialEq)]
pub struct NewSegment {
    pub partner: ShapeId,
    pub segment: Segment,
    pub original_length: f64,
    pub shortened: bool,
}

/// Triple point found while checking a candidate
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTriple {
    pub point: Vec3,
    /// Partner of the new segment passing through the point
    pub partner: ShapeId,
    /// Existing network edge passing through the point
    pub existing_edge: Option<usize>,
}

/// Everything needed to commit an accepted candidate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Acceptance {
    /// Sorted by partner id
    pub segments: Vec<NewSegment>,
    pub triples: Vec<PendingTriple>,
}

impl Acceptance {
    pub fn shortened_count(&self) -> usize {
        self.segments.iter().filter(|s| s.shortened).count()
    }

    pub fn original_length(&self) -> f64 {
        self.segments.iter().map(|s| s.original_length).sum()
    }

    pub fn retained_length(&self) -> f64 {
        self.segments.iter().map(|s| s.segment.length()).sum()
    }
}

#[derive(Debug, Clone)]
pub enum Decision {
    Accepted { shape: Shape, acceptance: Acceptance },
    Rejected(RejectionReason),
}

/// A candidate that passed domain, degeneracy, and enclosure checks
#[derive(Debug, Clone)]
pub struct CheckedCandidate {
    shape: Shape,
}

impl CheckedCandidate {
    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

struct PairResult {
    segment: NewSegment,
    triples: Vec<PendingTriple>,
}

type PairCheck = Result<Option<PairResult>, RejectionReason>;

pub struct RejectionController {
    domain: Domain,
    fram: FramConfig,
    eps: f64,
    truncate_to_domain: bool,
    parallel_threshold: usize,
}

impl RejectionController {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            domain: config.domain,
            fram: config.fram.clone(),
            eps: config.tolerance,
            truncate_to_domain: config.truncate_to_domain,
            parallel_threshold: config.parallel_threshold,
        }
    }

    /// Screen and then decide a freshly generated candidate
    pub fn evaluate(&self, shape: Shape, network: &NetworkAssembler) -> Decision {
        match self.screen(shape, network) {
            Ok(candidate) => self.decide(candidate, network),
            Err(reason) => Decision::Rejected(reason),
        }
    }

    /// Candidate-local checks, cheapest first
    ///
    /// Order: degenerate, outside, enclosed. Truncation happens here, so the
    /// checked shape is the clipped one.
    pub fn screen(&self, mut shape: Shape, network: &NetworkAssembler) -> Result<CheckedCandidate, RejectionReason> {
        let eps = self.eps;
        if shape.vertices.len() < 3
            || shape.area() <= eps
            || polygon::planarity_error(&shape.vertices, shape.normal) > eps * shape.radius().max(1.0)
            || !polygon::is_simple(&shape.vertices, shape.normal)
        {
            return Err(RejectionReason::Degenerate);
        }

        match truncate(&shape.vertices, &self.domain, self.fram.h, eps) {
            Truncation::Inside { faces } => shape.faces = faces,
            Truncation::Clipped { vertices, faces } if self.truncate_to_domain => {
                shape.set_vertices(vertices);
                shape.truncated = true;
                shape.faces = faces;
            }
            Truncation::Degenerate if self.truncate_to_domain => return Err(RejectionReason::Degenerate),
            _ => return Err(RejectionReason::Outside),
        }

        let mut enclosed = false;
        for other in network.shapes() {
            if coplanar_overlap(&shape, other, eps) {
                if is_enclosed(&shape, other, eps) {
                    enclosed = true;
                } else {
                    return Err(RejectionReason::Degenerate);
                }
            }
        }
        if enclosed {
            return Err(RejectionReason::Enclosed);
        }
        Ok(CheckedCandidate { shape })
    }

    /// Pairwise checks against every accepted shape
    pub fn decide(&self, candidate: CheckedCandidate, network: &NetworkAssembler) -> Decision {
        let shape = candidate.shape;
        let n = network.len();

        let results: Vec<PairCheck> = if n >= self.parallel_threshold {
            (0..n)
                .into_par_iter()
                .map(|i| self.check_pair(&shape, ShapeId::from_index(i), network))
                .collect()
        } else {
            let mut results = Vec::with_capacity(n);
            for i in 0..n {
                let result = self.check_pair(&shape, ShapeId::from_index(i), network);
                let failed = result.is_err();
                results.push(result);
                if failed {
                    break;
                }
            }
            results
        };

        let mut acceptance = Acceptance::default();
        for result in results {
            match result {
                Err(reason) => return Decision::Rejected(reason),
                Ok(Some(pair)) => {
                    acceptance.segments.push(pair.segment);
                    acceptance.triples.extend(pair.triples);
                }
                Ok(None) => {}
            }
        }

        if !self.fram.disabled && !self.fram.relaxed {
            if let Err(reason) = self.check_new_intersections(&acceptance) {
                return Decision::Rejected(reason);
            }
        }
        Decision::Accepted { shape, acceptance }
    }

    fn check_pair(&self, shape: &Shape, id: ShapeId, network: &NetworkAssembler) -> PairCheck {
        let eps = self.eps;
        let h = self.fram.h;
        let partner = network.shape(id);
        let Some(segment) = intersect(shape, partner, eps) else {
            return Ok(None);
        };
        let original_length = segment.length();
        let unchecked = |segment| {
            Ok(Some(PairResult {
                segment: NewSegment { partner: id, segment, original_length, shortened: false },
                triples: Vec::new(),
            }))
        };

        if self.fram.disabled {
            return unchecked(segment);
        }
        if original_length < h {
            return Err(RejectionReason::ShortIntersection);
        }
        if self.fram.relaxed {
            return unchecked(segment);
        }

        let limits = ShrinkLimits {
            shrink_limit: (self.fram.shrink_fraction * original_length).max(h),
            min_dist: h,
            first_node_min_dist: self.fram.first_node_fraction * h,
            eps,
        };
        let (segment, own) = check_close_edge(&shape.vertices, segment, &limits)?;
        let (segment, theirs) = check_close_edge(&partner.vertices, segment, &limits)?;

        let mut triples = Vec::new();
        for (index, edge) in network.edges_of(id) {
            let approach = closest_approach(&segment, &edge.segment());
            if approach.distance >= h {
                continue;
            }
            let Some(point) = approach.crossing(eps) else {
                return Err(RejectionReason::CloseToIntersection);
            };
            if !self.fram.triple_intersections {
                return Err(RejectionReason::TripleIntersection);
            }
            self.check_triple(&segment, edge, point, network)?;
            triples.push(PendingTriple {
                point,
                partner: id,
                existing_edge: Some(index),
            });
        }

        Ok(Some(PairResult {
            segment: NewSegment {
                partner: id,
                segment,
                original_length,
                shortened: own || theirs,
            },
            triples,
        }))
    }

    /// Geometry of a triple point where `segment` crosses an existing edge
    fn check_triple(
        &self,
        segment: &Segment,
        edge: &IntersectionSegment,
        point: Vec3,
        network: &NetworkAssembler,
    ) -> Result<(), RejectionReason> {
        let h = self.fram.h;
        let existing = edge.segment();
        let cos = segment.vector().normalize_or_zero().dot(existing.vector().normalize_or_zero());
        if cos.abs() > TRIPLE_MAX_COS {
            return Err(RejectionReason::TripleIntersection);
        }
        let endpoints = [segment.p1, segment.p2, existing.p1, existing.p2];
        if endpoints.iter().any(|p| p.distance(point) < h) {
            return Err(RejectionReason::TripleIntersection);
        }
        let spacing = TRIPLE_SPACING * h;
        if edge
            .triple_points
            .iter()
            .any(|&i| network.triple_points()[i].distance(point) < spacing)
        {
            return Err(RejectionReason::TripleIntersection);
        }
        Ok(())
    }

    /// The candidate's own intersections must be spaced or meet at known triple points
    fn check_new_intersections(&self, acceptance: &Acceptance) -> Result<(), RejectionReason> {
        let h = self.fram.h;
        let segments = &acceptance.segments;
        for (i, a) in segments.iter().enumerate() {
            for b in &segments[i + 1..] {
                let approach = closest_approach(&a.segment, &b.segment);
                if approach.distance >= h {
                    continue;
                }
                let Some(point) = approach.crossing(self.eps) else {
                    return Err(RejectionReason::CloseToIntersection);
                };
                let known = acceptance.triples.iter().any(|t| t.point.distance(point) <= self.eps);
                if !self.fram.triple_intersections || !known {
                    return Err(RejectionReason::TripleIntersection);
                }
            }
        }
        Ok(())
    }
}
