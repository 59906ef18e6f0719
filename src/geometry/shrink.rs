//! Shrink repair for intersections that end too close to polygon edges
//!
//! An intersection segment is discretized into nodes roughly `min_dist / 2`
//! apart. An endpoint that sits too close to a polygon edge is walked inward
//! node by node until it is at least `min_dist` from that edge. Repairs that
//! would leave the segment shorter than the shrink limit discard it instead.

use crate::core::types::Vec3;
use crate::geometry::distance::{point_to_segment, segment_to_segment, Segment};
use crate::geometry::polygon;

/// Result of a shrink repair
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShrinkOutcome {
    /// Both endpoints were already clear of the edge
    Retained(Segment),
    /// At least one endpoint moved inward
    Shrunk(Segment),
    /// Repair would violate the shrink limit
    Discarded,
}

impl ShrinkOutcome {
    pub fn segment(&self) -> Option<Segment> {
        match self {
            ShrinkOutcome::Retained(s) | ShrinkOutcome::Shrunk(s) => Some(*s),
            ShrinkOutcome::Discarded => None,
        }
    }
}

/// Why an intersection cannot be kept against a polygon's outline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeViolation {
    CloseToEdge,
    CloseToNode,
}

/// Thresholds driving edge repair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShrinkLimits {
    /// Shortest admissible repaired segment
    pub shrink_limit: f64,
    /// Minimum feature size h
    pub min_dist: f64,
    /// First-node clearance for endpoints lying on an edge
    pub first_node_min_dist: f64,
    pub eps: f64,
}

/// Walk from parameter `start` toward the interior until a node is clear
///
/// Returns the new parameter, or `None` when every node stays too close.
fn walk_inward(
    segment: &Segment,
    edge: &Segment,
    start: f64,
    direction: f64,
    step: f64,
    nodes: usize,
    min_dist: f64,
) -> Option<f64> {
    (1..=nodes)
        .map(|k| start + direction * step * k as f64)
        .find(|t| point_to_segment(segment.point_at(*t), edge) > min_dist)
}

/// Move endpoints of `segment` that sit too close to `edge`
///
/// An endpoint at least `min_dist` from the edge is left alone. An endpoint
/// lying on the edge is kept if the first discretized node is already more
/// than `first_node_min_dist` away, so shallow crossings are not trimmed.
/// Any other endpoint is walked inward to the first node farther than
/// `min_dist`. Applying the repair to its own result changes nothing.
pub fn shrink_intersection(
    segment: &Segment,
    edge: &Segment,
    shrink_limit: f64,
    first_node_min_dist: f64,
    min_dist: f64,
    eps: f64,
) -> ShrinkOutcome {
    let length = segment.length();
    if length <= eps {
        return if length < shrink_limit {
            ShrinkOutcome::Discarded
        } else {
            ShrinkOutcome::Retained(*segment)
        };
    }

    let nodes = ((2.0 * length / min_dist).ceil() as usize).max(1);
    let step = 1.0 / nodes as f64;
    let mut bounds = [0.0, 1.0];
    let mut shortened = false;

    for (end, direction) in [(0usize, 1.0), (1usize, -1.0)] {
        let start = bounds[end];
        let endpoint = segment.point_at(start);
        let end_dist = point_to_segment(endpoint, edge);
        if end_dist >= min_dist {
            continue;
        }
        if end_dist <= eps {
            let first = segment.point_at(start + direction * step);
            if point_to_segment(first, edge) > first_node_min_dist {
                continue;
            }
        }
        match walk_inward(segment, edge, start, direction, step, nodes, min_dist) {
            Some(t) => {
                bounds[end] = t;
                shortened = true;
            }
            None => return ShrinkOutcome::Discarded,
        }
    }

    if bounds[1] <= bounds[0] || (bounds[1] - bounds[0]) * length < shrink_limit {
        return ShrinkOutcome::Discarded;
    }
    if !shortened {
        return ShrinkOutcome::Retained(*segment);
    }
    let p1 = if bounds[0] > 0.0 { segment.point_at(bounds[0]) } else { segment.p1 };
    let p2 = if bounds[1] < 1.0 { segment.point_at(bounds[1]) } else { segment.p2 };
    ShrinkOutcome::Shrunk(Segment::new(p1, p2))
}

/// Smallest vertex-to-segment distance, ignoring vertices on the segment
fn closest_vertex_distance(vertices: &[Vec3], segment: &Segment, eps: f64) -> Option<f64> {
    vertices
        .iter()
        .map(|v| point_to_segment(*v, segment))
        .filter(|d| *d > eps)
        .reduce(f64::min)
}

/// Repair `segment` against every edge of a polygon
///
/// Rejects intersections running nearly parallel and close to an edge,
/// intersections the shrink repair cannot fix, and intersections spanning
/// two edges that pass too close to one of the polygon's vertices.
pub fn check_close_edge(
    vertices: &[Vec3],
    segment: Segment,
    limits: &ShrinkLimits,
) -> Result<(Segment, bool), EdgeViolation> {
    let ShrinkLimits { shrink_limit, min_dist, first_node_min_dist, eps } = *limits;
    let mut current = segment;
    let mut shortened = false;
    let mut on_edge = 0;

    for edge in polygon::edges(vertices) {
        let mut dists = [
            point_to_segment(current.p1, &edge),
            point_to_segment(current.p2, &edge),
            point_to_segment(edge.p1, &current),
            point_to_segment(edge.p2, &current),
        ];
        dists.sort_by(f64::total_cmp);
        // Running alongside the edge
        if dists[0] > eps && dists[1] < min_dist {
            return Err(EdgeViolation::CloseToEdge);
        }

        let gap = segment_to_segment(&edge, &current);
        let outcome = if gap <= eps {
            on_edge += 1;
            shrink_intersection(&current, &edge, shrink_limit, first_node_min_dist, min_dist, eps)
        } else if gap < min_dist {
            shrink_intersection(&current, &edge, shrink_limit, min_dist, min_dist, eps)
        } else {
            continue;
        };

        match outcome {
            ShrinkOutcome::Retained(s) => current = s,
            ShrinkOutcome::Shrunk(s) => {
                current = s;
                shortened = true;
            }
            ShrinkOutcome::Discarded => return Err(EdgeViolation::CloseToEdge),
        }
    }

    if on_edge >= 2 {
        if let Some(d) = closest_vertex_distance(vertices, &current, eps) {
            if d < min_dist {
                return Err(EdgeViolation::CloseToNode);
            }
        }
    }
    Ok((current, shortened))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(a: [f64; 3], b: [f64; 3]) -> Segment {
        Segment::new(Vec3::from_array(a), Vec3::from_array(b))
    }

    fn limits(length: f64) -> ShrinkLimits {
        ShrinkLimits {
            shrink_limit: (0.9 * length).max(0.1),
            min_dist: 0.1,
            first_node_min_dist: 0.04,
            eps: 1e-9,
        }
    }

    #[test]
    fn test_endpoint_near_edge_moves_inward() {
        let segment = seg([0.05, 0.0, 0.0], [3.0, 0.0, 0.0]);
        let edge = seg([0.0, -1.0, 0.0], [0.0, 1.0, 0.0]);
        let outcome = shrink_intersection(&segment, &edge, 2.0, 0.1, 0.1, 1e-9);
        let ShrinkOutcome::Shrunk(repaired) = outcome else {
            panic!("expected a shrunk segment, got {:?}", outcome);
        };
        assert!(repaired.p1.x > 0.1);
        assert_eq!(repaired.p2, segment.p2);
        assert!(repaired.length() >= 2.0);
    }

    #[test]
    fn test_shrink_is_idempotent() {
        let segment = seg([0.05, 0.0, 0.0], [3.0, 0.0, 0.0]);
        let edge = seg([0.0, -1.0, 0.0], [0.0, 1.0, 0.0]);
        let first = shrink_intersection(&segment, &edge, 2.0, 0.1, 0.1, 1e-9);
        let repaired = first.segment().unwrap();
        let second = shrink_intersection(&repaired, &edge, 2.0, 0.1, 0.1, 1e-9);
        assert_eq!(second, ShrinkOutcome::Retained(repaired));
    }

    #[test]
    fn test_short_segment_is_discarded() {
        let segment = seg([0.05, 0.0, 0.0], [0.12, 0.0, 0.0]);
        let edge = seg([0.0, -1.0, 0.0], [0.0, 1.0, 0.0]);
        assert_eq!(
            shrink_intersection(&segment, &edge, 0.1, 0.1, 0.1, 1e-9),
            ShrinkOutcome::Discarded
        );
    }

    #[test]
    fn test_perpendicular_crossing_is_kept() {
        // Endpoints on opposite edges of a square, crossing at right angles
        let square = vec![
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
        ];
        let segment = seg([0.0, -1.0, 0.0], [0.0, 1.0, 0.0]);
        let (repaired, shortened) = check_close_edge(&square, segment, &limits(2.0)).unwrap();
        assert!(!shortened);
        assert_eq!(repaired, segment);
    }

    #[test]
    fn test_segment_along_edge_is_rejected() {
        let square = vec![
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
        ];
        let segment = seg([0.95, -0.5, 0.0], [0.95, 0.5, 0.0]);
        assert_eq!(
            check_close_edge(&square, segment, &limits(1.0)),
            Err(EdgeViolation::CloseToEdge)
        );
    }

    #[test]
    fn test_corner_cut_near_vertex_is_rejected() {
        let square = vec![
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
        ];
        // Clips the corner at (1, 1): both endpoints on edges, vertex 0.035 away
        let segment = seg([0.95, 1.0, 0.0], [1.0, 0.95, 0.0]);
        assert!(check_close_edge(&square, segment, &limits(segment.length())).is_err());
    }
}
