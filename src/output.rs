//! Generation output and serialization

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::types::{BoundaryFaces, FamilyId, ShapeId, Vec3};
use crate::generation::network::{Cluster, IntersectionSegment, NetworkAssembler};
use crate::generation::stats::Stats;
use crate::geometry::shape::Shape;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Stop condition reached (and connectivity satisfied, when required)
    Complete,
    /// Some families ran out of retries; the network holds what was achieved
    Stagnated { families: Vec<FamilyId> },
    /// The global candidate budget ran out
    BudgetExhausted,
    /// Stopped by the control signal
    Interrupted,
    /// No percolating cluster after every global retry
    ConstraintFailed { retries: u32 },
}

impl GenerationStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, GenerationStatus::Complete)
    }
}

/// Which shapes downstream tooling should keep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Keep shapes that intersect nothing
    pub keep_isolated: bool,
    /// Keep only the largest cluster (largest percolating one with `percolating_only`)
    pub largest_cluster_only: bool,
    /// Keep only clusters spanning the required boundary faces
    pub percolating_only: bool,
    /// Drop shapes with a radius below this, after cluster selection
    pub min_radius: f64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_isolated: true,
            largest_cluster_only: false,
            percolating_only: false,
            min_radius: 0.0,
        }
    }
}

/// Clusters of `shapes` joined by `edges`, largest first, ties by lowest member
fn group_shapes(shapes: &[Shape], edges: &[IntersectionSegment]) -> Vec<Cluster> {
    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut parent: Vec<usize> = (0..shapes.len()).collect();
    for edge in edges {
        let a = root(&mut parent, edge.shape.index());
        let b = root(&mut parent, edge.partner.index());
        // Lower index stays root so a cluster's root is its first member
        parent[a.max(b)] = a.min(b);
    }

    let mut by_root: Vec<Option<Cluster>> = vec![None; shapes.len()];
    for (i, shape) in shapes.iter().enumerate() {
        let r = root(&mut parent, i);
        let cluster = by_root[r].get_or_insert_with(|| Cluster {
            root: ShapeId::from_index(r),
            members: Vec::new(),
            faces: BoundaryFaces::NONE,
        });
        cluster.members.push(ShapeId::from_index(i));
        cluster.faces.insert(shape.faces);
    }
    let mut clusters: Vec<Cluster> = by_root.into_iter().flatten().collect();
    clusters.sort_by(|a, b| b.size().cmp(&a.size()).then(a.root.cmp(&b.root)));
    clusters
}

/// Cluster index per shape, and the clusters covering `required`
fn index_clusters(clusters: &[Cluster], shape_count: usize, required: BoundaryFaces) -> (Vec<usize>, Vec<usize>) {
    let mut membership = vec![0; shape_count];
    for (index, cluster) in clusters.iter().enumerate() {
        for member in &cluster.members {
            membership[member.index()] = index;
        }
    }
    let percolating = if required.is_empty() {
        Vec::new()
    } else {
        clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| c.faces.covers(required))
            .map(|(i, _)| i)
            .collect()
    };
    (membership, percolating)
}

/// Complete generation output
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub shapes: Vec<Shape>,
    pub intersections: Vec<IntersectionSegment>,
    pub triple_points: Vec<Vec3>,
    /// Largest first
    pub clusters: Vec<Cluster>,
    /// Index into `clusters` for every shape
    pub membership: Vec<usize>,
    /// Indices into `clusters` of those spanning the required faces
    pub percolating: Vec<usize>,
    pub required_faces: BoundaryFaces,
    pub stats: Stats,
    pub status: GenerationStatus,
    pub elapsed_ms: u64,
}

impl GenerationOutput {
    pub fn new(
        network: &NetworkAssembler,
        required_faces: BoundaryFaces,
        stats: Stats,
        status: GenerationStatus,
        elapsed: Duration,
    ) -> Self {
        let clusters = network.clusters();
        let (membership, percolating) = index_clusters(&clusters, network.len(), required_faces);

        Self {
            shapes: network.shapes().to_vec(),
            intersections: network.edges().to_vec(),
            triple_points: network.triple_points().to_vec(),
            clusters,
            membership,
            percolating,
            required_faces,
            stats,
            status,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Shapes selected by `policy`, ascending id
    pub fn retained_shapes(&self, policy: RetentionPolicy) -> Vec<ShapeId> {
        let candidates: Vec<usize> = if policy.percolating_only {
            self.percolating.clone()
        } else {
            (0..self.clusters.len()).collect()
        };
        let chosen: Vec<usize> = if policy.largest_cluster_only {
            // Clusters are sorted largest first
            candidates.into_iter().take(1).collect()
        } else {
            candidates
        };

        let mut ids: Vec<ShapeId> = chosen
            .iter()
            .map(|&i| &self.clusters[i])
            .filter(|c| policy.keep_isolated || c.size() > 1)
            .flat_map(|c| c.members.iter().copied())
            .filter(|id| self.shapes[id.index()].radius() >= policy.min_radius)
            .collect();
        ids.sort();
        ids
    }

    /// Copy of this output holding only the shapes `policy` keeps
    ///
    /// Shapes are renumbered in order. Edges survive when both their shapes
    /// do, triple points when some surviving edge still refers to them, and
    /// clusters are recomputed over what remains. Stats and status describe
    /// the run and are copied unchanged.
    pub fn retain(&self, policy: RetentionPolicy) -> GenerationOutput {
        let kept = self.retained_shapes(policy);
        let mut remap: Vec<Option<ShapeId>> = vec![None; self.shapes.len()];
        for (new, old) in kept.iter().enumerate() {
            remap[old.index()] = Some(ShapeId::from_index(new));
        }
        let shapes: Vec<Shape> = kept.iter().map(|id| self.shapes[id.index()].clone()).collect();

        let mut point_remap: Vec<Option<usize>> = vec![None; self.triple_points.len()];
        let mut triple_points = Vec::new();
        let mut intersections = Vec::new();
        for edge in &self.intersections {
            let (Some(shape), Some(partner)) = (remap[edge.shape.index()], remap[edge.partner.index()]) else {
                continue;
            };
            let mut points = Vec::with_capacity(edge.triple_points.len());
            for &old in &edge.triple_points {
                let new = *point_remap[old].get_or_insert_with(|| {
                    triple_points.push(self.triple_points[old]);
                    triple_points.len() - 1
                });
                points.push(new);
            }
            intersections.push(IntersectionSegment {
                shape,
                partner,
                triple_points: points,
                ..edge.clone()
            });
        }

        let clusters = group_shapes(&shapes, &intersections);
        let (membership, percolating) = index_clusters(&clusters, shapes.len(), self.required_faces);
        tracing::debug!("Retained {} of {} shapes", shapes.len(), self.shapes.len());
        GenerationOutput {
            shapes,
            intersections,
            triple_points,
            clusters,
            membership,
            percolating,
            required_faces: self.required_faces,
            stats: self.stats.clone(),
            status: self.status.clone(),
            elapsed_ms: self.elapsed_ms,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn summary(&self) -> String {
        let largest = self.clusters.first().map_or(0, |c| c.size());
        format!(
            "Accepted {} shapes ({} rejected, {:.2} rejects/accept) in {}ms\n\
             {} intersections, {} clusters (largest {}), {} percolating\n\
             Status: {:?}",
            self.stats.accepted_total,
            self.stats.rejected_total,
            self.stats.rejects_per_accept(),
            self.elapsed_ms,
            self.intersections.len(),
            self.clusters.len(),
            largest,
            self.percolating.len(),
            self.status,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GenerationConfig;
    use crate::generation::rejection::{Acceptance, NewSegment};
    use crate::geometry::distance::Segment;
    use crate::geometry::polygon::{place, rectangle_vertices};
    use crate::geometry::shape::ShapeKind;

    fn square(faces: BoundaryFaces) -> Shape {
        let verts = place(&rectangle_vertices(1.0, 1.0), 0.0, Vec3::Z, Vec3::ZERO);
        let mut shape = Shape::new(FamilyId(0), ShapeKind::Rectangle, verts, Vec3::Z, Vec3::ZERO, 1.0, 1.0, 0.0, 1e-5);
        shape.faces = faces;
        shape
    }

    fn link(partner: u32) -> Acceptance {
        Acceptance {
            segments: vec![NewSegment {
                partner: ShapeId(partner),
                segment: Segment::new(Vec3::ZERO, Vec3::X),
                original_length: 1.0,
                shortened: false,
            }],
            triples: Vec::new(),
        }
    }

    fn sample_output() -> GenerationOutput {
        let mut network = NetworkAssembler::new(&GenerationConfig::default());
        network.commit(square(BoundaryFaces::face(0, false)), Acceptance::default());
        network.commit(square(BoundaryFaces::NONE), Acceptance::default());
        network.commit(square(BoundaryFaces::face(0, true)), link(0));
        let required = BoundaryFaces::face(0, false).union(BoundaryFaces::face(0, true));
        GenerationOutput::new(
            &network,
            required,
            Stats::default(),
            GenerationStatus::Complete,
            Duration::from_millis(5),
        )
    }

    #[test]
    fn test_membership_and_percolation() {
        let output = sample_output();
        assert_eq!(output.clusters.len(), 2);
        assert_eq!(output.membership, vec![0, 1, 0]);
        assert_eq!(output.percolating, vec![0]);
    }

    #[test]
    fn test_retention_policies() {
        let output = sample_output();
        assert_eq!(output.retained_shapes(RetentionPolicy::default()).len(), 3);

        let no_isolated = RetentionPolicy { keep_isolated: false, ..RetentionPolicy::default() };
        assert_eq!(output.retained_shapes(no_isolated), vec![ShapeId(0), ShapeId(2)]);

        let largest = RetentionPolicy { largest_cluster_only: true, ..RetentionPolicy::default() };
        assert_eq!(output.retained_shapes(largest), vec![ShapeId(0), ShapeId(2)]);
    }

    #[test]
    fn test_min_radius_filter() {
        let mut output = sample_output();
        output.shapes[1].x_radius = 0.2;
        let policy = RetentionPolicy { min_radius: 0.5, ..RetentionPolicy::default() };
        assert_eq!(output.retained_shapes(policy), vec![ShapeId(0), ShapeId(2)]);
    }

    #[test]
    fn test_retain_rewrites_network() {
        let mut output = sample_output();
        output.triple_points = vec![Vec3::ONE];
        output.intersections[0].triple_points = vec![0];

        let linked = output.retain(RetentionPolicy { keep_isolated: false, ..RetentionPolicy::default() });
        assert_eq!(linked.shapes.len(), 2);
        assert_eq!(linked.intersections.len(), 1);
        assert_eq!(linked.intersections[0].shape, ShapeId(1));
        assert_eq!(linked.intersections[0].partner, ShapeId(0));
        assert_eq!(linked.intersections[0].triple_points, vec![0]);
        assert_eq!(linked.triple_points, vec![Vec3::ONE]);
        assert_eq!(linked.clusters.len(), 1);
        assert_eq!(linked.membership, vec![0, 0]);
        assert_eq!(linked.percolating, vec![0]);

        // Dropping the edge's second shape drops the edge and splits the cluster
        output.shapes[2].x_radius = 0.2;
        let large = output.retain(RetentionPolicy { min_radius: 0.5, ..RetentionPolicy::default() });
        assert_eq!(large.shapes.len(), 2);
        assert!(large.intersections.is_empty());
        assert!(large.triple_points.is_empty());
        assert_eq!(large.clusters.len(), 2);
        assert!(large.clusters.iter().all(|c| c.size() == 1));
        assert!(large.percolating.is_empty());
        assert_eq!(large.stats, output.stats);
    }

    #[test]
    fn test_json_round_trip() {
        let output = sample_output();
        let json = output.to_json();
        let parsed: GenerationOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.shapes.len(), 3);
        assert_eq!(parsed.status, GenerationStatus::Complete);
        assert!(output.summary().contains("Accepted 0 shapes"));
    }
}
