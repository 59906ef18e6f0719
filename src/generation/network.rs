//! The accepted-shape network: shapes, intersection edges, connectivity
//!
//! Connectivity is tracked with a union-find arena indexed by `ShapeId`, so
//! clusters never hold references to shapes. The whole assembler is plain
//! owned data; a checkpoint is a full copy and restoring replaces the state
//! in one assignment.

use serde::{Deserialize, Serialize};

use crate::core::config::{GenerationConfig, StopCondition};
use crate::core::types::{BoundaryFaces, FamilyId, ShapeId, Vec3};
use crate::generation::rejection::Acceptance;
use crate::geometry::distance::Segment;
use crate::geometry::shape::Shape;

/// An accepted intersection between two shapes (a network edge)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionSegment {
    pub p1: Vec3,
    pub p2: Vec3,
    /// Earlier shape of the pair
    pub partner: ShapeId,
    /// Shape whose acceptance created this edge
    pub shape: ShapeId,
    /// Length before shrink repair
    pub original_length: f64,
    pub shortened: bool,
    /// Indices into the network's triple point list
    pub triple_points: Vec<usize>,
}

impl IntersectionSegment {
    pub fn segment(&self) -> Segment {
        Segment::new(self.p1, self.p2)
    }

    pub fn length(&self) -> f64 {
        self.p1.distance(self.p2)
    }

    pub fn other(&self, id: ShapeId) -> ShapeId {
        if id == self.shape {
            self.partner
        } else {
            self.shape
        }
    }
}

/// One union-find arena slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupData {
    pub parent: u32,
    /// Member count, valid on roots only
    pub size: u32,
    /// Boundary faces touched by any member, valid on roots only
    pub faces: BoundaryFaces,
}

/// A connected component of intersecting shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub root: ShapeId,
    pub members: Vec<ShapeId>,
    pub faces: BoundaryFaces,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Saved network state
#[derive(Debug, Clone)]
pub struct Checkpoint(NetworkAssembler);

impl Checkpoint {
    pub fn shape_count(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Clone)]
pub struct NetworkAssembler {
    shapes: Vec<Shape>,
    edges: Vec<IntersectionSegment>,
    /// Edge indices per shape
    shape_edges: Vec<Vec<usize>>,
    triple_points: Vec<Vec3>,
    groups: Vec<GroupData>,
    /// Accumulated P32 per family
    p32: Vec<f64>,
    /// Volume each family's intensity is measured over
    family_volumes: Vec<f64>,
    p32_targets: Vec<Option<f64>>,
    /// Committed user shapes, left out of the count target
    user_shapes: usize,
    stop: StopCondition,
    eps: f64,
}

impl NetworkAssembler {
    pub fn new(config: &GenerationConfig) -> Self {
        let family_volumes = config
            .families
            .iter()
            .map(|f| match &f.region {
                Some(region) => region.clamped_to(&config.domain).volume(),
                None => config.domain.volume(),
            })
            .collect();
        Self {
            shapes: Vec::new(),
            edges: Vec::new(),
            shape_edges: Vec::new(),
            triple_points: Vec::new(),
            groups: Vec::new(),
            p32: vec![0.0; config.families.len()],
            family_volumes,
            p32_targets: config.families.iter().map(|f| f.p32_target).collect(),
            user_shapes: 0,
            stop: config.stop_condition.clone(),
            eps: config.tolerance,
        }
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Id the next committed shape will receive
    pub fn next_id(&self) -> ShapeId {
        ShapeId::from_index(self.shapes.len())
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shape(&self, id: ShapeId) -> &Shape {
        &self.shapes[id.index()]
    }

    pub fn edges(&self) -> &[IntersectionSegment] {
        &self.edges
    }

    /// Edges touching `id`, with their indices
    pub fn edges_of(&self, id: ShapeId) -> impl Iterator<Item = (usize, &IntersectionSegment)> + '_ {
        self.shape_edges[id.index()].iter().map(move |&i| (i, &self.edges[i]))
    }

    pub fn triple_points(&self) -> &[Vec3] {
        &self.triple_points
    }

    pub fn p32(&self, family: FamilyId) -> f64 {
        self.p32.get(family.index()).copied().unwrap_or(0.0)
    }

    pub fn family_count(&self, family: FamilyId) -> usize {
        self.shapes.iter().filter(|s| s.family == family).count()
    }

    /// Insert an accepted shape with its (already repaired) intersections
    pub fn commit(&mut self, shape: Shape, acceptance: Acceptance) -> ShapeId {
        let id = self.next_id();
        if shape.family.is_user() {
            self.user_shapes += 1;
        }
        let family = shape.family.index();
        if let (Some(p32), Some(volume)) = (self.p32.get_mut(family), self.family_volumes.get(family)) {
            *p32 += 2.0 * shape.area() / volume;
        }

        self.groups.push(GroupData {
            parent: id.0,
            size: 1,
            faces: shape.faces,
        });
        self.shapes.push(shape);
        self.shape_edges.push(Vec::new());

        let first_new_edge = self.edges.len();
        for seg in &acceptance.segments {
            let index = self.edges.len();
            self.edges.push(IntersectionSegment {
                p1: seg.segment.p1,
                p2: seg.segment.p2,
                partner: seg.partner,
                shape: id,
                original_length: seg.original_length,
                shortened: seg.shortened,
                triple_points: Vec::new(),
            });
            self.shape_edges[seg.partner.index()].push(index);
            self.shape_edges[id.index()].push(index);
            self.union(id, seg.partner);
        }

        let first_new_triple = self.triple_points.len();
        for triple in &acceptance.triples {
            let existing = self.triple_points[first_new_triple..]
                .iter()
                .position(|p| p.distance(triple.point) <= self.eps)
                .map(|i| i + first_new_triple);
            let point_index = existing.unwrap_or_else(|| {
                self.triple_points.push(triple.point);
                self.triple_points.len() - 1
            });

            let new_edge = acceptance
                .segments
                .iter()
                .position(|s| s.partner == triple.partner)
                .map(|i| i + first_new_edge);
            for edge in triple.existing_edge.into_iter().chain(new_edge) {
                let list = &mut self.edges[edge].triple_points;
                if !list.contains(&point_index) {
                    list.push(point_index);
                }
            }
        }
        id
    }

    /// Root of `id`'s cluster
    pub fn find(&self, id: ShapeId) -> ShapeId {
        let mut current = id.0;
        while self.groups[current as usize].parent != current {
            current = self.groups[current as usize].parent;
        }
        ShapeId(current)
    }

    fn find_compress(&mut self, id: ShapeId) -> u32 {
        let mut current = id.0;
        while self.groups[current as usize].parent != current {
            let parent = self.groups[current as usize].parent;
            // Path halving
            self.groups[current as usize].parent = self.groups[parent as usize].parent;
            current = parent;
        }
        current
    }

    /// Merge two clusters; the larger root survives, ties keep the lower id
    fn union(&mut self, a: ShapeId, b: ShapeId) {
        let ra = self.find_compress(a);
        let rb = self.find_compress(b);
        if ra == rb {
            return;
        }
        let (sa, sb) = (self.groups[ra as usize].size, self.groups[rb as usize].size);
        let (root, child) = if sa > sb || (sa == sb && ra < rb) { (ra, rb) } else { (rb, ra) };
        let child_data = self.groups[child as usize];
        let root_data = &mut self.groups[root as usize];
        root_data.size += child_data.size;
        root_data.faces.insert(child_data.faces);
        self.groups[child as usize].parent = root;
    }

    pub fn group(&self, id: ShapeId) -> GroupData {
        self.groups[self.find(id).index()]
    }

    pub fn cluster_size(&self, id: ShapeId) -> usize {
        self.group(id).size as usize
    }

    /// All clusters, largest first, ties by root id
    pub fn clusters(&self) -> Vec<Cluster> {
        let mut by_root: Vec<Option<Cluster>> = vec![None; self.shapes.len()];
        for i in 0..self.shapes.len() {
            let id = ShapeId::from_index(i);
            let root = self.find(id);
            by_root[root.index()]
                .get_or_insert_with(|| Cluster {
                    root,
                    members: Vec::new(),
                    faces: self.groups[root.index()].faces,
                })
                .members
                .push(id);
        }
        let mut clusters: Vec<Cluster> = by_root.into_iter().flatten().collect();
        clusters.sort_by(|a, b| b.size().cmp(&a.size()).then(a.root.cmp(&b.root)));
        clusters
    }

    /// Clusters touching every face in `required`
    pub fn percolating_clusters(&self, required: BoundaryFaces) -> Vec<Cluster> {
        if required.is_empty() {
            return Vec::new();
        }
        self.clusters().into_iter().filter(|c| c.faces.covers(required)).collect()
    }

    /// Whether `family` has reached its intensity target
    pub fn family_target_met(&self, family: FamilyId) -> bool {
        match self.p32_targets.get(family.index()).copied().flatten() {
            Some(target) => self.p32(family) >= target,
            None => true,
        }
    }

    pub fn is_stop_condition_met(&self) -> bool {
        match self.stop {
            StopCondition::Count { target } => self.shapes.len() - self.user_shapes >= target,
            StopCondition::Intensity => {
                (0..self.p32.len()).all(|i| self.family_target_met(FamilyId::from_index(i)))
            }
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.clone())
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        *self = checkpoint.0;
    }
}
