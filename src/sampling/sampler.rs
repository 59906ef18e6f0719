//! Candidate shape synthesis from family distributions
//!
//! The sampler owns the run's only random stream. Every draw happens in a
//! fixed order (radius, twist, normal, translation, aperture) so a seed and a
//! family order fully determine the candidate sequence.

use ordered_float::OrderedFloat;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::config::{FamilyConfig, GenerationConfig};
use crate::core::error::{DfnError, Result};
use crate::core::types::{FamilyId, Vec3};
use crate::geometry::domain::BoxRegion;
use crate::geometry::polygon;
use crate::geometry::shape::{Shape, ShapeKind};
use crate::sampling::distribution::{sample_aperture, sample_normal, sample_rotation, sample_size};

/// Most radii pre-drawn for one family
///
/// Members beyond this draw their radius on demand, still largest-first
/// within the pre-drawn part.
pub const MAX_PREDRAWN_RADII: usize = 100_000;

/// Families ordered by largest possible radius, descending
///
/// Ties keep configuration order.
pub fn family_order(config: &GenerationConfig) -> Vec<FamilyId> {
    let mut order: Vec<FamilyId> = (0..config.families.len()).map(FamilyId::from_index).collect();
    order.sort_by_key(|id| std::cmp::Reverse(OrderedFloat(config.families[id.index()].max_radius())));
    order
}

struct FamilySlot {
    config: FamilyConfig,
    region: BoxRegion,
    /// Ellipse parametric angles, computed once per family
    thetas: Option<Vec<f64>>,
    /// Pre-drawn radii, ascending so `pop` yields the largest
    radii: Vec<f64>,
}

pub struct ShapeFamilySampler {
    rng: ChaCha8Rng,
    slots: Vec<FamilySlot>,
}

impl ShapeFamilySampler {
    /// Build a sampler seeded from `config.seed`
    ///
    /// `config` must already be validated; every size distribution then
    /// yields a radius on every draw.
    pub fn new(config: &GenerationConfig) -> Self {
        let default_region = config.domain.sampling_region(config.domain_size_increase);
        let slots = config
            .families
            .iter()
            .map(|family| FamilySlot {
                config: family.clone(),
                region: family.region.unwrap_or(default_region),
                thetas: match family.kind {
                    ShapeKind::Ellipse { points } => Some(polygon::ellipse_thetas(family.aspect_ratio, points)),
                    ShapeKind::Rectangle | ShapeKind::Polygon { .. } => None,
                },
                radii: Vec::new(),
            })
            .collect();

        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            slots,
        }
    }

    fn slot(&self, family: FamilyId) -> Result<&FamilySlot> {
        self.slots.get(family.index()).ok_or(DfnError::UnknownFamily(family))
    }

    fn slot_mut(&mut self, family: FamilyId) -> Result<&mut FamilySlot> {
        self.slots.get_mut(family.index()).ok_or(DfnError::UnknownFamily(family))
    }

    /// Pre-draw up to `count` radii for a family, consumed largest first
    pub fn prepare_radii(&mut self, family: FamilyId, count: usize) -> Result<()> {
        let dist = self.slot(family)?.config.size;
        let count = count.min(MAX_PREDRAWN_RADII);
        let mut radii: Vec<f64> = (0..count).map(|_| sample_size(&dist, &mut self.rng)).collect();
        radii.sort_by_key(|r| OrderedFloat(*r));
        self.slot_mut(family)?.radii = radii;
        Ok(())
    }

    /// Make the family's next member use its largest possible radius
    pub fn force_largest(&mut self, family: FamilyId) -> Result<()> {
        let slot = self.slot_mut(family)?;
        let largest = slot.config.max_radius();
        slot.radii.push(largest);
        Ok(())
    }

    #[cfg(test)]
    fn remaining_radii(&self, family: FamilyId) -> usize {
        self.slots.get(family.index()).map_or(0, |s| s.radii.len())
    }

    /// Move to an independent sub-stream of the same seed
    pub fn reseed_stream(&mut self, stream: u64) {
        self.rng.set_stream(stream);
        for slot in &mut self.slots {
            slot.radii.clear();
        }
    }

    fn translation(&mut self, region: &BoxRegion) -> Vec3 {
        let mut t = [0.0; 3];
        for (axis, value) in t.iter_mut().enumerate() {
            *value = self.rng.gen_range(region.min[axis]..=region.max[axis]);
        }
        Vec3::from_array(t)
    }

    /// Draw a fresh, untruncated candidate from `family`
    pub fn next(&mut self, family: FamilyId) -> Result<Shape> {
        let rng = &mut self.rng;
        let slot = self.slots.get_mut(family.index()).ok_or(DfnError::UnknownFamily(family))?;
        let x_radius = match slot.radii.pop() {
            Some(r) => r,
            None => sample_size(&slot.config.size, rng),
        };
        let FamilyConfig { kind, aspect_ratio, orientation, rotation, aperture, .. } = slot.config;
        let region = slot.region;
        let y_radius = x_radius * aspect_ratio;
        let flat = match &slot.thetas {
            Some(thetas) => polygon::ellipse_vertices(x_radius, y_radius, thetas),
            None => polygon::rectangle_vertices(x_radius, y_radius),
        };

        let beta = sample_rotation(&rotation, &mut self.rng);
        let normal = sample_normal(&orientation, &mut self.rng);
        let translation = self.translation(&region);
        let aperture = sample_aperture(&aperture, 0.5 * (x_radius + y_radius), &mut self.rng);

        let vertices = polygon::place(&flat, beta, normal, translation);
        Ok(Shape::new(
            family,
            kind,
            vertices,
            normal,
            translation,
            x_radius,
            y_radius,
            beta,
            aperture,
        ))
    }

    /// Same shape, new translation drawn from its family's region
    pub fn retranslate(&mut self, shape: &Shape) -> Result<Shape> {
        let region = self.slot(shape.family)?.region;
        let translation = self.translation(&region);
        Ok(shape.moved_to(translation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StopCondition;
    use crate::sampling::distribution::{ConstantParams, SizeDistribution};

    fn two_family_config() -> GenerationConfig {
        let mut config = GenerationConfig::default();
        let mut small = config.families[0].clone();
        small.size = SizeDistribution::Constant(ConstantParams { radius: 0.5 });
        small.kind = ShapeKind::Ellipse { points: 12 };
        config.families.insert(0, small);
        config.stop_condition = StopCondition::Count { target: 20 };
        config
    }

    #[test]
    fn test_family_order_largest_first() {
        let config = two_family_config();
        assert_eq!(family_order(&config), vec![FamilyId(1), FamilyId(0)]);
    }

    #[test]
    fn test_same_seed_same_candidates() {
        let config = two_family_config();
        let mut a = ShapeFamilySampler::new(&config);
        let mut b = ShapeFamilySampler::new(&config);
        for _ in 0..10 {
            assert_eq!(a.next(FamilyId(1)).unwrap(), b.next(FamilyId(1)).unwrap());
        }
    }

    #[test]
    fn test_prepared_radii_descend() {
        let config = two_family_config();
        let mut sampler = ShapeFamilySampler::new(&config);
        sampler.prepare_radii(FamilyId(1), 8).unwrap();
        let radii: Vec<f64> = (0..8).map(|_| sampler.next(FamilyId(1)).unwrap().radius()).collect();
        assert!(radii.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(sampler.remaining_radii(FamilyId(1)), 0);
    }

    #[test]
    fn test_ellipse_candidate_shape() {
        let config = two_family_config();
        let mut sampler = ShapeFamilySampler::new(&config);
        let shape = sampler.next(FamilyId(0)).unwrap();
        assert_eq!(shape.vertices.len(), 12);
        assert_eq!(shape.kind.vertex_count(), 12);
        assert_eq!(shape.radius(), 0.5);
        assert!(polygon::planarity_error(&shape.vertices, shape.normal) < 1e-9);
        assert!(polygon::is_simple(&shape.vertices, shape.normal));
    }

    #[test]
    fn test_region_limits_translation() {
        let mut config = two_family_config();
        config.families[1].region = Some(BoxRegion { min: [0.0, 0.0, 2.0], max: [1.0, 1.0, 3.0] });
        let mut sampler = ShapeFamilySampler::new(&config);
        for _ in 0..20 {
            let shape = sampler.next(FamilyId(1)).unwrap();
            assert!(shape.translation.z >= 2.0 && shape.translation.z <= 3.0);
            let moved = sampler.retranslate(&shape).unwrap();
            assert!(moved.translation.x >= 0.0 && moved.translation.x <= 1.0);
            assert_eq!(moved.normal, shape.normal);
        }
    }

    #[test]
    fn test_reseed_changes_candidates() {
        let config = two_family_config();
        let mut a = ShapeFamilySampler::new(&config);
        let mut b = ShapeFamilySampler::new(&config);
        b.reseed_stream(1);
        let first: Vec<Shape> = (0..5).map(|_| a.next(FamilyId(1)).unwrap()).collect();
        let second: Vec<Shape> = (0..5).map(|_| b.next(FamilyId(1)).unwrap()).collect();
        assert_ne!(first, second);

        // Same sub-stream, same sequence
        let mut c = ShapeFamilySampler::new(&config);
        c.reseed_stream(1);
        let third: Vec<Shape> = (0..5).map(|_| c.next(FamilyId(1)).unwrap()).collect();
        assert_eq!(second, third);
    }

    #[test]
    fn test_reseed_drops_prepared_radii() {
        let config = two_family_config();
        let mut sampler = ShapeFamilySampler::new(&config);
        sampler.prepare_radii(FamilyId(1), 4).unwrap();
        sampler.reseed_stream(2);
        assert_eq!(sampler.remaining_radii(FamilyId(1)), 0);
    }

    #[test]
    fn test_prepared_radii_are_capped() {
        let config = two_family_config();
        let mut sampler = ShapeFamilySampler::new(&config);
        sampler.prepare_radii(FamilyId(0), usize::MAX).unwrap();
        assert_eq!(sampler.remaining_radii(FamilyId(0)), MAX_PREDRAWN_RADII);
    }

    #[test]
    fn test_force_largest_comes_first() {
        let config = two_family_config();
        let mut sampler = ShapeFamilySampler::new(&config);
        sampler.prepare_radii(FamilyId(1), 3).unwrap();
        sampler.force_largest(FamilyId(1)).unwrap();
        assert_eq!(sampler.next(FamilyId(1)).unwrap().radius(), 5.0);
        assert_eq!(sampler.remaining_radii(FamilyId(1)), 3);
        assert!(sampler.force_largest(FamilyId(9)).is_err());
    }
}
