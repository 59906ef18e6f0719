//! Generation configuration with documented constants
//!
//! The configuration is an already-parsed description of the network to
//! build: the domain, the statistical families, the stop condition, and the
//! geometric admissibility thresholds. It can be deserialized from TOML, but
//! the generator itself only ever sees the parsed struct.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{DfnError, Result};
use crate::core::types::{BoundaryFaces, FamilyId};
use crate::geometry::domain::{BoxRegion, Domain};
use crate::geometry::shape::ShapeKind;
use crate::sampling::distribution::{
    ApertureModel, OrientationDistribution, RotationDistribution, SizeDistribution, MIN_SIZE_MASS,
};
use crate::sampling::user::UserShape;

/// When the generation loop is finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopCondition {
    /// Stop once `target` shapes have been accepted
    ///
    /// Each family's share of the target comes from its `probability` weight.
    Count { target: usize },
    /// Stop once every family has reached its `p32_target` intensity
    Intensity,
}

/// Minimum feature size and intersection repair thresholds
///
/// Named after the feature rejection algorithm for meshing: every accepted
/// feature (intersection length, distance between intersections, distance
/// from an intersection to a polygon edge) must be at least `h` so that the
/// downstream mesher can resolve it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramConfig {
    /// Minimum feature size (world units)
    ///
    /// Also the minimum admissible intersection length and the `minDist`
    /// threshold used by shrink repair.
    pub h: f64,

    /// Skip all intersection admissibility checks
    ///
    /// Intersections are still computed and recorded as network edges.
    pub disabled: bool,

    /// Only reject on short intersections
    ///
    /// Edge proximity, intersection spacing and triple point checks are
    /// skipped. The resulting network may not mesh conformingly.
    pub relaxed: bool,

    /// Fraction of its original length an intersection may shrink to
    ///
    /// At 0.9, shrink repair may trim up to 10% of the segment before the
    /// candidate is rejected instead.
    pub shrink_fraction: f64,

    /// First discretized node distance, as a fraction of `h`
    ///
    /// Intersections that start exactly on a polygon edge are allowed a
    /// shorter first node so shallow crossing angles are not trimmed.
    pub first_node_fraction: f64,

    /// Allow three fractures to meet in a single point
    pub triple_intersections: bool,
}

impl Default for FramConfig {
    fn default() -> Self {
        Self {
            h: 0.1,
            disabled: false,
            relaxed: false,
            shrink_fraction: 0.9,
            first_node_fraction: 0.4,
            triple_intersections: false,
        }
    }
}

/// Connectivity requirements checked once generation finishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Require at least one cluster touching every face in `boundary_faces`
    pub require_percolation: bool,

    /// Faces a percolating cluster must touch: [-x, +x, -y, +y, -z, +z]
    pub boundary_faces: [bool; 6],

    /// How many times a failed run is rolled back and retried
    ///
    /// Each retry restores the checkpoint taken before the last family and
    /// continues on a fresh random sub-stream.
    pub max_global_retries: u32,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            require_percolation: false,
            boundary_faces: [true, true, false, false, false, false],
            max_global_retries: 3,
        }
    }
}

impl ConnectivityConfig {
    pub fn required_faces(&self) -> BoundaryFaces {
        BoundaryFaces::from_flags(self.boundary_faces)
    }
}

/// One stochastic shape family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyConfig {
    #[serde(default)]
    pub name: String,
    pub kind: ShapeKind,
    /// y-radius / x-radius
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: f64,
    pub size: SizeDistribution,
    pub orientation: OrientationDistribution,
    #[serde(default)]
    pub rotation: RotationDistribution,
    #[serde(default)]
    pub aperture: ApertureModel,
    /// Relative weight of this family in count mode
    #[serde(default = "default_probability")]
    pub probability: f64,
    /// Target P32 intensity in intensity mode
    #[serde(default)]
    pub p32_target: Option<f64>,
    /// Restrict translations to a sub-box of the domain (layer or region)
    #[serde(default)]
    pub region: Option<BoxRegion>,
}

fn default_aspect_ratio() -> f64 {
    1.0
}

fn default_probability() -> f64 {
    1.0
}

impl FamilyConfig {
    /// Largest radius this family can ever produce
    pub fn max_radius(&self) -> f64 {
        self.size.bounds().1
    }

    fn validate(&self, id: FamilyId, config: &GenerationConfig) -> Result<()> {
        let describe = |msg: String| DfnError::InvalidConfig(format!("{}: {}", id, msg));
        let invalid = |msg: String| Err(describe(msg));

        if !(self.aspect_ratio > 0.0) || !self.aspect_ratio.is_finite() {
            return invalid(format!("aspect_ratio must be positive, got {}", self.aspect_ratio));
        }
        match self.kind {
            ShapeKind::Ellipse { points } if points < 3 => {
                return invalid(format!("ellipses need at least 3 points, got {}", points));
            }
            ShapeKind::Polygon { .. } => {
                return invalid("polygon outlines are only available as user shapes".into());
            }
            _ => {}
        }
        self.size
            .validate(config.fram.h)
            .map_err(describe)?;
        let mass = self.size.mass();
        if !(mass >= MIN_SIZE_MASS) {
            let (min, max) = self.size.bounds();
            return Err(DfnError::UnsatisfiableSize { family: id, min, max, mass });
        }
        self.orientation.validate().map_err(describe)?;
        self.aperture.validate().map_err(describe)?;

        if !(self.probability >= 0.0) || !self.probability.is_finite() {
            return invalid(format!("probability must be non-negative, got {}", self.probability));
        }
        if config.stop_condition == StopCondition::Intensity {
            match self.p32_target {
                Some(target) if target > 0.0 && target.is_finite() => {}
                _ => return invalid("intensity stop condition needs a positive p32_target".into()),
            }
        }
        if let Some(region) = &self.region {
            region.validate().map_err(describe)?;
            if region.clamped_to(&config.domain).validate().is_err() {
                return invalid(format!("region {:?} does not overlap the domain", region));
            }
        }
        Ok(())
    }
}

/// Configuration for a generation run
///
/// Defaults describe a small single-family network that generates quickly;
/// real runs override nearly everything from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Seed for the single random stream
    pub seed: u64,

    /// Axis-aligned domain centred at the origin
    pub domain: Domain,

    /// Extra room added to the translation sampling box (world units)
    ///
    /// Lets fracture centres land outside the domain so that shapes crossing
    /// the walls are as likely as interior ones.
    pub domain_size_increase: [f64; 3],

    pub stop_condition: StopCondition,

    pub families: Vec<FamilyConfig>,

    /// Fixed shapes tested before (or after) the stochastic families
    ///
    /// User shapes are not counted towards a count stop condition and have
    /// no P32 target.
    pub user_shapes: Vec<UserShape>,

    /// Insert user shapes before the stochastic families instead of after
    pub user_shapes_first: bool,

    /// Start every family with one member at its largest possible radius
    pub force_large_fractures: bool,

    pub fram: FramConfig,

    /// Absolute tolerance for every floating point comparison
    pub tolerance: f64,

    /// Clip shapes at the domain walls instead of rejecting them as outside
    pub truncate_to_domain: bool,

    /// Re-translation attempts for one family member before it is discarded
    pub rejects_per_fracture: u32,

    /// Discarded members after which a family counts as stagnated
    pub max_rejected_per_family: u64,

    /// Global candidate budget for the whole run
    pub max_candidates: u64,

    pub connectivity: ConnectivityConfig,

    /// Accepted-set size above which pairwise intersection tests run in parallel
    ///
    /// Below this the rayon fork/join overhead exceeds the work.
    pub parallel_threshold: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            domain: Domain::new([20.0, 20.0, 20.0]),
            domain_size_increase: [0.0, 0.0, 0.0],
            stop_condition: StopCondition::Count { target: 50 },
            families: vec![FamilyConfig {
                name: "default".into(),
                kind: ShapeKind::Rectangle,
                aspect_ratio: 1.0,
                size: SizeDistribution::PowerLaw(crate::sampling::distribution::PowerLawParams {
                    alpha: 2.6,
                    min: 1.0,
                    max: 5.0,
                }),
                orientation: OrientationDistribution::Uniform,
                rotation: RotationDistribution::Uniform,
                aperture: ApertureModel::default(),
                probability: 1.0,
                p32_target: None,
                region: None,
            }],
            user_shapes: Vec::new(),
            user_shapes_first: true,
            force_large_fractures: false,
            fram: FramConfig::default(),
            tolerance: 1e-8,
            truncate_to_domain: true,
            rejects_per_fracture: 10,
            max_rejected_per_family: 10_000,
            max_candidates: 1_000_000,
            connectivity: ConnectivityConfig::default(),
            parallel_threshold: 256,
        }
    }
}

impl GenerationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn family(&self, id: FamilyId) -> Result<&FamilyConfig> {
        self.families.get(id.index()).ok_or(DfnError::UnknownFamily(id))
    }

    /// Validate configuration for internal consistency
    ///
    /// Every error here is fatal and reported before any generation attempt.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(DfnError::InvalidConfig(msg));

        if self.families.is_empty() {
            return invalid("at least one shape family is required".into());
        }
        self.domain.validate().map_err(DfnError::InvalidConfig)?;
        if self.domain_size_increase.iter().any(|v| !(*v >= 0.0)) {
            return invalid("domain_size_increase must be non-negative".into());
        }
        if !(self.tolerance > 0.0) {
            return invalid(format!("tolerance must be positive, got {}", self.tolerance));
        }
        if !(self.fram.h > self.tolerance) {
            return invalid(format!(
                "minimum feature size h ({}) must exceed tolerance ({})",
                self.fram.h, self.tolerance
            ));
        }
        if !(self.fram.shrink_fraction > 0.0 && self.fram.shrink_fraction <= 1.0) {
            return invalid(format!(
                "shrink_fraction must lie in (0, 1], got {}",
                self.fram.shrink_fraction
            ));
        }
        if !(self.fram.first_node_fraction > 0.0 && self.fram.first_node_fraction <= 1.0) {
            return invalid(format!(
                "first_node_fraction must lie in (0, 1], got {}",
                self.fram.first_node_fraction
            ));
        }
        if let StopCondition::Count { target } = self.stop_condition {
            if target == 0 {
                return invalid("count stop condition needs a positive target".into());
            }
            let total: f64 = self.families.iter().map(|f| f.probability).sum();
            if !(total > 0.0) {
                return invalid("family probabilities must not all be zero".into());
            }
        }
        if self.max_candidates == 0 {
            return invalid("max_candidates must be positive".into());
        }

        for (i, family) in self.families.iter().enumerate() {
            family.validate(FamilyId::from_index(i), self)?;
        }
        for (i, shape) in self.user_shapes.iter().enumerate() {
            shape
                .validate(self.fram.h, self.tolerance)
                .map_err(|msg| DfnError::InvalidConfig(format!("user shape {}: {}", i + 1, msg)))?;
        }
        Ok(())
    }

    /// Per-family share of the count target
    ///
    /// Largest-remainder apportionment of `target` by normalized family
    /// probabilities; ties go to the lower family index. Returns `None` in
    /// intensity mode.
    pub fn family_quotas(&self) -> Option<Vec<usize>> {
        let StopCondition::Count { target } = self.stop_condition else {
            return None;
        };
        let total: f64 = self.families.iter().map(|f| f.probability).sum();
        let exact: Vec<f64> = self
            .families
            .iter()
            .map(|f| target as f64 * f.probability / total)
            .collect();
        let mut quotas: Vec<usize> = exact.iter().map(|q| q.floor() as usize).collect();
        let assigned: usize = quotas.iter().sum();

        let mut order: Vec<usize> = (0..exact.len()).collect();
        order.sort_by(|&a, &b| {
            let ra = exact[a] - exact[a].floor();
            let rb = exact[b] - exact[b].floor();
            rb.total_cmp(&ra).then(a.cmp(&b))
        });
        for &i in order.iter().take(target.saturating_sub(assigned)) {
            quotas[i] += 1;
        }
        Some(quotas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::distribution::ConstantParams;

    #[test]
    fn test_default_config_is_valid() {
        assert!(GenerationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_family_quotas_largest_remainder() {
        let mut config = GenerationConfig::default();
        let base = config.families[0].clone();
        config.families = vec![
            FamilyConfig { probability: 1.0, ..base.clone() },
            FamilyConfig { probability: 1.0, ..base.clone() },
            FamilyConfig { probability: 1.0, ..base },
        ];
        config.stop_condition = StopCondition::Count { target: 10 };

        let quotas = config.family_quotas().unwrap();
        assert_eq!(quotas.iter().sum::<usize>(), 10);
        assert_eq!(quotas, vec![4, 3, 3]);
    }

    #[test]
    fn test_intensity_needs_targets() {
        let mut config = GenerationConfig::default();
        config.stop_condition = StopCondition::Intensity;
        assert!(matches!(config.validate(), Err(DfnError::InvalidConfig(_))));

        config.families[0].p32_target = Some(0.2);
        assert!(config.validate().is_ok());
        assert!(config.family_quotas().is_none());
    }

    #[test]
    fn test_radius_below_feature_size_rejected() {
        let mut config = GenerationConfig::default();
        config.families[0].size = SizeDistribution::Constant(ConstantParams { radius: 0.05 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            seed = 42
            domain = { size = [10.0, 10.0, 10.0] }
            stop_condition = { kind = "count", target = 5 }

            [fram]
            h = 0.05

            [[families]]
            name = "sets"
            kind = { type = "ellipse", points = 8 }
            aspect_ratio = 0.5
            size = { type = "log_normal", mean = 0.5, sd = 0.3, min = 0.5, max = 4.0 }
            orientation = { type = "fisher", theta = 45.0, phi = 30.0, kappa = 20.0 }
            aperture = { type = "length_correlated", factor = 1e-4, exponent = 0.5 }
        "#;
        let config = GenerationConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.families.len(), 1);
        assert_eq!(config.families[0].kind, ShapeKind::Ellipse { points: 8 });
        assert_eq!(config.families[0].max_radius(), 4.0);
        assert_eq!(config.fram.h, 0.05);
        // Untouched sections fall back to defaults
        assert_eq!(config.rejects_per_fracture, 10);
        assert!(config.user_shapes.is_empty());
        assert!(config.user_shapes_first);
        assert!(!config.force_large_fractures);
    }

    #[test]
    fn test_parse_user_shapes_section() {
        let toml = r#"
            user_shapes_first = false
            force_large_fractures = true

            [[families]]
            kind = { type = "rectangle" }
            size = { type = "constant", radius = 1.0 }
            orientation = { type = "uniform" }

            [[user_shapes]]
            input = "parameters"
            kind = { type = "rectangle" }
            radius = 3.0
            normal = [1.0, 0.0, 0.0]
            translation = [0.0, 0.0, 0.0]
        "#;
        let config = GenerationConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.user_shapes.len(), 1);
        assert!(!config.user_shapes_first);
        assert!(config.force_large_fractures);
    }

    #[test]
    fn test_invalid_user_shape_rejected() {
        use crate::core::types::Vec3;
        use crate::sampling::user::UserOutline;

        let mut config = GenerationConfig::default();
        config.user_shapes.push(UserShape::Parameters(UserOutline {
            kind: ShapeKind::Rectangle,
            radius: 0.01,
            aspect_ratio: 1.0,
            beta: 0.0,
            normal: Vec3::Z,
            translation: Vec3::ZERO,
            aperture: 1e-5,
        }));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("user shape 1"));
    }

    #[test]
    fn test_family_polygon_kind_rejected() {
        let mut config = GenerationConfig::default();
        config.families[0].kind = ShapeKind::Polygon { points: 5 };
        assert!(matches!(config.validate(), Err(DfnError::InvalidConfig(_))));
    }
}
