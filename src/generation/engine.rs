//! The generation loop
//!
//! Families run one after another in descending order of maximum radius.
//! Each family member is drawn once and then re-translated up to
//! `rejects_per_fracture` times until some placement is accepted. Commits are
//! strictly sequential; only the pairwise tests inside one evaluation run in
//! parallel.
//!
//! User shapes from the configuration go through the same rejection
//! controller, once each and without re-translation, either before the first
//! family or after the last one.

use std::thread;
use std::time::{Duration, Instant};

use crate::core::config::{GenerationConfig, StopCondition};
use crate::core::error::Result;
use crate::core::types::FamilyId;
use crate::generation::control::{ControlAction, ControlSignal, NoControl};
use crate::generation::network::{Checkpoint, NetworkAssembler};
use crate::generation::rejection::{Decision, RejectionController};
use crate::generation::stats::{Stats, StatsTracker};
use crate::output::{GenerationOutput, GenerationStatus};
use crate::sampling::sampler::{family_order, ShapeFamilySampler};

/// Acceptances between progress log lines
const PROGRESS_INTERVAL: usize = 200;

const PAUSE_POLL: Duration = Duration::from_millis(20);

/// How a pass over the families ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Every family ran, or the stop condition was reached
    Finished,
    BudgetExhausted,
    Interrupted,
}

/// State saved before a family starts
#[derive(Clone)]
struct SavePoint {
    network: Checkpoint,
    stats: Stats,
    position: usize,
}

/// Mutable state of one run
struct Run<'a, C: ControlSignal> {
    config: &'a GenerationConfig,
    control: &'a C,
    sampler: ShapeFamilySampler,
    controller: RejectionController,
    network: NetworkAssembler,
    stats: StatsTracker,
    candidates: u64,
}

impl<C: ControlSignal> Run<'_, C> {
    /// Safe point between candidates; blocks while paused
    fn poll_control(&self) -> bool {
        loop {
            match self.control.poll() {
                ControlAction::Continue => return true,
                ControlAction::Stop => return false,
                ControlAction::Pause => thread::sleep(PAUSE_POLL),
            }
        }
    }

    fn family_done(&self, family: FamilyId, quota: Option<usize>, accepted: usize) -> bool {
        match quota {
            Some(q) => accepted >= q,
            None => self.network.family_target_met(family),
        }
    }

    /// Offer every configured user shape once, in list order
    fn run_user_shapes(&mut self) -> Flow {
        let config = self.config;
        let shapes = &config.user_shapes;
        if shapes.is_empty() {
            return Flow::Finished;
        }
        tracing::info!("Inserting {} user shapes", shapes.len());
        for (i, user) in shapes.iter().enumerate() {
            if self.candidates >= config.max_candidates {
                tracing::warn!("Candidate budget of {} exhausted", config.max_candidates);
                return Flow::BudgetExhausted;
            }
            if !self.poll_control() {
                tracing::info!("Generation stopped by control signal");
                return Flow::Interrupted;
            }
            self.candidates += 1;
            self.stats.record_attempt(false);
            match self.controller.evaluate(user.build(), &self.network) {
                Decision::Accepted { shape, acceptance } => {
                    self.stats.record_accept(FamilyId::USER, &acceptance, shape.truncated);
                    let id = self.network.commit(shape, acceptance);
                    tracing::debug!("User shape {} accepted as {}", i + 1, id);
                }
                Decision::Rejected(reason) => {
                    tracing::warn!("User shape {} rejected: {}", i + 1, reason);
                    self.stats.record_reject(FamilyId::USER, reason);
                }
            }
        }
        Flow::Finished
    }

    /// Run families `order[start..]`, saving a checkpoint before each
    fn run_families(&mut self, order: &[FamilyId], start: usize, save: &mut Option<SavePoint>) -> Result<Flow> {
        let quotas = self.config.family_quotas();
        for (position, &family) in order.iter().enumerate().skip(start) {
            *save = Some(SavePoint {
                network: self.network.checkpoint(),
                stats: self.stats.snapshot(),
                position,
            });
            let quota = quotas.as_ref().map(|q| q[family.index()]);
            let flow = self.run_family(family, quota)?;
            if flow != Flow::Finished || self.network.is_stop_condition_met() {
                return Ok(flow);
            }
        }
        Ok(Flow::Finished)
    }

    fn run_family(&mut self, family: FamilyId, quota: Option<usize>) -> Result<Flow> {
        let name = &self.config.family(family)?.name;
        tracing::info!("Starting {} ({}), quota {:?}", family, name, quota);
        if let Some(q) = quota {
            self.sampler.prepare_radii(family, q)?;
        }
        if self.config.force_large_fractures && quota != Some(0) {
            self.sampler.force_largest(family)?;
        }

        let mut accepted = 0usize;
        let mut discarded = 0u64;
        while !self.family_done(family, quota, accepted) {
            let base = self.sampler.next(family)?;

            let mut placed = false;
            for attempt in 0..=self.config.rejects_per_fracture {
                if self.candidates >= self.config.max_candidates {
                    tracing::warn!("Candidate budget of {} exhausted", self.config.max_candidates);
                    return Ok(Flow::BudgetExhausted);
                }
                if !self.poll_control() {
                    tracing::info!("Generation stopped by control signal");
                    return Ok(Flow::Interrupted);
                }

                let candidate = if attempt == 0 {
                    base.clone()
                } else {
                    self.sampler.retranslate(&base)?
                };
                self.candidates += 1;
                self.stats.record_attempt(attempt > 0);

                match self.controller.evaluate(candidate, &self.network) {
                    Decision::Accepted { shape, acceptance } => {
                        self.stats.record_accept(family, &acceptance, shape.truncated);
                        let id = self.network.commit(shape, acceptance);
                        self.stats.set_p32(family, self.network.p32(family));
                        tracing::trace!("Accepted {} from {}", id, family);
                        if self.network.len() % PROGRESS_INTERVAL == 0 {
                            let stats = self.stats.stats();
                            tracing::info!(
                                "{} shapes accepted, {} rejected",
                                stats.accepted_total,
                                stats.rejected_total
                            );
                        }
                        accepted += 1;
                        placed = true;
                        break;
                    }
                    Decision::Rejected(reason) => {
                        tracing::trace!("Rejected {} candidate: {}", family, reason);
                        self.stats.record_reject(family, reason);
                    }
                }
            }

            if placed {
                if self.network.is_stop_condition_met() {
                    return Ok(Flow::Finished);
                }
                continue;
            }

            self.stats.record_discard(family);
            discarded += 1;
            if discarded >= self.config.max_rejected_per_family {
                tracing::warn!(
                    "{} stagnated after {} discarded members, {} accepted",
                    family,
                    discarded,
                    accepted
                );
                self.stats.mark_stagnated(family);
                break;
            }
        }

        tracing::info!("Finished {}: {} accepted, {} discarded", family, accepted, discarded);
        Ok(Flow::Finished)
    }
}

/// Discrete fracture network generator
pub struct DfnGenerator<C: ControlSignal = NoControl> {
    config: GenerationConfig,
    control: C,
}

impl DfnGenerator<NoControl> {
    /// Validate `config` and build a generator with no external control
    pub fn new(config: GenerationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            control: NoControl,
        })
    }
}

impl<C: ControlSignal> DfnGenerator<C> {
    /// Attach a stop/pause signal source
    pub fn with_control<D: ControlSignal>(self, control: D) -> DfnGenerator<D> {
        DfnGenerator {
            config: self.config,
            control,
        }
    }

    /// Generate a network
    ///
    /// Only configuration problems are errors. Stagnation, budget exhaustion,
    /// interruption and connectivity failure all return the partial network
    /// with the matching status.
    pub fn run(&self) -> Result<GenerationOutput> {
        let start = Instant::now();
        let config = &self.config;
        let order = family_order(config);
        tracing::info!(
            "Generating network: seed {}, {} families, stop {:?}",
            config.seed,
            config.families.len(),
            config.stop_condition
        );

        let mut run = Run {
            config,
            control: &self.control,
            sampler: ShapeFamilySampler::new(config),
            controller: RejectionController::new(config),
            network: NetworkAssembler::new(config),
            stats: StatsTracker::new(config),
            candidates: 0,
        };

        let required = config.connectivity.required_faces();
        let mut save: Option<SavePoint> = None;
        let mut start_at = 0;
        let mut retries = 0u32;

        let first = if config.user_shapes_first {
            run.run_user_shapes()
        } else {
            Flow::Finished
        };

        let status = loop {
            let mut flow = first;
            if flow == Flow::Finished {
                flow = run.run_families(&order, start_at, &mut save)?;
            }
            if flow == Flow::Finished && !config.user_shapes_first {
                flow = run.run_user_shapes();
            }
            match flow {
                Flow::Interrupted => break GenerationStatus::Interrupted,
                Flow::BudgetExhausted => break GenerationStatus::BudgetExhausted,
                Flow::Finished => {}
            }

            let connected = !config.connectivity.require_percolation
                || !run.network.percolating_clusters(required).is_empty();
            if connected {
                let stagnated: Vec<FamilyId> = run
                    .stats
                    .stats()
                    .families
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| f.stagnated)
                    .map(|(i, _)| FamilyId::from_index(i))
                    .collect();
                break if stagnated.is_empty() && run.network.is_stop_condition_met() {
                    GenerationStatus::Complete
                } else {
                    GenerationStatus::Stagnated { families: stagnated }
                };
            }

            let Some(point) = save.clone() else {
                break GenerationStatus::ConstraintFailed { retries };
            };
            if retries >= config.connectivity.max_global_retries {
                tracing::warn!("No percolating cluster after {} retries", retries);
                break GenerationStatus::ConstraintFailed { retries };
            }

            retries += 1;
            tracing::warn!(
                "No percolating cluster; restoring {} shapes and retrying from {} (retry {})",
                point.network.shape_count(),
                order[point.position],
                retries
            );
            run.network.restore(point.network);
            run.stats.restore(point.stats);
            run.stats.record_global_retry();
            run.sampler.reseed_stream(u64::from(retries));
            start_at = point.position;
        };

        if let StopCondition::Count { target } = config.stop_condition {
            tracing::debug!("Accepted {} of {} requested shapes", run.network.len(), target);
        }
        let output = GenerationOutput::new(&run.network, required, run.stats.finish(), status, start.elapsed());
        tracing::info!("{}", output.summary());
        Ok(output)
    }

    /// Order in which families are generated
    pub fn family_order(&self) -> Vec<FamilyId> {
        family_order(&self.config)
    }
}

/// Validate `config` and generate a network with no external control
pub fn generate(config: GenerationConfig) -> Result<GenerationOutput> {
    DfnGenerator::new(config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::DfnError;
    use crate::core::types::Vec3;
    use crate::generation::control::ControlFlag;
    use crate::geometry::shape::ShapeKind;
    use crate::sampling::distribution::{PowerLawParams, SizeDistribution};
    use crate::sampling::user::{UserOutline, UserShape};

    fn small_config() -> GenerationConfig {
        let mut config = GenerationConfig::default();
        config.stop_condition = StopCondition::Count { target: 10 };
        config
    }

    fn user_square(radius: f64, translation: Vec3) -> UserShape {
        UserShape::Parameters(UserOutline {
            kind: ShapeKind::Rectangle,
            radius,
            aspect_ratio: 1.0,
            beta: 0.0,
            normal: Vec3::Z,
            translation,
            aperture: 1e-5,
        })
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut config = small_config();
        config.families.clear();
        assert!(matches!(DfnGenerator::new(config), Err(DfnError::InvalidConfig(_))));
    }

    #[test]
    fn test_count_mode_completes() {
        let output = generate(small_config()).unwrap();
        assert_eq!(output.status, GenerationStatus::Complete);
        assert_eq!(output.shapes.len(), 10);
        assert_eq!(output.stats.accepted_total, 10);
        assert_eq!(output.stats.rejections.total(), output.stats.rejected_total);
    }

    #[test]
    fn test_stop_signal_interrupts_before_first_candidate() {
        let flag = ControlFlag::new();
        flag.stop();
        let generator = DfnGenerator::new(small_config()).unwrap().with_control(flag);
        let output = generator.run().unwrap();
        assert_eq!(output.status, GenerationStatus::Interrupted);
        assert!(output.shapes.is_empty());
        assert_eq!(output.stats.attempts, 0);
    }

    #[test]
    fn test_budget_exhaustion_keeps_partial_output() {
        let mut config = small_config();
        config.max_candidates = 3;
        let output = generate(config).unwrap();
        assert_eq!(output.status, GenerationStatus::BudgetExhausted);
        assert_eq!(output.stats.attempts, 3);
        assert!(output.shapes.len() <= 3);
    }

    #[test]
    fn test_user_shapes_placed_before_families() {
        let mut config = small_config();
        config.user_shapes = vec![
            user_square(2.0, Vec3::ZERO),
            // Lies inside the first one
            user_square(0.5, Vec3::new(0.5, 0.5, 0.0)),
        ];
        let output = generate(config).unwrap();
        assert_eq!(output.shapes[0].family, FamilyId::USER);
        assert!(output.shapes[1..].iter().all(|s| !s.family.is_user()));
        assert_eq!(output.stats.user_accepted, 1);
        assert_eq!(output.stats.user_rejected, 1);
        assert!(output.stats.rejections.enclosed >= 1);
        // The count target covers stochastic families only
        let sampled = output.shapes.iter().filter(|s| !s.family.is_user()).count();
        assert_eq!(output.stats.families[0].accepted as usize, sampled);
        assert_eq!(output.stats.accepted_total as usize, output.shapes.len());
    }

    #[test]
    fn test_user_shapes_after_families() {
        let mut config = small_config();
        config.user_shapes_first = false;
        config.user_shapes = vec![user_square(1.0, Vec3::new(0.0, 0.0, 9.0))];
        let output = generate(config).unwrap();
        let first_user = output.shapes.iter().position(|s| s.family.is_user());
        if let Some(position) = first_user {
            assert_eq!(position, output.shapes.len() - 1);
        }
        assert_eq!(output.stats.user_accepted + output.stats.user_rejected, 1);
    }

    #[test]
    fn test_force_large_fractures_starts_at_max_radius() {
        let mut config = small_config();
        config.families[0].size = SizeDistribution::PowerLaw(PowerLawParams { alpha: 2.6, min: 0.5, max: 1.5 });
        config.force_large_fractures = true;
        let output = generate(config).unwrap();
        // With no discards every member was placed, the forced one first
        if output.stats.families[0].discarded == 0 {
            assert_eq!(output.shapes[0].radius(), 1.5);
        }
        assert!(output.shapes.iter().all(|s| s.radius() <= 1.5));
    }
}
