//! Family distributions as closed tagged variants
//!
//! Each kind carries its own parameter struct and is sampled by a single
//! pure function taking the caller's random stream.

use std::f64::consts::PI;

use glam::DQuat;
use rand::Rng;
use rand_distr::{Distribution, LogNormal, Normal};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal as Gaussian};

use crate::core::types::Vec3;

/// Smallest probability a size range may hold
///
/// Below this the truncated inverse CDF has no usable resolution left.
pub const MIN_SIZE_MASS: f64 = 1e-9;

/// ρ·g/μ for water, used by the cubic law
const CUBIC_LAW_SCALAR: f64 = 1.1e7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogNormalParams {
    /// Mean of the underlying normal (of ln r)
    pub mean: f64,
    /// Standard deviation of the underlying normal
    pub sd: f64,
    pub min: f64,
    pub max: f64,
}

/// Standard normal probabilities bounding a lognormal's [min, max]
///
/// Taken from the tail nearer the range so upper-tail windows keep
/// their precision; `upper` flips the sign of the drawn quantile.
#[derive(Debug, Clone)]
struct NormalWindow {
    unit: Gaussian,
    lo: f64,
    hi: f64,
    upper: bool,
}

impl LogNormalParams {
    fn window(&self) -> Option<NormalWindow> {
        let unit = Gaussian::new(0.0, 1.0).ok()?;
        let a = (self.min.ln() - self.mean) / self.sd;
        let b = (self.max.ln() - self.mean) / self.sd;
        let (lo, hi, upper) = if a > 0.0 {
            (unit.sf(b), unit.sf(a), true)
        } else {
            (unit.cdf(a), unit.cdf(b), false)
        };
        Some(NormalWindow { unit, lo, hi, upper })
    }

    /// Probability of a radius in [min, max]
    pub fn mass(&self) -> f64 {
        self.window().map_or(0.0, |w| (w.hi - w.lo).max(0.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerLawParams {
    pub alpha: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialParams {
    pub lambda: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantParams {
    pub radius: f64,
}

/// Radius distribution of a family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SizeDistribution {
    LogNormal(LogNormalParams),
    /// Truncated power law (Pareto) on [min, max]
    PowerLaw(PowerLawParams),
    /// Truncated exponential on [min, max]
    Exponential(ExponentialParams),
    Constant(ConstantParams),
}

impl SizeDistribution {
    /// Inclusive radius range
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            SizeDistribution::LogNormal(p) => (p.min, p.max),
            SizeDistribution::PowerLaw(p) => (p.min, p.max),
            SizeDistribution::Exponential(p) => (p.min, p.max),
            SizeDistribution::Constant(p) => (p.radius, p.radius),
        }
    }

    /// Check parameters against the minimum feature size `h`
    pub fn validate(&self, h: f64) -> std::result::Result<(), String> {
        let (min, max) = self.bounds();
        if !(min > 0.0) || !max.is_finite() || min > max {
            return Err(format!("radius range [{}, {}] is not a valid positive interval", min, max));
        }
        if min < h {
            return Err(format!("minimum radius {} is below the feature size h = {}", min, h));
        }
        match self {
            SizeDistribution::LogNormal(p) if !(p.sd > 0.0) || !p.mean.is_finite() => {
                Err(format!("lognormal needs a finite mean and positive sd, got {} / {}", p.mean, p.sd))
            }
            SizeDistribution::PowerLaw(p) if !(p.alpha > 0.0) => {
                Err(format!("power law alpha must be positive, got {}", p.alpha))
            }
            SizeDistribution::Exponential(p) if !(p.lambda > 0.0) || !p.lambda.is_finite() => {
                Err(format!("exponential lambda must be positive, got {}", p.lambda))
            }
            SizeDistribution::Exponential(p) if p.max > p.min && !(p.span() > 0.0) => Err(format!(
                "exponential lambda {} cannot resolve the range [{}, {}]",
                p.lambda, p.min, p.max
            )),
            _ => Ok(()),
        }
    }

    /// Probability the untruncated distribution puts inside [min, max]
    ///
    /// Only the lognormal is drawn from its full support; every other kind
    /// is sampled on its range directly and reports 1.
    pub fn mass(&self) -> f64 {
        match self {
            SizeDistribution::LogNormal(p) => p.mass(),
            _ => 1.0,
        }
    }
}

impl ExponentialParams {
    /// 1 - exp(-λ(max - min)), the CDF mass of the shifted range
    fn span(&self) -> f64 {
        -(-self.lambda * (self.max - self.min)).exp_m1()
    }
}

/// Draw one radius in the distribution's [min, max]
///
/// Every kind is drawn through its truncated inverse CDF, so a validated
/// distribution always yields a radius in range. The exponential is sampled
/// shifted to `min`, which avoids cancellation when λ·min is large.
pub fn sample_size<R: Rng + ?Sized>(dist: &SizeDistribution, rng: &mut R) -> f64 {
    match dist {
        SizeDistribution::Constant(p) => p.radius,
        SizeDistribution::PowerLaw(p) => {
            let u: f64 = rng.gen();
            let ratio = (p.min / p.max).powf(p.alpha);
            let r = p.min * (1.0 - u + u * ratio).powf(-1.0 / p.alpha);
            r.clamp(p.min, p.max)
        }
        SizeDistribution::Exponential(p) => {
            let u: f64 = rng.gen();
            let r = p.min - (-u * p.span()).ln_1p() / p.lambda;
            r.clamp(p.min, p.max)
        }
        SizeDistribution::LogNormal(p) => {
            let Some(window) = p.window() else {
                return p.min;
            };
            let u = window.lo + (window.hi - window.lo) * rng.gen::<f64>();
            let z = window.unit.inverse_cdf(u.clamp(0.0, 1.0));
            let z = if window.upper { -z } else { z };
            (p.mean + p.sd * z).exp().clamp(p.min, p.max)
        }
    }
}

/// Unit vector from spherical angles in degrees
pub fn pole(theta_deg: f64, phi_deg: f64) -> Vec3 {
    let theta = theta_deg.to_radians();
    let phi = phi_deg.to_radians();
    Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos())
}

/// Distribution of fracture normals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrientationDistribution {
    /// Fisher distribution about the pole (theta, phi), degrees
    Fisher { theta: f64, phi: f64, kappa: f64 },
    /// Uniform on the sphere
    Uniform,
    /// Every normal equals the pole (theta, phi), degrees
    Constant { theta: f64, phi: f64 },
}

impl OrientationDistribution {
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            OrientationDistribution::Fisher { theta, phi, kappa } => {
                if !theta.is_finite() || !phi.is_finite() {
                    return Err("fisher pole angles must be finite".into());
                }
                if !(*kappa > 0.0) || !kappa.is_finite() {
                    return Err(format!("fisher kappa must be positive, got {}", kappa));
                }
                Ok(())
            }
            OrientationDistribution::Constant { theta, phi } if !theta.is_finite() || !phi.is_finite() => {
                Err("constant pole angles must be finite".into())
            }
            _ => Ok(()),
        }
    }
}

/// Draw a unit normal
pub fn sample_normal<R: Rng + ?Sized>(dist: &OrientationDistribution, rng: &mut R) -> Vec3 {
    match dist {
        OrientationDistribution::Fisher { theta, phi, kappa } => {
            let mean = pole(*theta, *phi);
            let azimuth = rng.gen_range(0.0..2.0 * PI);
            let y: f64 = rng.gen();
            // Stable for large kappa: exp(kappa) is never formed
            let w = (1.0 + (y + (1.0 - y) * (-2.0 * kappa).exp()).ln() / kappa).clamp(-1.0, 1.0);
            let s = (1.0 - w * w).sqrt();
            let local = Vec3::new(s * azimuth.cos(), s * azimuth.sin(), w);
            (DQuat::from_rotation_arc(Vec3::Z, mean) * local).normalize()
        }
        OrientationDistribution::Uniform => {
            let z = rng.gen_range(-1.0..=1.0f64);
            let azimuth = rng.gen_range(0.0..2.0 * PI);
            let s = (1.0 - z * z).sqrt();
            Vec3::new(s * azimuth.cos(), s * azimuth.sin(), z)
        }
        OrientationDistribution::Constant { theta, phi } => pole(*theta, *phi),
    }
}

/// In-plane twist about the normal
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RotationDistribution {
    /// Uniform on [0, 2π)
    #[default]
    Uniform,
    Constant { degrees: f64 },
}

pub fn sample_rotation<R: Rng + ?Sized>(dist: &RotationDistribution, rng: &mut R) -> f64 {
    match dist {
        RotationDistribution::Uniform => rng.gen_range(0.0..2.0 * PI),
        RotationDistribution::Constant { degrees } => degrees.to_radians(),
    }
}

/// Hydraulic aperture assignment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApertureModel {
    Constant { value: f64 },
    /// Lognormal with parameters of ln b
    LogNormal { mean: f64, sd: f64 },
    /// Cubic law from a size-correlated transmissivity T = f·r^k
    Transmissivity { f: f64, k: f64 },
    /// b = factor·r^exponent, optionally scaled by lognormal noise
    LengthCorrelated {
        factor: f64,
        exponent: f64,
        #[serde(default)]
        noise_sd: f64,
    },
}

impl Default for ApertureModel {
    fn default() -> Self {
        ApertureModel::Constant { value: 1e-5 }
    }
}

impl ApertureModel {
    pub fn validate(&self) -> std::result::Result<(), String> {
        match *self {
            ApertureModel::Constant { value } if !(value > 0.0) => {
                Err(format!("constant aperture must be positive, got {}", value))
            }
            ApertureModel::LogNormal { sd, .. } if !(sd > 0.0) => {
                Err(format!("aperture sd must be positive, got {}", sd))
            }
            ApertureModel::Transmissivity { f, .. } if !(f > 0.0) => {
                Err(format!("transmissivity factor must be positive, got {}", f))
            }
            ApertureModel::LengthCorrelated { factor, noise_sd, .. } if !(factor > 0.0) || noise_sd < 0.0 => {
                Err("length correlated aperture needs a positive factor and non-negative noise".into())
            }
            _ => Ok(()),
        }
    }
}

/// Aperture for a shape with mean radius `radius`
pub fn sample_aperture<R: Rng + ?Sized>(model: &ApertureModel, radius: f64, rng: &mut R) -> f64 {
    match *model {
        ApertureModel::Constant { value } => value,
        ApertureModel::LogNormal { mean, sd } => match LogNormal::new(mean, sd) {
            Ok(dist) => dist.sample(rng),
            Err(_) => mean.exp(),
        },
        ApertureModel::Transmissivity { f, k } => {
            let transmissivity = f * radius.powf(k);
            (transmissivity * 12.0 / CUBIC_LAW_SCALAR).cbrt()
        }
        ApertureModel::LengthCorrelated { factor, exponent, noise_sd } => {
            let base = factor * radius.powf(exponent);
            if noise_sd > 0.0 {
                match Normal::new(0.0, noise_sd) {
                    Ok(noise) => base * noise.sample(rng).exp(),
                    Err(_) => base,
                }
            } else {
                base
            }
        }
    }
}
