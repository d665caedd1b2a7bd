//! Stochastic photon sampling for astrophysical emission models.
//!
//! The crate turns a flux law into discrete random photons by inverse-transform
//! sampling:
//!
//! - [`cdf::CdfBuilder`] integrates a tabulated or closed-form density into a
//!   normalized cumulative curve.
//! - [`inverse_cdf::InverseCdf`] maps a uniform deviate back to a physical value.
//! - [`slice::EnergySlicedCurveSet`] keeps one inverse CDF per energy slice for
//!   angular distributions that change with energy.
//! - [`sampler::FluxSurfaceSampler`] generates an ordered photon stream from a
//!   binned time × energy [`flux_surface::FluxSurface`], for transient and
//!   periodic sources.

pub mod cdf;
pub mod config;
pub mod error;
pub mod flux_surface;
pub mod grid;
pub mod inverse_cdf;
pub mod sampler;
pub mod slice;
pub mod tabulated;

pub use cdf::{trap_integrate, CdfBuilder};
pub use config::{PeriodicEnergy, ProbabilityStep, SamplerConfig, TemporalMode};
pub use error::SamplingError;
pub use flux_surface::{FluxSurface, MEV_TO_ERG};
pub use grid::{BinAxis, Grid, Spacing};
pub use inverse_cdf::InverseCdf;
pub use sampler::{
    DrawnPhoton, FluxSurfaceSampler, PhotonDraw, ProbabilityCurve, SamplerState, EXPIRED_FLUX,
    NO_MORE_EVENTS,
};
pub use slice::{EnergySlicedCurveSet, SliceSelector};
pub use tabulated::{Sample, TabulatedCurve, TabulatedDistribution};
