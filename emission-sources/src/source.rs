//! The photon-source capability shared by every emission model.
//!
//! A host drives a source with the call sequence
//! `interval(t) -> energy(t + dt) -> dir(energy)`: `interval` locates the next
//! photon, `energy` reports its energy and `dir` its arrival direction. `dir`
//! must follow an `energy` call for the same photon. [`PhotonSource::photon`]
//! draws all three attributes atomically for callers that do not need the
//! split sequence.

use photon_sampling::{FluxSurfaceSampler, PhotonDraw, SamplingError};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Arrival direction of a photon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Direction {
    /// Zenith-local frame: cosine of the zenith angle and azimuth in radians
    /// (0 towards north, π/2 towards east when looking at the Earth).
    Local { cos_zenith: f64, azimuth_rad: f64 },
    /// Galactic longitude and latitude in degrees.
    Galactic { l_deg: f64, b_deg: f64 },
}

/// A fully drawn photon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Photon {
    /// Arrival time (s)
    pub time: f64,
    /// Energy (MeV)
    pub energy: f64,
    pub direction: Direction,
}

/// Capability interface of an emission model.
pub trait PhotonSource: Send {
    fn name(&self) -> &str;

    /// Flux at `time` (photons · m⁻² · s⁻¹, per steradian for diffuse sources).
    fn flux(&self, time: f64) -> f64;

    /// Waiting time (s) from `time` to the next photon. Exhausted sources
    /// return [`photon_sampling::NO_MORE_EVENTS`].
    fn interval(&mut self, time: f64) -> Result<f64, SourceError>;

    /// Energy (MeV) of the next photon.
    fn energy(&mut self, time: f64) -> Result<f64, SourceError>;

    /// Direction of the photon whose energy was just reported.
    ///
    /// # Errors
    ///
    /// `SequencingViolation` if no `energy` call precedes it for this photon.
    fn dir(&mut self, energy: f64) -> Result<Direction, SourceError>;

    /// Draw the next photon after `time`, or `None` once the source is exhausted.
    fn photon(&mut self, time: f64) -> Result<Option<Photon>, SourceError>;
}

/// Tracks the energy handed out by `energy` until `dir` consumes it.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EnergyGuard {
    pending: Option<f64>,
}

impl EnergyGuard {
    pub(crate) fn arm(&mut self, energy: f64) {
        self.pending = Some(energy);
    }

    pub(crate) fn clear(&mut self) {
        self.pending = None;
    }

    pub(crate) fn take(&mut self, source_name: &str, energy: f64) -> Result<(), SourceError> {
        match self.pending.take() {
            Some(pending) if pending == energy => Ok(()),
            Some(pending) => Err(SourceError::sequencing(
                source_name,
                format!("dir({energy}) does not match the last energy {pending}"),
            )),
            None => Err(SourceError::sequencing(
                source_name,
                "energy() must be called before dir()",
            )),
        }
    }
}

/// A point source sampled from a binned flux surface.
///
/// Surface times are relative to `start_time`; the source sits at a fixed
/// sky position.
#[derive(Debug)]
pub struct SurfaceSource {
    name: String,
    sampler: FluxSurfaceSampler,
    start_time: f64,
    threshold_mev: f64,
    direction: Direction,
    guard: EnergyGuard,
}

impl SurfaceSource {
    /// Wrap a sampler as a point source.
    ///
    /// # Arguments
    /// * `name` - Name used in logs and sequencing errors
    /// * `sampler` - Sampler over a surface whose time zero is `start_time`
    /// * `start_time` - Absolute time of surface time zero (s)
    /// * `threshold_mev` - Minimum photon energy (MeV)
    /// * `direction` - Fixed arrival direction
    pub fn new(
        name: impl Into<String>,
        sampler: FluxSurfaceSampler,
        start_time: f64,
        threshold_mev: f64,
        direction: Direction,
    ) -> Self {
        Self {
            name: name.into(),
            sampler,
            start_time,
            threshold_mev,
            direction,
            guard: EnergyGuard::default(),
        }
    }

    pub fn sampler(&self) -> &FluxSurfaceSampler {
        &self.sampler
    }

    /// Absolute time of surface time zero (s).
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Minimum photon energy (MeV).
    pub fn threshold_mev(&self) -> f64 {
        self.threshold_mev
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Drop an energy handed out by `energy` but not yet consumed by `dir`.
    pub(crate) fn forget_energy(&mut self) {
        self.guard.clear();
    }
}

impl PhotonSource for SurfaceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn flux(&self, time: f64) -> f64 {
        self.sampler.flux(time - self.start_time, self.threshold_mev)
    }

    fn interval(&mut self, time: f64) -> Result<f64, SourceError> {
        self.guard.clear();
        Ok(self
            .sampler
            .interval(time - self.start_time, self.threshold_mev)?)
    }

    fn energy(&mut self, _time: f64) -> Result<f64, SourceError> {
        let energy = self.sampler.energy().map_err(|err| match err {
            SamplingError::SequencingViolation(message) => {
                SourceError::sequencing(&self.name, message)
            }
            other => other.into(),
        })?;
        self.guard.arm(energy);
        Ok(energy)
    }

    fn dir(&mut self, energy: f64) -> Result<Direction, SourceError> {
        self.guard.take(&self.name, energy)?;
        Ok(self.direction)
    }

    fn photon(&mut self, time: f64) -> Result<Option<Photon>, SourceError> {
        self.guard.clear();
        let draw = self
            .sampler
            .draw_photon(time - self.start_time, self.threshold_mev)?;
        Ok(match draw {
            PhotonDraw::Photon(p) => Some(Photon {
                time: p.time + self.start_time,
                energy: p.energy,
                direction: self.direction,
            }),
            PhotonDraw::Exhausted => None,
        })
    }
}
