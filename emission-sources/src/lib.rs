//! Astrophysical photon sources for mission simulation.
//!
//! Every model implements [`PhotonSource`], the call-and-return interface a
//! simulation host uses to pull photons one at a time:
//!
//! - [`EarthLimb`]: diffuse albedo emission from the Earth's limb with
//!   energy-dependent zenith and azimuth profiles.
//! - [`GrbSource`]: a gamma-ray burst built from Band-spectrum pulses, with an
//!   optional delayed high-energy component.
//! - [`Pulsar`]: a periodic multi-peak light curve with a cutoff power law.
//! - [`Microquasar`]: an orbitally modulated binary with a duty-cycled jet.
//!
//! Sources are usually built from a JSON [`SourceConfig`].

pub mod config;
pub mod earth_limb;
pub mod error;
pub mod grb;
pub mod microquasar;
pub mod pulsar;
pub mod source;

pub use config::SourceConfig;
pub use earth_limb::{EarthLimb, EarthLimbConfig};
pub use error::SourceError;
pub use grb::{BandSpectrum, GrbComponent, GrbConfig, GrbExtraComponent, GrbPulse, GrbSource};
pub use microquasar::{JetCycle, JetWindow, Microquasar, MicroquasarConfig};
pub use pulsar::{Pulsar, PulsarConfig, PulsePeak};
pub use source::{Direction, Photon, PhotonSource, SurfaceSource};
