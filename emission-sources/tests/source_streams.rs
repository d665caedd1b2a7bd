//! End-to-end photon streams from configured sources.

use emission_sources::{
    Direction, EarthLimbConfig, GrbConfig, GrbExtraComponent, JetCycle, MicroquasarConfig,
    PhotonSource, PulsarConfig, SourceConfig, SourceError,
};
use photon_sampling::{ProbabilityStep, SamplerConfig, NO_MORE_EVENTS};
use tempfile::TempDir;
use test_helpers::init_test_logging;

fn quick_limb() -> EarthLimbConfig {
    EarthLimbConfig {
        cdf_steps: 300,
        energy_slices: 10,
        seed: 4,
        ..EarthLimbConfig::default()
    }
}

fn all_models() -> Vec<SourceConfig> {
    vec![
        SourceConfig::EarthLimb(quick_limb()),
        SourceConfig::Grb(GrbConfig {
            fluence_erg_cm2: 1.0e-3,
            min_photon_energy_mev: 1.0,
            ..GrbConfig::default()
        }),
        SourceConfig::Pulsar(PulsarConfig {
            flux_cm2_s: 1.0e-4,
            ..PulsarConfig::default()
        }),
        SourceConfig::Microquasar(MicroquasarConfig {
            flux_cm2_s: 1.0e-3,
            orbital_period_days: 0.5,
            ..MicroquasarConfig::default()
        }),
        SourceConfig::Grb(GrbConfig {
            fluence_erg_cm2: 1.0e-3,
            min_photon_energy_mev: 1.0,
            cutoff_mev: Some(1.0e3),
            extra: Some(GrbExtraComponent {
                delay_s: 2.0,
                duration_s: 30.0,
                photons_m2: 1.0e3,
                photon_index: 2.0,
            }),
            ..GrbConfig::default()
        }),
        SourceConfig::Microquasar(MicroquasarConfig {
            flux_cm2_s: 1.0e-4,
            orbital_period_days: 0.5,
            jet: JetCycle {
                disk_cycle_days: 2.0,
                disk_cycle_fluct: 0.1,
                jet_onset: 0.5,
                jet_duration: 0.3,
                ..JetCycle::default()
            },
            ..MicroquasarConfig::default()
        }),
    ]
}

/// Pull up to `n` photons through the interval/energy/dir sequence.
fn stream(source: &mut dyn PhotonSource, start: f64, n: usize) -> Vec<(f64, f64, Direction)> {
    let mut t = start;
    let mut photons = Vec::new();
    for _ in 0..n {
        let dt = source.interval(t).unwrap();
        if dt >= NO_MORE_EVENTS {
            break;
        }
        assert!(dt >= 0.0, "{} returned negative interval {dt}", source.name());
        t += dt;
        let energy = source.energy(t).unwrap();
        let direction = source.dir(energy).unwrap();
        photons.push((t, energy, direction));
    }
    photons
}

#[test]
fn test_every_model_streams_ordered_photons() {
    init_test_logging();

    for config in all_models() {
        let mut source = config.build().unwrap();
        let photons = stream(source.as_mut(), 0.0, 500);
        assert!(!photons.is_empty(), "{} produced no photons", config.model());
        assert!(photons.windows(2).all(|w| w[0].0 <= w[1].0));
        assert!(photons.iter().all(|p| p.1 > 0.0 && p.1.is_finite()));
    }
}

#[test]
fn test_dir_before_any_draw_is_rejected() {
    init_test_logging();

    for config in all_models() {
        let mut source = config.build().unwrap();
        let result = source.dir(100.0);
        assert!(
            matches!(result, Err(SourceError::SequencingViolation { .. })),
            "{} accepted dir() before energy()",
            config.model()
        );
    }
}

#[test]
fn test_dir_after_exhaustion_is_rejected() {
    init_test_logging();

    let mut grb = SourceConfig::Grb(GrbConfig::default()).build().unwrap();
    assert_eq!(grb.interval(1.0e6).unwrap(), NO_MORE_EVENTS);
    assert!(matches!(
        grb.energy(1.0e6),
        Err(SourceError::SequencingViolation { .. })
    ));
    assert!(matches!(
        grb.dir(100.0),
        Err(SourceError::SequencingViolation { .. })
    ));
    assert!(grb.photon(1.0e6).unwrap().is_none());
}

#[test]
fn test_same_seed_same_stream() {
    init_test_logging();

    for config in all_models() {
        let mut a = config.build().unwrap();
        let mut b = config.build().unwrap();
        assert_eq!(
            stream(a.as_mut(), 0.0, 50),
            stream(b.as_mut(), 0.0, 50),
            "{} is not reproducible",
            config.model()
        );
    }
}

#[test]
fn test_config_file_drives_source() {
    init_test_logging();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pulsar.json");
    let mut config = SourceConfig::Pulsar(PulsarConfig {
        flux_cm2_s: 1.0e-4,
        period_s: 0.05,
        galactic_l_deg: 263.55,
        galactic_b_deg: -2.79,
        sampler: SamplerConfig::default()
            .periodic()
            .with_probability_step(ProbabilityStep::Exponential),
        ..PulsarConfig::default()
    });
    config.set_seed(17);
    config.save_to_file(&path).unwrap();

    let loaded = SourceConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let mut source = loaded.build().unwrap();
    let photons = stream(source.as_mut(), 1.0e3, 100);
    assert_eq!(photons.len(), 100);
    assert!(photons.iter().all(|(_, _, d)| *d
        == Direction::Galactic {
            l_deg: 263.55,
            b_deg: -2.79
        }));
}

#[test]
fn test_burst_starts_on_time() {
    init_test_logging();

    let config = SourceConfig::Grb(GrbConfig {
        start_time_s: 250.0,
        fluence_erg_cm2: 1.0e-3,
        min_photon_energy_mev: 1.0,
        ..GrbConfig::default()
    });
    let mut grb = config.build().unwrap();
    assert_eq!(grb.flux(100.0), 0.0);

    // Waiting from before the trigger lands inside the burst
    let dt = grb.interval(0.0).unwrap();
    assert!(dt >= 250.0 && dt < NO_MORE_EVENTS);
}
