//! Integration tests for the mix engine
//!
//! These drive `MixEngine` the way a host does: a shared parameter store
//! written from the control side, and blocks of varying size pushed through
//! `process`.

use mbcomp_benchmarks::generate_noise_channels;
use mbcomp_core::domain::dsp::DspStage;
use mbcomp_core::{
    db_to_gain, AudioBuffer, Band, FilterKind, FilterStage, MixEngine, ParameterId, ProcessSpec,
    SharedParameters,
};
use std::sync::Arc;

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK: usize = 512;

fn sine(freq: f32, amplitude: f32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE).sin())
        .collect()
}

fn engine_with(shared: Arc<SharedParameters>, sample_rate: f32, channels: usize) -> MixEngine {
    let mut engine = MixEngine::new(shared);
    engine
        .prepare(ProcessSpec::new(sample_rate, BLOCK, channels))
        .unwrap();
    engine
}

/// Push a signal through the engine in blocks of the given sizes (cycled)
fn run(engine: &mut MixEngine, signal: &[Vec<f32>], block_sizes: &[usize]) -> Vec<Vec<f32>> {
    let channels = signal.len();
    let frames = signal[0].len();
    let mut out = vec![Vec::with_capacity(frames); channels];
    let mut buffer = AudioBuffer::new(channels, BLOCK);

    let mut pos = 0;
    for &size in block_sizes.iter().cycle() {
        if pos >= frames {
            break;
        }
        let n = size.min(frames - pos);
        buffer.set_len(n);
        for (ch, dst) in buffer.channels_mut().enumerate() {
            dst.copy_from_slice(&signal[ch][pos..pos + n]);
        }
        engine.process(&mut buffer).unwrap();
        for (ch, src) in buffer.channels().enumerate() {
            out[ch].extend_from_slice(src);
        }
        pos += n;
    }
    out
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
}

// ============================================================================
// RECONSTRUCTION
// ============================================================================

#[test]
fn test_unity_ratio_engine_is_allpass_over_many_blocks() {
    let shared = Arc::new(SharedParameters::new());
    for band in Band::ALL {
        shared.set_ratio(band, 1.0);
    }
    shared.set_low_mid_crossover(250.0);
    shared.set_mid_high_crossover(3500.0);

    let mut engine = engine_with(Arc::clone(&shared), SAMPLE_RATE, 2);
    let input = generate_noise_channels(2, 6000, 7);
    let output = run(&mut engine, &input, &[BLOCK, 37, 200, 1]);

    // Reference: the input through both compensation allpasses
    let mut reference = AudioBuffer::from_channels(&input);
    for cutoff in [250.0, 3500.0] {
        let mut ap = FilterStage::new(FilterKind::AllPass);
        ap.prepare(&ProcessSpec::new(SAMPLE_RATE, 6000, 2));
        ap.configure(FilterKind::AllPass, cutoff, SAMPLE_RATE);
        ap.process_in_place(&mut reference);
    }

    for (ch, expected) in reference.channels().enumerate() {
        for (i, (x, y)) in output[ch].iter().zip(expected).enumerate() {
            assert!((x - y).abs() < 1e-4, "channel {} sample {}: {} vs {}", ch, i, x, y);
        }
    }
}

#[test]
fn test_block_partition_does_not_change_output() {
    let make = || {
        let shared = Arc::new(SharedParameters::new());
        for band in Band::ALL {
            shared.set_threshold(band, -30.0);
            shared.set_ratio(band, 6.0);
            shared.set_attack(band, 5.0);
        }
        engine_with(shared, SAMPLE_RATE, 2)
    };
    let input = generate_noise_channels(2, 4000, 99);

    let regular = run(&mut make(), &input, &[BLOCK]);
    let irregular = run(&mut make(), &input, &[3, 511, 64, 17, 256]);

    for (a, b) in regular.iter().zip(&irregular) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-6);
        }
    }
}

// ============================================================================
// ROUTING
// ============================================================================

#[test]
fn test_host_parameter_writes_solo_overrides_mute() {
    let input = generate_noise_channels(1, 2048, 3);

    // Mid soloed and muted through the generic parameter interface
    let shared = Arc::new(SharedParameters::new());
    let mut engine = engine_with(Arc::clone(&shared), SAMPLE_RATE, 1);
    shared.set(ParameterId::Solo(Band::Mid), 1.0);
    shared.set(ParameterId::Mute(Band::Mid), 1.0);
    shared.set(ParameterId::Mute(Band::High), 1.0);
    let soloed_and_muted = run(&mut engine, &input, &[BLOCK]);

    // Mid soloed alone
    let shared = Arc::new(SharedParameters::new());
    let mut engine = engine_with(Arc::clone(&shared), SAMPLE_RATE, 1);
    shared.set_solo(Band::Mid, true);
    let soloed = run(&mut engine, &input, &[BLOCK]);

    assert_eq!(soloed_and_muted, soloed);
    assert!(peak(&soloed[0]) > 0.0);
}

#[test]
fn test_mute_change_takes_effect_next_block() {
    let shared = Arc::new(SharedParameters::new());
    let mut engine = engine_with(Arc::clone(&shared), SAMPLE_RATE, 1);
    for band in Band::ALL {
        shared.set_mute(band, true);
    }

    let input = generate_noise_channels(1, BLOCK, 11);
    let mut buffer = AudioBuffer::from_channels(&input);
    engine.process(&mut buffer).unwrap();
    assert_eq!(peak(buffer.channel(0)), 0.0);

    shared.set_mute(Band::Low, false);
    let mut buffer = AudioBuffer::from_channels(&input);
    engine.process(&mut buffer).unwrap();
    assert!(peak(buffer.channel(0)) > 0.0);
}

// ============================================================================
// DYNAMICS
// ============================================================================

#[test]
fn test_infinite_ratio_limits_to_threshold() {
    let shared = Arc::new(SharedParameters::new());
    shared.set_solo(Band::Low, true);
    shared.set_threshold(Band::Low, -20.0);
    shared.set_ratio(Band::Low, f32::INFINITY);
    shared.set_attack(Band::Low, 5.0);
    shared.set_release(Band::Low, 500.0);

    let mut engine = engine_with(Arc::clone(&shared), SAMPLE_RATE, 1);
    let input = vec![sine(100.0, 1.0, 48000)];
    let output = run(&mut engine, &input, &[BLOCK]);

    let tail = &output[0][43200..];
    assert!(peak(tail) < db_to_gain(-18.0));
    assert!(peak(tail) > db_to_gain(-26.0));
}

#[test]
fn test_lower_threshold_never_louder() {
    let render = |threshold_db: f32| {
        let shared = Arc::new(SharedParameters::new());
        shared.set_solo(Band::Mid, true);
        shared.set_threshold(Band::Mid, threshold_db);
        shared.set_ratio(Band::Mid, 4.0);
        let mut engine = engine_with(shared, SAMPLE_RATE, 1);
        run(&mut engine, &generate_noise_channels(1, 4800, 21), &[BLOCK])
    };

    let gentle = render(-10.0);
    let heavy = render(-30.0);
    for (g, h) in gentle[0].iter().zip(&heavy[0]) {
        assert!(h.abs() <= g.abs() + 1e-6);
    }
    assert!(peak(&heavy[0]) < peak(&gentle[0]));
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_reprepare_matches_fresh_engine() {
    let shared = Arc::new(SharedParameters::new());
    for band in Band::ALL {
        shared.set_threshold(band, -24.0);
    }

    // Run at one rate, then reconfigure for another
    let mut reused = engine_with(Arc::clone(&shared), 44100.0, 2);
    run(&mut reused, &generate_noise_channels(2, 3000, 5), &[BLOCK]);
    reused
        .prepare(ProcessSpec::new(SAMPLE_RATE, BLOCK, 2))
        .unwrap();

    let mut fresh = engine_with(Arc::clone(&shared), SAMPLE_RATE, 2);

    let input = generate_noise_channels(2, 3000, 8);
    assert_eq!(
        run(&mut reused, &input, &[BLOCK]),
        run(&mut fresh, &input, &[BLOCK])
    );
    assert_eq!(reused.meters().snapshot(), fresh.meters().snapshot());
}
