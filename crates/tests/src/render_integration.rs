//! Integration tests for file rendering
//!
//! Config files and WAV files on disk, rendered through `render_file`.

use hound::{SampleFormat, WavSpec, WavWriter};
use mbcomp_core::{AudioError, Band, ConfigManager, MbcompConfig, ProcessSpec, SharedParameters};
use mbcomp_infra::{read_wav, render_file, write_wav, OfflineRenderer};
use std::sync::Arc;
use tempfile::TempDir;

fn drum_like(frames: usize, sample_rate: f32) -> Vec<f32> {
    // Decaying 60 Hz thump every 100 ms over a quiet 5 kHz tone
    let period = (sample_rate * 0.1) as usize;
    (0..frames)
        .flat_map(|i| {
            let t = i as f32 / sample_rate;
            let since_hit = (i % period) as f32 / sample_rate;
            let thump = (-since_hit * 40.0).exp() * (2.0 * std::f32::consts::PI * 60.0 * t).sin();
            let hiss = 0.05 * (2.0 * std::f32::consts::PI * 5000.0 * t).sin();
            [0.9 * thump + hiss, 0.8 * thump - hiss]
        })
        .collect()
}

#[tokio::test]
async fn test_render_with_saved_config() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::new(dir.path().to_path_buf());

    let mut config = MbcompConfig::factory_default();
    config.engine.block_size = 128;
    config.parameters.band_mut(Band::Low).threshold_db = -30.0;
    config.parameters.band_mut(Band::Low).ratio = 8.0;
    config.parameters.band_mut(Band::Low).attack_ms = 5.0;
    manager.save(&config).await.unwrap();

    let loaded = manager.load().await;
    assert_eq!(loaded, config);

    let source = dir.path().join("drums.wav");
    let target = dir.path().join("drums_out.wav");
    let samples = drum_like(24000, 48000.0);
    write_wav(&source, 48000, 2, &samples).unwrap();

    let shared = Arc::new(SharedParameters::from_parameters(&loaded.parameters));
    let report = render_file(&source, &target, shared, loaded.engine.block_size).unwrap();

    assert_eq!(report.frames, 24000);
    assert_eq!(report.block_size, 128);
    assert!(report.peak_reduction(Band::Low) > 6.0);
    assert!(report.peak_reduction(Band::High) < report.peak_reduction(Band::Low));

    // The file on disk holds exactly what an in-memory render produces
    let shared = Arc::new(SharedParameters::from_parameters(&loaded.parameters));
    let mut renderer =
        OfflineRenderer::new(shared, ProcessSpec::new(48000.0, 128, 2)).unwrap();
    let (expected, _) = renderer.render(&samples).unwrap();
    assert_eq!(read_wav(&target).unwrap().samples, expected);
}

#[test]
fn test_integer_source_bypassed_round_trip() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("int24.wav");
    let target = dir.path().join("out.wav");

    let spec = WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 24,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&source, spec).unwrap();
    let values = [0i32, 4_194_304, -8_388_608, 1_000];
    for v in values {
        writer.write_sample(v).unwrap();
    }
    writer.finalize().unwrap();

    let shared = Arc::new(SharedParameters::new());
    shared.set_master_bypass(true);
    let report = render_file(&source, &target, shared, 64).unwrap();
    assert_eq!(report.sample_rate, 44100.0);
    assert_eq!(report.blocks, 1);

    let rendered = read_wav(&target).unwrap();
    let scale = 1.0 / 8_388_608.0;
    let expected: Vec<f32> = values.iter().map(|&v| v as f32 * scale).collect();
    assert_eq!(rendered.samples, expected);
    assert_eq!(rendered.samples[1], 0.5);
}

#[test]
fn test_missing_source_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("out.wav");

    let result = render_file(
        dir.path().join("absent.wav"),
        &target,
        Arc::new(SharedParameters::new()),
        256,
    );
    assert!(matches!(result, Err(AudioError::StreamError(_))));
    assert!(!target.exists());
}

#[test]
fn test_zero_block_size_is_rejected() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("in.wav");
    write_wav(&source, 48000, 1, &[0.1, 0.2, 0.3]).unwrap();

    let result = render_file(
        &source,
        dir.path().join("out.wav"),
        Arc::new(SharedParameters::new()),
        0,
    );
    assert!(matches!(result, Err(AudioError::InvalidConfiguration(_))));
}
