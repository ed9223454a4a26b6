//! Example: a control thread moving parameters while blocks are processed
//!
//! Run with: cargo run --package mbcomp-core --example live_parameters

use mbcomp_core::{AudioBuffer, Band, MixEngine, ProcessSpec, SharedParameters};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("mbcomp_core=debug,info")
        .init();

    let shared = Arc::new(SharedParameters::new());
    shared.set_threshold(Band::Low, -30.0);
    shared.set_ratio_choice(Band::Low, 8);

    let mut engine = MixEngine::new(Arc::clone(&shared));
    let spec = ProcessSpec::new(48000.0, 256, 2);
    engine.prepare(spec)?;
    let meters = engine.meters();

    // Control side: sweep the low-mid crossover and toggle a solo
    let control = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            for step in 0..20 {
                shared.set_low_mid_crossover(100.0 + step as f32 * 40.0);
                shared.set_solo(Band::Low, step % 10 >= 5);
                thread::sleep(Duration::from_millis(2));
            }
        })
    };

    // Audio side: a bass-heavy test tone, one block at a time
    let mut buffer = AudioBuffer::new(spec.channels, spec.max_block_size);
    let mut phase = 0.0_f32;
    let increment = 2.0 * std::f32::consts::PI * 80.0 / spec.sample_rate;
    for block in 0..200 {
        for channel in buffer.channels_mut() {
            let mut p = phase;
            for sample in channel.iter_mut() {
                *sample = 0.8 * p.sin();
                p += increment;
            }
        }
        phase = (phase + increment * spec.max_block_size as f32) % (2.0 * std::f32::consts::PI);

        engine.process(&mut buffer)?;

        if block % 40 == 0 {
            let [low, mid, high] = meters.snapshot();
            println!(
                "block {:3}: GR low {:5.2} dB  mid {:5.2} dB  high {:5.2} dB  peak {:.3}",
                block,
                low,
                mid,
                high,
                buffer.peak()
            );
        }
        thread::sleep(Duration::from_micros(200));
    }

    control.join().map_err(|_| "control thread panicked")?;
    Ok(())
}
