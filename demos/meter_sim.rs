//! Simulates an audio thread feeding a stereo meter and prints the decaying
//! levels as text bars, the way a meter widget would consume them.

use std::cell::RefCell;
use std::f32::consts::TAU;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use levelflow::prelude::*;

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZE: usize = 512;
const BAR_WIDTH: usize = 40;

fn main() -> Result<()> {
    env_logger::init();

    let ticker = MeterTicker::new();
    let (mut meter, mut input) = LevelMeter::new();
    meter.prepare_to_play(2);
    meter.attach(&ticker);

    let levels = Rc::new(RefCell::new(ChannelLevels::new(
        Arc::new(Scale::default()),
        2,
    )));
    let _subscription = meter.subscribe(&levels);

    // Pretend audio thread: a 440 Hz tone that swells and fades, measured
    // block by block.
    let producer = thread::spawn(move || {
        let mut phase = 0.0f32;
        let mut left = [0.0f32; BLOCK_SIZE];
        let mut right = [0.0f32; BLOCK_SIZE];
        for block in 0..300 {
            let envelope = (block as f32 / 40.0).sin().abs();
            for i in 0..BLOCK_SIZE {
                let sample = envelope * (phase * TAU).sin();
                left[i] = sample;
                right[i] = 0.5 * sample;
                phase = (phase + 440.0 / SAMPLE_RATE).fract();
            }
            input.measure_block(&[&left[..], &right[..]]);
            thread::sleep(Duration::from_secs_f32(BLOCK_SIZE as f32 / SAMPLE_RATE));
        }
    });

    let interval = ticker.interval();
    for _ in 0..100 {
        ticker.tick();

        let mut levels = levels.borrow_mut();
        let scale = levels.scale().clone();
        let mut line = String::new();
        for channel in 0..levels.num_channels() {
            let proportion = scale.proportion_for_level(levels.peak_value(channel));
            let hold_db = gain_to_db(levels.peak_hold_value(channel), scale.minus_infinity_db());
            let bar = "#".repeat((proportion * BAR_WIDTH as f64).round() as usize);
            let over = if levels.is_overloaded(channel) { " OVER" } else { "" };
            line.push_str(&format!(
                "ch{channel} [{bar:<width$}] hold {hold_db:>6.1} dB{over}  ",
                width = BAR_WIDTH,
            ));
        }
        println!("{line}");
        drop(levels);

        thread::sleep(interval);
    }

    producer.join().ok();
    Ok(())
}
