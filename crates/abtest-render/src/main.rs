//! A/B Tester offline renderer
//!
//! Runs WAV sources through the tester engine exactly as an audio host would:
//! ports are set by a control surface, the engine processes host-sized
//! buffers, and the mixed result is written to a WAV file. Useful for
//! checking levels and switching artifacts without a plugin host.
//!
//! ## Example
//!
//! ```text
//! abtest-render -v x2_stereo -s 2 -g 2=0.5 -o mix.wav reference.wav remaster.wav
//! RUST_LOG=debug abtest-render --blind -s 1 -o guess.wav a.wav b.wav
//! ```

mod args;
mod wav;

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use abtest_core::blind::BlindShuffler;
use abtest_core::config::{default_config_path, load_config, TesterConfig};
use abtest_core::control::TesterController;
use abtest_core::engine::AbTesterModule;
use abtest_core::kvt::KvtStore;
use abtest_core::port::layout;
use abtest_core::{gain_to_db, Variant};

use args::{Args, USAGE};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{}", USAGE);
        e
    })?;
    if args.help {
        print!("{}", USAGE);
        return Ok(());
    }

    render(&args)
}

fn render(args: &Args) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config: TesterConfig = load_config(&config_path);

    let variant: Variant = match &args.variant {
        Some(id) => id.parse()?,
        None => config.variant().context("Invalid variant in config")?,
    };
    if args.inputs.len() > variant.group_count() {
        bail!(
            "{} has {} groups, got {} input files",
            variant,
            variant.group_count(),
            args.inputs.len()
        );
    }

    // One planar source per group, padded with silence to a common length
    let arity = variant.arity().channels();
    let mut sources = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        sources.push(wav::read(path)?.fit_channels(arity)?);
    }
    let sample_rate = sources[0].sample_rate;
    if let Some(other) = sources.iter().find(|s| s.sample_rate != sample_rate) {
        bail!(
            "All inputs must share one sample rate ({} Hz vs {} Hz)",
            sample_rate,
            other.sample_rate
        );
    }
    let frames = sources.iter().map(wav::PlanarAudio::frames).max().unwrap_or(0);

    let mut inputs: Vec<Vec<f32>> = vec![vec![0.0; frames]; variant.input_count()];
    for (group, source) in sources.iter().enumerate() {
        for (c, channel) in source.channels.iter().enumerate() {
            inputs[group * arity + c][..channel.len()].copy_from_slice(channel);
        }
    }

    let mut module = AbTesterModule::with_fade(variant, sample_rate, config.fade_ms())?;
    if !module.is_ready() {
        bail!("Engine could not allocate its processing buffers");
    }

    let store = Arc::new(KvtStore::new());
    let seed = args.seed.or(config.shuffle_seed);
    let mut controller = TesterController::new(
        variant,
        Arc::clone(module.ports()),
        store,
        BlindShuffler::from_seed(seed),
    )?;
    apply_settings(&mut controller, args)?;

    module.update_settings();
    let outputs = run(&mut module, &inputs, frames, args.buffer);

    wav::write(
        args.output.as_deref().context("No output file")?,
        sample_rate,
        &outputs,
    )?;

    if args.dump {
        println!("{}", module.dump_json()?);
    }
    Ok(())
}

/// Drive the ports the way a user would from the plugin UI
fn apply_settings(controller: &mut TesterController, args: &Args) -> Result<()> {
    let ports = Arc::clone(controller.ports());

    for &(group, gain) in &args.gains {
        let port = ports.port(&layout::gain_id(group))?;
        port.set_value(gain);
        port.notify_all();
    }
    if args.mono {
        match ports.get(layout::MONO) {
            Some(port) => {
                port.set_value(1.0);
                port.notify_all();
            }
            None => log::warn!("--mono ignored, {} is already mono", controller.variant()),
        }
    }

    let mut select = args.select;
    if args.blind {
        for &group in &args.enable {
            let port = ports.port(&layout::blind_enable_id(group))?;
            port.set_value(1.0);
            port.notify_all();
        }
        controller.set_blind(true)?;

        let order = controller.blind_order().context("Blind test produced no order")?;
        log::info!("Blind grid has {} positions", order.len());
        log::debug!("Blind order: {:?}", order.order());

        // --select names a grid position in blind mode
        if select > 0 {
            select = controller
                .blind_group_at(select - 1)
                .map(|g| g + 1)
                .with_context(|| format!("Grid position {} does not exist", select))?;
        }
    }

    let selector = ports.port(layout::SELECTOR)?;
    selector.set_value(select as f32);
    selector.notify_all();
    controller.poll()?;

    if select == 0 {
        log::warn!("No group selected, output will be silent");
    } else if !args.blind {
        let name = controller.names().get(select - 1).unwrap_or("?").to_string();
        log::info!("Rendering group {} ({})", select, name);
    }
    Ok(())
}

/// Process the whole input in host-sized buffers and collect peak meters
fn run(
    module: &mut AbTesterModule,
    inputs: &[Vec<f32>],
    frames: usize,
    buffer: usize,
) -> Vec<Vec<f32>> {
    let variant = module.variant();
    let mut outputs = vec![vec![0.0f32; frames]; variant.output_count()];
    let meters: Vec<_> = (0..variant.input_count())
        .filter_map(|i| module.ports().get(&layout::meter_id(variant, i)))
        .collect();
    let mut peaks = vec![0.0f32; meters.len()];

    let mut offset = 0;
    while offset < frames {
        let n = buffer.min(frames - offset);
        let range = offset..offset + n;

        let ins: Vec<&[f32]> = inputs.iter().map(|c| &c[range.clone()]).collect();
        let mut outs: Vec<&mut [f32]> = outputs.iter_mut().map(|c| &mut c[range.clone()]).collect();
        module.process(&ins, &[], &mut outs, n);

        for (peak, meter) in peaks.iter_mut().zip(&meters) {
            *peak = peak.max(meter.value());
        }
        offset += n;
    }

    for (peak, meter) in peaks.iter().zip(&meters) {
        log::info!("{:>7}: peak {:+.1} dB", meter.id(), gain_to_db(*peak));
    }
    outputs
}
