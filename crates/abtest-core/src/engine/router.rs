//! Router - mixes the selected input group into the shared output
//!
//! Features:
//! - Per-group gain with a linear ramp across each block (no zipper clicks)
//! - Bypass crossfade for every non-selected channel
//! - Per-channel peak meters, zeroed while a blind test runs
//! - Optional return signal added before the gain
//! - Mono mixdown for stereo variants
//!
//! Port values are sampled in [`Router::update_settings`]; [`Router::process`]
//! only reads the snapshot, writes meter ports, and never allocates.

use std::sync::Arc;

use serde::Serialize;

use super::bypass::Bypass;
use super::selector::SelectorState;
use crate::error::{TesterError, TesterResult};
use crate::port::{layout, Port, PortSet};
use crate::types::{Sample, Variant, BLOCK_SIZE, DEFAULT_BYPASS_FADE_MS};

/// One audio input channel
#[derive(Debug)]
pub struct InputChannel {
    /// 0-based input channel index
    index: usize,
    /// 1-based input group this channel belongs to
    group: usize,
    /// Output this channel is summed into
    output: usize,
    /// Gain applied at the end of the next block
    gain: f32,
    /// Gain at the end of the previous block
    old_gain: f32,
    bypass: Bypass,
    /// Peak of the current process call
    peak: f32,
    meter: Arc<Port>,
}

impl InputChannel {
    /// 0-based input channel index
    pub fn index(&self) -> usize {
        self.index
    }

    /// 1-based group id
    pub fn group(&self) -> usize {
        self.group
    }

    /// Output index
    pub fn output(&self) -> usize {
        self.output
    }

    /// Current target gain
    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass.is_bypassed()
    }

    /// Multiply the block by a gain sliding from the previous to the current
    /// value; the last sample carries exactly the current gain.
    fn apply_gain_ramp(&mut self, buffer: &mut [Sample]) {
        let len = buffer.len();
        if len == 0 {
            return;
        }

        if self.gain == self.old_gain {
            let gain = self.gain;
            buffer.iter_mut().for_each(|s| *s *= gain);
        } else {
            let delta = (self.gain - self.old_gain) / len as f32;
            for (i, s) in buffer.iter_mut().enumerate() {
                *s *= self.old_gain + delta * (i + 1) as f32;
            }
        }
        self.old_gain = self.gain;
    }
}

/// Snapshot of one channel for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct ChannelDump {
    pub index: usize,
    pub group: usize,
    pub output: usize,
    pub gain: f32,
    pub old_gain: f32,
    pub bypassed: bool,
    pub fade_position: f32,
    pub peak: f32,
}

/// Snapshot of the router for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct RouterDump {
    pub variant: String,
    pub ready: bool,
    pub selector: usize,
    pub blind: bool,
    pub mono: bool,
    pub block_size: usize,
    pub channels: Vec<ChannelDump>,
}

/// Channel router and mixer
pub struct Router {
    variant: Variant,
    channels: Vec<InputChannel>,
    /// Working buffer for one block; `None` if allocation failed
    scratch: Option<Vec<Sample>>,
    block_size: usize,
    selector: SelectorState,
    blind: bool,
    mono: bool,
    /// No settings applied yet: the next update jumps instead of fading
    fresh: bool,

    selector_port: Arc<Port>,
    blind_port: Arc<Port>,
    mono_port: Option<Arc<Port>>,
    /// One gain port per group
    gain_ports: Vec<Arc<Port>>,
}

impl Router {
    /// Create a router for a variant, bound to its ports
    pub fn new(variant: Variant, ports: &PortSet, sample_rate: u32) -> TesterResult<Self> {
        Self::with_options(variant, ports, sample_rate, DEFAULT_BYPASS_FADE_MS, BLOCK_SIZE)
    }

    /// Create a router with explicit crossfade time and block size.
    ///
    /// If the block buffer cannot be reserved, the router is still returned
    /// but stays disabled: every `process` call only outputs silence.
    pub fn with_options(
        variant: Variant,
        ports: &PortSet,
        sample_rate: u32,
        fade_ms: f32,
        block_size: usize,
    ) -> TesterResult<Self> {
        let outputs = variant.output_count();
        let groups = variant.group_count();

        let gain_ports = (1..=groups)
            .map(|g| ports.port(&layout::gain_id(g)))
            .collect::<TesterResult<Vec<_>>>()?;

        let channels = (0..variant.input_count())
            .map(|i| {
                Ok(InputChannel {
                    index: i,
                    group: i / outputs + 1,
                    output: i % outputs,
                    gain: 1.0,
                    old_gain: 1.0,
                    bypass: Bypass::new(sample_rate, fade_ms),
                    peak: 0.0,
                    meter: ports.port(&layout::meter_id(variant, i))?,
                })
            })
            .collect::<TesterResult<Vec<_>>>()?;

        let scratch = match allocate_block(block_size) {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                log::error!("[ROUTER] {}; processing disabled", e);
                None
            }
        };

        log::info!(
            "[ROUTER] {} initialized: {} inputs, {} outputs, block {} frames",
            variant,
            channels.len(),
            outputs,
            block_size
        );

        Ok(Self {
            variant,
            channels,
            scratch,
            block_size,
            selector: SelectorState::default(),
            blind: false,
            mono: false,
            fresh: true,
            selector_port: ports.port(layout::SELECTOR)?,
            blind_port: ports.port(layout::BLIND)?,
            mono_port: ports.get(layout::MONO),
            gain_ports,
        })
    }

    /// Whether buffers were allocated and processing is possible
    pub fn is_ready(&self) -> bool {
        self.scratch.is_some()
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn channels(&self) -> &[InputChannel] {
        &self.channels
    }

    pub fn selector(&self) -> SelectorState {
        self.selector
    }

    pub fn is_blind(&self) -> bool {
        self.blind
    }

    pub fn is_mono(&self) -> bool {
        self.mono
    }

    /// Re-time the bypass crossfades; gains and fade positions are kept
    pub fn update_sample_rate(&mut self, sample_rate: u32) {
        for c in &mut self.channels {
            c.bypass.init(sample_rate);
        }
    }

    /// Sample the control ports and recompute gains and bypass states
    pub fn update_settings(&mut self) {
        self.selector.update(self.selector_port.value());
        self.blind = self.blind_port.is_on();
        self.mono = self.mono_port.as_ref().map(|p| p.is_on()).unwrap_or(false);

        for c in &mut self.channels {
            let gain = self.gain_ports[c.group - 1].value();
            let bypass = !self.selector.is_active(c.group);
            c.gain = gain;
            if self.fresh {
                c.old_gain = gain;
                c.bypass.reset(bypass);
            } else {
                c.bypass.set_bypass(bypass);
            }
        }
        self.fresh = false;
    }

    /// Mix `samples` frames.
    ///
    /// `inputs` holds one buffer per input channel, `returns` optionally one
    /// return buffer per input channel, `outputs` one buffer per output.
    /// Missing or short input and output buffers shrink the processed range
    /// instead of panicking; the outputs are always cleared first. A short
    /// return buffer does not shrink the range: it is added up to its own
    /// length and the remaining samples get no return.
    pub fn process(
        &mut self,
        inputs: &[&[Sample]],
        returns: &[Option<&[Sample]>],
        outputs: &mut [&mut [Sample]],
        samples: usize,
    ) {
        for out in outputs.iter_mut() {
            let n = samples.min(out.len());
            out[..n].fill(0.0);
        }

        let Self {
            channels,
            scratch,
            block_size,
            blind,
            mono,
            variant,
            ..
        } = self;

        let Some(scratch) = scratch.as_mut() else {
            return;
        };
        if samples == 0
            || inputs.len() < channels.len()
            || outputs.len() < variant.output_count()
        {
            return;
        }

        let samples = inputs
            .iter()
            .map(|b| b.len())
            .chain(outputs.iter().map(|b| b.len()))
            .fold(samples, usize::min);

        for c in channels.iter_mut() {
            c.peak = 0.0;
        }

        let mut offset = 0;
        while offset < samples {
            let to_do = (samples - offset).min(*block_size);
            let range = offset..offset + to_do;
            let buffer = &mut scratch[..to_do];

            for c in channels.iter_mut() {
                let input = &inputs[c.index][range.clone()];
                buffer.copy_from_slice(input);
                let ret = returns
                    .get(c.index)
                    .copied()
                    .flatten()
                    .and_then(|r| r.get(range.start..range.end.min(r.len())));
                if let Some(ret) = ret {
                    for (dst, &r) in buffer.iter_mut().zip(ret) {
                        *dst += r;
                    }
                }

                c.apply_gain_ramp(buffer);
                if !*blind {
                    c.peak = buffer.iter().fold(c.peak, |m, s| m.max(s.abs()));
                }
                c.bypass.process(buffer);

                let out = &mut outputs[c.output][range.clone()];
                for (o, &s) in out.iter_mut().zip(buffer.iter()) {
                    *o += s;
                }
            }

            if *mono && outputs.len() > 1 {
                let (left, right) = outputs.split_at_mut(1);
                let left = &mut left[0][range.clone()];
                let right = &mut right[0][range];
                for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                    let mid = 0.5 * (*l + *r);
                    *l = mid;
                    *r = mid;
                }
            }

            offset += to_do;
        }

        for c in channels.iter() {
            c.meter.set_value(if *blind { 0.0 } else { c.peak });
        }
    }

    /// Diagnostic snapshot
    pub fn dump(&self) -> RouterDump {
        RouterDump {
            variant: self.variant.id(),
            ready: self.is_ready(),
            selector: self.selector.value(),
            blind: self.blind,
            mono: self.mono,
            block_size: self.block_size,
            channels: self
                .channels
                .iter()
                .map(|c| ChannelDump {
                    index: c.index,
                    group: c.group,
                    output: c.output,
                    gain: c.gain,
                    old_gain: c.old_gain,
                    bypassed: c.bypass.is_bypassed(),
                    fade_position: c.bypass.gain(),
                    peak: c.peak,
                })
                .collect(),
        }
    }
}

/// Reserve the block buffer without aborting on failure
fn allocate_block(block_size: usize) -> TesterResult<Vec<Sample>> {
    let bytes = block_size.saturating_mul(std::mem::size_of::<Sample>());
    if block_size == 0 {
        return Err(TesterError::AllocationFailure(0));
    }
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(block_size)
        .map_err(|_| TesterError::AllocationFailure(bytes))?;
    buffer.resize(block_size, 0.0);
    Ok(buffer)
}
