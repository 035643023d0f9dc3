//! Realtime side of one tester instance
//!
//! `AbTesterModule` owns the router and shares the port set with the
//! control surface. The host calls `update_settings` whenever ports may have
//! changed and `process` once per audio callback.

use std::sync::Arc;

use serde::Serialize;

use super::router::{Router, RouterDump};
use crate::error::TesterResult;
use crate::port::{layout, PortSet};
use crate::types::{Sample, Variant, BLOCK_SIZE, DEFAULT_BYPASS_FADE_MS};

/// Diagnostic snapshot of a module
#[derive(Debug, Clone, Serialize)]
pub struct ModuleDump {
    pub sample_rate: u32,
    pub router: RouterDump,
    /// Every port value keyed by id, in layout order
    pub ports: Vec<(String, f32)>,
}

/// One tester instance as seen by the audio host
pub struct AbTesterModule {
    variant: Variant,
    ports: Arc<PortSet>,
    router: Router,
    sample_rate: u32,
}

impl AbTesterModule {
    /// Create a module with a fresh port set
    pub fn new(variant: Variant, sample_rate: u32) -> TesterResult<Self> {
        Self::with_fade(variant, sample_rate, DEFAULT_BYPASS_FADE_MS)
    }

    /// Create a module with a custom bypass crossfade time
    pub fn with_fade(variant: Variant, sample_rate: u32, fade_ms: f32) -> TesterResult<Self> {
        let ports = Arc::new(layout::build_ports(variant));
        Self::with_ports(variant, ports, sample_rate, fade_ms, BLOCK_SIZE)
    }

    /// Create a module around an existing port set
    pub fn with_ports(
        variant: Variant,
        ports: Arc<PortSet>,
        sample_rate: u32,
        fade_ms: f32,
        block_size: usize,
    ) -> TesterResult<Self> {
        let router = Router::with_options(variant, &ports, sample_rate, fade_ms, block_size)?;
        Ok(Self {
            variant,
            ports,
            router,
            sample_rate,
        })
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Port set shared with the control surface
    pub fn ports(&self) -> &Arc<PortSet> {
        &self.ports
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// False if the block buffer could not be allocated
    pub fn is_ready(&self) -> bool {
        self.router.is_ready()
    }

    /// Host sample rate changed
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == self.sample_rate {
            return;
        }
        log::info!("[MODULE] Sample rate {} -> {}", self.sample_rate, sample_rate);
        self.sample_rate = sample_rate;
        self.router.update_sample_rate(sample_rate);
    }

    /// Pull the current port values into the router
    pub fn update_settings(&mut self) {
        self.router.update_settings();
    }

    /// Process one host buffer; see [`Router::process`]
    pub fn process(
        &mut self,
        inputs: &[&[Sample]],
        returns: &[Option<&[Sample]>],
        outputs: &mut [&mut [Sample]],
        samples: usize,
    ) {
        self.router.process(inputs, returns, outputs, samples);
    }

    /// Snapshot of router state and port values
    pub fn dump(&self) -> ModuleDump {
        ModuleDump {
            sample_rate: self.sample_rate,
            router: self.router.dump(),
            ports: self
                .ports
                .iter()
                .map(|p| (p.id().to_string(), p.value()))
                .collect(),
        }
    }

    /// The snapshot rendered as pretty JSON
    pub fn dump_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.dump())
    }
}
