//! Realtime audio engine of the A/B tester
//!
//! # Architecture
//!
//! ```text
//! inputs (groups × arity) ─┬─► + return ─► gain ramp ─► peak ─► bypass ─┐
//!                          │                              │              │
//!                          │                           meter port        ▼
//!                          └───────────────────────────────────────► Σ per output
//!                                                                        │
//!                                                          mono? (L+R)/2 │
//!                                                                        ▼
//!                                                                     outputs
//! ```
//!
//! - **Control thread**: writes ports, then asks the module to `update_settings`
//! - **Audio thread**: owns the module and calls `process`; never blocks or
//!   allocates, reads ports via relaxed atomics
//!
//! # Example Usage
//!
//! ```ignore
//! use abtest_core::engine::AbTesterModule;
//! use abtest_core::Variant;
//!
//! let mut module = AbTesterModule::new(Variant::X4_STEREO, 48000)?;
//! module.ports().get("sel").unwrap().set_value(2.0);
//! module.update_settings();
//! module.process(&inputs, &[], &mut outputs, frames);
//! ```

mod bypass;
mod module;
mod router;
mod selector;

pub use bypass::Bypass;
pub use module::{AbTesterModule, ModuleDump};
pub use router::{ChannelDump, InputChannel, Router, RouterDump};
pub use selector::SelectorState;
