//! Control surface: everything that runs outside the audio thread

mod controller;
mod names;

pub use controller::TesterController;
pub use names::{default_name, ChannelNames};
