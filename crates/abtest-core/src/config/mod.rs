//! Configuration for tester hosts
//!
//! # Usage
//!
//! ```ignore
//! use abtest_core::config::{default_config_path, load_config, TesterConfig};
//!
//! let config: TesterConfig = load_config(&default_config_path());
//! let variant = config.variant()?;
//! ```

mod io;
mod tester;

pub use io::{load_config, save_config};
pub use tester::{default_config_path, TesterConfig, CONFIG_FILE};
