pub mod cli;
pub mod config;

pub use cli::{build_console, execute, Cli, Commands};
pub use config::load_config;
