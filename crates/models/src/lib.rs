pub mod config;
pub mod error;
pub mod function;

pub use config::*;
pub use error::*;
pub use function::*;
