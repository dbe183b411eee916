pub mod service;
pub mod tracing;

pub use service::*;
pub use self::tracing::*;
