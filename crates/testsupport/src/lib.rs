pub mod fake;
pub mod helpers;

pub use fake::*;
pub use helpers::*;
