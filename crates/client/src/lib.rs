pub mod http;
pub mod payload;
pub mod resource;

pub use http::*;
pub use payload::*;
pub use resource::*;
