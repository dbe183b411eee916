pub mod console;
pub mod coordinator;
pub mod forms;
pub mod logs;
pub mod registry;

pub use console::*;
pub use coordinator::*;
pub use forms::*;
pub use logs::*;
pub use registry::*;
