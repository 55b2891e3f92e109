pub mod tool;
pub mod tool_registry;

pub use tool::*;
pub use tool_registry::*;
