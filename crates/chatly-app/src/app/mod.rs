pub mod repl;
pub mod setup;

pub use repl::run_repl_mode;
pub use setup::{build_app, App};
