pub mod cli;
pub mod completion;
pub mod desktop;
pub mod flatten;
pub mod load_config;
pub mod preview_server;

pub use cli::{run, Cli, Commands};
