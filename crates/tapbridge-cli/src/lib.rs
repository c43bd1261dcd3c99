//! The `tapbridge` binary: configuration, logging, signal handling and the
//! wiring of the bridge components.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod shutdown;

pub use app::run;
pub use cli::Cli;
pub use config::Config;
pub use shutdown::ShutdownController;
