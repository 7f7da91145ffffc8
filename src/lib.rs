// src/lib.rs
pub mod backends;
pub mod cli;
pub mod config;
pub mod engine;
pub mod expand;
pub mod normalize;
pub mod ratelimit;
pub mod session;
pub mod sink;
pub mod target;
pub mod types;

pub use cli::Args;
pub use engine::{Module, ReconEngine};
pub use types::{Config, InvestigationRecord, LookupResult, RustReconError, Target};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
