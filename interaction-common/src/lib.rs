pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lookup;
pub mod metrics;
pub mod normalize;
pub mod sink;
pub mod types;
