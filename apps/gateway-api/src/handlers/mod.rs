//! Handlers 模块

pub mod bridges;
pub mod connections;
pub mod health;
pub mod metrics;
pub mod polling;
pub mod tags;

pub use bridges::*;
pub use connections::*;
pub use health::*;
pub use metrics::*;
pub use polling::*;
pub use tags::*;
