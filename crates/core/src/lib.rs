pub mod config;
pub mod error;
pub mod kpi;
pub mod sd;
pub mod snapshot;

pub use config::Config;
pub use error::*;
pub use kpi::*;
pub use sd::*;
pub use snapshot::*;
