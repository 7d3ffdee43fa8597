//! Logging setup and stage timing.

mod logging;
mod timer;

pub use logging::{env_filter, init_logging, LogFormat, DEFAULT_FILTER};
pub use timer::StageTimer;
