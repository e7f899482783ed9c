pub mod arch;
pub mod config;
pub mod error;
pub mod loader;
mod model;
pub mod training;

pub use config::{RunConfig, Task, TrainingConfig};
pub use error::ConfigErr;
pub use model::Model;
