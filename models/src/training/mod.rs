mod report;
mod trainer;

pub use report::{TrainReport, TrainState};
pub use trainer::GradientTrainer;
