use serde::Serialize;

/// Where a training run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainState {
    #[default]
    Training,
    /// An epoch ended with the stopping metric past its threshold.
    Converged,
}

/// The outcome of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TrainReport {
    pub state: TrainState,
    /// The amount of full passes over the dataset.
    pub epochs: usize,
    /// The amount of parameter updates applied.
    pub updates: usize,
    /// The loss of the last batch seen.
    pub last_loss: Option<f32>,
    /// The held-out accuracy measured after the last epoch, for classifiers.
    pub validation_accuracy: Option<f32>,
}

impl TrainReport {
    pub fn converged(&self) -> bool {
        self.state == TrainState::Converged
    }
}
