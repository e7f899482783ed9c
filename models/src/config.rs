use std::{
    fmt, fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::ConfigErr;

const fn non_zero(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => NonZeroUsize::MIN,
    }
}

/// The hyperparameters of a gradient descent training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub batch_size: NonZeroUsize,
    pub learning_rate: f32,
    /// The loss to go below or the accuracy to reach, depending on the model.
    pub threshold: f32,
    /// Gives up after this many epochs. Without it training runs until the threshold is met.
    #[serde(default)]
    pub max_epochs: Option<NonZeroUsize>,
}

impl TrainingConfig {
    pub const fn regression() -> Self {
        Self {
            batch_size: non_zero(200),
            learning_rate: 0.05,
            threshold: 0.02,
            max_epochs: None,
        }
    }

    pub const fn digits() -> Self {
        Self {
            batch_size: non_zero(100),
            learning_rate: 0.5,
            threshold: 0.98,
            max_epochs: None,
        }
    }

    pub const fn language() -> Self {
        Self {
            batch_size: non_zero(100),
            learning_rate: 0.5,
            threshold: 0.84,
            max_epochs: None,
        }
    }

    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = NonZeroUsize::new(max_epochs);
        self
    }

    /// Checks that the hyperparameters describe a possible run.
    pub fn validate(&self) -> Result<(), ConfigErr> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0. {
            return Err(ConfigErr::Invalid(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !self.threshold.is_finite() {
            return Err(ConfigErr::Invalid("threshold must be finite".into()));
        }

        Ok(())
    }
}

/// The model a run trains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Perceptron,
    Regression,
    Digits,
    Language,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Perceptron => "perceptron",
            Self::Regression => "regression",
            Self::Digits => "digits",
            Self::Language => "language",
        }
    }

    /// Returns the default hyperparameters of the task's model.
    ///
    /// The perceptron doesn't use gradient descent, so it has none.
    pub fn default_training(&self) -> Option<TrainingConfig> {
        match self {
            Self::Perceptron => None,
            Self::Regression => Some(TrainingConfig::regression()),
            Self::Digits => Some(TrainingConfig::digits()),
            Self::Language => Some(TrainingConfig::language()),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Task {
    type Err = ConfigErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "perceptron" => Ok(Self::Perceptron),
            "regression" => Ok(Self::Regression),
            "digits" => Ok(Self::Digits),
            "language" => Ok(Self::Language),
            other => Err(ConfigErr::Invalid(format!(
                "unknown task {other:?}, expected one of perceptron, regression, digits, language"
            ))),
        }
    }
}

fn default_train_size() -> usize {
    1000
}

fn default_dev_size() -> usize {
    200
}

fn default_dimensions() -> usize {
    2
}

fn default_max_len() -> usize {
    8
}

/// Where the examples of a run come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetConfig {
    /// Generated data with a known solution.
    Synthetic {
        #[serde(default = "default_train_size")]
        train: usize,
        #[serde(default = "default_dev_size")]
        dev: usize,
        /// Only used by the perceptron.
        #[serde(default = "default_dimensions")]
        dimensions: usize,
        /// Only used by the language model.
        #[serde(default = "default_max_len")]
        max_len: usize,
    },
    /// A JSON file whose layout depends on the task.
    Local { path: PathBuf },
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self::Synthetic {
            train: default_train_size(),
            dev: default_dev_size(),
            dimensions: default_dimensions(),
            max_len: default_max_len(),
        }
    }
}

/// Everything the `train` binary needs to know to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub task: Task,
    /// Seeds parameter initialization, data generation and shuffling.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Overrides the model's default hyperparameters.
    #[serde(default)]
    pub training: Option<TrainingConfig>,
    #[serde(default)]
    pub dataset: DatasetConfig,
}

impl RunConfig {
    /// A run of `task` with its default hyperparameters over synthetic data.
    pub fn new(task: Task) -> Self {
        Self {
            task,
            seed: None,
            training: None,
            dataset: DatasetConfig::default(),
        }
    }

    /// Reads a `RunConfig` from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigErr> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigErr::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// The hyperparameters the run trains with.
    pub fn training(&self) -> Option<TrainingConfig> {
        self.training.or_else(|| self.task.default_training())
    }

    pub fn validate(&self) -> Result<(), ConfigErr> {
        if let Some(training) = &self.training {
            if self.task == Task::Perceptron {
                return Err(ConfigErr::Invalid(
                    "the perceptron doesn't take training hyperparameters".into(),
                ));
            }
            training.validate()?;
        }

        if let DatasetConfig::Synthetic {
            train,
            dev,
            dimensions,
            max_len,
        } = self.dataset
        {
            if train == 0 || dev == 0 {
                return Err(ConfigErr::Invalid(
                    "synthetic datasets need training and held-out examples".into(),
                ));
            }
            if dimensions == 0 || max_len == 0 {
                return Err(ConfigErr::Invalid(
                    "synthetic dimensions and word length must be positive".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_gets_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{ "task": "digits", "seed": 3 }"#).unwrap();

        assert_eq!(config.task, Task::Digits);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.dataset, DatasetConfig::default());
        assert_eq!(config.training(), Some(TrainingConfig::digits()));
    }

    #[test]
    fn training_override_replaces_defaults() {
        let json = r#"{
            "task": "regression",
            "training": { "batch_size": 50, "learning_rate": 0.01, "threshold": 0.05, "max_epochs": 10 },
            "dataset": { "synthetic": { "train": 300 } }
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();

        let training = config.training().unwrap();
        assert_eq!(training.batch_size.get(), 50);
        assert_eq!(training.max_epochs, NonZeroUsize::new(10));
        assert!(matches!(
            config.dataset,
            DatasetConfig::Synthetic { train: 300, dev: 200, .. }
        ));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let json = r#"{ "task": "language", "training": { "batch_size": 0, "learning_rate": 0.5, "threshold": 0.8 } }"#;
        assert!(serde_json::from_str::<RunConfig>(json).is_err());
    }

    #[test]
    fn negative_learning_rate_is_rejected() {
        let mut config = RunConfig::new(Task::Regression);
        config.training = Some(TrainingConfig {
            learning_rate: -0.05,
            ..TrainingConfig::regression()
        });

        assert!(matches!(config.validate(), Err(ConfigErr::Invalid(_))));
    }

    #[test]
    fn tasks_parse_from_their_names() {
        for task in [Task::Perceptron, Task::Regression, Task::Digits, Task::Language] {
            assert_eq!(task.name().parse::<Task>().unwrap(), task);
        }
        assert!("mnist".parse::<Task>().is_err());
    }
}
