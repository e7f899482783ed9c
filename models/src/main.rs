use std::env;

use anyhow::{Result, bail};
use log::info;
use models::{
    RunConfig, Task, TrainingConfig,
    arch::{DigitClassificationModel, LanguageIDModel, PerceptronModel, RegressionModel},
    loader,
};
use rand::{SeedableRng, rngs::StdRng};
use serde_json::{Value, json};

const USAGE: &str = "usage: train <perceptron|regression|digits|language> [config.json]";

fn run(config: &RunConfig, rng: &mut StdRng) -> Result<Value> {
    let training = config.training();

    let summary = match config.task {
        Task::Perceptron => {
            let mut dataset = loader::perceptron_dataset(config, rng)?;
            let mut model = PerceptronModel::new(dataset.x().ncols(), rng)?;
            let report = model.train(&mut dataset)?;
            let weights: Vec<f32> = model.get_weights()?.iter().copied().collect();
            json!({ "report": report, "weights": weights })
        }
        Task::Regression => {
            let training = training.unwrap_or(TrainingConfig::regression());
            let mut dataset = loader::regression_dataset(config, rng)?;
            let mut model = RegressionModel::with_config(training, rng)?;
            let report = model.train(&mut dataset)?;
            json!({ "report": report, "training": model.config() })
        }
        Task::Digits => {
            let training = training.unwrap_or(TrainingConfig::digits());
            let mut dataset = loader::digits_dataset(config, rng)?;
            let mut model = DigitClassificationModel::with_config(training, rng)?;
            let report = model.train(&mut dataset)?;
            json!({ "report": report, "training": model.config() })
        }
        Task::Language => {
            let training = training.unwrap_or(TrainingConfig::language());
            let mut dataset = loader::language_dataset(config, rng)?;
            let mut model = LanguageIDModel::with_config(training, rng)?;
            let report = model.train(&mut dataset)?;
            json!({
                "report": report,
                "training": model.config(),
                "languages": model.languages(),
            })
        }
    };

    Ok(summary)
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(task) = args.next() else {
        bail!(USAGE);
    };
    let task: Task = task.parse()?;

    let config = match args.next() {
        Some(path) => {
            let config = RunConfig::from_file(&path)?;
            if config.task != task {
                bail!("{path} configures a {} run, not {task}", config.task);
            }
            config
        }
        None => RunConfig::new(task),
    };

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    info!(task = task.name(); "starting training");
    let summary = run(&config, &mut rng)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
