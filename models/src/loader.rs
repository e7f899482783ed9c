//! Builds the dataset of a run from its configuration.
//!
//! Local files are JSON documents:
//! * perceptron and regression: `{ "x": [[f32]], "y": [[f32]] }`, one example per row.
//! * digits: `{ "train_x": [[f32]], "train_labels": [usize], "dev_x": [[f32]], "dev_labels": [usize] }`.
//! * language: `{ "alphabet": str, "train": [{ "word": str, "language": usize }], "dev": [...] }`.

use std::{fs, path::Path};

use ndarray::Array2;
use nn::data::{
    ClassificationDataset, InMemoryDataset, SequenceDataset, Word,
    synthetic::{self, DIGIT_CLASSES, DIGIT_FEATURES},
};
use rand::Rng;
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    arch::LANGUAGES,
    config::{DatasetConfig, RunConfig},
    error::ConfigErr,
};

const SINE_POINTS: usize = 200;
const LANGUAGE_CHARS: usize = 47;

#[derive(Debug, Deserialize)]
struct RowsFile {
    x: Vec<Vec<f32>>,
    y: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ClassesFile {
    train_x: Vec<Vec<f32>>,
    train_labels: Vec<usize>,
    dev_x: Vec<Vec<f32>>,
    dev_labels: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct LabeledWord {
    word: String,
    language: usize,
}

#[derive(Debug, Deserialize)]
struct WordsFile {
    alphabet: String,
    train: Vec<LabeledWord>,
    dev: Vec<LabeledWord>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigErr> {
    let content = fs::read_to_string(path).map_err(|source| ConfigErr::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(serde_json::from_str(&content)?)
}

fn matrix(rows: Vec<Vec<f32>>, what: &str) -> Result<Array2<f32>, ConfigErr> {
    let cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != cols) {
        return Err(ConfigErr::Invalid(format!("{what} rows differ in length")));
    }

    let shape = (rows.len(), cols);
    Array2::from_shape_vec(shape, rows.into_iter().flatten().collect())
        .map_err(|e| ConfigErr::Invalid(format!("{what}: {e}")))
}

fn columns(x: &Array2<f32>, expected: usize, what: &str) -> Result<(), ConfigErr> {
    if x.ncols() != expected {
        return Err(ConfigErr::Invalid(format!(
            "{what} must have {expected} columns, got {}",
            x.ncols()
        )));
    }
    Ok(())
}

fn rows_file(path: &Path) -> Result<(Array2<f32>, Array2<f32>), ConfigErr> {
    let RowsFile { x, y } = read_json(path)?;
    Ok((matrix(x, "x")?, matrix(y, "y")?))
}

/// Builds the labeled points of a perceptron run.
pub fn perceptron_dataset<R: Rng + ?Sized>(
    config: &RunConfig,
    rng: &mut R,
) -> Result<InMemoryDataset, ConfigErr> {
    let dataset = match &config.dataset {
        DatasetConfig::Synthetic {
            train, dimensions, ..
        } => synthetic::linearly_separable(*train, *dimensions, rng)?,
        DatasetConfig::Local { path } => {
            let (x, y) = rows_file(path)?;
            columns(&y, 1, "y")?;
            if y.iter().any(|&label| label != 1. && label != -1.) {
                return Err(ConfigErr::Invalid("perceptron labels must be 1 or -1".into()));
            }
            InMemoryDataset::new(x, y)?
        }
    };

    Ok(dataset.shuffled(rng.random()))
}

/// Builds the `(x, f(x))` samples of a regression run.
///
/// Synthetic runs sample `sin(x)` over `[-2π, 2π]`.
pub fn regression_dataset<R: Rng + ?Sized>(
    config: &RunConfig,
    rng: &mut R,
) -> Result<InMemoryDataset, ConfigErr> {
    let dataset = match &config.dataset {
        DatasetConfig::Synthetic { .. } => synthetic::sine(SINE_POINTS)?,
        DatasetConfig::Local { path } => {
            let (x, y) = rows_file(path)?;
            columns(&x, 1, "x")?;
            columns(&y, 1, "y")?;
            InMemoryDataset::new(x, y)?
        }
    };

    Ok(dataset.shuffled(rng.random()))
}

/// Builds the images of a digit classification run.
pub fn digits_dataset<R: Rng + ?Sized>(
    config: &RunConfig,
    rng: &mut R,
) -> Result<ClassificationDataset, ConfigErr> {
    let dataset = match &config.dataset {
        DatasetConfig::Synthetic { train, dev, .. } => synthetic::digit_blobs(*train, *dev, rng)?,
        DatasetConfig::Local { path } => {
            let ClassesFile {
                train_x,
                train_labels,
                dev_x,
                dev_labels,
            } = read_json(path)?;

            let train_x = matrix(train_x, "train_x")?;
            columns(&train_x, DIGIT_FEATURES, "train_x")?;
            ClassificationDataset::new(
                train_x,
                &train_labels,
                matrix(dev_x, "dev_x")?,
                dev_labels,
                DIGIT_CLASSES,
            )?
        }
    };

    Ok(dataset.shuffled(rng.random()))
}

fn encode_words(words: Vec<LabeledWord>, alphabet: &[char]) -> Result<Vec<Word>, ConfigErr> {
    words
        .into_iter()
        .map(|LabeledWord { word, language }| {
            let chars = word
                .chars()
                .map(|c| {
                    alphabet.iter().position(|&a| a == c).ok_or_else(|| {
                        ConfigErr::Invalid(format!("{word:?} has {c:?}, which isn't in the alphabet"))
                    })
                })
                .collect::<Result<_, _>>()?;

            Ok(Word::new(chars, language))
        })
        .collect()
}

/// Builds the words of a language identification run.
pub fn language_dataset<R: Rng + ?Sized>(
    config: &RunConfig,
    rng: &mut R,
) -> Result<SequenceDataset, ConfigErr> {
    let dataset = match &config.dataset {
        DatasetConfig::Synthetic {
            train,
            dev,
            max_len,
            ..
        } => synthetic::language_words(
            *train,
            *dev,
            LANGUAGE_CHARS,
            LANGUAGES.len(),
            *max_len,
            rng,
        )?,
        DatasetConfig::Local { path } => {
            let WordsFile {
                alphabet,
                train,
                dev,
            } = read_json(path)?;

            let alphabet: Vec<char> = alphabet.chars().collect();
            if alphabet.len() != LANGUAGE_CHARS {
                return Err(ConfigErr::Invalid(format!(
                    "the alphabet must have {LANGUAGE_CHARS} characters, got {}",
                    alphabet.len()
                )));
            }

            SequenceDataset::new(
                encode_words(train, &alphabet)?,
                encode_words(dev, &alphabet)?,
                LANGUAGE_CHARS,
                LANGUAGES.len(),
            )?
        }
    };

    Ok(dataset.shuffled(rng.random()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use nn::data::Dataset;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::config::Task;

    fn local(task: Task, name: &str, content: &str) -> RunConfig {
        let path: PathBuf = std::env::temp_dir().join(format!(
            "models-loader-{}-{name}.json",
            std::process::id()
        ));
        fs::write(&path, content).unwrap();

        RunConfig {
            dataset: DatasetConfig::Local { path },
            ..RunConfig::new(task)
        }
    }

    #[test]
    fn local_rows_become_a_dataset() {
        let config = local(
            Task::Regression,
            "rows",
            r#"{ "x": [[0.0], [1.0], [2.0]], "y": [[0.0], [0.5], [1.0]] }"#,
        );
        let mut rng = StdRng::seed_from_u64(0);

        let dataset = regression_dataset(&config, &mut rng).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.y().dim(), (3, 1));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let config = local(
            Task::Perceptron,
            "ragged",
            r#"{ "x": [[0.0, 1.0], [1.0]], "y": [[1.0], [-1.0]] }"#,
        );
        let mut rng = StdRng::seed_from_u64(0);

        let err = perceptron_dataset(&config, &mut rng).unwrap_err();
        assert!(matches!(err, ConfigErr::Invalid(_)));
    }

    #[test]
    fn perceptron_labels_must_be_signs() {
        let config = local(
            Task::Perceptron,
            "labels",
            r#"{ "x": [[0.0, 1.0], [1.0, 0.0]], "y": [[1.0], [0.0]] }"#,
        );
        let mut rng = StdRng::seed_from_u64(0);

        assert!(perceptron_dataset(&config, &mut rng).is_err());
    }

    #[test]
    fn words_outside_the_alphabet_are_rejected() {
        let alphabet: String = ('a'..='z').chain('0'..='9').chain("áéíóúñäöüłż".chars()).collect();
        assert_eq!(alphabet.chars().count(), LANGUAGE_CHARS);

        let json = format!(
            r#"{{ "alphabet": "{alphabet}", "train": [{{ "word": "hola", "language": 1 }}], "dev": [{{ "word": "hi!", "language": 0 }}] }}"#
        );
        let config = local(Task::Language, "words", &json);
        let mut rng = StdRng::seed_from_u64(0);

        let err = language_dataset(&config, &mut rng).unwrap_err();
        assert!(err.to_string().contains("'!'"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let config = RunConfig {
            dataset: DatasetConfig::Local {
                path: PathBuf::from("/nonexistent/data.json"),
            },
            ..RunConfig::new(Task::Digits)
        };
        let mut rng = StdRng::seed_from_u64(0);

        let err = digits_dataset(&config, &mut rng).unwrap_err();
        assert!(matches!(err, ConfigErr::Io { .. }));
    }
}
