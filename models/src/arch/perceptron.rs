use std::num::NonZeroUsize;

use log::{debug, info};
use ndarray::{Array2, ArrayView2};
use nn::{Graph, NnErr, ParamId, ParamSet, Result, data::Dataset};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerceptronConfig {
    /// Gives up after this many passes. Without it training runs until a pass makes no mistake,
    /// which never happens on data that isn't linearly separable.
    #[serde(default)]
    pub max_epochs: Option<NonZeroUsize>,
}

/// The outcome of training a perceptron.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PerceptronReport {
    pub epochs: usize,
    pub updates: usize,
    /// Whether the last pass classified every example correctly.
    pub converged: bool,
}

/// A linear binary classifier through the origin.
///
/// Classes are `1` and `-1`.
#[derive(Debug, Clone)]
pub struct PerceptronModel {
    params: ParamSet,
    w: ParamId,
    config: PerceptronConfig,
}

impl PerceptronModel {
    /// Creates a new `PerceptronModel` for points of `dimensions` coordinates.
    pub fn new<R: Rng + ?Sized>(dimensions: usize, rng: &mut R) -> Result<Self> {
        Self::with_config(dimensions, PerceptronConfig::default(), rng)
    }

    pub fn with_config<R: Rng + ?Sized>(
        dimensions: usize,
        config: PerceptronConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let mut params = ParamSet::new();
        let w = params.parameter(1, dimensions, rng)?;
        Ok(Self { params, w, config })
    }

    /// Returns the current `1 x dimensions` weights.
    pub fn get_weights(&self) -> Result<ArrayView2<'_, f32>> {
        self.params.value(self.w)
    }

    /// Scores every row of `x` against the weights.
    ///
    /// # Arguments
    /// * `x` - A `B x dimensions` batch of points.
    ///
    /// # Returns
    /// A `B x 1` matrix of scores.
    pub fn run(&self, x: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let mut graph = Graph::new(&self.params);
        let x = graph.input(x);
        let w = graph.param(self.w)?;
        let score = graph.dot_product(x, w)?;
        Ok(graph.value(score)?.to_owned())
    }

    /// Classifies a single `1 x dimensions` point. A score of exactly zero is class `1`.
    pub fn get_prediction(&self, x: ArrayView2<'_, f32>) -> Result<i8> {
        let score = self.run(x)?;
        if score.dim() != (1, 1) {
            return Err(NnErr::NotScalar { shape: score.dim() });
        }

        Ok(if score[[0, 0]] < 0. { -1 } else { 1 })
    }

    /// Runs the perceptron procedure: every misclassified example `(x, y)` moves the weights
    /// by `y * x`, until a full pass makes no update.
    ///
    /// # Arguments
    /// * `dataset` - Points labeled with a single `1` or `-1` each.
    pub fn train<D>(&mut self, dataset: &mut D) -> Result<PerceptronReport>
    where
        D: Dataset<Input = Array2<f32>>,
    {
        let mut report = PerceptronReport::default();

        loop {
            let mut updates = 0;
            for (row, batch) in dataset.iterate_once(NonZeroUsize::MIN).enumerate() {
                if batch.y.dim() != (1, 1) {
                    return Err(NnErr::NotScalar {
                        shape: batch.y.dim(),
                    });
                }

                let label = batch.y[[0, 0]];
                if label.abs() != 1. {
                    return Err(NnErr::InvalidLabels { row });
                }
                if f32::from(self.get_prediction(batch.x.view())?) != label {
                    self.params.update(self.w, batch.x.view(), label)?;
                    updates += 1;
                }
            }

            report.epochs += 1;
            report.updates += updates;
            debug!(epoch = report.epochs, updates = updates; "perceptron pass finished");

            if updates == 0 {
                report.converged = true;
                break;
            }
            if self
                .config
                .max_epochs
                .is_some_and(|max| report.epochs >= max.get())
            {
                break;
            }
        }

        info!(
            epochs = report.epochs,
            updates = report.updates,
            converged = report.converged;
            "perceptron training finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use nn::data::InMemoryDataset;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn perceptron(w: Array2<f32>, config: PerceptronConfig) -> PerceptronModel {
        let mut params = ParamSet::new();
        let w = params.from_value(w).unwrap();
        PerceptronModel { params, w, config }
    }

    #[test]
    fn zero_score_is_positive() {
        let model = perceptron(array![[1., -1.]], PerceptronConfig::default());
        assert_eq!(model.get_prediction(array![[3., 3.]].view()).unwrap(), 1);
        assert_eq!(model.get_prediction(array![[0., 1.]].view()).unwrap(), -1);
    }

    #[test]
    fn run_scores_every_row() {
        let model = perceptron(array![[2., 1.]], PerceptronConfig::default());
        let scores = model.run(array![[1., 1.], [-1., 0.5]].view()).unwrap();
        assert_eq!(scores, array![[3.], [-1.5]]);
    }

    #[test]
    fn mistake_adds_label_times_example() {
        let mut model = perceptron(array![[0.5, -0.25]], PerceptronConfig::default());
        // scores 0.5 * 1 - 0.25 * 4 = -0.5, so a positive label is a mistake
        let mut dataset = InMemoryDataset::new(array![[1., 4.]], array![[1.]]).unwrap();

        let report = model.train(&mut dataset).unwrap();

        assert_eq!(model.get_weights().unwrap(), array![[1.5, 3.75]]);
        assert_eq!(report.updates, 1);
        assert_eq!(report.epochs, 2);
        assert!(report.converged);
    }

    #[test]
    fn max_epochs_ends_non_separable_training() {
        let config = PerceptronConfig {
            max_epochs: NonZeroUsize::new(3),
        };
        let mut model = perceptron(array![[1.]], config);
        let mut dataset = InMemoryDataset::new(array![[1.], [1.]], array![[1.], [-1.]]).unwrap();

        let report = model.train(&mut dataset).unwrap();

        assert_eq!(report.epochs, 3);
        assert!(!report.converged);
    }

    #[test]
    fn batch_predictions_are_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let model = PerceptronModel::new(2, &mut rng).unwrap();
        let err = model.get_prediction(array![[1., 0.], [0., 1.]].view()).unwrap_err();
        assert_eq!(err, NnErr::NotScalar { shape: (2, 1) });
    }

    #[test]
    fn labels_other_than_signs_are_rejected() {
        let mut model = perceptron(array![[1., 1.]], PerceptronConfig::default());
        let w = model.get_weights().unwrap().to_owned();
        let mut dataset =
            InMemoryDataset::new(array![[1., 0.], [0., 1.]], array![[1.], [0.]]).unwrap();

        let err = model.train(&mut dataset).unwrap_err();

        assert_eq!(err, NnErr::InvalidLabels { row: 1 });
        assert_eq!(model.get_weights().unwrap(), w);
    }
}
