use ndarray::Array2;
use nn::{
    Graph, NodeId, ParamId, ParamSet, Result,
    data::{Validation, argmax_rows},
};
use rand::Rng;

use crate::{
    config::TrainingConfig,
    model::{Model, affine},
    training::{GradientTrainer, TrainReport},
};

/// The amount of pixels of a flattened 28x28 image.
pub const PIXELS: usize = 784;
pub const HIDDEN: usize = 200;
pub const DIGITS: usize = 10;

/// A feed-forward classifier of handwritten digits.
///
/// `x -> relu(x · w1 + b1) · w2 + b2` gives one logit per digit, trained under a softmax loss.
#[derive(Debug, Clone)]
pub struct DigitClassificationModel {
    params: ParamSet,
    w1: ParamId,
    b1: ParamId,
    w2: ParamId,
    b2: ParamId,
    config: TrainingConfig,
}

impl DigitClassificationModel {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Result<Self> {
        Self::with_config(TrainingConfig::digits(), rng)
    }

    pub fn with_config<R: Rng + ?Sized>(config: TrainingConfig, rng: &mut R) -> Result<Self> {
        let mut params = ParamSet::new();
        let w1 = params.parameter(PIXELS, HIDDEN, rng)?;
        let b1 = params.parameter(1, HIDDEN, rng)?;
        let w2 = params.parameter(HIDDEN, DIGITS, rng)?;
        let b2 = params.parameter(1, DIGITS, rng)?;

        Ok(Self {
            params,
            w1,
            b1,
            w2,
            b2,
            config,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Returns the most likely digit of every row of `x`.
    pub fn predict(&self, x: &Array2<f32>) -> Result<Vec<usize>> {
        let logits = self.run(x)?;
        Ok(argmax_rows(logits.view()))
    }

    /// Trains until the held-out accuracy after an epoch reaches the configured threshold.
    ///
    /// # Arguments
    /// * `dataset` - `B x 784` images with `B x 10` one-hot targets.
    pub fn train<D>(&mut self, dataset: &mut D) -> Result<TrainReport>
    where
        D: Validation<Input = Array2<f32>>,
    {
        GradientTrainer::from_config(&self.config).train_until_accuracy(self, dataset)
    }
}

impl Model for DigitClassificationModel {
    type Input = Array2<f32>;

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    fn forward(&self, graph: &mut Graph<'_>, x: &Array2<f32>) -> Result<NodeId> {
        let x = graph.input(x.view());
        let hidden = affine(graph, x, self.w1, self.b1)?;
        let hidden = graph.relu(hidden)?;
        affine(graph, hidden, self.w2, self.b2)
    }

    fn loss(&self, graph: &mut Graph<'_>, output: NodeId, y: NodeId) -> Result<NodeId> {
        graph.softmax_loss(output, y)
    }
}
