use ndarray::Array2;
use nn::{
    Graph, NnErr, NodeId, ParamId, ParamSet, Result,
    data::{Validation, argmax_rows},
};
use rand::Rng;

use crate::{
    config::TrainingConfig,
    model::{Model, affine},
    training::{GradientTrainer, TrainReport},
};

/// The size of the combined alphabet of every language.
pub const NUM_CHARS: usize = 47;
pub const HIDDEN: usize = 300;

/// The languages words are told apart between, in label order.
pub const LANGUAGES: [&str; 5] = ["English", "Spanish", "Finnish", "Dutch", "Polish"];

/// A recurrent classifier of single words by language.
///
/// The first character goes through `h = relu(x · w0 + b0)`, every following one through
/// `h = relu(x · w1 + h · wh + b1)`, and the last hidden state through `h · w2 + b2` to get one
/// logit per language.
#[derive(Debug, Clone)]
pub struct LanguageIDModel {
    params: ParamSet,
    w0: ParamId,
    b0: ParamId,
    w1: ParamId,
    b1: ParamId,
    wh: ParamId,
    w2: ParamId,
    b2: ParamId,
    config: TrainingConfig,
}

impl LanguageIDModel {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Result<Self> {
        Self::with_config(TrainingConfig::language(), rng)
    }

    pub fn with_config<R: Rng + ?Sized>(config: TrainingConfig, rng: &mut R) -> Result<Self> {
        let mut params = ParamSet::new();
        let w0 = params.parameter(NUM_CHARS, HIDDEN, rng)?;
        let b0 = params.parameter(1, HIDDEN, rng)?;
        let w1 = params.parameter(NUM_CHARS, HIDDEN, rng)?;
        let b1 = params.parameter(1, HIDDEN, rng)?;
        let wh = params.parameter(HIDDEN, HIDDEN, rng)?;
        let w2 = params.parameter(HIDDEN, LANGUAGES.len(), rng)?;
        let b2 = params.parameter(1, LANGUAGES.len(), rng)?;

        Ok(Self {
            params,
            w0,
            b0,
            w1,
            b1,
            wh,
            w2,
            b2,
            config,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn languages(&self) -> &'static [&'static str] {
        &LANGUAGES
    }

    /// Returns the index in `languages` of the most likely language of every word.
    pub fn predict(&self, xs: &[Array2<f32>]) -> Result<Vec<usize>> {
        let mut graph = Graph::new(&self.params);
        let logits = self.logits(&mut graph, xs)?;
        Ok(argmax_rows(graph.value(logits)?))
    }

    fn logits(&self, graph: &mut Graph<'_>, xs: &[Array2<f32>]) -> Result<NodeId> {
        let (first, rest) = xs.split_first().ok_or(NnErr::EmptySequence)?;

        let x = graph.input(first.view());
        let z = affine(graph, x, self.w0, self.b0)?;
        let h = graph.relu(z)?;

        let w1 = graph.param(self.w1)?;
        let wh = graph.param(self.wh)?;
        let b1 = graph.param(self.b1)?;

        let h = rest.iter().try_fold(h, |h, x| {
            let x = graph.input(x.view());
            let xw = graph.linear(x, w1)?;
            let hw = graph.linear(h, wh)?;
            let sum = graph.add(xw, hw)?;
            let z = graph.add_bias(sum, b1)?;
            graph.relu(z)
        })?;

        affine(graph, h, self.w2, self.b2)
    }

    /// Trains until the held-out accuracy after an epoch reaches the configured threshold.
    ///
    /// # Arguments
    /// * `dataset` - Words as one `B x 47` one-hot matrix per character, with `B x 5` one-hot
    ///   targets.
    pub fn train<D>(&mut self, dataset: &mut D) -> Result<TrainReport>
    where
        D: Validation<Input = Vec<Array2<f32>>>,
    {
        GradientTrainer::from_config(&self.config).train_until_accuracy(self, dataset)
    }
}

impl Model for LanguageIDModel {
    type Input = Vec<Array2<f32>>;

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    /// The recurrent matrix keeps its initial value.
    fn frozen(&self) -> Vec<ParamId> {
        vec![self.wh]
    }

    fn forward(&self, graph: &mut Graph<'_>, xs: &Vec<Array2<f32>>) -> Result<NodeId> {
        self.logits(graph, xs)
    }

    fn loss(&self, graph: &mut Graph<'_>, output: NodeId, y: NodeId) -> Result<NodeId> {
        graph.softmax_loss(output, y)
    }
}
