use ndarray::Array2;
use nn::{Graph, NodeId, ParamId, ParamSet, Result, data::Dataset};
use rand::Rng;

use crate::{
    config::TrainingConfig,
    model::{Model, affine},
    training::{GradientTrainer, TrainReport},
};

/// The width of the hidden layer.
pub const HIDDEN: usize = 512;

/// A feed-forward network approximating a function from reals to reals.
///
/// `x -> relu(x · w1 + b1) · w2 + b2` under a square loss.
#[derive(Debug, Clone)]
pub struct RegressionModel {
    params: ParamSet,
    w1: ParamId,
    b1: ParamId,
    w2: ParamId,
    b2: ParamId,
    config: TrainingConfig,
}

impl RegressionModel {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Result<Self> {
        Self::with_config(TrainingConfig::regression(), rng)
    }

    pub fn with_config<R: Rng + ?Sized>(config: TrainingConfig, rng: &mut R) -> Result<Self> {
        let mut params = ParamSet::new();
        let w1 = params.parameter(1, HIDDEN, rng)?;
        let b1 = params.parameter(1, HIDDEN, rng)?;
        let w2 = params.parameter(HIDDEN, 1, rng)?;
        let b2 = params.parameter(1, 1, rng)?;

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

    /// Trains until the last batch of an epoch has a loss below the configured threshold.
    ///
    /// # Arguments
    /// * `dataset` - `B x 1` inputs with their `B x 1` targets.
    pub fn train<D>(&mut self, dataset: &mut D) -> Result<TrainReport>
    where
        D: Dataset<Input = Array2<f32>>,
    {
        GradientTrainer::from_config(&self.config).train_until_loss(self, dataset)
    }
}

impl Model for RegressionModel {
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
        graph.square_loss(output, y)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use nn::NnErr;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn run_maps_each_row_to_a_scalar() {
        let mut rng = StdRng::seed_from_u64(0);
        let model = RegressionModel::new(&mut rng).unwrap();

        let out = model.run(&array![[0.5], [-1.], [3.]]).unwrap();
        assert_eq!(out.dim(), (3, 1));
        assert_eq!(model.params().size(), 3 * HIDDEN + 1);
    }

    #[test]
    fn wide_inputs_are_a_shape_error() {
        let mut rng = StdRng::seed_from_u64(0);
        let model = RegressionModel::new(&mut rng).unwrap();

        let err = model.run(&array![[0.5, 1.]]).unwrap_err();
        assert!(matches!(err, NnErr::ShapeMismatch { op: "linear", .. }));
    }
}
