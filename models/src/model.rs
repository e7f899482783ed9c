use ndarray::{Array2, ArrayView2};
use nn::{Gradients, Graph, NodeId, ParamId, ParamSet, Result};

/// A differentiable model trained by gradient descent.
///
/// Implementors only describe how to build their forward pass and loss on a `Graph`, the rest of
/// the operations are derived from those.
pub trait Model {
    /// What a batch of examples looks like for this model.
    type Input;

    /// Returns the model's parameters.
    fn params(&self) -> &ParamSet;

    fn params_mut(&mut self) -> &mut ParamSet;

    /// Parameters that take part in the forward pass but are never updated by training.
    fn frozen(&self) -> Vec<ParamId> {
        Vec::new()
    }

    /// Adds the forward pass over `x` to `graph`.
    ///
    /// # Returns
    /// The node holding the model's output.
    fn forward(&self, graph: &mut Graph<'_>, x: &Self::Input) -> Result<NodeId>;

    /// Adds the loss between the model's `output` and the expected `y` to `graph`.
    fn loss(&self, graph: &mut Graph<'_>, output: NodeId, y: NodeId) -> Result<NodeId>;

    /// Runs the model for a batch of examples.
    fn run(&self, x: &Self::Input) -> Result<Array2<f32>> {
        let mut graph = Graph::new(self.params());
        let output = self.forward(&mut graph, x)?;
        Ok(graph.value(output)?.to_owned())
    }

    /// Computes the loss for a batch of examples.
    fn get_loss(&self, x: &Self::Input, y: ArrayView2<'_, f32>) -> Result<f32> {
        let mut graph = Graph::new(self.params());
        let loss = loss_node(self, &mut graph, x, y)?;
        graph.scalar(loss)
    }

    /// Computes the loss for a batch of examples together with its gradient with respect to
    /// every parameter of the model.
    fn loss_and_gradients(
        &self,
        x: &Self::Input,
        y: ArrayView2<'_, f32>,
    ) -> Result<(f32, Gradients)> {
        let mut graph = Graph::new(self.params());
        let loss = loss_node(self, &mut graph, x, y)?;
        Ok((graph.scalar(loss)?, graph.gradients(loss)?))
    }
}

fn loss_node<M: Model + ?Sized>(
    model: &M,
    graph: &mut Graph<'_>,
    x: &M::Input,
    y: ArrayView2<'_, f32>,
) -> Result<NodeId> {
    let output = model.forward(graph, x)?;
    let y = graph.input(y);
    model.loss(graph, output, y)
}

/// Adds `features · weights + bias` to `graph`.
pub(crate) fn affine(
    graph: &mut Graph<'_>,
    features: NodeId,
    weights: ParamId,
    bias: ParamId,
) -> Result<NodeId> {
    let weights = graph.param(weights)?;
    let bias = graph.param(bias)?;
    let product = graph.linear(features, weights)?;
    graph.add_bias(product, bias)
}
