use log::trace;
use ndarray::{Array2, Axis, Zip};

use super::{Gradients, Graph, NodeId, Op, ops::log_softmax};
use crate::error::{NnErr, Result};

fn accumulate(grads: &mut [Option<Array2<f32>>], id: NodeId, delta: Array2<f32>) {
    grads[id.0] = Some(match grads[id.0].take() {
        Some(mut grad) => {
            grad.zip_mut_with(&delta, |g, &d| *g += d);
            grad
        }
        None => delta,
    });
}

impl Graph<'_> {
    /// Computes the gradient of `loss` with respect to every parameter in the graph.
    ///
    /// Parameters the loss doesn't depend on get a zero gradient.
    ///
    /// # Arguments
    /// * `loss` - A 1x1 node.
    ///
    /// # Returns
    /// The gradients keyed by parameter, or an error if `loss` isn't a scalar node.
    pub fn gradients(&self, loss: NodeId) -> Result<Gradients> {
        let root = self.node(loss)?;
        if root.value.dim() != (1, 1) {
            return Err(NnErr::NotScalar {
                shape: root.value.dim(),
            });
        }

        let mut grads: Vec<Option<Array2<f32>>> = vec![None; loss.0 + 1];
        grads[loss.0] = Some(Array2::ones((1, 1)));
        let mut out = Gradients::default();

        for i in (0..=loss.0).rev() {
            let node = &self.nodes[i];
            if !node.requires_grad {
                continue;
            }
            let Some(grad) = grads[i].take() else {
                continue;
            };

            let wants = |id: NodeId| self.nodes[id.0].requires_grad;
            let value = |id: NodeId| self.nodes[id.0].value.view();

            match node.op {
                Op::Input => {}
                Op::Param(id) => out.insert(id, grad),
                Op::DotProduct { features, weights } => {
                    if wants(features) {
                        accumulate(&mut grads, features, grad.dot(&value(weights)));
                    }
                    if wants(weights) {
                        accumulate(&mut grads, weights, grad.t().dot(&value(features)));
                    }
                }
                Op::Linear { features, weights } => {
                    if wants(features) {
                        accumulate(&mut grads, features, grad.dot(&value(weights).t()));
                    }
                    if wants(weights) {
                        accumulate(&mut grads, weights, value(features).t().dot(&grad));
                    }
                }
                Op::AddBias { features, bias } => {
                    if wants(bias) {
                        let delta = grad.sum_axis(Axis(0)).insert_axis(Axis(0));
                        accumulate(&mut grads, bias, delta);
                    }
                    if wants(features) {
                        accumulate(&mut grads, features, grad);
                    }
                }
                Op::Add { a, b } => {
                    if wants(a) {
                        accumulate(&mut grads, a, grad.clone());
                    }
                    if wants(b) {
                        accumulate(&mut grads, b, grad);
                    }
                }
                Op::Relu { x } => {
                    let delta = Zip::from(&grad)
                        .and(&value(x))
                        .map_collect(|&g, &x| if x > 0. { g } else { 0. });
                    accumulate(&mut grads, x, delta);
                }
                Op::SquareLoss { a, b } => {
                    let scale = grad[[0, 0]] / value(a).len() as f32;
                    let diff = Zip::from(&value(a))
                        .and(&value(b))
                        .map_collect(|&a, &b| (a - b) * scale);

                    if wants(b) {
                        accumulate(&mut grads, b, diff.mapv(|d| -d));
                    }
                    if wants(a) {
                        accumulate(&mut grads, a, diff);
                    }
                }
                Op::SoftmaxLoss { logits, labels } => {
                    let scale = grad[[0, 0]] / value(logits).nrows() as f32;
                    let log_probs = log_softmax(value(logits));

                    if wants(labels) {
                        accumulate(&mut grads, labels, log_probs.mapv(|lp| -lp * scale));
                    }
                    if wants(logits) {
                        let delta = Zip::from(&log_probs)
                            .and(&value(labels))
                            .map_collect(|&lp, &y| (lp.exp() - y) * scale);
                        accumulate(&mut grads, logits, delta);
                    }
                }
            }
        }

        for (&id, &node) in &self.param_nodes {
            if out.get(id).is_none() {
                out.insert(id, Array2::zeros(self.nodes[node.0].value.dim()));
            }
        }

        trace!(nodes = self.nodes.len(), params = out.len(); "backward pass done");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};
    use rand::{SeedableRng, rngs::StdRng};

    use crate::{
        error::Result,
        graph::{Graph, NodeId},
        param::{ParamId, ParamSet},
    };

    /// Checks every entry of every gradient against a central finite difference.
    fn check_gradients<F>(params: &ParamSet, build: F)
    where
        F: Fn(&mut Graph<'_>) -> Result<NodeId>,
    {
        let loss_of = |params: &ParamSet| {
            let mut graph = Graph::new(params);
            let loss = build(&mut graph).unwrap();
            graph.scalar(loss).unwrap()
        };

        let mut graph = Graph::new(params);
        let loss = build(&mut graph).unwrap();
        let grads = graph.gradients(loss).unwrap();

        let eps = 1e-3;
        for id in params.ids() {
            let grad = grads.get(id).expect("every used parameter has a gradient");
            let (rows, cols) = params.shape(id).unwrap();

            for r in 0..rows {
                for c in 0..cols {
                    let mut direction = Array2::<f32>::zeros((rows, cols));
                    direction[[r, c]] = 1.;

                    let mut plus = params.clone();
                    plus.update(id, direction.view(), eps).unwrap();
                    let mut minus = params.clone();
                    minus.update(id, direction.view(), -eps).unwrap();

                    let numeric = (loss_of(&plus) - loss_of(&minus)) / (2. * eps);
                    let analytic = grad[[r, c]];
                    assert!(
                        (numeric - analytic).abs() < 1e-2 * (1. + numeric.abs()),
                        "param {} at ({r}, {c}): numeric {numeric}, analytic {analytic}",
                        id.index()
                    );
                }
            }
        }
    }

    fn random_params(shapes: &[(usize, usize)]) -> (ParamSet, Vec<ParamId>) {
        let mut rng = StdRng::seed_from_u64(42);
        let mut params = ParamSet::new();
        let ids = shapes
            .iter()
            .map(|&(r, c)| params.parameter(r, c, &mut rng).unwrap())
            .collect();
        (params, ids)
    }

    #[test]
    fn square_loss_of_two_layer_net() {
        let (params, ids) = random_params(&[(1, 4), (1, 4), (4, 1), (1, 1)]);
        let x = array![[-1.5], [0.3], [2.0]];
        let y = array![[0.5], [-0.2], [0.9]];

        check_gradients(&params, |graph| {
            let x = graph.input(x.view());
            let y = graph.input(y.view());
            let w1 = graph.param(ids[0])?;
            let b1 = graph.param(ids[1])?;
            let w2 = graph.param(ids[2])?;
            let b2 = graph.param(ids[3])?;

            let xw1 = graph.linear(x, w1)?;
            let z1 = graph.add_bias(xw1, b1)?;
            let h = graph.relu(z1)?;
            let hw2 = graph.linear(h, w2)?;
            let out = graph.add_bias(hw2, b2)?;
            graph.square_loss(out, y)
        });
    }

    #[test]
    fn softmax_loss_through_shared_recurrent_weights() {
        let (params, ids) = random_params(&[(3, 4), (4, 4), (1, 4), (4, 2)]);
        let xs = [array![[1., 0., 0.], [0., 0., 1.]], array![[0., 1., 0.], [1., 0., 0.]]];
        let y = array![[0., 1.], [1., 0.]];

        check_gradients(&params, |graph| {
            let wx = graph.param(ids[0])?;
            let wh = graph.param(ids[1])?;
            let b = graph.param(ids[2])?;
            let wo = graph.param(ids[3])?;

            let x0 = graph.input(xs[0].view());
            let x0w = graph.linear(x0, wx)?;
            let z0 = graph.add_bias(x0w, b)?;
            let mut h = graph.relu(z0)?;

            let x1 = graph.input(xs[1].view());
            let x1w = graph.linear(x1, wx)?;
            let hw = graph.linear(h, wh)?;
            let sum = graph.add(x1w, hw)?;
            let z1 = graph.add_bias(sum, b)?;
            h = graph.relu(z1)?;

            let logits = graph.linear(h, wo)?;
            let y = graph.input(y.view());
            graph.softmax_loss(logits, y)
        });
    }

    #[test]
    fn dot_product_gradient_is_the_input() {
        let mut params = ParamSet::new();
        let w = params.from_value(array![[0.5, -1.]]).unwrap();

        let mut graph = Graph::new(&params);
        let x = graph.input(array![[2., 3.]].view());
        let w_node = graph.param(w).unwrap();
        let score = graph.dot_product(x, w_node).unwrap();
        let grads = graph.gradients(score).unwrap();

        assert_eq!(grads.get(w).unwrap(), array![[2., 3.]]);
    }

    #[test]
    fn unused_parameters_get_zero_gradients() {
        let mut params = ParamSet::new();
        let used = params.from_value(array![[1.]]).unwrap();
        let unused = params.from_value(array![[1., 1.]]).unwrap();

        let mut graph = Graph::new(&params);
        let used_node = graph.param(used).unwrap();
        graph.param(unused).unwrap();
        let y = graph.input(array![[3.]].view());
        let loss = graph.square_loss(used_node, y).unwrap();

        let grads = graph.gradients(loss).unwrap();
        assert_eq!(grads.len(), 2);
        assert_eq!(grads.get(used).unwrap(), array![[-2.]]);
        assert_eq!(grads.get(unused).unwrap(), array![[0., 0.]]);
    }

    #[test]
    fn gradients_require_a_scalar_loss() {
        let mut params = ParamSet::new();
        let w = params.from_value(array![[1., 2.]]).unwrap();

        let mut graph = Graph::new(&params);
        let w = graph.param(w).unwrap();
        assert!(graph.gradients(w).is_err());
    }
}
