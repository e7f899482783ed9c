use ndarray::{Array2, ArrayView2, CowArray, Zip};

use super::{Graph, NodeId, Op};
use crate::{
    error::{NnErr, Result},
    param::ParamId,
};

fn mismatch(op: &'static str, left: ArrayView2<'_, f32>, right: ArrayView2<'_, f32>) -> NnErr {
    NnErr::ShapeMismatch {
        op,
        left: left.dim(),
        right: right.dim(),
    }
}

fn scalar(value: f32) -> CowArray<'static, f32, ndarray::Ix2> {
    Array2::from_elem((1, 1), value).into()
}

/// Computes the row-wise log-softmax of `logits`, shifting each row by its maximum first.
pub(super) fn log_softmax(logits: ArrayView2<'_, f32>) -> Array2<f32> {
    let mut out = logits.to_owned();

    for mut row in out.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        let log_sum = row.fold(0., |acc, &v| acc + (v - max).exp()).ln() + max;
        row.mapv_inplace(|v| v - log_sum);
    }

    out
}

fn check_one_hot(labels: ArrayView2<'_, f32>) -> Result<()> {
    for (row, values) in labels.rows().into_iter().enumerate() {
        let ones = values.iter().filter(|&&v| v == 1.).count();
        let zeros = values.iter().filter(|&&v| v == 0.).count();

        if ones != 1 || ones + zeros != values.len() {
            return Err(NnErr::InvalidLabels { row });
        }
    }

    Ok(())
}

impl<'p> Graph<'p> {
    /// Adds a constant input to the graph, gradients never flow into it.
    pub fn input(&mut self, value: ArrayView2<'_, f32>) -> NodeId {
        self.push(value.to_owned().into(), Op::Input, false)
    }

    /// Adds a trainable parameter to the graph.
    ///
    /// Asking for the same parameter more than once yields the same node, so every use of it
    /// contributes to a single gradient.
    pub fn param(&mut self, id: ParamId) -> Result<NodeId> {
        if let Some(&node) = self.param_nodes.get(&id) {
            return Ok(node);
        }

        let params = self.params;
        let value = params.value(id)?;
        let node = self.push(value.into(), Op::Param(id), true);
        self.param_nodes.insert(id, node);

        Ok(node)
    }

    fn operands(
        &self,
        a: NodeId,
        b: NodeId,
    ) -> Result<(ArrayView2<'_, f32>, ArrayView2<'_, f32>, bool)> {
        let (a, b) = (self.node(a)?, self.node(b)?);
        Ok((
            a.value.view(),
            b.value.view(),
            a.requires_grad || b.requires_grad,
        ))
    }

    /// Computes the dot product of every row of `features` (`B x d`) with the single row of
    /// `weights` (`1 x d`), giving a `B x 1` node.
    pub fn dot_product(&mut self, features: NodeId, weights: NodeId) -> Result<NodeId> {
        let (f, w, requires_grad) = self.operands(features, weights)?;
        if w.nrows() != 1 || f.ncols() != w.ncols() {
            return Err(mismatch("dot_product", f, w));
        }

        let value = f.dot(&w.t());
        let op = Op::DotProduct { features, weights };
        Ok(self.push(value.into(), op, requires_grad))
    }

    /// Applies a linear transformation: `features` (`B x i`) times `weights` (`i x o`).
    pub fn linear(&mut self, features: NodeId, weights: NodeId) -> Result<NodeId> {
        let (f, w, requires_grad) = self.operands(features, weights)?;
        if f.ncols() != w.nrows() {
            return Err(mismatch("linear", f, w));
        }

        let value = f.dot(&w);
        let op = Op::Linear { features, weights };
        Ok(self.push(value.into(), op, requires_grad))
    }

    /// Adds the `1 x o` `bias` to every row of `features` (`B x o`).
    pub fn add_bias(&mut self, features: NodeId, bias: NodeId) -> Result<NodeId> {
        let (f, b, requires_grad) = self.operands(features, bias)?;
        if b.nrows() != 1 || f.ncols() != b.ncols() {
            return Err(mismatch("add_bias", f, b));
        }

        let mut value = f.to_owned();
        value.zip_mut_with(&b, |v, &b| *v += b);

        let op = Op::AddBias { features, bias };
        Ok(self.push(value.into(), op, requires_grad))
    }

    /// Adds two nodes of the same shape element-wise.
    pub fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        let (x, y, requires_grad) = self.operands(a, b)?;
        if x.dim() != y.dim() {
            return Err(mismatch("add", x, y));
        }

        let mut value = x.to_owned();
        value.zip_mut_with(&y, |v, &y| *v += y);

        Ok(self.push(value.into(), Op::Add { a, b }, requires_grad))
    }

    /// Applies `max(x, 0)` element-wise.
    pub fn relu(&mut self, x: NodeId) -> Result<NodeId> {
        let node = self.node(x)?;
        let value = node.value.mapv(|v| v.max(0.));
        let requires_grad = node.requires_grad;

        Ok(self.push(value.into(), Op::Relu { x }, requires_grad))
    }

    /// Computes the batch squared loss: the mean over every entry of `(a - b)^2 / 2`.
    pub fn square_loss(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        let (x, y, requires_grad) = self.operands(a, b)?;
        if x.dim() != y.dim() {
            return Err(mismatch("square_loss", x, y));
        }

        let n = x.len() as f32;
        let sum = Zip::from(&x)
            .and(&y)
            .fold(0., |acc, &x, &y| acc + (x - y).powi(2));

        Ok(self.push(scalar(sum / n / 2.), Op::SquareLoss { a, b }, requires_grad))
    }

    /// Computes the batch softmax cross-entropy loss of `logits` against one-hot `labels`,
    /// averaged over the rows.
    pub fn softmax_loss(&mut self, logits: NodeId, labels: NodeId) -> Result<NodeId> {
        let (x, y, requires_grad) = self.operands(logits, labels)?;
        if x.dim() != y.dim() {
            return Err(mismatch("softmax_loss", x, y));
        }
        check_one_hot(y)?;

        let log_probs = log_softmax(x);
        let rows = x.nrows() as f32;
        let sum = Zip::from(&y)
            .and(&log_probs)
            .fold(0., |acc, &y, &lp| acc + y * lp);

        let op = Op::SoftmaxLoss { logits, labels };
        Ok(self.push(scalar(-sum / rows), op, requires_grad))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::param::ParamSet;

    #[test]
    fn linear_and_bias_values() {
        let mut params = ParamSet::new();
        let w = params.from_value(array![[1., 2.], [3., 4.]]).unwrap();
        let b = params.from_value(array![[0.5, -0.5]]).unwrap();

        let mut graph = Graph::new(&params);
        let x = graph.input(array![[1., 1.], [2., 0.]].view());
        let w = graph.param(w).unwrap();
        let b = graph.param(b).unwrap();
        let xw = graph.linear(x, w).unwrap();
        let out = graph.add_bias(xw, b).unwrap();

        assert_eq!(graph.value(out).unwrap(), array![[4.5, 5.5], [2.5, 3.5]]);
    }

    #[test]
    fn dot_product_gives_one_score_per_row() {
        let params = ParamSet::new();
        let mut graph = Graph::new(&params);
        let x = graph.input(array![[1., 2., 3.], [0., 0., 0.]].view());
        let w = graph.input(array![[1., -1., 2.]].view());
        let score = graph.dot_product(x, w).unwrap();

        assert_eq!(graph.value(score).unwrap(), array![[5.], [0.]]);
    }

    #[test]
    fn relu_and_add() {
        let params = ParamSet::new();
        let mut graph = Graph::new(&params);
        let a = graph.input(array![[-1., 2.]].view());
        let b = graph.input(array![[0.5, -3.]].view());
        let sum = graph.add(a, b).unwrap();
        let out = graph.relu(sum).unwrap();

        assert_eq!(graph.value(out).unwrap(), array![[0., 0.]]);
        assert_eq!(graph.value(sum).unwrap(), array![[-0.5, -1.]]);
    }

    #[test]
    fn square_loss_is_half_mean_squared_error() {
        let params = ParamSet::new();
        let mut graph = Graph::new(&params);
        let a = graph.input(array![[1.], [3.]].view());
        let b = graph.input(array![[0.], [1.]].view());
        let loss = graph.square_loss(a, b).unwrap();

        // ((1 + 4) / 2) / 2
        assert!((graph.scalar(loss).unwrap() - 1.25).abs() < 1e-6);
    }

    #[test]
    fn softmax_loss_of_uniform_logits_is_log_of_classes() {
        let params = ParamSet::new();
        let mut graph = Graph::new(&params);
        let logits = graph.input(Array2::<f32>::zeros((3, 4)).view());
        let labels = graph.input(array![[1., 0., 0., 0.], [0., 1., 0., 0.], [0., 0., 0., 1.]].view());
        let loss = graph.softmax_loss(logits, labels).unwrap();

        assert!((graph.scalar(loss).unwrap() - 4f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn softmax_loss_is_stable_for_large_logits() {
        let params = ParamSet::new();
        let mut graph = Graph::new(&params);
        let logits = graph.input(array![[1000., 0.]].view());
        let labels = graph.input(array![[1., 0.]].view());
        let loss = graph.softmax_loss(logits, labels).unwrap();

        let value = graph.scalar(loss).unwrap();
        assert!(value.is_finite());
        assert!(value.abs() < 1e-6);
    }

    #[test]
    fn softmax_loss_rejects_non_one_hot_labels() {
        let params = ParamSet::new();
        let mut graph = Graph::new(&params);
        let logits = graph.input(Array2::<f32>::zeros((2, 2)).view());
        let labels = graph.input(array![[1., 0.], [0.5, 0.5]].view());

        assert_eq!(
            graph.softmax_loss(logits, labels).unwrap_err(),
            NnErr::InvalidLabels { row: 1 }
        );
    }

    #[test]
    fn shape_mismatches_are_reported() {
        let params = ParamSet::new();
        let mut graph = Graph::new(&params);
        let x = graph.input(Array2::<f32>::zeros((4, 3)).view());
        let w = graph.input(Array2::<f32>::zeros((2, 5)).view());

        assert_eq!(
            graph.linear(x, w).unwrap_err(),
            NnErr::ShapeMismatch {
                op: "linear",
                left: (4, 3),
                right: (2, 5)
            }
        );
        assert!(matches!(
            graph.dot_product(x, w).unwrap_err(),
            NnErr::ShapeMismatch { op: "dot_product", .. }
        ));
        assert!(matches!(
            graph.add(x, w).unwrap_err(),
            NnErr::ShapeMismatch { op: "add", .. }
        ));
    }

    #[test]
    fn scalar_requires_one_by_one_node() {
        let params = ParamSet::new();
        let mut graph = Graph::new(&params);
        let x = graph.input(Array2::<f32>::zeros((2, 1)).view());

        assert_eq!(
            graph.scalar(x).unwrap_err(),
            NnErr::NotScalar { shape: (2, 1) }
        );
    }

    #[test]
    fn same_parameter_maps_to_same_node() {
        let mut params = ParamSet::new();
        let w = params.from_value(array![[1.]]).unwrap();

        let mut graph = Graph::new(&params);
        let first = graph.param(w).unwrap();
        let second = graph.param(w).unwrap();

        assert_eq!(first, second);
        assert_eq!(graph.len(), 1);
    }
}
