//! A tape of differentiable operations over 2-D `f32` tensors.
//!
//! Nodes are appended in evaluation order, so the tape is always topologically sorted and the
//! backward pass is a single reverse sweep over it.

mod backward;
mod gradients;
mod ops;

use std::collections::BTreeMap;

use ndarray::{ArrayView2, CowArray, Ix2};

pub use gradients::Gradients;

use crate::{
    error::{NnErr, Result},
    param::{ParamId, ParamSet},
};

/// Identifies a node inside the `Graph` that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy)]
enum Op {
    Input,
    Param(ParamId),
    DotProduct { features: NodeId, weights: NodeId },
    Linear { features: NodeId, weights: NodeId },
    AddBias { features: NodeId, bias: NodeId },
    Add { a: NodeId, b: NodeId },
    Relu { x: NodeId },
    SquareLoss { a: NodeId, b: NodeId },
    SoftmaxLoss { logits: NodeId, labels: NodeId },
}

struct Node<'p> {
    value: CowArray<'p, f32, Ix2>,
    op: Op,
    requires_grad: bool,
}

/// A computation graph built for a single forward pass.
///
/// Parameter values are borrowed from the `ParamSet` the graph was created over, so the set
/// can't be updated while a graph over it is alive.
pub struct Graph<'p> {
    params: &'p ParamSet,
    nodes: Vec<Node<'p>>,
    param_nodes: BTreeMap<ParamId, NodeId>,
}

impl<'p> Graph<'p> {
    /// Creates a new empty `Graph`.
    ///
    /// # Arguments
    /// * `params` - The parameters the `param` nodes of this graph are read from.
    pub fn new(params: &'p ParamSet) -> Self {
        Self {
            params,
            nodes: Vec::new(),
            param_nodes: BTreeMap::new(),
        }
    }

    /// Returns the amount of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Gives a view of the value of a node.
    pub fn value(&self, id: NodeId) -> Result<ArrayView2<'_, f32>> {
        self.node(id).map(|node| node.value.view())
    }

    /// Extracts the single number held by a 1x1 node.
    pub fn scalar(&self, id: NodeId) -> Result<f32> {
        let value = self.value(id)?;
        if value.dim() != (1, 1) {
            return Err(NnErr::NotScalar { shape: value.dim() });
        }

        Ok(value[[0, 0]])
    }

    fn node(&self, id: NodeId) -> Result<&Node<'p>> {
        self.nodes.get(id.0).ok_or(NnErr::UnknownNode {
            id: id.0,
            len: self.nodes.len(),
        })
    }

    fn push(&mut self, value: CowArray<'p, f32, Ix2>, op: Op, requires_grad: bool) -> NodeId {
        self.nodes.push(Node {
            value,
            op,
            requires_grad,
        });

        NodeId(self.nodes.len() - 1)
    }
}
