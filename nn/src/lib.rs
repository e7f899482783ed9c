//! A minimal reverse-mode autograd library over 2-D `f32` tensors.
//!
//! Models keep their trainable tensors in a [`ParamSet`], build a [`Graph`] for every forward
//! pass and turn the [`Gradients`] of a loss into parameter updates through an
//! [`optimization::Optimizer`].

pub mod data;
mod error;
mod graph;
pub mod optimization;
mod param;

pub use error::{NnErr, Result, Shape};
pub use graph::{Gradients, Graph, NodeId};
pub use param::{ParamId, ParamSet};
