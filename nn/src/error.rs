use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire numeric library.
pub type Result<T> = std::result::Result<T, NnErr>;

/// A `(rows, cols)` pair.
pub type Shape = (usize, usize);

/// The numeric library's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum NnErr {
    ShapeMismatch {
        op: &'static str,
        left: Shape,
        right: Shape,
    },
    NotScalar {
        shape: Shape,
    },
    UnknownParameter {
        id: usize,
        len: usize,
    },
    UnknownNode {
        id: usize,
        len: usize,
    },
    EmptySequence,
    InvalidLabels {
        row: usize,
    },
    InvalidParameter {
        rows: usize,
        cols: usize,
    },
    InvalidDataset(&'static str),
}

impl Display for NnErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NnErr::ShapeMismatch { op, left, right } => write!(
                f,
                "shape mismatch in {op}: got {}x{} and {}x{}",
                left.0, left.1, right.0, right.1
            ),
            NnErr::NotScalar { shape } => write!(
                f,
                "expected a 1x1 node to extract a scalar from, got {}x{}",
                shape.0, shape.1
            ),
            NnErr::UnknownParameter { id, len } => write!(
                f,
                "parameter {id} does not belong to this parameter set, it holds {len} parameters"
            ),
            NnErr::UnknownNode { id, len } => {
                write!(f, "node {id} does not belong to this graph, it holds {len} nodes")
            }
            NnErr::EmptySequence => write!(f, "a sequence input must have at least one timestep"),
            NnErr::InvalidLabels { row } => {
                write!(f, "labels row {row} is not a valid label")
            }
            NnErr::InvalidParameter { rows, cols } => {
                write!(f, "a parameter can't have shape {rows}x{cols}")
            }
            NnErr::InvalidDataset(msg) => write!(f, "invalid dataset: {msg}"),
        }
    }
}

impl Error for NnErr {}
