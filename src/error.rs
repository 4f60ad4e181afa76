use thiserror::Error;

use crate::Weight;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Contract violations reported by [`crate::DirectedGraph`].
///
/// Missing vertices and duplicate edges are not errors: the mutating
/// operations report them through their `bool` result instead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// Edge weights must be strictly positive.
    #[error("invalid edge weight {weight}: weights must be strictly positive")]
    InvalidWeight { weight: Weight },

    /// The queried edge does not exist, either because one of its endpoints
    /// is missing or because the endpoints are not connected.
    #[error("edge not found")]
    EdgeNotFound,
}
