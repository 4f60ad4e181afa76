pub mod adjacency_matrix;
pub mod digraph;
pub mod error;

/// Edge weight.  Only strictly positive weights are accepted by
/// [`DirectedGraph`]; the type is signed so that bad input can be rejected
/// instead of wrapping around.
pub type Weight = i64;

pub use digraph::{arb_digraph, DirectedGraph, Edge, DEFAULT_CAPACITY};
pub use error::{GraphError, Result};
