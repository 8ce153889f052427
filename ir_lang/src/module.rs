use crate::function::Function;
use serde::Deserialize;
use serde::Serialize;

/// A whole program: the ordered sequence of function definitions as they
/// appeared in the source. Name resolution happens at execution time, so
/// duplicate names survive parsing and are rejected when the function
/// table is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<Function>,
}
