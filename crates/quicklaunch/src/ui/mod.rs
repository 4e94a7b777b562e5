mod common;
mod tree;

pub use common::*;
pub use tree::*;
