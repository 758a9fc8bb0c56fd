pub mod tree;

pub use tree::walk_operation;
