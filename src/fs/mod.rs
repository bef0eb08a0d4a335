pub mod access;
pub mod operations;
pub mod search;
pub mod tree;
