pub mod builder;
pub mod common;
pub mod dashboard;
pub mod errors;
pub mod merge;
pub mod normalize;
pub mod ops;
pub mod parse;
pub mod repair;
pub mod summary;
