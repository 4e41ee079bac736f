pub mod binarize;
pub use binarize::{BinarizeConfig, BinarizeError, binarize};
