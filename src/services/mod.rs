//! Cloud Foundry API service implementations.

mod applications;

pub use applications::*;
