//! Shared traits for the atax-rs workspace.
//!
//! This crate holds the element trait that `atax-kernel` and the root
//! `atax-rs` facade are generic over. It has no dependency on rayon or pulp
//! so downstream crates can name the bounds without pulling in the kernels.

pub mod scalar;

pub use scalar::Scalar;
