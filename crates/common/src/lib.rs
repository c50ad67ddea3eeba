//! Shared types used across the meshview crates.

pub mod transform;

pub use transform::Transform;
