//! Acoustic model backends.
//!
//! This module contains implementations of [`AcousticModel`](crate::AcousticModel).
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `vits` - VITS / Piper / Coqui exports (ONNX format)

#[cfg(feature = "vits")]
pub mod vits;
