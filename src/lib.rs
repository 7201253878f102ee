//! # Gazed Action
//!
//! Discrete-action classifiers for stacked Atari frames, optionally
//! conditioned on a human gaze map, built on the Burn ML framework.
//!
//! ## Modules
//!
//! - [`model`] — Shape bookkeeping, the shared encoder, the single- and
//!   dual-stream classifiers, teacher-model gaze synthesis
//! - [`data`] — Dataset interface, batching, class-balanced sampling
//! - [`training`] — Epoch loop, rolling metrics, metrics sinks
//! - [`checkpoint`] — Model and optimizer persistence keyed by variant, scope and epoch
//! - [`config`] — TOML configuration loading and validation
//! - [`error`] — Structured error types
//! - [`util`] — Small shared helpers

#![recursion_limit = "256"]

pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod training;
pub mod util;

#[cfg(not(feature = "backend-wgpu"))]
pub type InferBackend = burn::backend::NdArray<f32>;
#[cfg(feature = "backend-wgpu")]
pub type InferBackend = burn::backend::Wgpu<f32, i32>;

pub type TrainBackend = burn::backend::Autodiff<InferBackend>;

/// Device shared by both backends.
pub type BackendDevice = <InferBackend as burn::tensor::backend::Backend>::Device;
