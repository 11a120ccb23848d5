//! # Engine Module
//!
//! The stateful layer between the volumetric primitives in [`crate::core`]
//! and the end-to-end [`crate::workflows`]. It owns everything that learns
//! or remembers: the classifier network and its checkpoints, the training
//! data pipeline, evaluation metrics, run configuration and progress events.
//!
//! - **Configuration** ([`config`]) - Builders for training, inference,
//!   evaluation and labeling runs
//! - **Network** ([`network`]) - The 3D CNN motif classifier on the `burn` backends
//! - **Checkpoints** ([`checkpoint`]) - Weight persistence with an architecture sidecar
//! - **Data pipeline** ([`dataset`], [`loader`]) - Per-example patch
//!   construction and prefetching batch loading
//! - **Metrics** ([`metrics`]) - Confusion matrix with sensitivity and specificity
//! - **Progress** ([`progress`]) - Callback-based progress events
//! - **Errors** ([`error`]) - The aggregated [`error::EngineError`]

pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod network;
pub mod progress;
