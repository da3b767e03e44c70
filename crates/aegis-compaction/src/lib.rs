//! Aegis Compaction - Streaming Time Series Compaction
//!
//! Per-bucket aggregation engine for downsampling time series. Raw samples
//! are folded into fixed-width buckets by one of thirteen aggregations, the
//! bucket state can be persisted and restored across layout versions, and a
//! streaming median supports windows that both grow and shrink.
//!
//! Key Features:
//! - min, max, sum, avg, count, first, last, range, std.p, std.s, var.p,
//!   var.s and time-weighted average aggregators
//! - Overflow-safe running average and single-pass variance
//! - Vectorized max scans bound once to the best kernel for the CPU
//! - Version-gated binary persistence of every aggregator state
//! - Streaming median over a two-heap partition with delete support
//! - Streaming compaction rules, batch downsampling and rolling medians
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod aggregation;
pub mod arch;
pub mod codec;
pub mod downsample;
pub mod kernels;
pub mod median;
pub mod registry;
pub mod rolling;
pub mod rule;

pub use aggregation::Aggregator;
pub use arch::{arch_features, ArchFeatures};
pub use codec::{decode, encode, Persist, StateDecoder, StateEncoder, StateReader, StateWriter};
pub use downsample::Downsampler;
pub use kernels::{init_kernels, max_kernel, max_scan, MaxKernel};
pub use median::MedianTracker;
pub use registry::AggregationType;
pub use rolling::RollingMedian;
pub use rule::CompactionRule;
