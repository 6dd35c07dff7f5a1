#![no_std]
//! # milpool-core
//!
//! Multiple instance learning pooling. Scores of consecutive instances
//! (bags) are reduced to one row of per class maxima, the label of the bag is
//! carried forward and the argmax of every maximum is kept, so that backward
//! scatters gradient only to the winning instances.
//!
//! ```rust
//! use milpool_core::{MilConfig, MilPool};
//! let mut pool = MilPool::<f32>::new(MilConfig::whole_batch());
//! pool.reshape([3, 2], [3])?;
//! let out = pool.forward(&[1., 4., 3., 2., 0., 4.], &[7., 1., 1.])?;
//! assert_eq!(out.scores, [3., 4.]);
//! assert_eq!(out.labels, [7.]);
//! # Ok::<(), milpool_core::MilError>(())
//! ```
#![forbid(unsafe_code)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![forbid(rustdoc::private_intra_doc_links)]
#![forbid(missing_docs)]
#![forbid(rustdoc::missing_crate_level_docs)]
#![forbid(rustdoc::private_doc_tests)]
#![forbid(rustdoc::invalid_codeblock_attributes)]
#![forbid(rustdoc::invalid_html_tags)]
#![forbid(rustdoc::invalid_rust_codeblocks)]
#![forbid(rustdoc::bare_urls)]
#![forbid(rustdoc::unescaped_backticks)]
#![forbid(rustdoc::redundant_explicit_links)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

/// See [MilConfig](config::MilConfig)
pub mod config;
/// See [DebugMask](debug::DebugMask)
pub mod debug;
/// See [DType](dtype::DType)
pub mod dtype;
/// See [MilError](error::MilError)
pub mod error;
/// See [MilPool](pool::MilPool)
pub mod pool;
/// See [Scalar](scalar::Scalar)
pub mod scalar;
/// See [Shape](shape::Shape)
pub mod shape;

pub use config::{BagSize, MilConfig, PoolMethod};
pub use debug::DebugMask;
pub use error::MilError;
pub use pool::{Layout, MilPool, Pooled, Stage};
pub use scalar::Scalar;
pub use shape::Shape;
