use crate::error::MilError;
use alloc::format;
use core::num::NonZeroUsize;
use core::str::FromStr;
#[cfg(feature = "std")]
use nanoserde::DeJson;

/// Pooling method of the operator.
///
/// Only [`PoolMethod::Max`] is implemented, the other methods are accepted
/// by configure, but forward and backward refuse to run with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolMethod {
    /// Max over the instances of a bag
    #[default]
    Max,
    /// Mean over the instances of a bag
    Average,
    /// Sampled instance of a bag
    Stochastic,
}

impl TryFrom<i32> for PoolMethod {
    type Error = MilError;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PoolMethod::Max),
            1 => Ok(PoolMethod::Average),
            2 => Ok(PoolMethod::Stochastic),
            _ => Err(MilError::config_error(format!(
                "Unknown pooling method code {value}"
            ))),
        }
    }
}

impl FromStr for PoolMethod {
    type Err = MilError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("max") {
            Ok(PoolMethod::Max)
        } else if s.eq_ignore_ascii_case("ave") || s.eq_ignore_ascii_case("average") {
            Ok(PoolMethod::Average)
        } else if s.eq_ignore_ascii_case("stochastic") {
            Ok(PoolMethod::Stochastic)
        } else {
            Err(MilError::config_error(format!("Unknown pooling method {s:?}")))
        }
    }
}

impl core::fmt::Display for PoolMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            PoolMethod::Max => "MAX",
            PoolMethod::Average => "AVE",
            PoolMethod::Stochastic => "STOCHASTIC",
        })
    }
}

/// How instances are partitioned into bags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BagSize {
    /// All instances of the batch form one bag,
    /// the pooled label is the label of the first instance
    #[default]
    WholeBatch,
    /// Consecutive bags of this many instances,
    /// all instances of a bag must share one label
    Fixed(NonZeroUsize),
}

impl From<usize> for BagSize {
    /// Zero means whole batch
    fn from(value: usize) -> Self {
        NonZeroUsize::new(value).map_or(BagSize::WholeBatch, BagSize::Fixed)
    }
}

impl From<NonZeroUsize> for BagSize {
    fn from(value: NonZeroUsize) -> Self {
        BagSize::Fixed(value)
    }
}

/// Operator configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MilConfig {
    /// Pooling method
    pub pool: PoolMethod,
    /// Bag partition
    pub bag_size: BagSize,
}

impl MilConfig {
    /// New config
    pub fn new(pool: PoolMethod, bag_size: impl Into<BagSize>) -> Self {
        Self {
            pool,
            bag_size: bag_size.into(),
        }
    }

    /// Max pooling over consecutive bags of `bag_size` instances
    pub fn grouped(bag_size: usize) -> Self {
        Self::new(PoolMethod::Max, bag_size)
    }

    /// Max pooling over the whole batch
    pub fn whole_batch() -> Self {
        Self::new(PoolMethod::Max, BagSize::WholeBatch)
    }

    /// Parse config from json, e.g. `{"pool": "MAX", "bag_size": 2}`.
    /// Missing fields take their defaults.
    #[cfg(feature = "std")]
    pub fn from_json(json: &str) -> Result<Self, MilError> {
        let raw = RawConfig::deserialize_json(json)
            .map_err(|e| MilError::config_error(format!("Failed to parse config json, {e}")))?;
        let pool = match raw.pool {
            Some(pool) => pool.parse()?,
            None => PoolMethod::default(),
        };
        Ok(Self::new(pool, raw.bag_size.unwrap_or(0)))
    }
}

#[cfg(feature = "std")]
#[derive(DeJson, Debug, Default)]
struct RawConfig {
    #[nserde(default)]
    pool: Option<alloc::string::String>,
    #[nserde(default)]
    bag_size: Option<usize>,
}
