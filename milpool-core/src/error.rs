use crate::config::PoolMethod;
use alloc::boxed::Box;
use alloc::string::String;
use core::fmt::{Display, Formatter};

/// Errors returned by the pooling operator
#[derive(Debug, Clone, PartialEq)]
pub enum MilError {
    /// Pooling method or config could not be parsed
    ConfigError(Box<str>),
    /// Pooling method is declared, but has no implementation
    NotImplemented(PoolMethod),
    /// Invalid shapes or buffer lengths
    ShapeError(Box<str>),
    /// Two instances of one bag carry different labels
    LabelMismatch {
        /// Bag that holds both instances
        bag: usize,
        /// Instance whose label differs
        instance: usize,
        /// Label accumulated for the bag so far
        expected: f64,
        /// Label of the offending instance
        found: f64,
    },
    /// Operator was used out of order, e.g. backward without forward
    StateError(Box<str>),
}

impl MilError {
    /// Shape error
    #[track_caller]
    pub fn shape_error(e: impl Into<String>) -> Self {
        Self::ShapeError(with_location(e.into()))
    }

    /// State error
    #[track_caller]
    pub fn state_error(e: impl Into<String>) -> Self {
        Self::StateError(with_location(e.into()))
    }

    /// Config error
    pub fn config_error(e: impl Into<String>) -> Self {
        Self::ConfigError(e.into().into())
    }
}

#[track_caller]
fn with_location(mut e: String) -> Box<str> {
    use core::fmt::Write;
    let location = core::panic::Location::caller();
    // Writing into a String can not fail
    let _ = write!(e, ", {}:{}:{}", location.file(), location.line(), location.column());
    e.into()
}

impl Display for MilError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            MilError::ConfigError(e) => f.write_fmt(format_args!("Config {e}")),
            MilError::NotImplemented(method) => f.write_fmt(format_args!(
                "Pooling method {method} is not implemented"
            )),
            MilError::ShapeError(e) => f.write_str(e),
            MilError::LabelMismatch {
                bag,
                instance,
                expected,
                found,
            } => f.write_fmt(format_args!(
                "Label in a bag cannot be different: bag {bag} has label {expected}, but instance {instance} has label {found}"
            )),
            MilError::StateError(e) => f.write_fmt(format_args!("Invalid operator state: {e}")),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MilError {}
