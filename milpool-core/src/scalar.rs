use crate::dtype::DType;

/// Scalar trait is implemented for all [dtypes](DType)
///
/// Scores and labels share one scalar type, labels are real valued class codes.
pub trait Scalar: Copy + PartialOrd + core::fmt::Debug + 'static {
    /// Get dtype of Self
    fn dtype() -> DType;
    /// Get zero of Self
    fn zero() -> Self;
    /// Smallest value of this dtype, negative infinity for floats.
    /// No score can be lower than this, so it seeds the max reduction.
    fn min_value() -> Self;
    /// From f64
    fn from_f64(t: f64) -> Self;
    /// Convert self into f64
    fn into_f64(self) -> f64;
    /// Absolute value
    fn abs(self) -> Self;
    /// Comparison for scalars,
    /// if they are floats, this checks for diffs > epsilon
    fn is_equal(self, rhs: Self) -> bool;
}

macro_rules! float_scalar {
    ($t: ty, $dtype: expr) => {
        impl Scalar for $t {
            fn dtype() -> DType {
                $dtype
            }

            fn zero() -> Self {
                0.
            }

            fn min_value() -> Self {
                <$t>::NEG_INFINITY
            }

            fn from_f64(t: f64) -> Self {
                t as $t
            }

            fn into_f64(self) -> f64 {
                self as f64
            }

            fn abs(self) -> Self {
                if self < 0. {
                    -self
                } else {
                    self
                }
            }

            fn is_equal(self, rhs: Self) -> bool {
                // Less than 1% error is OK
                self == rhs
                    || (self - rhs).abs() < 0.00001
                    || (self - rhs).abs() < self.abs() * 0.01
            }
        }
    };
}

float_scalar!(f32, DType::F32);
float_scalar!(f64, DType::F64);

impl Scalar for i32 {
    fn dtype() -> DType {
        DType::I32
    }

    fn zero() -> Self {
        0
    }

    fn min_value() -> Self {
        i32::MIN
    }

    fn from_f64(t: f64) -> Self {
        t as i32
    }

    fn into_f64(self) -> f64 {
        self as f64
    }

    fn abs(self) -> Self {
        self.wrapping_abs()
    }

    fn is_equal(self, rhs: Self) -> bool {
        self == rhs
    }
}

#[cfg(feature = "half")]
macro_rules! half_scalar {
    ($t: ty, $dtype: expr) => {
        impl Scalar for $t {
            fn dtype() -> DType {
                $dtype
            }

            fn zero() -> Self {
                <$t>::ZERO
            }

            fn min_value() -> Self {
                <$t>::NEG_INFINITY
            }

            fn from_f64(t: f64) -> Self {
                <$t>::from_f64(t)
            }

            fn into_f64(self) -> f64 {
                self.to_f64()
            }

            fn abs(self) -> Self {
                if self < <$t>::ZERO {
                    -self
                } else {
                    self
                }
            }

            fn is_equal(self, rhs: Self) -> bool {
                // Half precision, so allow 1% of error
                let (x, y) = (self.to_f64(), rhs.to_f64());
                x == y || (x - y).abs() < 0.001 || (x - y).abs() < x.abs() * 0.01
            }
        }
    };
}

#[cfg(feature = "half")]
half_scalar!(half::f16, DType::F16);
#[cfg(feature = "half")]
half_scalar!(half::bf16, DType::BF16);
