/// DType of scores and labels
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DType {
    /// 16 bit floating point type
    #[cfg(feature = "half")]
    F16,
    /// 16 bit brain floating point type
    #[cfg(feature = "half")]
    BF16,
    /// 32 bit floating point type
    F32,
    /// 64 bit floating point type
    F64,
    /// 32 bit integer type
    I32,
}

impl core::fmt::Display for DType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        f.write_fmt(format_args!("{self:?}"))
    }
}
