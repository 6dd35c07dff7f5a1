use crate::shape::Shape;

/// Debug printing switches, read from the `MILPOOL_DEBUG` environment variable.
///
/// The value is a bitmask:
/// - 1: lifecycle, configure and reshape with resulting shapes
/// - 2: perf, time taken by forward and backward
/// - 4: dump of pooled scores, pooled labels and argmax indices after forward
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugMask(u32);

impl DebugMask {
    /// Debug mask from raw bits
    #[must_use]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Read mask from `MILPOOL_DEBUG`, unset or unparsable value disables all printing
    #[cfg(feature = "std")]
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("MILPOOL_DEBUG")
            .ok()
            .and_then(|x| x.trim().parse::<u32>().ok())
            .map(Self)
            .unwrap_or_default()
    }

    pub(crate) const fn lifecycle(self) -> bool {
        self.0 % 2 == 1
    }

    pub(crate) const fn perf(self) -> bool {
        (self.0 >> 1) % 2 == 1
    }

    pub(crate) const fn dump(self) -> bool {
        (self.0 >> 2) % 2 == 1
    }
}

/// Print only with std and when the switch is on
macro_rules! debug_println {
    ($on: expr, $($arg: tt)*) => {
        #[cfg(feature = "std")]
        if $on {
            std::println!($($arg)*);
        }
    };
}
pub(crate) use debug_println;

/// Wall clock of one pass, printed under the perf switch. Empty without std.
pub(crate) struct Timer {
    #[cfg(feature = "std")]
    begin: std::time::Instant,
}

impl Timer {
    pub(crate) fn start() -> Self {
        Self {
            #[cfg(feature = "std")]
            begin: std::time::Instant::now(),
        }
    }

    #[cfg_attr(not(feature = "std"), allow(unused_variables))]
    pub(crate) fn finish(self, debug: DebugMask, what: &str, shape: &Shape) {
        debug_println!(
            debug.perf(),
            "MilPool {what} {shape} took {:.3} ms",
            self.begin.elapsed().as_nanos() as f64 / 1_000_000.
        );
    }
}
