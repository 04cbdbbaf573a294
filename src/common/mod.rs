//! Supporting macros shared across the crate.

/// Trace a worker state transition when the `log` feature is enabled.
macro_rules! trace {
    ($($tt:tt)*) => {
        #[cfg(feature = "log")]
        log::trace!($($tt)*)
    };
}

/// Warn when the `log` feature is enabled.
macro_rules! warn {
    ($($tt:tt)*) => {
        #[cfg(feature = "log")]
        log::warn!($($tt)*)
    };
}

pub(crate) use trace;
pub(crate) use warn;
