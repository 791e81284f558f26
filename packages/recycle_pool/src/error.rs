use thiserror::Error;

/// Errors that can occur when configuring or constructing a pool.
///
/// Once a pool exists, acquiring and releasing buffers never fails.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller asked for a negative number of stripes.
    #[error("stripe count {requested} is invalid: expecting a value >= 0")]
    NegativeStripeCount {
        /// The value the caller asked for.
        requested: i32,
    },

    /// The caller asked for more stripes than the largest representable power of two.
    #[error("stripe count {requested} is invalid: there is no power of two >= it that is <= {max}")]
    StripeCountTooLarge {
        /// The value the caller asked for.
        requested: i32,

        /// The largest power of two that can be used as a stripe count.
        max: i32,
    },

    /// The caller asked for a pool with zero stripes.
    #[error("stripe count 0 is invalid: a striped pool needs at least one stripe")]
    ZeroStripes,

    /// The caller named a pool strategy that does not exist.
    #[error("unknown pool strategy '{name}'")]
    UnknownStrategy {
        /// The name as given by the caller.
        name: String,
    },
}

/// A specialized `Result` type for pool configuration, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
