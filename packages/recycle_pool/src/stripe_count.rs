use std::num::NonZero;

use many_cpus::SystemHardware;

use crate::{Error, Result};

/// The largest power of two that fits in a signed 32-bit integer.
///
/// This is the upper bound on the number of stripes a pool can be configured with.
pub const MAX_POWER_OF_TWO: i32 = 1 << 30;

/// Rounds `value` up to the nearest power of two.
///
/// Zero rounds to one, the smallest power of two.
///
/// # Errors
///
/// Returns [`Error::NegativeStripeCount`] if `value` is negative and
/// [`Error::StripeCountTooLarge`] if `value` exceeds [`MAX_POWER_OF_TWO`].
///
/// # Example
///
/// ```rust
/// use recycle_pool::round_to_power_of_two;
///
/// assert_eq!(round_to_power_of_two(5).unwrap(), 8);
/// assert_eq!(round_to_power_of_two(8).unwrap(), 8);
/// assert!(round_to_power_of_two(-1).is_err());
/// ```
pub fn round_to_power_of_two(value: i32) -> Result<i32> {
    if value > MAX_POWER_OF_TWO {
        return Err(Error::StripeCountTooLarge {
            requested: value,
            max: MAX_POWER_OF_TWO,
        });
    }

    let Ok(unsigned) = u32::try_from(value) else {
        return Err(Error::NegativeStripeCount { requested: value });
    };

    let rounded = unsigned.next_power_of_two();

    // Cannot overflow, we checked against MAX_POWER_OF_TWO above.
    Ok(i32::try_from(rounded).expect("power of two <= 2^30 always fits in i32"))
}

/// The number of independent stripes in a striped pool.
///
/// Always a power of two, so a stripe index can be derived from a hash by masking instead of
/// by modulo division.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StripeCount {
    count: NonZero<usize>,
}

impl StripeCount {
    /// Creates a stripe count from the requested number of stripes, rounded up to the nearest
    /// power of two.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroStripes`] if `requested` is zero, otherwise any error that
    /// [`round_to_power_of_two()`] returns.
    pub fn new(requested: i32) -> Result<Self> {
        if requested == 0 {
            return Err(Error::ZeroStripes);
        }

        let rounded = round_to_power_of_two(requested)?;

        let count = usize::try_from(rounded)
            .ok()
            .and_then(NonZero::new)
            .expect("rounded stripe count is always positive");

        Ok(Self { count })
    }

    /// One stripe, which degenerates a striped pool into a single shared structure.
    #[must_use]
    pub const fn one() -> Self {
        Self {
            count: NonZero::<usize>::MIN,
        }
    }

    /// The number of stripes.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.count.get()
    }

    /// The mask that maps a hash onto a stripe index in `[0, get())`.
    #[must_use]
    pub const fn mask(&self) -> usize {
        // Cannot underflow, count is never zero.
        self.count.get().wrapping_sub(1)
    }
}

impl Default for StripeCount {
    /// One stripe per processor available to the process, rounded up to a power of two.
    fn default() -> Self {
        let processor_count = SystemHardware::current().processors().len();

        i32::try_from(processor_count)
            .ok()
            .and_then(|requested| Self::new(requested).ok())
            .unwrap_or_else(Self::one)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_power_of_two() {
        assert_eq!(round_to_power_of_two(1).unwrap(), 1);
        assert_eq!(round_to_power_of_two(2).unwrap(), 2);
        assert_eq!(round_to_power_of_two(3).unwrap(), 4);
        assert_eq!(round_to_power_of_two(5).unwrap(), 8);
        assert_eq!(round_to_power_of_two(8).unwrap(), 8);
        assert_eq!(round_to_power_of_two(1000).unwrap(), 1024);
        assert_eq!(round_to_power_of_two(1 << 30).unwrap(), 1 << 30);
    }

    #[test]
    fn zero_rounds_to_one() {
        assert_eq!(round_to_power_of_two(0).unwrap(), 1);
    }

    #[test]
    fn negative_is_rejected() {
        assert!(matches!(
            round_to_power_of_two(-1),
            Err(Error::NegativeStripeCount { requested: -1 })
        ));
        assert!(matches!(
            round_to_power_of_two(i32::MIN),
            Err(Error::NegativeStripeCount { .. })
        ));
    }

    #[test]
    fn above_max_is_rejected() {
        assert!(matches!(
            round_to_power_of_two((1 << 30) + 1),
            Err(Error::StripeCountTooLarge { .. })
        ));
        assert!(matches!(
            round_to_power_of_two(i32::MAX),
            Err(Error::StripeCountTooLarge { .. })
        ));
    }

    #[test]
    fn stripe_count_rounds_and_masks() {
        let stripes = StripeCount::new(5).unwrap();

        assert_eq!(stripes.get(), 8);
        assert_eq!(stripes.mask(), 7);
    }

    #[test]
    fn stripe_count_rejects_zero() {
        assert!(matches!(StripeCount::new(0), Err(Error::ZeroStripes)));
    }

    #[test]
    fn stripe_count_propagates_rounding_errors() {
        assert!(matches!(
            StripeCount::new(-4),
            Err(Error::NegativeStripeCount { .. })
        ));
    }

    #[test]
    fn one_has_empty_mask() {
        assert_eq!(StripeCount::one().get(), 1);
        assert_eq!(StripeCount::one().mask(), 0);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn default_covers_every_available_processor() {
        let stripes = StripeCount::default();
        let processor_count = SystemHardware::current().processors().len();

        assert!(stripes.get().is_power_of_two());
        assert!(stripes.get() >= processor_count);
        assert!(stripes.get() / 2 < processor_count);
    }
}
