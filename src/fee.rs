//! Entry fees by age bracket.

/// Age bracket pricing, applied to every member of a registration individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    /// Members up to and including this age take part for free.
    pub free_through_age: u8,
    /// What everybody older pays, in whole units of the checkout currency.
    pub fee: u32,
}

impl FeePolicy {
    /// 11 and under are free, everyone else pays 20.
    pub const STANDARD: Self = Self {
        free_through_age: 11,
        fee: 20,
    };

    #[must_use]
    pub const fn is_free(&self, age: u8) -> bool {
        age <= self.free_through_age
    }

    #[must_use]
    pub const fn fee_of(&self, age: u8) -> u32 {
        if self.is_free(age) {
            0
        } else {
            self.fee
        }
    }
}

/// The fee for a single person of the given age under [`FeePolicy::STANDARD`].
#[must_use]
pub const fn fee_of(age: u8) -> u32 {
    FeePolicy::STANDARD.fee_of(age)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_are_free() {
        for age in 0..=11 {
            assert_eq!(fee_of(age), 0, "age {age}");
        }
    }

    #[test]
    fn everyone_from_twelve_pays() {
        for age in 12..=100 {
            assert_eq!(fee_of(age), 20, "age {age}");
        }
    }
}
