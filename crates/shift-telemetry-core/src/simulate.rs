//! Synthetic session draws for the simulate command. Uniform bounds only;
//! this is demonstration input, not a modeled distribution.

use rand::Rng;

/// Identity credited with automatically generated sessions.
pub const BOT_ACTOR: &str = "sim-bot";

pub const SALES_MIN: u32 = 5;
pub const SALES_MAX: u32 = 50;
pub const ERRORS_MIN: u32 = 0;
pub const ERRORS_MAX: u32 = 20;

/// Draws one synthetic `(sales, errors)` pair, uniform over
/// `[SALES_MIN, SALES_MAX]` and `[ERRORS_MIN, ERRORS_MAX]`.
#[must_use]
pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> (u32, u32) {
    (
        rng.gen_range(SALES_MIN..=SALES_MAX),
        rng.gen_range(ERRORS_MIN..=ERRORS_MAX),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn draws_stay_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1_000 {
            let (sales, errors) = draw(&mut rng);
            assert!((SALES_MIN..=SALES_MAX).contains(&sales));
            assert!((ERRORS_MIN..=ERRORS_MAX).contains(&errors));
        }
    }

    #[test]
    fn seeded_draws_are_reproducible() {
        let mut first = StdRng::seed_from_u64(7);
        let mut second = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            assert_eq!(draw(&mut first), draw(&mut second));
        }
    }
}
