//! Random fixture helpers
//!
//! Fabricate plausible owners, amounts and currencies for test fixtures.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::currency::Currency;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Random integer in `[min, max]`
pub fn random_int(min: i64, max: i64) -> i64 {
    rand::thread_rng().gen_range(min..=max)
}

/// Random lowercase string of length `n`
pub fn random_string(n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Random account owner name
pub fn random_owner() -> String {
    random_string(6)
}

/// Random amount of money in minor units
pub fn random_money() -> i64 {
    random_int(0, 1000)
}

/// Random amount that passes the transfer `amount > 0` check
pub fn random_positive_money() -> i64 {
    random_int(1, 1000)
}

/// Random supported currency
pub fn random_currency() -> Currency {
    *Currency::ALL
        .choose(&mut rand::thread_rng())
        .unwrap_or(&Currency::Usd)
}
