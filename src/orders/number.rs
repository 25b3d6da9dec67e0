use chrono::NaiveDate;
use rand::Rng;

use crate::models::OrderSource;

/// Characters allowed in the random suffix; ambiguous glyphs (0/O, 1/I/L)
/// are excluded so numbers read back cleanly over the phone
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const SUFFIX_LEN: usize = 4;

/// Generates human-readable order numbers like `WEB-20260830-K4QF`
///
/// The prefix identifies the entry channel and the middle segment the order
/// date. Uniqueness is not guaranteed here; the caller checks the store and
/// retries on collision.
pub struct OrderNumberGenerator;

impl OrderNumberGenerator {
    pub fn generate(source: OrderSource, date: NaiveDate) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..SUFFIX_ALPHABET.len());
                SUFFIX_ALPHABET[idx] as char
            })
            .collect();

        format!("{}-{}-{}", source.prefix(), date.format("%Y%m%d"), suffix)
    }
}
