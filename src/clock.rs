use chrono::{DateTime, Utc};
use rand::Rng;

const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const SUFFIX_LEN: usize = 4;

/// Source of the current time for expiry and offer window checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of the random suffixes used in preview tokens and order numbers.
pub trait IdGenerator: Send + Sync {
    /// Four uppercase alphanumeric characters.
    fn suffix(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn suffix(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..SUFFIX_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..SUFFIX_ALPHABET.len());
                char::from(SUFFIX_ALPHABET[idx])
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_suffix_is_four_uppercase_alphanumerics() {
        for _ in 0..50 {
            let suffix = RandomIds.suffix();
            assert_eq!(suffix.len(), SUFFIX_LEN);
            assert!(
                suffix
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            );
        }
    }
}
