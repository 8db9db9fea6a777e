use rand::RngExt;

/// Room code alphabet: uppercase letters and digits, easy to read out loud.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random room code of the requested length.
///
/// Uniqueness against active lobbies and the store's `games` collection is
/// enforced by the caller, which redraws on collision.
pub fn random_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = CODE_ALPHABET[idx] as char;
            ch
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DEFAULT_CODE_LENGTH;

    #[test]
    fn code_has_requested_length() {
        for _ in 0..100 {
            assert_eq!(random_code(DEFAULT_CODE_LENGTH).len(), DEFAULT_CODE_LENGTH);
        }
        assert_eq!(random_code(0), "");
    }

    #[test]
    fn code_draws_from_uppercase_alphanumeric_alphabet() {
        for _ in 0..100 {
            let code = random_code(DEFAULT_CODE_LENGTH);
            for c in code.chars() {
                assert!(
                    CODE_ALPHABET.contains(&(c as u8)),
                    "character '{c}' in code '{code}' is outside the alphabet"
                );
            }
        }
    }
}
