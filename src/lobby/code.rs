//! Room code generation

use rand::Rng;

/// Letters and digits with the look-alikes (I, O, 0, 1) removed
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const CODE_LEN: usize = 4;

/// Draw a random room code
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Canonical form used for lookups
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn codes_use_the_unambiguous_alphabet() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let code = generate(&mut rng);
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
            assert!(!code.contains(&['I', 'O', '0', '1'][..]));
        }
    }

    #[test]
    fn same_seed_same_codes() {
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);
        assert_eq!(generate(&mut a), generate(&mut b));
    }

    #[test]
    fn lookups_ignore_case_and_padding() {
        assert_eq!(normalize(" ab2c "), "AB2C");
        assert_eq!(normalize("WXYZ"), "WXYZ");
    }
}
