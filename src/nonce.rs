//! Printable-ASCII nonce generation for SCRAM.

use rand::RngCore;

/// Lowest and highest printable ASCII bytes a nonce may contain, with `,`
/// excluded because SCRAM uses it as a field separator.
const MIN_PRINTABLE: u8 = 0x21; // '!' -- one above space
const MAX_PRINTABLE: u8 = 0x7E; // '~'
const COMMA: u8 = 0x2C;

/// Fills `out` with `out.len()` printable ASCII bytes, excluding `,`.
///
/// Over-reads from `rng` in multiples of the requested length and filters,
/// refilling whenever a round doesn't yield enough acceptable bytes.
pub fn fill_nonce(rng: &mut dyn RngCore, out: &mut [u8]) {
    let want = out.len();
    let mut filled = 0;
    let mut scratch = vec![0u8; want * 4];
    while filled < want {
        rng.fill_bytes(&mut scratch);
        for &b in &scratch {
            if filled == want {
                break;
            }
            if b >= MIN_PRINTABLE && b <= MAX_PRINTABLE && b != COMMA {
                out[filled] = b;
                filled += 1;
            }
        }
    }
}

/// Generates a nonce of `length` bytes using `rng`, returned as a `String`
/// (every accepted byte is valid single-byte ASCII).
pub fn generate_nonce(rng: &mut dyn RngCore, length: usize) -> String {
    let mut buf = vec![0u8; length];
    fill_nonce(rng, &mut buf);
    String::from_utf8(buf).expect("nonce bytes are restricted to printable ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn nonce_has_requested_length_and_alphabet() {
        let mut rng = StdRng::seed_from_u64(42);
        for length in [1usize, 8, 24, 64] {
            let nonce = generate_nonce(&mut rng, length);
            assert_eq!(nonce.len(), length);
            assert!(nonce
                .bytes()
                .all(|b| b >= MIN_PRINTABLE && b <= MAX_PRINTABLE && b != COMMA));
        }
    }

    #[test]
    fn nonce_excludes_comma() {
        let mut rng = StdRng::seed_from_u64(7);
        let nonce = generate_nonce(&mut rng, 4096);
        assert!(!nonce.contains(','));
    }
}
