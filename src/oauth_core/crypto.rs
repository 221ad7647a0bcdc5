//! Random token identifiers using `ring`.

use ring::error::Unspecified;
use ring::rand::{SecureRandom, SystemRandom};

use super::config::IdentifierAlphabet;

/// Generate a random identifier of `length` characters drawn uniformly from `alphabet`.
///
/// Bytes that would bias the modulo mapping are rejected and redrawn.
pub fn random_identifier(rng: &SystemRandom, length: usize, alphabet: IdentifierAlphabet) -> Result<String, Unspecified> {
    let chars = alphabet.chars();
    let n = chars.len();
    let limit = 256 - (256 % n);
    let mut out = String::with_capacity(length);
    let mut buf = [0u8; 64];
    while out.len() < length {
        rng.fill(&mut buf)?;
        for &b in buf.iter() {
            if (b as usize) < limit {
                out.push(chars[b as usize % n] as char);
                if out.len() == length {
                    break;
                }
            }
        }
    }
    Ok(out)
}
