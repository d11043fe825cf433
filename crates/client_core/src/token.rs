use std::fmt;

use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// Layout template for generated tokens. Positions holding `0` or `1` take a
/// uniformly random nibble, positions holding `8` take the UUID variant
/// nibble (8, 9, a or b); dashes and the version `4` are literal.
const TOKEN_TEMPLATE: &str = "10000000-1000-4000-8000-100000000000";

/// Substitutable positions in `TOKEN_TEMPLATE`.
const RANDOM_POSITIONS: usize = 31;

const HEX: &[u8; 16] = b"0123456789abcdef";

#[derive(Debug, Error)]
pub enum TokenError {
    /// The OS entropy source failed. The calling operation must abort rather
    /// than send a request with a weak or absent token.
    #[error("system random source unavailable: {0}")]
    RandomSourceUnavailable(rand::Error),
}

/// Per-request anti-forgery token in canonical UUID-v4 text layout, sent as
/// both the `CSRF-TOKEN` cookie and the `X-CSRF-TOKEN` header of a single
/// request and discarded afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a fresh token from the OS random source.
///
/// Each call draws independent entropy; the ~122 random bits make collisions
/// irrelevant in practice. The only failure mode is an unavailable OS source,
/// which is reported instead of degrading to a weaker generator.
pub fn generate() -> Result<CsrfToken, TokenError> {
    let mut entropy = [0u8; RANDOM_POSITIONS];
    OsRng
        .try_fill_bytes(&mut entropy)
        .map_err(TokenError::RandomSourceUnavailable)?;

    let mut out = String::with_capacity(TOKEN_TEMPLATE.len());
    let mut drawn = 0usize;
    for slot in TOKEN_TEMPLATE.bytes() {
        let rendered = match slot {
            b'0' | b'1' => {
                let nibble = entropy[drawn] & 0x0f;
                drawn += 1;
                HEX[nibble as usize]
            }
            b'8' => {
                let nibble = 8 + (entropy[drawn] & 0x03);
                drawn += 1;
                HEX[nibble as usize]
            }
            literal => literal,
        };
        out.push(rendered as char);
    }

    Ok(CsrfToken(out))
}

#[cfg(test)]
#[path = "tests/token_tests.rs"]
mod tests;
