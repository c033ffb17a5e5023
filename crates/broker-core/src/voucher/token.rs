//! Verification tokens and voucher identifiers.
//!
//! Both are minted from the [`RandomSource`] port so tests stay
//! deterministic and production draws from OS entropy.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Builder;

use crate::ports::RandomSource;

/// 32 bytes = 256 bits of entropy.
pub const TOKEN_BYTES: usize = 32;

/// Encoded length of a token (32 bytes, url-safe base64, no padding).
pub const TOKEN_LEN: usize = 43;

/// Opaque url-safe token embedded in the voucher's QR URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationToken(String);

impl VerificationToken {
    pub fn generate(random: &dyn RandomSource) -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        random.fill_bytes(&mut bytes);
        VerificationToken(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cheap shape check so obviously bogus tokens never reach the store.
    pub fn is_well_formed(candidate: &str) -> bool {
        candidate.len() == TOKEN_LEN
            && candidate
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }
}

impl fmt::Display for VerificationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// New voucher id: a v4 UUID built from port-supplied bytes.
pub fn new_voucher_id(random: &dyn RandomSource) -> String {
    let mut bytes = [0u8; 16];
    random.fill_bytes(&mut bytes);
    Builder::from_random_bytes(bytes).into_uuid().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SequenceRandom;

    #[test]
    fn test_token_shape() {
        let random = SequenceRandom::new(7);
        let token = VerificationToken::generate(&random);
        assert_eq!(token.as_str().len(), TOKEN_LEN);
        assert!(VerificationToken::is_well_formed(token.as_str()));
        assert!(!VerificationToken::is_well_formed("short"));
        assert!(!VerificationToken::is_well_formed(&"+".repeat(TOKEN_LEN)));
    }

    #[test]
    fn test_tokens_differ_per_draw() {
        let random = SequenceRandom::new(1);
        let a = VerificationToken::generate(&random);
        let b = VerificationToken::generate(&random);
        assert_ne!(a, b);
    }

    #[test]
    fn test_voucher_id_is_uuid_v4() {
        let random = SequenceRandom::new(3);
        let id = new_voucher_id(&random);
        let parsed = uuid::Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }
}
