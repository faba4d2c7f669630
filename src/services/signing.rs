use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::utils::error::TicketError;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA-256 signer over a server-held secret. Shared by the QR issuer
/// and the gateway webhook attestation check.
#[derive(Clone, Debug)]
pub struct HmacSigner {
    key: Vec<u8>,
}

impl HmacSigner {
    /// An empty secret is a configuration failure, not something to sign
    /// with; construction is the only place that gets checked.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, TicketError> {
        let key = secret.into();
        if key.is_empty() {
            return Err(TicketError::SigningKeyMissing);
        }
        Ok(Self { key })
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length")
    }

    pub fn sign(&self, message: &str) -> String {
        let mut mac = self.mac();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time comparison via `Mac::verify_slice`; callers must use
    /// this rather than comparing hex strings themselves.
    pub fn verify(&self, message: &str, signature_hex: &str) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(message.as_bytes());
        mac.verify_slice(&signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = HmacSigner::new("test-secret").unwrap();
        let sig = signer.sign("hello");
        assert!(signer.verify("hello", &sig));
    }

    #[test]
    fn verify_rejects_mutated_message() {
        let signer = HmacSigner::new("test-secret").unwrap();
        let sig = signer.sign("hello");
        assert!(!signer.verify("hellp", &sig));
    }

    #[test]
    fn verify_rejects_signature_from_other_key() {
        let signer = HmacSigner::new("test-secret").unwrap();
        let other = HmacSigner::new("other-secret").unwrap();
        let sig = other.sign("hello");
        assert!(!signer.verify("hello", &sig));
    }

    #[test]
    fn verify_rejects_garbage_signature() {
        let signer = HmacSigner::new("test-secret").unwrap();
        assert!(!signer.verify("hello", "not-hex"));
        assert!(!signer.verify("hello", ""));
    }

    #[test]
    fn empty_secret_is_a_configuration_failure() {
        let err = HmacSigner::new("").unwrap_err();
        assert!(matches!(err, TicketError::SigningKeyMissing));
    }
}
