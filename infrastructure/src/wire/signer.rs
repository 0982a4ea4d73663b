//! HMAC message signing

use super::error::WireError;
use hmac::{Hmac, Mac};
use nbkernel_domain::ConnectionInfo;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The only scheme kernels are launched with in practice.
pub const HMAC_SHA256: &str = "hmac-sha256";

/// Signs and verifies the four JSON frames of a message.
///
/// An empty key disables signing: signatures are empty and any received
/// signature is accepted.
#[derive(Clone)]
pub struct MessageSigner {
    mac: Option<HmacSha256>,
}

impl MessageSigner {
    pub fn new(scheme: &str, key: &str) -> Result<Self, WireError> {
        if key.is_empty() {
            return Ok(Self::unsigned());
        }
        if scheme != HMAC_SHA256 {
            return Err(WireError::UnsupportedScheme(scheme.to_string()));
        }
        let mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|_| WireError::UnsupportedScheme(scheme.to_string()))?;
        Ok(Self { mac: Some(mac) })
    }

    pub fn unsigned() -> Self {
        Self { mac: None }
    }

    pub fn from_info(info: &ConnectionInfo) -> Result<Self, WireError> {
        Self::new(&info.signature_scheme, &info.key)
    }

    pub fn is_enabled(&self) -> bool {
        self.mac.is_some()
    }

    /// Hex digest over `parts`, in order.
    pub fn sign(&self, parts: &[&[u8]]) -> String {
        match &self.mac {
            None => String::new(),
            Some(mac) => {
                let mut mac = mac.clone();
                for part in parts {
                    mac.update(part);
                }
                hex::encode(mac.finalize().into_bytes())
            }
        }
    }

    /// Constant-time check of a hex `signature` over `parts`.
    pub fn verify(&self, signature: &[u8], parts: &[&[u8]]) -> Result<(), WireError> {
        let Some(mac) = &self.mac else {
            return Ok(());
        };
        let expected = hex::decode(signature).map_err(|_| WireError::BadSignature)?;
        let mut mac = mac.clone();
        for part in parts {
            mac.update(part);
        }
        mac.verify_slice(&expected)
            .map_err(|_| WireError::BadSignature)
    }
}

impl std::fmt::Debug for MessageSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSigner")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_hmac_sha256_vector() {
        let signer = MessageSigner::new(HMAC_SHA256, "key").unwrap();
        let signature = signer.sign(&[&b"The quick brown fox "[..], &b"jumps over the lazy dog"[..]]);
        assert_eq!(
            signature,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn verify_rejects_tampered_parts() {
        let signer = MessageSigner::new(HMAC_SHA256, "secret").unwrap();
        let parts: [&[u8]; 2] = [b"{}", b"{\"a\":1}"];
        let tampered: [&[u8]; 2] = [b"{}", b"{\"a\":2}"];
        let signature = signer.sign(&parts);
        assert!(signer.verify(signature.as_bytes(), &parts).is_ok());
        assert!(matches!(
            signer.verify(signature.as_bytes(), &tampered),
            Err(WireError::BadSignature)
        ));
        assert!(matches!(
            signer.verify(b"not-hex", &parts),
            Err(WireError::BadSignature)
        ));
    }

    #[test]
    fn empty_key_disables_signing() {
        let signer = MessageSigner::new("", "").unwrap();
        assert!(!signer.is_enabled());
        let parts: [&[u8]; 1] = [b"anything"];
        assert_eq!(signer.sign(&parts), "");
        assert!(signer.verify(b"garbage", &parts).is_ok());
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let err = MessageSigner::new("hmac-md5", "key").unwrap_err();
        assert!(matches!(err, WireError::UnsupportedScheme(s) if s == "hmac-md5"));
    }
}
