use secp256k1::schnorr::Signature;
use secp256k1::{Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey};

use crate::error::ModelError;

/// A Schnorr keypair used to sign probe events (NIP-66 writability checks).
#[derive(Clone)]
pub struct Keys {
    keypair: Keypair,
}

impl Keys {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, _) = secp.generate_keypair(&mut rand::thread_rng());
        Self {
            keypair: Keypair::from_secret_key(&secp, &secret_key),
        }
    }

    /// Load a keypair from a 32-byte hex-encoded secret key.
    pub fn from_secret_hex(sk_hex: &str) -> Result<Self, ModelError> {
        let bytes = hex::decode(sk_hex).map_err(|source| ModelError::InvalidHex {
            field: "secret_key",
            source,
        })?;
        let secret_key = SecretKey::from_slice(&bytes)?;
        let secp = Secp256k1::new();
        Ok(Self {
            keypair: Keypair::from_secret_key(&secp, &secret_key),
        })
    }

    /// Hex-encoded x-only public key (the Nostr `pubkey` field).
    pub fn public_key_hex(&self) -> String {
        let (xonly, _parity) = self.keypair.x_only_public_key();
        hex::encode(xonly.serialize())
    }

    /// Sign a 32-byte digest with BIP-340 Schnorr, no auxiliary randomness (deterministic,
    /// matching `coincurve.PrivateKey.sign_schnorr` in the original implementation).
    pub fn sign_schnorr(&self, digest: &[u8; 32]) -> Signature {
        let secp = Secp256k1::new();
        let msg = Message::from_digest(*digest);
        secp.sign_schnorr_no_aux_rand(&msg, &self.keypair)
    }
}

/// Verify a BIP-340 Schnorr signature of `id_hex` by `pubkey_hex`.
pub fn verify_schnorr(sig_hex: &str, id_hex: &str, pubkey_hex: &str) -> Result<bool, ModelError> {
    let sig_bytes = hex::decode(sig_hex).map_err(|source| ModelError::InvalidHex {
        field: "sig",
        source,
    })?;
    let id_bytes = hex::decode(id_hex).map_err(|source| ModelError::InvalidHex {
        field: "id",
        source,
    })?;
    let pubkey_bytes = hex::decode(pubkey_hex).map_err(|source| ModelError::InvalidHex {
        field: "pubkey",
        source,
    })?;

    let sig = Signature::from_slice(&sig_bytes)?;
    let xonly = XOnlyPublicKey::from_slice(&pubkey_bytes)?;
    let digest: [u8; 32] = id_bytes
        .try_into()
        .map_err(|_| secp256k1::Error::InvalidMessage)?;
    let msg = Message::from_digest(digest);

    let secp = Secp256k1::new();
    Ok(secp.verify_schnorr(&sig, &msg, &xonly).is_ok())
}
