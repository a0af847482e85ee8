//! Signature algorithms and the keys they operate on.

// crates.io
use hmac::{Hmac, Mac};
use p256::ecdsa::{
	Signature as EcdsaSignature,
	signature::{Signer as _, Verifier as _},
};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, httpsig::SignatureError};

/// Supported signature algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
	/// RSASSA-PKCS1-v1_5 over SHA-1.
	RsaSha1,
	/// RSASSA-PKCS1-v1_5 over SHA-256.
	RsaSha256,
	/// HMAC with SHA-256.
	HmacSha256,
	/// ECDSA P-256 over SHA-256; signatures are ASN.1 DER `SEQUENCE(r, s)`.
	EcdsaSha256,
}
impl Algorithm {
	/// Returns the wire tag.
	pub const fn as_str(self) -> &'static str {
		match self {
			Algorithm::RsaSha1 => "rsa-sha1",
			Algorithm::RsaSha256 => "rsa-sha256",
			Algorithm::HmacSha256 => "hmac-sha256",
			Algorithm::EcdsaSha256 => "ecdsa-sha256",
		}
	}

	/// Signs `data` with `key`.
	pub fn sign(self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, SignatureError> {
		match (self, key) {
			(Algorithm::RsaSha1, SigningKey::Rsa(key)) => key
				.sign(Pkcs1v15Sign::new::<Sha1>(), &Sha1::digest(data))
				.map_err(|e| SignatureError::Signing(e.to_string())),
			(Algorithm::RsaSha256, SigningKey::Rsa(key)) => key
				.sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(data))
				.map_err(|e| SignatureError::Signing(e.to_string())),
			(Algorithm::HmacSha256, SigningKey::Hmac(secret)) =>
				Ok(hmac_sha256(secret)?.chain_update(data).finalize().into_bytes().to_vec()),
			(Algorithm::EcdsaSha256, SigningKey::Ecdsa(key)) => {
				let signature: EcdsaSignature = key.sign(data);

				Ok(signature.to_der().as_bytes().to_vec())
			},
			(algorithm, _) => Err(SignatureError::KeyMismatch(algorithm.as_str())),
		}
	}

	/// Verifies `signature` over `data` with `key`.
	pub fn verify(
		self,
		key: &VerifyingKey,
		data: &[u8],
		signature: &[u8],
	) -> Result<(), SignatureError> {
		match (self, key) {
			(Algorithm::RsaSha1, VerifyingKey::Rsa(key)) => key
				.verify(Pkcs1v15Sign::new::<Sha1>(), &Sha1::digest(data), signature)
				.map_err(|_| SignatureError::Mismatch),
			(Algorithm::RsaSha256, VerifyingKey::Rsa(key)) => key
				.verify(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(data), signature)
				.map_err(|_| SignatureError::Mismatch),
			(Algorithm::HmacSha256, VerifyingKey::Hmac(secret)) => hmac_sha256(secret)?
				.chain_update(data)
				.verify_slice(signature)
				.map_err(|_| SignatureError::Mismatch),
			(Algorithm::EcdsaSha256, VerifyingKey::Ecdsa(key)) => {
				let signature =
					EcdsaSignature::from_der(signature).map_err(|_| SignatureError::Mismatch)?;

				key.verify(data, &signature).map_err(|_| SignatureError::Mismatch)
			},
			(algorithm, _) => Err(SignatureError::KeyMismatch(algorithm.as_str())),
		}
	}
}
impl Display for Algorithm {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Algorithm {
	type Err = SignatureError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"rsa-sha1" => Ok(Algorithm::RsaSha1),
			"rsa-sha256" => Ok(Algorithm::RsaSha256),
			"hmac-sha256" => Ok(Algorithm::HmacSha256),
			"ecdsa-sha256" => Ok(Algorithm::EcdsaSha256),
			_ => Err(SignatureError::UnsupportedAlgorithm(s.to_owned())),
		}
	}
}

/// Private key material used by [`Algorithm::sign`].
#[derive(Clone)]
pub enum SigningKey {
	/// RSA private key.
	Rsa(RsaPrivateKey),
	/// P-256 private key.
	Ecdsa(p256::ecdsa::SigningKey),
	/// Shared HMAC secret.
	Hmac(Vec<u8>),
}
impl SigningKey {
	/// Derives the matching verification key.
	pub fn verifying_key(&self) -> VerifyingKey {
		match self {
			SigningKey::Rsa(key) => VerifyingKey::Rsa(key.to_public_key()),
			SigningKey::Ecdsa(key) => VerifyingKey::Ecdsa(p256::ecdsa::VerifyingKey::from(key)),
			SigningKey::Hmac(secret) => VerifyingKey::Hmac(secret.clone()),
		}
	}
}
impl Debug for SigningKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			SigningKey::Rsa(_) => f.write_str("SigningKey::Rsa(<redacted>)"),
			SigningKey::Ecdsa(_) => f.write_str("SigningKey::Ecdsa(<redacted>)"),
			SigningKey::Hmac(_) => f.write_str("SigningKey::Hmac(<redacted>)"),
		}
	}
}

/// Public key material used by [`Algorithm::verify`].
#[derive(Clone, PartialEq, Eq)]
pub enum VerifyingKey {
	/// RSA public key.
	Rsa(RsaPublicKey),
	/// P-256 public key.
	Ecdsa(p256::ecdsa::VerifyingKey),
	/// Shared HMAC secret.
	Hmac(Vec<u8>),
}
impl Debug for VerifyingKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			VerifyingKey::Rsa(key) => f.debug_tuple("VerifyingKey::Rsa").field(key).finish(),
			VerifyingKey::Ecdsa(key) => f.debug_tuple("VerifyingKey::Ecdsa").field(key).finish(),
			VerifyingKey::Hmac(_) => f.write_str("VerifyingKey::Hmac(<redacted>)"),
		}
	}
}

fn hmac_sha256(secret: &[u8]) -> Result<Hmac<Sha256>, SignatureError> {
	<Hmac<Sha256> as Mac>::new_from_slice(secret)
		.map_err(|_| SignatureError::InvalidKey("HMAC secret has an invalid length".into()))
}
