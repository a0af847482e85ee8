//! Body digests for the `Digest` header.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
// self
use crate::{_prelude::*, httpsig::SignatureError};

/// Name of the digest header.
pub const DIGEST_HEADER: &str = "digest";

/// Supported digest algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
	/// Adler-32 checksum, hex encoded.
	Adler32,
	/// CRC-32C checksum, hex encoded.
	Crc32c,
	/// MD5, base64url encoded.
	Md5,
	/// SHA-1, base64url encoded.
	Sha1,
	/// SHA-256, base64url encoded.
	Sha256,
	/// SHA-512, base64url encoded.
	Sha512,
}
impl DigestAlgorithm {
	/// Returns the header token.
	pub const fn as_str(self) -> &'static str {
		match self {
			DigestAlgorithm::Adler32 => "ADLER32",
			DigestAlgorithm::Crc32c => "CRC32c",
			DigestAlgorithm::Md5 => "MD5",
			DigestAlgorithm::Sha1 => "SHA",
			DigestAlgorithm::Sha256 => "SHA-256",
			DigestAlgorithm::Sha512 => "SHA-512",
		}
	}

	/// Encodes the digest of `body`.
	pub fn encode(self, body: &[u8]) -> String {
		match self {
			DigestAlgorithm::Adler32 => format!("{:08x}", adler::adler32_slice(body)),
			DigestAlgorithm::Crc32c => format!("{:08x}", crc32c::crc32c(body)),
			DigestAlgorithm::Md5 => URL_SAFE_NO_PAD.encode(Md5::digest(body)),
			DigestAlgorithm::Sha1 => URL_SAFE_NO_PAD.encode(Sha1::digest(body)),
			DigestAlgorithm::Sha256 => URL_SAFE_NO_PAD.encode(Sha256::digest(body)),
			DigestAlgorithm::Sha512 => URL_SAFE_NO_PAD.encode(Sha512::digest(body)),
		}
	}

	/// Renders `<ALGO>=<encoded>` for `body`.
	pub fn header_value(self, body: &[u8]) -> String {
		format!("{}={}", self.as_str(), self.encode(body))
	}
}
impl Display for DigestAlgorithm {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for DigestAlgorithm {
	type Err = SignatureError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"ADLER32" => Ok(DigestAlgorithm::Adler32),
			"CRC32C" => Ok(DigestAlgorithm::Crc32c),
			"MD5" => Ok(DigestAlgorithm::Md5),
			"SHA" => Ok(DigestAlgorithm::Sha1),
			"SHA-256" => Ok(DigestAlgorithm::Sha256),
			"SHA-512" => Ok(DigestAlgorithm::Sha512),
			_ => Err(SignatureError::UnsupportedDigest(s.to_owned())),
		}
	}
}

/// Checks `body` against the first supported entry of a `Digest` header value.
pub fn verify_header(value: &str, body: &[u8]) -> Result<(), SignatureError> {
	for entry in value.split(',') {
		let Some((name, expected)) = entry.trim().split_once('=') else {
			continue;
		};
		let Ok(algorithm) = name.trim().parse::<DigestAlgorithm>() else {
			continue;
		};

		return if algorithm.encode(body).as_bytes() == expected.trim().as_bytes() {
			Ok(())
		} else {
			Err(SignatureError::DigestMismatch)
		};
	}

	Err(SignatureError::UnsupportedDigest(value.to_owned()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const ALL: [DigestAlgorithm; 6] = [
		DigestAlgorithm::Adler32,
		DigestAlgorithm::Crc32c,
		DigestAlgorithm::Md5,
		DigestAlgorithm::Sha1,
		DigestAlgorithm::Sha256,
		DigestAlgorithm::Sha512,
	];

	#[test]
	fn every_algorithm_verifies_and_detects_flips() {
		let body = b"{\"url\":\"http://example.com\"}";
		let mut flipped = body.to_vec();

		flipped[3] ^= 0x01;

		for algorithm in ALL {
			let header = algorithm.header_value(body);

			verify_header(&header, body).expect("Digest should verify against its own body.");

			assert!(
				matches!(verify_header(&header, &flipped), Err(SignatureError::DigestMismatch)),
				"{algorithm} must detect a flipped byte."
			);
		}
	}

	#[test]
	fn known_vectors() {
		assert_eq!(DigestAlgorithm::Adler32.encode(b"Wikipedia"), "11e60398");
		assert_eq!(DigestAlgorithm::Crc32c.encode(b"123456789"), "e3069283");
		assert_eq!(
			DigestAlgorithm::Sha256.encode(b""),
			"47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU"
		);
	}

	#[test]
	fn unix_checksums_are_unsupported() {
		assert!(matches!(
			"UNIXsum".parse::<DigestAlgorithm>(),
			Err(SignatureError::UnsupportedDigest(_))
		));
		assert!(matches!(
			verify_header("UNIXcksum=1234", b"x"),
			Err(SignatureError::UnsupportedDigest(_))
		));
	}

	#[test]
	fn first_supported_entry_wins() {
		let body = b"payload";
		let sha512 = DigestAlgorithm::Sha512.header_value(body);
		let header = format!("UNIXsum=1, {sha512}, MD5=bogus");

		verify_header(&header, body).expect("SHA-512 entry should be used.");
	}
}
