//! JSON Web Keys and the getters that resolve a signature's `keyId`.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::{EncodedPoint, FieldBytes};
use rsa::{BigUint, RsaPublicKey, traits::PublicKeyParts};
// self
use crate::{
	_prelude::*,
	httpsig::{Algorithm, SignatureError, VerifyingKey},
	store::KeyCache,
};

/// Future returned by [`KeyGetter::get`].
pub type KeyFuture<'a> =
	Pin<Box<dyn Future<Output = Result<VerifyingKey, SignatureError>> + 'a + Send>>;

/// One JSON Web Key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
	/// Key type (`RSA`, `EC`, `oct`).
	pub kty: String,
	/// Key identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kid: Option<String>,
	/// Intended use (`sig`, `enc`).
	#[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
	pub key_use: Option<String>,
	/// Algorithm hint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub alg: Option<String>,
	/// RSA modulus.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub n: Option<String>,
	/// RSA public exponent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub e: Option<String>,
	/// EC curve.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub crv: Option<String>,
	/// EC x coordinate.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub x: Option<String>,
	/// EC y coordinate.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub y: Option<String>,
	/// Private exponent (RSA) or scalar (EC); never present on usable keys.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub d: Option<String>,
	/// Symmetric key bytes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub k: Option<String>,
}
impl Jwk {
	/// Builds the JWK for an RSA public key.
	pub fn from_rsa(key: &RsaPublicKey) -> Self {
		Self {
			kty: "RSA".into(),
			key_use: Some("sig".into()),
			n: Some(URL_SAFE_NO_PAD.encode(key.n().to_bytes_be())),
			e: Some(URL_SAFE_NO_PAD.encode(key.e().to_bytes_be())),
			..Default::default()
		}
	}

	/// Builds the JWK for a P-256 public key.
	pub fn from_p256(key: &p256::ecdsa::VerifyingKey) -> Self {
		let point = key.to_encoded_point(false);

		Self {
			kty: "EC".into(),
			key_use: Some("sig".into()),
			crv: Some("P-256".into()),
			x: point.x().map(|x| URL_SAFE_NO_PAD.encode(x)),
			y: point.y().map(|y| URL_SAFE_NO_PAD.encode(y)),
			..Default::default()
		}
	}

	/// Returns true for RSA or EC keys carrying only public parts.
	pub fn is_public(&self) -> bool {
		if self.d.is_some() {
			return false;
		}

		match self.kty.as_str() {
			"RSA" => self.n.is_some() && self.e.is_some(),
			"EC" => self.x.is_some() && self.y.is_some(),
			_ => false,
		}
	}

	/// Returns true when `use` is absent or `sig`.
	pub fn is_signing_key(&self) -> bool {
		self.key_use.as_deref().is_none_or(|value| value == "sig")
	}

	/// Decodes the public key.
	pub fn to_verifying_key(&self) -> Result<VerifyingKey, SignatureError> {
		match self.kty.as_str() {
			"RSA" => {
				let n = BigUint::from_bytes_be(&decode_member(self.n.as_deref(), "n")?);
				let e = BigUint::from_bytes_be(&decode_member(self.e.as_deref(), "e")?);
				let key = RsaPublicKey::new(n, e)
					.map_err(|e| SignatureError::InvalidKey(e.to_string()))?;

				Ok(VerifyingKey::Rsa(key))
			},
			"EC" => {
				if self.crv.as_deref() != Some("P-256") {
					return Err(SignatureError::InvalidKey(format!(
						"unsupported curve {}",
						self.crv.as_deref().unwrap_or("<none>")
					)));
				}

				let x = decode_member(self.x.as_deref(), "x")?;
				let y = decode_member(self.y.as_deref(), "y")?;

				if x.len() != 32 || y.len() != 32 {
					return Err(SignatureError::InvalidKey(
						"P-256 coordinates must be 32 bytes".into(),
					));
				}

				let point = EncodedPoint::from_affine_coordinates(
					FieldBytes::from_slice(&x),
					FieldBytes::from_slice(&y),
					false,
				);
				let key = p256::ecdsa::VerifyingKey::from_encoded_point(&point)
					.map_err(|e| SignatureError::InvalidKey(e.to_string()))?;

				Ok(VerifyingKey::Ecdsa(key))
			},
			other => Err(SignatureError::InvalidKey(format!("unsupported key type {other}"))),
		}
	}
}

/// A JSON Web Key set, as served at a signature's key ID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
	/// Member keys.
	#[serde(default)]
	pub keys: Vec<Jwk>,
}
impl JwkSet {
	/// Returns the first public signing key.
	pub fn first_signing_key(&self) -> Option<&Jwk> {
		self.keys.iter().find(|key| key.is_public() && key.is_signing_key())
	}
}

/// Resolves the verification key for a signature.
pub trait KeyGetter
where
	Self: Send + Sync,
{
	/// Returns the key for `key_id` suitable for `algorithm`.
	fn get<'a>(&'a self, key_id: &'a str, algorithm: Algorithm) -> KeyFuture<'a>;
}

/// Fetches JWK sets over HTTPS, treating the key ID as their URL.
///
/// Sets are read through an optional [`KeyCache`]; a miss triggers a live fetch whose result is
/// written back. HMAC signatures use the configured shared secret instead.
pub struct HttpKeyGetter {
	http: ReqwestClient,
	cache: Option<Arc<dyn KeyCache>>,
	hmac_secret: Option<Vec<u8>>,
}
impl HttpKeyGetter {
	/// Creates a getter without a cache.
	pub fn new(http: ReqwestClient) -> Self {
		Self { http, cache: None, hmac_secret: None }
	}

	/// Reads and writes key sets through `cache`.
	pub fn with_cache(mut self, cache: Arc<dyn KeyCache>) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Accepts `hmac-sha256` signatures made with `secret`.
	pub fn with_hmac_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
		self.hmac_secret = Some(secret.into());

		self
	}

	async fn key_set(&self, key_id: &str) -> Result<JwkSet, SignatureError> {
		if let Some(cache) = &self.cache {
			match cache.get(key_id).await {
				Ok(Some(set)) => return Ok(set),
				Ok(None) => {},
				Err(e) => tracing::warn!(key_id, error = %e, "Key cache read failed."),
			}
		}

		let url = Url::parse(key_id).map_err(|e| SignatureError::key_fetch(key_id, e))?;
		let set = self
			.http
			.get(url)
			.send()
			.await
			.and_then(|response| response.error_for_status())
			.map_err(|e| SignatureError::key_fetch(key_id, e))?
			.json::<JwkSet>()
			.await
			.map_err(|e| SignatureError::key_fetch(key_id, e))?;

		let written = match &self.cache {
			Some(cache) => cache.set(key_id, &set).await,
			None => Ok(()),
		};

		if let Err(e) = written {
			tracing::warn!(key_id, error = %e, "Key cache write failed.");
		}

		Ok(set)
	}
}
impl KeyGetter for HttpKeyGetter {
	fn get<'a>(&'a self, key_id: &'a str, algorithm: Algorithm) -> KeyFuture<'a> {
		Box::pin(async move {
			if algorithm == Algorithm::HmacSha256 {
				return self
					.hmac_secret
					.clone()
					.map(VerifyingKey::Hmac)
					.ok_or_else(|| SignatureError::NoUsableKey(key_id.to_owned()));
			}

			let set = self.key_set(key_id).await?;

			set.first_signing_key()
				.ok_or_else(|| SignatureError::NoUsableKey(key_id.to_owned()))?
				.to_verifying_key()
		})
	}
}
impl Debug for HttpKeyGetter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpKeyGetter")
			.field("cached", &self.cache.is_some())
			.field("hmac", &self.hmac_secret.is_some())
			.finish()
	}
}

/// Serves keys from a fixed map; unknown key IDs fail.
#[derive(Clone, Debug, Default)]
pub struct StaticKeyGetter {
	keys: HashMap<String, VerifyingKey>,
}
impl StaticKeyGetter {
	/// Registers `key` under `key_id`.
	pub fn with_key(mut self, key_id: impl Into<String>, key: VerifyingKey) -> Self {
		self.keys.insert(key_id.into(), key);

		self
	}
}
impl KeyGetter for StaticKeyGetter {
	fn get<'a>(&'a self, key_id: &'a str, _algorithm: Algorithm) -> KeyFuture<'a> {
		Box::pin(async move {
			self.keys
				.get(key_id)
				.cloned()
				.ok_or_else(|| SignatureError::NoUsableKey(key_id.to_owned()))
		})
	}
}

fn decode_member(value: Option<&str>, member: &str) -> Result<Vec<u8>, SignatureError> {
	let value =
		value.ok_or_else(|| SignatureError::InvalidKey(format!("missing member {member}")))?;

	URL_SAFE_NO_PAD
		.decode(value.trim_end_matches('='))
		.map_err(|_| SignatureError::InvalidKey(format!("member {member} is not base64url")))
}

#[cfg(test)]
mod tests {
	// crates.io
	use rand_core::OsRng;
	use rsa::RsaPrivateKey;
	// self
	use super::*;

	#[test]
	fn rsa_and_ec_jwks_round_trip() {
		let rsa = RsaPrivateKey::new(&mut OsRng, 1024).expect("RSA key generation should succeed.");
		let rsa_public = rsa.to_public_key();
		let jwk = Jwk::from_rsa(&rsa_public);

		assert!(jwk.is_public());
		assert_eq!(jwk.to_verifying_key().ok(), Some(VerifyingKey::Rsa(rsa_public)));

		let ec = p256::ecdsa::SigningKey::random(&mut OsRng);
		let ec_public = p256::ecdsa::VerifyingKey::from(&ec);
		let jwk = Jwk::from_p256(&ec_public);

		assert_eq!(jwk.to_verifying_key().ok(), Some(VerifyingKey::Ecdsa(ec_public)));
	}

	#[test]
	fn first_signing_key_skips_private_and_encryption_keys() {
		let public = Jwk {
			kty: "RSA".into(),
			n: Some("AQAB".into()),
			e: Some("AQAB".into()),
			..Default::default()
		};
		let private = Jwk { d: Some("AQAB".into()), ..public.clone() };
		let encryption = Jwk { key_use: Some("enc".into()), ..public.clone() };
		let usable = Jwk { kid: Some("good".into()), ..public };
		let set = JwkSet { keys: vec![private, encryption, usable] };

		assert_eq!(set.first_signing_key().and_then(|key| key.kid.as_deref()), Some("good"));
	}

	#[test]
	fn jwk_set_parses_standard_json() {
		let set: JwkSet = serde_json::from_str(
			r#"{"keys":[{"kty":"EC","use":"sig","crv":"P-256","x":"a","y":"b","kid":"1"}]}"#,
		)
		.expect("JWK set should parse.");

		assert_eq!(set.keys[0].key_use.as_deref(), Some("sig"));
		assert!(set.keys[0].is_public());
	}

	#[tokio::test]
	async fn static_getter_rejects_unknown_ids() {
		let getter = StaticKeyGetter::default().with_key("a", VerifyingKey::Hmac(b"k".to_vec()));

		assert!(getter.get("a", Algorithm::HmacSha256).await.is_ok());
		assert!(matches!(
			getter.get("b", Algorithm::HmacSha256).await,
			Err(SignatureError::NoUsableKey(_))
		));
	}
}
