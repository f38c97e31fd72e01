//! Shared access key used for HMAC request signing.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::_prelude::*;

/// Decoded access key.
///
/// The key is decoded once at construction so a malformed connection string fails fast instead
/// of on the first request. Clones share storage, so [`KeyCredential::rotate`] is visible to
/// every policy holding the credential.
#[derive(Clone)]
pub struct KeyCredential(Arc<RwLock<Arc<[u8]>>>);
impl KeyCredential {
	/// Decodes a base64 access key.
	pub fn from_base64(encoded: &str) -> Result<Self> {
		Ok(Self(Arc::new(RwLock::new(decode(encoded)?))))
	}

	/// Replaces the key in place, e.g. after the resource's keys were regenerated.
	pub fn rotate(&self, encoded: &str) -> Result<()> {
		let key = decode(encoded)?;

		*self.0.write() = key;

		Ok(())
	}

	/// Raw key bytes used as the HMAC key.
	pub fn bytes(&self) -> Arc<[u8]> {
		self.0.read().clone()
	}
}
impl Debug for KeyCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("KeyCredential").field(&"<redacted>").finish()
	}
}
impl FromStr for KeyCredential {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::from_base64(s)
	}
}

fn decode(encoded: &str) -> Result<Arc<[u8]>> {
	let bytes = STANDARD.decode(encoded.trim()).map_err(|e| Error::MalformedCredential {
		reason: "access key is not valid base64".into(),
		source: Some(e.into()),
	})?;

	if bytes.is_empty() {
		return Err(Error::MalformedCredential {
			reason: "access key is empty".into(),
			source: None,
		});
	}

	Ok(bytes.into())
}
