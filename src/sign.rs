//! HMAC-SHA256 request signing for access-key authentication.
//!
//! The string to sign is `METHOD\nTARGET\nDATE;HOST;CONTENT_HASH`, where the target is the path
//! plus the already-encoded query, the date is RFC 1123 in GMT, and the content hash is the base64
//! SHA-256 digest of the body (empty bodies hash the empty byte string).

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use time::{UtcOffset, format_description::BorrowedFormatItem, macros::format_description};
// self
use crate::_prelude::*;

/// Header carrying the base64 SHA-256 digest of the body.
pub const CONTENT_HASH_HEADER: &str = "x-ms-content-sha256";
/// Header carrying the signing timestamp.
pub const DATE_HEADER: &str = "x-ms-date";
/// Headers covered by the signature, in signing order.
pub const SIGNED_HEADERS: &str = "x-ms-date;host;x-ms-content-sha256";

pub(crate) const RFC1123: &[BorrowedFormatItem<'static>] = format_description!(
	"[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Authentication headers produced for one request attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedHeaders {
	/// Value for [`CONTENT_HASH_HEADER`].
	pub content_hash: String,
	/// Value for [`DATE_HEADER`].
	pub date: String,
	/// Value for `Authorization`.
	pub authorization: String,
}
impl SignedHeaders {
	/// Header name/value pairs in the order they are attached.
	pub fn pairs(&self) -> [(&'static str, &str); 3] {
		[
			(CONTENT_HASH_HEADER, &self.content_hash),
			(DATE_HEADER, &self.date),
			("authorization", &self.authorization),
		]
	}

	/// Raw signature extracted from the `Authorization` value.
	pub fn signature(&self) -> &str {
		self.authorization.rsplit_once("Signature=").map(|(_, sig)| sig).unwrap_or_default()
	}
}

/// Signs a request.
///
/// `target` is normalized with [`request_target`]; `host` must include a non-default port.
pub fn sign(
	key: &[u8],
	method: &Method,
	target: &str,
	host: &str,
	body: Option<&[u8]>,
	now: OffsetDateTime,
) -> Result<SignedHeaders> {
	let content_hash = content_hash(body);
	let date = format_date(now)?;
	let string_to_sign =
		format!("{}\n{}\n{date};{host};{content_hash}", method.as_str(), request_target(target));
	let mut mac = <Hmac<Sha256>>::new_from_slice(key)
		.map_err(|e| Error::SigningFailed { reason: e.to_string() })?;

	mac.update(string_to_sign.as_bytes());

	let signature = STANDARD.encode(mac.finalize().into_bytes());

	Ok(SignedHeaders {
		content_hash,
		date,
		authorization: format!("HMAC-SHA256 SignedHeaders={SIGNED_HEADERS}&Signature={signature}"),
	})
}

/// Signs a request addressed by `url`, deriving the target and host from it.
pub fn sign_url(
	key: &[u8],
	method: &Method,
	url: &Url,
	body: Option<&[u8]>,
	now: OffsetDateTime,
) -> Result<SignedHeaders> {
	sign(key, method, &url_target(url), &url_host(url)?, body, now)
}

/// Base64 SHA-256 digest of `body`; `None` hashes the empty byte string.
pub fn content_hash(body: Option<&[u8]>) -> String {
	STANDARD.encode(Sha256::digest(body.unwrap_or_default()))
}

/// Formats `now` as an RFC 1123 GMT timestamp with whole seconds.
pub fn format_date(now: OffsetDateTime) -> Result<String> {
	now.to_offset(UtcOffset::UTC)
		.format(RFC1123)
		.map_err(|e| Error::SigningFailed { reason: e.to_string() })
}

/// Normalizes a path-and-query: empty becomes `/`, a missing leading slash is prepended.
pub fn request_target(path_and_query: &str) -> String {
	if path_and_query.starts_with('/') {
		path_and_query.into()
	} else {
		format!("/{path_and_query}")
	}
}

/// Path plus the already-encoded query of `url`.
pub fn url_target(url: &Url) -> String {
	match url.query() {
		Some(query) => format!("{}?{query}", url.path()),
		None => url.path().into(),
	}
}

/// Authority used in the string to sign: host plus the port when it is not the scheme default.
pub fn url_host(url: &Url) -> Result<String> {
	let host = url
		.host_str()
		.ok_or_else(|| Error::SigningFailed { reason: format!("URL `{url}` has no host") })?;

	Ok(match url.port() {
		Some(port) => format!("{host}:{port}"),
		None => host.into(),
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{TEST_ACCESS_KEY, test_instant},
		credential::KeyCredential,
	};

	const HOST: &str = "contoso.communication.azure.com";
	const TARGET: &str = "/identities?api-version=2022-06-01";

	fn key() -> Arc<[u8]> {
		KeyCredential::from_base64(TEST_ACCESS_KEY).expect("Fixture key should decode.").bytes()
	}

	#[test]
	fn golden_vector_empty_body() {
		let headers = sign(&key(), &Method::POST, TARGET, HOST, None, test_instant())
			.expect("Signing should succeed.");

		assert_eq!(headers.date, "Mon, 02 Jan 2023 03:04:05 GMT");
		assert_eq!(headers.content_hash, "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
		assert_eq!(
			headers.authorization,
			"HMAC-SHA256 SignedHeaders=x-ms-date;host;x-ms-content-sha256&Signature=8CTZs9TzSgOri1mFl/EC0fLMomjC6Ep8deF45y5Ya7E="
		);
	}

	#[test]
	fn golden_vector_body_and_port() {
		let url = Url::parse(&format!("https://{HOST}:8443{TARGET}")).expect("URL should parse.");
		let headers = sign_url(
			&key(),
			&Method::POST,
			&url,
			Some(br#"{"createTokenWithScopes":["chat"]}"#),
			test_instant(),
		)
		.expect("Signing should succeed.");

		assert_eq!(headers.content_hash, "WTRvgEjjVd+bvyKw3WgXgDkU81aV8FWq+4/BE+he0+A=");
		assert_eq!(headers.signature(), "rnu86A/hDTVRuJ6UVPOjQiEIEY0wTw4H2zHr+vfgoig=");
	}

	#[test]
	fn signing_is_deterministic_and_32_bytes() {
		let lhs = sign(&key(), &Method::GET, TARGET, HOST, Some(b"x"), test_instant())
			.expect("Signing should succeed.");
		let rhs = sign(&key(), &Method::GET, TARGET, HOST, Some(b"x"), test_instant())
			.expect("Signing should succeed.");
		let later = sign(
			&key(),
			&Method::GET,
			TARGET,
			HOST,
			Some(b"x"),
			test_instant() + Duration::seconds(1),
		)
		.expect("Signing should succeed.");

		assert_eq!(lhs, rhs);
		assert_ne!(lhs.signature(), later.signature());
		assert_eq!(
			STANDARD.decode(lhs.signature()).expect("Signature should be base64.").len(),
			32
		);
	}

	#[test]
	fn targets_and_hosts_normalize() {
		assert_eq!(request_target(""), "/");
		assert_eq!(request_target("identities"), "/identities");
		assert_eq!(request_target("/identities"), "/identities");

		let default_port =
			Url::parse("https://contoso.example:443/a?b=c%20d").expect("URL should parse.");

		assert_eq!(url_target(&default_port), "/a?b=c%20d");
		assert_eq!(url_host(&default_port).expect("URL has a host."), "contoso.example");

		let custom_port = Url::parse("http://localhost:8080").expect("URL should parse.");

		assert_eq!(url_target(&custom_port), "/");
		assert_eq!(url_host(&custom_port).expect("URL has a host."), "localhost:8080");
	}

	#[test]
	fn non_utc_instants_format_as_gmt() {
		let shifted = test_instant().to_offset(time::macros::offset!(+8));

		assert_eq!(
			format_date(shifted).expect("Date should format."),
			"Mon, 02 Jan 2023 03:04:05 GMT"
		);
	}
}
