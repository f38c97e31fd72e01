//! Client-level error types shared across signing, token caching, the pipeline, and the service
//! clients.

// self
use crate::{_prelude::*, connection_string::ConnectionStringError};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Access key or user token could not be decoded.
	#[error("Credential is malformed: {reason}.")]
	MalformedCredential {
		/// Human-readable explanation.
		reason: String,
		/// Underlying decoding failure, when one exists.
		#[source]
		source: Option<BoxError>,
	},
	/// Bearer authentication was attempted against a plaintext endpoint.
	#[error("Bearer token authentication is not permitted for non-TLS endpoint `{url}`.")]
	TlsRequired {
		/// Offending request URL.
		url: String,
	},
	/// Paging link points outside the client's endpoint, so following it would leak credentials.
	#[error("Service returned next link `{link}` outside the client endpoint.")]
	UntrustedNextLink {
		/// Link as returned by the service.
		link: String,
	},
	/// The token credential failed to produce a usable token.
	///
	/// The cause is shared because a single refresh failure is observed by every caller that
	/// waited on it.
	#[error("Token acquisition failed.")]
	TokenAcquisitionFailed {
		/// Failure reported by the credential (or the cache's own validation).
		#[source]
		source: Arc<Error>,
	},
	/// Credential handed back a token that had already expired.
	#[error("Credential returned a token that expired at {expires_on}.")]
	TokenExpired {
		/// Expiry carried by the rejected token.
		expires_on: OffsetDateTime,
	},
	/// Header material could not be encoded; unreachable with valid inputs.
	#[error("Request signing failed: {reason}.")]
	SigningFailed {
		/// Human-readable explanation.
		reason: String,
	},
	/// Caller cancelled while waiting on a token refresh.
	#[error("Token request was cancelled by the caller.")]
	Cancelled,

	/// Service answered with a non-success status.
	#[error(transparent)]
	Http(#[from] HttpError),
	/// Connection string failed validation or lookup.
	#[error(transparent)]
	ConnectionString(#[from] ConnectionStringError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Service response body did not match the expected model.
	#[error("Service returned a malformed response body.")]
	ResponseParse {
		/// Structured parsing failure, including the offending field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: Option<u16>,
	},
}
impl Error {
	pub(crate) fn token_acquisition(cause: impl Into<Arc<Error>>) -> Self {
		Self::TokenAcquisitionFailed { source: cause.into() }
	}

	/// Returns the HTTP status carried by [`Error::Http`], if any.
	pub fn status(&self) -> Option<StatusCode> {
		match self {
			Self::Http(e) => Some(e.status),
			_ => None,
		}
	}
}

/// Non-success response classified by the pipeline.
///
/// When the body carries the service's `{"error":{"code":..,"message":..}}` envelope, the code and
/// message are lifted out; the raw body is always kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpError {
	/// HTTP status code.
	pub status: StatusCode,
	/// Service error code, when present.
	pub code: Option<String>,
	/// Service error message, when present.
	pub message: Option<String>,
	/// Raw response body (lossy UTF-8).
	pub body: String,
}
impl HttpError {
	/// Builds an error from a status and raw body, extracting the service error envelope.
	pub fn new(status: StatusCode, body: &[u8]) -> Self {
		#[derive(Deserialize)]
		struct Envelope {
			error: Detail,
		}
		#[derive(Deserialize)]
		struct Detail {
			code: Option<String>,
			message: Option<String>,
		}

		let (code, message) = match serde_json::from_slice::<Envelope>(body) {
			Ok(envelope) => (envelope.error.code, envelope.error.message),
			Err(_) => (None, None),
		};

		Self { status, code, message, body: String::from_utf8_lossy(body).into_owned() }
	}
}
impl Display for HttpError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Service responded with HTTP {}", self.status)?;

		if let Some(code) = &self.code {
			write!(f, " ({code})")?;
		}
		if let Some(message) = &self.message {
			write!(f, ": {}", message.trim_end_matches('.'))?;
		}

		f.write_str(".")
	}
}
impl StdError for HttpError {}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Endpoint cannot be parsed as an `http(s)` base URL.
	#[error("Endpoint `{endpoint}` is not a valid service URL.")]
	InvalidEndpoint {
		/// Raw endpoint string.
		endpoint: String,
		/// Underlying parsing failure, when parsing itself failed.
		#[source]
		source: Option<url::ParseError>,
	},
	/// A pipeline component has no default without the `reqwest` feature.
	#[error("No {component} configured; enable the `reqwest` feature or supply one.")]
	MissingComponent {
		/// Component name (`transport`, `sleep`).
		component: &'static str,
	},
	/// Header value contains bytes that HTTP forbids.
	#[error("Header `{name}` has an invalid value.")]
	InvalidHeader {
		/// Header name.
		name: String,
	},
	/// API version string is not one the client knows.
	#[error("API version `{version}` is not supported.")]
	UnsupportedApiVersion {
		/// Requested version string.
		version: String,
	},
	/// Timestamp cannot be rendered as RFC 3339.
	#[error("Timestamp cannot be formatted as RFC 3339.")]
	InvalidTimestamp(#[from] time::error::Format),
	/// Scopes requested for a token are invalid.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the service.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
