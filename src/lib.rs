//! Azure Communication Services client - HMAC and bearer request signing, single-flight token
//! caching, and a composable policy pipeline shared by the identity and chat clients.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod chat;
pub mod client;
pub mod clock;
pub mod connection_string;
pub mod credential;
pub mod error;
pub mod http;
pub mod identity;
pub mod obs;
pub mod pipeline;
pub mod sign;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use futures::{FutureExt, channel::oneshot, future::Shared};
	// self
	#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
	use crate::{
		auth::{AccessToken, TokenRequestContext},
		clock::{Clock, ManualClock},
		credential::{CredentialFuture, TokenCredential},
		http::{Request, Response, Transport, TransportFuture},
		pipeline::{Sleep, SleepFuture},
	};

	/// Base64 encoding of `acs-golden-signing-key-0123456789`, shared by signing fixtures.
	pub const TEST_ACCESS_KEY: &str = "YWNzLWdvbGRlbi1zaWduaW5nLWtleS0wMTIzNDU2Nzg5";

	/// Fixed instant used by signing and cache fixtures (`Mon, 02 Jan 2023 03:04:05 GMT`).
	pub fn test_instant() -> OffsetDateTime {
		time::macros::datetime!(2023-01-02 03:04:05 UTC)
	}

	/// Builds a [`ManualClock`] pinned to [`test_instant`].
	pub fn test_clock() -> Arc<ManualClock> {
		Arc::new(ManualClock::new(test_instant()))
	}

	/// Scripted [`TokenCredential`] that counts calls and replays queued outcomes.
	///
	/// Once the script is exhausted it keeps minting tokens valid for `lifetime` past the clock.
	#[derive(Debug)]
	pub struct ScriptedCredential {
		clock: Arc<ManualClock>,
		lifetime: Duration,
		script: Mutex<Vec<Result<(), String>>>,
		calls: AtomicUsize,
		gate: Mutex<Option<Shared<oneshot::Receiver<()>>>>,
	}
	impl ScriptedCredential {
		/// Creates a credential minting tokens valid for `lifetime` from the clock's instant.
		pub fn new(clock: Arc<ManualClock>, lifetime: Duration) -> Self {
			Self {
				clock,
				lifetime,
				script: Default::default(),
				calls: AtomicUsize::new(0),
				gate: Default::default(),
			}
		}

		/// Queues a failure for the next call.
		pub fn fail_next(&self, message: impl Into<String>) {
			self.script.lock().push(Err(message.into()));
		}

		/// Makes later fetches wait until the returned sender fires (or is dropped).
		pub fn arm_gate(&self) -> oneshot::Sender<()> {
			let (open, gate) = oneshot::channel();

			*self.gate.lock() = Some(gate.shared());

			open
		}

		/// Number of provider invocations so far.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl TokenCredential for ScriptedCredential {
		fn get_token<'a>(&'a self, _context: &'a TokenRequestContext) -> CredentialFuture<'a> {
			Box::pin(async move {
				let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
				let gate = self.gate.lock().clone();

				if let Some(gate) = gate {
					let _ = gate.await;
				}

				let scripted = {
					let mut script = self.script.lock();

					if script.is_empty() { Ok(()) } else { script.remove(0) }
				};

				match scripted {
					Ok(()) => Ok(AccessToken::new(
						format!("token-{call}"),
						self.clock.now() + self.lifetime,
					)),
					Err(message) =>
						Err(Error::MalformedCredential { reason: message, source: None }),
				}
			})
		}
	}

	/// In-process [`Transport`] that records requests and replays canned responses.
	#[derive(Debug, Default)]
	pub struct RecordingTransport {
		responses: Mutex<Vec<Response>>,
		requests: Mutex<Vec<Request>>,
	}
	impl RecordingTransport {
		/// Queues a response; unqueued calls answer `200` with an empty body.
		pub fn respond(&self, status: u16, body: &str) {
			self.respond_with(Response::new(
				StatusCode::from_u16(status).expect("Status fixture should be valid."),
				body.as_bytes().to_vec(),
			));
		}

		/// Queues a fully built response, headers included.
		pub fn respond_with(&self, response: Response) {
			self.responses.lock().push(response);
		}

		/// Returns every request the transport has seen.
		pub fn requests(&self) -> Vec<Request> {
			self.requests.lock().clone()
		}
	}
	impl Transport for RecordingTransport {
		fn send(&self, request: Request) -> TransportFuture<'_> {
			Box::pin(async move {
				self.requests.lock().push(request);

				let mut responses = self.responses.lock();

				Ok(if responses.is_empty() {
					Response::new(StatusCode::OK, Vec::new())
				} else {
					responses.remove(0)
				})
			})
		}
	}

	/// [`Sleep`] that returns immediately, recording each delay and optionally advancing a clock
	/// by it.
	#[derive(Debug, Default)]
	pub struct RecordingSleep {
		sleeps: Mutex<Vec<Duration>>,
		clock: Option<Arc<ManualClock>>,
	}
	impl RecordingSleep {
		/// Creates a sleep that moves `clock` forward by every requested delay.
		pub fn advancing(clock: Arc<ManualClock>) -> Self {
			Self { sleeps: Default::default(), clock: Some(clock) }
		}

		/// Delays requested so far, in order.
		pub fn sleeps(&self) -> Vec<Duration> {
			self.sleeps.lock().clone()
		}
	}
	impl Sleep for RecordingSleep {
		fn sleep(&self, duration: Duration) -> SleepFuture {
			self.sleeps.lock().push(duration);

			if let Some(clock) = &self.clock {
				clock.advance(duration);
			}

			Box::pin(async {})
		}
	}

	/// [`ReqwestTransport`] that downgrades `https` URLs to `http`, so TLS-only clients can talk to
	/// a local mock server.
	#[cfg(feature = "reqwest")]
	#[derive(Clone, Debug)]
	pub struct PlaintextTransport(pub ReqwestTransport);
	#[cfg(feature = "reqwest")]
	impl Transport for PlaintextTransport {
		fn send(&self, mut request: Request) -> TransportFuture<'_> {
			let _ = request.url.set_scheme("http");

			self.0.send(request)
		}
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use ::http::{Method, StatusCode};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
