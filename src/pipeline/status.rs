//! Converts non-success responses into typed errors.

// self
use crate::{
	_prelude::*,
	error::HttpError,
	http::Request,
	pipeline::{Next, Policy, PolicyFuture},
};

/// Outermost policy: any status outside `2xx` becomes [`Error::Http`].
///
/// Sitting outside the retry policy means retries see raw responses and only the final one is
/// classified.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatusPolicy;
impl Policy for StatusPolicy {
	fn name(&self) -> &'static str {
		"status"
	}

	fn process<'a>(&'a self, request: Request, next: Next<'a>) -> PolicyFuture<'a> {
		Box::pin(async move {
			let response = next.run(request).await?;

			if response.status.is_success() {
				Ok(response)
			} else {
				Err(HttpError::new(response.status, &response.body).into())
			}
		})
	}
}
