//! Inbound receiver for results the service pushes to a callback URL.
//!
//! Requests pass through three layers, outermost first:
//!
//! 1. signature verification (optional): any failure answers `400`, or `401` when the signature
//!    arrived in `Authorization`;
//! 2. decoding: a body that is not a JSON result is acknowledged with `200` and dropped;
//! 3. the result handler: `200` once it returns, `500` if it panics.

// std
use std::{net::SocketAddr, panic::AssertUnwindSafe};
// crates.io
use axum::{
	Router,
	body::{Body, Bytes, to_bytes},
	extract::{Request, State},
	http::StatusCode,
	middleware::{self, Next},
	response::{IntoResponse, Response},
	routing::post,
};
use futures_util::FutureExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	error::TransportError,
	httpsig::{self, SignaturePlacement, Verifier},
	model::QueryResult,
	poller::ResultHandler,
	transport::CallContext,
};

/// Default listen address for the callback receiver.
pub const DEFAULT_CALLBACK_LISTEN: &str = ":8080";

const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Expands a bare `:port` into an all-interfaces address.
pub fn normalize_listen_addr(raw: &str) -> String {
	match raw.trim() {
		addr if addr.starts_with(':') => format!("0.0.0.0{addr}"),
		addr => addr.to_owned(),
	}
}

/// Bound callback endpoint, ready to serve.
pub struct CallbackReceiver {
	listener: TcpListener,
	path: String,
	handler: Arc<dyn ResultHandler>,
	verifier: Option<Arc<Verifier>>,
}
impl CallbackReceiver {
	/// Binds `listen` and routes `POST <path>` to `handler`.
	pub async fn bind(listen: &str, path: &str, handler: Arc<dyn ResultHandler>) -> Result<Self> {
		let addr = normalize_listen_addr(listen);
		let listener = TcpListener::bind(&addr).await.map_err(TransportError::Io)?;
		let path = if path.starts_with('/') { path.to_owned() } else { format!("/{path}") };

		tracing::info!(%addr, %path, "Listening for callbacks.");

		Ok(Self { listener, path, handler, verifier: None })
	}

	/// Requires valid HTTP signatures on every callback.
	pub fn with_verifier(mut self, verifier: Arc<Verifier>) -> Self {
		self.verifier = Some(verifier);

		self
	}

	/// Address the listener is bound to.
	pub fn local_addr(&self) -> Result<SocketAddr> {
		self.listener.local_addr().map_err(|e| TransportError::Io(e).into())
	}

	/// Builds the router without binding, for callers that serve it themselves.
	pub fn router(
		path: &str,
		handler: Arc<dyn ResultHandler>,
		verifier: Option<Arc<Verifier>>,
	) -> Router {
		let router = Router::new().route(path, post(receive)).with_state(handler);

		match verifier {
			Some(verifier) =>
				router.layer(middleware::from_fn_with_state(verifier, verify_signature)),
			None => router,
		}
	}

	/// Serves until `cancel` fires, then drains in-flight requests.
	pub async fn serve(self, cancel: CancellationToken) -> Result<()> {
		let app = Self::router(&self.path, self.handler, self.verifier);

		axum::serve(self.listener, app)
			.with_graceful_shutdown(async move { cancel.cancelled().await })
			.await
			.map_err(TransportError::Io)?;

		Ok(())
	}
}
impl Debug for CallbackReceiver {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallbackReceiver")
			.field("addr", &self.listener.local_addr().ok())
			.field("path", &self.path)
			.field("verified", &self.verifier.is_some())
			.finish()
	}
}

async fn verify_signature(
	State(verifier): State<Arc<Verifier>>,
	request: Request,
	next: Next,
) -> Response {
	let (parts, body) = request.into_parts();
	let rejection = match httpsig::locate(&parts.headers) {
		Some((SignaturePlacement::Authorization, _)) => StatusCode::UNAUTHORIZED,
		_ => StatusCode::BAD_REQUEST,
	};
	let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
		Ok(bytes) => bytes,
		Err(e) => {
			tracing::warn!(error = %e, "Unable to read callback body.");

			return rejection.into_response();
		},
	};

	if let Err(e) = verifier.verify(&parts.method, &parts.uri, &parts.headers, &bytes).await {
		tracing::warn!(error = %e, "Rejected callback with an invalid signature.");

		return rejection.into_response();
	}

	next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn receive(State(handler): State<Arc<dyn ResultHandler>>, body: Bytes) -> StatusCode {
	let result = match serde_json::from_slice::<QueryResult>(&body) {
		Ok(result) => result,
		Err(e) => {
			tracing::debug!(error = %e, "Dropping callback body that is not a result.");

			return StatusCode::OK;
		},
	};
	let ctx = CallContext::default();

	match AssertUnwindSafe(handler.handle(&ctx, result)).catch_unwind().await {
		Ok(_) => StatusCode::OK,
		Err(_) => {
			tracing::error!("Callback handler panicked.");

			StatusCode::INTERNAL_SERVER_ERROR
		},
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn bare_port_listens_everywhere() {
		assert_eq!(normalize_listen_addr(":8080"), "0.0.0.0:8080");
		assert_eq!(normalize_listen_addr("127.0.0.1:9"), "127.0.0.1:9");
	}
}
