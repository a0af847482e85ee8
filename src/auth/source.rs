//! Token source contracts plus the static, reuse, and timing layers.

// std
use std::time::Instant;
// self
use crate::{
	_prelude::*,
	auth::{IssuedToken, Token},
};

/// Future returned by token sources and flows.
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<IssuedToken>> + 'a + Send>>;

/// Hands out a usable token for outbound calls.
///
/// Transports share one source per process behind `Arc<dyn TokenSource>`. A transport built
/// without a source sends no `Authorization` header.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Returns a token that is valid right now.
	fn token(&self) -> TokenFuture<'_>;
}

/// Produces a fresh token, optionally building on the previously held one.
///
/// `previous` carries the last token the caller saw (possibly expired) so refresh-capable
/// flows can exchange its refresh token instead of starting over.
pub trait TokenFlow
where
	Self: Send + Sync,
{
	/// Obtains a token.
	fn fetch<'a>(&'a self, previous: Option<&'a IssuedToken>) -> TokenFuture<'a>;
}

/// Wraps a token supplied verbatim (`--access-token`); never refreshed or expired.
#[derive(Clone, Debug)]
pub struct StaticTokenSource(IssuedToken);
impl StaticTokenSource {
	/// Wraps the raw access token.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self(IssuedToken::new(Token::bearer(access_token)))
	}
}
impl TokenSource for StaticTokenSource {
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(async move { Ok(self.0.clone()) })
	}
}

/// Keeps the most recent token in memory and only consults the flow once it expires.
///
/// Reads take a shared lock; refreshes are serialized by an async singleflight guard so
/// concurrent callers piggy-back on one in-flight fetch.
pub struct ReuseTokenSource {
	flow: Arc<dyn TokenFlow>,
	current: RwLock<Option<IssuedToken>>,
	refresh_guard: AsyncMutex<()>,
}
impl ReuseTokenSource {
	/// Creates a reuse layer over `flow`.
	pub fn new(flow: Arc<dyn TokenFlow>) -> Self {
		Self { flow, current: RwLock::new(None), refresh_guard: AsyncMutex::new(()) }
	}

	/// Seeds the layer with a token obtained elsewhere.
	pub fn with_initial(self, token: IssuedToken) -> Self {
		*self.current.write() = Some(token);

		self
	}

	fn valid_current(&self) -> Option<IssuedToken> {
		self.current.read().as_ref().filter(|token| token.is_valid()).cloned()
	}
}
impl TokenSource for ReuseTokenSource {
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(async move {
			if let Some(token) = self.valid_current() {
				return Ok(token);
			}

			let _singleflight = self.refresh_guard.lock().await;

			if let Some(token) = self.valid_current() {
				return Ok(token);
			}

			let previous = self.current.read().clone();
			let fresh = self.flow.fetch(previous.as_ref()).await?;

			*self.current.write() = Some(fresh.clone());

			Ok(fresh)
		})
	}
}
impl Debug for ReuseTokenSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReuseTokenSource").field("current", &self.current.read()).finish()
	}
}

/// Logs the duration of every fetch made by the wrapped flow (`--debug`).
pub struct TimedTokenFlow {
	inner: Arc<dyn TokenFlow>,
	label: &'static str,
}
impl TimedTokenFlow {
	/// Wraps `inner`, tagging log lines with `label`.
	pub fn new(inner: Arc<dyn TokenFlow>, label: &'static str) -> Self {
		Self { inner, label }
	}
}
impl TokenFlow for TimedTokenFlow {
	fn fetch<'a>(&'a self, previous: Option<&'a IssuedToken>) -> TokenFuture<'a> {
		Box::pin(async move {
			let started = Instant::now();
			let result = self.inner.fetch(previous).await;
			let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

			tracing::debug!(flow = self.label, elapsed_ms, ok = result.is_ok(), "Fetched token.");

			result
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	#[derive(Default)]
	struct CountingFlow {
		calls: AtomicUsize,
		lifetime: Option<Duration>,
	}
	impl TokenFlow for CountingFlow {
		fn fetch<'a>(&'a self, previous: Option<&'a IssuedToken>) -> TokenFuture<'a> {
			Box::pin(async move {
				let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
				let mut token = Token::bearer(format!("token-{n}"));

				if let Some(lifetime) = self.lifetime {
					token = token.with_expiry(OffsetDateTime::now_utc() + lifetime);
				}
				if let Some(previous) = previous {
					token.refresh_token = previous.token.refresh_token.clone();
				}

				Ok(IssuedToken::new(token))
			})
		}
	}

	#[tokio::test]
	async fn static_source_returns_verbatim_token() {
		let source = StaticTokenSource::new("abc");
		let token = source.token().await.expect("Static source should never fail.");

		assert_eq!(token.token.access_token.expose(), "abc");
		assert_eq!(token.token.authorization(), "Bearer abc");
	}

	#[tokio::test]
	async fn reuse_source_fetches_once_while_valid() {
		let flow =
			Arc::new(CountingFlow { lifetime: Some(Duration::hours(1)), ..Default::default() });
		let source = Arc::new(ReuseTokenSource::new(flow.clone()));
		let mut handles = Vec::new();

		for _ in 0..8 {
			let source = source.clone();

			handles.push(tokio::spawn(async move { source.token().await }));
		}
		for handle in handles {
			let token = handle
				.await
				.expect("Token task should not panic.")
				.expect("Token fetch should succeed.");

			assert_eq!(token.token.access_token.expose(), "token-1");
		}

		assert_eq!(flow.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn reuse_source_refetches_expired_token() {
		let flow =
			Arc::new(CountingFlow { lifetime: Some(Duration::seconds(5)), ..Default::default() });
		let source = ReuseTokenSource::new(flow.clone());

		source.token().await.expect("First fetch should succeed.");
		source.token().await.expect("Second fetch should succeed.");

		assert_eq!(flow.calls.load(Ordering::SeqCst), 2, "Tokens inside the skew are expired.");
	}

	#[tokio::test]
	async fn timed_flow_passes_through() {
		let flow = Arc::new(CountingFlow::default());
		let timed = TimedTokenFlow::new(flow.clone(), "test");
		let token = timed.fetch(None).await.expect("Timed flow should pass through.");

		assert_eq!(token.token.access_token.expose(), "token-1");
		assert_eq!(flow.calls.load(Ordering::SeqCst), 1);
	}
}
