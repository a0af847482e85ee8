//! Three-legged user flow: browser authorization with a local redirect listener, plus refresh.

mod session;

pub use session::*;

// std
use std::process::{Command, Stdio};
// crates.io
use axum::{
	Router,
	extract::{Query, State},
	http::StatusCode,
	response::Html,
	routing::get,
};
use tokio::{net::TcpListener, sync::oneshot};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{IssuedToken, ScopeSet, TokenFlow, TokenFuture},
	error::{ConfigError, TokenError},
	http::ReqwestHttpClient,
	oauth::{OAuthEndpoints, OAuthFacade},
};

/// Default redirect URI registered for the command-line client.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:4445/callback";
/// Default address the redirect listener binds.
pub const DEFAULT_LISTEN_ADDR: &str = "localhost:4445";

/// Hands the authorize URL to the user.
pub type AuthorizeLauncher = Arc<dyn Fn(&Url) + Send + Sync>;

type CodeSender = oneshot::Sender<Result<String, TokenError>>;

/// Authorization Code + PKCE flow driven through the user's browser.
///
/// A held refresh token is tried first. When the server rejects it (or none is held) the flow
/// binds a listener on the redirect address, sends the user to the authorize URL, waits for the
/// redirect, and exchanges the returned code.
pub struct UserFlow {
	facade: OAuthFacade,
	client_id: String,
	authorization: Url,
	scope: ScopeSet,
	redirect_uri: Url,
	listen_addr: String,
	launcher: AuthorizeLauncher,
}
impl UserFlow {
	/// Builds the flow; `client_secret` is optional for public clients.
	pub fn new(
		endpoints: &OAuthEndpoints,
		client_id: &str,
		client_secret: Option<&str>,
		scope: ScopeSet,
		http: ReqwestHttpClient,
	) -> Result<Self> {
		let facade = OAuthFacade::new(endpoints, client_id, client_secret, http)?;
		let redirect_uri = Url::parse(DEFAULT_REDIRECT_URI).map_err(|source| {
			ConfigError::InvalidUrl {
				field: "oauth2 callback",
				value: DEFAULT_REDIRECT_URI.into(),
				source,
			}
		})?;

		Ok(Self {
			facade,
			client_id: client_id.to_owned(),
			authorization: endpoints.authorization.clone(),
			scope,
			redirect_uri,
			listen_addr: DEFAULT_LISTEN_ADDR.into(),
			launcher: Arc::new(|url| launch_browser(url, true)),
		})
	}

	/// Overrides the redirect URI sent to the authorization server.
	pub fn with_redirect_uri(mut self, redirect_uri: Url) -> Self {
		self.redirect_uri = redirect_uri;

		self
	}

	/// Overrides the address the redirect listener binds.
	pub fn with_listen_addr(mut self, listen_addr: impl Into<String>) -> Self {
		self.listen_addr = listen_addr.into();

		self
	}

	/// Chooses between opening a browser and only printing the authorize URL.
	pub fn with_open_browser(mut self, open: bool) -> Self {
		self.launcher = Arc::new(move |url| launch_browser(url, open));

		self
	}

	/// Replaces how the authorize URL reaches the user.
	pub fn with_launcher(mut self, launcher: AuthorizeLauncher) -> Self {
		self.launcher = launcher;

		self
	}

	async fn refresh(&self, previous: &IssuedToken) -> Result<Option<IssuedToken>> {
		let Some(refresh_token) = previous.token.refresh_token.as_ref() else {
			return Ok(None);
		};

		match self.facade.refresh(refresh_token, &self.scope).await {
			Ok(mut fresh) => {
				if fresh.id_token.is_none() {
					fresh.id_token = previous.id_token.clone();
				}

				Ok(Some(fresh))
			},
			Err(Error::Token(TokenError::Rejected { reason, .. })) => {
				tracing::warn!(%reason, "Refresh token rejected; starting browser authorization.");

				Ok(None)
			},
			Err(e) => Err(e),
		}
	}

	async fn authorize(&self) -> Result<IssuedToken> {
		let session = Arc::new(AuthorizationSession::new(
			&self.authorization,
			&self.client_id,
			&self.scope,
			self.redirect_uri.clone(),
		));
		let listener = TcpListener::bind(&self.listen_addr).await.map_err(TokenError::Listener)?;
		let (sender, receiver) = oneshot::channel();
		let app = Router::new()
			.route(self.redirect_uri.path(), get(receive_code))
			.with_state(RedirectState {
				session: session.clone(),
				sender: Arc::new(Mutex::new(Some(sender))),
			});
		let shutdown = CancellationToken::new();
		let signal = shutdown.clone();

		tracing::debug!(addr = %self.listen_addr, "Listening for the authorization redirect.");
		tokio::spawn(
			axum::serve(listener, app)
				.with_graceful_shutdown(async move { signal.cancelled().await })
				.into_future(),
		);

		(self.launcher)(&session.authorize_url);

		let outcome = receiver.await.map_err(|_| TokenError::ListenerClosed);

		shutdown.cancel();

		let code = outcome??;

		self.facade.exchange_code(&code, session.pkce_verifier(), &session.redirect_uri).await
	}
}
impl TokenFlow for UserFlow {
	fn fetch<'a>(&'a self, previous: Option<&'a IssuedToken>) -> TokenFuture<'a> {
		Box::pin(async move {
			if let Some(previous) = previous
				&& let Some(fresh) = self.refresh(previous).await?
			{
				return Ok(fresh);
			}

			self.authorize().await
		})
	}
}
impl Debug for UserFlow {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UserFlow")
			.field("client_id", &self.client_id)
			.field("scope", &self.scope)
			.field("redirect_uri", &self.redirect_uri)
			.field("listen_addr", &self.listen_addr)
			.finish()
	}
}

#[derive(Clone)]
struct RedirectState {
	session: Arc<AuthorizationSession>,
	sender: Arc<Mutex<Option<CodeSender>>>,
}

async fn receive_code(
	State(state): State<RedirectState>,
	Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
	let outcome = authorization_outcome(&state.session, &params);
	let response = match &outcome {
		Ok(_) =>
			(StatusCode::OK, render_page("Authorization complete", "You may close this window.")),
		Err(e) => (StatusCode::BAD_REQUEST, render_page("Authorization failed", &e.to_string())),
	};

	if let Some(sender) = state.sender.lock().take() {
		let _ = sender.send(outcome);
	}

	response
}

fn authorization_outcome(
	session: &AuthorizationSession,
	params: &HashMap<String, String>,
) -> Result<String, TokenError> {
	if let Some(error) = params.get("error") {
		let reason = match params.get("error_description") {
			Some(description) => format!("{error}: {description}"),
			None => error.to_owned(),
		};

		return Err(TokenError::AuthorizationDenied { reason });
	}

	session.validate_state(params.get("state").map(String::as_str))?;

	params.get("code").filter(|code| !code.is_empty()).cloned().ok_or(TokenError::MissingCode)
}

fn render_page(title: &str, message: &str) -> Html<String> {
	let escape = |raw: &str| raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");

	Html(format!(
		"<!DOCTYPE html><html><head><title>{0}</title></head>\
		<body><h1>{0}</h1><p>{1}</p></body></html>",
		escape(title),
		escape(message)
	))
}

fn launch_browser(url: &Url, open: bool) {
	if open {
		match browser_command(url).stdout(Stdio::null()).stderr(Stdio::null()).spawn() {
			Ok(_) => {
				eprintln!("Opened the authorization page in your browser.");

				return;
			},
			Err(e) => tracing::warn!(error = %e, "Unable to open a browser."),
		}
	}

	eprintln!("Visit this URL to authorize the client:\n\n{url}\n");
}

#[cfg(target_os = "macos")]
fn browser_command(url: &Url) -> Command {
	let mut command = Command::new("open");

	command.arg(url.as_str());

	command
}

#[cfg(target_os = "windows")]
fn browser_command(url: &Url) -> Command {
	let mut command = Command::new("cmd");

	command.args(["/C", "start", "", url.as_str()]);

	command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn browser_command(url: &Url) -> Command {
	let mut command = Command::new("xdg-open");

	command.arg(url.as_str());

	command
}
