// std
use std::net::TcpListener as StdTcpListener;
// crates.io
use httpmock::prelude::*;
// self
use zvelo_client::{
	_preludet::*,
	auth::{IssuedToken, ScopeSet, Token, TokenFlow},
	flows::{AuthorizeLauncher, UserFlow},
	oauth::OAuthEndpoints,
};

const CLIENT_ID: &str = "zvelo-user";

fn free_port() -> u16 {
	StdTcpListener::bind("127.0.0.1:0")
		.and_then(|listener| listener.local_addr())
		.expect("An ephemeral port should be available.")
		.port()
}

fn user_flow(server: &MockServer, launcher: AuthorizeLauncher) -> UserFlow {
	let port = free_port();
	let endpoints =
		OAuthEndpoints::new(&server.url("/oauth2/auth"), &server.url("/oauth2/token"))
			.expect("Mock endpoints should parse.");
	let scope = ScopeSet::new(["openid", "zvelo.dataset"]).expect("Scope fixture should be valid.");
	let redirect = Url::parse(&format!("http://127.0.0.1:{port}/callback"))
		.expect("Redirect fixture should parse.");

	UserFlow::new(&endpoints, CLIENT_ID, None, scope, test_reqwest_http_client())
		.expect("User flow should build.")
		.with_redirect_uri(redirect)
		.with_listen_addr(format!("127.0.0.1:{port}"))
		.with_launcher(launcher)
}

/// Simulates the browser: follows the authorize URL straight back to the redirect URI.
fn approving_launcher(code: &'static str) -> AuthorizeLauncher {
	Arc::new(move |authorize: &Url| {
		let params = authorize.query_pairs().into_owned().collect::<HashMap<_, _>>();
		let mut redirect = Url::parse(&params["redirect_uri"])
			.expect("Authorize URL should carry a redirect URI.");

		redirect.query_pairs_mut().append_pair("code", code).append_pair("state", &params["state"]);

		tokio::spawn(async move {
			let _ = reqwest::get(redirect).await;
		});
	})
}

fn panicking_launcher() -> AuthorizeLauncher {
	Arc::new(|_: &Url| panic!("Browser authorization should not be needed."))
}

#[tokio::test]
async fn browser_authorization_exchanges_code() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/token")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=approved-code")
				.body_includes("code_verifier=");
			then.status(200).json_body(serde_json::json!({
				"access_token": "user-token",
				"token_type": "bearer",
				"expires_in": 3600,
				"refresh_token": "r1",
				"id_token": "a.b.c",
			}));
		})
		.await;
	let issued = user_flow(&server, approving_launcher("approved-code"))
		.fetch(None)
		.await
		.expect("Authorization should complete.");

	mock.assert_calls_async(1).await;

	assert_eq!(issued.token.access_token.expose(), "user-token");
	assert_eq!(issued.token.refresh_token.as_ref().map(|token| token.expose()), Some("r1"));
	assert_eq!(issued.id_token.as_deref(), Some("a.b.c"));
}

#[tokio::test]
async fn refresh_keeps_previous_refresh_token_and_id_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/token")
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=r1");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"refreshed","token_type":"bearer","expires_in":3600}"#,
			);
		})
		.await;
	let previous = IssuedToken::new(
		Token::bearer("stale")
			.with_expiry(OffsetDateTime::now_utc() - Duration::minutes(1))
			.with_refresh_token("r1"),
	)
	.with_id_token("x.y.z");
	let issued = user_flow(&server, panicking_launcher())
		.fetch(Some(&previous))
		.await
		.expect("Refresh should succeed.");

	mock.assert_calls_async(1).await;

	assert_eq!(issued.token.access_token.expose(), "refreshed");
	assert_eq!(issued.token.refresh_token.as_ref().map(|token| token.expose()), Some("r1"));
	assert_eq!(issued.id_token.as_deref(), Some("x.y.z"));
}

#[tokio::test]
async fn rejected_refresh_falls_back_to_browser() {
	let server = MockServer::start_async().await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token").body_includes("grant_type=refresh_token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant"}"#);
		})
		.await;
	let exchange = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token").body_includes("grant_type=authorization_code");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"after-browser","token_type":"bearer","expires_in":3600}"#,
			);
		})
		.await;
	let previous = IssuedToken::new(
		Token::bearer("stale")
			.with_expiry(OffsetDateTime::now_utc() - Duration::minutes(1))
			.with_refresh_token("revoked"),
	);
	let issued = user_flow(&server, approving_launcher("second-code"))
		.fetch(Some(&previous))
		.await
		.expect("Browser authorization should follow the rejected refresh.");

	refresh.assert_calls_async(1).await;
	exchange.assert_calls_async(1).await;

	assert_eq!(issued.token.access_token.expose(), "after-browser");
}
