//! Command-line surface of the `zvelo` executable.
//!
//! Every flag also reads a `ZVELO_<NAME>` environment variable. Commands build their components
//! through [`ClientConfig`] and report through a [`Presenter`].

// std
use std::{path::PathBuf, process::ExitCode};
// crates.io
use clap::{Args, Parser, Subcommand};
use futures_util::StreamExt;
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
// self
use crate::{
	_prelude::*,
	auth::{self, IssuedToken},
	callback::{CallbackReceiver, DEFAULT_CALLBACK_LISTEN},
	config::{ClientConfig, CredentialMode, CredentialOptions, DEFAULT_APP_NAME, TransportOptions},
	engine::{
		CallbackOptions, ContentSource, DEFAULT_REDIRECT_LIMIT, EngineOptions, QueryEngine,
		resolve_contents,
	},
	error::{InputError, TokenError},
	flows::{DEFAULT_LISTEN_ADDR, DEFAULT_REDIRECT_URI},
	model::{
		Categorization, Category, Dataset, DatasetType, GraphQlRequest, Malicious, QueryRequest,
		QueryResult, SuggestRequest, Verdict, normalize_url,
	},
	oauth::{DEFAULT_AUTH_URL, DEFAULT_TOKEN_URL},
	poller::{HandlerFuture, PendingSet, ResultHandler},
	present::{Event, Presenter, TextPresenter},
	transport::{CallContext, DEFAULT_GRPC_TARGET, DEFAULT_REST_BASE_URL, StreamTransport},
};

/// Parses durations such as `100ms`, `15s`, `1m`, or `1m30s`.
pub fn parse_duration(raw: &str) -> Result<std::time::Duration, InputError> {
	let invalid = || InputError::InvalidDuration { value: raw.to_owned() };
	let mut rest = raw.trim();

	if rest == "0" {
		return Ok(std::time::Duration::ZERO);
	}
	if rest.is_empty() {
		return Err(invalid());
	}

	let mut seconds = 0_f64;

	while !rest.is_empty() {
		let number_len =
			rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).ok_or_else(invalid)?;
		let (number, tail) = rest.split_at(number_len);
		let unit_len = tail.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(tail.len());
		let (unit, next) = tail.split_at(unit_len);
		let scale = match unit {
			"ns" => 1e-9,
			"us" | "µs" => 1e-6,
			"ms" => 1e-3,
			"s" => 1.0,
			"m" => 60.0,
			"h" => 3600.0,
			_ => return Err(invalid()),
		};

		seconds += number.parse::<f64>().map_err(|_| invalid())? * scale;
		rest = next;
	}

	std::time::Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
}

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(name = "zvelo", version, about = "Client for the zvelo URL categorization service.")]
pub struct Cli {
	/// Flags shared by every command.
	#[command(flatten)]
	pub global: GlobalArgs,
	/// Command to run.
	#[command(subcommand)]
	pub command: Command,
}

/// Flags shared by every command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
	/// Enable debug logging and token timing.
	#[arg(long, global = true, env = "ZVELO_DEBUG")]
	pub debug: bool,
	/// Overall deadline for the command.
	#[arg(
		long,
		global = true,
		env = "ZVELO_TIMEOUT",
		default_value = "15m",
		value_parser = parse_duration,
	)]
	pub timeout: std::time::Duration,
	/// Use the JSON transport instead of RPC.
	#[arg(long, global = true, env = "ZVELO_REST")]
	pub rest: bool,
	/// Base URL of the JSON API.
	#[arg(long, global = true, env = "ZVELO_REST_BASE_URL", default_value = DEFAULT_REST_BASE_URL)]
	pub rest_base_url: String,
	/// Target of the RPC API.
	#[arg(long, global = true, env = "ZVELO_GRPC_TARGET", default_value = DEFAULT_GRPC_TARGET)]
	pub grpc_target: String,
	/// Connect without TLS.
	#[arg(long, global = true, env = "ZVELO_NO_TLS")]
	pub no_tls: bool,
	/// Accept any server certificate.
	#[arg(long, global = true, env = "ZVELO_TLS_INSECURE_SKIP_VERIFY")]
	pub tls_insecure_skip_verify: bool,
	/// Send a client trace ID and print the service trace ID.
	#[arg(long, global = true, env = "ZVELO_TRACE")]
	pub trace: bool,
	/// OAuth client ID.
	#[arg(long, global = true, env = "ZVELO_CLIENT_ID")]
	pub client_id: Option<String>,
	/// OAuth client secret.
	#[arg(long, global = true, env = "ZVELO_CLIENT_SECRET", hide_env_values = true)]
	pub client_secret: Option<String>,
	/// Access token to use verbatim.
	#[arg(long, global = true, env = "ZVELO_ACCESS_TOKEN", hide_env_values = true)]
	pub access_token: Option<String>,
	/// Authorize through the browser.
	#[arg(long, global = true, env = "ZVELO_USE_USER_CREDENTIALS")]
	pub use_user_credentials: bool,
	/// Send no credentials.
	#[arg(long, global = true, env = "ZVELO_MOCK_NO_CREDENTIALS")]
	pub mock_no_credentials: bool,
	/// Scope to request; repeatable.
	#[arg(long = "scope", global = true, env = "ZVELO_SCOPE", value_delimiter = ',')]
	pub scopes: Vec<String>,
	/// Do not read or write the token cache.
	#[arg(long, global = true, env = "ZVELO_NO_CACHE_TOKEN")]
	pub no_cache_token: bool,
	/// OAuth authorization endpoint.
	#[arg(long, global = true, env = "ZVELO_AUTH_URL", default_value = DEFAULT_AUTH_URL)]
	pub auth_url: String,
	/// OAuth token endpoint.
	#[arg(long, global = true, env = "ZVELO_TOKEN_URL", default_value = DEFAULT_TOKEN_URL)]
	pub token_url: String,
	/// Issuer used to verify ID tokens.
	#[arg(long, global = true, env = "ZVELO_OIDC_ISSUER")]
	pub oidc_issuer: Option<String>,
	/// Redirect URI for the browser flow.
	#[arg(
		long,
		global = true,
		env = "ZVELO_OAUTH2_CALLBACK_URL",
		default_value = DEFAULT_REDIRECT_URI,
	)]
	pub oauth2_callback_url: String,
	/// Address the browser-flow redirect listener binds.
	#[arg(
		long,
		global = true,
		env = "ZVELO_OAUTH2_CALLBACK_ADDR",
		default_value = DEFAULT_LISTEN_ADDR,
	)]
	pub oauth2_callback_addr: String,
	/// Print the authorization URL instead of opening a browser.
	#[arg(long, global = true, env = "ZVELO_OAUTH2_NO_OPEN_IN_BROWSER")]
	pub oauth2_no_open_in_browser: bool,
	/// Delay between polling passes.
	#[arg(
		long,
		global = true,
		env = "ZVELO_POLL_INTERVAL",
		default_value = "1s",
		value_parser = parse_duration,
	)]
	pub poll_interval: std::time::Duration,
	/// Poll once and stop.
	#[arg(long, global = true, env = "ZVELO_ONCE")]
	pub once: bool,
	/// Application name used for the data directory.
	#[arg(long, global = true, env = "ZVELO_APP_NAME", default_value = DEFAULT_APP_NAME)]
	pub app_name: String,
	/// Base data directory.
	#[arg(long, global = true, env = "ZVELO_DATA_DIR")]
	pub data_dir: Option<PathBuf>,
}
impl GlobalArgs {
	/// Collects the flags into a [`ClientConfig`].
	pub fn client_config(&self) -> ClientConfig {
		ClientConfig {
			credentials: CredentialOptions {
				client_id: self.client_id.clone(),
				client_secret: self.client_secret.clone(),
				access_token: self.access_token.clone(),
				use_user_credentials: self.use_user_credentials,
				mock_no_credentials: self.mock_no_credentials,
				scopes: self.scopes.clone(),
				no_cache_token: self.no_cache_token,
				auth_url: self.auth_url.clone(),
				token_url: self.token_url.clone(),
				oidc_issuer: self.oidc_issuer.clone(),
				oauth2_callback_url: self.oauth2_callback_url.clone(),
				oauth2_callback_addr: self.oauth2_callback_addr.clone(),
				oauth2_no_open_in_browser: self.oauth2_no_open_in_browser,
			},
			transport: TransportOptions {
				rest: self.rest,
				rest_base_url: self.rest_base_url.clone(),
				grpc_target: self.grpc_target.clone(),
				no_tls: self.no_tls,
				tls_insecure_skip_verify: self.tls_insecure_skip_verify,
			},
			app_name: self.app_name.clone(),
			data_dir: self.data_dir.clone(),
			debug: self.debug,
		}
	}

	fn call_context(&self, mock_hints: Vec<(String, String)>) -> CallContext {
		CallContext::default().with_trace(self.trace).with_mock_hints(mock_hints)
	}
}

/// Commands.
#[derive(Debug, Subcommand)]
pub enum Command {
	/// Submit URLs or content and wait for results.
	Query(QueryArgs),
	/// Resume polling previously issued request IDs.
	Poll(PollArgs),
	/// Print streamed results until the stream ends.
	Stream,
	/// Submit a categorization suggestion.
	Suggest(SuggestArgs),
	/// Submit a GraphQL document.
	#[command(name = "graphql")]
	GraphQl(GraphQlArgs),
	/// Print the current access token.
	Token,
	/// Run only the callback receiver.
	Receiver(ReceiverArgs),
}

/// Datasets to request.
#[derive(Debug, Args)]
pub struct DatasetArgs {
	/// Dataset to request; repeatable.
	#[arg(
		long = "dataset",
		env = "ZVELO_DATASET",
		value_delimiter = ',',
		default_value = "categorization",
	)]
	pub datasets: Vec<DatasetType>,
}

/// Local callback endpoint options.
#[derive(Debug, Args)]
pub struct CallbackArgs {
	/// Public URL the service posts results to.
	#[arg(long, env = "ZVELO_CALLBACK")]
	pub callback: Option<String>,
	/// Address the callback receiver listens on.
	#[arg(long, env = "ZVELO_LISTEN", default_value = DEFAULT_CALLBACK_LISTEN)]
	pub listen: String,
	/// Accept callbacks without checking their signatures.
	#[arg(long, env = "ZVELO_NO_VALIDATE_CALLBACK")]
	pub no_validate_callback: bool,
	/// Keep fetched signing keys in memory only.
	#[arg(long, env = "ZVELO_NO_KEY_CACHE")]
	pub no_key_cache: bool,
}

/// Hints forwarded to a mock service.
#[derive(Debug, Default, Args)]
pub struct MockArgs {
	/// Complete results after this long.
	#[arg(long, env = "ZVELO_MOCK_COMPLETE_AFTER")]
	pub mock_complete_after: Option<String>,
	/// Fetch code to report.
	#[arg(long, env = "ZVELO_MOCK_FETCH_CODE")]
	pub mock_fetch_code: Option<i32>,
	/// Redirect location to report.
	#[arg(long, env = "ZVELO_MOCK_LOCATION")]
	pub mock_location: Option<String>,
	/// Category to report; repeatable.
	#[arg(long = "mock-category", env = "ZVELO_MOCK_CATEGORY", value_delimiter = ',')]
	pub mock_categories: Vec<Category>,
	/// Error code to report.
	#[arg(long, env = "ZVELO_MOCK_ERROR_CODE")]
	pub mock_error_code: Option<i32>,
	/// Error message to report.
	#[arg(long, env = "ZVELO_MOCK_ERROR_MESSAGE")]
	pub mock_error_message: Option<String>,
}
impl MockArgs {
	/// Hints as `(name, value)` pairs.
	pub fn hints(&self) -> Vec<(String, String)> {
		let mut hints = Vec::new();
		let mut push = |name: &str, value: Option<String>| {
			if let Some(value) = value {
				hints.push((name.to_owned(), value));
			}
		};

		push("mock_complete_after", self.mock_complete_after.clone());
		push("mock_fetch_code", self.mock_fetch_code.map(|code| code.to_string()));
		push("mock_location", self.mock_location.clone());
		push(
			"mock_category",
			(!self.mock_categories.is_empty()).then(|| {
				self.mock_categories
					.iter()
					.map(|category| category.as_str())
					.collect::<Vec<_>>()
					.join(",")
			}),
		);
		push("mock_error_code", self.mock_error_code.map(|code| code.to_string()));
		push("mock_error_message", self.mock_error_message.clone());

		hints
	}
}

/// `query` arguments.
#[derive(Debug, Args)]
pub struct QueryArgs {
	/// URLs to analyze.
	#[arg(env = "ZVELO_URL", value_delimiter = ',')]
	pub urls: Vec<String>,
	/// Content to analyze: a literal, `@path`, or `@-` for stdin; repeatable.
	#[arg(long = "content", env = "ZVELO_CONTENT")]
	pub contents: Vec<String>,
	/// Datasets to request.
	#[command(flatten)]
	pub datasets: DatasetArgs,
	/// Return after the service acknowledges the query.
	#[arg(long, env = "ZVELO_NO_POLL")]
	pub no_poll: bool,
	/// Do not follow redirects reported in results.
	#[arg(long, env = "ZVELO_NO_FOLLOW_REDIRECTS")]
	pub no_follow_redirects: bool,
	/// Maximum redirect chain length.
	#[arg(long, env = "ZVELO_REDIRECT_LIMIT", default_value_t = DEFAULT_REDIRECT_LIMIT)]
	pub redirect_limit: usize,
	/// Callback options.
	#[command(flatten)]
	pub callback: CallbackArgs,
	/// Mock service hints.
	#[command(flatten)]
	pub mock: MockArgs,
}

/// `poll` arguments.
#[derive(Debug, Args)]
pub struct PollArgs {
	/// Request IDs to poll.
	#[arg(env = "ZVELO_REQUEST_ID", value_delimiter = ',')]
	pub request_ids: Vec<String>,
	/// Datasets to request for redirect hops.
	#[command(flatten)]
	pub datasets: DatasetArgs,
	/// Do not follow redirects reported in results.
	#[arg(long, env = "ZVELO_NO_FOLLOW_REDIRECTS")]
	pub no_follow_redirects: bool,
	/// Maximum redirect chain length.
	#[arg(long, env = "ZVELO_REDIRECT_LIMIT", default_value_t = DEFAULT_REDIRECT_LIMIT)]
	pub redirect_limit: usize,
}

/// `suggest` arguments.
#[derive(Debug, Args)]
pub struct SuggestArgs {
	/// URL the suggestion concerns.
	#[arg(long, env = "ZVELO_URL")]
	pub url: Option<String>,
	/// Content the suggestion concerns: a literal, `@path`, or `@-`.
	#[arg(long, env = "ZVELO_CONTENT")]
	pub content: Option<String>,
	/// Suggested category; repeatable.
	#[arg(long = "category", env = "ZVELO_CATEGORY", value_delimiter = ',')]
	pub categories: Vec<Category>,
	/// Suggested malicious category; repeatable.
	#[arg(long = "malicious-category", env = "ZVELO_MALICIOUS_CATEGORY", value_delimiter = ',')]
	pub malicious_categories: Vec<Category>,
	/// Suggest that the target is clean.
	#[arg(long, env = "ZVELO_NOT_MALICIOUS", conflicts_with = "malicious_categories")]
	pub not_malicious: bool,
}
impl SuggestArgs {
	/// Builds the suggestion, reading `--content` when given.
	pub async fn request(&self) -> Result<SuggestRequest> {
		let content = match &self.content {
			Some(value) => value.parse::<ContentSource>()?.read().await?,
			None => String::new(),
		};
		let malicious = if !self.malicious_categories.is_empty() {
			Some(Malicious {
				verdict: Verdict::Malicious,
				category: self.malicious_categories.clone(),
				error: None,
			})
		} else if self.not_malicious {
			Some(Malicious { verdict: Verdict::Clean, ..Default::default() })
		} else {
			None
		};
		let request = SuggestRequest {
			url: self.url.as_deref().map(normalize_url).unwrap_or_default(),
			content,
			dataset: Dataset {
				categorization: (!self.categories.is_empty()).then(|| Categorization {
					value: self.categories.clone(),
					error: None,
				}),
				malicious,
				..Default::default()
			},
		};

		request.validate()?;

		Ok(request)
	}
}

/// `graphql` arguments.
#[derive(Debug, Args)]
pub struct GraphQlArgs {
	/// Document: a literal, `@path`, or `@-` for stdin.
	#[arg(long, env = "ZVELO_CONTENT")]
	pub content: String,
}

/// `receiver` arguments.
#[derive(Debug, Args)]
pub struct ReceiverArgs {
	/// Address to listen on.
	#[arg(long, env = "ZVELO_LISTEN", default_value = DEFAULT_CALLBACK_LISTEN)]
	pub listen: String,
	/// Path results are posted to.
	#[arg(long, env = "ZVELO_CALLBACK_PATH", default_value = "/")]
	pub path: String,
	/// Accept callbacks without checking their signatures.
	#[arg(long, env = "ZVELO_NO_VALIDATE_CALLBACK")]
	pub no_validate_callback: bool,
	/// Keep fetched signing keys in memory only.
	#[arg(long, env = "ZVELO_NO_KEY_CACHE")]
	pub no_key_cache: bool,
}

/// Presents every complete result it receives.
pub struct ResultPrinter(Arc<dyn Presenter>);
impl ResultHandler for ResultPrinter {
	fn handle<'a>(&'a self, _ctx: &'a CallContext, result: QueryResult) -> HandlerFuture<'a> {
		Box::pin(async move {
			if result.is_complete() {
				self.0.present(result_event(result));
			}

			PendingSet::new()
		})
	}
}

impl Cli {
	/// Runs the selected command.
	pub async fn execute(self, presenter: Arc<dyn Presenter>) -> Result<()> {
		let global = self.global;
		let config = global.client_config();

		match self.command {
			Command::Query(args) => query(&global, &config, args, presenter).await,
			Command::Poll(args) => poll(&global, &config, args, presenter).await,
			Command::Stream => stream(&global, &config, presenter).await,
			Command::Suggest(args) => suggest(&global, &config, args, presenter).await,
			Command::GraphQl(args) => graphql(&global, &config, args, presenter).await,
			Command::Token => token(&config, presenter).await,
			Command::Receiver(args) => receiver(&config, args, presenter).await,
		}
	}
}

/// Entry point of the executable: parses arguments, runs the command, and maps the outcome to
/// an exit code.
pub async fn run() -> ExitCode {
	let cli = Cli::parse();

	init_tracing(cli.global.debug);

	let outcome = tokio::select! {
		outcome = cli.execute(Arc::new(TextPresenter)) => outcome,
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Interrupted.");

			Ok(())
		},
	};

	match outcome {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("Error: {}", report(&e));

			ExitCode::FAILURE
		},
	}
}

fn init_tracing(debug: bool) {
	let filter = if debug {
		EnvFilter::new("debug")
	} else {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
	};

	if let Err(e) = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.try_init()
	{
		eprintln!("Unable to install the log subscriber: {e}");
	}
}

fn report(error: &Error) -> String {
	let mut message = error.to_string();
	let mut source = StdError::source(error);

	while let Some(cause) = source {
		message.truncate(message.trim_end_matches('.').len());
		message.push_str(": ");
		message.push_str(&cause.to_string());

		source = cause.source();
	}

	message
}

fn result_event(result: QueryResult) -> Event {
	Event::Result {
		label: result.label(),
		elapsed: None,
		redirect_depth: 0,
		result: Box::new(result),
	}
}

async fn query(
	global: &GlobalArgs,
	config: &ClientConfig,
	args: QueryArgs,
	presenter: Arc<dyn Presenter>,
) -> Result<()> {
	let contents = resolve_contents(&args.contents).await?;
	let request = QueryRequest::new(args.datasets.datasets.iter().copied())
		.with_urls(&args.urls)
		.with_contents(contents);
	let http = config.http_client()?;
	let tokens = config.token_source(&http)?;
	let transport = config.transport(&http, tokens)?;
	let options = EngineOptions {
		poll: !args.no_poll,
		follow_redirects: !args.no_follow_redirects,
		redirect_limit: args.redirect_limit,
		timeout: global.timeout,
		poll_interval: global.poll_interval,
		once: global.once,
		ctx: global.call_context(args.mock.hints()),
	};
	let mut engine = QueryEngine::new(transport, presenter).with_options(options);

	if let Some(url) = &args.callback.callback {
		let verifier = if args.callback.no_validate_callback {
			None
		} else {
			Some(Arc::new(config.verifier(&http, !args.callback.no_key_cache)?))
		};

		engine = engine.with_callback(CallbackOptions {
			listen: args.callback.listen.clone(),
			url: normalize_url(url),
			verifier,
		});
	}

	engine.query(request).await
}

async fn poll(
	global: &GlobalArgs,
	config: &ClientConfig,
	args: PollArgs,
	presenter: Arc<dyn Presenter>,
) -> Result<()> {
	if args.request_ids.is_empty() {
		return Err(InputError::NoRequestIds.into());
	}

	let http = config.http_client()?;
	let tokens = config.token_source(&http)?;
	let transport = config.transport(&http, tokens)?;
	let options = EngineOptions {
		follow_redirects: !args.no_follow_redirects,
		redirect_limit: args.redirect_limit,
		timeout: global.timeout,
		poll_interval: global.poll_interval,
		once: global.once,
		ctx: global.call_context(Vec::new()),
		..Default::default()
	};

	QueryEngine::new(transport, presenter)
		.with_options(options)
		.poll(&args.request_ids, args.datasets.datasets.iter().copied())
		.await
}

async fn stream(
	global: &GlobalArgs,
	config: &ClientConfig,
	presenter: Arc<dyn Presenter>,
) -> Result<()> {
	let http = config.http_client()?;
	let tokens = config.token_source(&http)?;
	let transport = config.rpc_transport(tokens)?;
	let ctx = global.call_context(Vec::new());
	let mut results = transport.stream(&ctx).await?;

	if let Some(trace_id) = ctx.trace_id() {
		presenter.present(Event::service_trace(&trace_id));
	}

	while let Some(result) = results.next().await {
		presenter.present(result_event(result?));
	}

	Ok(())
}

async fn suggest(
	global: &GlobalArgs,
	config: &ClientConfig,
	args: SuggestArgs,
	presenter: Arc<dyn Presenter>,
) -> Result<()> {
	let request = args.request().await?;
	let http = config.http_client()?;
	let tokens = config.token_source(&http)?;
	let transport = config.transport(&http, tokens)?;
	let ctx = global.call_context(Vec::new());

	transport.suggest(&ctx, &request).await?;

	if let Some(trace_id) = ctx.trace_id() {
		presenter.present(Event::service_trace(&trace_id));
	}

	presenter.present(Event::Message("Suggestion submitted.".into()));

	Ok(())
}

async fn graphql(
	global: &GlobalArgs,
	config: &ClientConfig,
	args: GraphQlArgs,
	presenter: Arc<dyn Presenter>,
) -> Result<()> {
	let query = args.content.parse::<ContentSource>()?.read().await?;
	let http = config.http_client()?;
	let tokens = config.token_source(&http)?;
	let transport = config.json_transport(&http, tokens)?;
	let ctx = global.call_context(Vec::new());
	let value = transport.graphql(&ctx, &GraphQlRequest { query }).await?;

	if let Some(trace_id) = ctx.trace_id() {
		presenter.present(Event::service_trace(&trace_id));
	}

	presenter.present(Event::Message(
		serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
	));

	Ok(())
}

async fn token(config: &ClientConfig, presenter: Arc<dyn Presenter>) -> Result<()> {
	let http = config.http_client()?;
	let Some(tokens) = config.token_source(&http)? else {
		presenter.present(Event::Message("Credentials are disabled.".into()));

		return Ok(());
	};
	let issued = tokens.token().await?;

	presenter.present(Event::Message(describe_token(&issued)));

	if issued.id_token.is_none()
		&& !matches!(config.credentials.mode()?, CredentialMode::Static(_))
		&& config.credentials.scope_set()?.wants_id_token()
	{
		return Err(TokenError::MissingIdToken.into());
	}
	if let Some(id_token) = &issued.id_token {
		let claims = match config.oidc_verifier(&http).await? {
			Some(verifier) => verifier.verify(id_token)?,
			None => auth::decode_unverified(id_token)?,
		};
		let rendered = serde_json::to_string_pretty(&claims)
			.unwrap_or_else(|_| serde_json::Value::Object(claims.clone()).to_string());

		presenter.present(Event::Message(format!("ID Token Claims:\n{rendered}")));
	}

	Ok(())
}

fn describe_token(issued: &IssuedToken) -> String {
	let token = &issued.token;
	let expiry = token.expiry.map_or_else(
		|| "never".to_owned(),
		|expiry| expiry.format(&Rfc3339).unwrap_or_else(|_| expiry.to_string()),
	);

	[
		format!("Access Token: {}", token.access_token.expose()),
		format!("Token Type: {}", token.token_type),
		format!("Expiry: {expiry}"),
		format!("Refresh Token: {}", if token.refresh_token.is_some() { "yes" } else { "no" }),
	]
	.join("\n")
}

async fn receiver(
	config: &ClientConfig,
	args: ReceiverArgs,
	presenter: Arc<dyn Presenter>,
) -> Result<()> {
	let mut receiver =
		CallbackReceiver::bind(&args.listen, &args.path, Arc::new(ResultPrinter(presenter)))
			.await?;

	if !args.no_validate_callback {
		let http = config.http_client()?;

		receiver = receiver.with_verifier(Arc::new(config.verifier(&http, !args.no_key_cache)?));
	}

	receiver.serve(CancellationToken::new()).await
}

#[cfg(test)]
mod tests {
	// crates.io
	use clap::CommandFactory;
	// self
	use super::*;
	use crate::auth::Token;

	#[test]
	fn command_definition_is_consistent() {
		Cli::command().debug_assert();
	}

	#[test]
	fn parses_durations() {
		let cases = [
			("100ms", 100),
			("15s", 15_000),
			("1m", 60_000),
			("1m30s", 90_000),
			("1.5s", 1_500),
			("0", 0),
		];

		for (raw, millis) in cases {
			assert_eq!(
				parse_duration(raw).expect("Duration fixture should parse."),
				std::time::Duration::from_millis(millis),
				"{raw}"
			);
		}
		for raw in ["", "10", "s", "5x", "1m-3s"] {
			assert!(
				matches!(parse_duration(raw), Err(InputError::InvalidDuration { .. })),
				"{raw}"
			);
		}
	}

	#[test]
	fn query_flags_map_into_config() {
		let cli = Cli::try_parse_from([
			"zvelo",
			"query",
			"example.com",
			"--content",
			"body",
			"--dataset",
			"malicious,language",
			"--rest",
			"--no-tls",
			"--mock-no-credentials",
			"--mock-fetch-code",
			"301",
			"--redirect-limit",
			"2",
		])
		.expect("Query flags should parse.");
		let config = cli.global.client_config();

		assert!(config.transport.rest);
		assert!(config.transport.no_tls);
		assert!(config.credentials.mock_no_credentials);

		let Command::Query(args) = cli.command else {
			panic!("Expected the query command.");
		};

		assert_eq!(args.urls, ["example.com"]);
		assert_eq!(args.contents, ["body"]);
		assert_eq!(args.datasets.datasets, [DatasetType::Malicious, DatasetType::Language]);
		assert_eq!(args.redirect_limit, 2);
		assert_eq!(args.callback.listen, DEFAULT_CALLBACK_LISTEN);
		assert_eq!(args.mock.hints(), [("mock_fetch_code".to_owned(), "301".to_owned())]);
	}

	#[test]
	fn dataset_defaults_to_categorization() {
		let cli = Cli::try_parse_from(["zvelo", "poll", "R1", "R2"]).expect("Poll should parse.");
		let Command::Poll(args) = cli.command else {
			panic!("Expected the poll command.");
		};

		assert_eq!(args.request_ids, ["R1", "R2"]);
		assert_eq!(args.datasets.datasets, [DatasetType::Categorization]);
		assert_eq!(cli.global.timeout, std::time::Duration::from_secs(15 * 60));
	}

	#[tokio::test]
	async fn suggest_builds_datasets() {
		let cli = Cli::try_parse_from([
			"zvelo",
			"suggest",
			"--url",
			"example.com",
			"--category",
			"news",
			"--not-malicious",
		])
		.expect("Suggest flags should parse.");
		let Command::Suggest(args) = cli.command else {
			panic!("Expected the suggest command.");
		};
		let request = args.request().await.expect("Suggestion should build.");

		assert_eq!(request.url, "http://example.com");
		assert_eq!(
			request.dataset.categorization.map(|categorization| categorization.value),
			Some(vec![Category::News])
		);
		assert_eq!(
			request.dataset.malicious.map(|malicious| malicious.verdict),
			Some(Verdict::Clean)
		);
	}

	#[tokio::test]
	async fn suggest_requires_a_value() {
		let cli = Cli::try_parse_from(["zvelo", "suggest", "--url", "example.com"])
			.expect("Suggest flags should parse.");
		let Command::Suggest(args) = cli.command else {
			panic!("Expected the suggest command.");
		};

		assert!(matches!(
			args.request().await,
			Err(Error::Input(InputError::EmptySuggestion))
		));
	}

	#[test]
	fn token_description_lists_fields() {
		let issued = IssuedToken::new(Token::bearer("abc").with_refresh_token("def"));
		let text = describe_token(&issued);

		assert!(text.contains("Access Token: abc"));
		assert!(text.contains("Expiry: never"));
		assert!(text.contains("Refresh Token: yes"));
	}

	#[test]
	fn errors_report_their_causes() {
		let error = Error::from(InputError::ReadContent {
			path: "missing.txt".into(),
			source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
		});

		assert_eq!(report(&error), "Unable to read content from missing.txt: not found");
	}
}
