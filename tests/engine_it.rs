// std
use std::{net::TcpListener as StdTcpListener, time::Duration as StdDuration};
// crates.io
use axum::http::{
	HeaderMap, HeaderValue, Method, Uri,
	header::{DATE, HOST},
};
// self
use zvelo_client::{
	_preludet::*,
	engine::{CallbackOptions, EngineOptions, QueryEngine},
	httpsig::{
		Algorithm, DIGEST_HEADER, DigestAlgorithm, Signer, SigningKey, StaticKeyGetter, Verifier,
		VerifyingKey,
	},
	model::{Category, DatasetType, QueryRequest},
	present::{Event, RecordingPresenter},
};

fn engine(
	transport: &Arc<ScriptedTransport>,
	presenter: &Arc<RecordingPresenter>,
	options: EngineOptions,
) -> QueryEngine {
	QueryEngine::new(transport.clone(), presenter.clone()).with_options(options)
}

fn request(urls: &[&str]) -> QueryRequest {
	QueryRequest::new([DatasetType::Categorization]).with_urls(urls)
}

fn result_ids(presenter: &RecordingPresenter) -> Vec<String> {
	presenter.results().into_iter().map(|result| result.request_id).collect()
}

#[tokio::test(start_paused = true)]
async fn single_url_completes_on_first_pass() {
	let transport = Arc::new(
		ScriptedTransport::default()
			.with_reply("http://example.com", "R1")
			.with_trace_id("7b3a:9f:0:1")
			.with_results("R1", [completed_with("R1", "http://example.com", [Category::News])]),
	);
	let presenter = Arc::new(RecordingPresenter::default());

	engine(&transport, &presenter, EngineOptions::default())
		.query(request(&["example.com"]))
		.await
		.expect("Query should complete.");

	assert_eq!(transport.result_calls("R1"), 1);

	let events = presenter.events();

	assert_eq!(events[0], Event::ServiceTrace { trace_id: "7b3a".into() });
	assert_eq!(events[1], Event::Reply {
		label: "http://example.com".into(),
		request_id: "R1".into()
	});
	assert!(matches!(
		&events[2],
		Event::Result { label, redirect_depth: 0, .. } if label == "http://example.com"
	));
}

#[tokio::test(start_paused = true)]
async fn two_urls_finish_over_two_passes() {
	let transport = Arc::new(
		ScriptedTransport::default()
			.with_reply("http://a.example", "R1")
			.with_reply("http://b.example", "R2")
			.with_results("R1", [completed("R1")])
			.with_results("R2", [incomplete("R2"), completed("R2")]),
	);
	let presenter = Arc::new(RecordingPresenter::default());

	engine(&transport, &presenter, EngineOptions::default())
		.query(request(&["a.example", "b.example"]))
		.await
		.expect("Query should complete.");

	assert_eq!(transport.result_calls("R1"), 1);
	assert_eq!(transport.result_calls("R2"), 2);
	assert_eq!(result_ids(&presenter), ["R1", "R2"]);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_on_the_next_pass() {
	let transport = Arc::new(
		ScriptedTransport::default()
			.with_reply("http://a.example", "R1")
			.with_failures("R1", 2)
			.with_results("R1", [completed("R1")]),
	);
	let presenter = Arc::new(RecordingPresenter::default());

	engine(&transport, &presenter, EngineOptions::default())
		.query(request(&["a.example"]))
		.await
		.expect("Query should complete after retries.");

	assert_eq!(transport.result_calls("R1"), 3);
	assert_eq!(result_ids(&presenter), ["R1"]);
}

#[tokio::test(start_paused = true)]
async fn redirects_are_followed_with_a_new_request() {
	let transport = Arc::new(
		ScriptedTransport::default()
			.with_reply("http://src.example", "R1")
			.with_reply("http://dst.example/", "R2")
			.with_results("R1", [redirected("R1", "http://dst.example/")])
			.with_results("R2", [completed("R2")]),
	);
	let presenter = Arc::new(RecordingPresenter::default());

	engine(&transport, &presenter, EngineOptions::default())
		.query(request(&["src.example"]))
		.await
		.expect("Query should complete after the redirect.");

	let queries = transport.queries();

	assert_eq!(queries.len(), 2);
	assert_eq!(queries[1].url, ["http://dst.example/"]);
	assert_eq!(queries[1].dataset, [DatasetType::Categorization]);
	assert!(presenter.events().contains(&Event::Redirect {
		from_request_id: "R1".into(),
		location: "http://dst.example/".into(),
		request_id: "R2".into(),
		depth: 1,
	}));
	assert!(presenter.events().iter().any(|event| matches!(
		event,
		Event::Result { redirect_depth: 1, result, .. } if result.request_id == "R2"
	)));
}

#[tokio::test(start_paused = true)]
async fn disabled_redirects_are_not_followed() {
	let transport = Arc::new(
		ScriptedTransport::default()
			.with_reply("http://src.example", "R1")
			.with_reply("http://dst.example/", "R2")
			.with_results("R1", [redirected("R1", "http://dst.example/")])
			.with_results("R2", [completed("R2")]),
	);
	let presenter = Arc::new(RecordingPresenter::default());
	let options = EngineOptions { follow_redirects: false, ..Default::default() };

	engine(&transport, &presenter, options)
		.query(request(&["src.example"]))
		.await
		.expect("Query should complete without following.");

	assert_eq!(transport.queries().len(), 1);
	assert_eq!(transport.result_calls("R2"), 0);
	assert_eq!(result_ids(&presenter), ["R1"]);
}

#[tokio::test(start_paused = true)]
async fn deadline_ends_the_wait_with_timeout() {
	let transport = Arc::new(
		ScriptedTransport::default()
			.with_reply("http://slow.example", "R1")
			.with_results("R1", [incomplete("R1")]),
	);
	let presenter = Arc::new(RecordingPresenter::default());
	let options = EngineOptions { timeout: StdDuration::from_secs(5), ..Default::default() };
	let err = engine(&transport, &presenter, options)
		.query(request(&["slow.example"]))
		.await
		.expect_err("An incomplete request should time out.");

	assert!(matches!(err, Error::Timeout));
	assert!(transport.result_calls("R1") >= 5);
	assert!(presenter.results().is_empty());
}

#[tokio::test(start_paused = true)]
async fn results_missing_their_id_still_complete_the_query() {
	let transport = Arc::new(
		ScriptedTransport::default()
			.with_reply("http://a.example", "R1")
			.with_reply("http://b.example", "R2")
			.with_results("R1", [completed("")])
			.with_results("R2", [completed("")]),
	);
	let presenter = Arc::new(RecordingPresenter::default());
	let options = EngineOptions { timeout: StdDuration::from_secs(5), ..Default::default() };

	engine(&transport, &presenter, options)
		.query(request(&["a.example", "b.example"]))
		.await
		.expect("Results without IDs should still complete the query.");

	let mut ids = result_ids(&presenter);

	ids.sort();

	assert_eq!(ids, ["R1", "R2"]);
}

#[tokio::test(start_paused = true)]
async fn polling_existing_ids_uses_the_same_handler() {
	let transport = Arc::new(
		ScriptedTransport::default()
			.with_results("R7", [incomplete("R7"), completed_with("R7", "http://x.example", [])]),
	);
	let presenter = Arc::new(RecordingPresenter::default());

	engine(&transport, &presenter, EngineOptions::default())
		.poll(&["R7".to_owned()], [DatasetType::Categorization])
		.await
		.expect("Polling should complete.");

	assert!(transport.queries().is_empty());
	assert_eq!(result_ids(&presenter), ["R7"]);
}

const SECRET: &[u8] = b"callback-secret";

fn free_port() -> u16 {
	StdTcpListener::bind("127.0.0.1:0")
		.and_then(|listener| listener.local_addr())
		.expect("An ephemeral port should be available.")
		.port()
}

fn signed_callback(host: &str, body: &[u8]) -> HeaderMap {
	let mut headers = HeaderMap::new();

	headers.insert(HOST, HeaderValue::from_str(host).expect("Host should be a valid header."));
	headers.insert(DATE, HeaderValue::from_static("Tue, 07 Jun 2014 20:51:35 GMT"));
	headers.insert(
		DIGEST_HEADER,
		HeaderValue::from_str(&DigestAlgorithm::Sha256.header_value(body))
			.expect("Digest should be a valid header."),
	);
	Signer::new("callback-key", Algorithm::HmacSha256, SigningKey::Hmac(SECRET.to_vec()))
		.sign(&Method::POST, &Uri::from_static("/cb"), &mut headers)
		.expect("Signing should succeed.");

	headers
}

#[tokio::test]
async fn callback_results_complete_the_query_without_polling() {
	let port = free_port();
	let host = format!("127.0.0.1:{port}");
	let transport = Arc::new(
		ScriptedTransport::default()
			.with_reply("http://pushed.example", "R1")
			.with_results("R1", [incomplete("R1")]),
	);
	let presenter = Arc::new(RecordingPresenter::default());
	let getter = StaticKeyGetter::default()
		.with_key("callback-key", VerifyingKey::Hmac(SECRET.to_vec()));
	let callback = CallbackOptions {
		listen: host.clone(),
		url: format!("http://{host}/cb"),
		verifier: Some(Arc::new(Verifier::new(Arc::new(getter)))),
	};
	let options = EngineOptions { timeout: StdDuration::from_secs(10), ..Default::default() };
	let query_engine = engine(&transport, &presenter, options).with_callback(callback);
	let running =
		tokio::spawn(async move { query_engine.query(request(&["pushed.example"])).await });

	while !presenter.events().iter().any(|event| matches!(event, Event::Reply { .. })) {
		tokio::time::sleep(StdDuration::from_millis(10)).await;
	}

	let body = serde_json::to_vec(&completed("R1")).expect("Result should serialize.");
	let status = ReqwestClient::new()
		.post(format!("http://{host}/cb"))
		.headers(signed_callback(&host, &body))
		.body(body)
		.send()
		.await
		.expect("Callback should reach the receiver.")
		.status();

	assert_eq!(status, reqwest::StatusCode::OK);

	running
		.await
		.expect("Engine task should join.")
		.expect("Query should complete from the callback.");

	assert_eq!(transport.queries()[0].callback, format!("http://{host}/cb"));
	assert_eq!(transport.total_result_calls(), 0);
	assert_eq!(result_ids(&presenter), ["R1"]);
}
