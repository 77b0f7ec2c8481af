#![cfg(all(feature = "reqwest", feature = "test"))]

// self
use oauth_delegate::{
	_preludet::*,
	adapter::{AuthorizationStart, OAuth1a},
	auth::{Params, ServiceName, StoredError, TokenStatus},
	config::ServiceRegistry,
	error::{ConfigError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient, TransportErrorMapper},
	lifecycle::TokenLifecycleManager,
	oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	store::{LockHolder, ReadOptions},
};

#[derive(Debug)]
enum FakeTransportError {
	Throttled,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Throttled => write!(f, "Transport throttled."),
		}
	}
}
impl StdError for FakeTransportError {}

#[derive(Clone, Copy)]
struct FakeHttpClient {
	retry_after: Duration,
}
impl FakeHttpClient {
	fn throttled(retry_after: Duration) -> Self {
		Self { retry_after }
	}
}
impl TokenHttpClient for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		FakeHttpHandle { slot, retry_after: self.retry_after }
	}
}

struct FakeHttpHandle {
	slot: ResponseMetadataSlot,
	retry_after: Duration,
}
impl<'a> AsyncHttpClient<'a> for FakeHttpHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let retry_after = self.retry_after;

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);
			assert!(
				request.headers().get("authorization").is_some_and(|value| value
					.to_str()
					.is_ok_and(|value| value.starts_with("OAuth "))),
				"Every provider call must carry an OAuth authorization header."
			);
			slot.store(ResponseMetadata { status: Some(429), retry_after: Some(retry_after) });

			Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Throttled)))
		})
	}
}

#[derive(Clone, Default)]
struct RecordingTransportErrorMapper {
	metadata: Arc<Mutex<Vec<Option<ResponseMetadata>>>>,
}
impl RecordingTransportErrorMapper {
	fn recorded_metadata(&self) -> Vec<Option<ResponseMetadata>> {
		self.metadata.lock().clone()
	}
}
impl TransportErrorMapper<FakeTransportError> for RecordingTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<FakeTransportError>,
	) -> Error {
		let status = meta.and_then(|value| value.status);

		self.metadata.lock().push(meta.cloned());

		match err {
			HttpClientError::Reqwest(inner) =>
				Error::remote(status, format!("Fake transport error: {inner}")),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			other => Error::remote(status, format!("Unhandled HTTP client error: {other:?}")),
		}
	}
}

fn service() -> ServiceName {
	ServiceName::new("svc").expect("Service fixture should be valid.")
}

fn registry(authorize: &str) -> ServiceRegistry {
	ServiceRegistry::from_json_str(&format!(
		r#"{{ "services": {{ "svc": {{ "default": {{
			"consumer_key": "ck",
			"consumer_secret": "cs",
			"base": "https://mock.example.com/",
			"request_token": "oauth/request_token",
			"access_token": "oauth/access_token",
			"authorize": "{authorize}"
		}} }} }} }}"#
	))
	.expect("Registry fixture should parse.")
}

fn build_manager(
	authorize: &str,
	retry_after: Duration,
) -> (TokenLifecycleManager, RecordingTransportErrorMapper) {
	let mapper = RecordingTransportErrorMapper::default();
	let adapter: OAuth1a<FakeHttpClient, RecordingTransportErrorMapper> =
		OAuth1a::new(FakeHttpClient::throttled(retry_after), mapper.clone());
	let (manager, _) = build_test_manager(registry(authorize), Arc::new(adapter));

	(manager, mapper)
}

#[tokio::test]
async fn fake_token_http_client_surfaces_metadata() {
	let (manager, mapper) = build_manager("", Duration::seconds(5));
	let start = manager
		.request_authorization(&service(), Params::new())
		.await
		.expect("Two-legged services are granted without a provider call.");

	assert_eq!(start, AuthorizationStart::Granted);

	let err = manager
		.get(&service(), "v1/me", Params::new())
		.await
		.expect_err("Request should be throttled with HTTP 429.");

	match err {
		Error::Remote { status, detail } => {
			assert_eq!(status, Some(429));
			assert!(detail.contains("Transport throttled"));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	let recorded = mapper.recorded_metadata();

	assert_eq!(recorded.len(), 1);
	assert_eq!(
		recorded[0].as_ref().and_then(|meta| meta.retry_after),
		Some(Duration::seconds(5))
	);
}

#[tokio::test]
async fn failed_authorization_start_is_persisted() {
	let (manager, mapper) =
		build_manager("https://mock.example.com/authorize", Duration::seconds(30));
	let err = manager
		.request_authorization(&service(), Params::from([("nonce".into(), "n1".into())]))
		.await
		.expect_err("Request-token fetch should be throttled.");

	assert!(matches!(err, Error::Remote { status: Some(429), .. }));
	assert_eq!(mapper.recorded_metadata().len(), 1);

	let record = manager
		.store()
		.read(
			"default",
			&manager.temp_key(&service(), "n1"),
			LockHolder::next(),
			ReadOptions::default(),
		)
		.await
		.expect("Reading the temp record should succeed.")
		.expect("Failed starts are persisted.");

	assert_eq!(record.status(), TokenStatus::Unauthorized);
	assert!(matches!(
		record.error,
		Some(StoredError::Remote { status: Some(429), ref detail })
			if detail.contains("Transport throttled")
	));
}
