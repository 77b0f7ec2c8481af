//! OAuth 1.0a signature base strings, digests, and `Authorization` headers.

// std
use std::borrow::Cow;
// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::{Rng, distr::Alphanumeric};
use ring::hmac;
// self
use crate::{_prelude::*, auth::Params, config::SignatureMethod};

/// Value of `oauth_version`.
pub const OAUTH_VERSION: &str = "1.0";

const NONCE_LEN: usize = 32;

/// Percent-encodes `value` with the RFC 3986 unreserved set (`A-Z a-z 0-9 - . _ ~`).
pub fn encode(value: &str) -> Cow<'_, str> {
	urlencoding::encode(value)
}

/// Renders `url` as lowercase `scheme://host[:port]/path`, dropping default ports, query, and
/// fragment.
///
/// The whole string is lowercased, path included, so signatures match providers that
/// canonicalize the request URL that way.
pub fn normalized_url(url: &Url) -> String {
	let mut rendered = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());

	if let Some(port) = url.port() {
		rendered.push_str(&format!(":{port}"));
	}

	rendered.push_str(url.path());

	rendered.to_lowercase()
}

/// Builds the signature base string.
///
/// `params` holds protocol and request parameters; query parameters of `url` are merged in.
/// Pairs are percent-encoded and then sorted byte-wise by name, then value, so the result
/// does not depend on insertion order.
pub fn signature_base_string<'a, I>(method: &str, url: &Url, params: I) -> String
where
	I: IntoIterator<Item = (&'a str, &'a str)>,
{
	let query = url.query_pairs().map(|(k, v)| (encode(&k).into_owned(), encode(&v).into_owned()));
	let mut pairs = params
		.into_iter()
		.map(|(k, v)| (encode(k).into_owned(), encode(v).into_owned()))
		.chain(query)
		.collect::<Vec<_>>();

	pairs.sort();

	let joined = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");

	format!(
		"{}&{}&{}",
		method.to_ascii_uppercase(),
		encode(&normalized_url(url)),
		encode(&joined)
	)
}

/// Builds the signing key `enc(consumer_secret)&enc(token_secret)`.
pub fn signing_key(consumer_secret: &str, token_secret: &str) -> String {
	format!("{}&{}", encode(consumer_secret), encode(token_secret))
}

/// Produces the `oauth_signature` value for `base`.
pub fn sign(method: SignatureMethod, base: &str, key: &str) -> String {
	match method {
		SignatureMethod::HmacSha1 => {
			let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key.as_bytes());

			STANDARD.encode(hmac::sign(&key, base.as_bytes()).as_ref())
		},
		SignatureMethod::Plaintext => key.to_owned(),
	}
}

/// Generates a random alphanumeric `oauth_nonce`.
pub fn nonce() -> String {
	rand::rng().sample_iter(&Alphanumeric).take(NONCE_LEN).map(char::from).collect()
}

/// Renders the `Authorization: OAuth ...` header value from the protocol parameters.
pub fn authorization_header(oauth_params: &Params, realm: Option<&str>) -> String {
	let realm = realm.map(|realm| format!("realm=\"{}\"", encode(realm)));
	let fields = oauth_params.iter().map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)));

	format!("OAuth {}", realm.into_iter().chain(fields).collect::<Vec<_>>().join(", "))
}

/// Protocol parameters plus the header that carries them, for one outgoing request.
#[derive(Clone, Debug)]
pub struct SignedRequest {
	/// Protocol parameters including `oauth_signature`.
	pub oauth: Params,
	/// `Authorization` header value.
	pub authorization: String,
}

/// Assembles and signs the protocol parameters of one request.
#[derive(Clone, Debug)]
pub struct RequestSigner<'a> {
	method: SignatureMethod,
	consumer_key: &'a str,
	consumer_secret: &'a str,
	realm: Option<&'a str>,
	token: Option<&'a str>,
	token_secret: &'a str,
	extra: Params,
	nonce: String,
	timestamp: i64,
}
impl<'a> RequestSigner<'a> {
	/// Starts a signer for consumer-only requests with a fresh nonce and the current time.
	pub fn new(method: SignatureMethod, consumer_key: &'a str, consumer_secret: &'a str) -> Self {
		Self {
			method,
			consumer_key,
			consumer_secret,
			realm: None,
			token: None,
			token_secret: "",
			extra: Params::new(),
			nonce: nonce(),
			timestamp: OffsetDateTime::now_utc().unix_timestamp(),
		}
	}

	/// Sets the `realm` header field.
	pub fn with_realm(mut self, realm: Option<&'a str>) -> Self {
		self.realm = realm;

		self
	}

	/// Signs on behalf of a token.
	pub fn with_token(mut self, token: &'a str, token_secret: &'a str) -> Self {
		self.token = Some(token);
		self.token_secret = token_secret;

		self
	}

	/// Adds a protocol parameter such as `oauth_callback` or `oauth_verifier`.
	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra.insert(key.into(), value.into());

		self
	}

	/// Pins the nonce and timestamp, for reproducible signatures.
	pub fn with_nonce_and_timestamp(mut self, nonce: impl Into<String>, timestamp: i64) -> Self {
		self.nonce = nonce.into();
		self.timestamp = timestamp;

		self
	}

	/// Signs a request for `method url` carrying `data` as query or body parameters.
	pub fn sign(self, method: &str, url: &Url, data: &Params) -> SignedRequest {
		let mut oauth = self.extra;

		oauth.insert("oauth_consumer_key".into(), self.consumer_key.into());
		oauth.insert("oauth_nonce".into(), self.nonce);
		oauth.insert("oauth_signature_method".into(), self.method.as_str().into());
		oauth.insert("oauth_timestamp".into(), self.timestamp.to_string());
		oauth.insert("oauth_version".into(), OAUTH_VERSION.into());

		if let Some(token) = self.token {
			oauth.insert("oauth_token".into(), token.into());
		}

		let params = oauth.iter().chain(data.iter()).map(|(k, v)| (k.as_str(), v.as_str()));
		let base = signature_base_string(method, url, params);
		let signature =
			sign(self.method, &base, &signing_key(self.consumer_secret, self.token_secret));

		oauth.insert("oauth_signature".into(), signature);

		let authorization = authorization_header(&oauth, self.realm);

		SignedRequest { oauth, authorization }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const CONSUMER_SECRET: &str = "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw";
	const TOKEN_SECRET: &str = "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE";

	fn status_update() -> (Url, Params) {
		let url =
			Url::parse("https://api.twitter.com/1.1/statuses/update.json?include_entities=true")
				.expect("Fixture URL should parse.");
		let data = Params::from([(
			"status".to_owned(),
			"Hello Ladies + Gentlemen, a signed OAuth request!".to_owned(),
		)]);

		(url, data)
	}

	fn signer() -> RequestSigner<'static> {
		RequestSigner::new(SignatureMethod::HmacSha1, "xvz1evFS4wEEPTGEFPHBog", CONSUMER_SECRET)
			.with_token("370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb", TOKEN_SECRET)
			.with_nonce_and_timestamp("kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg", 1_318_622_958)
	}

	#[test]
	fn hmac_sha1_matches_published_vector() {
		let (url, data) = status_update();
		let signed = signer().sign("post", &url, &data);

		assert_eq!(
			signed.oauth.get("oauth_signature").map(String::as_str),
			Some("hCtSmYh+iHYCEqBWrE7C7hYmtUk=")
		);
		assert!(
			signed.authorization.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\"")
		);
		assert!(
			signed.authorization.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\"")
		);
	}

	#[test]
	fn base_string_ignores_insertion_order() {
		let url = Url::parse("HTTPS://Example.COM:443/Path").expect("Fixture URL should parse.");
		let forward = signature_base_string("get", &url, [("b", "2"), ("a", "1"), ("a", "0")]);
		let backward = signature_base_string("GET", &url, [("a", "0"), ("a", "1"), ("b", "2")]);

		assert_eq!(forward, backward);
		assert_eq!(forward, "GET&https%3A%2F%2Fexample.com%2Fpath&a%3D0%26a%3D1%26b%3D2");
	}

	#[test]
	fn base_string_lowercases_the_whole_url() {
		let url = Url::parse("https://Example.com/Photos/List?Sort=Asc")
			.expect("Fixture URL should parse.");

		assert_eq!(normalized_url(&url), "https://example.com/photos/list");
		assert_eq!(
			signature_base_string("GET", &url, [("a", "1")]),
			"GET&https%3A%2F%2Fexample.com%2Fphotos%2Flist&Sort%3DAsc%26a%3D1"
		);
	}

	#[test]
	fn ordering_is_byte_wise() {
		let url = Url::parse("http://example.com:8080/").expect("Fixture URL should parse.");
		let base = signature_base_string("GET", &url, [("a", "x"), ("Z", "y"), ("_", "z")]);

		assert_eq!(base, "GET&http%3A%2F%2Fexample.com%3A8080%2F&Z%3Dy%26_%3Dz%26a%3Dx");
	}

	#[test]
	fn encoding_uses_rfc3986_unreserved_set() {
		assert_eq!(encode("a b+c~d*e"), "a%20b%2Bc~d%2Ae");
	}

	#[test]
	fn plaintext_signature_is_the_key() {
		let key = signing_key("c s", "");

		assert_eq!(key, "c%20s&");
		assert_eq!(sign(SignatureMethod::Plaintext, "ignored", &key), "c%20s&");
	}

	#[test]
	fn nonces_are_alphanumeric_and_distinct() {
		let first = nonce();

		assert_eq!(first.len(), NONCE_LEN);
		assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
		assert_ne!(first, nonce());
	}

	#[test]
	fn header_carries_realm_first() {
		let oauth = Params::from([("oauth_token".to_owned(), "t k".to_owned())]);

		assert_eq!(
			authorization_header(&oauth, Some("Photos")),
			"OAuth realm=\"Photos\", oauth_token=\"t%20k\""
		);
	}
}
