//! Provider response parsing for token fetches and resource calls.

// crates.io
use oauth2::{
	HttpResponse,
	http::header::{CONTENT_TYPE, WWW_AUTHENTICATE},
};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{Params, TokenFields},
};

/// Largest Unix timestamp stored for expiries, so 32-bit consumers never overflow.
pub const MAX_EXPIRY: i64 = 2_147_483_646;

/// Relative expiry hints converted to absolute `*_expires_at` fields.
pub const EXPIRY_FIELDS: [(&str, &str); 2] = [
	("oauth_expires_in", "oauth_expires_at"),
	("oauth_authorization_expires_in", "oauth_authorization_expires_at"),
];

const DETAIL_LIMIT: usize = 256;

/// Returns `now + expires_in`, saturating and clamped to [`MAX_EXPIRY`].
pub fn clamp_expiry(now: i64, expires_in: i64) -> i64 {
	now.saturating_add(expires_in).min(MAX_EXPIRY)
}

/// Parses a form-encoded (or JSON object) body into flat parameters.
pub fn parse_params(response: &HttpResponse) -> Params {
	let body = response.body();
	let is_json = response
		.headers()
		.get(CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.is_some_and(|value| value.contains("json"))
		|| body.first() == Some(&b'{');

	if is_json && let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(body) {
		return object
			.into_iter()
			.map(|(k, v)| {
				let v = match v {
					Value::String(s) => s,
					other => other.to_string(),
				};

				(k, v)
			})
			.collect();
	}

	url::form_urlencoded::parse(body).into_owned().collect()
}

/// Extracts an OAuth problem report from the body or the `WWW-Authenticate` header.
pub fn problem(response: &HttpResponse, params: &Params) -> Option<String> {
	if let Some(problem) = params.get("oauth_problem") {
		return Some(match params.get("oauth_problem_advice") {
			Some(advice) => format!("{problem} ({advice})"),
			None => problem.clone(),
		});
	}

	let header = response.headers().get(WWW_AUTHENTICATE)?.to_str().ok()?;
	let (_, rest) = header.split_once("oauth_problem=")?;
	let problem = rest.trim_start_matches('"').split(['"', ',']).next()?.trim();

	(!problem.is_empty()).then(|| problem.to_owned())
}

/// Fails with [`Error::Remote`] unless the response is a success without a problem report.
pub fn ensure_success(response: &HttpResponse, params: &Params) -> Result<()> {
	let status = response.status();
	let problem = problem(response, params);

	if status.is_success() && problem.is_none() {
		return Ok(());
	}

	let detail = problem.unwrap_or_else(|| {
		let body = String::from_utf8_lossy(response.body());
		let body = body.trim();

		if body.is_empty() {
			status.canonical_reason().unwrap_or("Unexpected response").to_owned()
		} else {
			body.chars().take(DETAIL_LIMIT).collect()
		}
	});

	Err(Error::remote(Some(status.as_u16()), detail))
}

/// Converts a token response into stored credential fields.
///
/// Requires `oauth_token` and `oauth_token_secret`; relative expiry hints become absolute
/// clamped timestamps.
pub fn token_fields(params: Params, status: u16, now: OffsetDateTime) -> Result<TokenFields> {
	for required in ["oauth_token", "oauth_token_secret"] {
		if !params.contains_key(required) {
			return Err(Error::remote(
				Some(status),
				format!("Token response is missing `{required}`"),
			));
		}
	}

	let mut fields = params.into_iter().collect::<TokenFields>();

	for (relative, absolute) in EXPIRY_FIELDS {
		let Some(raw) = fields.remove(relative) else { continue };
		let expires_in = raw.trim().parse::<i64>().map_err(|_| {
			Error::remote(Some(status), format!("Token response has a malformed `{relative}`"))
		})?;

		fields.insert(absolute, clamp_expiry(now.unix_timestamp(), expires_in).to_string());
	}

	Ok(fields)
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{HeaderValue, StatusCode};
	use time::macros;
	// self
	use super::*;

	fn response(status: u16, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() = StatusCode::from_u16(status).expect("Status should be valid.");

		response
	}

	#[test]
	fn expiry_is_clamped_to_signed_32_bit_range() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let params = Params::from([
			("oauth_token".to_owned(), "t".to_owned()),
			("oauth_token_secret".to_owned(), "s".to_owned()),
			("oauth_expires_in".to_owned(), "4000000000".to_owned()),
			("oauth_authorization_expires_in".to_owned(), "60".to_owned()),
		]);
		let fields = token_fields(params, 200, now).expect("Token response should parse.");

		assert_eq!(fields.get("oauth_expires_at"), Some("2147483646"));
		assert_eq!(
			fields.get("oauth_authorization_expires_at"),
			Some((now.unix_timestamp() + 60).to_string().as_str())
		);
		assert_eq!(fields.get("oauth_expires_in"), None);
		assert_eq!(clamp_expiry(i64::MAX - 1, i64::MAX), MAX_EXPIRY);
	}

	#[test]
	fn missing_token_secret_is_a_remote_error() {
		let params = Params::from([("oauth_token".to_owned(), "t".to_owned())]);
		let err = token_fields(params, 200, OffsetDateTime::now_utc())
			.expect_err("A token secret is mandatory.");

		assert!(err.to_string().contains("oauth_token_secret"));
	}

	#[test]
	fn form_and_json_bodies_parse() {
		let form = parse_params(&response(200, "oauth_token=a%20b&oauth_token_secret=s"));

		assert_eq!(form.get("oauth_token").map(String::as_str), Some("a b"));

		let json = parse_params(&response(200, r#"{"oauth_token":"t","oauth_expires_in":3600}"#));

		assert_eq!(json.get("oauth_token").map(String::as_str), Some("t"));
		assert_eq!(json.get("oauth_expires_in").map(String::as_str), Some("3600"));
	}

	#[test]
	fn problems_surface_from_body_and_header() {
		let body = response(200, "oauth_problem=token_rejected&oauth_problem_advice=retry");
		let err = ensure_success(&body, &parse_params(&body)).expect_err("Problem must fail.");

		assert!(matches!(
			&err,
			Error::Remote { status: Some(200), detail } if detail == "token_rejected (retry)"
		));

		let mut header = response(401, "");

		header.headers_mut().insert(
			WWW_AUTHENTICATE,
			HeaderValue::from_static("OAuth realm=\"x\", oauth_problem=\"signature_invalid\""),
		);

		let err = ensure_success(&header, &Params::new()).expect_err("401 must fail.");

		assert!(matches!(
			&err,
			Error::Remote { status: Some(401), detail } if detail == "signature_invalid"
		));

		let plain = response(500, "");
		let err = ensure_success(&plain, &Params::new()).expect_err("500 must fail.");

		assert!(err.to_string().contains("Internal Server Error"));
	}
}
