//! OAuth 1.0a request signing (HMAC-SHA1) for the Twitter media and tweet
//! endpoints.
//!
//! The signature base string is built from the canonicalized request
//! parameters per RFC 5849: every key and value percent-encoded with the
//! unreserved set, sorted, joined with `&`, then
//! `METHOD&enc(url)&enc(param_string)` signed with
//! `enc(consumer_secret)&enc(token_secret)`.

use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::Rng;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters stay literal; everything else is encoded.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The two credential pairs required to sign a request.
#[derive(Debug, Clone)]
pub struct Oauth1Credentials {
    /// Consumer (API) key.
    pub consumer_key: String,
    /// Consumer (API) secret.
    pub consumer_secret: String,
    /// User access token.
    pub token: String,
    /// User access token secret.
    pub token_secret: String,
}

/// Percent-encode a string with the OAuth unreserved set.
fn encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

/// Compute the base64 HMAC-SHA1 signature over the canonical base string.
fn sign_base_string(base: &str, consumer_secret: &str, token_secret: &str) -> String {
    let signing_key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac =
        HmacSha1::new_from_slice(signing_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(base.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Build an `Authorization: OAuth ...` header value for one request.
///
/// `params` must contain every request parameter that participates in the
/// signature: query-string parameters and form-encoded body parameters.
/// JSON bodies contribute nothing.
pub fn authorization_header(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    credentials: &Oauth1Credentials,
) -> String {
    let nonce: String = {
        let mut rng = rand::thread_rng();
        (0..32)
            .map(|_| {
                let idx = rng.gen_range(0..16);
                char::from_digit(idx, 16).unwrap_or('0')
            })
            .collect()
    };
    let timestamp = chrono::Utc::now().timestamp().to_string();
    authorization_header_with(method, url, params, credentials, &nonce, &timestamp)
}

/// Deterministic variant of [`authorization_header`] for testing.
pub fn authorization_header_with(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    credentials: &Oauth1Credentials,
    nonce: &str,
    timestamp: &str,
) -> String {
    let oauth_params: [(&str, &str); 6] = [
        ("oauth_consumer_key", credentials.consumer_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", credentials.token.as_str()),
        ("oauth_version", "1.0"),
    ];

    // Canonical parameter string: request + oauth params, encoded then sorted.
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .chain(oauth_params.iter())
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&param_string)
    );

    let signature = sign_base_string(
        &base,
        &credentials.consumer_secret,
        &credentials.token_secret,
    );

    let mut header_params: Vec<(String, String)> = oauth_params
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    header_params.push(("oauth_signature".to_string(), signature));
    header_params.sort();

    let rendered = header_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");

    format!("OAuth {rendered}")
}
