//! Request signing for the xfyun WebSocket handshake.
//!
//! The service authenticates the upgrade request from three query parameters:
//!
//! ```text
//! canonical     = "host: {host}\ndate: {date}\nGET {path} HTTP/1.1"
//! signature     = base64(hmac_sha256(api_secret, canonical))
//! descriptor    = api_key="…", algorithm="hmac-sha256", headers="host date request-line", signature="…"
//! authorization = base64(descriptor)
//! url           = {endpoint}?authorization={pct(authorization)}&date={pct(date)}&host={host}
//! ```
//!
//! The descriptor is base64-encoded a second time because the service expects
//! it that way. Both `authorization` and `date` must be percent-encoded: the
//! base64 alphabet contains `+`, `/` and `=`.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;
use url::Url;

use super::config::XfyunCredentials;
use super::{REQUEST_LINE_PROTOCOL, SIGNATURE_ALGORITHM, SIGNED_HEADERS};
use crate::core::tts::xfyun::client::SynthesisError;

type HmacSha256 = Hmac<Sha256>;

/// RFC-1123 layout used in the `date` parameter.
const RFC1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Everything derived from the credentials for one handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Host as it appears in the canonical string and the `host` parameter.
    pub host: String,
    /// RFC-1123 date that was signed.
    pub date: String,
    /// Base64 HMAC-SHA256 digest of the canonical string.
    pub signature: String,
    /// Base64 of the full authorization descriptor.
    pub authorization: String,
}

/// Formats a timestamp the way the service expects (`Sun, 18 Oct 2026 08:00:00 GMT`).
pub fn rfc1123(at: DateTime<Utc>) -> String {
    at.format(RFC1123_FORMAT).to_string()
}

/// Current wall-clock time in RFC-1123 form.
pub fn rfc1123_now() -> String {
    rfc1123(Utc::now())
}

/// Builds the canonical request line that gets signed.
pub fn canonical_string(host: &str, date: &str, path: &str) -> String {
    format!("host: {host}\ndate: {date}\nGET {path} {REQUEST_LINE_PROTOCOL}")
}

/// Signs a request for `host`/`path` at `date`.
///
/// Pure function of its inputs: identical arguments give byte-identical output.
pub fn sign_request(
    host: &str,
    path: &str,
    date: &str,
    credentials: &XfyunCredentials,
) -> Result<SignedRequest, SynthesisError> {
    let canonical = canonical_string(host, date, path);

    let mut mac = HmacSha256::new_from_slice(credentials.api_secret.as_bytes()).map_err(|e| {
        SynthesisError::InvalidConfiguration(format!("Unusable API secret: {e}"))
    })?;
    mac.update(canonical.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    let descriptor = format!(
        "api_key=\"{}\", algorithm=\"{SIGNATURE_ALGORITHM}\", headers=\"{SIGNED_HEADERS}\", signature=\"{signature}\"",
        credentials.api_key
    );
    let authorization = BASE64.encode(descriptor.as_bytes());

    Ok(SignedRequest {
        host: host.to_string(),
        date: date.to_string(),
        signature,
        authorization,
    })
}

/// Percent-encodes a query component like JavaScript's `encodeURIComponent`.
///
/// `form_urlencoded` already escapes `+`, `/`, `=`, `,` and `:`; the only
/// difference is that it writes spaces as `+`, which is rewritten to `%20`.
pub fn encode_query_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Host string for signing: includes the port only when it is not the
/// scheme's default.
pub fn signing_host(endpoint: &Url) -> Result<String, SynthesisError> {
    let host = endpoint.host_str().ok_or_else(|| {
        SynthesisError::InvalidConfiguration(format!("Endpoint has no host: {endpoint}"))
    })?;
    Ok(match endpoint.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Signs a request for `endpoint` at `date` and returns the session URL
/// together with the signed descriptor.
pub fn build_session_url(
    endpoint: &Url,
    date: &str,
    credentials: &XfyunCredentials,
) -> Result<(String, SignedRequest), SynthesisError> {
    let host = signing_host(endpoint)?;
    let signed = sign_request(&host, endpoint.path(), date, credentials)?;

    let mut base = endpoint.clone();
    base.set_query(None);
    base.set_fragment(None);

    let url = format!(
        "{base}?authorization={}&date={}&host={}",
        encode_query_component(&signed.authorization),
        encode_query_component(&signed.date),
        encode_query_component(&signed.host),
    );

    debug!(host = %signed.host, date = %signed.date, "Signed xfyun session URL");
    Ok((url, signed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HOST: &str = "tts-api.xfyun.cn";
    const DATE: &str = "Sun, 18 Oct 2026 08:00:00 GMT";

    fn credentials() -> XfyunCredentials {
        XfyunCredentials::new("test-app", "test-api-key", "test-api-secret")
    }

    fn query_param(url: &str, name: &str) -> Option<String> {
        let parsed = Url::parse(url).unwrap();
        parsed
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_rfc1123_format() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap();
        assert_eq!(rfc1123(at), DATE);

        let at = Utc.with_ymd_and_hms(2026, 3, 4, 23, 5, 9).unwrap();
        assert_eq!(rfc1123(at), "Wed, 04 Mar 2026 23:05:09 GMT");
    }

    #[test]
    fn test_canonical_string() {
        assert_eq!(
            canonical_string(HOST, DATE, "/v2/tts"),
            "host: tts-api.xfyun.cn\ndate: Sun, 18 Oct 2026 08:00:00 GMT\nGET /v2/tts HTTP/1.1"
        );
    }

    #[test]
    fn test_sign_request_known_vector() {
        let signed = sign_request(HOST, "/v2/tts", DATE, &credentials()).unwrap();

        assert_eq!(signed.signature, "79JQKs0Bz2yhBVKiEYjChNCqxhpqMgLdeE6oW2n0jMs=");
        assert_eq!(
            signed.authorization,
            "YXBpX2tleT0idGVzdC1hcGkta2V5IiwgYWxnb3JpdGhtPSJobWFjLXNoYTI1NiIsIGhlYWRlcnM9Imhvc3QgZGF0ZSByZXF1ZXN0LWxpbmUiLCBzaWduYXR1cmU9Ijc5SlFLczBCejJ5aEJWS2lFWWpDaE5DcXhocHFNZ0xkZUU2b1cybjBqTXM9Ig=="
        );
    }

    #[test]
    fn test_sign_request_is_deterministic() {
        let first = sign_request(HOST, "/v2/tts", DATE, &credentials()).unwrap();
        for _ in 0..5 {
            assert_eq!(sign_request(HOST, "/v2/tts", DATE, &credentials()).unwrap(), first);
        }

        let other_date = sign_request(HOST, "/v2/tts", "Mon, 19 Oct 2026 08:00:00 GMT", &credentials()).unwrap();
        assert_ne!(other_date.signature, first.signature);
    }

    #[test]
    fn test_authorization_is_double_encoded() {
        let signed = sign_request(HOST, "/v2/tts", DATE, &credentials()).unwrap();
        let descriptor = String::from_utf8(BASE64.decode(&signed.authorization).unwrap()).unwrap();

        assert_eq!(
            descriptor,
            format!(
                "api_key=\"test-api-key\", algorithm=\"hmac-sha256\", headers=\"host date request-line\", signature=\"{}\"",
                signed.signature
            )
        );
        // The inner signature is itself base64 of a 32-byte digest
        assert_eq!(BASE64.decode(&signed.signature).unwrap().len(), 32);
    }

    #[test]
    fn test_encode_query_component_matches_encode_uri_component() {
        assert_eq!(encode_query_component("a+b/c=="), "a%2Bb%2Fc%3D%3D");
        assert_eq!(
            encode_query_component(DATE),
            "Sun%2C%2018%20Oct%202026%2008%3A00%3A00%20GMT"
        );
        assert_eq!(encode_query_component("plain-text_1.0"), "plain-text_1.0");
    }

    #[test]
    fn test_session_url_layout() {
        let endpoint = Url::parse("wss://tts-api.xfyun.cn/v2/tts").unwrap();
        let (url, signed) = build_session_url(&endpoint, DATE, &credentials()).unwrap();

        assert!(url.starts_with("wss://tts-api.xfyun.cn/v2/tts?authorization="));
        assert!(url.contains("&date=Sun%2C%2018%20Oct%202026%2008%3A00%3A00%20GMT"));
        assert!(url.ends_with("&host=tts-api.xfyun.cn"));
        assert_eq!(signed.host, HOST);
    }

    #[test]
    fn test_session_url_round_trips_reserved_characters() {
        let endpoint = Url::parse("wss://tts-api.xfyun.cn/v2/tts").unwrap();

        // Three '?' or '~' in a row put one of them last in a base64 group,
        // which encodes to '/' or '+'
        for i in 0..16 {
            let creds = XfyunCredentials::new(
                "app",
                format!("key-{i}-???~~~>>>"),
                format!("secret-{i}"),
            );
            let (url, signed) = build_session_url(&endpoint, DATE, &creds).unwrap();

            assert!(signed.authorization.contains('/'));
            assert!(signed.authorization.contains('+'));
            assert_eq!(query_param(&url, "authorization").unwrap(), signed.authorization);
            assert_eq!(query_param(&url, "date").unwrap(), DATE);
            assert_eq!(query_param(&url, "host").unwrap(), HOST);

            let raw_query = url.split_once('?').unwrap().1;
            assert!(!raw_query.contains('+'));
            assert!(!raw_query.contains('/'));
            assert!(raw_query.contains("%2B"));
            assert!(raw_query.contains("%2F"));
            assert!(!raw_query.split('&').any(|p| p.matches('=').count() > 1));
        }
    }

    #[test]
    fn test_sign_request_accepts_empty_secret() {
        let creds = XfyunCredentials::new("app", "key", "");
        let signed = sign_request(HOST, "/v2/tts", DATE, &creds).unwrap();
        assert!(!signed.signature.is_empty());
    }

    #[test]
    fn test_signing_host_keeps_non_default_port() {
        let endpoint = Url::parse("ws://127.0.0.1:9001/v2/tts").unwrap();
        assert_eq!(signing_host(&endpoint).unwrap(), "127.0.0.1:9001");

        let endpoint = Url::parse("wss://tts-api.xfyun.cn:443/v2/tts").unwrap();
        assert_eq!(signing_host(&endpoint).unwrap(), "tts-api.xfyun.cn");
    }

    #[test]
    fn test_session_url_drops_existing_query() {
        let endpoint = Url::parse("wss://tts-api.xfyun.cn/v2/tts?stale=1").unwrap();
        let (url, _) = build_session_url(&endpoint, DATE, &credentials()).unwrap();
        assert!(!url.contains("stale"));
    }
}
