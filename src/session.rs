//! Session tokens and the cookies that carry them.
//!
//! The gateway never stores a session. The token travels with every request,
//! either in the session header or in the ERP session cookie.

use axum::http::{HeaderMap, header::COOKIE};
use chrono::{DateTime, Duration, Utc};

const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";
const EPOCH_COOKIE_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Splits a `Cookie` request header into `(name, value)` pairs.
pub fn parse_cookie_header(header: &str) -> impl Iterator<Item = (&str, &str)> {
    header.split(';').filter_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some((name, value.trim().trim_matches('"')))
    })
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse_cookie_header)
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Explicit session header first, then the session cookie.
pub fn session_from_headers(
    headers: &HeaderMap,
    header_name: &str,
    cookie_name: &str,
) -> Option<String> {
    let explicit = headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    explicit
        .or_else(|| cookie_value(headers, cookie_name))
        .map(str::to_string)
}

/// Name of the cookie set by a raw `Set-Cookie` value.
pub fn cookie_name_of(raw: &str) -> Option<&str> {
    let (name, _) = raw.split(';').next()?.split_once('=')?;
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

/// Value of the cookie set by a raw `Set-Cookie` value.
pub fn cookie_value_of(raw: &str) -> Option<&str> {
    let (_, value) = raw.split(';').next()?.split_once('=')?;
    Some(value.trim().trim_matches('"'))
}

/// Re-targets an ERP `Set-Cookie` at the browser.
///
/// Keeps the pair and its lifetime, drops the ERP's scope and flags, and
/// applies `Path=/; HttpOnly; SameSite=Lax`.
pub fn normalize_set_cookie(raw: &str, secure: bool) -> Option<String> {
    let mut parts = raw.split(';');
    let pair = parts.next()?.trim();
    cookie_name_of(pair)?;

    let mut cookie = pair.to_string();
    for attribute in parts {
        let attribute = attribute.trim();
        let key = attribute
            .split_once('=')
            .map_or(attribute, |(key, _)| key)
            .trim()
            .to_ascii_lowercase();
        if key == "expires" || key == "max-age" {
            cookie.push_str("; ");
            cookie.push_str(attribute);
        }
    }

    cookie.push_str("; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    Some(cookie)
}

/// Builds an ERP session cookie for a token the ERP only reported in its body.
pub fn session_cookie(cookie_name: &str, token: &str, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", cookie_name, token);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Portal cookie readable by client script, valid for `max_age_days`.
pub fn portal_cookie(
    cookie_name: &str,
    user_json: &str,
    max_age_days: u32,
    secure: bool,
    now: DateTime<Utc>,
) -> String {
    let max_age = Duration::days(i64::from(max_age_days));
    let expires = now + max_age;
    let mut cookie = format!(
        "{}={}; Max-Age={}; Expires={}; Path=/; SameSite=Lax",
        cookie_name,
        encode_component(user_json),
        max_age.num_seconds(),
        expires.format(COOKIE_DATE_FORMAT)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Expires the portal cookie immediately.
pub fn clear_portal_cookie(cookie_name: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}=; Max-Age=0; Expires={}; Path=/; SameSite=Lax",
        cookie_name, EPOCH_COOKIE_DATE
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Percent-encodes everything outside the unreserved URI set.
pub fn encode_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Inverse of [`encode_component`]; malformed escapes are kept literally.
pub fn decode_component(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_cookie_header() {
        let pairs: Vec<_> =
            parse_cookie_header("a=1; session_id=XYZ ;  tz=Africa/Nairobi").collect();
        assert_eq!(
            pairs,
            vec![("a", "1"), ("session_id", "XYZ"), ("tz", "Africa/Nairobi")]
        );
    }

    #[test]
    fn test_session_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("frontend_lang=en_US; session_id=XYZ"));
        assert_eq!(
            session_from_headers(&headers, "x-openerp-session-id", "session_id"),
            Some("XYZ".to_string())
        );
    }

    #[test]
    fn test_explicit_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("session_id=FROM_COOKIE"));
        headers.insert("x-openerp-session-id", HeaderValue::from_static("FROM_HEADER"));
        assert_eq!(
            session_from_headers(&headers, "X-Openerp-Session-Id", "session_id"),
            Some("FROM_HEADER".to_string())
        );
    }

    #[test]
    fn test_no_session() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("session_id=; other=1"));
        assert_eq!(session_from_headers(&headers, "x-openerp-session-id", "session_id"), None);
    }

    #[test]
    fn test_normalize_set_cookie() {
        let raw = "session_id=ABC; Expires=Wed, 14 Jan 2026 10:00:00 GMT; Max-Age=604800; HttpOnly; Path=/web; Domain=erp.example.com; SameSite=None; Secure";
        assert_eq!(
            normalize_set_cookie(raw, false).unwrap(),
            "session_id=ABC; Expires=Wed, 14 Jan 2026 10:00:00 GMT; Max-Age=604800; Path=/; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_normalize_set_cookie_secure() {
        let cookie = normalize_set_cookie("session_id=ABC", true).unwrap();
        assert_eq!(cookie, "session_id=ABC; Path=/; HttpOnly; SameSite=Lax; Secure");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_eq!(normalize_set_cookie("no-equals-sign", false), None);
        assert_eq!(normalize_set_cookie("=value", false), None);
    }

    #[test]
    fn test_cookie_name_and_value_of() {
        let raw = "session_id=ABC; Path=/";
        assert_eq!(cookie_name_of(raw), Some("session_id"));
        assert_eq!(cookie_value_of(raw), Some("ABC"));
    }

    #[test]
    fn test_portal_cookie() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let cookie = portal_cookie("customk9_session", r#"{"id":7}"#, 30, false, now);
        assert_eq!(
            cookie,
            "customk9_session=%7B%22id%22%3A7%7D; Max-Age=2592000; Expires=Sat, 31 Jan 2026 00:00:00 GMT; Path=/; SameSite=Lax"
        );
        assert!(!cookie.contains("HttpOnly"));
    }

    #[test]
    fn test_clear_portal_cookie() {
        let cookie = clear_portal_cookie("customk9_session", true);
        assert!(cookie.starts_with("customk9_session=; Max-Age=0;"));
        assert!(cookie.ends_with("; Secure"));
    }

    #[test]
    fn test_component_round_trip() {
        let raw = r#"{"name":"Jane Doe","email":"jane@example.com"}"#;
        assert_eq!(decode_component(&encode_component(raw)), raw);
        assert_eq!(decode_component("100%"), "100%");
        assert_eq!(decode_component("%zz"), "%zz");
    }
}
