//! Secret cookie encoding and extraction.

use axum::http::header::{InvalidHeaderValue, COOKIE};
use axum::http::{HeaderMap, HeaderValue};

use super::SecretToken;

/// Build the `Set-Cookie` value carrying `token`.
///
/// The cookie is `HttpOnly` and `SameSite=Strict`; `Max-Age` matches the
/// token TTL.
pub fn set_cookie(
    name: &str,
    token: &SecretToken,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut value = format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Strict",
        name,
        token.as_str(),
        token.ttl().as_secs()
    );
    if secure {
        value.push_str("; Secure");
    }
    HeaderValue::from_str(&value)
}

/// Iterate `(name, value)` pairs across every `Cookie` header.
fn pairs(headers: &HeaderMap) -> impl Iterator<Item = (&str, &str)> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim(), value.trim().trim_matches('"')))
        })
}

/// The value of the first cookie called `name`, if any.
pub fn find<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    pairs(headers)
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

/// Remove the cookie called `name` from the request headers. Every other
/// segment is kept as sent, merged into a single `Cookie` header.
pub fn strip(headers: &mut HeaderMap, name: &str) {
    let mut kept: Vec<String> = Vec::new();
    let mut opaque: Vec<HeaderValue> = Vec::new();
    for value in headers.get_all(COOKIE) {
        let Ok(text) = value.to_str() else {
            opaque.push(value.clone());
            continue;
        };
        kept.extend(
            text.split(';')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .filter(|segment| {
                    let n = segment.split_once('=').map_or(*segment, |(n, _)| n);
                    n.trim() != name
                })
                .map(str::to_string),
        );
    }

    headers.remove(COOKIE);
    if !kept.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&kept.join("; ")) {
            headers.insert(COOKIE, value);
        }
    }
    for value in opaque {
        headers.append(COOKIE, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretPolicy;
    use crate::secrets::SecretIssuer;
    use std::time::Duration;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for c in cookies {
            map.append(COOKIE, HeaderValue::from_str(c).unwrap());
        }
        map
    }

    #[test]
    fn test_set_cookie_attributes() {
        let issuer = SecretIssuer::new(Duration::from_secs(3600), SecretPolicy::SingleUse);
        let token = issuer.issue();

        let value = set_cookie("secret", &token, false).unwrap();
        let value = value.to_str().unwrap();
        assert!(value.starts_with(&format!("secret={};", token.as_str())));
        assert!(value.contains("Max-Age=3600"));
        assert!(value.contains("HttpOnly"));
        assert!(!value.contains("Secure"));

        let secure = set_cookie("secret", &token, true).unwrap();
        assert!(secure.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_find() {
        let map = headers(&["theme=dark; secret=abc123", "other=1"]);
        assert_eq!(find(&map, "secret"), Some("abc123"));
        assert_eq!(find(&map, "other"), Some("1"));
        assert_eq!(find(&map, "missing"), None);

        assert_eq!(find(&headers(&["secret="]), "secret"), None);
        assert_eq!(find(&HeaderMap::new(), "secret"), None);
    }

    #[test]
    fn test_find_does_not_match_prefix() {
        let map = headers(&["my_secret=nope"]);
        assert_eq!(find(&map, "secret"), None);
    }

    #[test]
    fn test_strip() {
        let mut map = headers(&["theme=dark; secret=abc123", "lang=en"]);
        strip(&mut map, "secret");
        assert_eq!(map.get(COOKIE).unwrap(), "theme=dark; lang=en");
        assert_eq!(find(&map, "secret"), None);

        let mut only = headers(&["secret=abc123"]);
        strip(&mut only, "secret");
        assert!(only.get(COOKIE).is_none());
    }

    #[test]
    fn test_strip_keeps_other_segments_verbatim() {
        let mut map = headers(&[r#"flag; secret=abc123; q="quoted value"; a=b=c"#]);
        strip(&mut map, "secret");
        assert_eq!(
            map.get(COOKIE).unwrap(),
            r#"flag; q="quoted value"; a=b=c"#
        );

        let mut bare = headers(&["secret; theme=dark"]);
        strip(&mut bare, "secret");
        assert_eq!(bare.get(COOKIE).unwrap(), "theme=dark");
    }
}
