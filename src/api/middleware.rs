/// Token extraction and auth cookie helpers
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read a non-empty cookie value
pub fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Access token from the `accessToken` cookie, falling back to the bearer header
pub fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    cookie_value(&jar, ACCESS_TOKEN_COOKIE).or_else(|| extract_bearer_token(headers))
}

/// Set both token cookies (HttpOnly, Path=/, Secure in production)
pub fn set_token_cookies(
    jar: CookieJar,
    access_token: &str,
    refresh_token: &str,
    secure: bool,
) -> CookieJar {
    jar.add(token_cookie(ACCESS_TOKEN_COOKIE, access_token.to_string(), secure))
        .add(token_cookie(REFRESH_TOKEN_COOKIE, refresh_token.to_string(), secure))
}

/// Expire both token cookies, whether or not the request carried them
pub fn clear_token_cookies(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(removal_cookie(ACCESS_TOKEN_COOKIE, secure))
        .add(removal_cookie(REFRESH_TOKEN_COOKIE, secure))
}

fn removal_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .http_only(true)
        .secure(secure)
        .path("/")
        .removal()
        .build()
}

fn token_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .path("/")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers), Some("abc.def".to_string()));
    }

    #[test]
    fn test_cookie_takes_precedence_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_access_token(&headers), Some("from-header".to_string()));

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; accessToken=from-cookie"),
        );
        assert_eq!(extract_access_token(&headers), Some("from-cookie".to_string()));
    }

    #[test]
    fn test_token_cookie_attributes() {
        let cookie = token_cookie(ACCESS_TOKEN_COOKIE, "abc".to_string(), true);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));

        let insecure = token_cookie(REFRESH_TOKEN_COOKIE, "abc".to_string(), false);
        assert_eq!(insecure.secure(), Some(false));
    }
}
