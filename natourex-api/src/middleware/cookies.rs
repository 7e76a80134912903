/// Cookie parsing
///
/// Parses every `Cookie` header once and stores the result as a [`Cookies`]
/// request extension, read by `protect` for the `jwt` cookie.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::convert::Infallible;

/// Cookies sent with the request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cookies(HashMap<String, String>);

impl Cookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = HashMap::new();

        for value in headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for pair in value.split(';') {
                if let Some((name, val)) = pair.split_once('=') {
                    let name = name.trim();
                    if !name.is_empty() {
                        cookies.insert(name.to_string(), val.trim().trim_matches('"').to_string());
                    }
                }
            }
        }

        Self(cookies)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

pub async fn parse_cookies(mut request: Request, next: Next) -> Response {
    let cookies = Cookies::from_headers(request.headers());
    request.extensions_mut().insert(cookies);
    next.run(request).await
}

/// Parsed cookies; empty when the parsing stage did not run
#[async_trait]
impl<S> FromRequestParts<S> for Cookies
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Cookies>()
            .cloned()
            .unwrap_or_else(|| Cookies::from_headers(&parts.headers)))
    }
}
