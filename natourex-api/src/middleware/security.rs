/// Security headers middleware
///
/// Adds security-related HTTP headers to every response, including static
/// files and error responses.
///
/// # Headers Applied
///
/// - `Content-Security-Policy` - Allows the map, font and stylesheet origins
///   used by the site, `'self'` for everything else
/// - `X-Content-Type-Options: nosniff` - Prevents MIME type sniffing
/// - `X-Frame-Options: SAMEORIGIN` - Prevents clickjacking
/// - `X-DNS-Prefetch-Control: off`
/// - `X-XSS-Protection: 0` - Disables the legacy browser filter
/// - `Referrer-Policy: no-referrer`
/// - `Cross-Origin-Opener-Policy` / `Cross-Origin-Resource-Policy: same-origin`
/// - `Strict-Transport-Security` - Forces HTTPS (production only)
///
/// # Example
///
/// ```no_run
/// use axum::Router;
/// use natourex_api::middleware::security::SecurityHeadersLayer;
///
/// let app: Router = Router::new()
///     .layer(SecurityHeadersLayer::new(true)); // true = production mode
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    response::Response,
};
use std::task::{Context, Poll};
use tower::{Layer, Service};

const SCRIPT_SRC: &[&str] = &["'self'", "https://unpkg.com/", "https://tile.openstreetmap.org"];

const STYLE_SRC: &[&str] = &[
    "'self'",
    "'unsafe-inline'",
    "https://unpkg.com/",
    "https://tile.openstreetmap.org",
    "https://fonts.googleapis.com/",
];

const CONNECT_SRC: &[&str] = &["'self'", "https://unpkg.com", "https://tile.openstreetmap.org"];

const FONT_SRC: &[&str] = &["'self'", "fonts.googleapis.com", "fonts.gstatic.com"];

const WORKER_SRC: &[&str] = &["'self'", "blob:"];

const IMG_SRC: &[&str] = &["'self'", "blob:", "data:", "https:"];

/// Builds the `Content-Security-Policy` value
pub fn content_security_policy() -> String {
    let directives: [(&str, &[&str]); 9] = [
        ("default-src", &["'self'"]),
        ("base-uri", &["'self'"]),
        ("connect-src", CONNECT_SRC),
        ("script-src", SCRIPT_SRC),
        ("style-src", STYLE_SRC),
        ("worker-src", WORKER_SRC),
        ("object-src", &["'none'"]),
        ("img-src", IMG_SRC),
        ("font-src", FONT_SRC),
    ];

    directives
        .iter()
        .map(|(name, sources)| format!("{} {}", name, sources.join(" ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Security headers middleware layer
#[derive(Clone)]
pub struct SecurityHeadersLayer {
    /// Whether to enable HSTS (HTTPS-only, should be true in production)
    enable_hsts: bool,

    csp: HeaderValue,
}

impl SecurityHeadersLayer {
    /// Creates a new security headers layer
    ///
    /// # Arguments
    ///
    /// * `enable_hsts` - Whether to enable HSTS header (use true for production with HTTPS)
    pub fn new(enable_hsts: bool) -> Self {
        // Sources are ASCII constants
        let csp = HeaderValue::from_str(&content_security_policy())
            .unwrap_or_else(|_| HeaderValue::from_static("default-src 'self'"));

        Self { enable_hsts, csp }
    }
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeadersMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeadersMiddleware {
            inner,
            enable_hsts: self.enable_hsts,
            csp: self.csp.clone(),
        }
    }
}

/// Security headers middleware service
#[derive(Clone)]
pub struct SecurityHeadersMiddleware<S> {
    inner: S,
    enable_hsts: bool,
    csp: HeaderValue,
}

impl<S> Service<Request> for SecurityHeadersMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let future = self.inner.call(request);
        let enable_hsts = self.enable_hsts;
        let csp = self.csp.clone();

        Box::pin(async move {
            let mut response = future.await?;
            let headers = response.headers_mut();

            headers.insert(header::CONTENT_SECURITY_POLICY, csp);
            headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
            headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
            headers.insert(header::X_DNS_PREFETCH_CONTROL, HeaderValue::from_static("off"));
            headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("0"));
            headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
            headers.insert(
                HeaderName::from_static("cross-origin-opener-policy"),
                HeaderValue::from_static("same-origin"),
            );
            headers.insert(
                HeaderName::from_static("cross-origin-resource-policy"),
                HeaderValue::from_static("same-origin"),
            );

            // HSTS (only in production with HTTPS)
            if enable_hsts {
                headers.insert(
                    header::STRICT_TRANSPORT_SECURITY,
                    HeaderValue::from_static("max-age=15552000; includeSubDomains"),
                );
            }

            Ok(response)
        })
    }
}
