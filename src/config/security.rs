use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use std::env;
use tower_http::set_header::SetResponseHeaderLayer;

/// Standard API hardening headers. HSTS is only meaningful behind HTTPS,
/// so it is gated on RUST_ENV=production.
pub fn apply_security_headers(router: Router) -> Router {
    let is_production = env::var("RUST_ENV")
        .map(|v| v.to_lowercase() == "production")
        .unwrap_or(false);

    let mut router = router
        .layer(overriding("x-content-type-options", "nosniff"))
        .layer(overriding("x-frame-options", "DENY"))
        .layer(overriding(
            "content-security-policy",
            "default-src 'none'; frame-ancestors 'none'",
        ))
        .layer(overriding("referrer-policy", "strict-origin-when-cross-origin"));

    if is_production {
        tracing::info!("Security: HSTS header enabled (production mode)");
        router = router.layer(overriding(
            "strict-transport-security",
            "max-age=31536000; includeSubDomains",
        ));
    }

    router
}

fn overriding(
    name: &'static str,
    value: &'static str,
) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        HeaderName::from_static(name),
        HeaderValue::from_static(value),
    )
}
