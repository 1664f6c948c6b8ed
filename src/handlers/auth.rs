// HTTP Basic authentication for the admin back-office. Non-safe requests
// arriving from another site are refused before credentials are checked.

use crate::handlers::AppState;
use crate::views;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::warn;
use subtle::ConstantTimeEq;

const REALM: &str = r#"Basic realm="Admin Area""#;

pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if is_cross_site_write(request.method(), request.headers()) {
        warn!(
            "Refused cross-site {} to {}",
            request.method(),
            request.uri().path()
        );
        return forbidden();
    }

    let (username, password) = state.config.credentials().await;

    match parse_basic_auth(request.headers()) {
        Some((user, pass)) if credentials_match(&user, &pass, &username, &password) => {
            next.run(request).await
        }
        Some((user, _)) => {
            warn!("Rejected admin login for user {:?} on {}", user, request.uri().path());
            unauthorized()
        }
        None => unauthorized(),
    }
}

/// Decode an `Authorization: Basic ...` header into (username, password).
pub fn parse_basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    // Passwords may contain ':', usernames may not
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// A non-safe request whose `Sec-Fetch-Site` says cross-site, or whose
/// `Origin` names a different host than the one being addressed.
pub fn is_cross_site_write(method: &Method, headers: &HeaderMap) -> bool {
    if method.is_safe() {
        return false;
    }

    let header_str = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    if header_str("sec-fetch-site") == Some("cross-site") {
        return true;
    }

    let Some(origin) = header_str("origin") else {
        return false;
    };
    let origin_host = origin.split_once("://").map(|(_, host)| host.trim_end_matches('/'));
    let target_host = header_str("x-forwarded-host")
        .and_then(|hosts| hosts.split(',').next())
        .or_else(|| header_str("host"))
        .map(str::trim);

    match (origin_host, target_host) {
        (Some(origin_host), Some(target_host)) => !origin_host.eq_ignore_ascii_case(target_host),
        // "Origin: null" or no Host to compare against
        _ => true,
    }
}

fn credentials_match(user: &str, pass: &str, expected_user: &str, expected_pass: &str) -> bool {
    let user_ok = user.as_bytes().ct_eq(expected_user.as_bytes());
    let pass_ok = pass.as_bytes().ct_eq(expected_pass.as_bytes());
    bool::from(user_ok & pass_ok)
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Html(views::error_page(403, "Cross-site requests are not allowed")),
    )
        .into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, REALM)],
        Html(views::error_page(401, "Authentication required")),
    )
        .into_response()
}
