use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use time::OffsetDateTime;

use crate::infra::config::CookieConfig;
use tollgate_core::auth::IssuedRefresh;

pub const REFRESH_COOKIE: &str = "refresh_token";

/// Raw refresh secret presented by the client, if any.
pub fn refresh_secret(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Attach the refresh secret, expiring together with its record.
pub fn set_refresh_cookie(
    jar: CookieJar,
    settings: &CookieConfig,
    refresh: &IssuedRefresh,
) -> CookieJar {
    let cookie = Cookie::build((REFRESH_COOKIE, refresh.secret.expose().to_string()))
        .path(settings.path.clone())
        .http_only(true)
        .secure(settings.secure)
        .same_site(same_site(settings))
        .expires(to_offset(refresh.record.expires_at));
    jar.add(cookie)
}

/// Overwrite the refresh cookie with an expired blank value.
pub fn clear_refresh_cookie(jar: CookieJar, settings: &CookieConfig) -> CookieJar {
    let cookie = Cookie::build((REFRESH_COOKIE, ""))
        .path(settings.path.clone())
        .http_only(true)
        .secure(settings.secure)
        .same_site(same_site(settings))
        .max_age(time::Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH);
    jar.add(cookie)
}

fn same_site(settings: &CookieConfig) -> SameSite {
    if settings.secure {
        SameSite::Strict
    } else {
        SameSite::Lax
    }
}

fn to_offset(at: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(at.timestamp())
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
