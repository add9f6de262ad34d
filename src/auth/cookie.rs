//! Session cookie handling.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::auth::jwt::SESSION_TTL;
use crate::config::AppConfig;

pub const SESSION_COOKIE: &str = "token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes of the `token` cookie. Production serves the front end from
/// another origin, so the cookie must be `Secure; SameSite=None` there.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub secure: bool,
    pub same_site: SameSite,
}

impl SessionCookie {
    pub fn for_config(cfg: &AppConfig) -> Self {
        if cfg.production {
            Self {
                secure: true,
                same_site: SameSite::None,
            }
        } else {
            Self {
                secure: false,
                same_site: SameSite::Lax,
            }
        }
    }

    fn attributes(&self) -> String {
        let mut attrs = String::from("; HttpOnly");
        if self.secure {
            attrs.push_str("; Secure");
        }
        attrs.push_str(&format!("; SameSite={}; Path=/", self.same_site.as_str()));
        attrs
    }

    pub fn issue(&self, token: &str) -> String {
        format!(
            "{}={}{}; Max-Age={}",
            SESSION_COOKIE,
            token,
            self.attributes(),
            SESSION_TTL.whole_seconds()
        )
    }

    /// Already-expired empty cookie; makes the browser drop the session.
    pub fn clear(&self) -> String {
        format!(
            "{}={}; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            SESSION_COOKIE,
            self.attributes()
        )
    }

    pub fn issue_header(&self, token: &str) -> HeaderValue {
        to_header(self.issue(token))
    }

    pub fn clear_header(&self) -> HeaderValue {
        to_header(self.clear())
    }
}

fn to_header(value: String) -> HeaderValue {
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Extract a cookie value from request headers.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
}
