//! Cookie instructions and the inbound cookie jar.
//!
//! Cookies are [`axum_extra::extract::cookie::Cookie`] values. Consumers read
//! the request cookies into a [`CookieJar`] and send every returned cookie
//! back as a `Set-Cookie` header (its `Display` output).

use std::collections::BTreeMap;

use {
    reqwest::header::{COOKIE, HeaderMap},
    time::Duration,
    warden_config::CookieConfig,
};

pub use axum_extra::extract::cookie::{Cookie, SameSite};

/// Whether `cookie` instructs the user agent to delete it.
#[must_use]
pub fn is_removal(cookie: &Cookie<'_>) -> bool {
    cookie.max_age() == Some(Duration::ZERO)
}

/// Cookies sent with the inbound request.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: BTreeMap<String, Cookie<'static>>,
}

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every `Cookie` header of a request.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = Self::new();
        for value in headers.get_all(COOKIE) {
            if let Ok(value) = value.to_str() {
                jar.extend_from_header(value);
            }
        }
        jar
    }

    /// Parse a single `Cookie` header value (`a=1; b=2`). Malformed pairs are
    /// skipped.
    #[must_use]
    pub fn from_header(header: &str) -> Self {
        let mut jar = Self::new();
        jar.extend_from_header(header);
        jar
    }

    fn extend_from_header(&mut self, header: &str) {
        for cookie in Cookie::split_parse(header.to_string()).filter_map(Result::ok) {
            self.cookies.insert(cookie.name().to_string(), cookie);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(Cookie::value)
    }

    pub fn insert(&mut self, cookie: Cookie<'static>) {
        self.cookies.insert(cookie.name().to_string(), cookie);
    }

    /// Apply `Set-Cookie` instructions the way a browser would.
    pub fn apply(&mut self, instructions: &[Cookie<'static>]) {
        for cookie in instructions {
            if is_removal(cookie) {
                self.cookies.remove(cookie.name());
            } else {
                self.insert(cookie.clone());
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// Naming and lifetime of the check cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    pub prefix: String,
    pub use_secure_cookies: bool,
    /// Lifetime of a freshly created check cookie, in seconds.
    pub check_max_age: i64,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self::from_config(&CookieConfig::default())
    }
}

impl CookieSettings {
    #[must_use]
    pub fn from_config(config: &CookieConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            use_secure_cookies: config.secure,
            check_max_age: config.check_max_age_secs,
        }
    }

    /// Full cookie name for `suffix`, with the `__Secure-` prefix when
    /// cookies are marked secure.
    #[must_use]
    pub fn cookie_name(&self, suffix: &str) -> String {
        if self.use_secure_cookies {
            format!("__Secure-{}.{suffix}", self.prefix)
        } else {
            format!("{}.{suffix}", self.prefix)
        }
    }

    /// An `HttpOnly`, `SameSite=Lax` cookie on `/` living `max_age` seconds.
    #[must_use]
    pub fn cookie(&self, name: String, value: String, max_age: i64) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.use_secure_cookies)
            .max_age(Duration::seconds(max_age))
            .build()
    }

    /// A cookie deleting `name`: empty value, `Max-Age=0` and an `Expires`
    /// in the past.
    #[must_use]
    pub fn removal(&self, name: String) -> Cookie<'static> {
        let mut cookie = self.cookie(name, String::new(), 0);
        cookie.make_removal();
        cookie
    }
}
