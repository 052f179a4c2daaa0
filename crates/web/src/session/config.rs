use std::time::Duration;

use keel_http::protocol::{Cookie, SameSite};

pub const DEFAULT_COOKIE_NAME: &str = "keel-session";

/// How the session cookie is named and which attributes it is sent with.
///
/// Defaults: `keel-session`, `Path=/`, `HttpOnly`, no `Secure`, no `SameSite`
/// and no `Max-Age` (a browser-session cookie).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    cookie_name: String,
    path: String,
    domain: Option<String>,
    max_age: Option<Duration>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// The `Set-Cookie` that hands `token` to the client
    pub fn cookie(&self, token: &str) -> Cookie {
        let mut cookie = Cookie::new(self.cookie_name.as_str(), token)
            .path(self.path.as_str())
            .secure(self.secure)
            .http_only(self.http_only);
        if let Some(domain) = &self.domain {
            cookie = cookie.domain(domain.as_str());
        }
        if let Some(max_age) = self.max_age {
            cookie = cookie.max_age(max_age);
        }
        if let Some(same_site) = self.same_site {
            cookie = cookie.same_site(same_site);
        }
        cookie
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    fn new() -> Self {
        Self {
            config: SessionConfig {
                cookie_name: DEFAULT_COOKIE_NAME.to_owned(),
                path: "/".to_owned(),
                domain: None,
                max_age: None,
                secure: false,
                http_only: true,
                same_site: None,
            },
        }
    }

    pub fn cookie_name<S: Into<String>>(mut self, cookie_name: S) -> Self {
        self.config.cookie_name = cookie_name.into();
        self
    }

    pub fn path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.path = path.into();
        self
    }

    pub fn domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.config.domain = Some(domain.into());
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.config.max_age = Some(max_age);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.config.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.config.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.config.same_site = Some(same_site);
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cookie() {
        let cookie = SessionConfig::default().cookie("t0k3n");
        assert_eq!(cookie.to_string(), "keel-session=t0k3n; Path=/; HttpOnly");
    }

    #[test]
    fn configured_cookie() {
        let config = SessionConfig::builder()
            .cookie_name("sid")
            .path("/app")
            .secure(true)
            .same_site(SameSite::Lax)
            .max_age(Duration::from_secs(3600))
            .build();

        assert_eq!(config.cookie_name(), "sid");
        assert_eq!(
            config.cookie("t0k3n").to_string(),
            "sid=t0k3n; Path=/app; Max-Age=3600; Secure; HttpOnly; SameSite=Lax"
        );
    }
}
