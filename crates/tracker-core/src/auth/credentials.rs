use std::sync::Arc;

use cookie::Cookie;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;

use crate::api::ApiClient;

/// Cookie the server uses to issue the anti-forgery token
pub const CSRF_COOKIE_NAME: &str = "csrftoken";

/// Header the server expects the anti-forgery token in
pub const CSRF_HEADER_NAME: &str = "X-CSRFToken";

/// Read access to cookies the server has issued.
pub trait CredentialProvider: Send + Sync {
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Reads cookies for the API base URL out of the HTTP client's jar.
pub struct CookieJarCredentials {
    jar: Arc<Jar>,
    url: Url,
}

impl CookieJarCredentials {
    pub fn new(jar: Arc<Jar>, url: Url) -> Self {
        Self { jar, url }
    }

    /// Share the jar of `api` so cookies it receives become readable here
    pub fn for_client(api: &ApiClient) -> Self {
        Self::new(api.cookie_jar(), api.base_url().clone())
    }
}

impl CredentialProvider for CookieJarCredentials {
    fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.url)?;
        find_cookie(header.to_str().ok()?, name)
    }
}

/// Find `name` in a `Cookie` header value (`a=1; b=2`).
fn find_cookie(header: &str, name: &str) -> Option<String> {
    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_find_cookie() {
        let header = "sessionid=abc; csrftoken=t0k3n; theme=dark";
        assert_eq!(find_cookie(header, "csrftoken").as_deref(), Some("t0k3n"));
        assert_eq!(find_cookie(header, "sessionid").as_deref(), Some("abc"));
        assert_eq!(find_cookie(header, "missing"), None);
        assert_eq!(find_cookie("", "csrftoken"), None);
        // Prefix of another cookie name must not match
        assert_eq!(find_cookie("xcsrftoken=nope", "csrftoken"), None);
        // Malformed pairs are skipped
        assert_eq!(
            find_cookie("garbage; csrftoken=ok", "csrftoken").as_deref(),
            Some("ok")
        );
    }

    #[test]
    fn test_reads_cookie_from_jar() {
        let url = Url::parse("http://localhost:8000/api").unwrap();
        let jar = Arc::new(Jar::default());
        let credentials = CookieJarCredentials::new(Arc::clone(&jar), url.clone());
        assert_eq!(credentials.cookie(CSRF_COOKIE_NAME), None);

        jar.add_cookie_str("csrftoken=from-jar; Path=/", &url);
        assert_eq!(
            credentials.cookie(CSRF_COOKIE_NAME).as_deref(),
            Some("from-jar")
        );
    }

    #[tokio::test]
    async fn test_set_csrf_token_populates_jar() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/set-csrf-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", "csrftoken=issued-by-server; Path=/")
                    .set_body_json(serde_json::json!({"message": "CSRF cookie set"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(&SessionConfig::new(format!("{}/api", server.uri()))).unwrap();
        let credentials = CookieJarCredentials::for_client(&api);

        api.set_csrf_token().await.unwrap();
        assert_eq!(
            credentials.cookie(CSRF_COOKIE_NAME).as_deref(),
            Some("issued-by-server")
        );
    }
}
