use anyhow::{Context, Result};
use reqwest::blocking::{Client, Request, Response};
use reqwest::header::{CONTENT_TYPE, HeaderValue, USER_AGENT};
use reqwest::{Method, Url};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.vultr.com/";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(300);
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone)]
pub struct ApiClient {
    endpoint: Url,
    http: Client,
    api_key: String,
    user_agent: HeaderValue,
}

impl ApiClient {
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self> {
        let parsed = Url::parse(endpoint).context("parsing endpoint URL")?;
        let user_agent = HeaderValue::from_static(concat!("vultrctl/", env!("CARGO_PKG_VERSION")));
        // Server creation can keep the provider busy for minutes, so only the
        // connect phase is bounded.
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            endpoint: parsed,
            http,
            api_key: api_key.to_string(),
            user_agent,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn new_request(&self, method: Method, path: &str, body: Option<String>) -> Result<Request> {
        let url = self.url_for(path)?;
        let is_post = method == Method::POST;

        let mut request = self
            .http
            .request(method, url)
            .header(USER_AGENT, self.user_agent.clone());

        if is_post {
            request = request.header(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        request.build().context("building request")
    }

    pub fn execute(&self, request: Request) -> Result<Response> {
        tracing::debug!(method = %request.method(), url = %redact(request.url()), "sending request");
        self.http.execute(request).context("sending request")
    }

    pub fn get(&self, path: &str) -> Result<Response> {
        let request = self.new_request(Method::GET, path, None)?;
        self.execute(request)
    }

    pub fn post_form(&self, path: &str, values: &[(&str, &str)]) -> Result<Response> {
        let request = self.new_request(Method::POST, path, Some(encode_form(values)))?;
        self.execute(request)
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        let normalized = path.trim_start_matches('/');
        let mut url = self
            .endpoint
            .join(normalized)
            .with_context(|| format!("joining path `{}` to endpoint", path))?;
        url.query_pairs_mut().append_pair("api_key", &self.api_key);
        Ok(url)
    }
}

pub fn encode_form(values: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(values)
        .finish()
}

fn redact(url: &Url) -> Url {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == "api_key" { "*****".into() } else { v.into_owned() };
            (k.into_owned(), value)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted
}
