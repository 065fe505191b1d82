use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;

use crate::error::SessionError;

/// Body of an authenticated request. Kept owned so the request can be rebuilt
/// for the single retry after a refresh.
///
/// A `Content-Type` header set on the [`RequestSpec`] takes precedence over
/// the body's own.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Bytes {
        content_type: HeaderValue,
        data: Vec<u8>,
    },
}

/// A replayable description of an outbound request.
///
/// `url` may be absolute or relative to the client's base URL.
///
/// # Example
/// ```
/// use storefront_session::executor::RequestSpec;
///
/// let spec = RequestSpec::get("/orders").query("page", "2");
/// assert_eq!(spec.url(), "/orders");
/// ```
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    url: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn post_json<T: Serialize + ?Sized>(
        url: impl Into<String>,
        body: &T,
    ) -> Result<Self, SessionError> {
        Ok(Self::new(Method::POST, url).with_body(RequestBody::Json(serde_json::to_value(body)?)))
    }

    pub fn put_json<T: Serialize + ?Sized>(
        url: impl Into<String>,
        body: &T,
    ) -> Result<Self, SessionError> {
        Ok(Self::new(Method::PUT, url).with_body(RequestBody::Json(serde_json::to_value(body)?)))
    }

    /// Raw body, e.g. an image upload.
    pub fn bytes(
        method: Method,
        url: impl Into<String>,
        content_type: HeaderValue,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(method, url).with_body(RequestBody::Bytes {
            content_type,
            data: data.into(),
        })
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the reqwest request for one attempt with `token`.
    pub(crate) fn to_request(
        &self,
        client: &reqwest::Client,
        url: &str,
        token: &str,
    ) -> reqwest::RequestBuilder {
        let mut headers = self.headers.clone();
        if let Some(RequestBody::Bytes { content_type, .. }) = &self.body {
            headers
                .entry(CONTENT_TYPE)
                .or_insert_with(|| content_type.clone());
        }
        let mut builder = client
            .request(self.method.clone(), url)
            .headers(headers)
            .bearer_auth(token);
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        match &self.body {
            // `json` leaves an existing Content-Type alone.
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Bytes { data, .. }) => builder.body(data.clone()),
            None => builder,
        }
    }
}
