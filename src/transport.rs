// HTTP transport seam. Both API clients describe a request as plain data
// and hand it to an `HttpTransport`; the production implementation wraps a
// blocking reqwest client, tests plug in a scripted fake.

use std::fmt;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tracing::debug;
use url::Url;

use crate::config::HttpConfig;
use crate::error::TransportError;

/// HTTP verbs understood by the request model. Only GET and POST are wired
/// to the network; DELETE is rejected before anything is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Delete,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// One outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub verb: Verb,
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(verb: Verb, url: Url) -> Self {
        HttpRequest {
            verb,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of the first header with this name (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of a response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        HttpResponse {
            status,
            body: body.into(),
        }
    }
}

/// Sends one request and returns the response, whatever its status.
pub trait HttpTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

/// Blocking reqwest transport configured from [`HttpConfig`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(ReqwestTransport { client })
    }

    fn header_map(request: &HttpRequest) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let key = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Request(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Request(format!("header {name}: {e}")))?;
            headers.insert(key, value);
        }
        Ok(headers)
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.verb {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Delete => Method::DELETE,
        };
        debug!(verb = %request.verb, url = %request.url, "sending request");

        let headers = Self::header_map(&request)?;
        let mut req = self.client.request(method, request.url).headers(headers);
        if let Some(body) = request.body {
            req = req.body(body);
        }

        let res = req.send()?;
        let status = res.status().as_u16();
        let body = res.bytes()?.to_vec();
        debug!(status, bytes = body.len(), "received response");
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    //! Scripted transport used by the unit tests of the API clients.

    use std::cell::RefCell;

    use super::*;

    type Responder = Box<dyn FnMut(&HttpRequest) -> Result<HttpResponse, TransportError>>;

    /// Answers every request through a closure and records what was sent.
    pub struct ScriptedTransport {
        responder: RefCell<Responder>,
        sent: RefCell<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        pub fn new(
            responder: impl FnMut(&HttpRequest) -> Result<HttpResponse, TransportError> + 'static,
        ) -> Self {
            ScriptedTransport {
                responder: RefCell::new(Box::new(responder)),
                sent: RefCell::new(Vec::new()),
            }
        }

        /// Requests seen so far, oldest first.
        pub fn sent(&self) -> Vec<HttpRequest> {
            self.sent.borrow().clone()
        }

        /// Paths (without query) of the requests seen so far.
        pub fn paths(&self) -> Vec<String> {
            self.sent.borrow().iter().map(|r| r.url.path().to_string()).collect()
        }
    }

    impl HttpTransport for ScriptedTransport {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let response = (self.responder.borrow_mut())(&request);
            self.sent.borrow_mut().push(request);
            response
        }
    }

    pub fn json(status: u16, body: serde_json::Value) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse::new(status, body.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let url = Url::parse("https://example.com/").unwrap();
        let req = HttpRequest::new(Verb::Get, url).header("x-auth-token", "t1");
        assert_eq!(req.header_value("X-Auth-Token"), Some("t1"));
        assert_eq!(req.header_value("authorization"), None);
    }

    #[test]
    fn reqwest_transport_builds_with_insecure_config() {
        let config = HttpConfig::default().accept_invalid_certs(true);
        assert!(ReqwestTransport::new(&config).is_ok());
    }

    #[test]
    fn header_map_rejects_invalid_values() {
        let url = Url::parse("https://example.com/").unwrap();
        let req = HttpRequest::new(Verb::Get, url).header("authorization", "bad\nvalue");
        assert!(matches!(
            ReqwestTransport::header_map(&req),
            Err(TransportError::Request(_))
        ));
    }
}
