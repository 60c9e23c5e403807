// APIC-EM session core: holds the credentials and the current service
// ticket, logs in, and dispatches requests with a single transparent
// re-login when the ticket has expired.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::decode::{Decoded, Encoding};
use crate::error::{AuthenticationError, DispatchError};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Verb};

/// Path of the REST API below the controller host.
pub const API_ROOT: &str = "/api/v1/";

/// Attempts per logical call: the first try plus one retry after re-login.
pub const MAX_ATTEMPTS: u32 = 2;

const TICKET_RESOURCE: &str = "ticket";
const AUTH_HEADER: &str = "x-auth-token";

/// Login request payload.
#[derive(Serialize, Debug)]
struct TicketRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize, Debug)]
struct TicketResponse {
    response: TicketBody,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TicketBody {
    service_ticket: String,
}

/// Request body for controller calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(serde_json::Value),
    Raw(Vec<u8>),
}

impl Body {
    fn into_bytes(self) -> Result<Vec<u8>, DispatchError> {
        match self {
            Body::Json(value) => Ok(serde_json::to_vec(&value)?),
            Body::Raw(bytes) => Ok(bytes),
        }
    }
}

/// Authenticated session against one APIC-EM controller.
pub struct ApicSession<T> {
    transport: T,
    base_url: Url,
    username: String,
    password: String,
    ticket: Option<String>,
}

impl<T> std::fmt::Debug for ApicSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApicSession")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("authenticated", &self.ticket.is_some())
            .finish()
    }
}

impl<T: HttpTransport> ApicSession<T> {
    /// Create a session without logging in. `host` may omit the scheme, in
    /// which case https is assumed; any path on it is replaced by the API
    /// root.
    pub fn new(
        host: &str,
        username: &str,
        password: &str,
        transport: T,
    ) -> Result<Self, url::ParseError> {
        Ok(ApicSession {
            transport,
            base_url: api_base_url(host)?,
            username: username.to_string(),
            password: password.to_string(),
            ticket: None,
        })
    }

    /// Create a session and log in right away.
    pub fn connect(
        host: &str,
        username: &str,
        password: &str,
        transport: T,
    ) -> Result<Self, AuthenticationError> {
        let mut session = Self::new(host, username, password, transport).map_err(|e| {
            debug!(host, error = %e, "invalid controller host");
            AuthenticationError
        })?;
        session.authenticate()?;
        Ok(session)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Current service ticket, if logged in.
    pub fn ticket(&self) -> Option<&str> {
        self.ticket.as_deref()
    }

    /// Log in and store the returned service ticket. On failure the
    /// previously held ticket is left untouched.
    pub fn authenticate(&mut self) -> Result<(), AuthenticationError> {
        let ticket = self.request_ticket().map_err(|reason| {
            debug!(user = %self.username, %reason, "login to controller failed");
            AuthenticationError
        })?;
        debug!(user = %self.username, "obtained service ticket");
        self.ticket = Some(ticket);
        Ok(())
    }

    fn request_ticket(&self) -> Result<String, String> {
        let url = self.base_url.join(TICKET_RESOURCE).map_err(|e| e.to_string())?;
        let payload = serde_json::to_vec(&TicketRequest {
            username: &self.username,
            password: &self.password,
        })
        .map_err(|e| e.to_string())?;

        let request = HttpRequest::new(Verb::Post, url)
            .header("content-type", Encoding::Json.content_type())
            .body(payload);
        let response = self.transport.send(request).map_err(|e| e.to_string())?;
        if response.status != 200 {
            return Err(format!("login returned status {}", response.status));
        }

        let parsed: TicketResponse =
            serde_json::from_slice(&response.body).map_err(|e| e.to_string())?;
        Ok(parsed.response.service_ticket)
    }

    /// Send one logical request and decode the response.
    ///
    /// A 401 triggers a fresh login and one more attempt; the caller only
    /// sees the outcome of the retry. 200 and 202 are accepted, anything
    /// else becomes [`DispatchError::Status`].
    pub fn dispatch(
        &mut self,
        resource: &str,
        verb: Verb,
        body: Option<Body>,
        encoding: Encoding,
    ) -> Result<Decoded, DispatchError> {
        if verb == Verb::Delete {
            return Err(DispatchError::UnsupportedVerb(verb));
        }
        let url = self.base_url.join(resource)?;
        let payload = body.map(Body::into_bytes).transpose()?;

        if self.ticket.is_none() {
            self.authenticate()?;
        }

        let mut attempt = 1;
        loop {
            let response = self.send_once(verb, &url, payload.as_deref(), encoding)?;
            match response.status {
                401 if attempt < MAX_ATTEMPTS => {
                    warn!(resource, "service ticket rejected, logging in again");
                    attempt += 1;
                    self.authenticate()?;
                }
                200 | 202 => return encoding.decode(&response.body),
                status => return Err(DispatchError::Status(status)),
            }
        }
    }

    fn send_once(
        &self,
        verb: Verb,
        url: &Url,
        payload: Option<&[u8]>,
        encoding: Encoding,
    ) -> Result<HttpResponse, DispatchError> {
        // dispatch logs in before the first attempt, so a ticket is held here
        let ticket = self.ticket.as_deref().unwrap_or_default();
        let mut request = HttpRequest::new(verb, url.clone())
            .header(AUTH_HEADER, ticket)
            .header("content-type", encoding.content_type());
        if let Some(bytes) = payload {
            request = request.body(bytes.to_vec());
        }
        Ok(self.transport.send(request)?)
    }

    /// `GET` a resource and return its JSON body.
    pub fn get_json(&mut self, resource: &str) -> Result<serde_json::Value, DispatchError> {
        self.dispatch(resource, Verb::Get, None, Encoding::Json)?
            .into_json()
    }

    /// `POST` a JSON body and return the JSON response.
    pub fn post_json(
        &mut self,
        resource: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, DispatchError> {
        self.dispatch(resource, Verb::Post, Some(Body::Json(body)), Encoding::Json)?
            .into_json()
    }
}

fn api_base_url(host: &str) -> Result<Url, url::ParseError> {
    let host = host.trim();
    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };
    Url::parse(&with_scheme)?.join(API_ROOT)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::error::TransportError;
    use crate::transport::scripted::{json, ScriptedTransport};

    const HOST: &str = "https://apic.example.com";

    fn login_ok(ticket: &str) -> Result<HttpResponse, TransportError> {
        json(200, json!({"response": {"serviceTicket": ticket}, "version": "1.0"}))
    }

    fn session(transport: &ScriptedTransport) -> ApicSession<&ScriptedTransport> {
        ApicSession::new(HOST, "admin", "secret", transport).unwrap()
    }

    #[test]
    fn base_url_defaults_scheme_and_replaces_path() {
        let t = ScriptedTransport::new(|_| login_ok("x"));
        let s = ApicSession::new("apic.example.com", "u", "p", &t).unwrap();
        assert_eq!(s.base_url().as_str(), "https://apic.example.com/api/v1/");

        let s = ApicSession::new("http://10.0.0.1:8080/ui/", "u", "p", &t).unwrap();
        assert_eq!(s.base_url().as_str(), "http://10.0.0.1:8080/api/v1/");
    }

    #[test]
    fn authenticate_stores_ticket_verbatim() {
        let t = ScriptedTransport::new(|_| login_ok("abc123"));
        let mut s = session(&t);
        s.authenticate().unwrap();
        assert_eq!(s.ticket(), Some("abc123"));

        let sent = t.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].verb, Verb::Post);
        assert_eq!(sent[0].url.as_str(), "https://apic.example.com/api/v1/ticket");
        assert_eq!(sent[0].header_value("content-type"), Some("application/json"));
        let body: serde_json::Value =
            serde_json::from_slice(sent[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"username": "admin", "password": "secret"}));
    }

    #[test]
    fn authenticate_overwrites_previous_ticket() {
        let n = Rc::new(Cell::new(0));
        let counter = n.clone();
        let t = ScriptedTransport::new(move |_| {
            counter.set(counter.get() + 1);
            login_ok(&format!("ticket-{}", counter.get()))
        });
        let mut s = session(&t);
        s.authenticate().unwrap();
        s.authenticate().unwrap();
        assert_eq!(s.ticket(), Some("ticket-2"));
        assert_eq!(n.get(), 2);
    }

    #[test]
    fn rejected_login_is_authentication_error_and_ticket_stays_unset() {
        let t = ScriptedTransport::new(|_| json(403, json!({"response": {"message": "denied"}})));
        let mut s = session(&t);
        assert_eq!(s.authenticate(), Err(AuthenticationError));
        assert_eq!(s.ticket(), None);
    }

    #[test]
    fn unreachable_controller_keeps_previous_ticket() {
        let up = Rc::new(Cell::new(true));
        let state = up.clone();
        let t = ScriptedTransport::new(move |_| {
            if state.get() {
                login_ok("first")
            } else {
                Err(TransportError::Connect("connection refused".into()))
            }
        });
        let mut s = session(&t);
        s.authenticate().unwrap();
        up.set(false);
        assert_eq!(s.authenticate(), Err(AuthenticationError));
        assert_eq!(s.ticket(), Some("first"));
    }

    #[test]
    fn login_response_without_ticket_fails() {
        let t = ScriptedTransport::new(|_| json(200, json!({"response": {}})));
        let mut s = session(&t);
        assert!(s.authenticate().is_err());
        assert_eq!(s.ticket(), None);
    }

    #[test]
    fn connect_logs_in_immediately() {
        let t = ScriptedTransport::new(|_| login_ok("t0"));
        let s = ApicSession::connect(HOST, "admin", "secret", &t).unwrap();
        assert_eq!(s.ticket(), Some("t0"));
        assert_eq!(t.paths(), vec!["/api/v1/ticket"]);
    }

    #[test]
    fn dispatch_logs_in_before_first_request() {
        let t = ScriptedTransport::new(|req| match req.url.path() {
            "/api/v1/ticket" => login_ok("fresh"),
            _ => json(200, json!({"response": []})),
        });
        let mut s = session(&t);
        let value = s.get_json("network-device").unwrap();
        assert_eq!(value, json!({"response": []}));

        let sent = t.sent();
        assert_eq!(t.paths(), vec!["/api/v1/ticket", "/api/v1/network-device"]);
        assert_eq!(sent[1].header_value("x-auth-token"), Some("fresh"));
    }

    #[test]
    fn expired_ticket_is_renewed_once_and_retry_result_returned() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let t = ScriptedTransport::new(move |req| {
            if req.url.path() == "/api/v1/ticket" {
                return login_ok("renewed");
            }
            seen.set(seen.get() + 1);
            if seen.get() == 1 {
                json(401, json!({"response": {"errorCode": "RBAC"}}))
            } else {
                json(200, json!({"response": {"hostname": "core-sw"}}))
            }
        });
        let mut s = session(&t);
        s.ticket = Some("stale".into());

        let value = s.get_json("network-device/1").unwrap();
        assert_eq!(value["response"]["hostname"], "core-sw");
        assert_eq!(
            t.paths(),
            vec![
                "/api/v1/network-device/1",
                "/api/v1/ticket",
                "/api/v1/network-device/1",
            ]
        );
        let sent = t.sent();
        assert_eq!(sent[0].header_value("x-auth-token"), Some("stale"));
        assert_eq!(sent[2].header_value("x-auth-token"), Some("renewed"));
    }

    #[test]
    fn persistent_401_stops_after_bounded_attempts() {
        let t = ScriptedTransport::new(|req| match req.url.path() {
            "/api/v1/ticket" => login_ok("again"),
            _ => json(401, json!({})),
        });
        let mut s = session(&t);
        s.ticket = Some("stale".into());

        let err = s.get_json("host").unwrap_err();
        assert_eq!(err.status(), Some(401));
        let logins = t.paths().iter().filter(|p| p.ends_with("/ticket")).count();
        assert_eq!(logins, 1);
        assert_eq!(t.sent().len(), MAX_ATTEMPTS as usize + 1);
    }

    #[test]
    fn failed_relogin_surfaces_authentication_error() {
        let t = ScriptedTransport::new(|req| match req.url.path() {
            "/api/v1/ticket" => json(500, json!({})),
            _ => json(401, json!({})),
        });
        let mut s = session(&t);
        s.ticket = Some("stale".into());
        let err = s.get_json("host").unwrap_err();
        assert!(matches!(err, DispatchError::Authentication(_)));
        assert_eq!(s.ticket(), Some("stale"));
    }

    #[test]
    fn server_error_carries_status_code() {
        let t = ScriptedTransport::new(|_| json(500, json!({"error": "boom"})));
        let mut s = session(&t);
        s.ticket = Some("valid".into());
        let err = s.get_json("network-device").unwrap_err();
        assert!(matches!(err, DispatchError::Status(500)));
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn accepted_status_is_decoded() {
        let t = ScriptedTransport::new(|_| json(202, json!({"response": {"taskId": "t-1"}})));
        let mut s = session(&t);
        s.ticket = Some("valid".into());
        let value = s.post_json("flow-analysis", json!({"sourceIP": "10.0.0.1"})).unwrap();
        assert_eq!(value["response"]["taskId"], "t-1");

        let sent = t.sent();
        assert_eq!(sent[0].verb, Verb::Post);
        let body: serde_json::Value =
            serde_json::from_slice(sent[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"sourceIP": "10.0.0.1"}));
    }

    #[test]
    fn xml_encoding_sets_header_and_decodes_markup() {
        let t = ScriptedTransport::new(|_| {
            Ok(HttpResponse::new(200, "<response><count>3</count></response>"))
        });
        let mut s = session(&t);
        s.ticket = Some("valid".into());
        let root = s
            .dispatch("network-device/count", Verb::Get, None, Encoding::Xml)
            .unwrap()
            .into_xml()
            .unwrap();
        assert_eq!(root.child("count").unwrap().text, "3");
        assert_eq!(t.sent()[0].header_value("content-type"), Some("application/xml"));
    }

    #[test]
    fn raw_body_is_sent_unchanged() {
        let t = ScriptedTransport::new(|_| {
            Ok(HttpResponse::new(202, "<response><taskId>t-9</taskId></response>"))
        });
        let mut s = session(&t);
        s.ticket = Some("valid".into());
        let payload = b"<flowAnalysis><sourceIP>10.0.0.1</sourceIP></flowAnalysis>".to_vec();
        let root = s
            .dispatch(
                "flow-analysis",
                Verb::Post,
                Some(Body::Raw(payload.clone())),
                Encoding::Xml,
            )
            .unwrap()
            .into_xml()
            .unwrap();
        assert_eq!(root.child("taskId").unwrap().text, "t-9");
        assert_eq!(t.sent()[0].body.as_deref(), Some(payload.as_slice()));
    }

    #[test]
    fn delete_is_rejected_without_network_traffic() {
        let t = ScriptedTransport::new(|_| json(200, json!({})));
        let mut s = session(&t);
        let err = s
            .dispatch("network-device/1", Verb::Delete, None, Encoding::Json)
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedVerb(Verb::Delete)));
        assert!(t.sent().is_empty());
    }

    #[test]
    fn transport_failure_propagates() {
        let t = ScriptedTransport::new(|_| Err(TransportError::Timeout));
        let mut s = session(&t);
        s.ticket = Some("valid".into());
        let err = s.get_json("network-device").unwrap_err();
        assert!(matches!(err, DispatchError::Transport(TransportError::Timeout)));
    }

    #[test]
    fn debug_output_hides_credentials() {
        let t = ScriptedTransport::new(|_| login_ok("tkt"));
        let mut s = session(&t);
        s.authenticate().unwrap();
        let out = format!("{s:?}");
        assert!(!out.contains("secret"));
        assert!(!out.contains("tkt"));
    }
}
