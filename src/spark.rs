// Cisco Spark client: bearer-token handling plus the handful of people,
// room and message calls the CLI relays results through.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::DispatchError;
use crate::transport::{HttpRequest, HttpTransport, Verb};

/// Profile of the user owning the token (`people/me`).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub emails: Vec<String>,
}

impl Person {
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
}

/// Response of `GET rooms`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct RoomList {
    #[serde(default)]
    pub items: Vec<Room>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Optional server-side filters for [`SparkSession::list_rooms`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomFilter {
    pub team_id: Option<String>,
    pub max: Option<u32>,
    /// `group` or `direct`.
    pub room_type: Option<String>,
}

impl RoomFilter {
    /// Query pairs for the filters that are set; absent filters are omitted.
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(team_id) = &self.team_id {
            params.push(("teamId", team_id.clone()));
        }
        if let Some(max) = self.max {
            params.push(("max", max.to_string()));
        }
        if let Some(room_type) = &self.room_type {
            params.push(("type", room_type.clone()));
        }
        params
    }
}

/// Body of `POST messages`. Unset fields are left out of the JSON.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_person_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_person_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

impl MessageDraft {
    /// Plain text message to a room.
    pub fn text_to_room(room_id: &str, text: &str) -> Self {
        MessageDraft {
            room_id: Some(room_id.to_string()),
            text: Some(text.to_string()),
            ..MessageDraft::default()
        }
    }
}

/// Client for the Spark REST API holding an optional bearer token.
///
/// A missing or invalid token is a normal state (messaging may simply not
/// be configured yet), so the token calls report it through `bool` and
/// `Option` instead of errors.
pub struct SparkSession<T> {
    transport: T,
    base_url: Url,
    token: Option<String>,
}

impl<T: HttpTransport> SparkSession<T> {
    /// Session rooted at `base_url`, normally [`crate::config::DEFAULT_SPARK_URL`].
    pub fn new(base_url: &str, transport: T) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(SparkSession {
            transport,
            base_url,
            token: None,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Try a new token, stored exactly as given. It is kept only if the
    /// identity probe accepts it; otherwise the previous token (or lack of
    /// one) is restored.
    pub fn set_token(&mut self, candidate: &str) -> bool {
        let previous = self.token.replace(candidate.to_string());
        if self.identity().is_some() {
            debug!("spark token accepted");
            return true;
        }
        debug!("spark token rejected, restoring previous token");
        self.token = previous;
        false
    }

    /// True iff the identity probe succeeds with the current token.
    pub fn validate_token(&self) -> bool {
        self.identity().is_some()
    }

    /// Profile behind the current token, or `None` when there is no token
    /// or the API refuses it.
    pub fn identity(&self) -> Option<Person> {
        if self.token.is_none() {
            return None;
        }
        let url = match self.endpoint(&["people", "me"]) {
            Ok(url) => url,
            Err(e) => {
                debug!(error = %e, "spark identity url invalid");
                return None;
            }
        };
        match self.request(url, Verb::Get, &[], None::<&()>) {
            Ok(person) => Some(person),
            Err(e) => {
                debug!(error = %e, "spark identity lookup failed");
                None
            }
        }
    }

    /// Rooms the user belongs to, filtered server-side.
    pub fn list_rooms(&self, filter: &RoomFilter) -> Result<RoomList, DispatchError> {
        let url = self.endpoint(&["rooms"])?;
        self.request(url, Verb::Get, &filter.query(), None::<&()>)
    }

    /// Room by id. The id is sent as a single encoded path segment.
    pub fn room(&self, room_id: &str) -> Result<Room, DispatchError> {
        let url = self.endpoint(&["rooms", room_id])?;
        self.request(url, Verb::Get, &[], None::<&()>)
    }

    pub fn post_message(&self, draft: &MessageDraft) -> Result<Message, DispatchError> {
        let url = self.endpoint(&["messages"])?;
        self.request(url, Verb::Post, &[], Some(draft))
    }

    /// API root extended by `segments`, each percent-encoded on its own.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, DispatchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send and decode one request. `query` is merged into any query
    /// already present on `url`, caller values winning.
    fn request<B, R>(
        &self,
        mut url: Url,
        verb: Verb,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<R, DispatchError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        if verb == Verb::Delete {
            return Err(DispatchError::UnsupportedVerb(verb));
        }
        merge_query(&mut url, query);

        let mut request = HttpRequest::new(verb, url).header("content-type", "application/json");
        if let Some(token) = &self.token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let response = self.transport.send(request)?;
        if response.status != 200 {
            return Err(DispatchError::Status(response.status));
        }
        Ok(serde_json::from_slice(&response.body)?)
    }
}

/// Merge `extra` into the query string of `url`. Existing keys keep their
/// position but take the new value; new keys are appended.
fn merge_query(url: &mut Url, extra: &[(&str, String)]) {
    if extra.is_empty() {
        return;
    }
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    for (key, value) in extra {
        match pairs.iter_mut().find(|(k, _)| k == key) {
            Some(existing) => existing.1 = value.clone(),
            None => pairs.push((key.to_string(), value.clone())),
        }
    }
    url.query_pairs_mut().clear().extend_pairs(pairs);
}
