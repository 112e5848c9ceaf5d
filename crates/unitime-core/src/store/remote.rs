use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::model::{
    EventPatch, NewEvent, NewSubject, ProfilePatch, ScheduleEvent, Subject, SubjectPatch,
    UserProfile,
};
use crate::store::{
    Result, ScheduleStore, StoreError, UserId, validate_new_event, validate_new_subject,
};

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub token: Option<String>,
}

/// Stateless adapter over the hosted JSON REST backend. Owns nothing but the
/// connection settings; every call is a full round trip.
pub struct RemoteStore {
    client: Client,
    config: RemoteConfig,
}

/// The wire shape of a create call: the domain payload plus the owning user.
#[derive(Serialize)]
struct OwnedBody<'a, T: Serialize> {
    user_id: &'a str,
    #[serde(flatten)]
    body: &'a T,
}

impl RemoteStore {
    pub fn new(config: RemoteConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn auth(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn send(&self, req: RequestBuilder, what: &'static str) -> Result<Response> {
        debug!(what, "remote call");
        let resp = req
            .send()
            .map_err(|err| StoreError::Network(format!("{what}: {err}")))?;

        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(StoreError::Backend(format!("{what} -> {}", resp.status())))
        }
    }

    /// Mutations on a single row map the backend's 404 to NotFound so the
    /// caller can distinguish a dead id from a broken store.
    fn send_for_id(&self, req: RequestBuilder, what: &'static str, id: Uuid) -> Result<Response> {
        debug!(what, id = %id, "remote call");
        let resp = req
            .send()
            .map_err(|err| StoreError::Network(format!("{what}: {err}")))?;

        match resp.status() {
            status if status.is_success() => Ok(resp),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id)),
            status => Err(StoreError::Backend(format!("{what} -> {status}"))),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(resp: Response, what: &'static str) -> Result<T> {
    resp.json()
        .map_err(|err| StoreError::Backend(format!("{what}: invalid response body: {err}")))
}

impl ScheduleStore for RemoteStore {
    fn fetch_subjects(&self, user: &UserId) -> Result<Vec<Subject>> {
        let req = self
            .auth(self.client.get(self.url("/subjects")))
            .query(&[("user_id", user.as_str())]);
        decode(self.send(req, "GET /subjects")?, "GET /subjects")
    }

    fn create_subject(&self, user: &UserId, subject: NewSubject) -> Result<Subject> {
        validate_new_subject(&subject)?;
        let req = self
            .auth(self.client.post(self.url("/subjects")))
            .json(&OwnedBody {
                user_id: user.as_str(),
                body: &subject,
            });
        decode(self.send(req, "POST /subjects")?, "POST /subjects")
    }

    fn update_subject(&self, id: Uuid, patch: &SubjectPatch) -> Result<()> {
        let req = self
            .auth(self.client.patch(self.url(&format!("/subjects/{id}"))))
            .json(patch);
        self.send_for_id(req, "PATCH /subjects/{id}", id)?;
        Ok(())
    }

    fn delete_subject(&self, id: Uuid) -> Result<()> {
        let req = self.auth(self.client.delete(self.url(&format!("/subjects/{id}"))));
        self.send_for_id(req, "DELETE /subjects/{id}", id)?;
        Ok(())
    }

    fn fetch_events(
        &self,
        user: &UserId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScheduleEvent>> {
        let mut query: Vec<(&str, String)> = vec![("user_id", user.as_str().to_string())];
        if let Some(from) = from {
            query.push(("from", from.to_rfc3339()));
        }
        if let Some(to) = to {
            query.push(("to", to.to_rfc3339()));
        }

        let req = self.auth(self.client.get(self.url("/events"))).query(&query);
        decode(self.send(req, "GET /events")?, "GET /events")
    }

    fn create_event(&self, user: &UserId, event: NewEvent) -> Result<ScheduleEvent> {
        validate_new_event(&event)?;
        let req = self
            .auth(self.client.post(self.url("/events")))
            .json(&OwnedBody {
                user_id: user.as_str(),
                body: &event,
            });
        decode(self.send(req, "POST /events")?, "POST /events")
    }

    fn update_event(&self, id: Uuid, patch: &EventPatch) -> Result<()> {
        let req = self
            .auth(self.client.patch(self.url(&format!("/events/{id}"))))
            .json(patch);
        self.send_for_id(req, "PATCH /events/{id}", id)?;
        Ok(())
    }

    fn delete_event(&self, id: Uuid) -> Result<()> {
        let req = self.auth(self.client.delete(self.url(&format!("/events/{id}"))));
        self.send_for_id(req, "DELETE /events/{id}", id)?;
        Ok(())
    }

    fn fetch_profile(&self, user: &UserId) -> Result<UserProfile> {
        let req = self
            .auth(self.client.get(self.url("/profile")))
            .query(&[("user_id", user.as_str())]);
        decode(self.send(req, "GET /profile")?, "GET /profile")
    }

    fn update_profile(&self, user: &UserId, patch: &ProfilePatch) -> Result<()> {
        let req = self
            .auth(self.client.patch(self.url("/profile")))
            .query(&[("user_id", user.as_str())])
            .json(patch);
        self.send(req, "PATCH /profile")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{RemoteConfig, RemoteStore};

    #[test]
    fn url_joins_without_doubled_slashes() {
        let store = RemoteStore::new(RemoteConfig {
            base_url: "https://unitime.example.com/".to_string(),
            token: None,
        })
        .expect("build client");

        assert_eq!(
            store.url("/subjects"),
            "https://unitime.example.com/api/subjects"
        );
    }
}
