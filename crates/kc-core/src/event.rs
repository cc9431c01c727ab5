//! Session lifecycle events.
//!
//! Every lifecycle transition of a client session produces one [`Event`],
//! which is written as a structured `tracing` record by [`Event::emit`].
//!
//! Events carry the realm, client and outcome. They never contain tokens or
//! identity claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Session established (fresh login or restored tokens).
    Login,
    /// Provider reported an authentication failure.
    LoginError,
    /// Session torn down.
    Logout,
    /// Token refreshed.
    RefreshToken,
    /// Token refresh failed.
    RefreshTokenError,
    /// Step-up login at a higher assurance level requested.
    StepUpLogin,
    /// Authenticated, but identity claims were rejected.
    ClaimsRejected,
    /// Initialization finished without an authenticated session.
    SessionRestored,
}

impl EventType {
    /// Returns the wire name of the event type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::LoginError => "LOGIN_ERROR",
            Self::Logout => "LOGOUT",
            Self::RefreshToken => "REFRESH_TOKEN",
            Self::RefreshTokenError => "REFRESH_TOKEN_ERROR",
            Self::StepUpLogin => "STEP_UP_LOGIN",
            Self::ClaimsRejected => "CLAIMS_REJECTED",
            Self::SessionRestored => "SESSION_RESTORED",
        }
    }
}

/// Outcome of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failure,
}

/// A session lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,

    /// Timestamp of the event (ISO 8601).
    pub timestamp: DateTime<Utc>,

    /// Type of event.
    pub event_type: EventType,

    /// Outcome of the event.
    pub outcome: EventOutcome,

    /// Realm the session belongs to.
    pub realm: Option<String>,

    /// Client ID of the application.
    pub client_id: Option<String>,

    /// Error message (for failure events).
    pub error: Option<String>,

    /// Additional details as key-value pairs.
    pub details: Vec<(String, String)>,
}

impl Event {
    /// Creates a new event builder.
    #[must_use]
    pub const fn builder(event_type: EventType) -> EventBuilder {
        EventBuilder::new(event_type)
    }

    /// Writes the event to the `tracing` subscriber.
    ///
    /// Failures are recorded at warn level, everything else at info.
    pub fn emit(&self) {
        let details = self
            .details
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");

        match self.outcome {
            EventOutcome::Success => tracing::info!(
                event_id = %self.id,
                event_type = self.event_type.as_str(),
                realm = self.realm.as_deref().unwrap_or_default(),
                client_id = self.client_id.as_deref().unwrap_or_default(),
                details = %details,
                "session event"
            ),
            EventOutcome::Failure => tracing::warn!(
                event_id = %self.id,
                event_type = self.event_type.as_str(),
                realm = self.realm.as_deref().unwrap_or_default(),
                client_id = self.client_id.as_deref().unwrap_or_default(),
                error = self.error.as_deref().unwrap_or_default(),
                details = %details,
                "session event failed"
            ),
        }
    }
}

/// Builder for creating events.
#[derive(Debug)]
pub struct EventBuilder {
    event_type: EventType,
    outcome: EventOutcome,
    realm: Option<String>,
    client_id: Option<String>,
    error: Option<String>,
    details: Vec<(String, String)>,
}

impl EventBuilder {
    /// Creates a new event builder.
    #[must_use]
    pub const fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            outcome: EventOutcome::Success,
            realm: None,
            client_id: None,
            error: None,
            details: Vec::new(),
        }
    }

    /// Sets the outcome to success.
    #[must_use]
    pub const fn success(mut self) -> Self {
        self.outcome = EventOutcome::Success;
        self
    }

    /// Sets the outcome to failure with an error message.
    #[must_use]
    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.outcome = EventOutcome::Failure;
        self.error = Some(error.into());
        self
    }

    /// Sets the realm.
    #[must_use]
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Sets the client ID.
    #[must_use]
    pub fn client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Adds a detail key-value pair.
    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> Event {
        Event {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event_type: self.event_type,
            outcome: self.outcome,
            realm: self.realm,
            client_id: self.client_id,
            error: self.error,
            details: self.details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_builder_creates_success_event() {
        let event = Event::builder(EventType::Login)
            .success()
            .realm("citizens")
            .client("portal")
            .detail("assurance_level", "4")
            .build();

        assert_eq!(event.event_type, EventType::Login);
        assert_eq!(event.outcome, EventOutcome::Success);
        assert_eq!(event.realm.as_deref(), Some("citizens"));
        assert_eq!(event.client_id.as_deref(), Some("portal"));
        assert_eq!(
            event.details,
            vec![("assurance_level".to_string(), "4".to_string())]
        );
        assert!(event.error.is_none());
    }

    #[test]
    fn event_builder_creates_failure_event() {
        let event = Event::builder(EventType::RefreshTokenError)
            .failure("refresh denied")
            .build();

        assert_eq!(event.outcome, EventOutcome::Failure);
        assert_eq!(event.error.as_deref(), Some("refresh denied"));
    }

    #[test]
    fn event_type_wire_names_match_serde() {
        for event_type in [EventType::ClaimsRejected, EventType::RefreshTokenError] {
            let json = serde_json::to_string(&event_type).unwrap();
            assert_eq!(json, format!("\"{}\"", event_type.as_str()));
        }
    }

    #[test]
    fn event_has_timestamp() {
        let before = Utc::now();
        let event = Event::builder(EventType::Logout).build();
        let after = Utc::now();

        assert!(event.timestamp >= before);
        assert!(event.timestamp <= after);
    }
}
