//! Access-code resolution.
//!
//! An access code is resolved once at login to a role and identity. The
//! result becomes a [`Session`] whose access code is later reused as the
//! realtime connection credential.

use serde::{Deserialize, Serialize};

use crate::error::QuizClientError;
use crate::protocol::{QuizId, TeamId};
use crate::session::{HostSession, ParticipantSession, Session};

/// Path of the resolution endpoint, relative to the API base URL.
pub const RESOLVE_PATH: &str = "/api/access/resolve";

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8090";

/// What an access code grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteType {
    Host,
    Participant,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAccess {
    pub id: TeamId,
    pub name: String,
    pub access_code: String,
    #[serde(default)]
    pub total_score: i64,
    pub quiz_id: QuizId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAccess {
    pub id: QuizId,
    pub title: String,
    pub proctor_pin: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Response of the resolution endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResolution {
    pub route_type: RouteType,
    #[serde(default)]
    pub quiz: Option<QuizAccess>,
    #[serde(default)]
    pub team: Option<TeamAccess>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl AccessResolution {
    /// Convert into the session to persist.
    ///
    /// # Errors
    ///
    /// Returns [`QuizClientError::AccessResolution`] for invalid codes and for
    /// responses missing the payload their route type requires.
    pub fn into_session(self) -> Result<Session, QuizClientError> {
        match (self.route_type, self.quiz, self.team) {
            (RouteType::Host, Some(quiz), _) => Ok(Session::Host(HostSession {
                quiz_id: quiz.id,
                quiz_title: quiz.title,
                proctor_pin: quiz.proctor_pin,
            })),
            (RouteType::Participant, _, Some(team)) => {
                Ok(Session::Participant(ParticipantSession {
                    quiz_id: team.quiz_id,
                    team_id: team.id,
                    team_name: team.name,
                    team_code: team.access_code,
                }))
            }
            (RouteType::Invalid, _, _) => Err(QuizClientError::AccessResolution(
                self.error_message
                    .unwrap_or_else(|| "invalid access code".to_string()),
            )),
            (route, _, _) => Err(QuizClientError::AccessResolution(format!(
                "{route:?} resolution is missing its payload"
            ))),
        }
    }
}

#[cfg(feature = "access-http")]
pub use http::HttpAccessResolver;

#[cfg(feature = "access-http")]
mod http {
    use std::sync::Arc;

    use reqwest::Client;
    use serde::Serialize;
    use tracing::{debug, warn};

    use super::{AccessResolution, DEFAULT_API_URL, RESOLVE_PATH};
    use crate::error::QuizClientError;
    use crate::session::Session;

    #[derive(Serialize)]
    struct ResolveRequest<'a> {
        code: &'a str,
    }

    /// Resolves access codes against the quiz REST API.
    #[derive(Debug, Clone)]
    pub struct HttpAccessResolver {
        client: Client,
        base_url: Arc<str>,
    }

    impl Default for HttpAccessResolver {
        fn default() -> Self {
            Self::new(DEFAULT_API_URL)
        }
    }

    impl HttpAccessResolver {
        pub fn new(base_url: &str) -> Self {
            Self {
                client: Client::new(),
                base_url: Arc::from(base_url.trim_end_matches('/')),
            }
        }

        /// POST the code and return the raw resolution.
        ///
        /// # Errors
        ///
        /// Returns [`QuizClientError::AccessResolution`] when the request fails,
        /// the server answers with a non-success status, or the body does not parse.
        pub async fn resolve(&self, code: &str) -> Result<AccessResolution, QuizClientError> {
            let url = format!("{}{}", self.base_url, RESOLVE_PATH);
            debug!(%url, "resolving access code");
            let response = self
                .client
                .post(&url)
                .json(&ResolveRequest { code: code.trim() })
                .send()
                .await
                .map_err(|e| QuizClientError::AccessResolution(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!(%status, "access resolution rejected");
                return Err(QuizClientError::AccessResolution(if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                }));
            }

            response
                .json::<AccessResolution>()
                .await
                .map_err(|e| QuizClientError::AccessResolution(e.to_string()))
        }

        /// Resolve `code` straight to a [`Session`].
        ///
        /// # Errors
        ///
        /// See [`resolve`](Self::resolve) and [`AccessResolution::into_session`].
        pub async fn resolve_session(&self, code: &str) -> Result<Session, QuizClientError> {
            self.resolve(code).await?.into_session()
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::Role;

    #[test]
    fn host_resolution_becomes_host_session() {
        let json = r#"{
            "routeType": "HOST",
            "quiz": {"id": 4, "title": "Finals", "proctorPin": "1234", "status": "READY"}
        }"#;
        let session = serde_json::from_str::<AccessResolution>(json)
            .unwrap()
            .into_session()
            .unwrap();
        assert_eq!(session.role(), Role::Host);
        assert_eq!(session.quiz_id(), 4);
        assert_eq!(session.access_code(), "1234");
    }

    #[test]
    fn participant_resolution_uses_team_quiz() {
        let json = r#"{
            "routeType": "PARTICIPANT",
            "team": {"id": 9, "name": "Owls", "accessCode": "OWL9", "totalScore": 0, "quizId": 4}
        }"#;
        let session = serde_json::from_str::<AccessResolution>(json)
            .unwrap()
            .into_session()
            .unwrap();
        assert_eq!(session.team_id(), Some(9));
        assert_eq!(session.quiz_id(), 4);
        assert_eq!(session.display_name(), "Owls");
    }

    #[test]
    fn invalid_resolution_carries_server_message() {
        let json = r#"{"routeType": "INVALID", "errorMessage": "No such code"}"#;
        let err = serde_json::from_str::<AccessResolution>(json)
            .unwrap()
            .into_session()
            .unwrap_err();
        assert!(matches!(err, QuizClientError::AccessResolution(m) if m == "No such code"));
    }

    #[test]
    fn missing_payload_is_an_error() {
        let resolution = AccessResolution {
            route_type: RouteType::Participant,
            quiz: None,
            team: None,
            error_message: None,
        };
        assert!(resolution.into_session().is_err());
    }
}
