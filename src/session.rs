//! Persisted client identity.
//!
//! A [`SessionStore`] holds exactly one [`Session`] at a time; saving either
//! role overwrites whatever was there. The storage backend is pluggable through
//! [`SessionStorage`] so the same store works in memory (tests, embedded use)
//! and on disk (survives restarts).

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::QuizClientError;
use crate::protocol::{QuizId, Role, TeamId};

/// Host identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSession {
    pub quiz_id: QuizId,
    pub quiz_title: String,
    /// Also the realtime access code.
    pub proctor_pin: String,
}

/// Participant identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSession {
    pub quiz_id: QuizId,
    pub team_id: TeamId,
    pub team_name: String,
    /// Also the realtime access code.
    pub team_code: String,
}

/// The identity of the local client for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Session {
    #[serde(rename = "PROCTOR", alias = "HOST")]
    Host(HostSession),
    #[serde(rename = "PARTICIPANT")]
    Participant(ParticipantSession),
}

impl Session {
    pub fn role(&self) -> Role {
        match self {
            Self::Host(_) => Role::Host,
            Self::Participant(_) => Role::Participant,
        }
    }

    pub fn quiz_id(&self) -> QuizId {
        match self {
            Self::Host(h) => h.quiz_id,
            Self::Participant(p) => p.quiz_id,
        }
    }

    /// Credential sent in the realtime connection header.
    pub fn access_code(&self) -> &str {
        match self {
            Self::Host(h) => &h.proctor_pin,
            Self::Participant(p) => &p.team_code,
        }
    }

    /// Quiz title for hosts, team name for participants.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Host(h) => &h.quiz_title,
            Self::Participant(p) => &p.team_name,
        }
    }

    pub fn team_id(&self) -> Option<TeamId> {
        match self {
            Self::Host(_) => None,
            Self::Participant(p) => Some(p.team_id),
        }
    }
}

// ── Storage backends ────────────────────────────────────────────────

/// A single-slot string store.
pub trait SessionStorage: Send {
    /// Read the slot.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    fn get(&self) -> Result<Option<String>, QuizClientError>;

    /// Overwrite the slot.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be written.
    fn set(&mut self, value: &str) -> Result<(), QuizClientError>;

    /// Empty the slot. Emptying an empty slot succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be written.
    fn remove(&mut self) -> Result<(), QuizClientError>;
}

/// Volatile storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    slot: Option<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self) -> Result<Option<String>, QuizClientError> {
        Ok(self.slot.clone())
    }

    fn set(&mut self, value: &str) -> Result<(), QuizClientError> {
        self.slot = Some(value.to_string());
        Ok(())
    }

    fn remove(&mut self) -> Result<(), QuizClientError> {
        self.slot = None;
        Ok(())
    }
}

/// One JSON file on disk. A missing file is an empty slot.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, e: io::Error) -> QuizClientError {
        QuizClientError::Storage(format!("{}: {e}", self.path.display()))
    }
}

impl SessionStorage for FileStorage {
    fn get(&self) -> Result<Option<String>, QuizClientError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.storage_error(e)),
        }
    }

    fn set(&mut self, value: &str) -> Result<(), QuizClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.storage_error(e))?;
        }
        std::fs::write(&self.path, value).map_err(|e| self.storage_error(e))
    }

    fn remove(&mut self) -> Result<(), QuizClientError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.storage_error(e)),
        }
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// Typed single-slot session persistence.
///
/// Every write bumps a generation counter observable through
/// [`subscribe`](Self::subscribe). Writes made behind the store's back (another
/// process sharing a [`FileStorage`]) are only noticed by
/// [`refresh`](Self::refresh); callers decide how to react.
pub struct SessionStore<S: SessionStorage = MemoryStorage> {
    storage: S,
    last_seen: Option<String>,
    changes: watch::Sender<u64>,
}

impl<S: SessionStorage> std::fmt::Debug for SessionStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("has_session", &self.last_seen.is_some())
            .field("generation", &*self.changes.borrow())
            .finish()
    }
}

impl SessionStore<MemoryStorage> {
    /// A store backed by [`MemoryStorage`].
    pub fn in_memory() -> Self {
        Self::with_storage(MemoryStorage::new())
    }
}

impl<S: SessionStorage> SessionStore<S> {
    /// Wrap `storage`. Existing content is adopted without counting as a change.
    pub fn with_storage(storage: S) -> Self {
        let last_seen = storage.get().unwrap_or_else(|e| {
            warn!(error = %e, "session storage unreadable");
            None
        });
        let (changes, _) = watch::channel(0);
        Self {
            storage,
            last_seen,
            changes,
        }
    }

    /// Receiver whose value increments on every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Persist a host session, replacing any previous session.
    ///
    /// # Errors
    ///
    /// Returns an error when the session cannot be stored.
    pub fn save_host(
        &mut self,
        quiz_id: QuizId,
        quiz_title: impl Into<String>,
        proctor_pin: impl Into<String>,
    ) -> Result<Session, QuizClientError> {
        self.save(Session::Host(HostSession {
            quiz_id,
            quiz_title: quiz_title.into(),
            proctor_pin: proctor_pin.into(),
        }))
    }

    /// Persist a participant session, replacing any previous session.
    ///
    /// # Errors
    ///
    /// Returns an error when the session cannot be stored.
    pub fn save_participant(
        &mut self,
        quiz_id: QuizId,
        team_id: TeamId,
        team_name: impl Into<String>,
        team_code: impl Into<String>,
    ) -> Result<Session, QuizClientError> {
        self.save(Session::Participant(ParticipantSession {
            quiz_id,
            team_id,
            team_name: team_name.into(),
            team_code: team_code.into(),
        }))
    }

    /// Persist `session`, replacing any previous session.
    ///
    /// # Errors
    ///
    /// Returns an error when the session cannot be serialized or stored.
    pub fn save(&mut self, session: Session) -> Result<Session, QuizClientError> {
        let raw = serde_json::to_string(&session)?;
        self.storage.set(&raw)?;
        debug!(role = ?session.role(), quiz_id = session.quiz_id(), "session saved");
        self.mark_changed(Some(raw));
        Ok(session)
    }

    /// The stored session. Unparseable content reads as no session.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    pub fn load(&self) -> Result<Option<Session>, QuizClientError> {
        let Some(raw) = self.storage.get()? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(error = %e, "discarding unparseable session");
                Ok(None)
            }
        }
    }

    /// The stored session if it is a host session.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    pub fn as_host(&self) -> Result<Option<HostSession>, QuizClientError> {
        Ok(match self.load()? {
            Some(Session::Host(h)) => Some(h),
            _ => None,
        })
    }

    /// The stored session if it is a participant session.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    pub fn as_participant(&self) -> Result<Option<ParticipantSession>, QuizClientError> {
        Ok(match self.load()? {
            Some(Session::Participant(p)) => Some(p),
            _ => None,
        })
    }

    /// Whether the slot holds anything, parseable or not.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    pub fn has_session(&self) -> Result<bool, QuizClientError> {
        Ok(self.storage.get()?.is_some())
    }

    /// Remove the stored session.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be written.
    pub fn clear(&mut self) -> Result<(), QuizClientError> {
        self.storage.remove()?;
        debug!("session cleared");
        self.mark_changed(None);
        Ok(())
    }

    /// Re-read the backend and signal a change if it differs from what this
    /// store last wrote or saw. Returns whether a change was detected.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    pub fn refresh(&mut self) -> Result<bool, QuizClientError> {
        let current = self.storage.get()?;
        if current == self.last_seen {
            return Ok(false);
        }
        debug!("session changed externally");
        self.mark_changed(current);
        Ok(true)
    }

    fn mark_changed(&mut self, raw: Option<String>) {
        self.last_seen = raw;
        self.changes.send_modify(|generation| *generation += 1);
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

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "quiz-live-client-{}-{name}.json",
            uuid::Uuid::new_v4()
        ))
    }

    #[test]
    fn save_overwrites_across_roles() {
        let mut store = SessionStore::in_memory();
        store.save_host(1, "Finals", "PIN1").unwrap();
        assert!(store.as_host().unwrap().is_some());

        store.save_participant(2, 7, "Owls", "TEAM7").unwrap();
        assert!(store.as_host().unwrap().is_none());
        let p = store.as_participant().unwrap().unwrap();
        assert_eq!(p.quiz_id, 2);
        assert_eq!(p.team_id, 7);
        assert_eq!(p.team_code, "TEAM7");
    }

    #[test]
    fn clear_empties_the_slot() {
        let mut store = SessionStore::in_memory();
        assert!(!store.has_session().unwrap());
        store.save_host(1, "Finals", "PIN1").unwrap();
        assert!(store.has_session().unwrap());
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn host_serializes_with_proctor_tag() {
        let session = Session::Host(HostSession {
            quiz_id: 3,
            quiz_title: "Finals".into(),
            proctor_pin: "9999".into(),
        });
        let json: serde_json::Value = serde_json::to_value(&session).unwrap();
        assert_eq!(json["role"], "PROCTOR");
        assert_eq!(json["quizTitle"], "Finals");
        assert_eq!(json["proctorPin"], "9999");

        let alias: Session = serde_json::from_str(
            r#"{"role":"HOST","quizId":3,"quizTitle":"Finals","proctorPin":"9999"}"#,
        )
        .unwrap();
        assert_eq!(alias, session);
    }

    #[test]
    fn accessors_by_role() {
        let mut store = SessionStore::in_memory();
        let host = store.save_host(1, "Finals", "PIN1").unwrap();
        assert_eq!(host.role(), Role::Host);
        assert_eq!(host.access_code(), "PIN1");
        assert_eq!(host.display_name(), "Finals");
        assert_eq!(host.team_id(), None);

        let team = store.save_participant(1, 4, "Owls", "OWL").unwrap();
        assert_eq!(team.role(), Role::Participant);
        assert_eq!(team.access_code(), "OWL");
        assert_eq!(team.team_id(), Some(4));
    }

    #[test]
    fn corrupt_content_loads_as_none() {
        let mut storage = MemoryStorage::new();
        storage.set("{not json").unwrap();
        let store = SessionStore::with_storage(storage);
        assert!(store.has_session().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn writes_bump_generation() {
        let mut store = SessionStore::in_memory();
        let rx = store.subscribe();
        assert_eq!(*rx.borrow(), 0);
        store.save_host(1, "Finals", "PIN1").unwrap();
        store.clear().unwrap();
        assert_eq!(*rx.borrow(), 2);
    }

    #[test]
    fn file_storage_round_trip_and_external_change() {
        let path = temp_path("store");
        let mut store = SessionStore::with_storage(FileStorage::new(&path));
        assert!(store.load().unwrap().is_none());
        store.save_participant(5, 1, "Owls", "OWL").unwrap();

        let reopened = SessionStore::with_storage(FileStorage::new(&path));
        assert_eq!(reopened.load().unwrap().unwrap().quiz_id(), 5);

        assert!(!store.refresh().unwrap());
        let mut other = SessionStore::with_storage(FileStorage::new(&path));
        other.save_host(6, "Semis", "PIN").unwrap();
        let rx = store.subscribe();
        let before = *rx.borrow();
        assert!(store.refresh().unwrap());
        assert_eq!(*rx.borrow(), before + 1);
        assert_eq!(store.load().unwrap().unwrap().role(), Role::Host);

        other.clear().unwrap();
        assert!(store.refresh().unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn file_storage_failures_name_the_path() {
        let blocker = temp_path("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut store = SessionStore::with_storage(FileStorage::new(blocker.join("session.json")));
        let err = store.save_host(1, "Finals", "PIN1").unwrap_err();
        assert!(matches!(err, QuizClientError::Storage(_)), "{err}");
        assert!(err.to_string().contains("blocker"), "{err}");

        let dir = temp_path("dir");
        std::fs::create_dir_all(&dir).unwrap();
        let err = FileStorage::new(&dir).get().unwrap_err();
        assert!(matches!(err, QuizClientError::Storage(_)), "{err}");

        std::fs::remove_file(&blocker).unwrap();
        std::fs::remove_dir(&dir).unwrap();
    }
}
