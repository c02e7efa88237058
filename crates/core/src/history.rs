//! Local history of finished generation jobs.
//!
//! The poller hands every `Succeeded` or `Failed` job to a [`HistoryStore`]
//! once it reaches its terminal state. Entries are keyed by a caller-side
//! [`HistoryId`], never by the provider's job id.

use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::{Job, JobErrorKind, JobState};
use crate::types::{HistoryId, Timestamp};

/// Which generation agent produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentType {
    Generator,
    VideoGenerator,
    PromptSpecialist,
    ImageReplicator,
}

/// What a finished job left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryOutcome {
    Output {
        uri: String,
        mime_type: Option<String>,
        size_bytes: usize,
    },
    Failure {
        kind: JobErrorKind,
        message: String,
    },
}

/// A stored history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: HistoryId,
    pub agent_type: AgentType,
    pub timestamp: Timestamp,
    pub prompt: String,
    /// Reference image as a data URL, when one was used.
    pub input_image: Option<String>,
    pub outcome: HistoryOutcome,
}

/// History entry before the store assigns `id` and `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryItem {
    pub agent_type: AgentType,
    pub prompt: String,
    pub input_image: Option<String>,
    pub outcome: HistoryOutcome,
}

impl NewHistoryItem {
    /// Build an entry from a terminal video job.
    ///
    /// Returns `None` for jobs that are not `Succeeded` or `Failed`;
    /// cancelled and in-flight jobs are never recorded.
    pub fn from_job(job: &Job) -> Option<Self> {
        let outcome = match (job.state(), job.result(), job.error()) {
            (JobState::Succeeded, Some(artifact), _) => HistoryOutcome::Output {
                uri: artifact.source_uri.clone(),
                mime_type: artifact.mime_type.clone(),
                size_bytes: artifact.len(),
            },
            (JobState::Failed, _, Some(error)) => HistoryOutcome::Failure {
                kind: error.kind,
                message: error.message.clone(),
            },
            _ => return None,
        };

        let request = job.request();
        Some(Self {
            agent_type: AgentType::VideoGenerator,
            prompt: request.prompt.clone(),
            input_image: request.reference_image.as_ref().map(|i| i.to_data_url()),
            outcome,
        })
    }
}

/// Append-only sink for finished jobs, plus the listing and deletion
/// operations the history sidebar needs.
pub trait HistoryStore: Send + Sync {
    /// Store a new entry and return it with its assigned id and timestamp.
    fn append(&self, item: NewHistoryItem) -> HistoryItem;

    /// All entries, newest first.
    fn list(&self) -> Vec<HistoryItem>;

    /// Entries for one agent, newest first.
    fn list_agent(&self, agent_type: AgentType) -> Vec<HistoryItem> {
        self.list()
            .into_iter()
            .filter(|item| item.agent_type == agent_type)
            .collect()
    }

    fn get(&self, id: HistoryId) -> Option<HistoryItem>;

    fn delete(&self, id: HistoryId) -> Result<(), CoreError>;

    /// Remove every entry for `agent_type`. Returns how many were removed.
    fn clear_agent(&self, agent_type: AgentType) -> usize;
}

#[derive(Default)]
struct HistoryInner {
    /// Newest first.
    items: Vec<HistoryItem>,
    last_id: HistoryId,
}

/// Process-local history store.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    inner: RwLock<HistoryInner>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn append(&self, item: NewHistoryItem) -> HistoryItem {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        // Millisecond ids, bumped when two entries land in the same millisecond.
        let id = now.timestamp_millis().max(inner.last_id + 1);
        inner.last_id = id;

        let stored = HistoryItem {
            id,
            agent_type: item.agent_type,
            timestamp: now,
            prompt: item.prompt,
            input_image: item.input_image,
            outcome: item.outcome,
        };
        inner.items.insert(0, stored.clone());
        stored
    }

    fn list(&self) -> Vec<HistoryItem> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .clone()
    }

    fn get(&self, id: HistoryId) -> Option<HistoryItem> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    fn delete(&self, id: HistoryId) -> Result<(), CoreError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = inner.items.len();
        inner.items.retain(|item| item.id != id);
        if inner.items.len() == before {
            return Err(CoreError::HistoryNotFound(id));
        }
        Ok(())
    }

    fn clear_agent(&self, agent_type: AgentType) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = inner.items.len();
        inner.items.retain(|item| item.agent_type != agent_type);
        before - inner.items.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::job::{Artifact, JobError, ProviderJobId};
    use crate::request::{GenerationRequest, ReferenceImage};

    fn entry(agent_type: AgentType, prompt: &str) -> NewHistoryItem {
        NewHistoryItem {
            agent_type,
            prompt: prompt.to_string(),
            input_image: None,
            outcome: HistoryOutcome::Output {
                uri: "file:///tmp/out.mp4".into(),
                mime_type: Some("video/mp4".into()),
                size_bytes: 10,
            },
        }
    }

    #[test]
    fn append_lists_newest_first_with_increasing_ids() {
        let store = InMemoryHistoryStore::new();
        let first = store.append(entry(AgentType::VideoGenerator, "one"));
        let second = store.append(entry(AgentType::VideoGenerator, "two"));

        assert!(second.id > first.id);
        let prompts: Vec<_> = store.list().into_iter().map(|i| i.prompt).collect();
        assert_eq!(prompts, vec!["two", "one"]);
    }

    #[test]
    fn get_and_delete() {
        let store = InMemoryHistoryStore::new();
        let item = store.append(entry(AgentType::VideoGenerator, "one"));

        assert_eq!(store.get(item.id).unwrap().prompt, "one");
        store.delete(item.id).unwrap();
        assert!(store.get(item.id).is_none());
        assert_matches!(store.delete(item.id), Err(CoreError::HistoryNotFound(id)) if id == item.id);
    }

    #[test]
    fn clear_agent_only_removes_that_agent() {
        let store = InMemoryHistoryStore::new();
        store.append(entry(AgentType::VideoGenerator, "video"));
        store.append(entry(AgentType::Generator, "image"));
        store.append(entry(AgentType::VideoGenerator, "video 2"));

        assert_eq!(store.clear_agent(AgentType::VideoGenerator), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.list_agent(AgentType::Generator).len(), 1);
        assert!(store.list_agent(AgentType::VideoGenerator).is_empty());
    }

    #[test]
    fn from_job_records_success() {
        let image = ReferenceImage::new("image/png", "abc");
        let mut job = Job::new(GenerationRequest::text("a red bicycle").with_reference_image(image));
        job.begin_polling(ProviderJobId::new("op")).unwrap();
        job.succeed(Artifact::new(vec![0u8; 4], Some("video/mp4".into()), "uri".into()))
            .unwrap();

        let item = NewHistoryItem::from_job(&job).unwrap();
        assert_eq!(item.agent_type, AgentType::VideoGenerator);
        assert_eq!(item.input_image.as_deref(), Some("data:image/png;base64,abc"));
        assert_matches!(item.outcome, HistoryOutcome::Output { size_bytes: 4, .. });
    }

    #[test]
    fn from_job_records_failure() {
        let mut job = Job::new(GenerationRequest::text("x"));
        job.fail(JobError::new(JobErrorKind::Quota, "exhausted"))
            .unwrap();

        let item = NewHistoryItem::from_job(&job).unwrap();
        assert_matches!(
            item.outcome,
            HistoryOutcome::Failure { kind: JobErrorKind::Quota, ref message } if message == "exhausted"
        );
    }

    #[test]
    fn from_job_skips_cancelled_and_running() {
        let mut job = Job::new(GenerationRequest::text("x"));
        assert!(NewHistoryItem::from_job(&job).is_none());
        job.cancel().unwrap();
        assert!(NewHistoryItem::from_job(&job).is_none());
    }

    #[test]
    fn agent_type_serializes_like_the_frontend() {
        let json = serde_json::to_string(&AgentType::VideoGenerator).unwrap();
        assert_eq!(json, r#""videoGenerator""#);
    }
}
