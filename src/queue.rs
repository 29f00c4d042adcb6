//! Background job queue expectations.

use crate::alias::AliasRegistry;
use crate::api::{json_path, loose_eq, render};
use crate::store::EntityStore;
use crate::substitute::{AliasSubstituter, SubstitutionError};
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors raised by queue steps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// No queue inspector is configured for this scenario.
    #[error("no queue inspector is configured")]
    NotConfigured,
    /// No envelope in the queue has the task name.
    #[error("no task named '{task}' was found in queue '{queue}'")]
    TaskNotFound {
        /// Queue name.
        queue: String,
        /// Expected task name.
        task: String,
    },
    /// The queue holds fewer envelopes than the index requires.
    #[error("queue '{queue}' has no task at index {index}")]
    IndexNotFound {
        /// Queue name.
        queue: String,
        /// Requested index.
        index: usize,
    },
    /// The message has no value at the path.
    #[error("task message has no field '{path}'")]
    MissingField {
        /// Dotted path.
        path: String,
    },
    /// The value differs from the expectation.
    #[error("task field '{path}' is '{actual}', expected '{expected}'")]
    Mismatch {
        /// Dotted path.
        path: String,
        /// Expected value.
        expected: String,
        /// Actual value.
        actual: String,
    },
    /// The expected value referenced an unknown alias.
    #[error(transparent)]
    Substitution(#[from] SubstitutionError),
}

/// A queued task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Task name.
    pub name: String,
    /// Message payload.
    pub message: Value,
}

impl Envelope {
    /// Envelope for task `name` carrying `message`.
    #[must_use]
    pub fn new(name: impl Into<String>, message: Value) -> Self {
        Self {
            name: name.into(),
            message,
        }
    }
}

/// Read and reset access to the application's queues.
#[cfg_attr(test, mockall::automock)]
pub trait QueueInspector: Send {
    /// Names of every known queue.
    fn queue_names(&self) -> Vec<String>;

    /// Envelopes waiting in `queue`, oldest first.
    fn peek(&self, queue: &str) -> Vec<Envelope>;

    /// Drop `queue` and everything in it.
    fn remove(&mut self, queue: &str);
}

/// Queues held in memory, in creation order.
#[derive(Debug, Default)]
pub struct InMemoryQueues {
    queues: IndexMap<String, Vec<Envelope>>,
}

impl InMemoryQueues {
    /// No queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `envelope` to `queue`, creating the queue if needed.
    pub fn push(&mut self, queue: impl Into<String>, envelope: Envelope) {
        self.queues.entry(queue.into()).or_default().push(envelope);
    }
}

impl QueueInspector for InMemoryQueues {
    fn queue_names(&self) -> Vec<String> {
        self.queues.keys().cloned().collect()
    }

    fn peek(&self, queue: &str) -> Vec<Envelope> {
        self.queues.get(queue).cloned().unwrap_or_default()
    }

    fn remove(&mut self, queue: &str) {
        self.queues.shift_remove(queue);
    }
}

/// Borrowing facade for queue steps.
pub struct QueueSteps<'a> {
    inspector: Option<&'a mut dyn QueueInspector>,
    aliases: &'a AliasRegistry,
    store: &'a dyn EntityStore,
}

impl<'a> QueueSteps<'a> {
    /// Wrap the scenario's inspector and the alias state used to resolve
    /// expected values.
    #[must_use]
    pub fn new(
        inspector: Option<&'a mut dyn QueueInspector>,
        aliases: &'a AliasRegistry,
        store: &'a dyn EntityStore,
    ) -> Self {
        Self {
            inspector,
            aliases,
            store,
        }
    }

    fn inspector(&self) -> Result<&dyn QueueInspector, QueueError> {
        self.inspector.as_deref().ok_or(QueueError::NotConfigured)
    }

    /// Given all queues are cleared.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotConfigured`] without an inspector.
    pub fn clear_all(&mut self) -> Result<(), QueueError> {
        let inspector = self
            .inspector
            .as_deref_mut()
            .ok_or(QueueError::NotConfigured)?;
        for queue in inspector.queue_names() {
            debug!(queue = %queue, "clearing queue");
            inspector.remove(&queue);
        }
        Ok(())
    }

    /// Then queue `<queue>` should contain task `<task>`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::TaskNotFound`] when no envelope has that name.
    pub fn should_contain_task(&self, queue: &str, task: &str) -> Result<(), QueueError> {
        if self
            .inspector()?
            .peek(queue)
            .iter()
            .any(|envelope| envelope.name == task)
        {
            Ok(())
        } else {
            Err(QueueError::TaskNotFound {
                queue: queue.to_owned(),
                task: task.to_owned(),
            })
        }
    }

    /// Then the task in `<queue>` with index `<index>` should have field
    /// `<path>` with value `<value>`.
    ///
    /// `path` is dotted, descending into the message. `value` may contain
    /// alias references and is compared loosely.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the task or field is missing or differs.
    pub fn task_field_should_be(
        &self,
        queue: &str,
        index: usize,
        path: &str,
        value: &str,
    ) -> Result<(), QueueError> {
        let envelope = self
            .inspector()?
            .peek(queue)
            .into_iter()
            .nth(index)
            .ok_or_else(|| QueueError::IndexNotFound {
                queue: queue.to_owned(),
                index,
            })?;
        let actual = json_path(&envelope.message, path).ok_or_else(|| QueueError::MissingField {
            path: path.to_owned(),
        })?;
        let expected = AliasSubstituter::new(self.aliases, self.store).substitute_str(value)?;
        if loose_eq(&expected, actual) {
            Ok(())
        } else {
            Err(QueueError::Mismatch {
                path: path.to_owned(),
                expected: render(&expected),
                actual: render(actual),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Record;
    use crate::store::{ClassMetadata, InMemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    fn queues() -> InMemoryQueues {
        let mut queues = InMemoryQueues::new();
        queues.push(
            "mail",
            Envelope::new("SendWelcome", json!({"user": {"id": 7}, "locale": "en"})),
        );
        queues.push("mail", Envelope::new("SendReset", json!({"user": {"id": 8}})));
        queues.push("reports", Envelope::new("Render", json!({})));
        queues
    }

    fn aliases() -> AliasRegistry {
        let mut aliases = AliasRegistry::new();
        aliases.register("ada", Arc::new(Record::new("User").with("id", 7)));
        aliases
    }

    #[test]
    fn finds_tasks_by_name() {
        let mut queues = queues();
        let aliases = AliasRegistry::new();
        let store = InMemoryStore::new();
        let steps = QueueSteps::new(Some(&mut queues), &aliases, &store);
        assert_eq!(steps.should_contain_task("mail", "SendReset"), Ok(()));
        assert!(matches!(
            steps.should_contain_task("reports", "SendReset"),
            Err(QueueError::TaskNotFound { .. })
        ));
    }

    #[test]
    fn field_values_resolve_aliases() {
        let mut queues = queues();
        let aliases = aliases();
        let store = InMemoryStore::new().with_class(ClassMetadata::record("User", "id"));
        let steps = QueueSteps::new(Some(&mut queues), &aliases, &store);
        assert_eq!(steps.task_field_should_be("mail", 0, "user.id", "%ada%"), Ok(()));
        assert_eq!(steps.task_field_should_be("mail", 0, "locale", "en"), Ok(()));
        assert!(matches!(
            steps.task_field_should_be("mail", 1, "user.id", "%ada%"),
            Err(QueueError::Mismatch { .. })
        ));
        assert!(matches!(
            steps.task_field_should_be("mail", 5, "user.id", "7"),
            Err(QueueError::IndexNotFound { index: 5, .. })
        ));
        assert!(matches!(
            steps.task_field_should_be("mail", 1, "locale", "en"),
            Err(QueueError::MissingField { .. })
        ));
    }

    #[test]
    fn clear_all_removes_every_queue() {
        let mut inspector = MockQueueInspector::new();
        inspector
            .expect_queue_names()
            .returning(|| vec!["a".into(), "b".into()]);
        inspector.expect_remove().times(2).return_const(());
        let aliases = AliasRegistry::new();
        let store = InMemoryStore::new();
        let mut steps = QueueSteps::new(Some(&mut inspector), &aliases, &store);
        assert_eq!(steps.clear_all(), Ok(()));
    }

    #[test]
    fn missing_inspector_is_reported() {
        let aliases = AliasRegistry::new();
        let store = InMemoryStore::new();
        let steps = QueueSteps::new(None, &aliases, &store);
        assert_eq!(
            steps.should_contain_task("mail", "x"),
            Err(QueueError::NotConfigured)
        );
    }
}
