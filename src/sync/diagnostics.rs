//! Where the synchronizer reports failures it does not surface to callers.

use std::sync::Mutex;

use crate::core::DecodeError;
use crate::store::{Collection, StoreError};

/// A failure on one of the synchronizer's channels.
///
/// Listener failures are reported once per occurrence and nothing is
/// retried. Document problems are reported once per key, when a snapshot
/// first shows the key as bad.
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// The store's listener for `collection` failed and was cancelled.
    ListenFailed {
        collection: Collection,
        error: StoreError,
    },
    /// One document did not decode and was left out of the join.
    DocumentRejected {
        collection: Collection,
        error: DecodeError,
    },
    /// One tree kept its place in the list with the fields that did not
    /// decode dropped.
    DocumentRepaired {
        collection: Collection,
        error: DecodeError,
    },
}

impl Diagnostic {
    pub fn collection(&self) -> Collection {
        match self {
            Diagnostic::ListenFailed { collection, .. }
            | Diagnostic::DocumentRejected { collection, .. }
            | Diagnostic::DocumentRepaired { collection, .. } => *collection,
        }
    }

    /// Key of the offending document, for document problems.
    pub fn key(&self) -> Option<&str> {
        match self {
            Diagnostic::ListenFailed { .. } => None,
            Diagnostic::DocumentRejected { error, .. }
            | Diagnostic::DocumentRepaired { error, .. } => Some(&error.key),
        }
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Reports through `tracing` at warn level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::ListenFailed { collection, error } => {
                tracing::warn!(
                    collection = collection.as_str(),
                    retryable = error.transience().is_retryable(),
                    "listen failed: {error}"
                );
            }
            Diagnostic::DocumentRejected { collection, error } => {
                tracing::warn!(
                    collection = collection.as_str(),
                    key = %error.key,
                    "document skipped: {}",
                    error.reason
                );
            }
            Diagnostic::DocumentRepaired { collection, error } => {
                tracing::warn!(
                    collection = collection.as_str(),
                    key = %error.key,
                    "document kept without bad fields: {}",
                    error.reason
                );
            }
        }
    }
}

/// Keeps every report in memory; for tests and for status screens.
#[derive(Debug, Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Diagnostic> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(diagnostic);
        }
    }
}
