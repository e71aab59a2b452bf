//! Denormalized tree list kept live from the three census collections.

mod diagnostics;
mod join;
mod synchronizer;
mod tables;

pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, TracingSink};
pub use join::denormalize;
pub use synchronizer::{Subscription, SyncError, TreeSynchronizer};
pub use tables::{JoinRevision, LookupTable, TreeTable};
