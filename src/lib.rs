//! ghsync - project-to-GitHub synchronization service.
//!
//! Given a project's documents and binary files, ghsync assembles a
//! filesystem snapshot, reconciles it against a cached local clone of the
//! project's remote repository, commits, pushes, and streams step-by-step
//! progress to the caller over a long-lived SSE connection.
//!
//! Pipeline:
//!
//! ```text
//! +-----------+    +-----------+    +-----------+    +-----------+
//! | Snapshot  | -> |  Config   | -> | Workspace | -> | Reconcile |
//! | assemble  |    | validate  |    |  acquire  |    | + commit  |
//! +-----------+    +-----------+    +-----------+    |  + push   |
//!                                                    +-----------+
//! ```
//!
//! The orchestrator in [`run`] drives the pipeline; every transition is
//! mirrored to the caller through [`progress::ProgressStreamer`].

pub mod config;
pub mod error;
pub mod git;
pub mod paths;
pub mod progress;
pub mod reconcile;
pub mod run;
pub mod server;
pub mod snapshot;
pub mod source;
pub mod workspace;

pub use error::SyncError;
