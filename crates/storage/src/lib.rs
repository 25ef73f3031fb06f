// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for the workspace reconciler

mod fs;
mod manifest;
mod memory;
mod snapshot;
mod state;

pub use fs::{FsStore, SyncReport, SNAPSHOT_FILE, TOKENS_DIR};
pub use manifest::{Manifest, ManifestError, ManifestKey, ManifestKind};
pub use memory::{MemoryStore, TokenRequest};
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::{ApplyOutcome, DeleteOutcome, StoreState};
