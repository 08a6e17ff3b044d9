// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Destination leases: at most one export per destination within the
// process. A second export to a leased destination is rejected, never queued.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};

use clinreport_core::error::{ReportError, Result};
use tracing::debug;

static ACTIVE: LazyLock<Mutex<HashSet<PathBuf>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

fn active() -> MutexGuard<'static, HashSet<PathBuf>> {
    // The set stays consistent even if a holder panicked mid-export.
    ACTIVE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exclusive claim on a destination, released on drop.
#[derive(Debug)]
pub struct DestinationLease {
    key: PathBuf,
}

impl DestinationLease {
    /// Claim `key`, or fail with `DestinationBusy` if another export holds it.
    pub fn acquire(key: impl AsRef<Path>) -> Result<Self> {
        let key = key.as_ref().to_path_buf();
        if !active().insert(key.clone()) {
            return Err(ReportError::DestinationBusy(key));
        }
        debug!(destination = %key.display(), "Destination leased");
        Ok(Self { key })
    }

    pub fn key(&self) -> &Path {
        &self.key
    }
}

impl Drop for DestinationLease {
    fn drop(&mut self) {
        active().remove(&self.key);
        debug!(destination = %self.key.display(), "Destination released");
    }
}
