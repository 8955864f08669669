//! Lock commands.

use super::open_store;
use serde::Serialize;
use std::path::Path;
use tracekb_core::admin::{self, LockStatus};
use tracekb_core::{Identifier, Store};

/// One row of `list-locks`.
#[derive(Debug, Serialize)]
pub struct LockEntry {
    /// Resource IRI.
    pub uri: String,
    /// Derived lock name.
    pub lock: String,
    /// Whether the lock is held.
    pub held: bool,
}

impl From<LockStatus> for LockEntry {
    fn from(status: LockStatus) -> Self {
        Self {
            uri: status.uri.to_string(),
            lock: status.lock.to_string(),
            held: status.held,
        }
    }
}

/// Collects lock entries, held ones only if `held_only`.
pub fn entries(
    store: &Store,
    held_only: bool,
) -> Result<Vec<LockEntry>, Box<dyn std::error::Error>> {
    Ok(admin::lock_status(store)?
        .into_iter()
        .filter(|s| s.held || !held_only)
        .map(LockEntry::from)
        .collect())
}

/// Runs the list-locks command.
pub fn list(
    path: &Path,
    root: &str,
    held_only: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, root)?;
    let entries = entries(&store, held_only)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        _ => {
            if entries.is_empty() {
                println!("No lock-protected resources");
            }
            for entry in &entries {
                let state = if entry.held { "HELD" } else { "free" };
                println!("{state:<5} {}  ({})", entry.uri, entry.lock);
            }
        }
    }
    Ok(())
}

/// Runs the sweep-locks command.
pub fn sweep(path: &Path, root: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, root)?;

    if dry_run {
        let held = entries(&store, true)?;
        println!("Would release {} lock(s)", held.len());
        for entry in held {
            println!("  {}  ({})", entry.uri, entry.lock);
        }
        return Ok(());
    }

    let released = admin::sweep_locks(&store)?;
    println!("Released {} lock(s)", released.len());
    for lock in released {
        println!("  {lock}");
    }
    Ok(())
}

/// Runs the unlock command.
pub fn unlock(path: &Path, root: &str, uri: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, root)?;
    let uri = store.resolve(Identifier::parse(uri))?;
    if admin::force_unlock(&store, &uri)? {
        println!("Released lock of {uri}");
    } else {
        println!("Lock of {uri} was not held");
    }
    Ok(())
}
