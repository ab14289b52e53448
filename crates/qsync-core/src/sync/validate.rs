//! Ownership heuristic: does a snapshot plausibly belong to this session?
//!
//! Records that carry an `auth_id` must all agree, and once a non-empty
//! snapshot has been committed its owner is pinned; later snapshots naming a
//! different owner are rejected. Records without an `auth_id` pass.

use std::sync::Mutex;

use crate::item::Item;

fn snapshot_owner(items: &[Item]) -> Result<Option<&str>, String> {
    let mut owner: Option<&str> = None;
    for item in items {
        let Some(id) = item.auth_id.as_deref().filter(|s| !s.is_empty()) else {
            continue;
        };
        match owner {
            None => owner = Some(id),
            Some(o) if o == id => {}
            Some(o) => return Err(format!("snapshot mixes accounts {o} and {id}")),
        }
    }
    Ok(owner)
}

#[derive(Debug, Default)]
pub struct OwnerPin {
    pinned: Mutex<Option<String>>,
}

impl OwnerPin {
    /// Returns the snapshot's owner if it is consistent with the pin.
    pub fn check(&self, items: &[Item]) -> Result<Option<String>, String> {
        let owner = snapshot_owner(items)?;
        let pinned = self.pinned.lock().unwrap_or_else(|e| e.into_inner());
        if let (Some(p), Some(o)) = (pinned.as_deref(), owner) {
            if p != o {
                return Err(format!("snapshot belongs to account {o}, expected {p}"));
            }
        }
        Ok(owner.map(str::to_string))
    }

    /// Pins `owner` if nothing is pinned yet.
    pub fn pin(&self, owner: Option<String>) {
        let mut pinned = self.pinned.lock().unwrap_or_else(|e| e.into_inner());
        if pinned.is_none() {
            *pinned = owner;
        }
    }

    pub fn pinned(&self) -> Option<String> {
        self.pinned.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        *self.pinned.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
