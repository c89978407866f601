//! Leak registry for administrations that never mounted.
//!
//! A render registers its administration against the hook slot that owns
//! it. If the slot is dropped before the host subscribes (the render was
//! abandoned), [`sweep`] finds the dead owner and orphans the
//! administration, disposing its reaction. Subscribing cancels the
//! registration: from then on the host's cleanup is responsible.
//!
//! Sweeping is opportunistic. Nothing depends on it running at any
//! particular time.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use parking_lot::Mutex;

use super::admin::ObserverAdministration;

/// Identifies one registration, for [`unregister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationToken(u64);

struct Entry {
    token: RegistrationToken,
    owner: Weak<dyn Any + Send + Sync>,
    held: ObserverAdministration,
}

static ENTRIES: Mutex<Vec<Entry>> = parking_lot::const_mutex(Vec::new());

/// Orphan `held` once `owner` has no strong references left.
pub fn register(owner: Weak<dyn Any + Send + Sync>, held: ObserverAdministration) -> RegistrationToken {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    let token = RegistrationToken(NEXT.fetch_add(1, Ordering::Relaxed));
    ENTRIES.lock().push(Entry { token, owner, held });
    token
}

/// Cancel a registration. Unknown tokens are ignored.
pub fn unregister(token: RegistrationToken) {
    ENTRIES.lock().retain(|entry| entry.token != token);
}

/// Orphan every administration whose owner is gone. Returns how many.
pub fn sweep() -> usize {
    let dead: Vec<Entry> = {
        let mut entries = ENTRIES.lock();
        let (dead, live): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut *entries)
            .into_iter()
            .partition(|entry| entry.owner.strong_count() == 0);
        *entries = live;
        dead
    };

    for entry in &dead {
        entry.held.orphan();
    }
    if !dead.is_empty() {
        tracing::debug!(count = dead.len(), "swept abandoned observers");
    }
    dead.len()
}

/// Number of live registrations.
pub fn pending() -> usize {
    ENTRIES.lock().len()
}
