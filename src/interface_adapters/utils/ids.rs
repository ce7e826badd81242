use std::{
    sync::{
        OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

/// Guest account ids carry this bit so they never collide with stored account ids.
pub const GUEST_ACCOUNT_BIT: u64 = 1 << 62;

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

// Process-wide counter seeded from the clock so ids differ across restarts.
fn next_id() -> u64 {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| AtomicU64::new(now_nanos() & (GUEST_ACCOUNT_BIT - 1)));
    counter.fetch_add(1, Ordering::Relaxed)
}

/// Process-unique id for a WebSocket connection.
pub fn connection_id() -> u64 {
    next_id()
}

/// Process-unique account id for a guest; fits in a signed 64-bit column.
pub fn guest_account_id() -> u64 {
    GUEST_ACCOUNT_BIT | (next_id() & (GUEST_ACCOUNT_BIT - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique() {
        let a = connection_id();
        let b = connection_id();
        assert_ne!(a, b);
    }

    #[test]
    fn guest_ids_are_tagged_and_fit_i64() {
        let id = guest_account_id();
        assert_ne!(id & GUEST_ACCOUNT_BIT, 0);
        assert!(i64::try_from(id).is_ok());
    }
}
