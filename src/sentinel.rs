//! RAM-canary sentinel.
//!
//! A fixed-value byte placed at the edge of the statically allocated
//! region; its corruption indicates a stack/heap overrun trampling
//! other static state. Checked once per main-loop iteration — on
//! mismatch the caller commences shutdown (§7: "RAM corruption ⇒
//! commence shutdown").

const SENTINEL_VALUE: u8 = 0xA5;

static SENTINEL: core::sync::atomic::AtomicU8 = core::sync::atomic::AtomicU8::new(SENTINEL_VALUE);

/// True while the canary holds its initial value.
pub fn sentinel_intact() -> bool {
    SENTINEL.load(core::sync::atomic::Ordering::Relaxed) == SENTINEL_VALUE
}

/// Test-only: simulate corruption by overwriting the canary.
#[cfg(test)]
pub(crate) fn corrupt_for_test() {
    SENTINEL.store(0, core::sync::atomic::Ordering::Relaxed);
}

/// Test-only: restore the canary to its initial value.
#[cfg(test)]
pub(crate) fn restore_for_test() {
    SENTINEL.store(SENTINEL_VALUE, core::sync::atomic::Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intact_by_default() {
        restore_for_test();
        assert!(sentinel_intact());
    }

    #[test]
    fn corruption_is_detected() {
        corrupt_for_test();
        assert!(!sentinel_intact());
        restore_for_test();
    }
}
