use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard if a previous holder panicked.
///
/// Every critical section in these crates leaves its state consistent before
/// any call that could panic, so a poisoned lock still holds valid state.
/// Exported for the extension crates, which follow the same rule.
#[inline]
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn recovers_guard_after_holder_panicked() {
        let mutex = Arc::new(Mutex::new(3));
        let poisoner = Arc::clone(&mutex);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(mutex.is_poisoned());

        *lock(&mutex) += 1;
        assert_eq!(*lock(&mutex), 4);
    }
}
