use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Test object shared between tasks, such as a scoreboard or a transaction log.
///
/// Tasks of one simulation all run on the same thread, so the lock is never
/// contended; it only makes the object `Send` for the executor.
pub struct TbObj<T>(Arc<Mutex<T>>);

impl<T> TbObj<T> {
    pub fn new(data: T) -> TbObj<T> {
        TbObj(Arc::new(Mutex::new(data)))
    }

    pub fn get(&self) -> MutexGuard<'_, T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.get())
    }
}

impl<T> Clone for TbObj<T> {
    fn clone(&self) -> Self {
        TbObj(self.0.clone())
    }
}

impl<T: Default> Default for TbObj<T> {
    fn default() -> Self {
        TbObj::new(T::default())
    }
}
