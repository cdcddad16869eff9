//! Single-writer shared cells
//!
//! The writer swaps in a whole `Arc` snapshot; readers clone the `Arc` under a
//! lock held only for the pointer copy, so a reader never sees a partial write.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};

/// Latest published value
pub struct Latest<T> {
    slot: RwLock<Option<Arc<T>>>,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }
}

impl<T> Latest<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(value.clone());
        value
    }

    pub fn load(&self) -> Option<Arc<T>> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Bounded in-memory ring of recent values, newest last
pub struct History<T> {
    capacity: usize,
    items: Mutex<VecDeque<Arc<T>>>,
}

impl<T> History<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, value: Arc<T>) {
        if self.capacity == 0 {
            return;
        }
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        if items.len() == self.capacity {
            items.pop_front();
        }
        items.push_back(value);
    }

    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_latest_starts_empty_and_replaces() {
        let cell = Latest::new();
        assert!(cell.load().is_none());
        cell.publish(1u32);
        let first = cell.load().unwrap();
        cell.publish(2u32);
        // old readers keep their snapshot
        assert_eq!(*first, 1);
        assert_eq!(*cell.load().unwrap(), 2);
    }

    #[test]
    fn test_readers_see_whole_snapshots() {
        let cell = Arc::new(Latest::new());
        let writer = {
            let cell = cell.clone();
            thread::spawn(move || {
                for i in 0..1000u32 {
                    cell.publish(vec![i; 64]);
                }
            })
        };
        for _ in 0..1000 {
            if let Some(v) = cell.load() {
                assert!(v.iter().all(|x| *x == v[0]));
            }
        }
        writer.join().unwrap();
        assert_eq!(cell.load().unwrap()[0], 999);
    }

    #[test]
    fn test_history_keeps_newest() {
        let history = History::new(3);
        for i in 0..5 {
            history.push(Arc::new(i));
        }
        let items: Vec<i32> = history.snapshot().iter().map(|v| **v).collect();
        assert_eq!(items, vec![2, 3, 4]);
    }
}
