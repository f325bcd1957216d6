use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Bounded answer cache. Entries are evicted oldest-inserted first;
/// overwriting a key keeps its original position.
#[derive(Clone)]
pub struct AnswerCache {
    state: Arc<Mutex<CacheState>>,
    capacity: usize,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

impl AnswerCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            capacity,
        }
    }

    pub fn key(username: &str, question: &str) -> String {
        format!("{username}::{question}")
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.get(key).cloned()
    }

    pub fn put(&self, key: String, answer: String) {
        if self.capacity == 0 {
            return;
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.entries.insert(key.clone(), answer).is_none() {
            state.order.push_back(key);
        }

        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
