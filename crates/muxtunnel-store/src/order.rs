//! User-defined sidebar session ordering.

use std::path::PathBuf;
use std::sync::Mutex;

/// Persisted session order, a JSON array of session names.
pub struct OrderStore {
    path: PathBuf,
    inner: Mutex<Vec<String>>,
}

impl OrderStore {
    /// Open the store and load any saved order. A missing or unreadable
    /// file is an empty order.
    pub fn open(path: PathBuf) -> Self {
        let order = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        Self {
            path,
            inner: Mutex::new(order),
        }
    }

    pub fn get(&self) -> Vec<String> {
        self.inner.lock().unwrap().clone()
    }

    /// Replace the saved order and rewrite the file.
    pub fn save(&self, order: Vec<String>) {
        *self.inner.lock().unwrap() = order.clone();

        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let json = serde_json::to_string_pretty(&order).unwrap_or_default();
        if let Err(e) = std::fs::write(&self.path, json) {
            tracing::error!(path = %self.path.display(), error = %e, "failed to save session order");
        }
    }

    /// Apply the saved order: known items first in saved order, then the
    /// rest in their incoming order. Always a permutation of the input;
    /// saved names with no matching item are ignored.
    pub fn apply<T, F>(&self, items: Vec<T>, name: F) -> Vec<T>
    where
        F: Fn(&T) -> &str,
    {
        let order = self.get();
        if order.is_empty() {
            return items;
        }

        let mut remaining: Vec<Option<T>> = items.into_iter().map(Some).collect();
        let mut result = Vec::with_capacity(remaining.len());

        for wanted in &order {
            if let Some(slot) = remaining
                .iter_mut()
                .find(|s| s.as_ref().map(|item| name(item) == wanted).unwrap_or(false))
            {
                result.push(slot.take().expect("slot checked above"));
            }
        }
        result.extend(remaining.into_iter().flatten());
        result
    }
}
