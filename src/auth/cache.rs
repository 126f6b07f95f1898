use std::sync::Mutex;

/// In-memory holder for the last access token handed out.
///
/// Only the token value lives here. Whether it is still usable is decided by
/// [`TokenManager`](super::TokenManager) against the stored record.
#[derive(Debug, Default)]
pub struct TokenCache {
    token: Mutex<Option<String>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.token.lock().ok()?.clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(token.into());
        }
    }

    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = None;
        }
    }
}
