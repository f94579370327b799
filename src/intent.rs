//! Resolves which companion an inbound message addresses, and tracks the
//! sticky "active companion" used when a message names none.

use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

fn strip_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Maps speech-recognition variants (lowercase) to a canonical companion name.
pub struct IntentResolver {
    variants: HashMap<String, String>,
    filler_words: HashSet<String>,
    active: Mutex<String>,
}

impl IntentResolver {
    pub fn new(variants: HashMap<String, String>, filler_words: Vec<String>, default_companion: String) -> Self {
        Self {
            variants,
            filler_words: filler_words.into_iter().map(|w| w.to_lowercase()).collect(),
            active: Mutex::new(default_companion),
        }
    }

    fn lookup_variant(&self, token: &str) -> Option<String> {
        let key = strip_punctuation(token).to_lowercase();
        if key.is_empty() {
            return None;
        }
        self.variants.get(&key).cloned()
    }

    /// Extract an explicitly-addressed companion name and the remaining text,
    /// following the spec's ordered extraction rules. Returns `None` when no
    /// addressing is detected.
    fn extract(&self, text: &str) -> Option<(String, String)> {
        let trimmed = text.trim_start();

        // Rule 1: separator (':' or ',') before the first word break.
        let first_break = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let head = &trimmed[..first_break];
        if let Some(sep_idx) = head.find([':', ',']) {
            let prefix = &head[..sep_idx];
            if let Some(canonical) = self.lookup_variant(prefix) {
                let remainder = trimmed[sep_idx + 1..].trim_start().to_string();
                return Some((canonical, remainder));
            }
        }

        // Rule 2: '@'-prefixed token.
        if let Some(rest) = trimmed.strip_prefix('@') {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let token = parts.next().unwrap_or("");
            if let Some(canonical) = self.lookup_variant(token) {
                let remainder = parts.next().unwrap_or("").trim_start().to_string();
                return Some((canonical, remainder));
            }
        }

        // Rule 3: scan up to the first five tokens, skipping filler words.
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        for (idx, token) in tokens.iter().take(5).enumerate() {
            let normalized = strip_punctuation(token).to_lowercase();
            if self.filler_words.contains(&normalized) {
                continue;
            }
            return self.lookup_variant(token).map(|canonical| {
                let remainder = tokens[idx + 1..].join(" ");
                (canonical, remainder)
            });
        }

        None
    }

    /// Resolve the addressed companion (if any) and return the cleaned text
    /// with the addressing prefix removed. Updates the sticky active
    /// companion when an explicit address is found.
    pub async fn resolve(&self, text: &str) -> (String, String) {
        match self.extract(text) {
            Some((canonical, remainder)) => {
                *self.active.lock().await = canonical.clone();
                (canonical, remainder)
            }
            None => (self.active().await, text.to_string()),
        }
    }

    pub async fn active(&self) -> String {
        self.active.lock().await.clone()
    }

    pub async fn set_active(&self, name: String) {
        *self.active.lock().await = name;
    }
}

#[cfg(test)]
mod tests;
