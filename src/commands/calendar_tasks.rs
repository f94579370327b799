//! The narrow calendar/task-list collaborator the command interpreter and
//! the automation condition evaluator depend on. No concrete authenticated
//! client ships with the bridge; [`InMemoryCalendarTasks`] is a local stub
//! useful for manual testing and for exercising the grammar in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub start: DateTime<Utc>,
}

#[async_trait]
pub trait CalendarTasks: Send + Sync {
    async fn list_task_lists(&self) -> Vec<String>;
    /// `None` when the named list does not exist.
    async fn list_items(&self, list: &str) -> Option<Vec<String>>;
    async fn add_item(&self, list: &str, item: &str);
    /// Returns `true` if the item was found (case-insensitive exact match) and removed.
    async fn remove_item(&self, list: &str, item: &str) -> bool;
    async fn events_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<CalendarEvent>;
    async fn search_events(&self, keyword: &str) -> Vec<CalendarEvent>;
}

/// Local in-memory stub. Lists are created lazily on first `add_item`; no
/// calendar events are ever produced (an authenticated client would back
/// `events_between`/`search_events` with a real calendar in production).
#[derive(Default)]
pub struct InMemoryCalendarTasks {
    lists: Mutex<HashMap<String, Vec<String>>>,
}

impl InMemoryCalendarTasks {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CalendarTasks for InMemoryCalendarTasks {
    async fn list_task_lists(&self) -> Vec<String> {
        let lists = self.lists.lock().await;
        let mut names: Vec<String> = lists.keys().cloned().collect();
        names.sort();
        names
    }

    async fn list_items(&self, list: &str) -> Option<Vec<String>> {
        let lists = self.lists.lock().await;
        lists
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(list))
            .map(|(_, v)| v.clone())
    }

    async fn add_item(&self, list: &str, item: &str) {
        let mut lists = self.lists.lock().await;
        let key = lists
            .keys()
            .find(|k| k.eq_ignore_ascii_case(list))
            .cloned()
            .unwrap_or_else(|| list.to_string());
        lists.entry(key).or_default().push(item.to_string());
    }

    async fn remove_item(&self, list: &str, item: &str) -> bool {
        let mut lists = self.lists.lock().await;
        let Some((_, items)) = lists.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(list)) else {
            return false;
        };
        let before = items.len();
        items.retain(|i| !i.eq_ignore_ascii_case(item));
        items.len() != before
    }

    async fn events_between(&self, _start: DateTime<Utc>, _end: DateTime<Utc>) -> Vec<CalendarEvent> {
        Vec::new()
    }

    async fn search_events(&self, _keyword: &str) -> Vec<CalendarEvent> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_and_list_items_round_trips() {
        let store = InMemoryCalendarTasks::new();
        store.add_item("groceries", "milk").await;
        store.add_item("Groceries", "eggs").await;
        let items = store.list_items("GROCERIES").await.unwrap();
        assert_eq!(items, vec!["milk", "eggs"]);
    }

    #[tokio::test]
    async fn remove_item_is_case_insensitive() {
        let store = InMemoryCalendarTasks::new();
        store.add_item("groceries", "Milk").await;
        assert!(store.remove_item("groceries", "milk").await);
        assert_eq!(store.list_items("groceries").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn remove_item_reports_not_found() {
        let store = InMemoryCalendarTasks::new();
        store.add_item("groceries", "milk").await;
        assert!(!store.remove_item("groceries", "bread").await);
    }

    #[tokio::test]
    async fn list_items_on_unknown_list_is_none() {
        let store = InMemoryCalendarTasks::new();
        assert!(store.list_items("groceries").await.is_none());
    }
}
