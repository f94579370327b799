//! Deterministic command interpretation: calendar lookups, task-list
//! mutation, and reminder scheduling that bypass the companion entirely.

pub mod calendar_tasks;
mod grammar;

pub use calendar_tasks::{CalendarEvent, CalendarTasks, InMemoryCalendarTasks};
pub use grammar::{Interpreted, apply_inline_list_mutation, interpret, normalize_smart_quotes};
