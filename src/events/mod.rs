use std::collections::HashMap;

use crate::entity::{EntitySchema, RecordId};
use crate::render::EDIT_LINK_CLASS;

/// The page fragments a list component listens on. Each container has one
/// delegated handler; individual rows and links never get their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    TableBody,
    Pagination,
}

/// The element a click landed on: its classes and `data-*` attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClickTarget {
    pub classes: Vec<String>,
    pub data: HashMap<String, String>,
}

impl ClickTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_data(mut self, key: &str, value: &str) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn data(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(|s| s.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiEvent {
    ChangePage(u32),
    Edit(RecordId),
    /// Form submit in edit mode.
    Submit,
    CancelEdit,
    OpenAdd,
    /// Form submit in add mode.
    Create,
}

/// Resolves a click inside `container` to the event it stands for. Clicks on
/// anything that is not a page link or edit element resolve to `None`.
pub fn delegate(schema: &EntitySchema, container: Container, target: &ClickTarget) -> Option<UiEvent> {
    match container {
        Container::TableBody => {
            if !schema.editable() || !target.has_class(EDIT_LINK_CLASS) {
                return None;
            }
            let id = target.data("id")?.parse::<RecordId>().ok()?;
            Some(UiEvent::Edit(id))
        }
        Container::Pagination => {
            if !target.has_class(schema.link_class) {
                return None;
            }
            let page = target.data("page")?.trim().parse::<u32>().ok()?;
            if page == 0 {
                return None;
            }
            Some(UiEvent::ChangePage(page))
        }
    }
}
