use reqwest::Url;
use thiserror::Error;

use crate::entity::{Entity, RecordId};

pub const PATIENT_PARAM: &str = "id";
pub const EDIT_PARAM: &str = "edit_id";
pub const EDIT_ENTITY_PARAM: &str = "edit_entity";

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("invalid page URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

/// The page URL. Its query string carries the patient (`id`) and the record
/// currently open for editing (`edit_id`, scoped to one list by
/// `edit_entity`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLocation {
    url: Url,
}

impl PageLocation {
    pub fn parse(raw: &str) -> Result<Self, LocationError> {
        let url = Url::parse(raw.trim()).map_err(|e| LocationError::InvalidUrl {
            url: raw.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { url })
    }

    pub fn for_patient(base: &str, patient_id: &str) -> Result<Self, LocationError> {
        let mut location = Self::parse(base)?;
        location.set_query_param(PATIENT_PARAM, patient_id);
        Ok(location)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    pub fn patient_id(&self) -> Option<String> {
        self.query_param(PATIENT_PARAM)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn edit_id(&self) -> Option<RecordId> {
        self.query_param(EDIT_PARAM)?.parse().ok()
    }

    pub fn edit_entity(&self) -> Option<Entity> {
        Entity::parse(&self.query_param(EDIT_ENTITY_PARAM)?)
    }

    /// The record open for editing and the list it belongs to. An `edit_id`
    /// without `edit_entity` names no list.
    pub fn edit_target(&self) -> Option<(Entity, RecordId)> {
        Some((self.edit_entity()?, self.edit_id()?))
    }

    /// Sets `name` in place, keeping every other parameter. Like
    /// `history.replaceState`, nothing is fetched.
    pub fn set_query_param(&mut self, name: &str, value: &str) {
        let mut pairs = self.other_pairs(name);
        pairs.push((name.to_string(), value.to_string()));
        self.write_pairs(pairs);
    }

    pub fn remove_query_param(&mut self, name: &str) {
        let pairs = self.other_pairs(name);
        self.write_pairs(pairs);
    }

    pub fn set_edit_target(&mut self, entity: Entity, id: RecordId) {
        self.set_query_param(EDIT_ENTITY_PARAM, entity.path_segment());
        self.set_query_param(EDIT_PARAM, &id.to_string());
    }

    /// Removes `edit_id` together with its `edit_entity`.
    pub fn remove_edit_id(&mut self) {
        self.remove_query_param(EDIT_PARAM);
        self.remove_query_param(EDIT_ENTITY_PARAM);
    }

    fn other_pairs(&self, name: &str) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .filter(|(k, _)| k != name)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn write_pairs(&mut self, pairs: Vec<(String, String)>) {
        if pairs.is_empty() {
            self.url.set_query(None);
            return;
        }
        self.url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}

/// Which record of one list, if any, is open in the edit form. Mirrored into
/// the URL's `edit_id` / `edit_entity` so reloads and deep links see the same
/// state. Several lists share one URL, so a session only ever clears the URL
/// when the URL still names it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditSession {
    pub entity: Entity,
    pub record_id: Option<RecordId>,
}

impl EditSession {
    pub fn idle(entity: Entity) -> Self {
        Self {
            entity,
            record_id: None,
        }
    }

    pub fn editing(entity: Entity, record_id: RecordId) -> Self {
        Self {
            entity,
            record_id: Some(record_id),
        }
    }

    pub fn from_location(entity: Entity, location: &PageLocation) -> Self {
        match location.edit_target() {
            Some((owner, id)) if owner == entity => Self::editing(entity, id),
            _ => Self::idle(entity),
        }
    }

    pub fn is_editing(&self) -> bool {
        self.record_id.is_some()
    }

    /// Whether the URL currently points at this session's record.
    pub fn named_by(&self, location: &PageLocation) -> bool {
        match self.record_id {
            Some(id) => location.edit_target() == Some((self.entity, id)),
            None => false,
        }
    }

    /// Opens `record_id` and writes it to the URL, taking the URL over from
    /// whichever list held it before.
    pub fn claim(&mut self, record_id: RecordId, location: &mut PageLocation) {
        self.record_id = Some(record_id);
        location.set_edit_target(self.entity, record_id);
    }

    /// Ends the session. The URL is only cleared if it still names it.
    pub fn release(&mut self, location: &mut PageLocation) -> Option<RecordId> {
        if self.named_by(location) {
            location.remove_edit_id();
        }
        self.record_id.take()
    }

    /// Drops the session when the URL no longer agrees with it, e.g. after
    /// something else removed `edit_id` or another list claimed it.
    pub fn reconcile(&mut self, location: &PageLocation) {
        if self.record_id.is_some() && !self.named_by(location) {
            self.record_id = None;
        }
    }
}
