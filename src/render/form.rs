use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::entity::{EntitySchema, Record, RecordId};
use crate::events::UiEvent;
use crate::utils::escape_html;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormMode {
    Add,
    Edit,
}

/// State of an entity's add/edit form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EditForm {
    pub visible: bool,
    pub mode: FormMode,
    pub header: String,
    pub button: String,
    pub delete_visible: bool,
    /// The record loaded into the form in edit mode.
    pub record_id: Option<RecordId>,
    values: BTreeMap<String, String>,
}

impl EditForm {
    pub fn new(schema: &EntitySchema) -> Self {
        Self {
            visible: false,
            mode: FormMode::Add,
            header: format!("Add {} Record", schema.title),
            button: "Add Record".to_string(),
            delete_visible: false,
            record_id: None,
            values: schema
                .editable_fields
                .iter()
                .map(|f| (f.to_string(), String::new()))
                .collect(),
        }
    }

    pub fn reset(&mut self, schema: &EntitySchema) {
        *self = Self::new(schema);
    }

    /// Unhides the form, relabels it for editing and fills the inputs with
    /// the raw (unformatted) record values.
    pub fn open_for_edit(&mut self, schema: &EntitySchema, record: &Record) {
        self.visible = true;
        self.mode = FormMode::Edit;
        self.header = format!("Edit {} Record", schema.title);
        self.button = "Edit Record".to_string();
        self.delete_visible = true;
        self.record_id = Some(record.id);
        for field in schema.editable_fields {
            self.values
                .insert(field.to_string(), record.display_value(field));
        }
    }

    /// What pressing the form's submit button means in the current mode.
    pub fn submit_event(&self) -> UiEvent {
        match self.mode {
            FormMode::Add => UiEvent::Create,
            FormMode::Edit => UiEvent::Submit,
        }
    }

    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(|s| s.as_str())
    }

    /// Sets an input value. Returns `false` for fields the form does not have.
    pub fn set_value(&mut self, field: &str, value: &str) -> bool {
        match self.values.get_mut(field) {
            Some(slot) => {
                *slot = value.to_string();
                true
            }
            None => false,
        }
    }

    /// The current input values as the JSON body of an update request.
    pub fn request_body(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }

    pub fn to_html(&self, schema: &EntitySchema) -> String {
        if !schema.editable() {
            return String::new();
        }
        let visibility = if self.visible {
            "visible opacity-100"
        } else {
            "invisible opacity-0"
        };
        let mut out = String::new();
        out.push_str(&format!(
            "<div id=\"add-form-{}\" class=\"{}\">\n<h3 id=\"{}-header\">{}</h3>\n<form id=\"{}\">\n",
            schema.dom_prefix,
            visibility,
            schema.dom_prefix,
            escape_html(&self.header),
            schema.form_id()
        ));
        for field in schema.editable_fields {
            let label = schema
                .columns
                .iter()
                .find(|c| c.field == *field)
                .map(|c| c.label)
                .unwrap_or(*field);
            let input_id = schema.input_id(field);
            out.push_str(&format!(
                "  <label for=\"{}\">{}</label>\n  <input id=\"{}\" name=\"{}\" value=\"{}\"/>\n",
                input_id,
                escape_html(label),
                input_id,
                field,
                escape_html(self.value(field).unwrap_or_default())
            ));
        }
        out.push_str(&format!(
            "  <button type=\"submit\" id=\"{}-button\">{}</button>\n",
            schema.dom_prefix,
            escape_html(&self.button)
        ));
        // the backend exposes no delete route, so the button is shown but inert
        let delete_class = if self.delete_visible { "" } else { " class=\"hidden\"" };
        out.push_str(&format!(
            "  <button type=\"button\" id=\"delete-{}-record\"{} disabled>Delete Record</button>\n</form>\n</div>\n",
            schema.dom_prefix, delete_class
        ));
        out
    }
}
