use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(RecordId)
            .map_err(|_| format!("invalid record id '{s}'"))
    }
}

/// A single history record as served by the backend.
///
/// Apart from `id` the shape depends on the entity, so the remaining fields
/// are kept as an opaque JSON map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Builds a record from a raw JSON object. The single-record endpoint is
    /// not guaranteed to echo the id back, so `fallback_id` fills the gap.
    pub fn from_object(mut object: Map<String, Value>, fallback_id: RecordId) -> Self {
        let id = object
            .remove("id")
            .and_then(|v| match v {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .map(RecordId)
            .unwrap_or(fallback_id);
        Self { id, fields: object }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Text shown for a field in a table cell or form input.
    pub fn display_value(&self, field: &str) -> String {
        match self.fields.get(field) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// One page of a paginated list endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub results: Vec<Record>,
    pub total_pages: u32,
    pub current_page: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    MedicationHistory,
    SurgicalHistory,
    SocialHistory,
    VaccinationHistory,
}

impl Entity {
    pub const ALL: [Entity; 4] = [
        Entity::MedicationHistory,
        Entity::SurgicalHistory,
        Entity::SocialHistory,
        Entity::VaccinationHistory,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "medication" | "medication_history" | "med" => Some(Self::MedicationHistory),
            "surgical" | "surgical_history" | "surgery" => Some(Self::SurgicalHistory),
            "social" | "social_history" => Some(Self::SocialHistory),
            "vaccination" | "vaccination_history" | "vaccine" => Some(Self::VaccinationHistory),
            _ => None,
        }
    }

    /// Path segment used by the REST API.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::MedicationHistory => "medication_history",
            Self::SurgicalHistory => "surgical_history",
            Self::SocialHistory => "social_history",
            Self::VaccinationHistory => "vaccination_history",
        }
    }

    pub fn schema(&self) -> &'static EntitySchema {
        match self {
            Self::MedicationHistory => &MEDICATION_HISTORY,
            Self::SurgicalHistory => &SURGICAL_HISTORY,
            Self::SocialHistory => &SOCIAL_HISTORY,
            Self::VaccinationHistory => &VACCINATION_HISTORY,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub field: &'static str,
    pub label: &'static str,
}

/// Everything the generic list component needs to know about one entity:
/// table layout, which fields get formatted, which fields are editable and
/// the element ids of the page fragments it owns.
#[derive(Debug, PartialEq, Eq)]
pub struct EntitySchema {
    pub entity: Entity,
    pub title: &'static str,
    pub columns: &'static [Column],
    pub date_fields: &'static [&'static str],
    pub capitalized_fields: &'static [&'static str],
    pub editable_fields: &'static [&'static str],
    pub empty_message: &'static str,
    pub dom_prefix: &'static str,
    pub link_class: &'static str,
}

impl EntitySchema {
    pub fn editable(&self) -> bool {
        !self.editable_fields.is_empty()
    }

    /// Number of table columns including the trailing action column.
    pub fn column_count(&self) -> usize {
        if self.editable() {
            self.columns.len() + 1
        } else {
            self.columns.len()
        }
    }

    pub fn body_id(&self) -> String {
        format!("{}-body", self.dom_prefix)
    }

    pub fn navigation_id(&self) -> String {
        format!("{}-navigation", self.dom_prefix)
    }

    pub fn form_id(&self) -> String {
        format!("{}-form", self.dom_prefix)
    }

    pub fn input_id(&self, field: &str) -> String {
        format!("{}-{}", self.dom_prefix, field.replace('_', "-"))
    }

    pub fn is_editable_field(&self, field: &str) -> bool {
        self.editable_fields.contains(&field)
    }
}

pub static MEDICATION_HISTORY: EntitySchema = EntitySchema {
    entity: Entity::MedicationHistory,
    title: "Medication History",
    columns: &[
        Column {
            field: "date_added",
            label: "Date Added",
        },
        Column {
            field: "date_prescribed",
            label: "Date Prescribed",
        },
        Column {
            field: "generic_name",
            label: "Generic Name",
        },
        Column {
            field: "dosage",
            label: "Dosage",
        },
        Column {
            field: "quantity",
            label: "Quantity",
        },
        Column {
            field: "instructions",
            label: "Instructions",
        },
    ],
    date_fields: &["date_added", "date_prescribed"],
    capitalized_fields: &["generic_name"],
    editable_fields: &[
        "date_prescribed",
        "generic_name",
        "dosage",
        "quantity",
        "instructions",
    ],
    empty_message: "No Medication Records Found",
    dom_prefix: "medication-history",
    link_class: "pagination-link",
};

pub static SURGICAL_HISTORY: EntitySchema = EntitySchema {
    entity: Entity::SurgicalHistory,
    title: "Surgical History",
    columns: &[
        Column {
            field: "date_added",
            label: "Date Added",
        },
        Column {
            field: "operation_procedure",
            label: "Operation / Procedure",
        },
        Column {
            field: "indication",
            label: "Indication",
        },
        Column {
            field: "hospital",
            label: "Hospital",
        },
        Column {
            field: "operation_date",
            label: "Operation Date",
        },
    ],
    date_fields: &["date_added", "operation_date"],
    capitalized_fields: &[],
    editable_fields: &[
        "operation_procedure",
        "indication",
        "hospital",
        "operation_date",
    ],
    empty_message: "No Surgical Records Found",
    dom_prefix: "surgical-history",
    link_class: "surgical-pagination-link",
};

pub static SOCIAL_HISTORY: EntitySchema = EntitySchema {
    entity: Entity::SocialHistory,
    title: "Social History",
    columns: &[
        Column {
            field: "nicotine_consumption",
            label: "Nicotine Consumption",
        },
        Column {
            field: "alcohol_consumption",
            label: "Alcohol Consumption",
        },
        Column {
            field: "drugs_taken",
            label: "Drugs Taken",
        },
        Column {
            field: "diet",
            label: "Diet",
        },
        Column {
            field: "physical_activity",
            label: "Physical Activity",
        },
    ],
    date_fields: &[],
    capitalized_fields: &[],
    editable_fields: &[
        "nicotine_consumption",
        "alcohol_consumption",
        "drugs_taken",
        "diet",
        "physical_activity",
    ],
    empty_message: "No Social Records Found",
    dom_prefix: "social-history",
    link_class: "social-pagination-link",
};

// Read-only: the list is rendered without an edit column.
pub static VACCINATION_HISTORY: EntitySchema = EntitySchema {
    entity: Entity::VaccinationHistory,
    title: "Vaccination History",
    columns: &[
        Column {
            field: "date_added",
            label: "Date Added",
        },
        Column {
            field: "vaccine_name",
            label: "Vaccine",
        },
        Column {
            field: "date_administered",
            label: "Date Administered",
        },
        Column {
            field: "provider",
            label: "Provider",
        },
        Column {
            field: "site_given",
            label: "Site Given",
        },
        Column {
            field: "dose_ml",
            label: "Dose (ml)",
        },
        Column {
            field: "next_dose_date",
            label: "Next Dose",
        },
    ],
    date_fields: &["date_added", "date_administered", "next_dose_date"],
    capitalized_fields: &["vaccine_name"],
    editable_fields: &[],
    empty_message: "No Vaccination Records Found",
    dom_prefix: "vaccination-history",
    link_class: "vaccination-pagination-link",
};
