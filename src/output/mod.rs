pub mod report;

use serde::Serialize;

use crate::component::ListView;
use crate::entity::{Entity, EntitySchema, RecordId};
use crate::render::form::EditForm;
use crate::render::TableRow;
use crate::storage::Toast;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

#[derive(Clone, Debug, Serialize)]
pub struct RowView {
    pub id: RecordId,
    pub cells: Vec<String>,
}

/// One rendered list, flattened for the output writers.
#[derive(Clone, Debug, Serialize)]
pub struct SectionView {
    pub entity: Entity,
    pub title: String,
    pub columns: Vec<String>,
    pub current_page: Option<u32>,
    pub total_pages: Option<u32>,
    pub rows: Vec<RowView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<EditForm>,
    #[serde(skip)]
    pub html: String,
}

pub fn build_section(schema: &EntitySchema, view: &ListView) -> SectionView {
    let mut rows = Vec::new();
    let mut message = None;
    for row in &view.table.rows {
        match row {
            TableRow::Record { id, cells, .. } => rows.push(RowView {
                id: *id,
                cells: cells.clone(),
            }),
            TableRow::Empty { message: m, .. } => message = Some(m.clone()),
        }
    }
    if !view.is_loaded() {
        message = Some(format!("{} could not be loaded", schema.title));
    }
    SectionView {
        entity: schema.entity,
        title: schema.title.to_string(),
        columns: schema.columns.iter().map(|c| c.label.to_string()).collect(),
        current_page: view.current_page,
        total_pages: view.total_pages,
        rows,
        message,
        form: view.form.visible.then(|| view.form.clone()),
        html: view.to_html(schema),
    }
}

fn pad(value: &str, width: usize) -> String {
    let len = value.chars().count();
    if len >= width {
        value.to_string()
    } else {
        format!("{value}{}", " ".repeat(width - len))
    }
}

pub fn render_text(sections: &[SectionView]) -> Vec<u8> {
    let mut out = String::new();
    for section in sections {
        match (section.current_page, section.total_pages) {
            (Some(current), Some(total)) => {
                out.push_str(&format!("== {} (page {current}/{total}) ==\n", section.title))
            }
            _ => out.push_str(&format!("== {} ==\n", section.title)),
        }

        if !section.rows.is_empty() {
            let mut widths: Vec<usize> = section.columns.iter().map(|c| c.chars().count()).collect();
            widths.insert(0, "ID".len());
            for row in &section.rows {
                widths[0] = widths[0].max(row.id.to_string().len());
                for (i, cell) in row.cells.iter().enumerate() {
                    if let Some(w) = widths.get_mut(i + 1) {
                        *w = (*w).max(cell.chars().count());
                    }
                }
            }

            let mut header = vec![pad("ID", widths[0])];
            header.extend(
                section
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| pad(c, widths[i + 1])),
            );
            out.push_str(header.join("  ").trim_end());
            out.push('\n');

            for row in &section.rows {
                let mut line = vec![pad(&row.id.to_string(), widths[0])];
                line.extend(
                    row.cells
                        .iter()
                        .enumerate()
                        .map(|(i, c)| pad(c, widths.get(i + 1).copied().unwrap_or(0))),
                );
                out.push_str(line.join("  ").trim_end());
                out.push('\n');
            }
        }
        if let Some(message) = section.message.as_deref() {
            out.push_str(message);
            out.push('\n');
        }
        if let Some(form) = section.form.as_ref() {
            out.push_str(&format!("-- {} --\n", form.header));
            for (field, value) in form.request_body() {
                let value = value.as_str().unwrap_or_default().to_string();
                out.push_str(&format!("{field}: {value}\n"));
            }
        }
        out.push('\n');
    }
    out.into_bytes()
}

pub fn render_json(sections: &[SectionView]) -> Vec<u8> {
    serde_json::to_vec_pretty(sections).unwrap_or_else(|_| b"[]\n".to_vec())
}

pub fn render_html(sections: &[SectionView], patient_id: &str, toast: Option<&Toast>) -> Vec<u8> {
    report::render_html(sections, patient_id, toast)
}
