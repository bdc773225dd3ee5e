pub mod form;

use serde::Serialize;

use crate::entity::{EntitySchema, Page, RecordId};
use crate::events::ClickTarget;
use crate::format::format_record;
use crate::utils::escape_html;

pub const EDIT_LINK_CLASS: &str = "edit-link";

/// Upper bound on numbered page links. Larger page counts show a window of
/// this many links around the current page.
pub const MAX_PAGE_LINKS: u32 = 200;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableRow {
    Empty {
        colspan: usize,
        message: String,
    },
    Record {
        id: RecordId,
        cells: Vec<String>,
        editable: bool,
    },
}

impl TableRow {
    /// The delegated click target of this row's edit element, if it has one.
    pub fn edit_target(&self) -> Option<ClickTarget> {
        match self {
            TableRow::Record {
                id, editable: true, ..
            } => Some(
                ClickTarget::new()
                    .with_class(EDIT_LINK_CLASS)
                    .with_data("id", &id.to_string()),
            ),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TableBody {
    pub rows: Vec<TableRow>,
}

impl TableBody {
    pub fn is_empty_state(&self) -> bool {
        matches!(self.rows.as_slice(), [TableRow::Empty { .. }])
    }

    pub fn record_ids(&self) -> Vec<RecordId> {
        self.rows
            .iter()
            .filter_map(|r| match r {
                TableRow::Record { id, .. } => Some(*id),
                TableRow::Empty { .. } => None,
            })
            .collect()
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            match row {
                TableRow::Empty { colspan, message } => {
                    out.push_str(&format!(
                        "<tr class=\"border-b border-t\">\n  <td colspan=\"{}\" class=\"text-center py-3\">{}</td>\n</tr>\n",
                        colspan,
                        escape_html(message)
                    ));
                }
                TableRow::Record {
                    id,
                    cells,
                    editable,
                } => {
                    out.push_str("<tr class=\"bg-white border-b dark:bg-gray-800 dark:border-gray-700 hover:bg-gray-50 dark:hover:bg-gray-600\">\n");
                    for (i, cell) in cells.iter().enumerate() {
                        if i == 0 {
                            out.push_str(&format!(
                                "  <th scope=\"row\" class=\"px-6 py-4 font-medium text-gray-900 whitespace-nowrap dark:text-white\">{}</th>\n",
                                escape_html(cell)
                            ));
                        } else {
                            out.push_str(&format!(
                                "  <td class=\"px-6 py-4\">{}</td>\n",
                                escape_html(cell)
                            ));
                        }
                    }
                    if *editable {
                        out.push_str(&format!(
                            "  <td class=\"px-6 py-4 text-right\">\n    <p class=\"{} cursor-pointer font-medium text-blue_main dark:text-blue_main hover:underline\" data-id=\"{}\">Edit</p>\n  </td>\n",
                            EDIT_LINK_CLASS, id
                        ));
                    }
                    out.push_str("</tr>\n");
                }
            }
        }
        out
    }
}

/// Builds the table body for `page`. Rows come out in reverse API order so the
/// most recently added record is on top.
pub fn render_table(schema: &EntitySchema, page: &Page) -> TableBody {
    if page.results.is_empty() {
        return TableBody {
            rows: vec![TableRow::Empty {
                colspan: schema.column_count(),
                message: schema.empty_message.to_string(),
            }],
        };
    }

    let rows = page
        .results
        .iter()
        .rev()
        .map(|record| {
            let formatted = format_record(schema, record);
            TableRow::Record {
                id: record.id,
                cells: schema
                    .columns
                    .iter()
                    .map(|c| formatted.display_value(c.field))
                    .collect(),
                editable: schema.editable(),
            }
        })
        .collect();
    TableBody { rows }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Previous,
    Number,
    Next,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PageLink {
    pub kind: LinkKind,
    pub target: u32,
    pub current: bool,
}

impl PageLink {
    pub fn click_target(&self, link_class: &str) -> ClickTarget {
        ClickTarget::new()
            .with_class(link_class)
            .with_data("page", &self.target.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub links: Vec<PageLink>,
}

impl Pagination {
    pub fn previous(&self) -> Option<&PageLink> {
        self.links.iter().find(|l| l.kind == LinkKind::Previous)
    }

    pub fn next(&self) -> Option<&PageLink> {
        self.links.iter().find(|l| l.kind == LinkKind::Next)
    }

    pub fn current(&self) -> Option<u32> {
        self.links
            .iter()
            .find(|l| l.kind == LinkKind::Number && l.current)
            .map(|l| l.target)
    }

    pub fn to_html(&self, link_class: &str) -> String {
        let mut out = String::new();
        for link in &self.links {
            let (style, label) = match link.kind {
                LinkKind::Previous => (
                    "color: gray; background: white; border: 1px solid #D1D5DB; border-top-left-radius: 0.375rem; border-bottom-left-radius: 0.375rem;",
                    "<span style=\"display: none;\">Previous</span>\n    <svg style=\"width: 0.625rem; height: 0.625rem;\" xmlns=\"http://www.w3.org/2000/svg\" fill=\"none\" viewBox=\"0 0 6 10\"><path stroke=\"currentColor\" stroke-linecap=\"round\" stroke-linejoin=\"round\" stroke-width=\"2\" d=\"M5 1 1 5l4 4\"/></svg>".to_string(),
                ),
                LinkKind::Next => (
                    "color: gray; background: white; border: 1px solid #D1D5DB; border-top-right-radius: 0.375rem; border-bottom-right-radius: 0.375rem;",
                    "<span style=\"display: none;\">Next</span>\n    <svg style=\"width: 0.625rem; height: 0.625rem;\" xmlns=\"http://www.w3.org/2000/svg\" fill=\"none\" viewBox=\"0 0 6 10\"><path stroke=\"currentColor\" stroke-linecap=\"round\" stroke-linejoin=\"round\" stroke-width=\"2\" d=\"m1 9 4-4-4-4\"/></svg>".to_string(),
                ),
                LinkKind::Number if link.current => (
                    "color: #2563EB; background: #DBEAFE; border: 1px solid #D1D5DB;",
                    link.target.to_string(),
                ),
                LinkKind::Number => (
                    "color: gray; background: white; border: 1px solid #D1D5DB;",
                    link.target.to_string(),
                ),
            };
            let aria = if link.current {
                " aria-current=\"page\""
            } else {
                ""
            };
            out.push_str(&format!(
                "<li style=\"display: inline;\">\n  <a href=\"#\" class=\"{}\" data-page=\"{}\"{} style=\"display: flex; align-items: center; justify-content: center; padding: 0.5rem 0.75rem; height: 32px; text-decoration: none; {}\">\n    {}\n  </a>\n</li>\n",
                escape_html(link_class),
                link.target,
                aria,
                style,
                label
            ));
        }
        out
    }
}

/// Previous link, one link per page, next link. Previous and next are
/// clamped to `1..=total_pages`.
pub fn render_pagination(total_pages: u32, current_page: u32) -> Pagination {
    let last = total_pages.max(1);
    let (first_link, last_link) = numbered_window(total_pages, current_page);
    let mut links = Vec::with_capacity((last_link - first_link) as usize + 3);
    links.push(PageLink {
        kind: LinkKind::Previous,
        target: if current_page > 1 { current_page - 1 } else { 1 },
        current: false,
    });
    for page in (first_link..=last_link).filter(|_| total_pages > 0) {
        links.push(PageLink {
            kind: LinkKind::Number,
            target: page,
            current: page == current_page,
        });
    }
    links.push(PageLink {
        kind: LinkKind::Next,
        target: if current_page < last {
            current_page + 1
        } else {
            last
        },
        current: false,
    });
    Pagination { links }
}

/// First and last numbered link, at most `MAX_PAGE_LINKS` wide.
fn numbered_window(total_pages: u32, current_page: u32) -> (u32, u32) {
    if total_pages <= MAX_PAGE_LINKS {
        return (1, total_pages.max(1));
    }
    let current = current_page.clamp(1, total_pages);
    let start = current.saturating_sub(MAX_PAGE_LINKS / 2).max(1);
    let end = start.saturating_add(MAX_PAGE_LINKS - 1).min(total_pages);
    (end - (MAX_PAGE_LINKS - 1), end)
}
