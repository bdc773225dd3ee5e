use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::entity::{Entity, EntitySchema, RecordId};
use crate::events::{delegate, ClickTarget, Container, UiEvent};
use crate::location::{EditSession, PageLocation};
use crate::render::form::{EditForm, FormMode};
use crate::render::{render_pagination, render_table, Pagination, TableBody};
use crate::storage::{KeyValueStore, StorageError, Toast};
use crate::utils::escape_html;

pub const UPDATE_SUCCESS_MESSAGE: &str = "Record Successfully Updated";
pub const UPDATE_REJECTED_MESSAGE: &str = "Failed to Update Record";
pub const UPDATE_FAILED_MESSAGE: &str = "Error occurred while processing the request";
pub const CREATE_SUCCESS_MESSAGE: &str = "Record Successfully Added";
pub const CREATE_REJECTED_MESSAGE: &str = "Failed to Add Record";

/// What one list component currently shows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListView {
    pub entity: Entity,
    pub table: TableBody,
    pub pagination: Pagination,
    pub form: EditForm,
    pub current_page: Option<u32>,
    pub total_pages: Option<u32>,
}

impl ListView {
    fn new(schema: &EntitySchema) -> Self {
        Self {
            entity: schema.entity,
            table: TableBody::default(),
            pagination: Pagination::default(),
            form: EditForm::new(schema),
            current_page: None,
            total_pages: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.current_page.is_some()
    }

    pub fn to_html(&self, schema: &EntitySchema) -> String {
        let mut out = String::new();
        out.push_str("<table>\n<thead>\n<tr>\n");
        for column in schema.columns {
            out.push_str(&format!("  <th scope=\"col\">{}</th>\n", escape_html(column.label)));
        }
        if schema.editable() {
            out.push_str("  <th scope=\"col\"><span class=\"sr-only\">Edit</span></th>\n");
        }
        out.push_str("</tr>\n</thead>\n");
        out.push_str(&format!("<tbody id=\"{}\">\n", schema.body_id()));
        out.push_str(&self.table.to_html());
        out.push_str("</tbody>\n</table>\n");
        out.push_str(&format!("<ul id=\"{}\">\n", schema.navigation_id()));
        out.push_str(&self.pagination.to_html(schema.link_class));
        out.push_str("</ul>\n");
        out.push_str(&self.form.to_html(schema));
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Rendered,
    /// A newer load started while this one was in flight; its result was dropped.
    Stale,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Opened(RecordId),
    Unavailable(RecordId),
    /// A later edit click took over while this record was being fetched.
    Superseded(RecordId),
    NotEditable,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    NoActiveEdit,
    Saved {
        record_id: RecordId,
        response: Option<Value>,
        toast: Toast,
    },
    Rejected {
        record_id: RecordId,
        status: u16,
        toast: Toast,
    },
    Failed {
        record_id: RecordId,
        toast: Toast,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum CreateOutcome {
    /// The add form is not open.
    FormClosed,
    Created {
        response: Option<Value>,
        toast: Toast,
    },
    Rejected {
        status: u16,
        toast: Toast,
    },
    Failed {
        toast: Toast,
    },
}

/// A finished write, as far as the embedding page is concerned.
pub trait WriteOutcome {
    fn toast(&self) -> Option<&Toast>;
    fn should_reload(&self) -> bool;
}

impl WriteOutcome for SubmitOutcome {
    fn toast(&self) -> Option<&Toast> {
        match self {
            SubmitOutcome::NoActiveEdit => None,
            SubmitOutcome::Saved { toast, .. }
            | SubmitOutcome::Rejected { toast, .. }
            | SubmitOutcome::Failed { toast, .. } => Some(toast),
        }
    }

    fn should_reload(&self) -> bool {
        matches!(self, SubmitOutcome::Saved { .. })
    }
}

impl WriteOutcome for CreateOutcome {
    fn toast(&self) -> Option<&Toast> {
        match self {
            CreateOutcome::FormClosed => None,
            CreateOutcome::Created { toast, .. }
            | CreateOutcome::Rejected { toast, .. }
            | CreateOutcome::Failed { toast } => Some(toast),
        }
    }

    fn should_reload(&self) -> bool {
        matches!(self, CreateOutcome::Created { .. })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventOutcome {
    Page(LoadOutcome),
    Edit(EditOutcome),
    Submit(SubmitOutcome),
    Cancelled,
    AddOpened(bool),
    Create(CreateOutcome),
}

/// Acts on a finished write: where the notification goes and whether the
/// page gets reloaded is up to the embedding page.
pub trait PageHost: Send + Sync {
    fn apply(&self, outcome: &dyn WriteOutcome) -> Result<(), StorageError>;
}

/// Queues the toast in session storage for the next page load and records a
/// reload request on success.
pub struct SessionToastHost {
    session: Arc<dyn KeyValueStore>,
    reload_requested: AtomicBool,
}

impl SessionToastHost {
    pub fn new(session: Arc<dyn KeyValueStore>) -> Self {
        Self {
            session,
            reload_requested: AtomicBool::new(false),
        }
    }

    pub fn reload_requested(&self) -> bool {
        self.reload_requested.load(Ordering::SeqCst)
    }

    /// Returns and clears the pending reload request.
    pub fn take_reload_request(&self) -> bool {
        self.reload_requested.swap(false, Ordering::SeqCst)
    }
}

impl PageHost for SessionToastHost {
    fn apply(&self, outcome: &dyn WriteOutcome) -> Result<(), StorageError> {
        if let Some(toast) = outcome.toast() {
            toast.store(self.session.as_ref())?;
        }
        if outcome.should_reload() {
            self.reload_requested.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Paginated list of one history entity with its edit form.
///
/// Every page load and every edit fetch takes a ticket; a response is only
/// applied when its ticket is still the latest once the locks are held, so
/// the last click wins regardless of response order.
///
/// Lock order: location, then session, then view.
pub struct HistoryList {
    schema: &'static EntitySchema,
    api: Arc<ApiClient>,
    location: Arc<Mutex<PageLocation>>,
    view: Mutex<ListView>,
    session: Mutex<EditSession>,
    ticket: AtomicU64,
    edit_ticket: AtomicU64,
}

impl HistoryList {
    pub fn new(entity: Entity, api: Arc<ApiClient>, location: Arc<Mutex<PageLocation>>) -> Self {
        let schema = entity.schema();
        Self {
            schema,
            api,
            location,
            view: Mutex::new(ListView::new(schema)),
            session: Mutex::new(EditSession::idle(entity)),
            ticket: AtomicU64::new(0),
            edit_ticket: AtomicU64::new(0),
        }
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    pub fn entity(&self) -> Entity {
        self.schema.entity
    }

    pub async fn view(&self) -> ListView {
        self.view.lock().await.clone()
    }

    pub async fn to_html(&self) -> String {
        self.view.lock().await.to_html(self.schema)
    }

    async fn patient_id(&self) -> Option<String> {
        let patient_id = self.location.lock().await.patient_id();
        if patient_id.is_none() {
            error!(entity = %self.schema.entity, "no patient id in page location");
        }
        patient_id
    }

    /// Loads the first page. An edit target in the location that names this
    /// list reopens that record in the form; other lists leave it alone.
    pub async fn bootstrap(&self) -> LoadOutcome {
        let outcome = self.load_page(1).await;
        if self.schema.editable() {
            let target = self.location.lock().await.edit_target();
            if let Some((entity, record_id)) = target {
                if entity == self.schema.entity {
                    self.begin_edit(record_id).await;
                }
            }
        }
        outcome
    }

    pub async fn load_page(&self, page: u32) -> LoadOutcome {
        let ticket = self.ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let entity = self.schema.entity;

        let patient_id = match self.patient_id().await {
            Some(id) => id,
            None => return LoadOutcome::Failed,
        };
        let fetched = match self.api.fetch_page(entity, &patient_id, page).await {
            Some(fetched) => fetched,
            None => return LoadOutcome::Failed,
        };

        let table = render_table(self.schema, &fetched);
        let pagination = render_pagination(fetched.total_pages, fetched.current_page);

        let mut view = self.view.lock().await;
        let latest = self.ticket.load(Ordering::SeqCst);
        if latest != ticket {
            debug!(%entity, page, ticket, latest, "discarding stale page response");
            return LoadOutcome::Stale;
        }
        view.table = table;
        view.pagination = pagination;
        view.current_page = Some(fetched.current_page);
        view.total_pages = Some(fetched.total_pages);
        LoadOutcome::Rendered
    }

    pub async fn handle_click(&self, container: Container, target: &ClickTarget) -> Option<EventOutcome> {
        let event = delegate(self.schema, container, target)?;
        Some(self.handle_event(event).await)
    }

    pub async fn handle_event(&self, event: UiEvent) -> EventOutcome {
        match event {
            UiEvent::ChangePage(page) => EventOutcome::Page(self.load_page(page).await),
            UiEvent::Edit(record_id) => EventOutcome::Edit(self.begin_edit(record_id).await),
            UiEvent::Submit => EventOutcome::Submit(self.submit().await),
            UiEvent::CancelEdit => {
                self.cancel_edit().await;
                EventOutcome::Cancelled
            }
            UiEvent::OpenAdd => EventOutcome::AddOpened(self.open_add_form().await),
            UiEvent::Create => EventOutcome::Create(self.create().await),
        }
    }

    pub async fn begin_edit(&self, record_id: RecordId) -> EditOutcome {
        let entity = self.schema.entity;
        if !self.schema.editable() {
            warn!(%entity, %record_id, "entity is read-only");
            return EditOutcome::NotEditable;
        }

        let ticket = self.edit_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut location = self.location.lock().await;
            self.session.lock().await.claim(record_id, &mut location);
        }

        let record = match self.patient_id().await {
            Some(patient_id) => self.api.fetch_record(entity, &patient_id, record_id).await,
            None => None,
        };

        let mut location = self.location.lock().await;
        let mut session = self.session.lock().await;
        let latest = self.edit_ticket.load(Ordering::SeqCst);
        if latest != ticket || session.record_id != Some(record_id) {
            debug!(%entity, %record_id, ticket, latest, "discarding stale record response");
            return EditOutcome::Superseded(record_id);
        }
        match record {
            Some(record) => {
                self.view.lock().await.form.open_for_edit(self.schema, &record);
                EditOutcome::Opened(record_id)
            }
            None => {
                session.release(&mut location);
                EditOutcome::Unavailable(record_id)
            }
        }
    }

    pub async fn set_form_value(&self, field: &str, value: &str) -> bool {
        self.view.lock().await.form.set_value(field, value)
    }

    pub async fn submit(&self) -> SubmitOutcome {
        let entity = self.schema.entity;
        let (record_id, body) = {
            let mut location = self.location.lock().await;
            let mut session = self.session.lock().await;
            session.reconcile(&location);
            let view = self.view.lock().await;
            // the form must hold the record being edited, not an earlier one
            match session.record_id.filter(|id| view.form.record_id == Some(*id)) {
                Some(id) => {
                    session.release(&mut location);
                    (id, view.form.request_body())
                }
                None => {
                    debug!(%entity, "submit without an open edit session");
                    return SubmitOutcome::NoActiveEdit;
                }
            }
        };
        let result = match self.patient_id().await {
            Some(patient_id) => Some(self.api.update_record(entity, &patient_id, record_id, &body).await),
            None => None,
        };

        let outcome = match result {
            Some(Ok(response)) => {
                info!(%entity, %record_id, "update accepted");
                SubmitOutcome::Saved {
                    record_id,
                    response,
                    toast: Toast::success(UPDATE_SUCCESS_MESSAGE),
                }
            }
            Some(Err(e)) => match e.status() {
                Some(status) => {
                    error!(%entity, %record_id, status, "update rejected");
                    SubmitOutcome::Rejected {
                        record_id,
                        status,
                        toast: Toast::error(UPDATE_REJECTED_MESSAGE),
                    }
                }
                None => {
                    error!(%entity, %record_id, error = %e, "update failed");
                    SubmitOutcome::Failed {
                        record_id,
                        toast: Toast::error(UPDATE_FAILED_MESSAGE),
                    }
                }
            },
            None => SubmitOutcome::Failed {
                record_id,
                toast: Toast::error(UPDATE_FAILED_MESSAGE),
            },
        };

        if !outcome.should_reload() {
            let mut location = self.location.lock().await;
            let mut session = self.session.lock().await;
            if !session.is_editing() && location.edit_target().is_none() {
                session.claim(record_id, &mut location);
            }
        }
        outcome
    }

    pub async fn cancel_edit(&self) {
        {
            let mut location = self.location.lock().await;
            self.session.lock().await.release(&mut location);
        }
        self.view.lock().await.form.reset(self.schema);
    }

    /// Ends any edit of this list and shows the empty form in add mode.
    /// Returns `false` for read-only entities.
    pub async fn open_add_form(&self) -> bool {
        if !self.schema.editable() {
            warn!(entity = %self.schema.entity, "entity is read-only");
            return false;
        }
        self.edit_ticket.fetch_add(1, Ordering::SeqCst);
        let mut location = self.location.lock().await;
        let mut session = self.session.lock().await;
        session.release(&mut location);
        let mut view = self.view.lock().await;
        view.form.reset(self.schema);
        view.form.visible = true;
        true
    }

    /// Posts the add form as a new record of this list's entity.
    pub async fn create(&self) -> CreateOutcome {
        let entity = self.schema.entity;
        let body = {
            let view = self.view.lock().await;
            if !view.form.visible || view.form.mode != FormMode::Add {
                debug!(%entity, "create without an open add form");
                return CreateOutcome::FormClosed;
            }
            view.form.request_body()
        };

        let result = match self.patient_id().await {
            Some(patient_id) => Some(self.api.create_record(entity, &patient_id, &body).await),
            None => None,
        };

        match result {
            Some(Ok(response)) => CreateOutcome::Created {
                response,
                toast: Toast::success(CREATE_SUCCESS_MESSAGE),
            },
            Some(Err(e)) => match e.status() {
                Some(status) => {
                    error!(%entity, status, "create rejected");
                    CreateOutcome::Rejected {
                        status,
                        toast: Toast::error(CREATE_REJECTED_MESSAGE),
                    }
                }
                None => {
                    error!(%entity, error = %e, "create failed");
                    CreateOutcome::Failed {
                        toast: Toast::error(UPDATE_FAILED_MESSAGE),
                    }
                }
            },
            None => CreateOutcome::Failed {
                toast: Toast::error(UPDATE_FAILED_MESSAGE),
            },
        }
    }

    pub async fn edit_session(&self) -> EditSession {
        *self.session.lock().await
    }
}
