
use std::sync::Arc;

use regex::Regex;
use serde_json::json;
use tokio::sync::Mutex;

use crate::api::{ApiClient, ClientOptions};
use crate::component::{EventOutcome, HistoryList, LoadOutcome, PageHost, SessionToastHost};
use crate::entity::{Entity, Page, Record, RecordId};
use crate::events::{Container, UiEvent};
use crate::location::PageLocation;
use crate::render::{render_pagination, render_table, TableRow};
use crate::storage::{MemoryStore, Toast, ToastKind};
use stub::{StubRequest, StubResponse, StubServer};

#[test]
fn formatted_dates_use_long_month_form() {
    let re = Regex::new(r"^(January|February|March|April|May|June|July|August|September|October|November|December) \d{2}, \d{4}$").unwrap();
    for raw in [
        "2024-01-05",
        "1999-12-31",
        "2020-02-29T10:30:00Z",
        "2023-07-04T08:00:00.123",
    ] {
        let formatted = crate::format::format_long_date(raw).unwrap();
        assert!(re.is_match(&formatted), "{raw} -> {formatted}");
    }
    assert_eq!(crate::format::format_long_date("not a date"), None);
}

#[test]
fn formatter_leaves_other_fields_alone() {
    let schema = Entity::MedicationHistory.schema();
    let record = Record::new(RecordId(1))
        .with_field("date_prescribed", "2024-01-05")
        .with_field("generic_name", "ibuprofen")
        .with_field("dosage", "10mg")
        .with_field("quantity", 30)
        .with_field("instructions", "after meals");
    let formatted = crate::format::format_record(schema, &record);
    assert_eq!(formatted.display_value("date_prescribed"), "January 05, 2024");
    assert_eq!(formatted.display_value("generic_name"), "Ibuprofen");
    for field in ["dosage", "quantity", "instructions"] {
        assert_eq!(formatted.get(field), record.get(field));
    }
}

#[test]
fn every_entity_renders_empty_state_without_edit_affordance() {
    for entity in Entity::ALL {
        let schema = entity.schema();
        let body = render_table(
            schema,
            &Page {
                results: vec![],
                total_pages: 0,
                current_page: 1,
            },
        );
        assert!(body.is_empty_state());
        assert!(body.rows.iter().all(|r| r.edit_target().is_none()));
        match &body.rows[0] {
            TableRow::Empty { colspan, message } => {
                assert_eq!(*colspan, schema.column_count());
                assert_eq!(message, schema.empty_message);
            }
            other => panic!("unexpected row {other:?}"),
        }
    }
}

#[test]
fn pagination_links_follow_clamping_rules() {
    for total in 1..=10u32 {
        for current in 1..=total {
            let pagination = render_pagination(total, current);
            assert_eq!(pagination.links.len(), (total + 2) as usize);
            assert_eq!(pagination.previous().unwrap().target, std::cmp::max(current - 1, 1));
            assert_eq!(pagination.next().unwrap().target, std::cmp::min(current + 1, total));
        }
    }
}

fn backend(req: &StubRequest) -> StubResponse {
    if req.method == "PUT" {
        return StubResponse::json(200, json!({"id": 2, "diet": "keto"}));
    }
    if req.path.contains("/social_history/?page=") {
        let page: u32 = req
            .path
            .rsplit('=')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(1);
        return StubResponse::json(
            200,
            json!({
                "results": [
                    {"id": page * 10 + 1, "diet": "vegan", "physical_activity": "daily"},
                    {"id": page * 10 + 2, "diet": "omnivore", "physical_activity": "weekly"}
                ],
                "total_pages": 2,
                "current_page": page
            }),
        );
    }
    if req.path.contains("/social_history/") {
        return StubResponse::json(200, json!({"id": 12, "diet": "omnivore"}));
    }
    StubResponse::json(404, json!({"error": "Patient not found."}))
}

#[tokio::test]
async fn social_history_edit_round_trip() {
    let server = StubServer::start(backend).await;
    let api = Arc::new(
        ApiClient::new(ClientOptions {
            endpoint: server.endpoint(),
            token: Some("abc".to_string()),
            timeout_seconds: 5,
            proxy: None,
        })
        .unwrap(),
    );
    let location = Arc::new(Mutex::new(
        PageLocation::for_patient("http://localhost/patient/view", "5").unwrap(),
    ));
    let social = HistoryList::new(Entity::SocialHistory, api.clone(), location.clone());
    let surgical = HistoryList::new(Entity::SurgicalHistory, api.clone(), location.clone());

    assert_eq!(social.bootstrap().await, LoadOutcome::Rendered);
    assert_eq!(surgical.bootstrap().await, LoadOutcome::Failed);
    assert!(!surgical.view().await.is_loaded());

    // newest record first
    let view = social.view().await;
    assert_eq!(view.table.record_ids(), vec![RecordId(12), RecordId(11)]);

    let next = view.pagination.next().unwrap().click_target(Entity::SocialHistory.schema().link_class);
    assert_eq!(
        social.handle_click(Container::Pagination, &next).await,
        Some(EventOutcome::Page(LoadOutcome::Rendered))
    );
    assert_eq!(social.view().await.current_page, Some(2));

    let outcome = social.handle_event(UiEvent::Edit(RecordId(12))).await;
    assert!(matches!(outcome, EventOutcome::Edit(_)));
    assert_eq!(location.lock().await.edit_id(), Some(RecordId(12)));
    assert_eq!(social.view().await.form.value("diet"), Some("omnivore"));

    social.set_form_value("diet", "keto").await;
    let session = Arc::new(MemoryStore::new());
    let host = SessionToastHost::new(session.clone());
    let outcome = match social.handle_event(UiEvent::Submit).await {
        EventOutcome::Submit(outcome) => outcome,
        other => panic!("unexpected outcome {other:?}"),
    };
    host.apply(&outcome).unwrap();
    assert!(host.take_reload_request());
    assert_eq!(location.lock().await.edit_id(), None);

    let toast = Toast::take(session.as_ref()).unwrap().unwrap();
    assert_eq!(toast.kind, ToastKind::Success);
    assert_eq!(toast.message, "Record Successfully Updated");

    let put = server
        .requests()
        .into_iter()
        .find(|r| r.method == "PUT")
        .unwrap();
    assert_eq!(put.path, "/api/patient/update/5/social_history/12/");
    let body = put.json().unwrap();
    assert_eq!(body["diet"], json!("keto"));
    assert_eq!(body["physical_activity"], json!(""));
    assert_eq!(
        body.as_object().unwrap().len(),
        Entity::SocialHistory.schema().editable_fields.len()
    );
}
