use actix_web::{App, test, web};
use obihai_setup_ui::{
    api::{Api, register_routes},
    entry_store::{ConfigEntry, EntryStore, StoreOutcome},
    obihai_client::{DeviceCredentials, ObihaiClient},
    services::flow::{ERROR_ALREADY_CONFIGURED, FlowInput, FlowResult, SetupFlow},
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

// Integration tests driving the wizard through the HTTP surface with a
// stubbed credential validator.

#[derive(Clone)]
struct StubValidator {
    accept: bool,
}

impl ObihaiClient for StubValidator {
    async fn check_account(&self, _creds: DeviceCredentials) -> bool {
        self.accept
    }
}

fn test_store(temp_dir: &TempDir) -> web::Data<EntryStore> {
    web::Data::new(
        EntryStore::load(&temp_dir.path().join("entries.json")).expect("failed to load store"),
    )
}

fn seed_entry(store: &EntryStore, host: &str) -> ConfigEntry {
    let outcome = store
        .create(
            host.to_string(),
            DeviceCredentials {
                host: host.to_string(),
                username: "admin".to_string(),
                password: "admin".to_string(),
            },
        )
        .expect("failed to seed entry");

    match outcome {
        StoreOutcome::Stored(entry) => entry,
        StoreOutcome::DuplicateHost => panic!("seed host {host} already taken"),
    }
}

macro_rules! test_app {
    ($accept:expr, $store:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(Api::new(StubValidator { accept: $accept })))
                .app_data($store.clone())
                .configure(register_routes::<StubValidator>),
        )
        .await
    };
}

#[actix_web::test]
async fn setup_shows_form_then_creates_entry() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let store = test_store(&temp_dir);
    let app = test_app!(true, store);

    let req = test::TestRequest::get().uri("/api/setup").to_request();
    let form: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(form["type"], "form");
    assert_eq!(form["step_id"], "user");
    assert_eq!(form["suggested"]["username"], "admin");
    assert_eq!(form["suggested"]["password"], "admin");
    assert_eq!(form["errors"], json!({}));

    let req = test::TestRequest::post()
        .uri("/api/setup")
        .set_json(json!({"host": "10.10.10.30"}))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(created["type"], "entry");
    assert_eq!(created["title"], "10.10.10.30");
    assert_eq!(created["data"]["host"], "10.10.10.30");
    assert_eq!(created["data"]["username"], "admin");

    let req = test::TestRequest::get().uri("/api/entries").to_request();
    let entries: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(entries.as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn setup_with_duplicate_host_aborts() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let store = test_store(&temp_dir);
    let app = test_app!(true, store);

    for expected in ["entry", "abort"] {
        let req = test::TestRequest::post()
            .uri("/api/setup")
            .set_json(json!({"host": "10.10.10.30"}))
            .to_request();
        let result: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(result["type"], expected);
    }
}

/// Validator that answers only once both submissions are inside the
/// credential check, so neither can see the other's entry beforehand.
struct MeetingValidator {
    arrivals: AtomicUsize,
}

impl ObihaiClient for MeetingValidator {
    async fn check_account(&self, _creds: DeviceCredentials) -> bool {
        self.arrivals.fetch_add(1, Ordering::SeqCst);
        while self.arrivals.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        true
    }
}

#[actix_web::test]
async fn concurrent_setup_submissions_keep_hosts_unique() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let store =
        EntryStore::load(&temp_dir.path().join("entries.json")).expect("failed to load store");
    let validator = MeetingValidator {
        arrivals: AtomicUsize::new(0),
    };

    let input = || {
        Some(FlowInput {
            host: "10.10.10.30".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            name: None,
        })
    };

    let (first, second) = tokio::join!(
        SetupFlow::step_user(&validator, &store, input()),
        SetupFlow::step_user(&validator, &store, input()),
    );
    let results = [first.unwrap(), second.unwrap()];

    let created = results
        .iter()
        .filter(|result| matches!(result, FlowResult::Entry(_)))
        .count();
    let aborted = results
        .iter()
        .filter(|result| {
            matches!(
                result,
                FlowResult::Abort {
                    reason: ERROR_ALREADY_CONFIGURED
                }
            )
        })
        .count();

    assert_eq!(created, 1, "exactly one submission should win: {results:?}");
    assert_eq!(aborted, 1, "the loser should abort: {results:?}");
    assert_eq!(store.entries().unwrap().len(), 1);
}

#[actix_web::test]
async fn setup_with_rejected_credentials_redisplays_form() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let store = test_store(&temp_dir);
    let app = test_app!(false, store);

    let req = test::TestRequest::post()
        .uri("/api/setup")
        .set_json(json!({"host": "10.10.10.30", "username": "voip-admin"}))
        .to_request();
    let form: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(form["type"], "form");
    assert_eq!(form["errors"]["base"], "cannot_connect");
    // submitted values come back as suggestions
    assert_eq!(form["suggested"]["host"], "10.10.10.30");
    assert_eq!(form["suggested"]["username"], "voip-admin");

    assert!(store.entries().unwrap().is_empty());
}

#[actix_web::test]
async fn setup_rejects_empty_or_missing_host() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let store = test_store(&temp_dir);
    let app = test_app!(true, store);

    let req = test::TestRequest::post()
        .uri("/api/setup")
        .set_json(json!({"host": ""}))
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/setup")
        .set_json(json!({}))
        .to_request();
    let response = test::call_service(&app, req).await;
    assert_eq!(response.status(), 400);
}

#[actix_web::test]
async fn import_titles_entry_by_explicit_name() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let store = test_store(&temp_dir);
    let app = test_app!(true, store);

    let req = test::TestRequest::post()
        .uri("/api/setup/import")
        .set_json(json!({"host": "10.10.10.30", "name": "hallway obi"}))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(created["type"], "entry");
    assert_eq!(created["title"], "hallway obi");
}

#[actix_web::test]
async fn import_with_rejected_credentials_aborts() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let store = test_store(&temp_dir);
    let app = test_app!(false, store);

    let req = test::TestRequest::post()
        .uri("/api/setup/import")
        .set_json(json!({"host": "10.10.10.30"}))
        .to_request();
    let result: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(result["type"], "abort");
    assert_eq!(result["reason"], "cannot_connect");
    assert!(store.entries().unwrap().is_empty());
}

#[actix_web::test]
async fn options_prefills_form_and_updates_entry() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let store = test_store(&temp_dir);
    let entry = seed_entry(&store, "10.10.10.30");
    let app = test_app!(true, store);

    let req = test::TestRequest::get()
        .uri(&format!("/api/entries/{}/options", entry.id))
        .to_request();
    let form: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(form["type"], "form");
    assert_eq!(form["step_id"], "init");
    assert_eq!(form["suggested"]["host"], "10.10.10.30");

    let req = test::TestRequest::post()
        .uri(&format!("/api/entries/{}/options", entry.id))
        .set_json(json!({"host": "10.10.10.30", "username": "changed_username"}))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(updated["type"], "entry");
    assert_eq!(updated["data"]["username"], "changed_username");

    let stored = store.get(entry.id).unwrap().expect("entry should exist");
    assert_eq!(stored.data.username, "changed_username");
    assert_eq!(stored.data.host, "10.10.10.30");
}

#[actix_web::test]
async fn options_detects_host_collision() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let store = test_store(&temp_dir);
    seed_entry(&store, "10.10.10.30");
    let entry = seed_entry(&store, "10.10.10.31");
    let app = test_app!(true, store);

    let req = test::TestRequest::post()
        .uri(&format!("/api/entries/{}/options", entry.id))
        .set_json(json!({"host": "10.10.10.30"}))
        .to_request();
    let form: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(form["type"], "form");
    assert_eq!(form["errors"]["host"], "already_configured");

    let stored = store.get(entry.id).unwrap().expect("entry should exist");
    assert_eq!(stored.data.host, "10.10.10.31");
}

#[actix_web::test]
async fn options_on_unknown_entry_is_not_found() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let store = test_store(&temp_dir);
    let app = test_app!(true, store);

    let req = test::TestRequest::get()
        .uri(&format!("/api/entries/{}/options", uuid::Uuid::new_v4()))
        .to_request();
    let response = test::call_service(&app, req).await;

    assert_eq!(response.status(), 404);
}

#[actix_web::test]
async fn version_endpoint_returns_crate_version() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let store = test_store(&temp_dir);
    let app = test_app!(true, store);

    let req = test::TestRequest::get().uri("/api/version").to_request();
    let body = test::call_and_read_body(&app, req).await;

    assert_eq!(body, env!("CARGO_PKG_VERSION").as_bytes());
}
