use crate::{
    entry_store::EntryStore,
    obihai_client::ObihaiClient,
    services::flow::{FlowInput, FlowResult, OptionsFlow, SetupFlow},
};
use actix_web::{HttpResponse, Responder, web};
use anyhow::Result;
use log::{debug, error};
use serde_valid::Validate;
use uuid::Uuid;

/// HTTP surface of the setup wizard, generic over the credential validator
#[derive(Clone)]
pub struct Api<Client>
where
    Client: ObihaiClient,
{
    pub device_client: Client,
}

impl<Client> Api<Client>
where
    Client: ObihaiClient,
{
    pub fn new(device_client: Client) -> Self {
        Api { device_client }
    }

    pub async fn setup_form(api: web::Data<Self>, store: web::Data<EntryStore>) -> impl Responder {
        debug!("setup_form() called");

        Self::flow_response(
            SetupFlow::step_user(&api.device_client, &store, None).await,
            "setup_form",
        )
    }

    pub async fn setup_submit(
        body: web::Json<FlowInput>,
        api: web::Data<Self>,
        store: web::Data<EntryStore>,
    ) -> impl Responder {
        debug!("setup_submit() called for host {}", body.host);

        if let Err(e) = body.validate() {
            return HttpResponse::BadRequest().body(e.to_string());
        }

        Self::flow_response(
            SetupFlow::step_user(&api.device_client, &store, Some(body.into_inner())).await,
            "setup_submit",
        )
    }

    pub async fn setup_import(
        body: web::Json<FlowInput>,
        api: web::Data<Self>,
        store: web::Data<EntryStore>,
    ) -> impl Responder {
        debug!("setup_import() called for host {}", body.host);

        if let Err(e) = body.validate() {
            return HttpResponse::BadRequest().body(e.to_string());
        }

        Self::flow_response(
            SetupFlow::step_import(&api.device_client, &store, body.into_inner()).await,
            "setup_import",
        )
    }

    pub async fn entries(store: web::Data<EntryStore>) -> impl Responder {
        debug!("entries() called");

        match store.entries() {
            Ok(entries) => HttpResponse::Ok().json(entries),
            Err(e) => {
                error!("entries failed: {e:#}");
                HttpResponse::InternalServerError().body(format!("{e}"))
            }
        }
    }

    pub async fn options_form(
        id: web::Path<Uuid>,
        api: web::Data<Self>,
        store: web::Data<EntryStore>,
    ) -> impl Responder {
        debug!("options_form() called for entry {id}");

        let entry = match store.get(*id) {
            Ok(Some(entry)) => entry,
            Ok(None) => return HttpResponse::NotFound().body("unknown entry"),
            Err(e) => {
                error!("options_form failed: {e:#}");
                return HttpResponse::InternalServerError().body(format!("{e}"));
            }
        };

        Self::flow_response(
            OptionsFlow::step_init(&api.device_client, &store, &entry, None).await,
            "options_form",
        )
    }

    pub async fn options_submit(
        id: web::Path<Uuid>,
        body: web::Json<FlowInput>,
        api: web::Data<Self>,
        store: web::Data<EntryStore>,
    ) -> impl Responder {
        debug!("options_submit() called for entry {id}");

        if let Err(e) = body.validate() {
            return HttpResponse::BadRequest().body(e.to_string());
        }

        let entry = match store.get(*id) {
            Ok(Some(entry)) => entry,
            Ok(None) => return HttpResponse::NotFound().body("unknown entry"),
            Err(e) => {
                error!("options_submit failed: {e:#}");
                return HttpResponse::InternalServerError().body(format!("{e}"));
            }
        };

        Self::flow_response(
            OptionsFlow::step_init(&api.device_client, &store, &entry, Some(body.into_inner()))
                .await,
            "options_submit",
        )
    }

    pub async fn version() -> impl Responder {
        HttpResponse::Ok().body(env!("CARGO_PKG_VERSION"))
    }

    fn flow_response(result: Result<FlowResult>, operation: &str) -> HttpResponse {
        match result {
            Ok(result) => HttpResponse::Ok().json(result),
            Err(e) => {
                error!("{operation} failed: {e:#}");
                HttpResponse::InternalServerError().body(format!("{e}"))
            }
        }
    }
}

/// Register the wizard routes on an actix app
pub fn register_routes<Client>(cfg: &mut web::ServiceConfig)
where
    Client: ObihaiClient + 'static,
{
    cfg.route("/api/setup", web::get().to(Api::<Client>::setup_form))
        .route("/api/setup", web::post().to(Api::<Client>::setup_submit))
        .route(
            "/api/setup/import",
            web::post().to(Api::<Client>::setup_import),
        )
        .route("/api/entries", web::get().to(Api::<Client>::entries))
        .route(
            "/api/entries/{id}/options",
            web::get().to(Api::<Client>::options_form),
        )
        .route(
            "/api/entries/{id}/options",
            web::post().to(Api::<Client>::options_submit),
        )
        .route("/api/version", web::get().to(Api::<Client>::version));
}
