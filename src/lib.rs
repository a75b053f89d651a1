use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use chrono;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod convert;
pub mod document;
pub mod merge;
pub mod pipeline;
pub mod render;
pub mod state;
pub mod workspace;

pub use crate::state::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

pub async fn run() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::document::handlers::process_document,
            crate::document::handlers::merge_pdf,
            crate::document::handlers::root,
        ),
        components(
            schemas(
                document::models::ProcessDocumentRequest,
                document::models::MergePdfRequest,
                ErrorResponse,
            )
        ),
        tags(
            (name = "Document Processing", description = "Docx template rendering and PDF conversion endpoints.")
        )
    )]
    struct ApiDoc;

    dotenvy::dotenv().ok(); // Load .env file
    let server_config = match config::ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::create_dir_all(&server_config.scratch_root) {
        log::error!(
            "Failed to create scratch root {}: {}",
            server_config.scratch_root.display(),
            e
        );
        std::process::exit(1);
    }

    let port = server_config.port;
    let workers = server_config.workers;
    let app_state = web::Data::new(AppState::new(server_config));

    let prometheus = PrometheusMetricsBuilder::new("docproc_server")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus metrics middleware");

    log::info!("Starting server at http://0.0.0.0:{}", port);

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .service(
                web::resource("/process-document")
                    .route(web::post().to(document::handlers::process_document)),
            )
            .service(
                web::resource("/merge-pdf")
                    .route(web::post().to(document::handlers::merge_pdf)),
            )
            .service(web::resource("/").route(web::get().to(document::handlers::root)))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .workers(workers)
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
