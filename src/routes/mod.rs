mod auth;
mod blogs;
mod client_logs;
mod home;
mod photos;
mod projects;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::middleware::auth::require_admin;
use crate::services::media_store::MEDIA_ROUTE;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        home::root,
        auth::login,
        projects::list_projects,
        projects::get_project,
        projects::create_project,
        projects::update_project,
        projects::delete_project,
        blogs::list_blogs,
        blogs::get_blog,
        blogs::create_blog,
        blogs::update_blog,
        blogs::delete_blog,
        photos::list_photos,
        photos::get_photo,
        photos::create_photo,
        photos::update_photo,
        photos::delete_photo,
        client_logs::client_logs,
    ),
    components(
        schemas(
            auth::LoginRequest,
            auth::LoginResponse,
            auth::ErrorResponse,
            projects::ProjectResponse,
            projects::UpdateProjectRequest,
            blogs::BlogResponse,
            blogs::UpdateBlogRequest,
            photos::PhotoResponse,
            photos::UpdatePhotoRequest,
        )
    ),
    tags(
        (name = "General", description = "Liveness"),
        (name = "Authentication", description = "Admin login issuing bearer tokens"),
        (name = "Projects", description = "Portfolio projects with ordered images"),
        (name = "Blogs", description = "Blog posts with ordered images"),
        (name = "Photos", description = "Photo gallery; RAW and HEIC uploads are converted to JPEG"),
        (name = "Telemetry", description = "Client log sink")
    ),
    info(
        title = "Portfolio API",
        version = "0.1.0",
        description = "Projects, blog posts and a photo gallery behind a single admin secret",
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            );
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if config.cors_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn create_routes(state: AppState) -> Router {
    let swagger_router: Router = SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into();

    // Mutations require an admin token
    let admin_routes = Router::new()
        .route("/projects", post(projects::create_project))
        .route(
            "/projects/{id}",
            put(projects::update_project).delete(projects::delete_project),
        )
        .route("/blogs", post(blogs::create_blog))
        .route("/blogs/{id}", put(blogs::update_blog).delete(blogs::delete_blog))
        .route("/photos", post(photos::create_photo))
        .route("/photos/{id}", put(photos::update_photo).delete(photos::delete_photo))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let public_routes = Router::new()
        .route("/admin/login", post(auth::login))
        .route("/projects", get(projects::list_projects))
        .route("/projects/{id}", get(projects::get_project))
        .route("/blogs", get(blogs::list_blogs))
        .route("/blogs/{id}", get(blogs::get_blog))
        .route("/photos", get(photos::list_photos))
        .route("/photos/{id}", get(photos::get_photo))
        .route("/client-logs", post(client_logs::client_logs));

    let app_routes = Router::new()
        .route("/", get(home::root))
        .nest("/api", public_routes.merge(admin_routes))
        .nest_service(MEDIA_ROUTE, ServeDir::new(state.media.root()))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .with_state(state.clone());

    Router::new()
        .merge(swagger_router)
        .merge(app_routes)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
}
