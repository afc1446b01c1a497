use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, PaginatorTrait};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use portfolio_server::config::Config;
use portfolio_server::entities::{photo, project, project_image};
use portfolio_server::middleware::auth::{issue_token, issue_token_at};
use portfolio_server::services::converter::{
    ConversionError, HeifDecoder, MediaConverter, UnavailableHeifDecoder,
};
use portfolio_server::services::media_store::MediaStore;
use portfolio_server::{create_routes, AppState};

const ADMIN_SECRET: &str = "letmein";
const SIGNING_KEY: &str = "test-signing-key";
const BASE_URL: &str = "http://media.test";
const BOUNDARY: &str = "portfolio-test-boundary";

/// Stands in for libheif: decodes whatever the image crate recognizes.
struct ContentSniffingDecoder;

impl HeifDecoder for ContentSniffingDecoder {
    fn decode(&self, path: &Path) -> Result<DynamicImage, ConversionError> {
        Ok(image::ImageReader::open(path)?.with_guessed_format()?.decode()?)
    }
}

struct TestApp {
    router: Router,
    db: DatabaseConnection,
    uploads: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_heif_decoder(Arc::new(ContentSniffingDecoder)).await
    }

    async fn with_heif_decoder(heif: Arc<dyn HeifDecoder>) -> Self {
        let dir = TempDir::new().unwrap();
        let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let db = Database::connect(&database_url).await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let uploads = dir.path().join("uploads");
        let media = MediaStore::new(uploads.clone()).await.unwrap();
        let config = Config {
            database_url,
            admin_secret: ADMIN_SECRET.to_string(),
            jwt_secret: SIGNING_KEY.to_string(),
            public_base_url: Some(BASE_URL.to_string()),
            cors_origins: vec![],
            upload_dir: uploads.clone(),
            port: 0,
            max_upload_files: 3,
            max_upload_bytes: 20 * 1024 * 1024,
        };
        let converter = MediaConverter::with_heif_decoder(media.clone(), heif);
        let state = AppState::with_converter(db.clone(), config, media, converter);

        Self {
            router: create_routes(state),
            db,
            uploads,
            _dir: dir,
        }
    }

    async fn send(&self, req: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.uploads)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a str, Vec<u8>),
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
                );
            }
            Part::File(name, filename, content_type, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, token: Option<&str>, parts: &[Part]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(res: axum::response::Response) -> Vec<u8> {
    res.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn json_body(res: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(res).await).unwrap()
}

fn token() -> String {
    issue_token(SIGNING_KEY).unwrap()
}

fn encoded(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 90]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn png() -> Vec<u8> {
    encoded(ImageFormat::Png, 12, 12)
}

/// A TIFF-looking blob carrying a JPEG preview, like most camera RAW files.
fn fake_cr2() -> Vec<u8> {
    let mut raw = b"II*\0\x10\0\0\0CR\x02\0".to_vec();
    raw.extend_from_slice(&[0u8; 128]);
    raw.extend_from_slice(&encoded(ImageFormat::Jpeg, 160, 120));
    raw.extend_from_slice(&[0x5Au8; 256]);
    raw
}

fn images(body: &Value) -> Vec<String> {
    body["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn root_greets() {
    let app = TestApp::new().await;
    let res = app.send(get("/")).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_issues_token_for_correct_secret() {
    let app = TestApp::new().await;

    let res = app
        .send(json_request("POST", "/api/admin/login", None, json!({"secret": ADMIN_SECRET})))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    let token = body["token"].as_str().unwrap().to_string();

    let res = app
        .send(multipart_request("/api/projects", Some(&token), &[Part::Text("title", "Via login")]))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn login_rejects_wrong_secret() {
    let app = TestApp::new().await;
    let res = app
        .send(json_request("POST", "/api/admin/login", None, json!({"secret": "nope"})))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(res).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn create_project_without_token_is_unauthorized() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request("/api/projects", None, &[Part::Text("title", "Nope")]))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(project_image::Entity::find().count(&app.db).await.unwrap(), 0);
}

#[tokio::test]
async fn create_project_with_expired_token_is_forbidden() {
    let app = TestApp::new().await;
    let now = chrono::Utc::now().timestamp();
    let expired = issue_token_at(SIGNING_KEY, now - 3 * 3600, now - 3600).unwrap();

    let res = app
        .send(multipart_request("/api/projects", Some(&expired), &[Part::Text("title", "Late")]))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .send(multipart_request("/api/projects", Some("garbage"), &[Part::Text("title", "Bad")]))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_project_with_two_images() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/projects",
            Some(&token()),
            &[
                Part::Text("title", "Gallery"),
                Part::Text("description", "Two shots"),
                Part::Text("project_url", "https://example.com"),
                Part::File("images", "first.png", "image/png", png()),
                Part::File("images", "second.png", "image/png", png()),
            ],
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let body = json_body(res).await;
    let urls = images(&body);
    assert_eq!(urls.len(), 2);
    assert_eq!(body["image_url"], json!(urls[0]));
    assert!(urls[0].starts_with(&format!("{BASE_URL}/uploads/")));
    assert!(urls[0].ends_with("-first.png"));
    assert!(urls[1].ends_with("-second.png"));
    assert_eq!(body["description"], "Two shots");
    assert_eq!(body["project_url"], "https://example.com");
    assert_eq!(app.stored_files().len(), 2);
}

#[tokio::test]
async fn images_come_back_in_upload_order() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/projects",
            Some(&token()),
            &[
                Part::File("images", "c.png", "image/png", png()),
                Part::File("images", "a.png", "image/png", png()),
                Part::Text("title", "Ordered"),
                Part::File("images", "b.png", "image/png", png()),
            ],
        ))
        .await;
    let id = json_body(res).await["id"].as_i64().unwrap();

    let body = json_body(app.send(get(&format!("/api/projects/{id}"))).await).await;
    let urls = images(&body);
    assert_eq!(urls.len(), 3);
    assert!(urls[0].ends_with("-c.png"));
    assert!(urls[1].ends_with("-a.png"));
    assert!(urls[2].ends_with("-b.png"));
    assert_eq!(body["image_url"], json!(urls[0]));
}

#[tokio::test]
async fn files_beyond_the_cap_are_dropped() {
    let app = TestApp::new().await;
    let parts: Vec<Part> = std::iter::once(Part::Text("title", "Many"))
        .chain((0..5).map(|_| Part::File("images", "pic.png", "image/png", png())))
        .collect();

    let res = app
        .send(multipart_request("/api/projects", Some(&token()), &parts))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(images(&json_body(res).await).len(), 3);
    assert_eq!(app.stored_files().len(), 3);
}

#[tokio::test]
async fn project_without_images_has_empty_array() {
    let app = TestApp::new().await;
    app.send(multipart_request(
        "/api/projects",
        Some(&token()),
        &[Part::Text("title", "Bare"), Part::File("images", "", "application/octet-stream", vec![])],
    ))
    .await;

    let body = json_body(app.send(get("/api/projects")).await).await;
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["images"], json!([]));
    assert_eq!(list[0]["image_url"], Value::Null);
}

#[tokio::test]
async fn projects_are_listed_by_id() {
    let app = TestApp::new().await;
    for title in ["one", "two", "three"] {
        app.send(multipart_request("/api/projects", Some(&token()), &[Part::Text("title", title)]))
            .await;
    }

    let body = json_body(app.send(get("/api/projects")).await).await;
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn missing_title_is_rejected_and_files_removed() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/projects",
            Some(&token()),
            &[Part::File("images", "orphan.png", "image/png", png())],
        ))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn deleting_a_project_cascades_to_its_images() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/projects",
            Some(&token()),
            &[
                Part::Text("title", "Doomed"),
                Part::File("images", "1.png", "image/png", png()),
                Part::File("images", "2.png", "image/png", png()),
                Part::File("images", "3.png", "image/png", png()),
            ],
        ))
        .await;
    let id = json_body(res).await["id"].as_i64().unwrap();
    assert_eq!(project_image::Entity::find().count(&app.db).await.unwrap(), 3);

    let res = app.send(delete(&format!("/api/projects/{id}"), &token())).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(res).await.is_empty());
    assert_eq!(project_image::Entity::find().count(&app.db).await.unwrap(), 0);

    let res = app.send(get(&format!("/api/projects/{id}"))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app.send(delete(&format!("/api/projects/{id}"), &token())).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn project_update_keeps_omitted_fields() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/projects",
            Some(&token()),
            &[Part::Text("title", "Keep me"), Part::Text("description", "old")],
        ))
        .await;
    let id = json_body(res).await["id"].as_i64().unwrap();

    let res = app
        .send(json_request(
            "PUT",
            &format!("/api/projects/{id}"),
            Some(&token()),
            json!({"description": "new", "title": null, "image_url": "https://cdn.example.com/x.jpg"}),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["title"], "Keep me");
    assert_eq!(body["description"], "new");
    assert_eq!(body["image_url"], "https://cdn.example.com/x.jpg");

    let res = app
        .send(json_request("PUT", "/api/projects/9999", Some(&token()), json!({"title": "x"})))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app
        .send(json_request("PUT", &format!("/api/projects/{id}"), None, json!({"title": "x"})))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn blog_update_refreshes_date_and_keeps_content() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/blogs",
            Some(&token()),
            &[
                Part::Text("title", "Hello"),
                Part::Text("content", "First post"),
                Part::File("image", "cover.png", "image/png", png()),
            ],
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = json_body(res).await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(images(&created).len(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;

    let res = app
        .send(json_request("PUT", &format!("/api/blogs/{id}"), Some(&token()), json!({"caption": "new"})))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let updated = json_body(res).await;
    assert_eq!(updated["title"], "Hello");
    assert_eq!(updated["content"], "First post");
    assert_eq!(updated["images"], created["images"]);

    let before = chrono::DateTime::parse_from_rfc3339(created["date"].as_str().unwrap()).unwrap();
    let after = chrono::DateTime::parse_from_rfc3339(updated["date"].as_str().unwrap()).unwrap();
    assert!(after > before);
}

#[tokio::test]
async fn blogs_are_listed_newest_first() {
    let app = TestApp::new().await;
    for title in ["older", "newer"] {
        app.send(multipart_request("/api/blogs", Some(&token()), &[Part::Text("title", title)]))
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let body = json_body(app.send(get("/api/blogs")).await).await;
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["newer", "older"]);
    assert_eq!(body[0]["images"], json!([]));
}

#[tokio::test]
async fn raw_upload_is_converted_and_original_removed() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/photos",
            Some(&token()),
            &[
                Part::Text("title", "Mountains"),
                Part::File("photo", "IMG_0042.CR2", "application/octet-stream", fake_cr2()),
            ],
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let body = json_body(res).await;
    let image_url = body["image_url"].as_str().unwrap();
    assert!(image_url.ends_with(".jpg"));
    assert!(image_url.contains("IMG_0042-"));
    assert_eq!(body["raw_url"], Value::Null);

    let files = app.stored_files();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with(".jpg"));
    assert!(image_url.ends_with(&files[0]));
    image::open(app.uploads.join(&files[0])).unwrap();
}

#[tokio::test]
async fn heic_upload_is_reencoded_as_jpeg() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/photos",
            Some(&token()),
            &[Part::File("photo", "beach.heic", "image/heic", png())],
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let body = json_body(res).await;
    assert!(body["image_url"].as_str().unwrap().ends_with(".jpg"));
    let files = app.stored_files();
    assert_eq!(files.len(), 1);
    let reader = image::ImageReader::open(app.uploads.join(&files[0]))
        .unwrap()
        .with_guessed_format()
        .unwrap();
    assert_eq!(reader.format(), Some(ImageFormat::Jpeg));
}

#[tokio::test]
async fn heic_without_decoder_fails_without_a_row() {
    let app = TestApp::with_heif_decoder(Arc::new(UnavailableHeifDecoder)).await;
    let res = app
        .send(multipart_request(
            "/api/photos",
            Some(&token()),
            &[Part::File("photo", "beach.heic", "image/heic", png())],
        ))
        .await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(photo::Entity::find().count(&app.db).await.unwrap(), 0);
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn standard_upload_keeps_original_name() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/photos",
            Some(&token()),
            &[
                Part::Text("caption", "Golden hour"),
                Part::File("photo", "sunset.png", "image/png", png()),
            ],
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let body = json_body(res).await;
    assert!(body["image_url"].as_str().unwrap().ends_with("-sunset.png"));
    assert_eq!(body["caption"], "Golden hour");
    assert_eq!(body["title"], Value::Null);
}

#[tokio::test]
async fn photo_without_file_is_bad_request() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request("/api/photos", Some(&token()), &[Part::Text("title", "Empty")]))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(photo::Entity::find().count(&app.db).await.unwrap(), 0);
}

#[tokio::test]
async fn unreadable_raw_fails_without_a_row() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/photos",
            Some(&token()),
            &[Part::File("photo", "broken.nef", "application/octet-stream", vec![7u8; 4096])],
        ))
        .await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(res).await;
    assert_eq!(body["error"], "Failed to process uploaded file");
    assert_eq!(photo::Entity::find().count(&app.db).await.unwrap(), 0);
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn reading_a_photo_is_idempotent() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/photos",
            Some(&token()),
            &[Part::File("photo", "still.png", "image/png", png())],
        ))
        .await;
    let id = json_body(res).await["id"].as_i64().unwrap();

    let first = body_bytes(app.send(get(&format!("/api/photos/{id}"))).await).await;
    let second = body_bytes(app.send(get(&format!("/api/photos/{id}"))).await).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn photo_update_and_listing() {
    let app = TestApp::new().await;
    for name in ["a.png", "b.png"] {
        app.send(multipart_request(
            "/api/photos",
            Some(&token()),
            &[Part::Text("title", name), Part::File("photo", name, "image/png", png())],
        ))
        .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let list = json_body(app.send(get("/api/photos")).await).await;
    assert_eq!(list[0]["title"], "b.png");
    assert_eq!(list[1]["title"], "a.png");

    let id = list[1]["id"].as_i64().unwrap();
    let res = app
        .send(json_request("PUT", &format!("/api/photos/{id}"), Some(&token()), json!({"caption": "edited"})))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["title"], "a.png");
    assert_eq!(body["caption"], "edited");
    assert_eq!(body["created_at"], list[1]["created_at"]);
}

#[tokio::test]
async fn deleting_a_photo_removes_its_file() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/photos",
            Some(&token()),
            &[Part::File("photo", "gone.png", "image/png", png())],
        ))
        .await;
    let id = json_body(res).await["id"].as_i64().unwrap();
    assert_eq!(app.stored_files().len(), 1);

    let res = app.send(delete(&format!("/api/photos/{id}"), &token())).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(app.stored_files().is_empty());

    let res = app.send(get(&format!("/api/photos/{id}"))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_photo_tolerates_missing_file() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/photos",
            Some(&token()),
            &[Part::File("photo", "vanish.png", "image/png", png())],
        ))
        .await;
    let id = json_body(res).await["id"].as_i64().unwrap();
    for name in app.stored_files() {
        std::fs::remove_file(app.uploads.join(name)).unwrap();
    }

    let res = app.send(delete(&format!("/api/photos/{id}"), &token())).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(photo::Entity::find().count(&app.db).await.unwrap(), 0);
}

#[tokio::test]
async fn client_logs_accept_any_object() {
    let app = TestApp::new().await;

    let res = app
        .send(json_request(
            "POST",
            "/api/client-logs",
            None,
            json!({"level": "error", "message": "boom", "stack": "at x"}),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = app
        .send(json_request("POST", "/api/client-logs", None, json!({"unexpected": 1})))
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = app
        .send(json_request("POST", "/api/client-logs", None, json!(["not", "an", "object"])))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/client-logs")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let res = app.send(get("/api-docs/openapi.json")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let doc = json_body(res).await;
    assert!(doc["paths"]["/api/projects"].is_object());
}

#[tokio::test]
async fn uploaded_media_is_served() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/photos",
            Some(&token()),
            &[Part::File("photo", "served.png", "image/png", png())],
        ))
        .await;
    let body = json_body(res).await;
    let path = body["image_url"]
        .as_str()
        .unwrap()
        .strip_prefix(BASE_URL)
        .unwrap()
        .to_string();

    let res = app.send(get(&path)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_bytes(res).await, png());
}

#[tokio::test]
async fn failed_conversion_discards_earlier_files_and_rows() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request(
            "/api/projects",
            Some(&token()),
            &[
                Part::Text("title", "Half broken"),
                Part::File("images", "fine.png", "image/png", png()),
                Part::File("images", "broken.nef", "application/octet-stream", vec![3u8; 2048]),
            ],
        ))
        .await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(res).await["error"].is_string());

    assert_eq!(project::Entity::find().count(&app.db).await.unwrap(), 0);
    assert_eq!(project_image::Entity::find().count(&app.db).await.unwrap(), 0);
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn failed_attachment_insert_rolls_back_the_project() {
    let app = TestApp::new().await;
    app.db
        .execute_unprepared("DROP TABLE project_images")
        .await
        .unwrap();

    let res = app
        .send(multipart_request(
            "/api/projects",
            Some(&token()),
            &[
                Part::Text("title", "Orphaned"),
                Part::File("images", "cover.png", "image/png", png()),
                Part::File("images", "detail.heic", "image/heic", png()),
            ],
        ))
        .await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(project::Entity::find().count(&app.db).await.unwrap(), 0);
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn login_without_secret_is_a_json_bad_request() {
    let app = TestApp::new().await;
    let res = app
        .send(json_request("POST", "/api/admin/login", None, json!({})))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(res).await["error"].is_string());
}

#[tokio::test]
async fn non_numeric_id_is_a_json_bad_request() {
    let app = TestApp::new().await;
    for uri in ["/api/projects/abc", "/api/blogs/abc", "/api/photos/abc"] {
        let res = app.send(get(uri)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert!(json_body(res).await["error"].is_string(), "{uri}");
    }

    let res = app
        .send(json_request("PUT", "/api/blogs/abc", Some(&token()), json!({"title": "x"})))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(res).await["error"].is_string());
}

#[tokio::test]
async fn create_requires_a_multipart_body() {
    let app = TestApp::new().await;
    for uri in ["/api/projects", "/api/blogs", "/api/photos"] {
        let res = app
            .send(json_request("POST", uri, Some(&token()), json!({"title": "json"})))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert!(json_body(res).await["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn malformed_update_body_is_a_json_bad_request() {
    let app = TestApp::new().await;
    let res = app
        .send(multipart_request("/api/projects", Some(&token()), &[Part::Text("title", "Target")]))
        .await;
    let id = json_body(res).await["id"].as_i64().unwrap();

    let res = app
        .send(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/projects/{id}"))
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", token()))
                .body(Body::from("{\"title\": 42"))
                .unwrap(),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(res).await["error"].is_string());
}
