#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Liveness greeting", body = String, content_type = "text/plain")
    ),
    tag = "General"
)]
pub async fn root() -> &'static str {
    "Hello from the portfolio backend server!"
}
