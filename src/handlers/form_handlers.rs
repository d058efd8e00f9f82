use axum::response::Html;

/// `GET /api` — static upload form.
pub async fn upload_form() -> Html<&'static str> {
    Html(include_str!("../../templates/form.html"))
}
