//! Defines routes for the upload gateway.
//!
//! ## Structure
//! - **Form**
//!   - `GET    /api` — static upload form
//!
//! - **Images**
//!   - `POST   /api/upload` — upload up to five images plus details
//!   - `GET    /api/fetch/all` — list every image in the namespace
//!   - `GET    /api/fetch?id=` / `GET /api/fetch/{id}` — fetch one image
//!   - `DELETE /api/delete/all` — delete every image in the namespace
//!   - `DELETE /api/delete?id=` / `DELETE /api/delete/{id}` — delete one image
//!
//! The `{id}` forms address an image by name inside the namespace; `?id=`
//! takes the full public id.

use crate::{
    handlers::{
        form_handlers::upload_form,
        health_handlers::{healthz, readyz},
        image_handlers::{
            delete_all_images, delete_image, delete_image_by_path, fetch_image,
            fetch_image_by_path, list_images, upload_images,
        },
    },
    services::gateway_service::GatewayService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

/// Build and return the router for all gateway routes.
///
/// `upload_body_limit` caps the size of a whole `POST /api/upload` body.
pub fn routes(upload_body_limit: usize) -> Router<GatewayService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api", get(upload_form))
        .route(
            "/api/upload",
            post(upload_images).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/api/fetch/all", get(list_images))
        .route("/api/fetch", get(fetch_image))
        .route("/api/fetch/{id}", get(fetch_image_by_path))
        .route("/api/delete/all", delete(delete_all_images))
        .route("/api/delete", delete(delete_image))
        .route("/api/delete/{id}", delete(delete_image_by_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        gateway_service::testing::RecordingProvider, staging::UploadPolicy,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::Value;
    use std::sync::{Arc, atomic::Ordering};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "gateway-test-boundary";

    struct TestApp {
        router: Router,
        provider: Arc<RecordingProvider>,
        dir: TempDir,
    }

    fn app_with(provider: RecordingProvider) -> TestApp {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(provider);
        let policy = UploadPolicy::new(dir.path(), "profilePhotos");
        let service = GatewayService::new(provider.clone(), policy.clone(), "users", "profileImages");
        TestApp {
            router: routes(policy.body_limit()).with_state(service),
            provider,
            dir,
        }
    }

    fn app() -> TestApp {
        app_with(RecordingProvider::default())
    }

    /// (field, filename, content type, bytes)
    type FilePart<'a> = (&'a str, &'a str, &'a str, &'a [u8]);

    fn multipart(fields: &[(&str, &str)], files: &[FilePart]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (field, filename, content_type, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn details() -> Vec<(&'static str, &'static str)> {
        vec![("name", "Ada"), ("email", "a@b.com"), ("password", "x")]
    }

    fn png(name: &str) -> FilePart<'_> {
        ("profilePhotos", name, "image/png", b"\x89PNG\r\n")
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn staged_count(app: &TestApp) -> usize {
        std::fs::read_dir(app.dir.path()).unwrap().count()
    }

    #[tokio::test]
    async fn serves_the_upload_form() {
        let app = app();
        let response = app.router.clone().oneshot(request("GET", "/api")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("name=\"profilePhotos\""));
        assert!(html.contains("action=\"/api/upload\""));
    }

    #[tokio::test]
    async fn upload_fetch_delete_round_trip() {
        let app = app();
        let (status, body) = send(
            &app,
            multipart(
                &details(),
                &[
                    png("a.png"),
                    ("profilePhotos", "notes.txt", "text/plain", b"hello"),
                    png("b.png"),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Images uploaded successfully");
        assert_eq!(body["data"]["name"], "Ada");
        assert_eq!(body["data"]["email"], "a@b.com");
        assert_eq!(body["data"]["password"], "x");
        let images = body["data"]["images"].as_array().unwrap();
        assert_eq!(images.len(), 2);
        for image in images {
            assert!(image["id"].as_str().unwrap().starts_with("users/profilePhotos_"));
            assert!(!image["url"].as_str().unwrap().is_empty());
        }
        assert_eq!(staged_count(&app), 0);

        let id = images[0]["id"].as_str().unwrap().to_string();
        let url = images[0]["url"].clone();

        let (status, body) = send(&app, request("GET", &format!("/api/fetch?id={id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Image successfully fetched");
        assert_eq!(body["image"]["url"], url);

        let (status, body) = send(&app, request("DELETE", &format!("/api/delete?id={id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"success": true, "message": "Image successfully deleted"})
        );

        let (status, body) = send(&app, request("GET", &format!("/api/fetch?id={id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn path_ids_resolve_inside_the_namespace() {
        let app = app();
        let (_, body) = send(&app, multipart(&details(), &[png("a.png")])).await;
        let id = body["data"]["images"][0]["id"].as_str().unwrap().to_string();
        let name = id.trim_start_matches("users/");

        let (status, body) = send(&app, request("GET", &format!("/api/fetch/{name}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["image"]["id"], id.as_str());

        let (status, _) = send(&app, request("DELETE", &format!("/api/delete/{name}"))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, request("GET", &format!("/api/fetch/{name}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_details_never_reach_the_provider() {
        let app = app();
        let (status, body) = send(
            &app,
            multipart(&[("name", "Ada"), ("email", "a@b.com")], &[png("a.png")]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            serde_json::json!({"success": false, "message": "Please provide all the details"})
        );
        assert_eq!(app.provider.calls(), 0);
        assert_eq!(staged_count(&app), 0);
    }

    #[tokio::test]
    async fn empty_field_set_is_rejected() {
        let app = app();
        let (status, body) = send(&app, multipart(&[], &[png("a.png")])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No field values were provided");
        assert_eq!(app.provider.calls(), 0);
    }

    #[tokio::test]
    async fn non_images_alone_count_as_no_files() {
        let app = app();
        let (status, body) = send(
            &app,
            multipart(
                &details(),
                &[("profilePhotos", "cv.pdf", "application/pdf", b"%PDF")],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No files were uploaded");
        assert_eq!(app.provider.calls(), 0);
    }

    #[tokio::test]
    async fn more_than_five_files_are_rejected() {
        let app = app();
        let files: Vec<FilePart> = (0..6).map(|_| png("a.png")).collect();
        let (status, body) = send(&app, multipart(&details(), &files)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Too many files: at most 5 allowed");
        assert_eq!(app.provider.calls(), 0);
        assert_eq!(staged_count(&app), 0);
    }

    #[tokio::test]
    async fn files_under_other_fields_are_rejected() {
        let app = app();
        let (status, body) = send(
            &app,
            multipart(&details(), &[("avatar", "a.png", "image/png", b"\x89PNG")]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Unexpected field `avatar`");
    }

    #[tokio::test]
    async fn provider_failure_is_reported_once() {
        let app = app_with(RecordingProvider {
            fail_on: Some("profilePhotos".into()),
            ..Default::default()
        });
        let (status, body) = send(&app, multipart(&details(), &[png("a.png"), png("b.png")])).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body,
            serde_json::json!({
                "success": false,
                "message": "Failure uploading files to the image provider"
            })
        );
        assert_eq!(staged_count(&app), 0);
    }

    #[tokio::test]
    async fn fetch_and_delete_require_an_id() {
        let app = app();
        for (method, uri) in [("GET", "/api/fetch"), ("DELETE", "/api/delete"), ("GET", "/api/fetch?id=")] {
            let (status, body) = send(&app, request(method, uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
            assert_eq!(body["message"], "Please provide public ID of image");
        }
        assert_eq!(app.provider.calls(), 0);
    }

    #[tokio::test]
    async fn non_multipart_uploads_get_a_json_failure() {
        let app = app();
        let req = Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"Ada"}"#))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            serde_json::json!({"success": false, "message": "No field values were provided"})
        );
        assert_eq!(app.provider.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_id_queries_get_a_json_failure() {
        let app = app();
        for (method, uri) in [("GET", "/api/fetch?id=a&id=b"), ("DELETE", "/api/delete?id=a&id=b")] {
            let (status, body) = send(&app, request(method, uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
            assert_eq!(body["success"], false);
            assert!(body["message"].as_str().unwrap().contains("duplicate field"));
        }
        assert_eq!(app.provider.calls(), 0);
    }

    #[tokio::test]
    async fn list_then_delete_all() {
        let app = app();
        send(&app, multipart(&details(), &[png("a.png"), png("b.png"), png("c.png")])).await;

        let (status, body) = send(&app, request("GET", "/api/fetch/all")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Images successfully fetched");
        assert_eq!(body["images"].as_array().unwrap().len(), 3);

        let (status, body) = send(&app, request("DELETE", "/api/delete/all")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Images successfully deleted");
        assert_eq!(app.provider.bulk_deletes.load(Ordering::SeqCst), 1);

        let (_, body) = send(&app, request("GET", "/api/fetch/all")).await;
        assert!(body["images"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn health_endpoints() {
        let app = app();
        let (status, body) = send(&app, request("GET", "/healthz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, request("GET", "/readyz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["disk"]["ok"], true);
        assert_eq!(body["checks"]["recording"]["ok"], true);
        assert_eq!(staged_count(&app), 0);
    }
}
