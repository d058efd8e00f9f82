//! HTTP handlers for uploading, listing, fetching and deleting images.
//! Multipart files are streamed to the upload directory as they arrive and
//! everything else is delegated to `GatewayService`.

use crate::{
    errors::AppError,
    models::{
        envelope::Envelope,
        image::ImageQuery,
        upload::{FileMeta, NO_FIELDS, UploadForm},
    },
    services::{
        gateway_service::{GatewayError, GatewayResult, GatewayService},
        staging::{self, UploadPolicy},
    },
};
use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::QueryRejection,
    },
};
use serde::Deserialize;
use tracing::debug;

/// `?id=` accepted by fetch and delete.
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

/// POST `/api/upload`: up to five images plus name, email and password.
pub async fn upload_images(
    State(service): State<GatewayService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope>, AppError> {
    // A body that is not multipart carries no form fields at all.
    let multipart = multipart.map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "upload body is not multipart");
        AppError::bad_request(NO_FIELDS)
    })?;
    let form = read_form(&service.policy, multipart).await?;
    let profile = service.upload(form).await?;
    Ok(Json(
        Envelope::ok("Images uploaded successfully").with_data(profile),
    ))
}

/// GET `/api/fetch/all`: every image in the namespace.
pub async fn list_images(
    State(service): State<GatewayService>,
) -> Result<Json<Envelope>, AppError> {
    let images = service.list_images().await?;
    Ok(Json(
        Envelope::ok("Images successfully fetched").with_images(images),
    ))
}

/// GET `/api/fetch?id=<public id>`
pub async fn fetch_image(
    State(service): State<GatewayService>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<Json<Envelope>, AppError> {
    let Query(q) = query.map_err(bad_query)?;
    let image = service.get_image(q.id.map(ImageQuery::PublicId)).await?;
    Ok(Json(Envelope::ok("Image successfully fetched").with_image(image)))
}

/// GET `/api/fetch/{id}`, where `id` is looked up inside the namespace.
pub async fn fetch_image_by_path(
    State(service): State<GatewayService>,
    Path(id): Path<String>,
) -> Result<Json<Envelope>, AppError> {
    let image = service.get_image(Some(ImageQuery::InNamespace(id))).await?;
    Ok(Json(Envelope::ok("Image successfully fetched").with_image(image)))
}

/// DELETE `/api/delete/all`. Irreversible, no confirmation.
pub async fn delete_all_images(
    State(service): State<GatewayService>,
) -> Result<Json<Envelope>, AppError> {
    service.delete_all().await?;
    Ok(Json(Envelope::ok("Images successfully deleted")))
}

/// DELETE `/api/delete?id=<public id>`
pub async fn delete_image(
    State(service): State<GatewayService>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> Result<Json<Envelope>, AppError> {
    let Query(q) = query.map_err(bad_query)?;
    service.delete_image(q.id.map(ImageQuery::PublicId)).await?;
    Ok(Json(Envelope::ok("Image successfully deleted")))
}

/// DELETE `/api/delete/{id}`
pub async fn delete_image_by_path(
    State(service): State<GatewayService>,
    Path(id): Path<String>,
) -> Result<Json<Envelope>, AppError> {
    service
        .delete_image(Some(ImageQuery::InNamespace(id)))
        .await?;
    Ok(Json(Envelope::ok("Image successfully deleted")))
}

/// Parse the multipart body, staging files as they arrive. Anything staged
/// before a parse error is removed again.
async fn read_form(policy: &UploadPolicy, mut multipart: Multipart) -> GatewayResult<UploadForm> {
    let mut form = UploadForm::default();
    match collect_parts(policy, &mut multipart, &mut form).await {
        Ok(()) => Ok(form),
        Err(err) => {
            staging::discard(&form.files).await;
            Err(err)
        }
    }
}

async fn collect_parts(
    policy: &UploadPolicy,
    multipart: &mut Multipart,
    form: &mut UploadForm,
) -> GatewayResult<()> {
    let mut file_parts = 0usize;
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();

        if field.file_name().is_none() {
            let value = field.text().await.map_err(malformed)?;
            form.add_field(name, value);
            continue;
        }

        if name != policy.file_field {
            return Err(GatewayError::Validation(format!(
                "Unexpected field `{}`",
                name
            )));
        }
        file_parts += 1;
        if file_parts > policy.max_files {
            return Err(GatewayError::Validation(format!(
                "Too many files: at most {} allowed",
                policy.max_files
            )));
        }

        let meta = FileMeta {
            field: name,
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
        };
        match policy.stage(meta, field).await? {
            Some(staged) => form.files.push(staged),
            None => form.rejected += 1,
        }
    }
    debug!(
        fields = form.fields.len(),
        files = form.files.len(),
        rejected = form.rejected,
        "parsed upload form"
    );
    Ok(())
}

fn bad_query(rejection: QueryRejection) -> AppError {
    AppError::bad_request(rejection.body_text())
}

fn malformed(err: MultipartError) -> GatewayError {
    GatewayError::Validation(err.body_text())
}
