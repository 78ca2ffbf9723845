use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;

use actix_multipart::{Field, Multipart};
use actix_web::body::SizedStream;
use actix_web::http::header;
use actix_web::web::Data;
use actix_web::{delete, get, post, web, HttpResponse};
use futures::TryStreamExt;
use object_store::{Manifest, ObjectId, ObjectStore};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::ObjectErr;

pub const APP_TYPE_JSON: &str = "application/json";

/// Objects never change once stored, so clients may cache them indefinitely.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Extensions accepted for the primary asset of an upload.
pub const ALLOWED_MODEL_FORMATS: [&str; 6] = ["glb", "gltf", "obj", "fbx", "stl", "blend"];

const OCTET_STREAM: &str = "application/octet-stream";
const DEFAULT_THUMBNAIL_TYPE: &str = "image/jpeg";
const THUMBNAIL_KEY: &str = "isThumbnail";

pub struct AppState {
    pub(crate) store: ObjectStore,
}

/// Name and type of an incoming multipart file, checked before any byte is stored.
#[derive(Debug, Validate)]
struct UploadDescriptor {
    #[validate(length(min = 1, max = 255))]
    name: String,
    #[validate(length(min = 1, max = 255))]
    content_type: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct StoredObject {
    id: String,
    url: String,
    name: String,
    length: u64,
    content_type: String,
    sha256: String,
}

impl From<&Manifest> for StoredObject {
    fn from(manifest: &Manifest) -> Self {
        Self {
            id: manifest.id.to_string(),
            url: file_url(&manifest.id),
            name: manifest.name.clone(),
            length: manifest.length,
            content_type: manifest.content_type.clone(),
            sha256: manifest.sha256.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    #[serde(flatten)]
    file: StoredObject,
    /// Upper-cased file extension, e.g. `GLB`
    format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thumbnail: Option<StoredObject>,
}

#[derive(Serialize, Deserialize, Debug)]
struct DeleteResponse {
    id: String,
    deleted: bool,
}

#[derive(Serialize, Deserialize)]
struct Health {
    status: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(upload)
        .service(download)
        .service(manifest)
        .service(delete_file)
        .service(health);
}

fn file_url(id: &ObjectId) -> String {
    format!("/api/files/{}", id)
}

fn parse_object_id(raw: &str) -> Result<ObjectId, ObjectErr> {
    raw.parse().map_err(|_| ObjectErr::UnknownId(raw.to_string()))
}

/// Lower-cased extension of a filename, if it has one.
fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn model_content_type(ext: &str) -> &'static str {
    match ext {
        "glb" => "model/gltf-binary",
        "gltf" => "model/gltf+json",
        "obj" => "model/obj",
        "stl" => "model/stl",
        _ => OCTET_STREAM,
    }
}

fn declared_content_type(field: &Field) -> Option<String> {
    field.content_type().map(|mime| mime.essence_str().to_string())
}

fn field_filename(field: &Field) -> Result<String, ObjectErr> {
    field
        .content_disposition()
        .get_filename()
        .map(str::to_string)
        .ok_or_else(|| ObjectErr::Invalid(format!("Field {} carries no filename", field.name())))
}

/// Streams one multipart part into the store under `descriptor`.
///
/// A broken part (truncated body, missing boundary, client gone) surfaces from
/// the store as an I/O failure of its source. The multipart error behind it is
/// kept aside so the client gets the 400 it caused, not a 500.
async fn store_part(
    store: &ObjectStore,
    descriptor: &UploadDescriptor,
    extra: BTreeMap<String, String>,
    field: Field,
) -> Result<Manifest, ObjectErr> {
    let payload_error = RefCell::new(None);
    let body = field.map_err(|e| {
        let message = e.to_string();
        payload_error.borrow_mut().get_or_insert(e);
        io::Error::new(io::ErrorKind::Other, message)
    });

    let stored = store
        .store(&descriptor.name, &descriptor.content_type, extra, body)
        .await;
    stored.map_err(|e| match payload_error.into_inner() {
        Some(cause) => ObjectErr::Multipart(cause),
        None => ObjectErr::Store(e),
    })
}

async fn store_model(field: Field, store: &ObjectStore) -> Result<(Manifest, String), ObjectErr> {
    let name = field_filename(&field)?;
    let ext = extension(&name)
        .filter(|ext| ALLOWED_MODEL_FORMATS.contains(&ext.as_str()))
        .ok_or_else(|| {
            ObjectErr::Invalid(format!(
                "Invalid file format. Allowed formats: {}",
                ALLOWED_MODEL_FORMATS.join(", ")
            ))
        })?;

    // browsers label most model formats as octet-stream, the extension says more
    let content_type = declared_content_type(&field)
        .filter(|declared| declared != OCTET_STREAM)
        .unwrap_or_else(|| model_content_type(&ext).to_string());

    let descriptor = UploadDescriptor { name, content_type };
    descriptor.validate()?;

    let manifest = store_part(store, &descriptor, BTreeMap::new(), field).await?;
    Ok((manifest, ext.to_ascii_uppercase()))
}

/// Stores a thumbnail part. An empty part is treated as absent.
async fn store_thumbnail(field: Field, store: &ObjectStore) -> Result<Option<Manifest>, ObjectErr> {
    let name = field_filename(&field)?;
    let content_type = declared_content_type(&field)
        .filter(|declared| declared != OCTET_STREAM)
        .unwrap_or_else(|| DEFAULT_THUMBNAIL_TYPE.to_string());
    if !content_type.starts_with("image/") {
        return Err(ObjectErr::Invalid("Thumbnail must be an image".to_string()));
    }

    let descriptor = UploadDescriptor { name, content_type };
    descriptor.validate()?;

    let extra = BTreeMap::from([(THUMBNAIL_KEY.to_string(), "true".to_string())]);
    let manifest = store_part(store, &descriptor, extra, field).await?;

    if manifest.length == 0 {
        store.delete(&manifest.id).await?;
        return Ok(None);
    }
    Ok(Some(manifest))
}

async fn receive_upload(
    payload: &mut Multipart,
    store: &ObjectStore,
    stored: &mut Vec<ObjectId>,
) -> Result<UploadResponse, ObjectErr> {
    let mut file: Option<(Manifest, String)> = None;
    let mut thumbnail: Option<Manifest> = None;

    while let Some(mut field) = payload.try_next().await? {
        let field_name = field.name().to_string();
        match field_name.as_str() {
            "file" if file.is_none() => {
                let (manifest, format) = store_model(field, store).await?;
                stored.push(manifest.id);
                file = Some((manifest, format));
            }
            "thumbnail" if thumbnail.is_none() => {
                if let Some(manifest) = store_thumbnail(field, store).await? {
                    stored.push(manifest.id);
                    thumbnail = Some(manifest);
                }
            }
            _ => {
                tracing::debug!("skipping multipart field {}", field_name);
                while field.try_next().await?.is_some() {}
            }
        }
    }

    let Some((file, format)) = file else {
        return Err(ObjectErr::Invalid("No file provided".to_string()));
    };
    Ok(UploadResponse {
        file: StoredObject::from(&file),
        format,
        thumbnail: thumbnail.as_ref().map(StoredObject::from),
    })
}

#[post("/api/upload")]
async fn upload(
    mut payload: Multipart,
    shared_state: Data<AppState>,
) -> Result<HttpResponse, ObjectErr> {
    let store = &shared_state.store;
    let mut stored = Vec::new();

    match receive_upload(&mut payload, store, &mut stored).await {
        Ok(resp) => {
            tracing::info!("uploaded {} ({} bytes) as {}", resp.file.name, resp.file.length, resp.file.id);
            Ok(HttpResponse::Ok().content_type(APP_TYPE_JSON).json(resp))
        }
        Err(e) => {
            // roll back the parts of this request that did make it in
            for id in stored {
                if let Err(cleanup) = store.delete(&id).await {
                    tracing::warn!("could not roll back object {}: {}", id, cleanup);
                }
            }
            Err(e)
        }
    }
}

#[get("/api/files/{id}")]
async fn download(
    id: web::Path<String>,
    shared_state: Data<AppState>,
) -> Result<HttpResponse, ObjectErr> {
    let id = parse_object_id(&id)?;
    let (manifest, body) = shared_state.store.fetch(&id)?;

    let body = body.inspect_err(move |e| tracing::error!("aborting download of {}: {}", id, e));
    Ok(HttpResponse::Ok()
        .content_type(manifest.content_type.as_str())
        .insert_header((header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL))
        .insert_header((header::ETAG, format!("\"{}\"", manifest.sha256)))
        .body(SizedStream::new(manifest.length, body)))
}

#[get("/api/files/{id}/manifest")]
async fn manifest(
    id: web::Path<String>,
    shared_state: Data<AppState>,
) -> Result<HttpResponse, ObjectErr> {
    let id = parse_object_id(&id)?;
    let manifest = shared_state.store.stat(&id)?;
    Ok(HttpResponse::Ok().content_type(APP_TYPE_JSON).json(&*manifest))
}

#[delete("/api/files/{id}")]
async fn delete_file(
    id: web::Path<String>,
    shared_state: Data<AppState>,
) -> Result<HttpResponse, ObjectErr> {
    // an id that does not parse names nothing, which is already deleted
    if let Ok(object) = id.parse::<ObjectId>() {
        shared_state.store.delete(&object).await?;
    }
    Ok(HttpResponse::Ok()
        .content_type(APP_TYPE_JSON)
        .json(DeleteResponse { id: id.into_inner(), deleted: true }))
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(APP_TYPE_JSON)
        .json(Health { status: "ok".to_string() })
}
