use std::collections::HashMap;

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::Form;
use cairn_protocol::{
    endpoints, params, BlobRefQuery, CheckResponse, HealthResponse, ListQuery, ListResponse,
    PreUploadRequest, PreUploadResponse, ProtocolError, UploadResponse,
    UPLOAD_URL_EXPIRATION_SECS,
};
use cairn_store::BlobReceiver;
use cairn_types::{BlobRef, HashAlgorithm, SizedBlobRef};

use crate::error::ServerResult;
use crate::state::AppState;

/// Root banner.
pub async fn root_handler(State(state): State<AppState>) -> &'static str {
    if state.config.stealth {
        "Hi.\n"
    } else {
        "This is cairn, a content-addressed blob server.\n"
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// `put`: a multipart form carrying `file` and the `blob_ref` it claims to be.
///
/// The file part is streamed into the store as it arrives. When `blob_ref`
/// comes first its algorithm hashes the chunks on the way in; otherwise the
/// staged bytes are hashed once the claim is known.
pub async fn put_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ServerResult<Json<UploadResponse>> {
    let mut staged: Option<Box<dyn BlobReceiver>> = None;
    let mut claimed: Option<String> = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(params::FILE) => {
                let algorithm = claimed
                    .as_deref()
                    .and_then(|c| BlobRef::parse(c.trim()).ok())
                    .map(|r| r.algorithm());
                staged = Some(stream_field(&state, field, algorithm).await?);
            }
            Some(params::BLOB_REF) => claimed = Some(field.text().await?),
            _ => {}
        }
    }

    let claimed = claimed.ok_or(ProtocolError::MissingField(params::BLOB_REF))?;
    let blob_ref = BlobRef::parse(claimed.trim()).map_err(|source| ProtocolError::InvalidRef {
        key: params::BLOB_REF.to_string(),
        source,
    })?;
    let staged = staged.ok_or(ProtocolError::MissingField(params::FILE))?;

    let sized = commit_blob(staged, blob_ref).await?;
    Ok(Json(UploadResponse {
        received: vec![sized],
        skipped: Vec::new(),
    }))
}

/// `get`: the raw bytes of a stored blob.
pub async fn get_handler(
    State(state): State<AppState>,
    Query(query): Query<BlobRefQuery>,
) -> ServerResult<Response> {
    let blob_ref = query.blob_ref()?;
    tracing::debug!(%blob_ref, "get");
    let data = state.with_store(move |store| store.get(&blob_ref)).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        data,
    )
        .into_response())
}

/// `check`: 200 with the ref if stored, 404 with an empty list otherwise.
pub async fn check_handler(
    State(state): State<AppState>,
    Query(query): Query<BlobRefQuery>,
) -> ServerResult<(StatusCode, Json<CheckResponse>)> {
    let blob_ref = query.blob_ref()?;
    let found = state.with_store(move |store| store.check(&blob_ref)).await?;
    Ok(match found {
        Some(sized) => (StatusCode::OK, Json(CheckResponse::present(sized.blob_ref))),
        None => (StatusCode::NOT_FOUND, Json(CheckResponse::absent())),
    })
}

/// `list`: one page of refs in ascending order after the optional cursor.
pub async fn list_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ServerResult<Json<ListResponse>> {
    let after = query.after()?;
    let page_size = query.page_size(state.config.list_limit);
    let page = state
        .with_store(move |store| store.list(after.as_ref(), page_size))
        .await?;
    Ok(Json(ListResponse::from_page(page, page_size)))
}

/// `preupload`: which of the offered refs are already stored, and where to upload the rest.
pub async fn preupload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> ServerResult<Json<PreUploadResponse>> {
    let request = PreUploadRequest::from_form(&form)?;
    let offered = request.blob_refs.len();
    let already_have = state
        .with_store(move |store| store.stat_many(&request.blob_refs))
        .await?;
    tracing::debug!(offered, have = already_have.len(), "preupload");

    let upload_url = match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) if !host.is_empty() => format!("http://{host}{}", endpoints::UPLOAD),
        _ => endpoints::UPLOAD.to_string(),
    };
    Ok(Json(PreUploadResponse {
        already_have,
        max_upload_size: state.config.max_upload_size,
        upload_url,
        upload_url_expiration_seconds: UPLOAD_URL_EXPIRATION_SECS,
    }))
}

/// `upload`: multipart body whose part names are the refs of their contents.
///
/// Parts not named by a ref are skipped. A part that fails verification
/// aborts the request; parts stored before it stay stored.
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ServerResult<Json<UploadResponse>> {
    let mut response = UploadResponse::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let Ok(blob_ref) = BlobRef::parse(&name) else {
            tracing::debug!(form_name = %name, "ignoring form part");
            response.skipped.push(name);
            continue;
        };
        let staged = stream_field(&state, field, Some(blob_ref.algorithm())).await?;
        response.received.push(commit_blob(staged, blob_ref).await?);
    }
    Ok(Json(response))
}

/// Copy a form part into a fresh store receiver, one chunk at a time.
async fn stream_field(
    state: &AppState,
    mut field: Field<'_>,
    algorithm: Option<HashAlgorithm>,
) -> ServerResult<Box<dyn BlobReceiver>> {
    let mut receiver = state.with_store(move |store| store.receive(algorithm)).await?;
    while let Some(chunk) = field.chunk().await? {
        receiver = AppState::blocking(move || {
            receiver.write_chunk(&chunk)?;
            Ok(receiver)
        })
        .await?;
    }
    Ok(receiver)
}

async fn commit_blob(staged: Box<dyn BlobReceiver>, blob_ref: BlobRef) -> ServerResult<SizedBlobRef> {
    let claimed = blob_ref.clone();
    let result = AppState::blocking(move || staged.commit(&blob_ref)).await;
    match &result {
        Ok(sized) => tracing::info!(blob_ref = %sized.blob_ref, size = sized.size, "received blob"),
        Err(e) => tracing::warn!(blob_ref = %claimed, error = %e, "rejected blob"),
    }
    result
}
