use super::AppState;
use crate::ports::engine::TranscodeEngine;
use crate::ports::storage::ArtifactStore;
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
    response::Html,
    BoxError, Json,
};
use futures::{Stream, TryStreamExt};
use regex::Regex;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::{fs::File, io::BufWriter};
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const VIDEO_FIELD: &str = "video";
pub const TRANSCRIPT_FIELD: &str = "transcript";

static UNSAFE_FILE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid file name pattern"));

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAccepted {
    pub message: String,
    pub job_id: Uuid,
}

type HandlerError = (StatusCode, String);

// Accepts a multipart form with a `video` file and a `transcript` text field,
// saves the video and hands both to the job runner.
pub async fn handle<E, S>(
    State(state): State<AppState<E, S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadAccepted>, HandlerError>
where
    E: TranscodeEngine + 'static,
    S: ArtifactStore + 'static,
{
    let mut video: Option<PathBuf> = None;
    let mut transcript = String::new();

    let result = read_fields(&state, &mut multipart, &mut video, &mut transcript).await;
    if let Err(e) = result {
        if let Some(path) = &video {
            discard(path).await;
        }
        return Err(e);
    }

    let Some(video) = video else {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("missing `{}` file field", VIDEO_FIELD),
        ));
    };

    let job = state.runner.submit(video, transcript);
    Ok(Json(UploadAccepted {
        message: "Upload successful, processing started".to_string(),
        job_id: job.id(),
    }))
}

async fn read_fields<E, S>(
    state: &AppState<E, S>,
    multipart: &mut Multipart,
    video: &mut Option<PathBuf>,
    transcript: &mut String,
) -> Result<(), HandlerError>
where
    E: TranscodeEngine + 'static,
    S: ArtifactStore + 'static,
{
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            VIDEO_FIELD => {
                if video.is_some() {
                    return Err((
                        StatusCode::BAD_REQUEST,
                        "only one video may be uploaded at a time".to_owned(),
                    ));
                }
                let Some(file_name) = field.file_name().map(sanitize_file_name) else {
                    return Err((
                        StatusCode::BAD_REQUEST,
                        format!("`{}` must be a file", VIDEO_FIELD),
                    ));
                };

                let path = state
                    .runner
                    .store()
                    .upload_dir()
                    .join(format!("{}-{}", Uuid::new_v4(), file_name));
                info!(path = ?path, "saving upload");
                if let Err(e) = stream_to_file(&path, field).await {
                    discard(&path).await;
                    return Err(e);
                }
                *video = Some(path);
            }
            TRANSCRIPT_FIELD => {
                *transcript = field.text().await.map_err(|e| (e.status(), e.body_text()))?;
            }
            other => debug!(field = other, "ignoring multipart field"),
        }
    }
    Ok(())
}

// Save a `Stream` to a file
async fn stream_to_file<S, E>(path: &Path, stream: S) -> Result<(), HandlerError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    async {
        let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
        let body_reader = StreamReader::new(body_with_io_error);
        futures::pin_mut!(body_reader);

        let mut file = BufWriter::new(File::create(path).await?);
        tokio::io::copy(&mut body_reader, &mut file).await?;

        Ok::<_, io::Error>(())
    }
    .await
    .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = ?path, error = %e, "failed to discard rejected upload");
        }
    }
}

/// Reduce a client supplied file name to a safe single path component.
fn sanitize_file_name(raw: &str) -> String {
    let cleaned = UNSAFE_FILE_NAME_CHARS.replace_all(raw.trim(), "_");
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.into_owned()
    }
}

pub async fn form<E, S>(State(state): State<AppState<E, S>>) -> Html<String>
where
    E: TranscodeEngine + 'static,
    S: ArtifactStore + 'static,
{
    let output_dir = state.runner.store().output_dir().to_path_buf();
    let files = match tokio::fs::read_dir(&output_dir).await {
        Ok(mut entries) => {
            let mut names = Vec::new();
            while let Ok(Some(entry)) = entries.next_entry().await {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
            names.sort();
            names
        }
        Err(_) => Vec::new(),
    };

    let file_list = files
        .iter()
        .map(|file| {
            format!(
                r#"<li><a href="{}/{}">{}</a></li>"#,
                crate::config::PROCESSED_ROUTE,
                file,
                file
            )
        })
        .collect::<String>();

    Html(format!(
        r#"
        <!doctype html>
        <html>
            <head>
                <title>Burn subtitles into a video</title>
            </head>
            <body>
                <h1>Processed videos:</h1>
                <ul>{}</ul>
                <form id="upload" action="/upload" method="post" enctype="multipart/form-data">
                    <div>
                        <label>
                            Video:
                            <input type="file" name="{}" accept="video/*">
                        </label>
                    </div>
                    <div>
                        <label>
                            Transcript:
                            <textarea name="{}" rows="8" cols="60"></textarea>
                        </label>
                    </div>
                    <div>
                        <input type="submit" value="Upload">
                    </div>
                </form>
                <pre id="events"></pre>
                <script>
                    const log = document.getElementById("events");
                    const ws = new WebSocket(`ws://${{location.host}}/ws`);
                    ws.onmessage = (msg) => {{ log.textContent += msg.data + "\n"; }};

                    // Stay on the page so the socket keeps receiving this job's events.
                    const form = document.getElementById("upload");
                    form.addEventListener("submit", async (e) => {{
                        e.preventDefault();
                        const response = await fetch(form.action, {{ method: "POST", body: new FormData(form) }});
                        log.textContent += (await response.text()) + "\n";
                    }});
                </script>
            </body>
        </html>
        "#,
        file_list, VIDEO_FIELD, TRANSCRIPT_FIELD
    ))
}
