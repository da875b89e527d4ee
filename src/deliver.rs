//! Matrix delivery of the rendered audio digest
//!
//! Optional stage: sends the MP3 artifact as a direct message over the
//! Matrix client-server API. Three calls in sequence: create a direct room
//! inviting the target user, upload the file to the media repository, and
//! send an `m.audio` message referencing the uploaded content.

use std::path::Path;

use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::config::MatrixConfig;
use crate::errors::{AppError, AppResult};

/// Send the audio file as a Matrix direct message
///
/// # Errors
///
/// - `Io` if the audio file cannot be read
/// - `Delivery` for any failed API call or unexpected response shape
pub async fn send_audio(matrix: &MatrixConfig, audio_path: &Path) -> AppResult<()> {
    let bytes = tokio::fs::read(audio_path).await?;
    let filename = audio_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "speech.mp3".to_owned());

    let client = Client::new();
    let room_id = create_direct_room(&client, matrix).await?;
    info!(room_id = %room_id, target = %matrix.target_user, "created direct room");

    let content_uri = upload_content(&client, matrix, &filename, bytes.clone()).await?;
    info!(content_uri = %content_uri, "uploaded audio to media repository");

    send_audio_message(&client, matrix, &room_id, &content_uri, &filename, bytes.len()).await
}

/// Create a direct room inviting the target user
async fn create_direct_room(client: &Client, matrix: &MatrixConfig) -> AppResult<String> {
    let response = client
        .post(format!(
            "{}/_matrix/client/v3/createRoom",
            matrix.homeserver
        ))
        .bearer_auth(matrix.access_token.expose_secret())
        .json(&json!({
            "invite": [matrix.target_user],
            "is_direct": true
        }))
        .send()
        .await
        .map_err(|e| AppError::Delivery(format!("createRoom request failed: {e}")))?;

    let body = read_json(response, "createRoom").await?;
    body.get("room_id")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .ok_or_else(|| AppError::Delivery("createRoom response missing room_id".to_owned()))
}

/// Upload the audio bytes to the media repository, returning the `mxc://` URI
async fn upload_content(
    client: &Client,
    matrix: &MatrixConfig,
    filename: &str,
    bytes: Vec<u8>,
) -> AppResult<String> {
    let response = client
        .post(format!("{}/_matrix/media/v3/upload", matrix.homeserver))
        .query(&[("filename", filename)])
        .bearer_auth(matrix.access_token.expose_secret())
        .header("Content-Type", "audio/mpeg")
        .body(bytes)
        .send()
        .await
        .map_err(|e| AppError::Delivery(format!("media upload failed: {e}")))?;

    let body = read_json(response, "media upload").await?;
    body.get("content_uri")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .ok_or_else(|| AppError::Delivery("upload response missing content_uri".to_owned()))
}

/// Send the `m.audio` message into the room
async fn send_audio_message(
    client: &Client,
    matrix: &MatrixConfig,
    room_id: &str,
    content_uri: &str,
    filename: &str,
    size_bytes: usize,
) -> AppResult<()> {
    let txn_id = Uuid::new_v4();
    let response = client
        .put(format!(
            "{}/_matrix/client/v3/rooms/{room_id}/send/m.room.message/{txn_id}",
            matrix.homeserver
        ))
        .bearer_auth(matrix.access_token.expose_secret())
        .json(&json!({
            "msgtype": "m.audio",
            "body": filename,
            "url": content_uri,
            "info": {
                "mimetype": "audio/mpeg",
                "size": size_bytes
            }
        }))
        .send()
        .await
        .map_err(|e| AppError::Delivery(format!("send message failed: {e}")))?;

    read_json(response, "send message").await?;
    Ok(())
}

/// Check status and parse a JSON response body
async fn read_json(response: reqwest::Response, call: &str) -> AppResult<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Delivery(format!(
            "{call} returned {status}: {body}"
        )));
    }
    response
        .json()
        .await
        .map_err(|e| AppError::Delivery(format!("{call} returned malformed JSON: {e}")))
}
