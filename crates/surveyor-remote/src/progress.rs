//! Upload bodies with progress
//!
//! The file is handed to the HTTP body as a stream of fixed-size chunks.
//! Each chunk pulled by the connection advances the progress counter, so
//! progress tracks the bytes of the file and nothing else.

use bytes::Bytes;
use futures::stream;
use reqwest::multipart::Part;
use reqwest::Body;
use surveyor_core::{BackendError, ProgressSender};
use surveyor_types::{ImageUpload, UploadProgress};

const CHUNK_SIZE: usize = 64 * 1024;

pub(crate) fn chunks(bytes: &Bytes) -> Vec<Bytes> {
    (0..bytes.len())
        .step_by(CHUNK_SIZE)
        .map(|start| bytes.slice(start..(start + CHUNK_SIZE).min(bytes.len())))
        .collect()
}

/// Request body for a file, reporting progress if a sender is given
pub(crate) fn file_body(file: &ImageUpload, progress: Option<ProgressSender>) -> Body {
    let Some(progress) = progress else {
        return Body::from(file.bytes.clone());
    };
    let total = file.len();
    progress.send_replace(UploadProgress { sent: 0, total });
    let mut sent = 0u64;
    Body::wrap_stream(stream::iter(chunks(&file.bytes).into_iter().map(
        move |chunk| {
            sent += chunk.len() as u64;
            progress.send_replace(UploadProgress { sent, total });
            Ok::<_, std::io::Error>(chunk)
        },
    )))
}

/// Multipart file part for an image
pub(crate) fn image_part(
    image: &ImageUpload,
    progress: Option<ProgressSender>,
) -> Result<Part, BackendError> {
    Part::stream_with_length(file_body(image, progress), image.len())
        .file_name(image.file_name.clone())
        .mime_str(&image.content_type)
        .map_err(|e| BackendError::InvalidRequest(format!("content type: {e}")))
}
