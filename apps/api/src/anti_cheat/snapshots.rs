//! Proctoring snapshot decoding and upload to S3.

use aws_sdk_s3::primitives::ByteStream;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::info;
use uuid::Uuid;

use super::MAX_SNAPSHOT_BYTES;
use crate::errors::AppError;

#[derive(Debug, PartialEq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub extension: &'static str,
}

/// Accepts either a bare base64 string (assumed JPEG) or a `data:image/...;base64,` URL.
pub fn decode_image(input: &str) -> Result<DecodedImage, AppError> {
    let input = input.trim();
    let (content_type, payload) = match input.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| AppError::Validation("image data URL is malformed".to_string()))?;
            let mime = meta
                .strip_suffix(";base64")
                .ok_or_else(|| AppError::Validation("image data URL must be base64".to_string()))?;
            (mime.to_lowercase(), data)
        }
        None => ("image/jpeg".to_string(), input),
    };

    let extension = match content_type.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        other => {
            return Err(AppError::Validation(format!(
                "unsupported image type '{other}'"
            )))
        }
    };

    // Size check before decoding: base64 is 4/3 of the raw size.
    if payload.len() / 4 * 3 > MAX_SNAPSHOT_BYTES + 3 {
        return Err(too_large());
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| AppError::Validation("image is not valid base64".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("image cannot be empty".to_string()));
    }
    if bytes.len() > MAX_SNAPSHOT_BYTES {
        return Err(too_large());
    }

    Ok(DecodedImage {
        bytes,
        content_type,
        extension,
    })
}

fn too_large() -> AppError {
    AppError::PayloadTooLarge(format!(
        "snapshot exceeds {} bytes",
        MAX_SNAPSHOT_BYTES
    ))
}

pub fn snapshot_key(session_id: Uuid, extension: &str) -> String {
    format!("zuri/snapshots/{session_id}/{}.{extension}", Uuid::new_v4())
}

/// Uploads a snapshot and returns its object key.
pub async fn upload_snapshot(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    session_id: Uuid,
    image: DecodedImage,
) -> Result<String, AppError> {
    let key = snapshot_key(session_id, image.extension);
    let size = image.bytes.len();

    s3.put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(image.bytes))
        .content_type(image.content_type)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("snapshot upload failed: {e}")))?;

    info!("Uploaded proctoring snapshot ({size} bytes) to s3://{bucket}/{key}");
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_base64_is_jpeg() {
        let img = decode_image(&STANDARD.encode(b"\xff\xd8\xff")).unwrap();
        assert_eq!(img.content_type, "image/jpeg");
        assert_eq!(img.extension, "jpg");
        assert_eq!(img.bytes, b"\xff\xd8\xff");
    }

    #[test]
    fn test_data_url() {
        let url = format!("data:image/PNG;base64,{}", STANDARD.encode(b"png-bytes"));
        let img = decode_image(&url).unwrap();
        assert_eq!(img.content_type, "image/png");
        assert_eq!(img.extension, "png");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(decode_image("!!!"), Err(AppError::Validation(_))));
        assert!(matches!(decode_image(""), Err(AppError::Validation(_))));
        assert!(matches!(
            decode_image("data:image/gif;base64,R0lG"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            decode_image("data:image/png,rawdata"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_image() {
        let big = STANDARD.encode(vec![0u8; MAX_SNAPSHOT_BYTES + 1024]);
        assert!(matches!(decode_image(&big), Err(AppError::PayloadTooLarge(_))));
    }

    #[test]
    fn test_snapshot_key_layout() {
        let id = Uuid::new_v4();
        let key = snapshot_key(id, "jpg");
        assert!(key.starts_with(&format!("zuri/snapshots/{id}/")));
        assert!(key.ends_with(".jpg"));
    }
}
