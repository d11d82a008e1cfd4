//! Image uploads and upload progress

use std::fmt;

use bytes::Bytes;

use crate::error::ValidationError;

/// Upper bound for any photo sent to the inference service
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// An image held in memory, ready to be sent as a multipart file part
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Build an upload, detecting the content type from the data and the
    /// file name
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let bytes = bytes.into();
        let content_type = sniff_content_type(&file_name, &bytes).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Type and size checks done before anything is sent
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.content_type.starts_with("image/") {
            return Err(ValidationError::NotAnImage(self.content_type.clone()));
        }
        self.validate_size()
    }

    /// Size checks alone, for attachments of any type
    pub fn validate_size(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyFile);
        }
        if self.len() > MAX_IMAGE_BYTES {
            return Err(ValidationError::TooLarge { size: self.len() });
        }
        Ok(())
    }
}

/// Content type from magic bytes, then from the extension
pub fn sniff_content_type(file_name: &str, bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return "image/png";
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return "image/webp";
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Bytes of the image part handed to the transport so far
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Rounded percentage; an empty upload counts as done
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = (self.sent.min(self.total) * 100 + self.total / 2) / self.total;
        pct as u8
    }

    pub fn is_complete(&self) -> bool {
        self.sent >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG_HEADER: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    #[test]
    fn test_sniff_by_magic_bytes_beats_extension() {
        assert_eq!(sniff_content_type("photo.png", &JPEG_HEADER), "image/jpeg");
    }

    #[test]
    fn test_sniff_by_extension() {
        assert_eq!(sniff_content_type("car.JPG", b"not really"), "image/jpeg");
        assert_eq!(sniff_content_type("notes.txt", b"hello"), "application/octet-stream");
    }

    #[test]
    fn test_validate_rejects_non_images() {
        let upload = ImageUpload::from_bytes("notes.txt", b"hello".to_vec());
        assert!(matches!(upload.validate(), Err(ValidationError::NotAnImage(_))));
    }

    #[test]
    fn test_validate_rejects_oversized() {
        let upload = ImageUpload::new(
            "big.jpg",
            "image/jpeg",
            vec![0u8; (MAX_IMAGE_BYTES + 1) as usize],
        );
        assert!(matches!(upload.validate(), Err(ValidationError::TooLarge { .. })));
    }

    #[test]
    fn test_validate_rejects_empty() {
        let upload = ImageUpload::new("empty.jpg", "image/jpeg", Vec::new());
        assert_eq!(upload.validate(), Err(ValidationError::EmptyFile));
    }

    #[test]
    fn test_validate_accepts_jpeg() {
        let upload = ImageUpload::from_bytes("car.jpg", JPEG_HEADER.to_vec());
        assert!(upload.validate().is_ok());
    }

    #[test]
    fn test_progress_percent() {
        let progress = UploadProgress { sent: 1, total: 3 };
        assert_eq!(progress.percent(), 33);
        let progress = UploadProgress { sent: 2, total: 3 };
        assert_eq!(progress.percent(), 67);
        assert_eq!(UploadProgress::default().percent(), 100);
    }
}
