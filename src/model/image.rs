use crate::Result;
use anyhow::{bail, ensure, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt::{Debug, Formatter};
use std::path::Path;

/// An image that can be embedded into a rendered receipt, e.g. the school logo or the signature.
#[derive(Clone, Eq, PartialEq)]
pub struct ImageRef {
    mime_type: String,
    data: Vec<u8>,
}

impl ImageRef {
    /// Creates an image from raw bytes.
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Decodes a base64 payload, as returned by the image-generation service.
    pub fn from_base64(mime_type: impl Into<String>, payload: &str) -> Result<Self> {
        let data = STANDARD
            .decode(payload.trim())
            .context("Image payload is not valid base64")?;
        ensure!(!data.is_empty(), "Image payload is empty");
        Ok(Self::new(mime_type, data))
    }

    /// Reads an image file from disk. The MIME type is guessed from the file extension and must be
    /// an `image/*` type.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let mime = mime_guess::from_path(path)
            .first()
            .with_context(|| format!("Unable to determine the image type of {}", path.display()))?;
        if mime.type_() != mime_guess::mime::IMAGE {
            bail!("{} is not an image file ({mime})", path.display());
        }
        let data = crate::utils::read_bytes(path).await?;
        ensure!(!data.is_empty(), "The image file {} is empty", path.display());
        Ok(Self::new(mime.essence_str(), data))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The image as a `data:` URI that can be used as an `href`.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            STANDARD.encode(&self.data)
        )
    }
}

impl Debug for ImageRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRef")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri() {
        let image = ImageRef::new("image/png", vec![1, 2, 3]);
        assert_eq!(image.to_data_uri(), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_from_base64() {
        let image = ImageRef::from_base64("image/png", " AQID ").unwrap();
        assert_eq!(image.data(), &[1, 2, 3]);
        assert!(ImageRef::from_base64("image/png", "***").is_err());
        assert!(ImageRef::from_base64("image/png", "").is_err());
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let logo = dir.path().join("logo.png");
        crate::utils::write(&logo, [9u8, 8, 7]).await.unwrap();
        let image = ImageRef::from_file(&logo).await.unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.data(), &[9, 8, 7]);
    }

    #[tokio::test]
    async fn test_from_file_rejects_non_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let notes = dir.path().join("notes.txt");
        crate::utils::write(&notes, "hello").await.unwrap();
        assert!(ImageRef::from_file(&notes).await.is_err());
    }
}
