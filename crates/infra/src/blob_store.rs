//! Image blobs referenced by movement records.
//!
//! Uploads arrive as base64 data URLs (`data:image/png;base64,...`). The
//! ledger only keeps the generated name; bytes live in a `BlobStore`,
//! partitioned by tenant.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use stockroom_core::TenantId;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("invalid image data: {0}")]
    InvalidData(String),

    #[error("image exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("blob not found")]
    NotFound,

    #[error("blob storage failure: {0}")]
    Io(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Webp => "webp",
        }
    }

    fn from_content_type(ct: &str) -> Option<Self> {
        match ct.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }
}

/// A decoded upload, ready to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub kind: ImageKind,
    pub bytes: Vec<u8>,
}

/// Decode a `data:<type>;base64,<payload>` URL.
pub fn decode_data_url(data_url: &str, max_bytes: usize) -> Result<ImageUpload, BlobStoreError> {
    let (header, payload) = data_url
        .trim()
        .split_once(',')
        .ok_or_else(|| BlobStoreError::InvalidData("expected a data URL".to_string()))?;

    let media = header
        .strip_prefix("data:")
        .and_then(|h| h.strip_suffix(";base64"))
        .ok_or_else(|| BlobStoreError::InvalidData("expected a base64 data URL".to_string()))?;
    let kind = ImageKind::from_content_type(media)
        .ok_or_else(|| BlobStoreError::InvalidData(format!("unsupported image type '{media}'")))?;

    // Rough pre-check so an oversized payload is not decoded at all.
    if payload.len() / 4 * 3 > max_bytes + 3 {
        return Err(BlobStoreError::TooLarge { limit: max_bytes });
    }
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| BlobStoreError::InvalidData(format!("base64: {e}")))?;
    if bytes.is_empty() {
        return Err(BlobStoreError::InvalidData("image is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(BlobStoreError::TooLarge { limit: max_bytes });
    }

    Ok(ImageUpload { kind, bytes })
}

/// A stored blob as served back to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// `<millis>_<uuid>.<ext>`
fn generate_name(kind: ImageKind) -> String {
    format!("{}_{}.{}", Utc::now().timestamp_millis(), Uuid::now_v7().simple(), kind.extension())
}

/// Parse a name produced by `generate_name`; anything else is unknown.
fn parse_name(name: &str) -> Result<ImageKind, BlobStoreError> {
    let (stem, ext) = name.rsplit_once('.').ok_or(BlobStoreError::NotFound)?;
    let (millis, id) = stem.split_once('_').ok_or(BlobStoreError::NotFound)?;
    let well_formed = !millis.is_empty()
        && millis.bytes().all(|b| b.is_ascii_digit())
        && !id.is_empty()
        && id.bytes().all(|b| b.is_ascii_hexdigit());
    if !well_formed {
        return Err(BlobStoreError::NotFound);
    }
    ImageKind::from_extension(ext).ok_or(BlobStoreError::NotFound)
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store an image and return its generated name.
    async fn put(&self, tenant_id: TenantId, upload: ImageUpload) -> Result<String, BlobStoreError>;

    async fn get(&self, tenant_id: TenantId, name: &str) -> Result<StoredBlob, BlobStoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<(TenantId, String), Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, tenant_id: TenantId, upload: ImageUpload) -> Result<String, BlobStoreError> {
        let name = generate_name(upload.kind);
        self.blobs
            .write()
            .map_err(|_| BlobStoreError::Io("blob map poisoned".to_string()))?
            .insert((tenant_id, name.clone()), upload.bytes);
        Ok(name)
    }

    async fn get(&self, tenant_id: TenantId, name: &str) -> Result<StoredBlob, BlobStoreError> {
        let kind = parse_name(name)?;
        let blobs = self
            .blobs
            .read()
            .map_err(|_| BlobStoreError::Io("blob map poisoned".to_string()))?;
        let bytes = blobs
            .get(&(tenant_id, name.to_string()))
            .cloned()
            .ok_or(BlobStoreError::NotFound)?;
        Ok(StoredBlob { content_type: kind.content_type(), bytes })
    }
}

/// Blobs as files under `<root>/<tenant_id>/<name>`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn tenant_dir(&self, tenant_id: TenantId) -> PathBuf {
        self.root.join(tenant_id.to_string())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    #[tracing::instrument(skip(self, upload), fields(tenant_id = %tenant_id, size = upload.bytes.len()), err)]
    async fn put(&self, tenant_id: TenantId, upload: ImageUpload) -> Result<String, BlobStoreError> {
        let dir = self.tenant_dir(tenant_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| BlobStoreError::Io(e.to_string()))?;

        let name = generate_name(upload.kind);
        tokio::fs::write(dir.join(&name), &upload.bytes)
            .await
            .map_err(|e| BlobStoreError::Io(e.to_string()))?;
        Ok(name)
    }

    async fn get(&self, tenant_id: TenantId, name: &str) -> Result<StoredBlob, BlobStoreError> {
        // Validated names cannot escape the tenant directory.
        let kind = parse_name(name)?;
        match tokio::fs::read(self.tenant_dir(tenant_id).join(name)).await {
            Ok(bytes) => Ok(StoredBlob { content_type: kind.content_type(), bytes }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobStoreError::NotFound),
            Err(e) => Err(BlobStoreError::Io(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_url(bytes: &[u8]) -> String {
        format!("data:image/png;base64,{}", BASE64.encode(bytes))
    }

    #[test]
    fn decodes_supported_data_urls_only() {
        let upload = decode_data_url(&png_url(b"\x89PNG...."), 1024).unwrap();
        assert_eq!(upload.kind, ImageKind::Png);
        assert_eq!(upload.bytes, b"\x89PNG....");

        assert!(matches!(
            decode_data_url("data:image/gif;base64,R0lG", 1024),
            Err(BlobStoreError::InvalidData(_))
        ));
        assert!(matches!(decode_data_url("not a url", 1024), Err(BlobStoreError::InvalidData(_))));
        assert!(matches!(
            decode_data_url(&png_url(&[7u8; 64]), 16),
            Err(BlobStoreError::TooLarge { limit: 16 })
        ));
    }

    #[test]
    fn foreign_names_are_unknown() {
        assert_eq!(parse_name(&generate_name(ImageKind::Webp)).unwrap(), ImageKind::Webp);
        assert!(parse_name("../etc/passwd").is_err());
        assert!(parse_name("123_abc.exe").is_err());
        assert!(parse_name("123_../x.png").is_err());
    }

    #[tokio::test]
    async fn in_memory_blobs_are_tenant_scoped() {
        let store = InMemoryBlobStore::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        let upload = decode_data_url(&png_url(b"img"), 1024).unwrap();

        let name = store.put(a, upload).await.unwrap();
        let blob = store.get(a, &name).await.unwrap();
        assert_eq!(blob.content_type, "image/png");
        assert_eq!(blob.bytes, b"img");
        assert!(matches!(store.get(b, &name).await, Err(BlobStoreError::NotFound)));
    }

    #[tokio::test]
    async fn fs_store_round_trips_through_disk() {
        let root = std::env::temp_dir().join(format!("stockroom-blobs-{}", Uuid::now_v7().simple()));
        let store = FsBlobStore::new(&root);
        let t = TenantId::new();

        let name = store
            .put(t, ImageUpload { kind: ImageKind::Jpeg, bytes: vec![0xff, 0xd8, 0xff] })
            .await
            .unwrap();
        assert!(name.ends_with(".jpg"));
        assert_eq!(store.get(t, &name).await.unwrap().bytes, vec![0xff, 0xd8, 0xff]);
        assert!(matches!(store.get(TenantId::new(), &name).await, Err(BlobStoreError::NotFound)));

        let _ = std::fs::remove_dir_all(root);
    }
}
