use crate::domain::entities::InstanceId;
use crate::domain::errors::BlobStoreError;
use crate::domain::signature::{BlobHandle, SignatureImage};
use crate::ports::outbound::BlobStore;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Public path prefix of every handle issued by `FileBlobStore`.
pub const HANDLE_PREFIX: &str = "/data/signatures/";

const SIGNATURE_DIR: &str = "signatures";

/// Stores signature images as files under `<root>/signatures/`.
///
/// File names are `sig_<instance>_<millis>_<nonce>.<ext>`; the nonce keeps
/// concurrent attempts on the same instance from overwriting each other.
/// Handles are `/data/signatures/<file>`.
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Create the store, creating `<root>/signatures/` if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, BlobStoreError> {
        let dir = root.as_ref().join(SIGNATURE_DIR);
        std::fs::create_dir_all(&dir).map_err(io_error)?;
        Ok(Self { dir })
    }

    /// Resolve a handle to its file, rejecting anything this store did not issue.
    pub fn resolve(&self, handle: &BlobHandle) -> Result<PathBuf, BlobStoreError> {
        let foreign = || BlobStoreError::ForeignHandle {
            handle: handle.to_string(),
        };
        let name = handle.as_str().strip_prefix(HANDLE_PREFIX).ok_or_else(foreign)?;
        if !name.starts_with("sig_") || name.contains('/') || name.contains("..") {
            return Err(foreign());
        }
        Ok(self.dir.join(name))
    }
}

fn io_error(e: std::io::Error) -> BlobStoreError {
    BlobStoreError::IOError {
        message: e.to_string(),
    }
}

fn unix_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

impl BlobStore for FileBlobStore {
    fn put(
        &self,
        instance: InstanceId,
        image: &SignatureImage,
    ) -> Result<BlobHandle, BlobStoreError> {
        let nonce = Uuid::new_v4().simple().to_string();
        let name = format!(
            "sig_{}_{}_{}.{}",
            instance,
            unix_millis(),
            &nonce[..8],
            image.format.extension()
        );
        let path = self.dir.join(&name);

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(io_error)?;
        if let Err(e) = file.write_all(&image.bytes).and_then(|_| file.sync_all()) {
            let _ = std::fs::remove_file(&path);
            return Err(io_error(e));
        }

        tracing::debug!(instance = %instance, file = %name, "[redemption] signature stored");
        Ok(BlobHandle::new(format!("{}{}", HANDLE_PREFIX, name)))
    }

    fn remove(&self, handle: &BlobHandle) -> Result<(), BlobStoreError> {
        let path = self.resolve(handle)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }

    fn exists(&self, handle: &BlobHandle) -> Result<bool, BlobStoreError> {
        Ok(self.resolve(handle)?.is_file())
    }
}
