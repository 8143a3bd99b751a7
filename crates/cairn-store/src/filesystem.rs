use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use cairn_crypto::BlobHasher;
use cairn_types::{BlobRef, HashAlgorithm, SizedBlobRef};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobReceiver, BlobStore};

const BLOB_EXTENSION: &str = ".dat";
const READ_CHUNK: usize = 64 * 1024;

/// Blob store rooted at a directory on local disk.
///
/// Each blob lives at `<root>/<d[0..3]>/<d[3..6]>/<algorithm>-<digest>.dat`
/// where `d` is the hex digest. Writes land in a temp file at the root and
/// are renamed into place once verified and synced, so readers only ever
/// see complete, verified blobs.
#[derive(Clone, Debug)]
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    /// Open an existing storage root.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::NotADirectory(root));
        }
        Ok(Self { root })
    }

    /// Create the storage root (and parents) if needed, then open it.
    pub fn create(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Self::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn shard_dir(&self, blob_ref: &BlobRef) -> PathBuf {
        let digest = blob_ref.digest();
        self.root.join(&digest[0..3]).join(&digest[3..6])
    }

    /// Where the blob for `blob_ref` is (or would be) stored.
    pub fn blob_path(&self, blob_ref: &BlobRef) -> PathBuf {
        self.shard_dir(blob_ref)
            .join(format!("{blob_ref}{BLOB_EXTENSION}"))
    }

    fn stat(&self, blob_ref: &BlobRef) -> StoreResult<Option<u64>> {
        match fs::metadata(self.blob_path(blob_ref)) {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl FilesystemBlobStore {
    /// Temp file at the root. `list` only looks three levels down, so
    /// staged bytes are never listed.
    fn staging_file(&self) -> io::Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix("incoming-")
            .suffix(".tmp")
            .tempfile_in(&self.root)
    }

    /// Rename verified bytes into place and check what landed there.
    fn publish(
        &self,
        blob_ref: &BlobRef,
        tmp: NamedTempFile,
        expected: u64,
    ) -> StoreResult<SizedBlobRef> {
        if self.stat(blob_ref)?.is_some() {
            tracing::debug!(%blob_ref, "blob already stored");
            return Ok(SizedBlobRef::new(blob_ref.clone(), expected));
        }
        tmp.as_file().sync_all()?;
        fs::create_dir_all(self.shard_dir(blob_ref))?;
        let path = self.blob_path(blob_ref);
        tmp.persist(&path).map_err(|e| e.error)?;

        let meta = fs::symlink_metadata(&path)?;
        if !meta.is_file() || meta.len() != expected {
            return Err(StoreError::SizeMismatch {
                blob_ref: blob_ref.clone(),
                expected,
                actual: meta.len(),
            });
        }
        tracing::debug!(%blob_ref, size = expected, path = %path.display(), "blob written");
        Ok(SizedBlobRef::new(blob_ref.clone(), expected))
    }
}

struct FileReceiver {
    store: FilesystemBlobStore,
    tmp: NamedTempFile,
    hasher: Option<BlobHasher>,
    written: u64,
}

impl BlobReceiver for FileReceiver {
    fn write_chunk(&mut self, data: &[u8]) -> StoreResult<()> {
        self.tmp.write_all(data)?;
        if let Some(hasher) = &mut self.hasher {
            hasher.update(data);
        }
        self.written += data.len() as u64;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }

    fn commit(self: Box<Self>, claimed: &BlobRef) -> StoreResult<SizedBlobRef> {
        let Self {
            store,
            mut tmp,
            hasher,
            written,
        } = *self;
        match hasher {
            Some(h) if h.algorithm() == claimed.algorithm() => {
                h.verify(claimed)?;
            }
            _ => {
                // Claim arrived after the bytes: hash the staged file.
                let file = tmp.as_file_mut();
                file.seek(SeekFrom::Start(0))?;
                let mut h = BlobHasher::for_ref(claimed);
                let mut buf = vec![0u8; READ_CHUNK];
                loop {
                    let n = file.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    h.update(&buf[..n]);
                }
                h.verify(claimed)?;
            }
        }
        store.publish(claimed, tmp, written)
    }
}

fn ref_from_file_name(name: &str) -> Option<BlobRef> {
    name.strip_suffix(BLOB_EXTENSION)
        .and_then(|stem| BlobRef::parse(stem).ok())
}

impl BlobStore for FilesystemBlobStore {
    fn put(&self, blob_ref: &BlobRef, data: Bytes) -> StoreResult<SizedBlobRef> {
        BlobHasher::verify_bytes(blob_ref, &data)?;
        let expected = data.len() as u64;
        if self.stat(blob_ref)?.is_some() {
            tracing::debug!(%blob_ref, "blob already stored");
            return Ok(SizedBlobRef::new(blob_ref.clone(), expected));
        }
        let mut tmp = self.staging_file()?;
        tmp.write_all(&data)?;
        self.publish(blob_ref, tmp, expected)
    }

    fn receive(&self, algorithm: Option<HashAlgorithm>) -> StoreResult<Box<dyn BlobReceiver>> {
        Ok(Box::new(FileReceiver {
            store: self.clone(),
            tmp: self.staging_file()?,
            hasher: algorithm.map(BlobHasher::new),
            written: 0,
        }))
    }

    fn get(&self, blob_ref: &BlobRef) -> StoreResult<Bytes> {
        let data = match fs::read(self.blob_path(blob_ref)) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(blob_ref.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        BlobHasher::verify_bytes(blob_ref, &data).map_err(|e| StoreError::Corrupt {
            blob_ref: blob_ref.clone(),
            computed: e.computed,
        })?;
        Ok(Bytes::from(data))
    }

    fn check(&self, blob_ref: &BlobRef) -> StoreResult<Option<SizedBlobRef>> {
        Ok(self
            .stat(blob_ref)?
            .map(|size| SizedBlobRef::new(blob_ref.clone(), size)))
    }

    fn list(&self, after: Option<&BlobRef>, limit: usize) -> StoreResult<Vec<SizedBlobRef>> {
        let mut found = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(3).max_depth(3) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(blob_ref) = entry.file_name().to_str().and_then(ref_from_file_name) else {
                continue;
            };
            if after.is_some_and(|cursor| &blob_ref <= cursor) {
                continue;
            }
            let size = entry.metadata().map_err(io::Error::from)?.len();
            found.push(SizedBlobRef::new(blob_ref, size));
        }
        found.sort_by(|a, b| a.blob_ref.cmp(&b.blob_ref));
        found.truncate(limit);
        Ok(found)
    }
}
