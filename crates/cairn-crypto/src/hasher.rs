use cairn_types::{BlobRef, HashAlgorithm};
use sha2::Digest;

enum State {
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

/// Incremental digest over a blob's bytes.
///
/// The algorithm is fixed at construction, normally taken from the ref a
/// client claims for the blob. Feed the body with [`update`](Self::update)
/// as it arrives, then [`finalize`](Self::finalize) to get the ref the bytes
/// actually hash to, or [`verify`](Self::verify) against the claimed one.
pub struct BlobHasher {
    algorithm: HashAlgorithm,
    state: State,
    written: u64,
}

impl BlobHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Sha1 => State::Sha1(sha1::Sha1::new()),
            HashAlgorithm::Sha256 => State::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Blake3 => State::Blake3(Box::new(blake3::Hasher::new())),
        };
        Self {
            algorithm,
            state,
            written: 0,
        }
    }

    /// Hasher for the algorithm a ref names.
    pub fn for_ref(blob_ref: &BlobRef) -> Self {
        Self::new(blob_ref.algorithm())
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            State::Sha1(h) => h.update(data),
            State::Sha256(h) => h.update(data),
            State::Blake3(h) => {
                h.update(data);
            }
        }
        self.written += data.len() as u64;
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Bytes fed so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// The ref of everything fed so far.
    pub fn finalize(self) -> BlobRef {
        let digest: Vec<u8> = match self.state {
            State::Sha1(h) => h.finalize().to_vec(),
            State::Sha256(h) => h.finalize().to_vec(),
            State::Blake3(h) => h.finalize().as_bytes().to_vec(),
        };
        BlobRef::from_digest(self.algorithm, &digest)
            .expect("digest length always matches its algorithm")
    }

    /// Finish and compare against `claimed`. Returns the byte count on match.
    pub fn verify(self, claimed: &BlobRef) -> Result<u64, DigestMismatch> {
        let written = self.written;
        let computed = self.finalize();
        if &computed == claimed {
            Ok(written)
        } else {
            Err(DigestMismatch {
                claimed: claimed.clone(),
                computed,
            })
        }
    }

    /// One-shot digest of `data`.
    pub fn digest(algorithm: HashAlgorithm, data: &[u8]) -> BlobRef {
        let mut hasher = Self::new(algorithm);
        hasher.update(data);
        hasher.finalize()
    }

    /// One-shot check that `data` hashes to `claimed`.
    pub fn verify_bytes(claimed: &BlobRef, data: &[u8]) -> Result<(), DigestMismatch> {
        let mut hasher = Self::for_ref(claimed);
        hasher.update(data);
        hasher.verify(claimed).map(|_| ())
    }
}

/// The bytes submitted for a ref hash to something else.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("digest mismatch: claimed {claimed}, computed {computed}")]
pub struct DigestMismatch {
    pub claimed: BlobRef,
    pub computed: BlobRef,
}
