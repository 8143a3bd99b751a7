use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RefError;

/// Digest algorithm named by the prefix of a [`BlobRef`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    /// Every supported algorithm.
    pub const ALL: [HashAlgorithm; 3] = [Self::Sha1, Self::Sha256, Self::Blake3];

    /// The identifier used in the textual ref form.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    /// Raw digest size in bytes.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 | Self::Blake3 => 32,
        }
    }

    /// Length of the lowercase hex digest in a ref.
    pub const fn hex_len(self) -> usize {
        self.digest_len() * 2
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name() == s)
            .ok_or_else(|| RefError::UnknownAlgorithm(s.to_string()))
    }
}

/// Content-addressed name of a blob: `<algorithm>-<hexdigest>`.
///
/// A `BlobRef` is always well formed: the algorithm is known and the digest
/// is lowercase hex of exactly that algorithm's output size. Equality and
/// ordering follow the textual form, so a sorted set of refs is also sorted
/// as strings.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobRef {
    algorithm: HashAlgorithm,
    digest: String,
}

impl BlobRef {
    /// Parse the textual form `<algorithm>-<hexdigest>`.
    pub fn parse(s: &str) -> Result<Self, RefError> {
        let malformed = || RefError::Malformed(s.to_string());
        let (name, digest) = s.split_once('-').ok_or_else(malformed)?;
        if name.is_empty()
            || !name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        {
            return Err(malformed());
        }
        if digest.is_empty() || !digest.bytes().all(is_lower_hex) {
            return Err(malformed());
        }
        let algorithm: HashAlgorithm = name.parse()?;
        Self::new(algorithm, digest)
    }

    /// Build a ref from an algorithm and a hex digest, validating both.
    pub fn new(algorithm: HashAlgorithm, digest: impl Into<String>) -> Result<Self, RefError> {
        let digest = digest.into();
        if !digest.bytes().all(is_lower_hex) {
            return Err(RefError::Malformed(format!("{algorithm}-{digest}")));
        }
        if digest.len() != algorithm.hex_len() {
            return Err(RefError::InvalidDigestLength {
                algorithm: algorithm.name().to_string(),
                expected: algorithm.hex_len(),
                actual: digest.len(),
            });
        }
        Ok(Self { algorithm, digest })
    }

    /// Build a ref from raw digest bytes.
    pub fn from_digest(algorithm: HashAlgorithm, digest: &[u8]) -> Result<Self, RefError> {
        Self::new(algorithm, hex::encode(digest))
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The lowercase hex digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    fn text_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.algorithm
            .name()
            .bytes()
            .chain(std::iter::once(b'-'))
            .chain(self.digest.bytes())
    }
}

fn is_lower_hex(b: u8) -> bool {
    b.is_ascii_digit() || (b'a'..=b'f').contains(&b)
}

impl Ord for BlobRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text_bytes().cmp(other.text_bytes())
    }
}

impl PartialOrd for BlobRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.algorithm.name(), self.digest)
    }
}

impl fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobRef({self})")
    }
}

impl FromStr for BlobRef {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BlobRef {
    type Error = RefError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<BlobRef> for String {
    fn from(r: BlobRef) -> Self {
        r.to_string()
    }
}

/// A blob ref together with the size of the stored blob in bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizedBlobRef {
    pub blob_ref: BlobRef,
    pub size: u64,
}

impl SizedBlobRef {
    pub fn new(blob_ref: BlobRef, size: u64) -> Self {
        Self { blob_ref, size }
    }
}
