use std::collections::HashMap;

use cairn_types::{BlobRef, SizedBlobRef};
use serde::{Deserialize, Serialize};

use crate::endpoint::params;
use crate::error::{ProtocolError, ProtocolResult};

pub const PROTOCOL_VERSION: u32 = 1;

/// Largest upload a client is told it may send (2 GiB - 1).
pub const MAX_UPLOAD_SIZE: u64 = 2_147_483_647;

/// How long an upload URL handed out by preupload stays valid.
pub const UPLOAD_URL_EXPIRATION_SECS: u64 = 86_400;

/// Query string of `get` and `check`.
///
/// The ref is kept as raw text so a malformed value surfaces as a protocol
/// error rather than a framework rejection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlobRefQuery {
    pub blob_ref: Option<String>,
}

impl BlobRefQuery {
    pub fn blob_ref(&self) -> ProtocolResult<BlobRef> {
        let raw = self
            .blob_ref
            .as_deref()
            .ok_or(ProtocolError::MissingField(params::BLOB_REF))?;
        parse_ref(params::BLOB_REF, raw)
    }
}

/// Query string of `list`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListQuery {
    pub after_blob_ref: Option<String>,
    pub limit: Option<usize>,
}

impl ListQuery {
    /// The exclusive cursor, if one was given. An empty value means none.
    pub fn after(&self) -> ProtocolResult<Option<BlobRef>> {
        match self.after_blob_ref.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => parse_ref(params::AFTER_BLOB_REF, raw).map(Some),
        }
    }

    /// Requested page size, clamped to `1..=max`.
    pub fn page_size(&self, max: usize) -> usize {
        self.limit.unwrap_or(max).clamp(1, max.max(1))
    }
}

fn parse_ref(key: &str, raw: &str) -> ProtocolResult<BlobRef> {
    BlobRef::parse(raw).map_err(|source| ProtocolError::InvalidRef {
        key: key.to_string(),
        source,
    })
}

/// Body of `put` and `upload`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub received: Vec<SizedBlobRef>,
    /// Form parts that were not named by a blob ref.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

/// Body of `check`: the ref when present, empty otherwise.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub blob_refs: Vec<BlobRef>,
}

impl CheckResponse {
    pub fn present(blob_ref: BlobRef) -> Self {
        Self {
            blob_refs: vec![blob_ref],
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }
}

/// Body of `list`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub blob_refs: Vec<BlobRef>,
    /// Set when the page is full; pass it back as `after_blob_ref`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_after: Option<BlobRef>,
}

impl ListResponse {
    pub fn from_page(page: Vec<SizedBlobRef>, page_size: usize) -> Self {
        let full = !page.is_empty() && page.len() >= page_size;
        let blob_refs: Vec<BlobRef> = page.into_iter().map(|s| s.blob_ref).collect();
        let continue_after = if full { blob_refs.last().cloned() } else { None };
        Self {
            blob_refs,
            continue_after,
        }
    }
}

/// Parsed `preupload` form: `camliversion` plus `blob1`..`blobN`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreUploadRequest {
    pub version: String,
    pub blob_refs: Vec<BlobRef>,
}

impl PreUploadRequest {
    /// Read refs from `blob1` upward, stopping at the first missing or empty key.
    pub fn from_form(form: &HashMap<String, String>) -> ProtocolResult<Self> {
        let version = form
            .get(params::CAMLI_VERSION)
            .filter(|v| !v.is_empty())
            .ok_or(ProtocolError::MissingField(params::CAMLI_VERSION))?
            .clone();

        let mut blob_refs = Vec::new();
        for n in 1.. {
            let key = format!("{}{n}", params::PREUPLOAD_BLOB_PREFIX);
            match form.get(&key).map(String::as_str) {
                None | Some("") => break,
                Some(raw) => blob_refs.push(parse_ref(&key, raw)?),
            }
        }
        Ok(Self { version, blob_refs })
    }
}

/// Body of `preupload`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreUploadResponse {
    pub already_have: Vec<SizedBlobRef>,
    pub max_upload_size: u64,
    pub upload_url: String,
    pub upload_url_expiration_seconds: u64,
}

/// Body of any 4xx/5xx response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const REF: &str = "sha1-aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn blob_ref_query_requires_value() {
        let q = BlobRefQuery::default();
        assert_eq!(q.blob_ref(), Err(ProtocolError::MissingField("blob_ref")));

        let q = BlobRefQuery {
            blob_ref: Some("nonsense".into()),
        };
        assert!(matches!(q.blob_ref(), Err(ProtocolError::InvalidRef { .. })));

        let q = BlobRefQuery {
            blob_ref: Some(REF.into()),
        };
        assert_eq!(q.blob_ref().unwrap().to_string(), REF);
    }

    #[test]
    fn list_query_cursor_and_limit() {
        let q = ListQuery::default();
        assert_eq!(q.after().unwrap(), None);
        assert_eq!(q.page_size(1000), 1000);

        let q = ListQuery {
            after_blob_ref: Some(String::new()),
            limit: Some(5000),
        };
        assert_eq!(q.after().unwrap(), None);
        assert_eq!(q.page_size(1000), 1000);

        let q = ListQuery {
            after_blob_ref: Some("sha1-xyz".into()),
            limit: Some(0),
        };
        assert!(q.after().is_err());
        assert_eq!(q.page_size(1000), 1);
    }

    #[test]
    fn list_response_sets_cursor_only_when_full() {
        let r = BlobRef::parse(REF).unwrap();
        let page = vec![SizedBlobRef::new(r.clone(), 5)];

        let partial = ListResponse::from_page(page.clone(), 10);
        assert_eq!(partial.continue_after, None);

        let full = ListResponse::from_page(page, 1);
        assert_eq!(full.continue_after, Some(r));

        let empty = ListResponse::from_page(Vec::new(), 1);
        assert!(empty.blob_refs.is_empty());
        assert_eq!(empty.continue_after, None);
    }

    #[test]
    fn check_response_json() {
        let present = CheckResponse::present(BlobRef::parse(REF).unwrap());
        assert_eq!(
            serde_json::to_string(&present).unwrap(),
            format!(r#"{{"blobRefs":["{REF}"]}}"#)
        );
        assert_eq!(
            serde_json::to_string(&CheckResponse::absent()).unwrap(),
            r#"{"blobRefs":[]}"#
        );
    }

    #[test]
    fn preupload_form_reads_until_gap() {
        let f = form(&[
            ("camliversion", "1"),
            ("blob1", REF),
            ("blob2", "sha1-0000000000000000000000000000000000000000"),
            ("blob4", REF),
        ]);
        let req = PreUploadRequest::from_form(&f).unwrap();
        assert_eq!(req.version, "1");
        assert_eq!(req.blob_refs.len(), 2);
    }

    #[test]
    fn preupload_requires_version() {
        let f = form(&[("blob1", REF)]);
        assert_eq!(
            PreUploadRequest::from_form(&f),
            Err(ProtocolError::MissingField("camliversion"))
        );
    }

    #[test]
    fn preupload_rejects_bogus_ref() {
        let f = form(&[("camliversion", "1"), ("blob1", "bogus")]);
        match PreUploadRequest::from_form(&f) {
            Err(ProtocolError::InvalidRef { key, .. }) => assert_eq!(key, "blob1"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn preupload_response_json_keys() {
        let resp = PreUploadResponse {
            already_have: vec![],
            max_upload_size: MAX_UPLOAD_SIZE,
            upload_url: "/upload".into(),
            upload_url_expiration_seconds: UPLOAD_URL_EXPIRATION_SECS,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["maxUploadSize"], 2_147_483_647u64);
        assert_eq!(json["uploadUrlExpirationSeconds"], 86_400);
        assert!(json["alreadyHave"].as_array().unwrap().is_empty());
    }

    #[test]
    fn upload_response_omits_empty_skipped() {
        let json = serde_json::to_string(&UploadResponse::default()).unwrap();
        assert_eq!(json, r#"{"received":[]}"#);
    }
}
