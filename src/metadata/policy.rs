use serde::Serialize;

use super::MetadataRecord;
use crate::config::{MergeMode, PolicyConfig};

/// Whether an embedded payload may be stored verbatim.
///
/// Resolved once at the request boundary. Anything other than an explicit
/// opt-in is [`TrustFlag::Untrusted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustFlag {
    Trusted,
    #[default]
    Untrusted,
}

impl TrustFlag {
    /// Normalize a raw form-field value (`"on"`, `"true"`, ...) against the
    /// configured trust literals. Missing, empty, or unknown values are untrusted.
    ///
    /// ```rust
    /// use image_stamp::metadata::TrustFlag;
    ///
    /// let literals = vec!["on".to_string(), "true".to_string()];
    /// assert_eq!(TrustFlag::from_field(Some("ON"), &literals), TrustFlag::Trusted);
    /// assert_eq!(TrustFlag::from_field(Some("yes"), &literals), TrustFlag::Untrusted);
    /// assert_eq!(TrustFlag::from_field(None, &literals), TrustFlag::Untrusted);
    /// ```
    pub fn from_field(raw: Option<&str>, literals: &[String]) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return Self::Untrusted;
        };
        if literals.iter().any(|lit| lit.trim().eq_ignore_ascii_case(raw)) {
            Self::Trusted
        } else {
            Self::Untrusted
        }
    }

    pub fn is_trusted(self) -> bool {
        self == Self::Trusted
    }
}

impl From<bool> for TrustFlag {
    fn from(trusted: bool) -> Self {
        if trusted { Self::Trusted } else { Self::Untrusted }
    }
}

/// The metadata that will actually be written, plus what the policy changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedMetadata {
    record: MetadataRecord,
    redacted_keys: Vec<String>,
    payload_withheld: bool,
}

impl ResolvedMetadata {
    pub fn record(&self) -> &MetadataRecord {
        &self.record
    }

    pub fn into_record(self) -> MetadataRecord {
        self.record
    }

    /// Keys whose values were replaced by the marker, or that were dropped
    /// because the key itself matched a redaction pattern.
    pub fn redacted_keys(&self) -> &[String] {
        &self.redacted_keys
    }

    /// `true` when a payload was supplied but stored as the redaction marker
    /// because it was not trusted.
    pub fn payload_withheld(&self) -> bool {
        self.payload_withheld
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }
}

/// Combine original and user metadata, fold in the payload, and redact.
///
/// 1. Empty `user`: the result is `original`. Otherwise `original` with user
///    keys overwriting ([`MergeMode::Merge`]), or `user` alone
///    ([`MergeMode::ReplaceAll`]).
/// 2. A non-empty payload goes under `policy.payload_key`: verbatim when
///    trusted, as `policy.redaction_marker` otherwise.
/// 3. Entries whose key contains a redaction pattern (case-insensitive) are
///    dropped, and every value containing one is replaced by the marker,
///    whatever the trust flag.
///
/// # Example
///
/// ```rust
/// use image_stamp::config::PolicyConfig;
/// use image_stamp::metadata::{MetadataRecord, TrustFlag, resolve};
///
/// let original: MetadataRecord = [("Author", "A")].into_iter().collect();
/// let user: MetadataRecord = [("Author", "B"), ("Title", "T")].into_iter().collect();
///
/// let resolved = resolve(&original, &user, None, TrustFlag::Untrusted, &PolicyConfig::default());
/// assert_eq!(resolved.record().get("Author"), Some("B"));
/// assert_eq!(resolved.record().get("Title"), Some("T"));
/// ```
pub fn resolve(
    original: &MetadataRecord,
    user: &MetadataRecord,
    payload: Option<&str>,
    trust: TrustFlag,
    policy: &PolicyConfig,
) -> ResolvedMetadata {
    let mut record = match policy.merge_mode {
        _ if user.is_empty() => original.clone(),
        MergeMode::Merge => {
            let mut merged = original.clone();
            for (key, value) in user.iter() {
                merged.insert(key, value);
            }
            merged
        }
        MergeMode::ReplaceAll => user.clone(),
    };

    let mut payload_withheld = false;
    if let Some(payload) = payload.filter(|p| !p.is_empty()) {
        if trust.is_trusted() {
            record.insert(policy.payload_key.as_str(), payload);
        } else {
            log::debug!("Untrusted payload replaced by redaction marker");
            record.insert(policy.payload_key.as_str(), policy.redaction_marker.as_str());
            payload_withheld = true;
        }
    }

    let patterns: Vec<String> = policy
        .redaction_patterns
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| p.to_lowercase())
        .collect();

    let mut redacted_keys = Vec::new();
    record.retain(|key, _| {
        let lowered = key.to_lowercase();
        if key != policy.payload_key && patterns.iter().any(|p| lowered.contains(p.as_str())) {
            log::debug!("Dropped entry with disallowed key {key:?}");
            redacted_keys.push(key.to_string());
            return false;
        }
        true
    });
    for (key, value) in record.values_mut() {
        if payload_withheld && key == policy.payload_key {
            continue;
        }
        let lowered = value.to_lowercase();
        if patterns.iter().any(|p| lowered.contains(p.as_str())) {
            log::debug!("Redacted value of {key:?}");
            *value = policy.redaction_marker.clone();
            redacted_keys.push(key.to_string());
        }
    }

    ResolvedMetadata {
        record,
        redacted_keys,
        payload_withheld,
    }
}
