use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, OutputConfig, PolicyConfig};
use crate::container::{self, ContainerKind, OutputFormat, jpeg, png};
use crate::error::{InjectError, Result};
use crate::metadata::{self, MetadataRecord, ResolvedMetadata, TrustFlag};

/// Extensions picked up by [`collect_images`].
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// A non-fatal condition the caller should surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The source image's metadata could not be read; an empty record was used.
    UnreadableOriginalMetadata { reason: String },
    /// The container is not handled; bytes were returned unchanged.
    InjectionSkipped { format: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreadableOriginalMetadata { reason } => {
                write!(f, "original metadata unreadable, continuing without it: {reason}")
            }
            Self::InjectionSkipped { format } => {
                write!(f, "metadata injection skipped for {format} output")
            }
        }
    }
}

/// Result of [`inject`].
#[derive(Debug, Clone)]
pub struct InjectionOutcome {
    pub bytes: Vec<u8>,
    pub container: ContainerKind,
    pub warnings: Vec<Warning>,
}

/// Write resolved metadata into an encoded image.
///
/// JPEG gets one COM segment before the end-of-image marker, PNG gets one
/// text chunk per entry after `IHDR`. Unsupported containers (WebP, other
/// formats, or a declared PNG without the PNG signature) come back unchanged
/// with an [`Warning::InjectionSkipped`]. An empty record also leaves the
/// bytes unchanged.
///
/// Structural failures inside an injector are errors; a partially spliced
/// buffer is never returned.
///
/// # Example
///
/// ```rust
/// use image_stamp::container::{ContainerKind, OutputFormat};
/// use image_stamp::metadata::ResolvedMetadata;
/// use image_stamp::pipeline::inject;
///
/// let webp = b"RIFF\x00\x00\x00\x00WEBPVP8 ".to_vec();
/// let outcome = inject(&webp, &OutputFormat::WebP, &ResolvedMetadata::default()).unwrap();
/// assert_eq!(outcome.bytes, webp);
/// assert_eq!(outcome.container, ContainerKind::Unsupported);
/// assert_eq!(outcome.warnings.len(), 1);
/// ```
pub fn inject(
    bytes: &[u8],
    format: &OutputFormat,
    resolved: &ResolvedMetadata,
) -> Result<InjectionOutcome> {
    let container = container::sniff(bytes, format);
    let mut warnings = Vec::new();

    let output = match container {
        ContainerKind::Unsupported => {
            let warning = Warning::InjectionSkipped {
                format: format.to_string(),
            };
            log::warn!("{warning}");
            warnings.push(warning);
            bytes.to_vec()
        }
        _ if resolved.is_empty() => {
            log::debug!("No metadata to write, returning {container} bytes unchanged");
            bytes.to_vec()
        }
        ContainerKind::Jpeg => jpeg::inject_comment(bytes, resolved.record())?,
        ContainerKind::Png => png::inject_text_chunks(bytes, resolved.record())?,
    };

    Ok(InjectionOutcome {
        bytes: output,
        container,
        warnings,
    })
}

/// The caller-controlled part of a stamping request, normalized at the boundary.
#[derive(Debug, Clone, Default)]
pub struct StampRequest {
    /// Declared output format. Inferred from the file extension when `None`.
    pub format: Option<OutputFormat>,
    /// Parsed user metadata.
    pub user: MetadataRecord,
    /// Embedded payload; empty counts as absent.
    pub payload: Option<String>,
    pub trust: TrustFlag,
}

impl StampRequest {
    /// Build a request from a raw user-metadata JSON string.
    ///
    /// Fails with [`InjectError::InvalidUserMetadataJson`] before any image
    /// bytes are touched.
    pub fn new(user_metadata: &str, payload: Option<&str>, trust: TrustFlag) -> Result<Self> {
        Ok(Self {
            format: None,
            user: MetadataRecord::from_json(user_metadata)?,
            payload: payload.map(str::to_string),
            trust,
        })
    }

    /// Build a request from raw form fields. The trust field is compared
    /// against the policy's trust literals here and nowhere else.
    pub fn from_fields(
        format: Option<&str>,
        user_metadata: Option<&str>,
        payload: Option<&str>,
        trust_field: Option<&str>,
        policy: &PolicyConfig,
    ) -> Result<Self> {
        let trust = TrustFlag::from_field(trust_field, &policy.trust_literals);
        let mut request = Self::new(user_metadata.unwrap_or_default(), payload, trust)?;
        request.format = format.map(OutputFormat::parse);
        Ok(request)
    }
}

/// Result of [`stamp`].
#[derive(Debug, Clone)]
pub struct StampOutcome {
    pub bytes: Vec<u8>,
    pub container: ContainerKind,
    pub resolved: ResolvedMetadata,
    pub warnings: Vec<Warning>,
}

/// Resolve metadata for one request and write it into `bytes`.
///
/// `original` is the outcome of reading the source image's metadata; a
/// failure there is downgraded to an empty record plus a
/// [`Warning::UnreadableOriginalMetadata`].
pub fn stamp(
    bytes: &[u8],
    format: &OutputFormat,
    original: Result<MetadataRecord>,
    request: &StampRequest,
    policy: &PolicyConfig,
) -> Result<StampOutcome> {
    let mut warnings = Vec::new();
    let original = original.unwrap_or_else(|e| {
        let warning = Warning::UnreadableOriginalMetadata {
            reason: e.to_string(),
        };
        log::warn!("{warning}");
        warnings.push(warning);
        MetadataRecord::new()
    });

    let resolved = metadata::resolve(
        &original,
        &request.user,
        request.payload.as_deref(),
        request.trust,
        policy,
    );
    let injection = inject(bytes, format, &resolved)?;
    warnings.extend(injection.warnings);

    Ok(StampOutcome {
        bytes: injection.bytes,
        container: injection.container,
        resolved,
        warnings,
    })
}

/// The result of stamping a single file.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub content_type: Option<String>,
    pub container: Option<ContainerKind>,
    pub keys_written: Vec<String>,
    pub redacted_keys: Vec<String>,
    pub payload_withheld: bool,
    pub warnings: Vec<Warning>,
    pub error: Option<String>,
    /// `true` when `error` was caused by the request rather than the image.
    pub client_error: bool,
}

impl ProcessResult {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            output_path: None,
            content_type: None,
            container: None,
            keys_written: Vec::new(),
            redacted_keys: Vec::new(),
            payload_withheld: false,
            warnings: Vec::new(),
            error: None,
            client_error: false,
        }
    }

    fn fail(mut self, err: &InjectError) -> Self {
        self.error = Some(err.to_string());
        self.client_error = err.is_client_error();
        self
    }
}

/// Collect supported image files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks).
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_image(p) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

/// Check if a file has a supported image extension.
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Where the stamped copy of `path` is written.
///
/// The input extension is kept when it already names `format`.
pub fn output_path(path: &Path, format: &OutputFormat, output: &OutputConfig) -> PathBuf {
    let dir = match &output.out_dir {
        Some(dir) => dir.clone(),
        None => path.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if OutputFormat::parse(ext) == *format => ext.to_string(),
        _ => format.name().to_string(),
    };

    let name = if output.suffix.is_empty() {
        format!("{stem}.{ext}")
    } else {
        format!("{stem}.{}.{ext}", output.suffix)
    };
    dir.join(name)
}

/// Stamp a single image file.
///
/// 1. **Read**: source bytes, then the source's existing metadata (non-fatal)
/// 2. **Resolve**: merge, payload gate, redaction per `config.policy`
/// 3. **Inject**: format-aware splice into the byte stream
/// 4. **Write**: to [`output_path`], unless `config.output.dry_run`
///
/// Never panics; failures are reported in [`ProcessResult::error`].
pub fn stamp_file(path: &Path, request: &StampRequest, config: &Config) -> ProcessResult {
    let mut result = ProcessResult::new(path);

    let Some(format) = request
        .format
        .clone()
        .or_else(|| OutputFormat::from_path(path))
    else {
        result.error = Some("Cannot determine output format from file name".to_string());
        return result;
    };
    result.content_type = Some(format.content_type());

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            result.error = Some(format!("Failed to read file: {e}"));
            return result;
        }
    };

    // Injected as-is: the source must already be in the declared format
    if !container::matches_signature(&bytes, &format) {
        return result.fail(&InjectError::FormatMismatch {
            declared: format.to_string(),
        });
    }

    let original = metadata::read_original(path);
    let outcome = match stamp(&bytes, &format, original, request, &config.policy) {
        Ok(outcome) => outcome,
        Err(e) => return result.fail(&e),
    };

    result.container = Some(outcome.container);
    result.warnings = outcome.warnings;
    result.redacted_keys = outcome.resolved.redacted_keys().to_vec();
    result.payload_withheld = outcome.resolved.payload_withheld();
    if outcome.container != ContainerKind::Unsupported {
        result.keys_written = outcome.resolved.record().keys().map(str::to_string).collect();
    }

    let out_path = output_path(path, &format, &config.output);
    if out_path == path {
        result.error = Some(format!(
            "Refusing to overwrite input {}; set a suffix or out_dir",
            path.display()
        ));
        return result;
    }

    if !config.output.dry_run {
        if let Err(e) = std::fs::write(&out_path, &outcome.bytes) {
            result.error = Some(format!("Failed to write {}: {e}", out_path.display()));
            return result;
        }
        log::debug!("Wrote {}", out_path.display());
    }
    result.output_path = Some(out_path);

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::PNG_SIGNATURE;
    use crate::container::checksum::chunk_crc;
    use std::fs;
    use tempfile::TempDir;

    fn raw_chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(data);
        out.extend_from_slice(&chunk_crc(kind, data).to_be_bytes());
        out
    }

    fn tiny_png() -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend(raw_chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]));
        data.extend(raw_chunk(b"IDAT", &[0x78, 0x9C, 0x62, 0x60, 0, 0, 0, 2, 0, 1]));
        data.extend(raw_chunk(b"IEND", &[]));
        data
    }

    fn tiny_jpeg() -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x11, 0x22]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    fn resolved(pairs: &[(&str, &str)]) -> ResolvedMetadata {
        let user: MetadataRecord = pairs.iter().map(|(k, v)| (*k, *v)).collect();
        metadata::resolve(
            &MetadataRecord::new(),
            &user,
            None,
            TrustFlag::Untrusted,
            &PolicyConfig::default(),
        )
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    // ── inject ───────────────────────────────────────────────────────

    #[test]
    fn inject_webp_passes_through_with_warning() {
        let webp = b"RIFF\x10\x00\x00\x00WEBPVP8 ".to_vec();
        let outcome = inject(&webp, &OutputFormat::WebP, &resolved(&[("k", "v")])).unwrap();
        assert_eq!(outcome.bytes, webp);
        assert_eq!(outcome.container, ContainerKind::Unsupported);
        assert_eq!(
            outcome.warnings,
            vec![Warning::InjectionSkipped {
                format: "webp".into()
            }]
        );
    }

    #[test]
    fn inject_png_without_signature_passes_through() {
        let bytes = tiny_jpeg();
        let outcome = inject(&bytes, &OutputFormat::Png, &resolved(&[("k", "v")])).unwrap();
        assert_eq!(outcome.bytes, bytes);
        assert_eq!(outcome.container, ContainerKind::Unsupported);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn inject_png() {
        let png = tiny_png();
        let outcome = inject(&png, &OutputFormat::Png, &resolved(&[("Title", "T")])).unwrap();
        assert_eq!(outcome.container, ContainerKind::Png);
        assert!(outcome.warnings.is_empty());
        assert!(contains(&outcome.bytes, b"tEXtTitle\0T"));
    }

    #[test]
    fn inject_jpeg() {
        let jpeg = tiny_jpeg();
        let outcome = inject(&jpeg, &OutputFormat::Jpeg, &resolved(&[("Title", "T")])).unwrap();
        assert_eq!(outcome.container, ContainerKind::Jpeg);
        assert!(contains(&outcome.bytes, b"\xFF\xFE\x00\x09Title:T\xFF\xD9"));
    }

    #[test]
    fn inject_empty_metadata_is_identity() {
        let png = tiny_png();
        let outcome = inject(&png, &OutputFormat::Png, &ResolvedMetadata::default()).unwrap();
        assert_eq!(outcome.bytes, png);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn inject_png_missing_header_fails() {
        let mut corrupt = PNG_SIGNATURE.to_vec();
        corrupt.extend_from_slice(&[0, 0, 0, 13, b'I', b'H']);
        let err = inject(&corrupt, &OutputFormat::Png, &resolved(&[("k", "v")])).unwrap_err();
        assert!(matches!(err, InjectError::MalformedContainer { .. }));
        assert!(!err.is_client_error());
    }

    // ── StampRequest / stamp ─────────────────────────────────────────

    #[test]
    fn request_rejects_bad_json() {
        let err = StampRequest::new("{bad json", None, TrustFlag::Untrusted).unwrap_err();
        assert!(matches!(err, InjectError::InvalidUserMetadataJson { .. }));
    }

    #[test]
    fn request_from_fields_normalizes_trust() {
        let policy = PolicyConfig::default();
        let trusted =
            StampRequest::from_fields(Some("PNG"), None, Some("x"), Some("on"), &policy).unwrap();
        assert_eq!(trusted.trust, TrustFlag::Trusted);
        assert_eq!(trusted.format, Some(OutputFormat::Png));

        let untrusted =
            StampRequest::from_fields(None, Some("{}"), Some("x"), Some("yes"), &policy).unwrap();
        assert_eq!(untrusted.trust, TrustFlag::Untrusted);
        assert!(untrusted.format.is_none());
    }

    #[test]
    fn stamp_merges_and_injects() {
        let request =
            StampRequest::new(r#"{"Author":"B","Title":"T"}"#, None, TrustFlag::Untrusted)
                .unwrap();
        let original: MetadataRecord = [("Author", "A")].into_iter().collect();
        let outcome = stamp(
            &tiny_png(),
            &OutputFormat::Png,
            Ok(original),
            &request,
            &PolicyConfig::default(),
        )
        .unwrap();

        let expected: MetadataRecord = [("Author", "B"), ("Title", "T")].into_iter().collect();
        assert_eq!(outcome.resolved.record(), &expected);
        assert!(contains(&outcome.bytes, b"Author\0B"));
        assert!(!contains(&outcome.bytes, b"Author\0A"));
    }

    #[test]
    fn stamp_unreadable_original_is_warning() {
        let request = StampRequest::new(r#"{"Title":"T"}"#, None, TrustFlag::Untrusted).unwrap();
        let outcome = stamp(
            &tiny_jpeg(),
            &OutputFormat::Jpeg,
            Err(InjectError::UnreadableOriginalMetadata {
                reason: "corrupt EXIF".into(),
            }),
            &request,
            &PolicyConfig::default(),
        )
        .unwrap();

        assert_eq!(outcome.container, ContainerKind::Jpeg);
        assert!(matches!(
            outcome.warnings.as_slice(),
            [Warning::UnreadableOriginalMetadata { .. }]
        ));
        assert_eq!(outcome.resolved.record().get("Title"), Some("T"));
    }

    #[test]
    fn stamp_untrusted_payload_never_in_output() {
        let payload = "<script>alert(1)</script>";
        let request = StampRequest::new("", Some(payload), TrustFlag::Untrusted).unwrap();
        for (bytes, format) in [
            (tiny_png(), OutputFormat::Png),
            (tiny_jpeg(), OutputFormat::Jpeg),
        ] {
            let outcome = stamp(
                &bytes,
                &format,
                Ok(MetadataRecord::new()),
                &request,
                &PolicyConfig::default(),
            )
            .unwrap();
            assert!(!contains(&outcome.bytes, payload.as_bytes()));
            assert!(contains(&outcome.bytes, b"[REDACTED]"));
            assert!(outcome.resolved.payload_withheld());
        }
    }

    // ── output_path ──────────────────────────────────────────────────

    #[test]
    fn output_path_keeps_matching_extension() {
        let out = output_path(
            Path::new("/photos/cat.JPG"),
            &OutputFormat::Jpeg,
            &OutputConfig::default(),
        );
        assert_eq!(out, PathBuf::from("/photos/cat.stamped.JPG"));
    }

    #[test]
    fn output_path_uses_declared_format() {
        let out = output_path(
            Path::new("/photos/cat.jpg"),
            &OutputFormat::Png,
            &OutputConfig::default(),
        );
        assert_eq!(out, PathBuf::from("/photos/cat.stamped.png"));
    }

    #[test]
    fn output_path_out_dir() {
        let output = OutputConfig {
            out_dir: Some(PathBuf::from("/out")),
            ..OutputConfig::default()
        };
        let out = output_path(Path::new("/photos/cat.png"), &OutputFormat::Png, &output);
        assert_eq!(out, PathBuf::from("/out/cat.stamped.png"));
    }

    // ── stamp_file ───────────────────────────────────────────────────

    #[test]
    fn stamp_file_writes_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pic.png");
        fs::write(&path, tiny_png()).unwrap();

        let request =
            StampRequest::new(r#"{"Title":"T"}"#, Some("hi"), TrustFlag::Trusted).unwrap();
        let result = stamp_file(&path, &request, &Config::default());

        assert!(result.error.is_none(), "{:?}", result.error);
        assert_eq!(result.container, Some(ContainerKind::Png));
        assert_eq!(result.content_type.as_deref(), Some("image/png"));
        assert_eq!(result.keys_written, vec!["Title", "UserComment"]);
        let out = result.output_path.unwrap();
        assert_eq!(out, dir.path().join("pic.stamped.png"));
        let written = fs::read(out).unwrap();
        assert!(contains(&written, b"UserComment\0hi"));
    }

    #[test]
    fn stamp_file_restamp_keeps_previous_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pic.png");
        fs::write(&path, tiny_png()).unwrap();
        let config = Config::default();

        let first = StampRequest::new(r#"{"Author":"A"}"#, None, TrustFlag::Untrusted).unwrap();
        let out = stamp_file(&path, &first, &config).output_path.unwrap();

        let second = StampRequest::new(r#"{"Title":"T"}"#, None, TrustFlag::Untrusted).unwrap();
        let result = stamp_file(&out, &second, &config);
        assert_eq!(result.keys_written, vec!["Author", "Title"]);
    }

    #[test]
    fn stamp_file_restamp_user_value_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pic.png");
        fs::write(&path, tiny_png()).unwrap();
        let config = Config::default();

        let first = StampRequest::new(r#"{"Author":"A"}"#, None, TrustFlag::Untrusted).unwrap();
        let out1 = stamp_file(&path, &first, &config).output_path.unwrap();

        let second = StampRequest::new(r#"{"Author":"B"}"#, None, TrustFlag::Untrusted).unwrap();
        let result = stamp_file(&out1, &second, &config);
        assert!(result.error.is_none(), "{:?}", result.error);
        let out2 = result.output_path.unwrap();
        assert_eq!(metadata::read_original(&out2).unwrap().get("Author"), Some("B"));

        let third = StampRequest::new(r#"{"Title":"T"}"#, None, TrustFlag::Untrusted).unwrap();
        let out3 = stamp_file(&out2, &third, &config).output_path.unwrap();
        let read = metadata::read_original(&out3).unwrap();
        assert_eq!(read.get("Author"), Some("B"));
        assert_eq!(read.get("Title"), Some("T"));
    }

    #[test]
    fn stamp_file_rejects_format_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pic.png");
        // IDAT payload carries an FF D9 pair a JPEG splicer would latch onto
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend(raw_chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]));
        png.extend(raw_chunk(b"IDAT", &[0x78, 0x9C, 0xFF, 0xD9, 0, 1]));
        png.extend(raw_chunk(b"IEND", &[]));
        fs::write(&path, &png).unwrap();

        let mut request =
            StampRequest::new(r#"{"Title":"T"}"#, None, TrustFlag::Untrusted).unwrap();
        request.format = Some(OutputFormat::Jpeg);
        let result = stamp_file(&path, &request, &Config::default());

        assert!(result.client_error);
        assert_eq!(result.error.as_deref(), Some("source is not a jpeg image"));
        assert!(result.output_path.is_none());
        assert!(!dir.path().join("pic.stamped.jpeg").exists());
    }

    #[test]
    fn stamp_file_rejects_mislabeled_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("actually_jpeg.png");
        fs::write(&path, tiny_jpeg()).unwrap();

        let request = StampRequest::new(r#"{"Title":"T"}"#, None, TrustFlag::Untrusted).unwrap();
        let result = stamp_file(&path, &request, &Config::default());
        assert!(result.client_error);
        assert!(result.output_path.is_none());
    }

    #[test]
    fn stamp_file_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pic.jpg");
        fs::write(&path, tiny_jpeg()).unwrap();

        let mut config = Config::default();
        config.output.dry_run = true;
        let request = StampRequest::new(r#"{"Title":"T"}"#, None, TrustFlag::Untrusted).unwrap();
        let result = stamp_file(&path, &request, &config);

        assert!(result.error.is_none());
        let out = result.output_path.unwrap();
        assert!(!out.exists());
    }

    #[test]
    fn stamp_file_webp_copies_with_warning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pic.webp");
        let webp = b"RIFF\x10\x00\x00\x00WEBPVP8 ".to_vec();
        fs::write(&path, &webp).unwrap();

        let request = StampRequest::new(r#"{"Title":"T"}"#, None, TrustFlag::Untrusted).unwrap();
        let result = stamp_file(&path, &request, &Config::default());

        assert!(result.error.is_none());
        assert!(result.keys_written.is_empty());
        assert!(
            result
                .warnings
                .iter()
                .any(|w| matches!(w, Warning::InjectionSkipped { .. }))
        );
        assert_eq!(fs::read(result.output_path.unwrap()).unwrap(), webp);
    }

    #[test]
    fn stamp_file_corrupt_png_fails_without_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.png");
        let mut corrupt = PNG_SIGNATURE.to_vec();
        corrupt.extend_from_slice(b"\x00\x00");
        fs::write(&path, &corrupt).unwrap();

        let request = StampRequest::new(r#"{"Title":"T"}"#, None, TrustFlag::Untrusted).unwrap();
        let result = stamp_file(&path, &request, &Config::default());

        assert!(result.error.is_some());
        assert!(!result.client_error);
        assert!(result.output_path.is_none());
        assert!(!dir.path().join("bad.stamped.png").exists());
    }

    #[test]
    fn stamp_file_invalid_keyword_is_client_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pic.png");
        fs::write(&path, tiny_png()).unwrap();

        let request = StampRequest::new(r#"{"":"v"}"#, None, TrustFlag::Untrusted).unwrap();
        let result = stamp_file(&path, &request, &Config::default());
        assert!(result.error.is_some());
        assert!(result.client_error);
    }

    #[test]
    fn stamp_file_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pic.png");
        fs::write(&path, tiny_png()).unwrap();

        let mut config = Config::default();
        config.output.suffix = String::new();
        let request = StampRequest::new(r#"{"Title":"T"}"#, None, TrustFlag::Untrusted).unwrap();
        let result = stamp_file(&path, &request, &config);
        assert!(result.error.is_some());
        assert_eq!(fs::read(&path).unwrap(), tiny_png());
    }

    #[test]
    fn stamp_file_missing_file() {
        let request = StampRequest::default();
        let result = stamp_file(Path::new("/nonexistent/a.png"), &request, &Config::default());
        assert!(result.error.unwrap().starts_with("Failed to read file"));
    }

    #[test]
    fn stamp_file_unknown_format() {
        let result = stamp_file(Path::new("noext"), &StampRequest::default(), &Config::default());
        assert!(result.error.is_some());
    }

    // ── collect_images ───────────────────────────────────────────────

    #[test]
    fn supported_image_extensions() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
        assert!(is_supported_image(Path::new("photo.webp")));
        assert!(!is_supported_image(Path::new("photo.heic")));
        assert!(!is_supported_image(Path::new("noext")));
    }

    #[test]
    fn collect_images_directory_recursive() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        fs::write(dir.path().join("a.jpg"), b"fake").unwrap();
        fs::write(sub.join("b.png"), b"fake").unwrap();
        fs::write(sub.join("c.txt"), b"fake").unwrap();

        let images = collect_images(&[dir.path().to_path_buf()]);
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn collect_images_skips_unsupported_and_missing() {
        let dir = TempDir::new().unwrap();
        let txt = dir.path().join("readme.txt");
        fs::write(&txt, b"hello").unwrap();

        let images = collect_images(&[txt, PathBuf::from("/nonexistent/path")]);
        assert!(images.is_empty());
    }
}
