//! # image-stamp
//!
//! Splice key/value metadata and an optional embedded payload directly into
//! already-encoded JPEG and PNG byte streams, with a merge-and-redact policy
//! deciding what gets written.
//!
//! ## Quick Start
//!
//! The [`pipeline`] module runs the whole read → resolve → inject → write flow
//! for a file:
//!
//! ```rust,no_run
//! use image_stamp::config::Config;
//! use image_stamp::metadata::TrustFlag;
//! use image_stamp::pipeline::{StampRequest, collect_images, stamp_file};
//! use std::path::PathBuf;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!
//!     // Invalid JSON fails here, before any image is touched
//!     let request = StampRequest::new(r#"{"Author":"B","Title":"T"}"#, None, TrustFlag::Untrusted)?;
//!
//!     for path in collect_images(&[PathBuf::from("./photos")]) {
//!         let result = stamp_file(&path, &request, &config);
//!         match result.error {
//!             Some(err) => eprintln!("Error processing {}: {err}", path.display()),
//!             None => println!("Stamped: {:?}", result.output_path),
//!         }
//!         for warning in &result.warnings {
//!             println!("  warning: {warning}");
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! For in-memory buffers (for example the output of an image codec), resolve
//! the metadata and inject it yourself:
//!
//! ```rust
//! use image_stamp::config::PolicyConfig;
//! use image_stamp::container::OutputFormat;
//! use image_stamp::metadata::{MetadataRecord, TrustFlag, resolve};
//! use image_stamp::pipeline::inject;
//!
//! # fn main() -> Result<(), image_stamp::InjectError> {
//! let original: MetadataRecord = [("Author", "A")].into_iter().collect();
//! let user = MetadataRecord::from_json(r#"{"Author":"B"}"#)?;
//! let resolved = resolve(
//!     &original,
//!     &user,
//!     Some("<script>alert(1)</script>"),
//!     TrustFlag::Untrusted,
//!     &PolicyConfig::default(),
//! );
//! assert_eq!(resolved.record().get("UserComment"), Some("[REDACTED]"));
//!
//! let jpeg = vec![0xFF, 0xD8, 0xFF, 0xD9];
//! let outcome = inject(&jpeg, &OutputFormat::Jpeg, &resolved)?;
//! assert_eq!(&outcome.bytes[outcome.bytes.len() - 2..], &[0xFF, 0xD9]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Write Strategy |
//! |--------|---------------|
//! | JPEG | One COM segment of `key:value` lines before the end-of-image marker |
//! | PNG | One `tEXt` (or `iTXt` for non-Latin-1 text) chunk per entry after `IHDR` |
//! | WebP, other | Passed through unchanged with a warning |
//!
//! ## Modules
//!
//! - [`config`]: Policy and output configuration, loading/saving
//! - [`container`]: Format sniffing, JPEG/PNG injectors, CRC-32
//! - [`metadata`]: Metadata records, original-metadata reader, merge/redaction policy
//! - [`pipeline`]: Orchestration, per-file processing, image collection

pub mod config;
pub mod container;
pub mod error;
pub mod metadata;
pub mod pipeline;

pub use error::{InjectError, Result};
