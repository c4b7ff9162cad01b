//! Services module - the external collaborators of the photo organizer core.
//!
//! Each service is a thin I/O wrapper with no dependency on the UI layer:
//!
//! - [`scanner`]: [`DirectoryLister`] / [`FsLister`] find image files under a
//!   directory (deterministic order, hidden entries skipped when recursing)
//! - [`metadata`]: [`MetadataReader`] / [`ExifReader`] read the EXIF capture date
//!   used by the date display keys, plus the orientation used when rendering
//! - [`thumbnail`]: [`ThumbnailProvider`] / [`ImageThumbnailer`] decode, orient
//!   and scale images, with a bounded cache
//! - [`export`]: the numbered-name commit of the Selected list (copy or move)
//!
//! # Failure policy
//!
//! Scanning, metadata and thumbnail failures are logged and turned into
//! "nothing found" / "no thumbnail". Only export failures are surfaced to the
//! caller, as [`ExportError`].
//!
//! The collaborator traits are object safe so the controller can hold them as
//! `Box<dyn _>`/`Rc<dyn _>`; tests substitute `mockall` mocks.

pub mod export;
pub mod metadata;
pub mod scanner;
pub mod thumbnail;

pub use export::{
    ExportError, ExportMode, ExportPlan, MAX_DIGITS, NamingTemplate, export_item, suggest_template,
};
pub use metadata::{ExifReader, MetadataReader};
pub use scanner::{DirectoryLister, FsLister};
pub use thumbnail::{ImageThumbnailer, ThumbnailProvider};
