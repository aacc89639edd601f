//! Shared data model and leaf capabilities for the self-update pipeline.
//!
//! This crate holds everything the generator, the client-side update
//! manager and the swap helper have in common: the four-component
//! [`Version`], the published manifest ([`UpdateInfo`]) and the generator's
//! private fingerprint ledger ([`PatchLedger`]), the content fingerprinter,
//! the [`DeltaCodec`] seam around the block-signature diff engine, and zip
//! and filesystem helpers.

pub mod archive;
pub mod delta;
pub mod error;
pub mod fingerprint;
pub mod fsutil;
pub mod ledger;
pub mod manifest;
pub mod version;

pub use delta::{DeltaCodec, RsyncCodec, DELTA_SUFFIX, SIGNATURE_SUFFIX};
pub use error::{CoreError, Result};
pub use fingerprint::fingerprint_file;
pub use ledger::{PatchLedger, LEDGER_FILE};
pub use manifest::{patch_archive_name, Patch, UpdateInfo, MANIFEST_FILE};
pub use version::Version;
