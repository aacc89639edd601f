use crate::error::{CoreError, Result};
use fast_rsync::{apply, diff, Signature, SignatureOptions};
use std::fs;
use std::path::Path;

/// Suffix marking a delta artifact inside a patch archive.
pub const DELTA_SUFFIX: &str = ".delta";
/// Suffix of persisted signature files in the generator's signature store.
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// Block-signature delta codec, consumed as a black box by the generator
/// and the update manager so the diffing algorithm stays swappable.
pub trait DeltaCodec: Send + Sync {
    /// Build a signature of `base` and write it to `signature_out`.
    fn build_signature(&self, base: &Path, signature_out: &Path) -> Result<()>;
    /// Build a delta transforming the file described by `signature` into
    /// `new_file`, written to `delta_out`.
    fn build_delta(&self, new_file: &Path, signature: &Path, delta_out: &Path) -> Result<()>;
    /// Apply `delta` to `base` and write the reconstructed file to `output`.
    fn apply_delta(&self, base: &Path, delta: &Path, output: &Path) -> Result<()>;
}

/// Default codec backed by the `fast_rsync` rolling-checksum implementation.
pub struct RsyncCodec {
    block_size: u32,
    crypto_hash_size: u32,
}

impl Default for RsyncCodec {
    fn default() -> Self {
        RsyncCodec {
            block_size: 4096,
            crypto_hash_size: 8,
        }
    }
}

impl RsyncCodec {
    /// Codec with a custom signature block size.
    pub fn with_block_size(block_size: u32) -> Self {
        RsyncCodec {
            block_size,
            ..RsyncCodec::default()
        }
    }

    fn options(&self) -> SignatureOptions {
        SignatureOptions {
            block_size: self.block_size,
            crypto_hash_size: self.crypto_hash_size,
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl DeltaCodec for RsyncCodec {
    fn build_signature(&self, base: &Path, signature_out: &Path) -> Result<()> {
        let data = fs::read(base)?;
        let signature = Signature::calculate(&data, self.options());
        ensure_parent(signature_out)?;
        fs::write(signature_out, signature.into_serialized())?;
        Ok(())
    }

    fn build_delta(&self, new_file: &Path, signature: &Path, delta_out: &Path) -> Result<()> {
        let new_data = fs::read(new_file)?;
        let raw_signature = fs::read(signature)?;
        let parsed = Signature::deserialize(raw_signature)
            .map_err(|err| CoreError::delta(signature, err))?;
        let mut delta = Vec::new();
        diff(&parsed.index(), &new_data, &mut delta)
            .map_err(|err| CoreError::delta(new_file, err))?;
        ensure_parent(delta_out)?;
        fs::write(delta_out, delta)?;
        Ok(())
    }

    fn apply_delta(&self, base: &Path, delta: &Path, output: &Path) -> Result<()> {
        let base_data = fs::read(base)?;
        let delta_data = fs::read(delta)?;
        let mut out = Vec::new();
        apply(&base_data, &delta_data, &mut out).map_err(|err| CoreError::delta(base, err))?;
        ensure_parent(output)?;
        fs::write(output, out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn signature_delta_apply_reconstructs_new_content() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("file.v1");
        let new = dir.path().join("file.v2");
        let sig = dir.path().join("file.sig");
        let delta = dir.path().join("file.delta");
        let rebuilt = dir.path().join("file.rebuilt");

        // Large enough content that the delta actually references blocks.
        let mut old_data = vec![0u8; 32 * 1024];
        for (i, b) in old_data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let mut new_data = old_data.clone();
        new_data[10_000..10_016].copy_from_slice(b"sixteen new byte");
        new_data.extend_from_slice(b"appended tail");

        fs::write(&old, &old_data).unwrap();
        fs::write(&new, &new_data).unwrap();

        let codec = RsyncCodec::default();
        codec.build_signature(&old, &sig).unwrap();
        codec.build_delta(&new, &sig, &delta).unwrap();
        codec.apply_delta(&old, &delta, &rebuilt).unwrap();

        assert_eq!(fs::read(&rebuilt).unwrap(), new_data);
        // A content-addressed delta should beat shipping the file whole.
        assert!(fs::metadata(&delta).unwrap().len() < new_data.len() as u64);
    }

    #[test]
    fn missing_base_file_fails() {
        let dir = tempdir().unwrap();
        let codec = RsyncCodec::default();
        assert!(codec
            .build_signature(&dir.path().join("absent"), &dir.path().join("out.sig"))
            .is_err());
    }

    #[test]
    fn corrupt_signature_is_rejected() {
        let dir = tempdir().unwrap();
        let new = dir.path().join("new");
        let sig = dir.path().join("bogus.sig");
        fs::write(&new, b"content").unwrap();
        fs::write(&sig, b"not a signature").unwrap();
        let codec = RsyncCodec::default();
        assert!(codec
            .build_delta(&new, &sig, &dir.path().join("out.delta"))
            .is_err());
    }
}
