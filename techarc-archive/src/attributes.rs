//! Platform file attributes carried in the entry attribute blob.
//!
//! The blob is JSON so that archives written on one platform stay readable
//! on another; fields the reader's platform cannot apply are ignored.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use techarc_core::{Result, TechArcError};

/// Attributes captured from a source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    /// Platform that captured the attributes (`std::env::consts::OS`).
    pub platform: String,
    /// Read-only flag.
    #[serde(default)]
    pub readonly: bool,
    /// Unix permission bits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unix_mode: Option<u32>,
    /// Owner user ID (Unix).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    /// Owner group ID (Unix).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
}

impl FileAttributes {
    /// Capture attributes from file metadata.
    pub fn capture(metadata: &fs::Metadata) -> Self {
        let mut attrs = Self {
            platform: std::env::consts::OS.to_string(),
            readonly: metadata.permissions().readonly(),
            ..Self::default()
        };
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            attrs.unix_mode = Some(metadata.mode() & 0o7777);
            attrs.uid = Some(metadata.uid());
            attrs.gid = Some(metadata.gid());
        }
        attrs
    }

    /// Serialize to the entry blob.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| TechArcError::invalid_argument(format!("attribute encoding: {e}")))
    }

    /// Parse an entry blob.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| TechArcError::corrupted(0, format!("attribute blob: {e}")))
    }

    /// Apply the attributes to `path`.
    ///
    /// Unix mode bits are applied on Unix; elsewhere only the read-only flag
    /// is. Ownership is recorded but never restored.
    pub fn apply(&self, path: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            if let Some(mode) = self.unix_mode {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
                return Ok(());
            }
        }

        let mut permissions = fs::metadata(path)?.permissions();
        if permissions.readonly() != self.readonly {
            permissions.set_readonly(self.readonly);
            fs::set_permissions(path, permissions)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_roundtrip() {
        let attrs = FileAttributes {
            platform: "linux".into(),
            readonly: false,
            unix_mode: Some(0o640),
            uid: Some(1000),
            gid: Some(1000),
        };
        let bytes = attrs.to_bytes().unwrap();
        assert_eq!(FileAttributes::from_bytes(&bytes).unwrap(), attrs);
    }

    #[test]
    fn test_missing_fields_default() {
        let attrs = FileAttributes::from_bytes(br#"{"platform":"windows"}"#).unwrap();
        assert_eq!(attrs.platform, "windows");
        assert!(!attrs.readonly);
        assert_eq!(attrs.unix_mode, None);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            FileAttributes::from_bytes(b"\xff\x00"),
            Err(TechArcError::CorruptData { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_and_apply_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let attrs = FileAttributes::capture(&fs::metadata(&path).unwrap());
        assert_eq!(attrs.unix_mode, Some(0o600));

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        attrs.apply(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o600);
    }
}
