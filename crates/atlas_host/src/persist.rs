// SPDX-License-Identifier: MIT OR Apache-2.0
//! Snapshot files. `.ron` files hold RON, anything else JSON.

use crate::error::{HostError, Result};
use atlas_graph::GraphSnapshot;
use std::path::Path;

/// Encoding of a snapshot file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// Pretty-printed JSON
    Json,
    /// Pretty-printed RON
    Ron,
}

impl SnapshotFormat {
    /// Pick the encoding from a file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ron") => Self::Ron,
            _ => Self::Json,
        }
    }

    /// Decode a snapshot
    pub fn decode(self, content: &str) -> Result<GraphSnapshot> {
        let snapshot = match self {
            Self::Json => GraphSnapshot::from_json(content)?,
            Self::Ron => GraphSnapshot::from_ron(content)?,
        };
        Ok(snapshot)
    }

    /// Encode a snapshot
    pub fn encode(self, snapshot: &GraphSnapshot) -> Result<String> {
        let content = match self {
            Self::Json => snapshot.to_json()?,
            Self::Ron => snapshot.to_ron()?,
        };
        Ok(content)
    }
}

/// Read a snapshot file
pub fn load_snapshot(path: &Path) -> Result<GraphSnapshot> {
    let content = std::fs::read_to_string(path).map_err(|source| HostError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    SnapshotFormat::from_path(path).decode(&content)
}

/// Write a snapshot file, replacing any previous one
pub fn save_snapshot(path: &Path, snapshot: &GraphSnapshot) -> Result<()> {
    let content = SnapshotFormat::from_path(path).encode(snapshot)?;
    std::fs::write(path, content).map_err(|source| HostError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;
    use atlas_graph::kinds::builtin_registry;
    use atlas_graph::Session;
    use std::sync::Arc;

    fn demo_snapshot() -> GraphSnapshot {
        let mut session = Session::new(Arc::new(builtin_registry()));
        demo::build_demo_graph(&mut session).unwrap();
        session.export_snapshot()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SnapshotFormat::from_path(Path::new("a.ron")), SnapshotFormat::Ron);
        assert_eq!(SnapshotFormat::from_path(Path::new("a.RON")), SnapshotFormat::Ron);
        assert_eq!(SnapshotFormat::from_path(Path::new("a.json")), SnapshotFormat::Json);
        assert_eq!(SnapshotFormat::from_path(Path::new("snapshot")), SnapshotFormat::Json);
    }

    #[test]
    fn test_encode_decode() {
        let snapshot = demo_snapshot();
        for format in [SnapshotFormat::Json, SnapshotFormat::Ron] {
            let content = format.encode(&snapshot).unwrap();
            assert_eq!(format.decode(&content).unwrap(), snapshot);
        }
    }

    #[test]
    fn test_file_roundtrip() {
        let snapshot = demo_snapshot();
        let path = std::env::temp_dir().join(format!("atlas-host-{}.ron", std::process::id()));

        save_snapshot(&path, &snapshot).unwrap();
        let loaded = load_snapshot(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.unwrap(), snapshot);
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("atlas-host-no-such-snapshot.json");
        assert!(matches!(load_snapshot(&path), Err(HostError::Io { .. })));
    }

    #[test]
    fn test_wrong_encoding() {
        let ron_str = SnapshotFormat::Ron.encode(&demo_snapshot()).unwrap();
        assert!(matches!(
            SnapshotFormat::Json.decode(&ron_str),
            Err(HostError::Snapshot(_))
        ));
    }
}
