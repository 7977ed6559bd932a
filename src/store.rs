use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state codec on {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: postcard::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read a whole state file. A missing file is an empty state, not an error,
/// so first use needs no setup step.
pub(crate) fn load_state<T>(path: &Path) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let data = std::fs::read(path).map_err(|e| io_err(path, e))?;
    postcard::from_bytes(&data).map_err(|e| StoreError::Codec {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Replace a whole state file. The bytes land in a sibling temp file first
/// and are renamed into place, so a crash mid-write never leaves a torn
/// file behind.
pub(crate) fn save_state<T>(path: &Path, state: &T) -> Result<(), StoreError>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let data = postcard::to_allocvec(state).map_err(|e| StoreError::Codec {
        path: path.to_path_buf(),
        source: e,
    })?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &data).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        items: Vec<String>,
        counter: u64,
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let state: Sample = load_state(&dir.path().join("absent.bin")).unwrap();
        assert_eq!(state, Sample::default());
    }

    #[test]
    fn saved_state_loads_back_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        let state = Sample {
            items: vec!["a".into(), "b".into()],
            counter: 7,
        };
        save_state(&path, &state).unwrap();
        assert!(!path.with_extension("tmp").exists());
        let loaded: Sample = load_state(&path).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn garbage_file_reports_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        std::fs::write(&path, [0xff, 0xff, 0xff, 0xff, 0xff]).unwrap();
        let err = load_state::<Sample>(&path).unwrap_err();
        assert!(matches!(err, StoreError::Codec { .. }));
    }
}
