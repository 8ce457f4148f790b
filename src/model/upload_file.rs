//! Handle to the bytes being uploaded

use bytes::Bytes;
use color_eyre::eyre;
use std::path::{Path, PathBuf};

/// Where the bytes of an upload come from
#[derive(Debug, Clone, PartialEq)]
pub enum FileSource {
    /// Contents already held in memory
    Memory(Bytes),
    /// File on the local disk, read by the gateway when transferring
    Path(PathBuf),
}

/// A file submitted for upload. Immutable for the life of the upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub name: String,
    pub size_bytes: u64,
    pub source: FileSource,
}

impl UploadFile {
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        UploadFile {
            name: name.into(),
            size_bytes: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    /// Build a handle for a local file, reading its size from the filesystem
    pub async fn from_path(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(eyre::eyre!("{} is not a regular file", path.display()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(UploadFile {
            name,
            size_bytes: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Read the whole content of the file
    pub async fn read_all(&self) -> eyre::Result<Bytes> {
        match &self.source {
            FileSource::Memory(data) => Ok(data.clone()),
            FileSource::Path(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_bytes_sets_size() {
        let file = UploadFile::from_bytes("a.txt", vec![0u8; 100]);
        assert_eq!(file.name, "a.txt");
        assert_eq!(file.size_bytes, 100);
    }

    #[tokio::test]
    async fn test_from_path_reads_metadata() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();
        tmp.flush().unwrap();

        let file = UploadFile::from_path(tmp.path()).await.unwrap();
        assert_eq!(file.size_bytes, 11);
        assert_eq!(
            file.name,
            tmp.path().file_name().unwrap().to_string_lossy()
        );
        assert_eq!(file.read_all().await.unwrap(), Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn test_from_path_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(UploadFile::from_path(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        assert!(UploadFile::from_path("/definitely/not/here.bin").await.is_err());
    }
}
