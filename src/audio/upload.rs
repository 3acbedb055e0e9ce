//! Temp-file lifecycle for uploaded clips.
//!
//! The multipart body is streamed into a uniquely named file inside the
//! configured upload directory. The file is removed when the `TempUpload`
//! is dropped, so every exit path of a request (success, decode failure,
//! transcription failure) cleans up after itself.

use super::AudioError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub struct TempUpload {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    written: usize,
    limit: usize,
}

impl TempUpload {
    /// Create an empty upload file in `dir`.
    ///
    /// `original_name` only contributes its extension; the rest of the name is
    /// a fresh UUID so concurrent uploads of `clip.wav` never collide.
    pub async fn create(dir: &Path, original_name: Option<&str>, limit: usize) -> Result<Self, AudioError> {
        tokio::fs::create_dir_all(dir).await?;

        let extension = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin")
            .to_ascii_lowercase();

        let path = dir.join(format!("upload-{}.{}", Uuid::new_v4(), extension));
        let file = tokio::fs::File::create(&path).await?;
        tracing::debug!("Created temp upload {:?}", path);

        Ok(Self {
            path,
            file: Some(file),
            written: 0,
            limit,
        })
    }

    /// Append a chunk, enforcing the size limit.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), AudioError> {
        if self.written + chunk.len() > self.limit {
            return Err(AudioError::TooLarge { limit: self.limit });
        }

        match self.file.as_mut() {
            Some(file) => file.write_all(chunk).await?,
            None => {
                return Err(AudioError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "upload already finished",
                )))
            }
        }
        self.written += chunk.len();
        Ok(())
    }

    /// Flush and close the file. Fails with `Empty` when nothing was written.
    pub async fn finish(&mut self) -> Result<&Path, AudioError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }

        if self.written == 0 {
            return Err(AudioError::Empty);
        }
        Ok(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.written
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        // Close the handle first; some platforms refuse to delete open files.
        self.file.take();
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed temp upload {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove temp upload {:?}: {}", self.path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_upload_lifecycle() {
        let dir = tempdir().unwrap();
        let path;
        {
            let mut upload = TempUpload::create(dir.path(), Some("clip.WAV"), 1024).await.unwrap();
            upload.write_chunk(b"RIFF").await.unwrap();
            upload.write_chunk(b"data").await.unwrap();
            assert_eq!(upload.len(), 8);

            path = upload.finish().await.unwrap().to_path_buf();
            assert!(path.exists());
            assert_eq!(path.extension().unwrap(), "wav");
            assert_eq!(std::fs::read(&path).unwrap(), b"RIFFdata");
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_upload_limit() {
        let dir = tempdir().unwrap();
        let mut upload = TempUpload::create(dir.path(), None, 4).await.unwrap();
        upload.write_chunk(b"1234").await.unwrap();
        assert!(matches!(
            upload.write_chunk(b"5").await,
            Err(AudioError::TooLarge { limit: 4 })
        ));
        assert_eq!(upload.path().extension().unwrap(), "bin");
    }

    #[tokio::test]
    async fn test_empty_upload_rejected_and_removed() {
        let dir = tempdir().unwrap();
        let mut upload = TempUpload::create(dir.path(), Some("../../etc/passwd"), 16).await.unwrap();
        let path = upload.path().to_path_buf();
        assert_eq!(path.parent().unwrap(), dir.path());
        assert!(matches!(upload.finish().await, Err(AudioError::Empty)));
        drop(upload);
        assert!(!path.exists());
    }
}
