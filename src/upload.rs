//! Storage for shared media files.
//!
//! Uploaded files land in the uploads directory under a collision-free
//! generated name and are served back at `/uploads/<name>`; the returned
//! URL is what the authority hands to `load_media`.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::Result;

/// Public URL prefix uploaded files are served under.
pub const URL_PREFIX: &str = "/uploads";

pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Opens the store, creating the directory if it does not exist yet.
    pub async fn open(dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Writes one uploaded file and returns the URL it is served at.
    pub async fn store(&self, original_name: Option<&str>, data: &[u8]) -> Result<String> {
        let file_name = generated_name(original_name);
        tokio::fs::write(self.dir.join(&file_name), data).await?;
        Ok(format!("{URL_PREFIX}/{file_name}"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Unique name preserving the client's extension, with a generic fallback
/// for extension-less uploads.
fn generated_name(original_name: Option<&str>) -> String {
    let ext = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".audio".to_string());
    format!("audio-{}{ext}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_keep_the_extension() {
        let name = generated_name(Some("mix tape.mp3"));
        assert!(name.starts_with("audio-"));
        assert!(name.ends_with(".mp3"));
    }

    #[test]
    fn extensionless_uploads_get_the_fallback() {
        assert!(generated_name(Some("rawfile")).ends_with(".audio"));
        assert!(generated_name(None).ends_with(".audio"));
    }

    #[test]
    fn generated_names_do_not_collide() {
        assert_ne!(generated_name(Some("a.ogg")), generated_name(Some("a.ogg")));
    }

    #[tokio::test]
    async fn stored_files_are_readable_under_the_returned_url() {
        let tmp = tempfile::tempdir().unwrap();
        let store = UploadStore::open(tmp.path().join("uploads")).await.unwrap();

        let url = store.store(Some("track.flac"), b"not really flac").await.unwrap();
        let file_name = url.strip_prefix("/uploads/").unwrap();
        let on_disk = tokio::fs::read(store.dir().join(file_name)).await.unwrap();
        assert_eq!(on_disk, b"not really flac");
    }
}
