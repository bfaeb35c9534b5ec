use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use tokio::fs;

use crate::error::{AppError, AppResult};

/// Extensions accepted for uploaded images.
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif"];

/// Upload bucket under the upload root; also the URL segment after `/uploads/`.
#[derive(Debug, Clone, Copy)]
pub enum UploadKind {
    Products,
    Categories,
}

impl UploadKind {
    fn dir(&self) -> &'static str {
        match self {
            UploadKind::Products => "products",
            UploadKind::Categories => "categories",
        }
    }
}

/// A file pulled out of a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

fn check_upload(file: &UploadedFile) -> AppResult<String> {
    if file.bytes.is_empty() {
        return Err(AppError::BadRequest(format!(
            "uploaded file `{}` is empty",
            file.file_name
        )));
    }
    extension_of(&file.file_name)
}

/// Writes the file under `<root>/<kind>/<millis>-<random><ext>` and returns its public path.
pub async fn save_upload(root: &Path, kind: UploadKind, file: &UploadedFile) -> AppResult<String> {
    let ext = check_upload(file)?;
    let dir = root.join(kind.dir());
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("create upload dir: {e}")))?;

    let name = stored_file_name(Utc::now().timestamp_millis(), &random_suffix(), &ext);
    let path: PathBuf = dir.join(&name);
    fs::write(&path, &file.bytes)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("write upload: {e}")))?;

    tracing::debug!(path = %path.display(), size = file.bytes.len(), "stored upload");
    Ok(format!("/uploads/{}/{}", kind.dir(), name))
}

/// Every file is checked before the first one is written. A failed write removes the earlier ones.
pub async fn save_uploads(
    root: &Path,
    kind: UploadKind,
    files: &[UploadedFile],
) -> AppResult<Vec<String>> {
    for file in files {
        check_upload(file)?;
    }
    let mut saved = Vec::with_capacity(files.len());
    for file in files {
        match save_upload(root, kind, file).await {
            Ok(path) => saved.push(path),
            Err(err) => {
                discard_uploads(root, &saved).await;
                return Err(err);
            }
        }
    }
    Ok(saved)
}

/// Deletes files written by [`save_upload`] whose row was never stored.
pub async fn discard_uploads(root: &Path, public_paths: &[String]) {
    for public in public_paths {
        let Some(relative) = public.strip_prefix("/uploads/") else {
            continue;
        };
        if relative.split('/').any(|part| part.is_empty() || part == "..") {
            continue;
        }
        match fs::remove_file(root.join(relative)).await {
            Ok(()) => tracing::debug!(path = %public, "discarded upload"),
            Err(err) => tracing::warn!(path = %public, error = %err, "failed to discard upload"),
        }
    }
}

pub fn stored_file_name(millis: i64, suffix: &str, ext: &str) -> String {
    format!("{millis}-{suffix}.{ext}")
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// Lowercased extension of an uploaded file name, restricted to image types.
pub fn extension_of(file_name: &str) -> AppResult<String> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| AppError::BadRequest(format!("file `{file_name}` has no extension")))?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AppError::BadRequest(format!(
            "unsupported image type `{ext}`"
        )));
    }
    Ok(ext)
}

/// Reads the `images` column. New rows hold a JSON array; older rows a comma separated list.
pub fn decode_images(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
            return list.into_iter().filter(|s| !s.trim().is_empty()).collect();
        }
    }
    trimmed
        .split(',')
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn encode_images(images: &[String]) -> String {
    serde_json::to_string(images).unwrap_or_else(|_| "[]".to_string())
}

/// Text fields and files collected from a `multipart/form-data` body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: std::collections::HashMap<String, String>,
    pub files: Vec<(String, UploadedFile)>,
}

impl MultipartForm {
    pub async fn collect(mut multipart: axum::extract::Multipart) -> AppResult<Self> {
        let mut form = MultipartForm::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) if !file_name.is_empty() => {
                    let bytes = field.bytes().await?.to_vec();
                    if !bytes.is_empty() {
                        form.files.push((name, UploadedFile { file_name, bytes }));
                    }
                }
                _ => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    /// Trimmed, non-empty text field.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn files_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a UploadedFile> + 'a {
        self.files
            .iter()
            .filter(move |(field, _)| field == name)
            .map(|(_, file)| file)
    }
}
