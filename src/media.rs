use std::path::PathBuf;

use data_encoding::HEXLOWER;
use log::debug;
use rand::RngCore;
use rocket::fs::TempFile;

use crate::error::{Error, Result};

/// Largest accepted upload, in bytes.
pub const MAX_IMAGE_SIZE: u64 = 1_000_000;

/// Where uploaded files are served from.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Durable storage for uploaded images.
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Check an upload is an acceptable image, without storing it.
    pub fn validate(file: &TempFile<'_>, field: &'static str) -> Result<()> {
        if file.len() > MAX_IMAGE_SIZE {
            return Err(Error::invalid(
                field,
                "Image size too big. Should be less than 1MB",
            ));
        }
        match file.content_type() {
            Some(content_type) if content_type.top() == "image" => Ok(()),
            _ => Err(Error::invalid(field, "File must be an image")),
        }
    }

    /// Persist an uploaded image under a fresh unique name, returning the URL
    /// it will be served from.
    pub async fn save(&self, file: &mut TempFile<'_>, field: &'static str) -> Result<String> {
        Self::validate(file, field)?;

        let extension = file
            .content_type()
            .and_then(|content_type| content_type.extension())
            .map(|ext| ext.as_str().to_ascii_lowercase())
            .unwrap_or_else(|| "img".to_string());
        let mut name = [0_u8; 16];
        rand::thread_rng().fill_bytes(&mut name);
        let file_name = format!("{}.{extension}", HEXLOWER.encode(&name));

        let path = self.dir.join(&file_name);
        file.copy_to(&path).await?;
        debug!("Stored upload at {}", path.display());

        Ok(format!("{UPLOADS_ROUTE}/{file_name}"))
    }
}
