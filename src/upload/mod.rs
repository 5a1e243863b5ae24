use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::form::{FieldKey, FieldValue, FormController, FormError, FormValues};

const MIB: usize = 1024 * 1024;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadOptions {
    pub folder: String,
    pub max_bytes: usize,
    pub allowed_types: Vec<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            folder: "uploads".to_owned(),
            max_bytes: 5 * MIB,
            allowed_types: vec![
                "image/jpeg".to_owned(),
                "image/png".to_owned(),
                "image/webp".to_owned(),
            ],
        }
    }
}

impl UploadOptions {
    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub url: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum UploadError {
    #[error("`{name}` is empty")]
    Empty { name: String },
    #[error("`{name}` is {size} bytes, the limit is {max} bytes")]
    TooLarge { name: String, size: usize, max: usize },
    #[error("`{name}` has unsupported type `{content_type}`")]
    UnsupportedType { name: String, content_type: String },
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("uploaded image cannot be stored in the form: {0}")]
    Field(#[from] FormError),
}

pub type BoxedUploadFuture<'a> =
    Pin<Box<dyn Future<Output = Result<UploadedImage, UploadError>> + Send + 'a>>;

pub trait ImageUploader: Send + Sync {
    fn upload_image<'a>(&'a self, file: ImageFile, options: &'a UploadOptions)
    -> BoxedUploadFuture<'a>;
}

pub fn check_image(file: &ImageFile, options: &UploadOptions) -> Result<(), UploadError> {
    if file.bytes.is_empty() {
        return Err(UploadError::Empty {
            name: file.name.clone(),
        });
    }
    if file.bytes.len() > options.max_bytes {
        return Err(UploadError::TooLarge {
            name: file.name.clone(),
            size: file.bytes.len(),
            max: options.max_bytes,
        });
    }
    let allowed = options
        .allowed_types
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&file.content_type));
    if !allowed {
        return Err(UploadError::UnsupportedType {
            name: file.name.clone(),
            content_type: file.content_type.clone(),
        });
    }
    Ok(())
}

#[derive(Clone, Default)]
pub struct InMemoryUploader {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    next_object: Arc<AtomicU64>,
    rejecting: Arc<AtomicBool>,
}

impl InMemoryUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following upload fail until switched back.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn object(&self, url: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ImageUploader for InMemoryUploader {
    fn upload_image<'a>(
        &'a self,
        file: ImageFile,
        options: &'a UploadOptions,
    ) -> BoxedUploadFuture<'a> {
        Box::pin(async move {
            if self.rejecting.load(Ordering::SeqCst) {
                return Err(UploadError::Rejected(format!(
                    "storage refused `{}`",
                    file.name
                )));
            }
            let index = self.next_object.fetch_add(1, Ordering::SeqCst) + 1;
            let url = format!("memory://{}/{index}-{}", options.folder, file.name);
            self.objects
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(url.clone(), file.bytes);
            Ok(UploadedImage { url })
        })
    }
}

impl<T> FormController<T>
where
    T: FormValues,
{
    /// Upload failures go back to the caller and never enter the error map.
    pub async fn upload_image_field<U>(
        &self,
        key: impl Into<FieldKey>,
        uploader: &U,
        file: ImageFile,
        options: &UploadOptions,
    ) -> Result<UploadedImage, UploadError>
    where
        U: ImageUploader + ?Sized,
    {
        let key = key.into();
        self.check_upload_target(&key, FieldValue::Text(String::new()))?;
        let uploaded = self.upload_checked(&key, uploader, file, options).await?;
        self.try_set_field_value(&key, FieldValue::Text(uploaded.url.clone()))?;
        Ok(uploaded)
    }

    /// Uploads `files` in order, appending each URL to the field's list.
    /// Stops at the first failure; URLs appended before it stay.
    pub async fn upload_gallery_field<U>(
        &self,
        key: impl Into<FieldKey>,
        uploader: &U,
        files: Vec<ImageFile>,
        options: &UploadOptions,
    ) -> Result<Vec<UploadedImage>, UploadError>
    where
        U: ImageUploader + ?Sized,
    {
        let key = key.into();
        self.check_upload_target(&key, FieldValue::List(Vec::new()))?;
        let mut uploaded = Vec::with_capacity(files.len());
        for file in files {
            let image = self.upload_checked(&key, uploader, file, options).await?;
            let mut gallery = match self.field_value(&key) {
                Some(FieldValue::List(items)) => items,
                _ => Vec::new(),
            };
            gallery.push(FieldValue::Text(image.url.clone()));
            self.try_set_field_value(&key, FieldValue::List(gallery))?;
            uploaded.push(image);
        }
        Ok(uploaded)
    }

    fn check_upload_target(&self, key: &FieldKey, sample: FieldValue) -> Result<(), UploadError> {
        self.check_field_value(key, sample).map_err(|error| {
            warn!(form_id = %self.form_id(), field = %key, error = %error, "Field cannot hold an uploaded image");
            UploadError::Field(error)
        })
    }

    async fn upload_checked<U>(
        &self,
        key: &FieldKey,
        uploader: &U,
        file: ImageFile,
        options: &UploadOptions,
    ) -> Result<UploadedImage, UploadError>
    where
        U: ImageUploader + ?Sized,
    {
        let form_id = self.form_id();
        if let Err(error) = check_image(&file, options) {
            warn!(form_id = %form_id, field = %key, error = %error, "Image failed local checks");
            return Err(error);
        }
        let name = file.name.clone();
        match uploader.upload_image(file, options).await {
            Ok(uploaded) => {
                debug!(form_id = %form_id, field = %key, url = %uploaded.url, "Image uploaded");
                Ok(uploaded)
            }
            Err(error) => {
                warn!(form_id = %form_id, field = %key, file = %name, error = %error, "Image upload failed");
                Err(error)
            }
        }
    }
}
