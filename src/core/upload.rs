//! Attachment handling
//!
//! Text files go to the hosted file store and are indexed in the configured
//! vector store so file search can find them. Images are not indexed; they are
//! inlined into the session as a user item so the next turn sees them.

use super::items::ConversationItem;
use super::status::StatusUpdate;
use crate::llm::{LlmError, UploadedFile};
use crate::storage::{SessionStore, StorageError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Extensions the chat input accepts
pub const ACCEPTED_EXTENSIONS: &[&str] = &["txt", "jpg", "jpeg", "png"];

/// `purpose` sent with uploaded documents
pub const FILE_PURPOSE: &str = "user_data";

/// Remote file storage and document index
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn create_file(
        &self,
        name: &str,
        bytes: Vec<u8>,
        purpose: &str,
    ) -> Result<UploadedFile, LlmError>;

    async fn attach_to_vector_store(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<(), LlmError>;

    async fn delete_file(&self, file_id: &str) -> Result<(), LlmError>;
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported file type for {name}; accepted: {}", ACCEPTED_EXTENSIONS.join(", "))]
    UnsupportedExtension { name: String },

    #[error("Cannot index {name}: VECTOR_STORE_ID is not configured")]
    VectorStoreNotConfigured { name: String },

    #[error("Failed to upload {name}: {source}")]
    Upload {
        name: String,
        #[source]
        source: LlmError,
    },

    #[error("Failed to attach {name} to the vector store: {source}")]
    Attach {
        name: String,
        #[source]
        source: LlmError,
    },

    #[error("Failed to store image {name}: {source}")]
    Session {
        name: String,
        #[source]
        source: StorageError,
    },
}

/// Broad media class an attachment is routed by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaClass {
    Text,
    Image,
    Other,
}

/// One file attached to a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Build an attachment from a browser upload
    ///
    /// The declared content type wins when it is `text/*` or `image/*`;
    /// otherwise (e.g. `application/octet-stream`) it is derived from the
    /// extension. Extensions outside `ACCEPTED_EXTENSIONS` are rejected.
    pub fn from_upload(
        name: impl Into<String>,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<Self, UploadError> {
        let name = name.into();
        let Some(by_extension) = media_type_for(&name) else {
            return Err(UploadError::UnsupportedExtension { name });
        };

        let media_type = match content_type {
            Some(ct) if ct.starts_with("text/") || ct.starts_with("image/") => ct.to_string(),
            _ => by_extension.to_string(),
        };
        Ok(Self::new(name, media_type, bytes))
    }

    pub fn media_class(&self) -> MediaClass {
        if self.media_type.starts_with("text/") {
            MediaClass::Text
        } else if self.media_type.starts_with("image/") {
            MediaClass::Image
        } else {
            MediaClass::Other
        }
    }

    /// `data:` URI carrying the raw bytes
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type,
            STANDARD.encode(&self.bytes)
        )
    }
}

/// Media type for an accepted file name
pub fn media_type_for(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "txt" => Some("text/plain"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

/// What happened to one attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Uploaded and attached to the vector store
    Indexed { file_id: String },
    /// Appended to the session as an inline image
    Inlined { data_uri: String },
    /// Neither text nor image; nothing was done
    Ignored,
}

pub struct UploadCoordinator {
    files: Arc<dyn FileStorage>,
    session: Arc<dyn SessionStore>,
    vector_store_id: Option<String>,
}

impl UploadCoordinator {
    pub fn new(
        files: Arc<dyn FileStorage>,
        session: Arc<dyn SessionStore>,
        vector_store_id: Option<String>,
    ) -> Self {
        Self {
            files,
            session,
            vector_store_id,
        }
    }

    /// Handle a single attachment, reporting progress as it goes
    pub async fn handle(
        &self,
        attachment: &Attachment,
        progress: &mut (dyn FnMut(StatusUpdate) + Send),
    ) -> Result<UploadOutcome, UploadError> {
        match attachment.media_class() {
            MediaClass::Text => self.index_document(attachment, progress).await,
            MediaClass::Image => self.inline_image(attachment, progress).await,
            MediaClass::Other => {
                tracing::warn!(
                    name = %attachment.name,
                    media_type = %attachment.media_type,
                    "Ignoring attachment with unsupported media type"
                );
                Ok(UploadOutcome::Ignored)
            }
        }
    }

    /// Handle attachments one after another, in order
    ///
    /// Stops at the first failure; attachments already handled stay
    /// committed.
    pub async fn handle_all(
        &self,
        attachments: &[Attachment],
        progress: &mut (dyn FnMut(&Attachment, StatusUpdate) + Send),
    ) -> Result<Vec<UploadOutcome>, UploadError> {
        let mut outcomes = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            let mut report = |status: StatusUpdate| progress(attachment, status);
            outcomes.push(self.handle(attachment, &mut report).await?);
        }
        Ok(outcomes)
    }

    async fn index_document(
        &self,
        attachment: &Attachment,
        progress: &mut (dyn FnMut(StatusUpdate) + Send),
    ) -> Result<UploadOutcome, UploadError> {
        let Some(vector_store_id) = self.vector_store_id.as_deref() else {
            return Err(UploadError::VectorStoreNotConfigured {
                name: attachment.name.clone(),
            });
        };

        progress(StatusUpdate::running("⏳ Uploading file..."));
        let uploaded = self
            .files
            .create_file(&attachment.name, attachment.bytes.clone(), FILE_PURPOSE)
            .await
            .map_err(|source| UploadError::Upload {
                name: attachment.name.clone(),
                source,
            })?;
        tracing::info!(name = %attachment.name, file_id = %uploaded.id, "Uploaded file");

        progress(StatusUpdate::running("⏳ Attaching file..."));
        if let Err(source) = self
            .files
            .attach_to_vector_store(vector_store_id, &uploaded.id)
            .await
        {
            // Don't leave an unindexed file behind
            if let Err(e) = self.files.delete_file(&uploaded.id).await {
                tracing::warn!(file_id = %uploaded.id, "Failed to remove orphaned upload: {}", e);
            }
            return Err(UploadError::Attach {
                name: attachment.name.clone(),
                source,
            });
        }

        progress(StatusUpdate::complete("✅ File uploaded"));
        Ok(UploadOutcome::Indexed {
            file_id: uploaded.id,
        })
    }

    async fn inline_image(
        &self,
        attachment: &Attachment,
        progress: &mut (dyn FnMut(StatusUpdate) + Send),
    ) -> Result<UploadOutcome, UploadError> {
        progress(StatusUpdate::running("⏳ Uploading image..."));
        let data_uri = attachment.data_uri();

        self.session
            .add_items(vec![ConversationItem::user_image(&data_uri)])
            .await
            .map_err(|source| UploadError::Session {
                name: attachment.name.clone(),
                source,
            })?;

        progress(StatusUpdate::complete("✅ Image uploaded"));
        Ok(UploadOutcome::Inlined { data_uri })
    }
}
