pub mod blob;
pub mod models;
pub mod registry;
pub mod repository;
pub mod validation;

pub use blob::{is_safe_key, storage_key_for, BlobStore, Disposition, LocalBlobStore, MemoryBlobStore};
pub use models::{FileListQuery, FileResponse, NewUploadedFile, UploadCandidate, UploadResponse, UploadedFile};
pub use registry::FileRegistry;
pub use repository::{FileRepository, FileRepositoryTrait};
pub use validation::{
    AcceptedUpload, UploadRules, UploadValidator, ValidationError, ALLOWED_CONTENT_TYPES,
    ALLOWED_EXTENSIONS, MAX_UPLOAD_SIZE,
};
