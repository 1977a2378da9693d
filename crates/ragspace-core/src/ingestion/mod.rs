pub mod processor;
pub mod upload;

pub use processor::{requeue_for_processing, ProcessDocumentUseCase, ProcessOutcome};
pub use upload::{UploadDocumentInput, UploadDocumentOutput, UploadDocumentUseCase};
