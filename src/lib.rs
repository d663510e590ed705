use thiserror::Error;

#[derive(Error, Debug)]
pub enum NvOptionsError {
    #[error("Attribute query failed: {0}")]
    AttributeQueryFailed(String),
    #[error("Attribute set failed: {0}")]
    AttributeSetFailed(String),
    #[error("Display detection failed: {0}")]
    DisplayDetectionFailed(String),
    #[error("Not supported: {0}")]
    Unsupported(String),
    #[error("No attribute backend available: {0}")]
    BackendUnavailable(String),
    #[error("Profile error: {0}")]
    ProfileError(String),
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

pub type NvResult<T> = Result<T, NvOptionsError>;

pub mod attributes;
pub mod backend;
pub mod control;
pub mod nvkms;
pub mod nvkms_backend;
pub mod picker;
pub mod settings;
pub mod shell_backend;
pub mod table;

// Re-export commonly used types
pub use attributes::Attribute;
pub use backend::{
    create_backend, AttributeBackend, BackendKind, DisplayHandle, SharedAttributeBackend,
};
pub use control::AttributeControl;
pub use table::TranslationTable;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let error = NvOptionsError::Unsupported("FSAA Mode on HDMI-0".to_string());
        assert_eq!(error.to_string(), "Not supported: FSAA Mode on HDMI-0");
    }

    #[test]
    fn test_query_error_carries_context() {
        let error = NvOptionsError::AttributeQueryFailed("ioctl: EACCES".to_string());
        assert!(error.to_string().contains("EACCES"));
    }
}
