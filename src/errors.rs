use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Failed to compile {stage} shader: {log}")]
    ProgramCompile { stage: ShaderStage, log: String },

    #[error("Failed to link shader program: {log}")]
    ProgramLink { log: String },

    #[error("Failed to allocate vertex buffer: {message}")]
    BufferAllocation { message: String },

    #[error("Failed to upload texture ({width}x{height}): {message}")]
    TextureUpload {
        width: u32,
        height: u32,
        message: String,
    },

    #[error("Failed to load image '{path}': {message}")]
    ImageLoadError { path: PathBuf, message: String },

    #[error("Invalid viewport {width}x{height}")]
    InvalidViewport { width: f32, height: f32 },

    #[error("Settings error: {message}")]
    SettingsError { message: String },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ViewerError>;

impl ViewerError {
    /// Graphics failures leave the view blank until the surface is rebuilt.
    pub fn is_graphics_failure(&self) -> bool {
        matches!(
            self,
            ViewerError::ProgramCompile { .. }
                | ViewerError::ProgramLink { .. }
                | ViewerError::BufferAllocation { .. }
                | ViewerError::TextureUpload { .. }
        )
    }

    /// Returns a user-friendly error message with recovery suggestions
    pub fn user_message(&self) -> String {
        let base_message = self.to_string();
        let suggestion = match self {
            ViewerError::ProgramCompile { .. } | ViewerError::ProgramLink { .. } => {
                "The graphics driver rejected the image shader. Try updating your drivers."
            }
            ViewerError::BufferAllocation { .. } | ViewerError::TextureUpload { .. } => {
                "The graphics device is out of memory. Close other applications and try again."
            }
            ViewerError::ImageLoadError { .. } => "The image file may be corrupted or in an unsupported format.",
            ViewerError::InvalidViewport { .. } => "The view has no visible area yet.",
            ViewerError::SettingsError { .. } | ViewerError::JsonError { .. } => {
                "Settings could not be read. Defaults will be used instead."
            }
            ViewerError::IoError { .. } => "File system error occurred. Check disk space and permissions.",
        };

        format!("{}\n\n{}", base_message, suggestion)
    }

    /// Returns an error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ViewerError::ProgramCompile { .. } => "PROGRAM_COMPILE_ERROR",
            ViewerError::ProgramLink { .. } => "PROGRAM_LINK_ERROR",
            ViewerError::BufferAllocation { .. } => "BUFFER_ALLOCATION_ERROR",
            ViewerError::TextureUpload { .. } => "TEXTURE_UPLOAD_ERROR",
            ViewerError::ImageLoadError { .. } => "IMAGE_LOAD_ERROR",
            ViewerError::InvalidViewport { .. } => "INVALID_VIEWPORT",
            ViewerError::SettingsError { .. } => "SETTINGS_ERROR",
            ViewerError::IoError { .. } => "IO_ERROR",
            ViewerError::JsonError { .. } => "JSON_ERROR",
        }
    }

    /// Logs the error once at the level matching its severity.
    pub fn log(&self) {
        if self.is_graphics_failure() {
            tracing::error!(code = self.error_code(), error = %self, "graphics disabled");
        } else {
            tracing::warn!(code = self.error_code(), error = %self, "viewer error");
        }
    }
}
