use macroquad::math::Vec2;
use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors that abort a load, save or GPU setup.
///
/// Recoverable misuse (out-of-range coordinates, unknown tile ids) never
/// produces one of these; it is logged and the call degrades to a no-op.
#[derive(Debug, Error)]
pub enum TilesError {
    /// File could not be opened, read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Malformed XML in a tileset file.
    #[error("XML error in {path}: {source}")]
    Xml {
        /// Tileset file
        path: PathBuf,
        /// Underlying parser/writer error
        #[source]
        source: quick_xml::Error,
    },

    /// The binary tilemap header or tileset path could not be read.
    #[error("Can't load tilemap {path}: {reason}")]
    InvalidHeader {
        /// Tilemap file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// A tileset file is structurally valid XML but not a usable tileset.
    #[error("Tileset file {path} is invalid: {reason}")]
    InvalidTileset {
        /// Tileset file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// The tileset does not name a texture (or has none bound when saving).
    #[error("Tileset {path} does not specify a texture")]
    MissingTexture {
        /// Tileset file
        path: PathBuf,
    },

    /// A `path` redirect pointed at another redirect.
    #[error("Tileset {path} redirects to {target}, which is itself a redirect")]
    RedirectChain {
        /// File holding the first redirect
        path: PathBuf,
        /// File holding the second redirect
        target: PathBuf,
    },

    /// Declared grid does not fit inside the texture.
    #[error("Dimensions of tileset {path} are larger than the texture it uses (extent {extent})")]
    AtlasOutOfBounds {
        /// Tileset file
        path: PathBuf,
        /// Normalized extent that was computed
        extent: Vec2,
    },

    /// Zero-area tilemap.
    #[error("Invalid tilemap dimensions [{width}x{height}]")]
    InvalidDimensions {
        /// Requested width
        width: u16,
        /// Requested height
        height: u16,
    },

    /// Image could not be decoded into a texture.
    #[error("Failed to load texture {path}: {reason}")]
    Texture {
        /// Image file
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// Tilemap shader failed to compile.
    #[error("Failed to compile tilemap shader: {0}")]
    Shader(String),

    /// Configuration file could not be parsed.
    #[error("Invalid config {path}: {source}")]
    Config {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

impl TilesError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TilesError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn xml(path: impl Into<PathBuf>, source: impl Into<quick_xml::Error>) -> Self {
        TilesError::Xml {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T, E = TilesError> = std::result::Result<T, E>;
