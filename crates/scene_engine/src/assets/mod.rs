//! Scene loading: JSON scene descriptions, glTF import and image decoding
//!
//! Every loader writes into a staged [`Scene`](crate::scene::Scene); the
//! live scene is only replaced once the whole load has succeeded.

pub mod gltf_loader;
pub mod image_loader;
pub mod scene_file;
pub mod scene_loader;

use std::path::PathBuf;

use thiserror::Error;

use crate::scene::SceneError;

pub use gltf_loader::import_gltf;
pub use image_loader::{load_texture_2d, load_texture_cube};
pub use scene_file::SceneFile;
pub use scene_loader::{load_scene_file, load_scene_str};

/// Scene and asset loading errors
#[derive(Error, Debug)]
pub enum LoadError {
    /// A file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The scene description is not valid JSON for the scene format
    #[error("invalid scene description: {0}")]
    Json(#[from] serde_json::Error),

    /// glTF parsing or buffer loading failed
    #[error("glTF import failed: {0}")]
    Gltf(#[from] gltf::Error),

    /// An image could not be decoded
    #[error("failed to decode image {path}: {source}")]
    Image {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: image::ImageError,
    },

    /// The input uses a feature the renderer does not handle
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An index in the input points past the end of its array
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The input is structurally wrong
    #[error("invalid scene: {0}")]
    InvalidScene(String),

    /// A scene limit was hit while loading
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Result alias for loading
pub type LoadResult<T> = Result<T, LoadError>;
