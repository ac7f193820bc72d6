//! CPU-side texture data
//!
//! Pixels are always RGBA8. Cube textures carry six layers in the order
//! +X, -X, +Y, -Y, +Z, -Z.

use std::path::PathBuf;

/// Index into one of the scene's flat texture arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

impl TextureId {
    /// Array slot
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which texture array a texture lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Sampled as `sampler2D`
    Texture2D,
    /// Sampled as `samplerCube`
    Cube,
}

impl TextureKind {
    /// Number of image layers
    pub const fn layer_count(self) -> u32 {
        match self {
            Self::Texture2D => 1,
            Self::Cube => 6,
        }
    }
}

/// Decoded RGBA8 pixels, layers stored back to back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Width of one layer
    pub width: u32,
    /// Height of one layer
    pub height: u32,
    /// Number of layers
    pub layers: u32,
    /// `width * height * layers * 4` bytes
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// 1x1 image of one color repeated over `layers`
    pub fn solid(color: [u8; 4], layers: u32) -> Self {
        Self {
            width: 1,
            height: 1,
            layers,
            pixels: color.repeat(layers as usize),
        }
    }

    /// Bytes in one layer
    pub fn layer_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// True when the pixel buffer matches the dimensions
    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.layer_size() * self.layers as usize
    }
}

/// Texture as held by a scene
#[derive(Debug, Clone)]
pub struct Texture {
    /// Display name
    pub name: String,
    /// File it was decoded from, if any
    pub path: Option<PathBuf>,
    /// Array the texture belongs to
    pub kind: TextureKind,
    /// Pixel data
    pub image: ImageData,
}

impl Texture {
    /// Texture with no source file
    pub fn from_image(name: impl Into<String>, kind: TextureKind, image: ImageData) -> Self {
        Self {
            name: name.into(),
            path: None,
            kind,
            image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_cube_has_six_layers() {
        let image = ImageData::solid([255, 0, 0, 255], TextureKind::Cube.layer_count());
        assert_eq!(image.pixels.len(), 24);
        assert!(image.is_consistent());
    }
}
