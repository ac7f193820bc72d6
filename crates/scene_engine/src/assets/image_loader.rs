//! Image decoding into RGBA8 textures
//!
//! Cube maps are read from a single image holding the six faces stacked
//! vertically (+X, -X, +Y, -Y, +Z, -Z), so the image must be exactly six
//! times as tall as it is wide.

use std::path::Path;

use crate::scene::{ImageData, Texture, TextureKind};

use super::{LoadError, LoadResult};

fn decode_rgba(path: &Path) -> LoadResult<(u32, u32, Vec<u8>)> {
    log::debug!("Loading image from: {:?}", path);
    let image = image::open(path).map_err(|source| match source {
        image::ImageError::IoError(source) => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
        source => LoadError::Image {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    log::info!("Loaded image {}x{} from {:?}", width, height, path);
    Ok((width, height, rgba.into_raw()))
}

fn texture_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Decode a 2-D texture
pub fn load_texture_2d(path: &Path) -> LoadResult<Texture> {
    let (width, height, pixels) = decode_rgba(path)?;
    Ok(Texture {
        name: texture_name(path),
        path: Some(path.to_path_buf()),
        kind: TextureKind::Texture2D,
        image: ImageData {
            width,
            height,
            layers: 1,
            pixels,
        },
    })
}

/// Decode a cube texture from a vertical strip
pub fn load_texture_cube(path: &Path) -> LoadResult<Texture> {
    let (width, height, pixels) = decode_rgba(path)?;
    let image = cube_from_vertical_strip(width, height, pixels)
        .map_err(|reason| LoadError::InvalidScene(format!("{}: {}", path.display(), reason)))?;
    Ok(Texture {
        name: texture_name(path),
        path: Some(path.to_path_buf()),
        kind: TextureKind::Cube,
        image,
    })
}

/// Reinterpret a vertical strip as six square layers.
///
/// Rows of an RGBA8 strip are already laid out face after face, so the
/// pixel buffer is kept as is.
pub fn cube_from_vertical_strip(width: u32, height: u32, pixels: Vec<u8>) -> Result<ImageData, String> {
    if width == 0 || height != width * 6 {
        return Err(format!("cube strip must be W x 6W, got {width}x{height}"));
    }
    let image = ImageData {
        width,
        height: width,
        layers: 6,
        pixels,
    };
    if !image.is_consistent() {
        return Err(format!("cube strip holds {} bytes", image.pixels.len()));
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_strip_splits_into_six_layers() {
        let pixels = vec![0u8; 2 * 12 * 4];
        let image = cube_from_vertical_strip(2, 12, pixels).unwrap();
        assert_eq!((image.width, image.height, image.layers), (2, 2, 6));
        assert_eq!(image.layer_size(), 16);
    }

    #[test]
    fn test_non_strip_is_rejected() {
        assert!(cube_from_vertical_strip(4, 4, vec![0; 64]).is_err());
        assert!(cube_from_vertical_strip(0, 0, Vec::new()).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let error = load_texture_2d(Path::new("does/not/exist.png")).unwrap_err();
        assert!(matches!(error, LoadError::Io { .. }));
    }
}
