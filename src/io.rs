// io.rs - whole-file image read/write around the pure projection code

use crate::error::{ProjectionError, Result};
use crate::panorama::{AspectPolicy, Panorama};
use image::io::Reader as ImageReader;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Decode an image file, guessing the format from its content.
pub fn read_image(path: &Path) -> Result<DynamicImage> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProjectionError::NotFound(path.to_path_buf())
        } else {
            ProjectionError::io(path, e)
        }
    })?;
    let reader = BufReader::new(file);

    ImageReader::new(reader)
        .with_guessed_format()
        .map_err(image::ImageError::IoError)
        .and_then(|mut r| {
            // panoramas routinely exceed the decoder's default size limits
            r.no_limits();
            r.decode()
        })
        .map_err(|e| ProjectionError::codec(path, e))
}

/// Read an equirectangular panorama, applying `policy` to non-2:1 images.
pub fn open_panorama(path: &Path, policy: AspectPolicy) -> Result<Panorama> {
    let img = read_image(path)?;
    let (w, h) = img.dimensions();
    log::info!("loaded {} ({w}x{h})", path.display());
    Panorama::from_dynamic(img, policy)
}

/// Encode `img` to `path`, format chosen by extension.
///
/// The bytes go to a hidden sibling file first and are renamed into place,
/// so a failed encode or write never leaves a truncated image at `path`.
pub fn write_image(img: &DynamicImage, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path).map_err(|e| ProjectionError::codec(path, e))?;
    // JPEG has no alpha channel
    let img: Cow<'_, DynamicImage> = if format == ImageFormat::Jpeg && img.color().has_alpha() {
        Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8()))
    } else {
        Cow::Borrowed(img)
    };

    let tmp = partial_path(path);
    let written = encode_to(&img, format, &tmp, path).and_then(|()| {
        fs::rename(&tmp, path).map_err(|e| ProjectionError::io(path, e))
    });
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

fn encode_to(img: &DynamicImage, format: ImageFormat, tmp: &Path, path: &Path) -> Result<()> {
    let file = File::create(tmp).map_err(|e| ProjectionError::io(tmp, e))?;
    let mut writer = BufWriter::new(file);
    img.write_to(&mut writer, format)
        .map_err(|e| ProjectionError::codec(path, e))?;
    writer.flush().map_err(|e| ProjectionError::io(tmp, e))
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

/// `<dir>/<stem><suffix><.ext>` next to `path`.
pub fn derived_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{suffix}{ext}"))
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| ProjectionError::io(dir, e))
}
