use std::path::{Path, PathBuf};

use astro_link::Frame;
use image::ImageFormat;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::FlightError;

/// Where captured frames go.
pub trait ImageStore {
    fn save(&mut self, frame: &Frame) -> Result<PathBuf, FlightError>;
}

/// Writes `<unix-millis>.jpg` files into one directory, created on first use.
#[derive(Debug, Clone)]
pub struct DiskImageStore {
    dir: PathBuf,
}

impl DiskImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ImageStore for DiskImageStore {
    fn save(&mut self, frame: &Frame) -> Result<PathBuf, FlightError> {
        std::fs::create_dir_all(&self.dir)?;

        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let mut path = self.dir.join(format!("{}.jpg", millis));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}-{}.jpg", millis, n));
            n += 1;
        }

        frame
            .save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|e| FlightError::Capture(format!("encode {}: {}", path.display(), e)))?;
        debug!("capture: wrote {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_jpeg_into_created_dir() {
        let dir = std::env::temp_dir().join(format!("astro-capture-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let mut store = DiskImageStore::new(dir.join("captures"));

        let frame = Frame::from_pixel(8, 8, image::Rgb([10, 20, 30]));
        let first = store.save(&frame).unwrap();
        let second = store.save(&frame).unwrap();

        assert_ne!(first, second);
        assert_eq!(first.extension().and_then(|e| e.to_str()), Some("jpg"));
        assert_eq!(image::open(&first).unwrap().width(), 8);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
