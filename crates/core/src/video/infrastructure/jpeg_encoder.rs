use std::io::Cursor;
use std::path::Path;

use crate::shared::frame::Frame;

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Encodes an RGB frame as JPEG using the `image` crate.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if frame.channels() != 3 {
        return Err(format!("Cannot encode {}-channel frame as JPEG", frame.channels()).into());
    }
    let mut bytes = Cursor::new(Vec::new());
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder.encode(
        frame.data(),
        frame.width(),
        frame.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(bytes.into_inner())
}

/// Writes encoded bytes next to `path` then renames over it, so readers
/// never see a half-written snapshot.
pub fn write_snapshot(path: &Path, jpeg: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("part");
    std::fs::write(&temp_path, jpeg)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let data = rgb.repeat((width * height) as usize);
        Frame::new(data, width, height, 3, 0)
    }

    #[test]
    fn test_encodes_decodable_jpeg() {
        let jpeg = encode_jpeg(&solid_frame(32, 16, [200, 30, 30]), DEFAULT_JPEG_QUALITY).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (32, 16));
        let px = decoded.get_pixel(16, 8);
        assert!(px[0] > 150 && px[1] < 80);
    }

    #[test]
    fn test_rejects_non_rgb_frames() {
        let frame = Frame::new(vec![0u8; 4 * 4], 4, 4, 1, 0);
        assert!(encode_jpeg(&frame, DEFAULT_JPEG_QUALITY).is_err());
    }

    #[test]
    fn test_write_snapshot_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap").join("latest.jpg");
        write_snapshot(&path, b"first").unwrap();
        write_snapshot(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!path.with_extension("part").exists());
    }
}
