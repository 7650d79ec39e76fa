// MNIST — IDX file format reader and writer
//
// IDX format (all header values big-endian u32):
//   images: magic(2051) | count | rows | cols | pixel_data(u8...)
//   labels: magic(2039 + classes) | count | label_data(u8...)
//
// The label magic doubles as the class count: the standard files carry 2049,
// i.e. ten classes. Images become (cols, rows, 1, 1) tensors scaled to
// [0, 1]; labels become one-hot (1, classes, 1, 1) columns.
//
// Header values are untrusted: rows, cols and classes must be at least 1,
// the image size must not overflow, and pixel buffers grow only as bytes
// arrive.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use axon_core::io::read_bytes;
use axon_core::{Error, Result, Tensor};

use crate::data::Data;

pub const IMAGES_MAGIC: u32 = 2051;
pub const LABELS_MAGIC_BASE: u32 = 2039;
/// Labels are single bytes.
pub const MAX_CLASSES: usize = 256;

fn read_be_u32(r: &mut dyn Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(truncated)?;
    Ok(u32::from_be_bytes(buf))
}

fn truncated(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::decode("MNIST: truncated file")
    } else {
        Error::Io(e)
    }
}

/// Read an image file and its label file from disk.
///
/// `max_images` caps the number of samples read; `None` reads them all.
pub fn read_mnist(
    images_path: impl AsRef<Path>,
    labels_path: impl AsRef<Path>,
    max_images: Option<usize>,
) -> Result<Vec<Data>> {
    let mut images = BufReader::new(File::open(images_path.as_ref())?);
    let mut labels = BufReader::new(File::open(labels_path.as_ref())?);
    let data = parse_mnist(&mut images, &mut labels, max_images)?;
    log::debug!(
        "loaded {} MNIST samples from {}",
        data.len(),
        images_path.as_ref().display()
    );
    Ok(data)
}

/// Decode IDX image and label streams.
pub fn parse_mnist(
    images: &mut dyn Read,
    labels: &mut dyn Read,
    max_images: Option<usize>,
) -> Result<Vec<Data>> {
    let magic = read_be_u32(images)?;
    if magic != IMAGES_MAGIC {
        return Err(Error::decode(format!(
            "MNIST: invalid image magic {magic:#06x}, expected {IMAGES_MAGIC:#06x}"
        )));
    }
    let image_count = read_be_u32(images)? as usize;
    let rows = read_be_u32(images)? as usize;
    let cols = read_be_u32(images)? as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::decode(format!(
            "MNIST: empty image size {rows}x{cols}"
        )));
    }
    let image_len = rows
        .checked_mul(cols)
        .ok_or_else(|| Error::decode(format!("MNIST: image size {rows}x{cols} overflows")))?;

    let label_magic = read_be_u32(labels)?;
    let classes = label_magic.saturating_sub(LABELS_MAGIC_BASE) as usize;
    if classes == 0 || classes > MAX_CLASSES {
        return Err(Error::decode(format!(
            "MNIST: invalid label magic {label_magic}, expected {} to {}",
            LABELS_MAGIC_BASE + 1,
            LABELS_MAGIC_BASE + MAX_CLASSES as u32
        )));
    }
    let label_count = read_be_u32(labels)? as usize;
    if label_count != image_count {
        return Err(Error::decode(format!(
            "MNIST: {image_count} images vs {label_count} labels"
        )));
    }

    let count = max_images.map_or(image_count, |m| m.min(image_count));
    let mut label = [0u8; 1];
    let mut data = Vec::new();
    for i in 0..count {
        let pixels = read_bytes(images, image_len).map_err(|e| match e {
            Error::Decode(_) => Error::decode(format!("MNIST: truncated image {i}")),
            other => other,
        })?;
        labels.read_exact(&mut label).map_err(truncated)?;

        let input = Tensor::from_vec(
            pixels.iter().map(|&p| p as f32 / 255.0).collect(),
            (cols, rows, 1, 1),
        )?;
        let class = label[0] as usize;
        if class >= classes {
            return Err(Error::decode(format!(
                "MNIST: label {class} of sample {i} exceeds {classes} classes"
            )));
        }
        let mut output = Tensor::zeros((1, classes, 1, 1));
        output.set(0, class, 0, 0, 1.0);
        data.push(Data::new(input, output)?);
    }
    Ok(data)
}

/// Write samples as an IDX image file and label file.
///
/// Inputs are quantised back to bytes; each label is the argmax of the
/// sample's target. An empty list writes nothing.
pub fn write_mnist(
    data: &[Data],
    images_path: impl AsRef<Path>,
    labels_path: impl AsRef<Path>,
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let mut images = BufWriter::new(File::create(images_path)?);
    let mut labels = BufWriter::new(File::create(labels_path)?);
    encode_mnist(data, &mut images, &mut labels)?;
    images.flush()?;
    labels.flush()?;
    Ok(())
}

/// Encode samples into IDX image and label streams.
pub fn encode_mnist(data: &[Data], images: &mut dyn Write, labels: &mut dyn Write) -> Result<()> {
    let Some(first) = data.first() else {
        return Ok(());
    };
    let sample = first.input.shape().with_batch(1);
    let classes = first.output.shape().batch_len();
    if classes > MAX_CLASSES {
        return Err(Error::config(format!(
            "MNIST labels are single bytes, got {classes} classes"
        )));
    }

    images.write_all(&IMAGES_MAGIC.to_be_bytes())?;
    images.write_all(&(data.len() as u32).to_be_bytes())?;
    images.write_all(&(sample.height() as u32).to_be_bytes())?;
    images.write_all(&(sample.width() as u32).to_be_bytes())?;
    labels.write_all(&(LABELS_MAGIC_BASE + classes as u32).to_be_bytes())?;
    labels.write_all(&(data.len() as u32).to_be_bytes())?;

    for d in data {
        if d.input.shape() != sample || d.output.shape().batch_len() != classes {
            return Err(Error::shape_mismatch("MNIST sample", sample, d.input.shape()));
        }
        let bytes: Vec<u8> = d
            .input
            .values()
            .iter()
            .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
            .collect();
        images.write_all(&bytes)?;
        labels.write_all(&[d.output.argmax(0) as u8])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::Shape;

    fn idx(images: &[u8], rows: u32, cols: u32, labels: &[u8], classes: u32) -> (Vec<u8>, Vec<u8>) {
        let count = labels.len() as u32;
        let mut img = Vec::new();
        for v in [IMAGES_MAGIC, count, rows, cols] {
            img.extend_from_slice(&v.to_be_bytes());
        }
        img.extend_from_slice(images);
        let mut lbl = Vec::new();
        for v in [LABELS_MAGIC_BASE + classes, count] {
            lbl.extend_from_slice(&v.to_be_bytes());
        }
        lbl.extend_from_slice(labels);
        (img, lbl)
    }

    #[test]
    fn test_parse_scales_and_one_hot_encodes() {
        let (img, lbl) = idx(&[0, 255, 51, 102, 255, 0, 0, 0], 2, 2, &[3, 0], 10);
        let data = parse_mnist(&mut img.as_slice(), &mut lbl.as_slice(), None).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].input.shape(), Shape::new(2, 2, 1, 1));
        assert_eq!(data[0].input.values(), &[0.0, 1.0, 0.2, 0.4]);
        assert_eq!(data[0].output.shape(), Shape::new(1, 10, 1, 1));
        assert_eq!(data[0].output.argmax(0), 3);
        assert_eq!(data[1].output.argmax(0), 0);
    }

    #[test]
    fn test_max_images() {
        let (img, lbl) = idx(&[0; 12], 2, 2, &[1, 2, 0], 3);
        let data = parse_mnist(&mut img.as_slice(), &mut lbl.as_slice(), Some(2)).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[1].output.values(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_rejects_bad_streams() {
        let (mut img, lbl) = idx(&[0; 4], 2, 2, &[1], 2);
        img[3] = 0;
        assert!(parse_mnist(&mut img.as_slice(), &mut lbl.as_slice(), None).is_err());

        let (img, lbl) = idx(&[0; 4], 2, 2, &[5], 2);
        assert!(parse_mnist(&mut img.as_slice(), &mut lbl.as_slice(), None).is_err());

        let (img, lbl) = idx(&[0; 3], 2, 2, &[1], 2);
        let err = parse_mnist(&mut img.as_slice(), &mut lbl.as_slice(), None).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    fn raw_header(rows: u32, cols: u32, label_magic: u32) -> (Vec<u8>, Vec<u8>) {
        let mut img = Vec::new();
        for v in [IMAGES_MAGIC, 1, rows, cols] {
            img.extend_from_slice(&v.to_be_bytes());
        }
        let mut lbl = Vec::new();
        for v in [label_magic, 1] {
            lbl.extend_from_slice(&v.to_be_bytes());
        }
        lbl.push(0);
        (img, lbl)
    }

    #[test]
    fn test_rejects_empty_image_size() {
        for (rows, cols) in [(0, 0), (0, 28), (28, 0)] {
            let (img, lbl) = raw_header(rows, cols, LABELS_MAGIC_BASE + 10);
            let err = parse_mnist(&mut img.as_slice(), &mut lbl.as_slice(), None).unwrap_err();
            assert!(matches!(err, Error::Decode(_)), "{rows}x{cols}");
        }
    }

    #[test]
    fn test_huge_image_size_is_decode_error() {
        // no pixel data follows, so only the header is consumed
        let (img, lbl) = raw_header(u32::MAX, u32::MAX, LABELS_MAGIC_BASE + 10);
        let err = parse_mnist(&mut img.as_slice(), &mut lbl.as_slice(), None).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_rejects_out_of_range_class_count() {
        for magic in [LABELS_MAGIC_BASE, LABELS_MAGIC_BASE + 257, u32::MAX, 0] {
            let (img, lbl) = raw_header(1, 1, magic);
            let err = parse_mnist(&mut img.as_slice(), &mut lbl.as_slice(), None).unwrap_err();
            assert!(matches!(err, Error::Decode(_)), "magic {magic}");
        }
        let (mut img, lbl) = raw_header(1, 1, LABELS_MAGIC_BASE + 256);
        img.push(0);
        let data = parse_mnist(&mut img.as_slice(), &mut lbl.as_slice(), None).unwrap();
        assert_eq!(data[0].output.shape(), Shape::new(1, 256, 1, 1));
    }
}
