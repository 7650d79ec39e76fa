use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::shape::Shape;
use crate::tensor::Tensor;

// Parameter cursors — named tensor (de)serialization
//
// Layers persist their parameters through these two cursors. The checkpoint
// container decides where the bytes go; a layer only writes and reads its
// tensors by name, in the same order on both sides.
//
// Wire format of one named tensor (all integers little-endian):
//
//   name_len: u32
//   name:     [u8; name_len]   (UTF-8)
//   dims:     [u32; 4]         (width, height, depth, batch)
//   data:     [f32; w*h*d*n]
//
// A short read surfaces as Error::Decode ("truncated"), every other I/O
// failure as Error::Io. Lengths and dims come from untrusted input, so the
// header is checked before any buffer is sized from it and buffers only grow
// as bytes actually arrive.

/// Longest accepted name, in bytes.
pub const MAX_NAME_LEN: usize = 1024;

/// Identity of one learnable parameter tensor, unique for the process.
/// Optimizer state is keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(u64);

impl Default for ParamId {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamId {
    /// Generate a fresh id from a global counter.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        ParamId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

fn read_err(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::decode("truncated stream")
    } else {
        Error::Io(e)
    }
}

pub fn write_u32(w: &mut dyn Write, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn read_u32(r: &mut dyn Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(read_err)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn write_str(w: &mut dyn Write, s: &str) -> Result<()> {
    write_u32(w, s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

pub fn read_str(r: &mut dyn Read) -> Result<String> {
    let len = read_u32(r)? as usize;
    if len > MAX_NAME_LEN {
        return Err(Error::decode(format!(
            "name of {len} bytes exceeds the {MAX_NAME_LEN} byte limit"
        )));
    }
    let buf = read_bytes(r, len)?;
    String::from_utf8(buf).map_err(|e| Error::decode(format!("name is not UTF-8: {e}")))
}

/// Read exactly `len` bytes without trusting `len` for the allocation.
pub fn read_bytes(r: &mut dyn Read, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    Read::take(&mut *r, len as u64)
        .read_to_end(&mut buf)
        .map_err(read_err)?;
    if buf.len() < len {
        return Err(Error::decode("truncated stream"));
    }
    Ok(buf)
}

/// Write cursor handed to each layer while saving.
pub struct ParamWriter<'a> {
    inner: &'a mut dyn Write,
}

impl<'a> ParamWriter<'a> {
    pub fn new(inner: &'a mut dyn Write) -> Self {
        ParamWriter { inner }
    }

    /// Append one named tensor.
    pub fn write_tensor(&mut self, name: &str, tensor: &Tensor) -> Result<()> {
        write_str(self.inner, name)?;
        for dim in tensor.shape().dims() {
            write_u32(self.inner, dim as u32)?;
        }
        let bytes: Vec<u8> = tensor
            .values()
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        self.inner.write_all(&bytes)?;
        Ok(())
    }
}

/// Read cursor handed to each layer while loading.
pub struct ParamReader<'a> {
    inner: &'a mut dyn Read,
}

impl<'a> ParamReader<'a> {
    pub fn new(inner: &'a mut dyn Read) -> Self {
        ParamReader { inner }
    }

    /// Read the next tensor and return it with its stored name.
    pub fn read_any(&mut self) -> Result<(String, Tensor)> {
        let (name, shape) = self.read_header()?;
        self.read_values(name, shape)
    }

    /// Read the next tensor, which must be called `name` and have `shape`.
    /// The stored header is checked before the payload is read.
    pub fn read_tensor(&mut self, name: &str, shape: Shape) -> Result<Tensor> {
        let (found, stored) = self.read_header()?;
        if found != name {
            return Err(Error::decode(format!(
                "expected parameter '{name}', found '{found}'"
            )));
        }
        if stored != shape {
            return Err(Error::shape_mismatch("load parameter", shape, stored));
        }
        let (_, tensor) = self.read_values(found, stored)?;
        Ok(tensor)
    }

    fn read_header(&mut self) -> Result<(String, Shape)> {
        let name = read_str(self.inner)?;
        let mut dims = [0usize; 4];
        for dim in dims.iter_mut() {
            *dim = read_u32(self.inner)? as usize;
        }
        let shape = Shape::from(dims);
        shape
            .validate()
            .map_err(|_| Error::decode(format!("tensor '{name}' has degenerate shape {shape}")))?;
        Ok((name, shape))
    }

    fn read_values(&mut self, name: String, shape: Shape) -> Result<(String, Tensor)> {
        let byte_len = shape
            .checked_len()
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| Error::decode(format!("tensor '{name}' shape {shape} is too large")))?;
        let bytes = read_bytes(self.inner, byte_len)?;
        let values = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok((name, Tensor::from_vec(values, shape)?))
    }
}
