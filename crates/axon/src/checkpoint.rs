// Checkpoint — save and load network parameters
//
// Binary format, all integers u32 little-endian:
//
//   Header:
//     magic:   [u8; 4]  = b"AXON"
//     version: u32      = 1
//     layers:  u32      = number of layers
//
//   For each layer, in network order:
//     kind:    u32 length + UTF-8 bytes   (e.g. "Dense")
//     params:  u32      = number of parameter tensors
//     then per parameter (see ParamWriter):
//       name:  u32 length + UTF-8 bytes
//       dims:  [u32; 4]  (width, height, depth, batch)
//       data:  f32 LE * element count
//
// Loading checks magic, version, layer count, layer kinds, parameter names
// and shapes against the target network before replacing anything.

use std::io::{Read, Write};

use axon_core::io::{read_str, read_u32, write_str, write_u32};
use axon_core::{Error, ParamReader, ParamWriter, Result};
use axon_nn::Layer;

use crate::network::NeuralNetwork;

const MAGIC: &[u8; 4] = b"AXON";
const VERSION: u32 = 1;

fn param_tensors(layer: &dyn Layer) -> usize {
    layer.parameters().map_or(0, |p| p.len())
}

/// Serialise every layer's parameters.
pub fn write_network(net: &NeuralNetwork, w: &mut dyn Write) -> Result<()> {
    w.write_all(MAGIC)?;
    write_u32(w, VERSION)?;
    write_u32(w, net.layers.len() as u32)?;
    for layer in &net.layers {
        write_str(w, layer.kind())?;
        write_u32(w, param_tensors(layer.as_ref()) as u32)?;
        layer.save_parameters(&mut ParamWriter::new(&mut *w))?;
    }
    Ok(())
}

/// Restore parameters into `net`. On error `net` is left untouched.
pub fn read_network(net: &mut NeuralNetwork, r: &mut dyn Read) -> Result<()> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::decode("checkpoint: truncated header"),
        _ => Error::Io(e),
    })?;
    if &magic != MAGIC {
        return Err(Error::decode(format!(
            "checkpoint: expected magic {MAGIC:?}, got {magic:?}"
        )));
    }
    let version = read_u32(r)?;
    if version != VERSION {
        return Err(Error::decode(format!(
            "checkpoint: unsupported version {version} (expected {VERSION})"
        )));
    }
    let count = read_u32(r)? as usize;
    if count != net.layers.len() {
        return Err(Error::decode(format!(
            "checkpoint: {count} layers, network {} has {}",
            net.name,
            net.layers.len()
        )));
    }

    let mut loaded: Vec<Box<dyn Layer>> = Vec::with_capacity(count);
    for (i, layer) in net.layers.iter().enumerate() {
        let kind = read_str(r)?;
        if kind != layer.kind() {
            return Err(Error::decode(format!(
                "checkpoint: layer {i} is {kind}, network has {}",
                layer.kind()
            )));
        }
        let params = read_u32(r)? as usize;
        if params != param_tensors(layer.as_ref()) {
            return Err(Error::decode(format!(
                "checkpoint: layer {i} ({kind}) has {params} parameter tensors, expected {}",
                param_tensors(layer.as_ref())
            )));
        }
        let mut copy = layer.clone_layer();
        copy.load_parameters(&mut ParamReader::new(&mut *r))?;
        loaded.push(copy);
    }
    net.layers = loaded;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axon_core::Tensor;
    use axon_nn::{Activation, Dense, Flatten};

    fn net(seed: u64) -> NeuralNetwork {
        let mut net = NeuralNetwork::new("ckpt", (2, 2, 1, 1), seed).unwrap();
        net.add_layer(Flatten::new())
            .unwrap()
            .add_layer(Dense::new(3, Activation::Tanh))
            .unwrap();
        net
    }

    #[test]
    fn test_round_trip_in_memory() {
        let src = net(1);
        let mut dst = net(2);
        let x = Tensor::range((2, 2, 1, 1), 0.0, 0.25);
        let mut buf = Vec::new();
        write_network(&src, &mut buf).unwrap();
        assert_eq!(&buf[..4], b"AXON");

        read_network(&mut dst, &mut buf.as_slice()).unwrap();
        let mut src = src;
        assert_eq!(src.predict(&x).unwrap(), dst.predict(&x).unwrap());
    }

    #[test]
    fn test_bad_header_leaves_network_untouched() {
        let mut dst = net(2);
        let before = dst.clone_network();
        let mut buf = Vec::new();
        write_network(&net(1), &mut buf).unwrap();

        let mut bad_magic = buf.clone();
        bad_magic[0] = b'X';
        assert!(matches!(
            read_network(&mut dst, &mut bad_magic.as_slice()),
            Err(Error::Decode(_))
        ));

        let truncated = &buf[..buf.len() - 3];
        assert!(read_network(&mut dst, &mut &truncated[..]).is_err());

        let x = Tensor::range((2, 2, 1, 1), 0.0, 0.25);
        let mut before = before;
        assert_eq!(dst.predict(&x).unwrap(), before.predict(&x).unwrap());
    }

    #[test]
    fn test_oversized_tensor_header_is_decode_error() {
        let mut dst = NeuralNetwork::new("ckpt", (1, 2, 1, 1), 0).unwrap();
        dst.add_layer(Dense::new(3, Activation::Linear)).unwrap();

        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        write_u32(&mut buf, VERSION).unwrap();
        write_u32(&mut buf, 1).unwrap();
        write_str(&mut buf, "Dense").unwrap();
        write_u32(&mut buf, 2).unwrap();
        write_str(&mut buf, "weights").unwrap();
        for _ in 0..4 {
            write_u32(&mut buf, 65536).unwrap();
        }

        let before = dst.clone_network();
        let err = read_network(&mut dst, &mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. } | Error::Decode(_)));

        let x = Tensor::column(vec![0.5, -0.5]).unwrap();
        let mut before = before;
        assert_eq!(dst.predict(&x).unwrap(), before.predict(&x).unwrap());
    }

    #[test]
    fn test_oversized_kind_name_is_decode_error() {
        let mut dst = net(1);
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        write_u32(&mut buf, VERSION).unwrap();
        write_u32(&mut buf, 2).unwrap();
        write_u32(&mut buf, u32::MAX).unwrap();
        assert!(matches!(
            read_network(&mut dst, &mut buf.as_slice()),
            Err(Error::Decode(_))
        ));
    }
}
