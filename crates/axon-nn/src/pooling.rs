use axon_core::{PaddingType, PoolType, Result, Shape, Tensor};
use rand::rngs::StdRng;

use crate::layer::{Cache, Layer, Shapes};

/// Max or average pooling over square windows, without padding.
///
/// Output size per axis is `floor((input - filter_size) / stride) + 1`;
/// depth and batch are preserved. Has no parameters.
#[derive(Debug)]
pub struct Pooling {
    filter_size: usize,
    stride: usize,
    pool_type: PoolType,
    shapes: Shapes,
    cache: Cache,
}

impl Pooling {
    pub fn new(filter_size: usize, stride: usize, pool_type: PoolType) -> Self {
        Pooling {
            filter_size,
            stride,
            pool_type,
            shapes: Shapes::default(),
            cache: Cache::default(),
        }
    }

    pub fn max(filter_size: usize, stride: usize) -> Self {
        Self::new(filter_size, stride, PoolType::Max)
    }

    pub fn avg(filter_size: usize, stride: usize) -> Self {
        Self::new(filter_size, stride, PoolType::Avg)
    }

    pub fn pool_type(&self) -> PoolType {
        self.pool_type
    }
}

impl Layer for Pooling {
    fn kind(&self) -> &'static str {
        "Pooling"
    }

    fn init(&mut self, input_shape: Shape, _rng: &mut StdRng) -> Result<Shape> {
        let pad = PaddingType::Valid.params(
            input_shape.width(),
            input_shape.height(),
            self.filter_size,
            self.filter_size,
            self.stride,
        )?;
        let output = Shape::new(pad.out_width, pad.out_height, input_shape.depth(), 1);
        self.shapes.set(self.kind(), input_shape, output)
    }

    fn input_shape(&self) -> Option<Shape> {
        self.shapes.input()
    }

    fn output_shape(&self) -> Option<Shape> {
        self.shapes.output()
    }

    fn feed_forward(&mut self, input: &Tensor) -> Result<Tensor> {
        self.shapes.check_input("Pooling", input)?;
        let y = input.pool(self.filter_size, self.stride, self.pool_type, PaddingType::Valid)?;
        self.cache.store(input.clone(), y.clone());
        Ok(y)
    }

    fn back_prop(&mut self, output_gradient: &Tensor) -> Result<Tensor> {
        let (x, y) = self.cache.for_backward("Pooling", output_gradient)?;
        Tensor::pool_gradient(
            y,
            x,
            output_gradient,
            self.filter_size,
            self.stride,
            self.pool_type,
            PaddingType::Valid,
        )
    }

    fn clone_layer(&self) -> Box<dyn Layer> {
        Box::new(Pooling {
            shapes: self.shapes,
            ..Pooling::new(self.filter_size, self.stride, self.pool_type)
        })
    }
}
