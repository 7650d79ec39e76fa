use axon_core::{bail, Error, Result, Shape, Tensor};
use rand::rngs::StdRng;

use crate::layer::{Layer, Shapes};

// Flatten — reinterpret each sample as a column vector
//
//   (w, h, d, n) -> (1, w*h*d, 1, n)
//
// The buffer layout is unchanged, so forward and backward only swap the
// shape; no kernel runs and there are no parameters. The owned variants move
// the buffer, the borrowed ones copy it once.

/// Reshape-only layer between spatial layers and Dense layers.
#[derive(Debug, Clone, Default)]
pub struct Flatten {
    shapes: Shapes,
    last_batch: Option<usize>,
}

impl Flatten {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for Flatten {
    fn kind(&self) -> &'static str {
        "Flatten"
    }

    fn init(&mut self, input_shape: Shape, _rng: &mut StdRng) -> Result<Shape> {
        let output = Shape::new(1, input_shape.batch_len(), 1, 1);
        self.shapes.set(self.kind(), input_shape, output)
    }

    fn input_shape(&self) -> Option<Shape> {
        self.shapes.input()
    }

    fn output_shape(&self) -> Option<Shape> {
        self.shapes.output()
    }

    fn feed_forward(&mut self, input: &Tensor) -> Result<Tensor> {
        self.feed_forward_owned(input.clone())
    }

    fn back_prop(&mut self, output_gradient: &Tensor) -> Result<Tensor> {
        self.back_prop_owned(output_gradient.clone())
    }

    fn feed_forward_owned(&mut self, input: Tensor) -> Result<Tensor> {
        let (_, output) = self.shapes.check_input("Flatten", &input)?;
        self.last_batch = Some(input.batch());
        let batch = input.batch();
        input.into_reshaped(output.with_batch(batch))
    }

    fn back_prop_owned(&mut self, output_gradient: Tensor) -> Result<Tensor> {
        let (input, output) = self.shapes.require("Flatten")?;
        let Some(batch) = self.last_batch else {
            bail!("Flatten: back_prop called without a prior feed_forward");
        };
        let expected = output.with_batch(batch);
        if output_gradient.shape() != expected {
            return Err(Error::shape_mismatch(
                "Flatten",
                expected,
                output_gradient.shape(),
            ));
        }
        output_gradient.into_reshaped(input.with_batch(batch))
    }

    fn clone_layer(&self) -> Box<dyn Layer> {
        Box::new(Flatten {
            shapes: self.shapes,
            last_batch: None,
        })
    }
}
