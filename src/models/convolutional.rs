use burn::{
    module::Module,
    nn::conv::{Conv1d, Conv1dConfig},
    tensor::{activation::relu, backend::Backend, Tensor},
};

use crate::{
    error::{Error, Result},
    pipelines::text_classification::EmbeddedBatch,
};

use super::Summarize;

/// Added below the activations of windows that start on padding, so they never win the max
const WINDOW_MASK_FILL: f32 = 1e4;

/// Parallel 1D convolutions over the time axis, max-pooled over time and concatenated
#[derive(Module, Debug)]
pub struct Convolutional<B: Backend> {
    /// One convolution per kernel size
    convolutions: Vec<Conv1d<B>>,

    /// Filters per kernel size
    filters: usize,
}

impl<B: Backend> Convolutional<B> {
    /// Initialize one convolution for every kernel size
    pub fn init(d_input: usize, filters: usize, kernel_sizes: &[usize], device: &B::Device) -> Self {
        let convolutions = kernel_sizes
            .iter()
            .map(|&kernel_size| Conv1dConfig::new(d_input, filters, kernel_size).init(device))
            .collect();

        Self {
            convolutions,
            filters,
        }
    }

    /// Input channels of the stored convolutions
    pub fn input_size(&self) -> Option<usize> {
        // Conv1d weight: [filters, channels_in, kernel_size]
        self.convolutions
            .first()
            .map(|convolution| convolution.weight.val().dims()[1])
    }

    /// Summarize `[batch, length, dim]` vectors under a `[batch, length]` padding mask.
    ///
    /// Windows starting on padding are excluded from pooling, except the first window, which
    /// always counts so that an empty text still has a summary.
    pub fn forward(&self, vectors: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch_size, _, _] = vectors.dims();
        let device = vectors.device();

        // [batch_size, dim, length]
        let channels = vectors.swap_dims(1, 2);

        let pooled = self
            .convolutions
            .iter()
            .map(|convolution| {
                // [batch_size, filters, windows]
                let activations = relu(convolution.forward(channels.clone()));
                let [_, filters, windows] = activations.dims();

                let starts = mask
                    .clone()
                    .slice([0..batch_size, 0..windows])
                    .slice_assign([0..batch_size, 0..1], Tensor::ones([batch_size, 1], &device))
                    .reshape([batch_size, 1, windows])
                    .repeat(1, filters);

                let masked =
                    activations * starts.clone() + starts.sub_scalar(1.0).mul_scalar(WINDOW_MASK_FILL);

                masked.max_dim(2).reshape([batch_size, filters])
            })
            .collect();

        Tensor::cat(pooled, 1)
    }
}

impl<B: Backend> Summarize<B> for Convolutional<B> {
    fn output_size(&self) -> usize {
        self.filters * self.convolutions.len()
    }

    fn summarize(&self, input: EmbeddedBatch<B>) -> Result<Tensor<B, 2>> {
        match input {
            EmbeddedBatch::Sequence { vectors, mask } => Ok(self.forward(vectors, mask)),
            EmbeddedBatch::Pooled { vectors } => Err(Error::shape(
                "a [batch, length, dim] sequence",
                format!("pooled vectors {:?}", vectors.dims()),
            )),
        }
    }
}
