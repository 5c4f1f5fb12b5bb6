use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    tensor::{backend::Backend, Tensor},
};

/// Configuration for the classification head shared by every architecture
#[derive(Config, Debug)]
pub struct ClassificationHeadConfig {
    /// Width of the encoder summary
    pub d_input: usize,

    /// Number of classes
    pub n_classes: usize,

    /// Dropout applied to the summary while training
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl ClassificationHeadConfig {
    /// Initialize the head
    pub fn init<B: Backend>(&self, device: &B::Device) -> ClassificationHead<B> {
        ClassificationHead {
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.d_input, self.n_classes).init(device),
            n_classes: self.n_classes,
        }
    }
}

/// Dropout followed by a linear layer producing one logit per class
#[derive(Module, Debug)]
pub struct ClassificationHead<B: Backend> {
    dropout: Dropout,
    output: Linear<B>,
    n_classes: usize,
}

impl<B: Backend> ClassificationHead<B> {
    /// Logits for a `[batch, d_input]` summary: [batch_size, n_classes]
    pub fn forward(&self, summary: Tensor<B, 2>) -> Tensor<B, 2> {
        self.output.forward(self.dropout.forward(summary))
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Stored output projection shape: [d_input, n_classes]
    pub fn weight_dims(&self) -> [usize; 2] {
        self.output.weight.val().dims()
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    type TestBackend = NdArray;

    #[test]
    fn test_one_logit_per_class() {
        let device = Default::default();
        let head = ClassificationHeadConfig::new(4, 3).init::<TestBackend>(&device);

        let logits = head.forward(Tensor::ones([2, 4], &device));

        assert_eq!(logits.dims(), [2, 3]);
        assert_eq!(head.n_classes(), 3);
        assert_eq!(head.weight_dims(), [4, 3]);
    }
}
