use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};

use crate::{
    error::{Error, Result},
    pipelines::text_classification::EmbeddedBatch,
    utils::tensors::blend,
};

use super::{config::CellKind, Summarize};

/// Gate count of a long short-term memory cell
const LSTM_GATES: usize = 4;

/// Gate count of a gated recurrent unit
const GRU_GATES: usize = 3;

impl CellKind {
    fn gates(&self) -> usize {
        match self {
            CellKind::Lstm => LSTM_GATES,
            CellKind::Gru => GRU_GATES,
        }
    }
}

/// A recurrent cell with all gates packed into two projections
#[derive(Module, Debug)]
pub struct Cell<B: Backend> {
    /// Input projection: [d_input, gates * d_hidden]
    input: Linear<B>,

    /// Hidden state projection: [d_hidden, gates * d_hidden]
    hidden: Linear<B>,

    /// Size of the hidden state
    d_hidden: usize,

    /// 4 for LSTM, 3 for GRU
    gates: usize,
}

/// The state carried between time steps. `memory` is only used by LSTM cells.
#[derive(Clone, Debug)]
pub struct CellState<B: Backend> {
    /// Hidden state: [batch_size, d_hidden]
    pub hidden: Tensor<B, 2>,

    /// Cell memory: [batch_size, d_hidden]
    pub memory: Tensor<B, 2>,
}

impl<B: Backend> CellState<B> {
    /// An all-zero state
    pub fn zeros(batch_size: usize, d_hidden: usize, device: &B::Device) -> Self {
        Self {
            hidden: Tensor::zeros([batch_size, d_hidden], device),
            memory: Tensor::zeros([batch_size, d_hidden], device),
        }
    }
}

impl<B: Backend> Cell<B> {
    /// Initialize a cell of the given kind
    pub fn init(kind: CellKind, d_input: usize, d_hidden: usize, device: &B::Device) -> Self {
        let gates = kind.gates();

        Self {
            input: LinearConfig::new(d_input, gates * d_hidden).init(device),
            hidden: LinearConfig::new(d_hidden, gates * d_hidden)
                .with_bias(false)
                .init(device),
            d_hidden,
            gates,
        }
    }

    /// Input width of the stored input projection
    pub fn input_size(&self) -> usize {
        self.input.weight.val().dims()[0]
    }

    /// Advance one time step
    pub fn step(&self, input: Tensor<B, 2>, state: CellState<B>) -> CellState<B> {
        let [batch_size, _] = input.dims();
        let n = self.d_hidden;

        let x = self.input.forward(input);
        let h = self.hidden.forward(state.hidden.clone());
        let gate = |packed: &Tensor<B, 2>, i: usize| {
            packed.clone().slice([0..batch_size, i * n..(i + 1) * n])
        };

        if self.gates == LSTM_GATES {
            let input_gate = sigmoid(gate(&x, 0) + gate(&h, 0));
            let forget_gate = sigmoid(gate(&x, 1) + gate(&h, 1));
            let candidate = (gate(&x, 2) + gate(&h, 2)).tanh();
            let output_gate = sigmoid(gate(&x, 3) + gate(&h, 3));

            let memory = forget_gate * state.memory + input_gate * candidate;
            let hidden = output_gate * memory.clone().tanh();

            CellState { hidden, memory }
        } else {
            let update_gate = sigmoid(gate(&x, 0) + gate(&h, 0));
            let reset_gate = sigmoid(gate(&x, 1) + gate(&h, 1));
            let candidate = (gate(&x, 2) + reset_gate * gate(&h, 2)).tanh();

            // h' = z * h + (1 - z) * candidate
            let hidden = blend(state.hidden, candidate, update_gate);

            CellState {
                hidden,
                memory: state.memory,
            }
        }
    }

    /// Run the cell over a sequence, leaving the state untouched wherever the mask is zero.
    ///
    /// Returns the hidden state after every time step (in time order) and the final state.
    pub fn scan(
        &self,
        inputs: &[Tensor<B, 2>],
        masks: &[Tensor<B, 2>],
        reverse: bool,
    ) -> (Vec<Tensor<B, 2>>, Tensor<B, 2>) {
        let [batch_size, _] = masks[0].dims();
        let mut state = CellState::zeros(batch_size, self.d_hidden, &masks[0].device());
        let mut outputs = Vec::with_capacity(inputs.len());

        let steps: Box<dyn Iterator<Item = usize>> = if reverse {
            Box::new((0..inputs.len()).rev())
        } else {
            Box::new(0..inputs.len())
        };

        for t in steps {
            let next = self.step(inputs[t].clone(), state.clone());
            let mask = masks[t].clone();

            state = CellState {
                hidden: blend(next.hidden, state.hidden, mask.clone()),
                memory: blend(next.memory, state.memory, mask),
            };
            outputs.push(state.hidden.clone());
        }

        if reverse {
            outputs.reverse();
        }

        (outputs, state.hidden)
    }
}

/// One recurrent layer, optionally reading the sequence in both directions
#[derive(Module, Debug)]
pub struct RecurrentLayer<B: Backend> {
    forward: Cell<B>,
    backward: Option<Cell<B>>,
}

impl<B: Backend> RecurrentLayer<B> {
    /// Per-step outputs and the summary of this layer
    fn run(
        &self,
        inputs: &[Tensor<B, 2>],
        masks: &[Tensor<B, 2>],
    ) -> (Vec<Tensor<B, 2>>, Tensor<B, 2>) {
        let (outputs, last) = self.forward.scan(inputs, masks, false);

        let Some(backward) = &self.backward else {
            return (outputs, last);
        };

        let (reversed, first) = backward.scan(inputs, masks, true);

        let outputs = outputs
            .into_iter()
            .zip(reversed)
            .map(|(f, b)| Tensor::cat(vec![f, b], 1))
            .collect();

        (outputs, Tensor::cat(vec![last, first], 1))
    }
}

/// A stack of recurrent layers summarizing a padded sequence by its final hidden state
#[derive(Module, Debug)]
pub struct Recurrent<B: Backend> {
    layers: Vec<RecurrentLayer<B>>,
    d_hidden: usize,
    directions: usize,
}

impl<B: Backend> Recurrent<B> {
    /// Initialize the stack
    pub fn init(
        kind: CellKind,
        d_input: usize,
        d_hidden: usize,
        n_layers: usize,
        bidirectional: bool,
        device: &B::Device,
    ) -> Self {
        let directions = if bidirectional { 2 } else { 1 };

        let layers = (0..n_layers)
            .map(|i| {
                let d_layer_input = if i == 0 { d_input } else { d_hidden * directions };

                RecurrentLayer {
                    forward: Cell::init(kind, d_layer_input, d_hidden, device),
                    backward: bidirectional
                        .then(|| Cell::init(kind, d_layer_input, d_hidden, device)),
                }
            })
            .collect();

        Self {
            layers,
            d_hidden,
            directions,
        }
    }

    /// Input width of the stored first layer
    pub fn input_size(&self) -> Option<usize> {
        self.layers.first().map(|layer| layer.forward.input_size())
    }

    /// Summarize `[batch, length, dim]` vectors under a `[batch, length]` padding mask
    pub fn forward(&self, vectors: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch_size, length, dim] = vectors.dims();

        let mut inputs: Vec<Tensor<B, 2>> = (0..length)
            .map(|t| {
                vectors
                    .clone()
                    .slice([0..batch_size, t..t + 1, 0..dim])
                    .reshape([batch_size, dim])
            })
            .collect();

        let masks: Vec<Tensor<B, 2>> = (0..length)
            .map(|t| {
                mask.clone()
                    .slice([0..batch_size, t..t + 1])
                    .repeat(1, self.d_hidden)
            })
            .collect();

        let mut summary = Tensor::zeros([batch_size, self.output_size()], &vectors.device());

        for layer in &self.layers {
            let (outputs, last) = layer.run(&inputs, &masks);
            inputs = outputs;
            summary = last;
        }

        summary
    }
}

impl<B: Backend> Summarize<B> for Recurrent<B> {
    fn output_size(&self) -> usize {
        self.d_hidden * self.directions
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

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;
    use crate::utils::tensors::{from_values, into_rows};

    type TestBackend = NdArray;

    fn assert_close(left: &[Vec<f32>], right: &[Vec<f32>]) {
        for (l, r) in left.iter().flatten().zip(right.iter().flatten()) {
            assert!((l - r).abs() < 1e-6, "{:?} != {:?}", left, right);
        }
    }

    fn summarize(
        model: &Recurrent<TestBackend>,
        values: Vec<f32>,
        mask: Vec<f32>,
        length: usize,
    ) -> Vec<Vec<f32>> {
        let device = Default::default();
        let vectors = from_values::<TestBackend, 3>(values, [1, length, 2], &device);
        let mask = from_values::<TestBackend, 2>(mask, [1, length], &device);

        into_rows(model.forward(vectors, mask))
    }

    #[test]
    fn test_padding_does_not_change_the_summary() {
        for kind in [CellKind::Lstm, CellKind::Gru] {
            let device = Default::default();
            let model = Recurrent::<TestBackend>::init(kind, 2, 3, 2, true, &device);

            let short = summarize(&model, vec![0.5, -1.0, 1.0, 0.25], vec![1.0, 1.0], 2);
            let padded = summarize(
                &model,
                vec![0.5, -1.0, 1.0, 0.25, 0.0, 0.0, 0.0, 0.0],
                vec![1.0, 1.0, 0.0, 0.0],
                4,
            );

            assert_close(&short, &padded);
        }
    }

    #[test]
    fn test_output_size_counts_directions() {
        let device = Default::default();

        let bidirectional = Recurrent::<TestBackend>::init(CellKind::Gru, 2, 4, 1, true, &device);
        let forward_only = Recurrent::<TestBackend>::init(CellKind::Gru, 2, 4, 1, false, &device);

        assert_eq!(summarize(&bidirectional, vec![1.0, 1.0], vec![1.0], 1)[0].len(), 8);
        assert_eq!(summarize(&forward_only, vec![1.0, 1.0], vec![1.0], 1)[0].len(), 4);
    }

    #[test]
    fn test_all_padding_summarizes_to_zero() {
        let device = Default::default();
        let model = Recurrent::<TestBackend>::init(CellKind::Lstm, 2, 3, 1, true, &device);

        let summary = summarize(&model, vec![0.0; 6], vec![0.0; 3], 3);

        assert_close(&summary, &[vec![0.0; 6]]);
    }
}
