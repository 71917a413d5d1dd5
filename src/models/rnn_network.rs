use log::debug;
use ndarray::{s, Array2, Array3, ArrayD, Axis, Ix1, Ix2};
use rand::Rng;

use crate::config::{parameter_name, Direction, RnnConfig};
use crate::error::{Result, RnnError};
use crate::layers::gru_cell::GRUCell;
use crate::layers::lstm_cell::LSTMCell;
use crate::layers::parameters::CellParameters;
use crate::layers::RecurrentCell;
use crate::persistence::TensorBundle;

/// Multi-layer GRU network
pub type GRUNetwork = RecurrentNetwork<GRUCell>;

/// Multi-layer LSTM network
pub type LSTMNetwork = RecurrentNetwork<LSTMCell>;

/// Result of a forward pass over a whole sequence
#[derive(Clone, Debug, PartialEq)]
pub struct RnnOutput {
    /// Per-timestep output of the last layer, both directions concatenated
    pub output: Array3<f64>,
    /// Final hidden state per (layer, direction), shape (layers * directions, batch, hidden)
    pub h_n: Array3<f64>,
    /// Final memory cell per (layer, direction), LSTM only
    pub c_n: Option<Array3<f64>>,
}

/// One stacked layer: a forward cell and, when bidirectional, a backward cell
#[derive(Clone, Debug)]
pub struct RecurrentLayer<C> {
    pub forward: C,
    pub backward: Option<C>,
}

impl<C> RecurrentLayer<C> {
    /// Cells in (forward, backward) order
    pub fn cells(&self) -> impl Iterator<Item = (Direction, &C)> {
        std::iter::once((Direction::Forward, &self.forward))
            .chain(self.backward.iter().map(|cell| (Direction::Backward, cell)))
    }
}

/// Stacked, optionally bidirectional recurrent network
///
/// Layer l consumes the output sequence of layer l-1. In a bidirectional
/// network each layer runs a forward cell over t = 0..T-1 and an independent
/// backward cell over t = T-1..0, and concatenates their outputs per timestep.
#[derive(Clone, Debug)]
pub struct RecurrentNetwork<C: RecurrentCell> {
    config: RnnConfig,
    layers: Vec<RecurrentLayer<C>>,
}

impl<C: RecurrentCell> RecurrentNetwork<C> {
    /// Creates a network initialized from the thread-local random generator
    pub fn new(config: RnnConfig) -> Result<Self> {
        Self::with_rng(config, &mut rand::thread_rng())
    }

    /// Creates a network drawing every parameter from `rng`, in state-dict order
    pub fn with_rng<R: Rng + ?Sized>(config: RnnConfig, rng: &mut R) -> Result<Self> {
        Self::check_config(&config)?;

        let mut layers = Vec::with_capacity(config.num_layers);
        for layer in 0..config.num_layers {
            let input_size = config.layer_input_size(layer);
            let forward = C::random(input_size, config.hidden_size, config.bias, rng);
            let backward = if config.bidirectional {
                Some(C::random(input_size, config.hidden_size, config.bias, rng))
            } else {
                None
            };
            layers.push(RecurrentLayer { forward, backward });
        }

        Ok(RecurrentNetwork { config, layers })
    }

    /// Rebuilds a network from the parameters stored in `bundle` under their state-dict names
    pub fn from_state_dict(config: RnnConfig, bundle: &TensorBundle) -> Result<Self> {
        Self::check_config(&config)?;

        let load_cell = |layer: usize, direction: Direction| -> Result<C> {
            let name = |kind: &str| parameter_name(kind, layer, direction);
            let rows = C::MODE.gate_count() * config.hidden_size;

            let weight_ih = bundle
                .array_with_shape(&name("weight_ih"), &[rows, config.layer_input_size(layer)])?
                .into_dimensionality::<Ix2>()
                .map_err(|_| not_a("matrix", name("weight_ih")))?;
            let weight_hh = bundle
                .array_with_shape(&name("weight_hh"), &[rows, config.hidden_size])?
                .into_dimensionality::<Ix2>()
                .map_err(|_| not_a("matrix", name("weight_hh")))?;

            let (bias_ih, bias_hh) = if config.bias {
                let load_bias = |kind: &str| -> Result<_> {
                    bundle
                        .array_with_shape(&name(kind), &[rows])?
                        .into_dimensionality::<Ix1>()
                        .map_err(|_| not_a("vector", name(kind)))
                };
                (Some(load_bias("bias_ih")?), Some(load_bias("bias_hh")?))
            } else {
                (None, None)
            };

            let parameters = CellParameters::new(
                C::MODE.gate_count(),
                weight_ih,
                weight_hh,
                bias_ih,
                bias_hh,
            )?;
            C::from_parameters(parameters)
        };

        let mut layers = Vec::with_capacity(config.num_layers);
        for layer in 0..config.num_layers {
            let forward = load_cell(layer, Direction::Forward)?;
            let backward = if config.bidirectional {
                Some(load_cell(layer, Direction::Backward)?)
            } else {
                None
            };
            layers.push(RecurrentLayer { forward, backward });
        }

        Ok(RecurrentNetwork { config, layers })
    }

    fn check_config(config: &RnnConfig) -> Result<()> {
        config.validate()?;
        if config.mode != C::MODE {
            return Err(RnnError::InvalidConfig(format!(
                "{} configuration used for a {} network",
                config.mode.name(),
                C::MODE.name()
            )));
        }
        Ok(())
    }

    pub fn config(&self) -> &RnnConfig {
        &self.config
    }

    pub fn layers(&self) -> &[RecurrentLayer<C>] {
        &self.layers
    }

    /// Parameters by name, ordered by layer, then direction, then parameter kind
    pub fn state_dict(&self) -> Vec<(String, ArrayD<f64>)> {
        let mut entries = Vec::new();
        for (layer_idx, layer) in self.layers.iter().enumerate() {
            for (direction, cell) in layer.cells() {
                let params = cell.parameters();
                let name = |kind: &str| parameter_name(kind, layer_idx, direction);

                entries.push((name("weight_ih"), params.weight_ih().clone().into_dyn()));
                entries.push((name("weight_hh"), params.weight_hh().clone().into_dyn()));
                if let (Some(bias_ih), Some(bias_hh)) = (params.bias_ih(), params.bias_hh()) {
                    entries.push((name("bias_ih"), bias_ih.into_dyn()));
                    entries.push((name("bias_hh"), bias_hh.into_dyn()));
                }
            }
        }
        entries
    }

    /// Runs the whole sequence from zero initial states
    ///
    /// `input` is (batch, seq, input_size) when `batch_first`, otherwise
    /// (seq, batch, input_size). The output uses the same layout with
    /// `output_size()` features; `h_n`/`c_n` are always (rows, batch, hidden).
    pub fn forward(&self, input: &Array3<f64>) -> Result<RnnOutput> {
        let (batch_axis, time_axis) = if self.config.batch_first {
            (Axis(0), Axis(1))
        } else {
            (Axis(1), Axis(0))
        };
        let batch_size = input.len_of(batch_axis);
        let seq_len = input.len_of(time_axis);
        let features = input.len_of(Axis(2));

        if features != self.config.input_size {
            let expected = if self.config.batch_first {
                [batch_size, seq_len, self.config.input_size]
            } else {
                [seq_len, batch_size, self.config.input_size]
            };
            return Err(RnnError::shape("input", &expected, input.shape()));
        }
        if seq_len == 0 {
            return Err(RnnError::EmptySequence);
        }

        // Timestep t as a (features, batch) matrix, one column per sequence
        let mut sequence: Vec<Array2<f64>> = (0..seq_len)
            .map(|t| input.index_axis(time_axis, t).t().to_owned())
            .collect();

        let mut final_states = Vec::with_capacity(self.config.state_rows());
        for (layer_idx, layer) in self.layers.iter().enumerate() {
            let (forward_outputs, forward_state) =
                run_direction(&layer.forward, &sequence, Direction::Forward);
            final_states.push(forward_state);

            sequence = match layer.backward {
                Some(ref backward) => {
                    let (backward_outputs, backward_state) =
                        run_direction(backward, &sequence, Direction::Backward);
                    final_states.push(backward_state);

                    forward_outputs
                        .iter()
                        .zip(backward_outputs.iter())
                        .map(|(f, b)| concat_features(f, b))
                        .collect()
                }
                None => forward_outputs,
            };

            debug!("layer {} done, output features {}", layer_idx, sequence[0].nrows());
        }

        // Rows ordered layer by layer, forward before backward
        let hidden_size = self.config.hidden_size;
        let h_n = stack_states(final_states.iter().map(C::hidden), batch_size, hidden_size);
        let memories: Option<Vec<&Array2<f64>>> = final_states.iter().map(C::memory).collect();
        let c_n = memories.map(|m| stack_states(m.into_iter(), batch_size, hidden_size));

        let output_shape = if self.config.batch_first {
            (batch_size, seq_len, self.config.output_size())
        } else {
            (seq_len, batch_size, self.config.output_size())
        };
        let mut output = Array3::zeros(output_shape);
        for (t, step) in sequence.iter().enumerate() {
            output.index_axis_mut(time_axis, t).assign(&step.t());
        }

        Ok(RnnOutput { output, h_n, c_n })
    }
}

/// Walks one direction over the sequence, returning per-timestep outputs in
/// sequence order and the state after the last processed timestep
fn run_direction<C: RecurrentCell>(
    cell: &C,
    sequence: &[Array2<f64>],
    direction: Direction,
) -> (Vec<Array2<f64>>, C::State) {
    let batch_size = sequence[0].ncols();
    let mut state = cell.zero_state(batch_size);
    let mut outputs = Vec::with_capacity(sequence.len());

    match direction {
        Direction::Forward => {
            for input in sequence {
                state = cell.forward(input, &state);
                outputs.push(C::hidden(&state).clone());
            }
        }
        Direction::Backward => {
            for input in sequence.iter().rev() {
                state = cell.forward(input, &state);
                outputs.push(C::hidden(&state).clone());
            }
            // Reverse backward outputs to match forward sequence order
            outputs.reverse();
        }
    }

    (outputs, state)
}

fn not_a(kind: &str, name: String) -> RnnError {
    RnnError::InvalidConfig(format!("{} is not a {}", name, kind))
}

fn stack_states<'a>(
    states: impl ExactSizeIterator<Item = &'a Array2<f64>>,
    batch_size: usize,
    hidden_size: usize,
) -> Array3<f64> {
    let mut stacked = Array3::zeros((states.len(), batch_size, hidden_size));
    for (row, state) in states.enumerate() {
        stacked.index_axis_mut(Axis(0), row).assign(&state.t());
    }
    stacked
}

/// Stacks forward and backward outputs along the feature rows, forward first
fn concat_features(forward: &Array2<f64>, backward: &Array2<f64>) -> Array2<f64> {
    let mut combined = Array2::zeros((forward.nrows() + backward.nrows(), forward.ncols()));
    combined.slice_mut(s![..forward.nrows(), ..]).assign(forward);
    combined.slice_mut(s![forward.nrows().., ..]).assign(backward);
    combined
}
