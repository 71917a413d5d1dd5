use serde::{Deserialize, Serialize};

use crate::error::{Result, RnnError};

/// Parameter kinds of one directional cell, in state-dict order
pub const PARAMETER_KINDS: [&str; 4] = ["weight_ih", "weight_hh", "bias_ih", "bias_hh"];

/// Which recurrent cell a network is built from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RnnMode {
    Gru,
    Lstm,
}

impl RnnMode {
    /// Number of gates stacked in each weight matrix: (r, z, n) for GRU, (i, f, g, o) for LSTM
    pub fn gate_count(&self) -> usize {
        match self {
            RnnMode::Gru => 3,
            RnnMode::Lstm => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RnnMode::Gru => "GRU",
            RnnMode::Lstm => "LSTM",
        }
    }
}

/// Direction a cell walks the sequence in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Suffix appended to parameter names of this direction
    pub fn suffix(&self) -> &'static str {
        match self {
            Direction::Forward => "",
            Direction::Backward => "_reverse",
        }
    }
}

/// Name of a parameter in the state dict, e.g. `weight_hh_l2_reverse`
pub fn parameter_name(kind: &str, layer: usize, direction: Direction) -> String {
    format!("{}_l{}{}", kind, layer, direction.suffix())
}

/// Hyperparameters of a (possibly stacked and bidirectional) recurrent layer
///
/// Mirrors the constructor arguments of the usual framework layers: defaults
/// are one layer, unidirectional, time-major and with biases.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RnnConfig {
    pub mode: RnnMode,
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub bidirectional: bool,
    pub batch_first: bool,
    pub bias: bool,
}

impl RnnConfig {
    pub fn new(mode: RnnMode, input_size: usize, hidden_size: usize) -> Self {
        RnnConfig {
            mode,
            input_size,
            hidden_size,
            num_layers: 1,
            bidirectional: false,
            batch_first: false,
            bias: true,
        }
    }

    pub fn gru(input_size: usize, hidden_size: usize) -> Self {
        Self::new(RnnMode::Gru, input_size, hidden_size)
    }

    pub fn lstm(input_size: usize, hidden_size: usize) -> Self {
        Self::new(RnnMode::Lstm, input_size, hidden_size)
    }

    pub fn with_num_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    pub fn with_bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }

    pub fn with_batch_first(mut self, batch_first: bool) -> Self {
        self.batch_first = batch_first;
        self
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    pub fn num_directions(&self) -> usize {
        if self.bidirectional { 2 } else { 1 }
    }

    pub fn directions(&self) -> &'static [Direction] {
        if self.bidirectional {
            &[Direction::Forward, Direction::Backward]
        } else {
            &[Direction::Forward]
        }
    }

    /// Feature size of the output sequence, hidden_size per direction
    pub fn output_size(&self) -> usize {
        self.hidden_size * self.num_directions()
    }

    /// Feature size consumed by layer `layer` (0-based)
    pub fn layer_input_size(&self, layer: usize) -> usize {
        if layer == 0 { self.input_size } else { self.output_size() }
    }

    /// Number of rows in `hn` / `cn`
    pub fn state_rows(&self) -> usize {
        self.num_layers * self.num_directions()
    }

    /// State-dict names in insertion order: layer, then direction, then parameter kind
    pub fn parameter_names(&self) -> Vec<String> {
        let kinds: &[&str] = if self.bias { &PARAMETER_KINDS } else { &PARAMETER_KINDS[..2] };
        let mut names = Vec::with_capacity(self.state_rows() * kinds.len());
        for layer in 0..self.num_layers {
            for &direction in self.directions() {
                for kind in kinds {
                    names.push(parameter_name(kind, layer, direction));
                }
            }
        }
        names
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(RnnError::InvalidConfig("input_size must be positive".to_string()));
        }
        if self.hidden_size == 0 {
            return Err(RnnError::InvalidConfig("hidden_size must be positive".to_string()));
        }
        if self.num_layers == 0 {
            return Err(RnnError::InvalidConfig("num_layers must be at least 1".to_string()));
        }
        Ok(())
    }
}
