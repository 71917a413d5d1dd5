use ndarray::Array2;
use rand::Rng;

use crate::config::RnnMode;
use crate::error::Result;
use crate::layers::parameters::{gate, CellParameters};
use crate::layers::{check_gate_count, RecurrentCell};
use crate::utils::{sigmoid, tanh};

/// Hidden and memory state of an LSTM cell
#[derive(Clone, Debug, PartialEq)]
pub struct LSTMState {
    pub hidden: Array2<f64>,
    pub cell: Array2<f64>,
}

/// LSTM cell
///
/// Implements the standard LSTM equations, gate blocks ordered (i, f, g, o):
/// - i_t = σ(W_ii * x_t + b_ii + W_hi * h_t-1 + b_hi)
/// - f_t = σ(W_if * x_t + b_if + W_hf * h_t-1 + b_hf)
/// - g_t = tanh(W_ig * x_t + b_ig + W_hg * h_t-1 + b_hg)
/// - o_t = σ(W_io * x_t + b_io + W_ho * h_t-1 + b_ho)
/// - c_t = f_t ⊙ c_t-1 + i_t ⊙ g_t
/// - h_t = o_t ⊙ tanh(c_t)
#[derive(Clone, Debug)]
pub struct LSTMCell {
    params: CellParameters,
}

impl LSTMCell {
    pub fn hidden_size(&self) -> usize {
        self.params.hidden_size()
    }
}

impl RecurrentCell for LSTMCell {
    type State = LSTMState;

    const MODE: RnnMode = RnnMode::Lstm;

    fn random<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        bias: bool,
        rng: &mut R,
    ) -> Self {
        LSTMCell {
            params: CellParameters::random(
                Self::MODE.gate_count(),
                input_size,
                hidden_size,
                bias,
                rng,
            ),
        }
    }

    fn from_parameters(parameters: CellParameters) -> Result<Self> {
        check_gate_count(&parameters, Self::MODE)?;
        Ok(LSTMCell { params: parameters })
    }

    fn parameters(&self) -> &CellParameters {
        &self.params
    }

    fn zero_state(&self, batch_size: usize) -> LSTMState {
        LSTMState {
            hidden: Array2::zeros((self.hidden_size(), batch_size)),
            cell: Array2::zeros((self.hidden_size(), batch_size)),
        }
    }

    fn forward(&self, input: &Array2<f64>, state: &LSTMState) -> LSTMState {
        let hidden_size = self.hidden_size();

        // All four gates in one pass: [input_gate, forget_gate, cell_gate, output_gate]
        let gates =
            self.params.input_projection(input) + self.params.hidden_projection(&state.hidden);

        let input_gate = gate(&gates, 0, hidden_size).mapv(sigmoid);
        let forget_gate = gate(&gates, 1, hidden_size).mapv(sigmoid);
        let cell_gate = gate(&gates, 2, hidden_size).mapv(tanh);
        let output_gate = gate(&gates, 3, hidden_size).mapv(sigmoid);

        let cy = &forget_gate * &state.cell + &input_gate * &cell_gate;
        let hy = &output_gate * &cy.mapv(tanh);

        LSTMState { hidden: hy, cell: cy }
    }

    fn hidden(state: &LSTMState) -> &Array2<f64> {
        &state.hidden
    }

    fn memory(state: &LSTMState) -> Option<&Array2<f64>> {
        Some(&state.cell)
    }
}
