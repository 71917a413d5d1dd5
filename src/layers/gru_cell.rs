use ndarray::Array2;
use rand::Rng;

use crate::config::RnnMode;
use crate::error::Result;
use crate::layers::parameters::{gate, CellParameters};
use crate::layers::{check_gate_count, RecurrentCell};
use crate::utils::{sigmoid, tanh};

/// GRU cell
///
/// Gate blocks in the weight matrices are ordered (reset, update, new):
/// - r_t = σ(W_ir * x_t + b_ir + W_hr * h_t-1 + b_hr)
/// - z_t = σ(W_iz * x_t + b_iz + W_hz * h_t-1 + b_hz)
/// - n_t = tanh(W_in * x_t + b_in + r_t ⊙ (W_hn * h_t-1 + b_hn))
/// - h_t = (1 - z_t) ⊙ n_t + z_t ⊙ h_t-1
#[derive(Clone, Debug)]
pub struct GRUCell {
    params: CellParameters,
}

impl GRUCell {
    pub fn hidden_size(&self) -> usize {
        self.params.hidden_size()
    }
}

impl RecurrentCell for GRUCell {
    type State = Array2<f64>;

    const MODE: RnnMode = RnnMode::Gru;

    fn random<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        bias: bool,
        rng: &mut R,
    ) -> Self {
        GRUCell {
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
        Ok(GRUCell { params: parameters })
    }

    fn parameters(&self) -> &CellParameters {
        &self.params
    }

    fn zero_state(&self, batch_size: usize) -> Array2<f64> {
        Array2::zeros((self.hidden_size(), batch_size))
    }

    fn forward(&self, input: &Array2<f64>, hx: &Array2<f64>) -> Array2<f64> {
        let hidden_size = self.hidden_size();
        let gi = self.params.input_projection(input);
        let gh = self.params.hidden_projection(hx);

        let reset_gate = (&gate(&gi, 0, hidden_size) + &gate(&gh, 0, hidden_size)).mapv(sigmoid);
        let update_gate = (&gate(&gi, 1, hidden_size) + &gate(&gh, 1, hidden_size)).mapv(sigmoid);

        // The reset gate scales the whole hidden projection, bias included
        let reset_hidden = &reset_gate * &gate(&gh, 2, hidden_size);
        let new_gate = (&gate(&gi, 2, hidden_size) + &reset_hidden).mapv(tanh);

        &update_gate.mapv(|z| 1.0 - z) * &new_gate + &update_gate * hx
    }

    fn hidden(state: &Array2<f64>) -> &Array2<f64> {
        state
    }
}
