/// Parameter storage shared by all cells.
pub mod parameters;

/// Gated recurrent unit cell.
pub mod gru_cell;

/// Long short-term memory cell.
pub mod lstm_cell;

use ndarray::Array2;
use rand::Rng;

use crate::config::RnnMode;
use crate::error::Result;
use parameters::CellParameters;

/// One directional recurrent cell operating on a batch of column vectors
///
/// Inputs are (input_size, batch) and states hold (hidden_size, batch) matrices,
/// one column per sequence in the batch.
pub trait RecurrentCell: Clone {
    /// Recurrent state carried between timesteps
    type State: Clone;

    const MODE: RnnMode;

    /// Creates a cell with freshly initialized parameters
    fn random<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        bias: bool,
        rng: &mut R,
    ) -> Self;

    /// Wraps existing parameters, rejecting a gate layout that does not belong to this cell
    fn from_parameters(parameters: CellParameters) -> Result<Self>;

    fn parameters(&self) -> &CellParameters;

    fn zero_state(&self, batch_size: usize) -> Self::State;

    /// Advances one timestep
    fn forward(&self, input: &Array2<f64>, state: &Self::State) -> Self::State;

    /// Hidden state h_t, which is also the cell's output at t
    fn hidden(state: &Self::State) -> &Array2<f64>;

    /// Memory cell c_t, for cells that carry one
    fn memory(_state: &Self::State) -> Option<&Array2<f64>> {
        None
    }
}

pub(crate) fn check_gate_count(parameters: &CellParameters, mode: RnnMode) -> Result<()> {
    if parameters.gate_count() != mode.gate_count() {
        return Err(crate::error::RnnError::InvalidConfig(format!(
            "{} cell needs {} gates, parameters have {}",
            mode.name(),
            mode.gate_count(),
            parameters.gate_count()
        )));
    }
    Ok(())
}
