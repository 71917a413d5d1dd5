//! # RNN Fixtures
//!
//! GRU and LSTM forward passes on `ndarray`, and the reference fixtures built
//! from them: a recurrent layer's parameters together with one random input,
//! the resulting output sequence and the final hidden (and cell) states.
//!
//! ## Core Components
//!
//! - **Cells**: GRU and LSTM cells over batches of column vectors
//! - **Networks**: stacked, optionally bidirectional, batch-first or time-major
//! - **Persistence**: ordered named-tensor bundles in JSON or a compact binary format
//! - **Fixtures**: the fixed configurations, their generation and verification
//!
//! ## Quick Start
//!
//! ```rust
//! use ndarray::Array3;
//! use rnn_fixtures::{GRUNetwork, RnnConfig};
//!
//! // Two stacked bidirectional GRU layers, 10 input features, 20 hidden units
//! let config = RnnConfig::gru(10, 20)
//!     .with_num_layers(2)
//!     .with_bidirectional(true)
//!     .with_batch_first(true);
//! let network = GRUNetwork::new(config).unwrap();
//!
//! let input = Array3::zeros((5, 3, 10));
//! let result = network.forward(&input).unwrap();
//!
//! assert_eq!(result.output.shape(), &[5, 3, 40]);
//! assert_eq!(result.h_n.shape(), &[4, 5, 20]);
//! ```

pub mod error;
pub mod utils;
pub mod config;
pub mod layers;
pub mod models;
pub mod persistence;
pub mod fixture;

// Re-export commonly used items
pub use config::{Direction, RnnConfig, RnnMode};
pub use error::{Result, RnnError};
pub use layers::RecurrentCell;
pub use layers::gru_cell::GRUCell;
pub use layers::lstm_cell::{LSTMCell, LSTMState};
pub use models::rnn_network::{GRUNetwork, LSTMNetwork, RecurrentNetwork, RnnOutput};
pub use persistence::{BundleFormat, FixtureMetadata, NamedTensor, TensorBundle};
pub use fixture::{FixtureSpec, VerifyReport};

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_library_integration() {
        let network = LSTMNetwork::new(RnnConfig::lstm(2, 3).with_num_layers(2)).unwrap();
        let input = Array3::ones((4, 1, 2));

        let result = network.forward(&input).unwrap();

        assert_eq!(result.output.shape(), &[4, 1, 3]);
        assert_eq!(result.h_n.shape(), &[2, 1, 3]);
        assert_eq!(result.c_n.map(|c| c.shape().to_vec()), Some(vec![2, 1, 3]));
    }
}
