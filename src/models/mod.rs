/// Stacked and bidirectional recurrent networks.
pub mod rnn_network;
