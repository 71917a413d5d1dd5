//! Reference fixtures: one recurrent layer, one random input, one forward pass,
//! everything saved as a single named-tensor bundle.

use log::{info, warn};
use ndarray::{Array3, ArrayD};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::path::{Path, PathBuf};

use crate::config::{RnnConfig, RnnMode};
use crate::error::{Result, RnnError};
use crate::layers::RecurrentCell;
use crate::models::rnn_network::{GRUNetwork, LSTMNetwork, RecurrentNetwork, RnnOutput};
use crate::persistence::{FixtureMetadata, TensorBundle};
use crate::utils::{max_abs_diff, nan_max};

pub const INPUT_SIZE: usize = 10;
pub const HIDDEN_SIZE: usize = 20;
pub const BATCH_SIZE: usize = 5;
pub const SEQ_LEN: usize = 3;

/// Seed every fixture is generated from unless another is given
pub const DEFAULT_SEED: u64 = 42;

/// Largest difference `verify` accepts between stored and recomputed tensors
pub const VERIFY_TOLERANCE: f64 = 1e-7;

pub const INPUT_KEY: &str = "input";
pub const OUTPUT_KEY: &str = "output";
pub const HN_KEY: &str = "hn";
pub const CN_KEY: &str = "cn";

/// Keys a fixture adds on top of the parameter names
pub const RESERVED_KEYS: [&str; 4] = [INPUT_KEY, OUTPUT_KEY, HN_KEY, CN_KEY];

/// One fixture configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixtureSpec {
    pub name: &'static str,
    pub mode: RnnMode,
    pub num_layers: usize,
    pub bidirectional: bool,
}

pub const GRU_TEST: FixtureSpec = FixtureSpec::new("gru_test", RnnMode::Gru, 1, false);
pub const BI_GRU_TEST: FixtureSpec = FixtureSpec::new("bi_gru_test", RnnMode::Gru, 1, true);
pub const BI_GRU_NLAYER_TEST: FixtureSpec =
    FixtureSpec::new("bi_gru_nlayer_test", RnnMode::Gru, 3, true);
pub const LSTM_NLAYER_TEST: FixtureSpec =
    FixtureSpec::new("lstm_nlayer_test", RnnMode::Lstm, 3, false);
pub const BI_LSTM_NLAYER_TEST: FixtureSpec =
    FixtureSpec::new("bi_lstm_nlayer_test", RnnMode::Lstm, 3, true);
pub const LSTM_TEST: FixtureSpec = FixtureSpec::new("lstm_test", RnnMode::Lstm, 1, false);
pub const BI_LSTM_TEST: FixtureSpec = FixtureSpec::new("bi_lstm_test", RnnMode::Lstm, 1, true);

/// The five fixtures with a dedicated program
pub const FIXTURES: [FixtureSpec; 5] =
    [GRU_TEST, BI_GRU_TEST, BI_GRU_NLAYER_TEST, LSTM_NLAYER_TEST, BI_LSTM_NLAYER_TEST];

/// Every known fixture, including the single-layer LSTM ones consumers also load
pub const ALL_FIXTURES: [FixtureSpec; 7] = [
    GRU_TEST,
    BI_GRU_TEST,
    BI_GRU_NLAYER_TEST,
    LSTM_NLAYER_TEST,
    BI_LSTM_NLAYER_TEST,
    LSTM_TEST,
    BI_LSTM_TEST,
];

impl FixtureSpec {
    pub const fn new(
        name: &'static str,
        mode: RnnMode,
        num_layers: usize,
        bidirectional: bool,
    ) -> Self {
        FixtureSpec { name, mode, num_layers, bidirectional }
    }

    pub fn config(&self) -> RnnConfig {
        RnnConfig::new(self.mode, INPUT_SIZE, HIDDEN_SIZE)
            .with_num_layers(self.num_layers)
            .with_bidirectional(self.bidirectional)
            .with_batch_first(true)
    }

    pub fn file_name(&self) -> String {
        format!("{}.pt", self.name)
    }

    pub fn input_shape(&self) -> [usize; 3] {
        [BATCH_SIZE, SEQ_LEN, INPUT_SIZE]
    }

    pub fn by_name(name: &str) -> Option<FixtureSpec> {
        ALL_FIXTURES.iter().copied().find(|spec| spec.name == name)
    }
}

/// Generates the fixture from `seed`: parameters are drawn first, then the input
pub fn generate(spec: &FixtureSpec, seed: u64) -> Result<TensorBundle> {
    let mut rng = StdRng::seed_from_u64(seed);
    generate_with_rng(spec, Some(seed), &mut rng)
}

pub fn generate_with_rng<R: Rng + ?Sized>(
    spec: &FixtureSpec,
    seed: Option<u64>,
    rng: &mut R,
) -> Result<TensorBundle> {
    match spec.mode {
        RnnMode::Gru => {
            let network = GRUNetwork::with_rng(spec.config(), rng)?;
            build_bundle(spec, seed, network, rng)
        }
        RnnMode::Lstm => {
            let network = LSTMNetwork::with_rng(spec.config(), rng)?;
            build_bundle(spec, seed, network, rng)
        }
    }
}

fn build_bundle<C: RecurrentCell, R: Rng + ?Sized>(
    spec: &FixtureSpec,
    seed: Option<u64>,
    network: RecurrentNetwork<C>,
    rng: &mut R,
) -> Result<TensorBundle> {
    let input = Array3::random_using((BATCH_SIZE, SEQ_LEN, INPUT_SIZE), StandardNormal, rng);
    let RnnOutput { output, h_n, c_n } = network.forward(&input)?;

    let metadata = FixtureMetadata::new(spec.name, spec.config(), seed, BATCH_SIZE, SEQ_LEN);
    let mut bundle = TensorBundle::new(metadata);
    for (name, tensor) in network.state_dict() {
        bundle.insert(name, &tensor)?;
    }
    bundle.insert(INPUT_KEY, &input)?;
    bundle.insert(OUTPUT_KEY, &output)?;
    bundle.insert(HN_KEY, &h_n)?;
    if let Some(c_n) = c_n {
        bundle.insert(CN_KEY, &c_n)?;
    }

    info!("generated {} with {} tensors", spec.name, bundle.len());
    Ok(bundle)
}

/// Generates the fixture and saves it as `<dir>/<name>.pt`
pub fn write(spec: &FixtureSpec, seed: u64, dir: &Path) -> Result<PathBuf> {
    let bundle = generate(spec, seed)?;
    let path = dir.join(spec.file_name());
    bundle.save(&path)?;
    info!("wrote {}", path.display());
    Ok(path)
}

/// Every key a bundle for `config` holds: the parameters, then input, output,
/// hn and, for LSTM, cn
pub fn expected_keys(config: &RnnConfig) -> Vec<String> {
    let mut keys = config.parameter_names();
    keys.extend([INPUT_KEY, OUTPUT_KEY, HN_KEY].iter().map(|key| key.to_string()));
    if config.mode == RnnMode::Lstm {
        keys.push(CN_KEY.to_string());
    }
    keys
}

fn check_keys(bundle: &TensorBundle, config: &RnnConfig) -> Result<()> {
    let expected = expected_keys(config);
    if let Some(extra) = bundle.keys().find(|key| !expected.iter().any(|e| e == key)) {
        return Err(RnnError::UnexpectedTensor(extra.to_string()));
    }
    if let Some(missing) = expected.iter().find(|key| !bundle.contains(key)) {
        return Err(RnnError::MissingTensor(missing.clone()));
    }
    Ok(())
}

/// Max absolute differences between stored tensors and a fresh forward pass
#[derive(Clone, Debug, PartialEq)]
pub struct VerifyReport {
    pub name: String,
    pub output_diff: f64,
    pub hn_diff: f64,
    pub cn_diff: Option<f64>,
}

impl VerifyReport {
    /// Largest of the differences, NaN if any of them is NaN
    pub fn max_diff(&self) -> f64 {
        [self.output_diff, self.hn_diff, self.cn_diff.unwrap_or(0.0)]
            .into_iter()
            .fold(0.0, nan_max)
    }

    pub fn passed(&self, tolerance: f64) -> bool {
        self.max_diff() < tolerance
    }
}

/// Rebuilds the network from the bundle's parameters and re-runs its input
///
/// The bundle must hold exactly the keys of its recorded configuration.
pub fn verify(bundle: &TensorBundle) -> Result<VerifyReport> {
    let config = bundle.metadata.config.clone();
    check_keys(bundle, &config)?;
    match config.mode {
        RnnMode::Gru => verify_network(bundle, GRUNetwork::from_state_dict(config, bundle)?),
        RnnMode::Lstm => verify_network(bundle, LSTMNetwork::from_state_dict(config, bundle)?),
    }
}

/// Verifies `bundle` as the fixture `spec`, rejecting one generated for another fixture
pub fn verify_as(spec: &FixtureSpec, bundle: &TensorBundle) -> Result<VerifyReport> {
    let metadata = &bundle.metadata;
    if metadata.name != spec.name {
        return Err(RnnError::FixtureMismatch {
            expected: spec.name.to_string(),
            found: metadata.name.clone(),
        });
    }
    if metadata.config != spec.config() {
        return Err(RnnError::FixtureMismatch {
            expected: format!("{:?}", spec.config()),
            found: format!("{:?}", metadata.config),
        });
    }
    let [batch_size, seq_len, _] = spec.input_shape();
    if (metadata.batch_size, metadata.seq_len) != (batch_size, seq_len) {
        return Err(RnnError::FixtureMismatch {
            expected: format!("batch {} x seq {}", batch_size, seq_len),
            found: format!("batch {} x seq {}", metadata.batch_size, metadata.seq_len),
        });
    }
    verify(bundle)
}

fn verify_network<C: RecurrentCell>(
    bundle: &TensorBundle,
    network: RecurrentNetwork<C>,
) -> Result<VerifyReport> {
    let config = network.config();
    let (batch_size, seq_len) = (bundle.metadata.batch_size, bundle.metadata.seq_len);
    let time_shape =
        if config.batch_first { [batch_size, seq_len] } else { [seq_len, batch_size] };
    let state_shape = [config.state_rows(), batch_size, config.hidden_size];

    let input_shape = [time_shape[0], time_shape[1], config.input_size];
    let output_shape = [time_shape[0], time_shape[1], config.output_size()];

    let input = bundle
        .array_with_shape(INPUT_KEY, &input_shape)?
        .into_dimensionality()
        .map_err(|_| RnnError::InvalidConfig(format!("{} is not a rank-3 tensor", INPUT_KEY)))?;
    let result = network.forward(&input)?;

    let expected_output = bundle.array_with_shape(OUTPUT_KEY, &output_shape)?;
    let expected_hn = bundle.array_with_shape(HN_KEY, &state_shape)?;

    let output_diff = diff(OUTPUT_KEY, &result.output.into_dyn(), &expected_output)?;
    let hn_diff = diff(HN_KEY, &result.h_n.into_dyn(), &expected_hn)?;
    let cn_diff = match result.c_n {
        Some(c_n) => {
            let expected_cn = bundle.array_with_shape(CN_KEY, &state_shape)?;
            Some(diff(CN_KEY, &c_n.into_dyn(), &expected_cn)?)
        }
        None => None,
    };

    let report = VerifyReport { name: bundle.metadata.name.clone(), output_diff, hn_diff, cn_diff };
    if !report.passed(VERIFY_TOLERANCE) {
        warn!("{}: max diff {} exceeds {}", report.name, report.max_diff(), VERIFY_TOLERANCE);
    }
    Ok(report)
}

fn diff(name: &str, actual: &ArrayD<f64>, expected: &ArrayD<f64>) -> Result<f64> {
    max_abs_diff(actual, expected)
        .ok_or_else(|| RnnError::shape(name, expected.shape(), actual.shape()))
}
