use chrono::{DateTime, Utc};
use log::debug;
use ndarray::{Array, ArrayD, Dimension, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::config::RnnConfig;
use crate::error::{Result, RnnError};

/// A tensor stored by name: row-major data plus its shape
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NamedTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl NamedTensor {
    pub fn from_array<D: Dimension>(name: impl Into<String>, array: &Array<f64, D>) -> Self {
        NamedTensor {
            name: name.into(),
            shape: array.shape().to_vec(),
            // Logical order, whatever the memory layout of `array`
            data: array.iter().cloned().collect(),
        }
    }

    pub fn to_array(&self) -> Result<ArrayD<f64>> {
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.data.clone())
            .map_err(|_| RnnError::shape(&self.name, &self.shape, &[self.data.len()]))
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Provenance of a fixture file
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FixtureMetadata {
    pub name: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub config: RnnConfig,
    pub seed: Option<u64>,
    pub batch_size: usize,
    pub seq_len: usize,
}

impl FixtureMetadata {
    pub fn new(
        name: impl Into<String>,
        config: RnnConfig,
        seed: Option<u64>,
        batch_size: usize,
        seq_len: usize,
    ) -> Self {
        FixtureMetadata {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            config,
            seed,
            batch_size,
            seq_len,
        }
    }
}

/// Ordered collection of uniquely named tensors with fixture metadata
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TensorBundle {
    pub metadata: FixtureMetadata,
    tensors: Vec<NamedTensor>,
}

impl TensorBundle {
    pub fn new(metadata: FixtureMetadata) -> Self {
        TensorBundle { metadata, tensors: Vec::new() }
    }

    /// Appends a tensor; names are unique within a bundle
    pub fn insert<D: Dimension>(
        &mut self,
        name: impl Into<String>,
        array: &Array<f64, D>,
    ) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(RnnError::DuplicateTensor(name));
        }
        self.tensors.push(NamedTensor::from_array(name, array));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.iter().any(|t| t.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&NamedTensor> {
        self.tensors.iter().find(|t| t.name == name)
    }

    pub fn array(&self, name: &str) -> Result<ArrayD<f64>> {
        self.get(name)
            .ok_or_else(|| RnnError::MissingTensor(name.to_string()))?
            .to_array()
    }

    /// Fetches a tensor and checks it has exactly `shape`
    pub fn array_with_shape(&self, name: &str, shape: &[usize]) -> Result<ArrayD<f64>> {
        let array = self.array(name)?;
        if array.shape() != shape {
            return Err(RnnError::shape(name, shape, array.shape()));
        }
        Ok(array)
    }

    /// Tensor names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tensors.iter().map(|t| t.name.as_str())
    }

    pub fn tensors(&self) -> &[NamedTensor] {
        &self.tensors
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Checks unique names and that every tensor's data fills its shape
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for tensor in &self.tensors {
            if !seen.insert(tensor.name.as_str()) {
                return Err(RnnError::DuplicateTensor(tensor.name.clone()));
            }
            if tensor.element_count() != tensor.data.len() {
                return Err(RnnError::shape(&tensor.name, &tensor.shape, &[tensor.data.len()]));
            }
        }
        Ok(())
    }

    /// Save to file, JSON for `.json` and the binary format for anything else
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        match BundleFormat::from_path(path.as_ref()) {
            BundleFormat::Json => BundlePersistence::save_to_json(self, path),
            BundleFormat::Binary => BundlePersistence::save_to_binary(self, path),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        match BundleFormat::from_path(path.as_ref()) {
            BundleFormat::Json => BundlePersistence::load_from_json(path),
            BundleFormat::Binary => BundlePersistence::load_from_binary(path),
        }
    }
}

/// On-disk encodings of a bundle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundleFormat {
    Json,
    Binary,
}

impl BundleFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => BundleFormat::Json,
            _ => BundleFormat::Binary,
        }
    }
}

/// Bundle persistence operations
pub struct BundlePersistence;

impl BundlePersistence {
    /// Save bundle to JSON format (human-readable)
    pub fn save_to_json<P: AsRef<Path>>(bundle: &TensorBundle, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(bundle)?;
        let mut file = File::create(path.as_ref())?;
        file.write_all(json.as_bytes())?;
        debug!("saved {} tensors as JSON to {}", bundle.len(), path.as_ref().display());
        Ok(())
    }

    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<TensorBundle> {
        let mut file = File::open(path.as_ref())?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let bundle: TensorBundle = serde_json::from_str(&contents)?;
        bundle.validate()?;
        debug!("loaded {} tensors from {}", bundle.len(), path.as_ref().display());
        Ok(bundle)
    }

    /// Save bundle to binary format (compact, exact)
    pub fn save_to_binary<P: AsRef<Path>>(bundle: &TensorBundle, path: P) -> Result<()> {
        let encoded = bincode::serialize(bundle)?;
        let mut file = File::create(path.as_ref())?;
        file.write_all(&encoded)?;
        debug!(
            "saved {} tensors ({} bytes) to {}",
            bundle.len(),
            encoded.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn load_from_binary<P: AsRef<Path>>(path: P) -> Result<TensorBundle> {
        let mut file = File::open(path.as_ref())?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        let bundle: TensorBundle = bincode::deserialize(&contents)?;
        bundle.validate()?;
        debug!("loaded {} tensors from {}", bundle.len(), path.as_ref().display());
        Ok(bundle)
    }
}
