use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;

use crate::error::{Result, RnnError};
use crate::utils::init_bound;

/// Weights and biases of one directional recurrent cell
///
/// Gate blocks are stacked along the rows: `weight_ih` is (gates * hidden, input),
/// `weight_hh` is (gates * hidden, hidden) and each bias is a (gates * hidden, 1)
/// column so it broadcasts across the batch columns.
#[derive(Clone, Debug, PartialEq)]
pub struct CellParameters {
    weight_ih: Array2<f64>,
    weight_hh: Array2<f64>,
    bias_ih: Option<Array2<f64>>,
    bias_hh: Option<Array2<f64>>,
    gate_count: usize,
    hidden_size: usize,
}

impl CellParameters {
    /// Draws every parameter from U(-1/√hidden, 1/√hidden), in state-dict order
    pub fn random<R: Rng + ?Sized>(
        gate_count: usize,
        input_size: usize,
        hidden_size: usize,
        bias: bool,
        rng: &mut R,
    ) -> Self {
        let bound = init_bound(hidden_size);
        let dist = Uniform::new(-bound, bound);
        let rows = gate_count * hidden_size;

        let weight_ih = Array2::random_using((rows, input_size), dist, rng);
        let weight_hh = Array2::random_using((rows, hidden_size), dist, rng);
        let (bias_ih, bias_hh) = if bias {
            let bias_ih = Array2::random_using((rows, 1), dist, rng);
            let bias_hh = Array2::random_using((rows, 1), dist, rng);
            (Some(bias_ih), Some(bias_hh))
        } else {
            (None, None)
        };

        CellParameters { weight_ih, weight_hh, bias_ih, bias_hh, gate_count, hidden_size }
    }

    /// Builds parameters from explicit arrays, checking every shape against `weight_hh`
    pub fn new(
        gate_count: usize,
        weight_ih: Array2<f64>,
        weight_hh: Array2<f64>,
        bias_ih: Option<Array1<f64>>,
        bias_hh: Option<Array1<f64>>,
    ) -> Result<Self> {
        let hidden_size = weight_hh.ncols();
        let rows = gate_count * hidden_size;
        if hidden_size == 0 {
            return Err(RnnError::InvalidConfig("weight_hh has no columns".to_string()));
        }
        if weight_hh.nrows() != rows {
            return Err(RnnError::shape("weight_hh", &[rows, hidden_size], weight_hh.shape()));
        }
        if weight_ih.nrows() != rows {
            return Err(RnnError::shape("weight_ih", &[rows, weight_ih.ncols()], weight_ih.shape()));
        }

        let as_column = |name: &str, bias: Array1<f64>| -> Result<Array2<f64>> {
            if bias.len() != rows {
                return Err(RnnError::shape(name, &[rows], bias.shape()));
            }
            Ok(bias.insert_axis(Axis(1)))
        };

        let (bias_ih, bias_hh) = match (bias_ih, bias_hh) {
            (Some(b_ih), Some(b_hh)) => {
                (Some(as_column("bias_ih", b_ih)?), Some(as_column("bias_hh", b_hh)?))
            }
            (None, None) => (None, None),
            _ => {
                return Err(RnnError::InvalidConfig(
                    "bias_ih and bias_hh must be given together".to_string(),
                ))
            }
        };

        Ok(CellParameters { weight_ih, weight_hh, bias_ih, bias_hh, gate_count, hidden_size })
    }

    pub fn gate_count(&self) -> usize {
        self.gate_count
    }

    pub fn input_size(&self) -> usize {
        self.weight_ih.ncols()
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn has_bias(&self) -> bool {
        self.bias_ih.is_some()
    }

    pub fn weight_ih(&self) -> &Array2<f64> {
        &self.weight_ih
    }

    pub fn weight_hh(&self) -> &Array2<f64> {
        &self.weight_hh
    }

    /// Input-side bias as a flat vector, the layout it is exported with
    pub fn bias_ih(&self) -> Option<Array1<f64>> {
        self.bias_ih.as_ref().map(|b| b.column(0).to_owned())
    }

    pub fn bias_hh(&self) -> Option<Array1<f64>> {
        self.bias_hh.as_ref().map(|b| b.column(0).to_owned())
    }

    /// W_ih · x + b_ih for a (input, batch) input
    pub fn input_projection(&self, input: &Array2<f64>) -> Array2<f64> {
        let projected = self.weight_ih.dot(input);
        match self.bias_ih {
            Some(ref bias) => projected + bias,
            None => projected,
        }
    }

    /// W_hh · h + b_hh for a (hidden, batch) state
    pub fn hidden_projection(&self, hidden: &Array2<f64>) -> Array2<f64> {
        let projected = self.weight_hh.dot(hidden);
        match self.bias_hh {
            Some(ref bias) => projected + bias,
            None => projected,
        }
    }
}

/// Rows of gate `index` inside a gate-stacked projection
pub fn gate(projection: &Array2<f64>, index: usize, hidden_size: usize) -> ArrayView2<'_, f64> {
    projection.slice(s![index * hidden_size..(index + 1) * hidden_size, ..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_shapes_and_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let params = CellParameters::random(4, 3, 5, true, &mut rng);

        assert_eq!(params.weight_ih().shape(), &[20, 3]);
        assert_eq!(params.weight_hh().shape(), &[20, 5]);
        assert_eq!(params.bias_ih().map(|b| b.len()), Some(20));
        assert_eq!(params.input_size(), 3);
        assert_eq!(params.hidden_size(), 5);

        let bound = init_bound(5);
        assert!(params.weight_ih().iter().all(|w| w.abs() <= bound));
        assert!(params.weight_hh().iter().all(|w| w.abs() <= bound));
    }

    #[test]
    fn test_random_is_reproducible() {
        let a = CellParameters::random(3, 2, 2, true, &mut StdRng::seed_from_u64(1));
        let b = CellParameters::random(3, 2, 2, true, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_new_rejects_bad_shapes() {
        let w_ih = Array2::zeros((6, 2));
        let w_hh = Array2::zeros((6, 2));

        assert!(CellParameters::new(3, w_ih.clone(), w_hh.clone(), None, None).is_ok());
        assert!(matches!(
            CellParameters::new(4, w_ih.clone(), w_hh.clone(), None, None),
            Err(RnnError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            CellParameters::new(
                3,
                w_ih.clone(),
                w_hh.clone(),
                Some(Array1::zeros(5)),
                Some(Array1::zeros(6)),
            ),
            Err(RnnError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            CellParameters::new(3, w_ih, w_hh, Some(Array1::zeros(6)), None),
            Err(RnnError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_projections_broadcast_bias() {
        let params = CellParameters::new(
            1,
            arr2(&[[1.0, 0.0], [0.0, 2.0]]),
            arr2(&[[1.0, 1.0], [0.0, 1.0]]),
            Some(arr1(&[0.5, -0.5])),
            Some(arr1(&[1.0, 1.0])),
        )
        .unwrap();

        // Two batch columns
        let x = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let h = arr2(&[[1.0, 0.0], [1.0, 2.0]]);

        assert_eq!(params.input_projection(&x), arr2(&[[1.5, 2.5], [5.5, 7.5]]));
        assert_eq!(params.hidden_projection(&h), arr2(&[[3.0, 3.0], [2.0, 3.0]]));
        assert_eq!(params.bias_ih(), Some(arr1(&[0.5, -0.5])));
    }

    #[test]
    fn test_gate_slices() {
        let projection = arr2(&[[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]]);
        assert_eq!(gate(&projection, 0, 2), arr2(&[[1.0], [2.0]]));
        assert_eq!(gate(&projection, 2, 2), arr2(&[[5.0], [6.0]]));
    }
}
