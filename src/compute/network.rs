//! Fixed-topology feedforward network with one hidden layer.
//!
//! Weights are stored in flat row-major buffers so that a population can
//! overwrite brains in place between generations without reallocating.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Layer widths of a network. Fixed for the lifetime of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkShape {
    pub inputs: usize,
    pub hidden: usize,
    pub outputs: usize,
}

impl NetworkShape {
    pub const fn new(inputs: usize, hidden: usize, outputs: usize) -> Self {
        Self {
            inputs,
            hidden,
            outputs,
        }
    }

    /// Total number of weights and biases.
    pub const fn parameter_count(&self) -> usize {
        self.hidden * self.inputs + self.hidden + self.outputs * self.hidden + self.outputs
    }
}

impl std::fmt::Display for NetworkShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.inputs, self.hidden, self.outputs)
    }
}

/// Network construction and recombination errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetworkError {
    #[error("Network shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch {
        expected: NetworkShape,
        found: NetworkShape,
    },
    #[error("Buffer {buffer} has length {found}, expected {expected}")]
    BufferLength {
        buffer: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Buffer {buffer} contains a non-finite value")]
    NonFinite { buffer: &'static str },
}

/// Three-layer feedforward network with sigmoid activations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralNetwork {
    shape: NetworkShape,
    /// Input to hidden weights, `hidden` rows of `inputs` columns.
    weights_ih: Vec<f32>,
    /// Hidden to output weights, `outputs` rows of `hidden` columns.
    weights_ho: Vec<f32>,
    bias_h: Vec<f32>,
    bias_o: Vec<f32>,
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl NeuralNetwork {
    /// Create a network with every weight and bias drawn uniformly from [-1, 1].
    pub fn random<R: Rng + ?Sized>(shape: NetworkShape, rng: &mut R) -> Self {
        let mut draw = |n: usize| -> Vec<f32> {
            (0..n).map(|_| rng.gen_range(-1.0..=1.0)).collect()
        };

        let weights_ih = draw(shape.hidden * shape.inputs);
        let bias_h = draw(shape.hidden);
        let weights_ho = draw(shape.outputs * shape.hidden);
        let bias_o = draw(shape.outputs);

        Self {
            shape,
            weights_ih,
            weights_ho,
            bias_h,
            bias_o,
        }
    }

    /// Build a network from explicit buffers.
    pub fn from_parts(
        shape: NetworkShape,
        weights_ih: Vec<f32>,
        weights_ho: Vec<f32>,
        bias_h: Vec<f32>,
        bias_o: Vec<f32>,
    ) -> Result<Self, NetworkError> {
        let network = Self {
            shape,
            weights_ih,
            weights_ho,
            bias_h,
            bias_o,
        };
        network.validate()?;
        Ok(network)
    }

    /// Check buffer lengths against the shape and that every value is finite.
    pub fn validate(&self) -> Result<(), NetworkError> {
        let shape = self.shape;
        let buffers: [(&'static str, &[f32], usize); 4] = [
            ("weights_ih", &self.weights_ih, shape.hidden * shape.inputs),
            ("weights_ho", &self.weights_ho, shape.outputs * shape.hidden),
            ("bias_h", &self.bias_h, shape.hidden),
            ("bias_o", &self.bias_o, shape.outputs),
        ];
        for (buffer, values, expected) in buffers {
            if values.len() != expected {
                return Err(NetworkError::BufferLength {
                    buffer,
                    expected,
                    found: values.len(),
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(NetworkError::NonFinite { buffer });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn shape(&self) -> NetworkShape {
        self.shape
    }

    pub fn parameter_count(&self) -> usize {
        self.shape.parameter_count()
    }

    pub fn weights_input_hidden(&self) -> &[f32] {
        &self.weights_ih
    }

    pub fn weights_hidden_output(&self) -> &[f32] {
        &self.weights_ho
    }

    pub fn bias_hidden(&self) -> &[f32] {
        &self.bias_h
    }

    pub fn bias_output(&self) -> &[f32] {
        &self.bias_o
    }

    /// Every weight and bias in a fixed order.
    pub fn genes(&self) -> impl Iterator<Item = f32> + '_ {
        self.weights_ih
            .iter()
            .chain(&self.bias_h)
            .chain(&self.weights_ho)
            .chain(&self.bias_o)
            .copied()
    }

    fn genes_mut(&mut self) -> impl Iterator<Item = &mut f32> {
        self.weights_ih
            .iter_mut()
            .chain(self.bias_h.iter_mut())
            .chain(self.weights_ho.iter_mut())
            .chain(self.bias_o.iter_mut())
    }

    /// Forward pass: `sigmoid(W_ho * sigmoid(W_ih * x + b_h) + b_o)`.
    ///
    /// Inputs are used as given; callers normalize them. Missing inputs
    /// count as zero and extra inputs are ignored.
    pub fn forward(&self, inputs: &[f32]) -> Vec<f32> {
        debug_assert_eq!(inputs.len(), self.shape.inputs);

        let hidden: Vec<f32> = self
            .weights_ih
            .chunks_exact(self.shape.inputs.max(1))
            .zip(&self.bias_h)
            .map(|(row, bias)| {
                let sum: f32 = row.iter().zip(inputs).map(|(w, x)| w * x).sum();
                sigmoid(sum + bias)
            })
            .collect();

        self.weights_ho
            .chunks_exact(self.shape.hidden.max(1))
            .zip(&self.bias_o)
            .map(|(row, bias)| {
                let sum: f32 = row.iter().zip(&hidden).map(|(w, h)| w * h).sum();
                sigmoid(sum + bias)
            })
            .collect()
    }

    /// Gaussian mutation in place.
    ///
    /// Each gene independently, with probability `rate`, gets
    /// `N(0, strength)` added.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rate: f32, strength: f32, rng: &mut R) {
        for gene in self.genes_mut() {
            if rng.r#gen::<f32>() < rate {
                let noise: f32 = rng.sample(rand_distr::StandardNormal);
                *gene += noise * strength;
            }
        }
    }

    /// Uniform crossover: every gene comes from `a` or `b` with equal odds.
    pub fn crossover<R: Rng + ?Sized>(
        a: &NeuralNetwork,
        b: &NeuralNetwork,
        rng: &mut R,
    ) -> Result<NeuralNetwork, NetworkError> {
        let mut child = a.clone();
        Self::crossover_into(a, b, &mut child, rng)?;
        Ok(child)
    }

    /// Uniform crossover writing into an existing network of the same shape.
    pub fn crossover_into<R: Rng + ?Sized>(
        a: &NeuralNetwork,
        b: &NeuralNetwork,
        child: &mut NeuralNetwork,
        rng: &mut R,
    ) -> Result<(), NetworkError> {
        a.ensure_same_shape(b)?;
        a.ensure_same_shape(child)?;

        for ((slot, ga), gb) in child.genes_mut().zip(a.genes()).zip(b.genes()) {
            *slot = if rng.gen_bool(0.5) { ga } else { gb };
        }
        Ok(())
    }

    /// Overwrite this network's weights with `other`'s.
    pub fn copy_from(&mut self, other: &NeuralNetwork) -> Result<(), NetworkError> {
        self.ensure_same_shape(other)?;
        self.weights_ih.copy_from_slice(&other.weights_ih);
        self.weights_ho.copy_from_slice(&other.weights_ho);
        self.bias_h.copy_from_slice(&other.bias_h);
        self.bias_o.copy_from_slice(&other.bias_o);
        Ok(())
    }

    fn ensure_same_shape(&self, other: &NeuralNetwork) -> Result<(), NetworkError> {
        if self.shape != other.shape {
            return Err(NetworkError::ShapeMismatch {
                expected: self.shape,
                found: other.shape,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const SHAPE: NetworkShape = NetworkShape::new(4, 8, 1);

    #[test]
    fn test_random_within_unit_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let net = NeuralNetwork::random(SHAPE, &mut rng);

        assert_eq!(net.genes().count(), SHAPE.parameter_count());
        assert_eq!(SHAPE.parameter_count(), 4 * 8 + 8 + 8 + 1);
        assert!(net.genes().all(|g| (-1.0..=1.0).contains(&g)));
        assert!(net.validate().is_ok());
    }

    #[test]
    fn test_forward_matches_hand_computation() {
        let shape = NetworkShape::new(2, 1, 1);
        let net =
            NeuralNetwork::from_parts(shape, vec![1.0, -1.0], vec![2.0], vec![0.5], vec![-1.0])
                .unwrap();

        let hidden = sigmoid(0.3 * 1.0 + 0.2 * -1.0 + 0.5);
        let expected = sigmoid(2.0 * hidden - 1.0);
        let out = net.forward(&[0.3, 0.2]);
        assert_eq!(out.len(), 1);
        assert!((out[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_forward_saturates_without_nan() {
        let shape = NetworkShape::new(1, 1, 1);
        let net =
            NeuralNetwork::from_parts(shape, vec![1e6], vec![1e6], vec![0.0], vec![0.0]).unwrap();
        for x in [-1e6, 0.0, 1e6] {
            let out = net.forward(&[x])[0];
            assert!((0.0..=1.0).contains(&out), "{x} -> {out}");
        }
    }

    #[test]
    fn test_from_parts_rejects_bad_buffers() {
        let shape = NetworkShape::new(2, 2, 1);
        let err =
            NeuralNetwork::from_parts(shape, vec![0.0; 3], vec![0.0; 2], vec![0.0; 2], vec![0.0])
                .unwrap_err();
        assert_eq!(
            err,
            NetworkError::BufferLength {
                buffer: "weights_ih",
                expected: 4,
                found: 3
            }
        );

        let err = NeuralNetwork::from_parts(
            shape,
            vec![0.0; 4],
            vec![f32::NAN, 0.0],
            vec![0.0; 2],
            vec![0.0],
        )
        .unwrap_err();
        assert_eq!(err, NetworkError::NonFinite { buffer: "weights_ho" });
    }

    #[test]
    fn test_mutate_rate_zero_is_identity() {
        let mut rng = StdRng::seed_from_u64(2);
        let net = NeuralNetwork::random(SHAPE, &mut rng);
        let mut mutated = net.clone();
        mutated.mutate(0.0, 0.1, &mut rng);
        assert_eq!(net, mutated);
    }

    #[test]
    fn test_mutate_rate_one_touches_every_gene() {
        let mut rng = StdRng::seed_from_u64(3);
        let net = NeuralNetwork::random(SHAPE, &mut rng);
        let mut mutated = net.clone();
        mutated.mutate(1.0, 0.1, &mut rng);

        let changed = net
            .genes()
            .zip(mutated.genes())
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(changed, SHAPE.parameter_count());
        // 0.1 standard deviation: nothing should drift further than 1.0
        assert!(net.genes().zip(mutated.genes()).all(|(a, b)| (a - b).abs() < 1.0));
    }

    #[test]
    fn test_mutate_does_not_touch_clone() {
        let mut rng = StdRng::seed_from_u64(4);
        let original = NeuralNetwork::random(SHAPE, &mut rng);
        let frozen = original.clone();
        let mut live = original;
        live.mutate(1.0, 0.5, &mut rng);
        assert_ne!(live, frozen);
        assert!(frozen.validate().is_ok());
    }

    #[test]
    fn test_crossover_picks_parent_genes() {
        let mut rng = StdRng::seed_from_u64(5);
        let a = NeuralNetwork::random(SHAPE, &mut rng);
        let b = NeuralNetwork::random(SHAPE, &mut rng);
        let child = NeuralNetwork::crossover(&a, &b, &mut rng).unwrap();

        assert_eq!(child.shape(), SHAPE);
        let mut from_a = 0;
        let mut from_b = 0;
        for ((c, x), y) in child.genes().zip(a.genes()).zip(b.genes()) {
            assert!(c == x || c == y);
            if c == x {
                from_a += 1;
            }
            if c == y {
                from_b += 1;
            }
        }
        assert!(from_a > 0 && from_b > 0);
    }

    #[test]
    fn test_crossover_shape_mismatch() {
        let mut rng = StdRng::seed_from_u64(6);
        let a = NeuralNetwork::random(SHAPE, &mut rng);
        let b = NeuralNetwork::random(NetworkShape::new(4, 6, 1), &mut rng);
        let err = NeuralNetwork::crossover(&a, &b, &mut rng).unwrap_err();
        assert!(matches!(err, NetworkError::ShapeMismatch { .. }));

        let mut target = b.clone();
        assert!(target.copy_from(&a).is_err());
    }

    #[test]
    fn test_copy_from_is_bit_identical() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = NeuralNetwork::random(SHAPE, &mut rng);
        let mut b = NeuralNetwork::random(SHAPE, &mut rng);
        b.copy_from(&a).unwrap();
        assert_eq!(a, b);
    }
}
