use rand::Rng;
use rand_distr::StandardNormal;

/// Sensory input width: 8 vision rays x 3 features per ray.
pub const INPUT_SIZE: usize = 24;
/// Width of both hidden layers.
pub const HIDDEN_SIZE: usize = 16;
/// One output per action, in the canonical order Up, Down, Left, Right.
pub const OUTPUT_SIZE: usize = 4;

/// Weights are clamped to +/- this bound after every mutation.
pub const WEIGHT_LIMIT: f32 = 2.0;

const WEIGHT_INIT_STD: f32 = 0.2;

/// A fixed-topology feed-forward controller: 24 -> 16 (ReLU) -> 16 (ReLU)
/// -> 4 (softmax).
///
/// The parameters are the genome: networks are never gradient-trained, only
/// mutated and recombined. Weight matrices are row-major (`w[input * out_len
/// + output]`), matching the persisted checkpoint layout.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuralController {
    pub(crate) w1: Vec<f32>,
    pub(crate) w2: Vec<f32>,
    pub(crate) w3: Vec<f32>,
    pub(crate) b1: Vec<f32>,
    pub(crate) b2: Vec<f32>,
    pub(crate) b3: Vec<f32>,
}

impl NeuralController {
    /// Create a controller with Gaussian-initialized weights and zero biases.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let mut sample = |n: usize| -> Vec<f32> {
            (0..n)
                .map(|_| rng.sample::<f32, _>(StandardNormal) * WEIGHT_INIT_STD)
                .collect()
        };
        Self {
            w1: sample(INPUT_SIZE * HIDDEN_SIZE),
            w2: sample(HIDDEN_SIZE * HIDDEN_SIZE),
            w3: sample(HIDDEN_SIZE * OUTPUT_SIZE),
            b1: vec![0.0; HIDDEN_SIZE],
            b2: vec![0.0; HIDDEN_SIZE],
            b3: vec![0.0; OUTPUT_SIZE],
        }
    }

    pub(crate) fn from_parts(
        w1: Vec<f32>,
        w2: Vec<f32>,
        w3: Vec<f32>,
        b1: Vec<f32>,
        b2: Vec<f32>,
        b3: Vec<f32>,
    ) -> Self {
        Self { w1, w2, w3, b1, b2, b3 }
    }

    /// Forward pass: two affine+ReLU layers, then affine + softmax.
    ///
    /// The output is a probability distribution over the four actions in
    /// canonical order.
    pub fn forward(&self, input: &[f32; INPUT_SIZE]) -> [f32; OUTPUT_SIZE] {
        let mut h1 = [0.0f32; HIDDEN_SIZE];
        affine(input, &self.w1, &self.b1, &mut h1);
        relu(&mut h1);

        let mut h2 = [0.0f32; HIDDEN_SIZE];
        affine(&h1, &self.w2, &self.b2, &mut h2);
        relu(&mut h2);

        let mut out = [0.0f32; OUTPUT_SIZE];
        affine(&h2, &self.w3, &self.b3, &mut out);
        softmax(&mut out);
        out
    }

    /// Mutate the controller in place.
    ///
    /// Each weight matrix is perturbed independently: with probability
    /// `rate` the *entire* matrix receives elementwise Gaussian noise scaled
    /// by `magnitude`. Weights are then clamped to +/- [`WEIGHT_LIMIT`].
    /// Biases are left untouched.
    pub fn mutate<R: Rng>(&mut self, rate: f32, magnitude: f32, rng: &mut R) {
        for weights in [&mut self.w1, &mut self.w2, &mut self.w3] {
            if rng.gen::<f32>() < rate {
                for w in weights.iter_mut() {
                    *w += rng.sample::<f32, _>(StandardNormal) * magnitude;
                }
            }
            for w in weights.iter_mut() {
                *w = w.clamp(-WEIGHT_LIMIT, WEIGHT_LIMIT);
            }
        }
    }

    /// Uniform crossover at individual-weight granularity: every weight
    /// position takes its value from `self` or `other` on a fair coin.
    /// Biases are inherited from `self`.
    pub fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        let mix = |a: &[f32], b: &[f32], rng: &mut R| -> Vec<f32> {
            a.iter()
                .zip(b)
                .map(|(&x, &y)| if rng.gen_bool(0.5) { x } else { y })
                .collect()
        };
        Self {
            w1: mix(&self.w1, &other.w1, rng),
            w2: mix(&self.w2, &other.w2, rng),
            w3: mix(&self.w3, &other.w3, rng),
            b1: self.b1.clone(),
            b2: self.b2.clone(),
            b3: self.b3.clone(),
        }
    }

    /// True when every parameter is a finite number. Mutation keeps weights
    /// bounded, so a non-finite value means the controller is corrupt and
    /// must not enter selection.
    pub fn is_finite(&self) -> bool {
        [&self.w1, &self.w2, &self.w3, &self.b1, &self.b2, &self.b3]
            .iter()
            .all(|p| p.iter().all(|v| v.is_finite()))
    }
}

fn affine(input: &[f32], weights: &[f32], biases: &[f32], out: &mut [f32]) {
    out.copy_from_slice(biases);
    for (i, &x) in input.iter().enumerate() {
        let row = &weights[i * out.len()..(i + 1) * out.len()];
        for (o, &w) in out.iter_mut().zip(row) {
            *o += x * w;
        }
    }
}

fn relu(values: &mut [f32]) {
    for v in values.iter_mut() {
        *v = v.max(0.0);
    }
}

/// Numerically stable softmax: the row maximum is subtracted before
/// exponentiating, so the exponentials never overflow.
fn softmax(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
}
