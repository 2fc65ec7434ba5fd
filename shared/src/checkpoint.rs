use crate::network::{NeuralController, HIDDEN_SIZE, INPUT_SIZE, OUTPUT_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The checkpoint format version - records must match this exactly.
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("unsupported checkpoint version {found} (this build reads version {expected})")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("layer sizes {0:?} do not match the fixed 24/16/16/4 topology")]
    TopologyMismatch([usize; 4]),

    #[error("{field} holds {found} values, expected {expected}")]
    ShapeMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("checkpoint contains non-finite parameters")]
    NonFinite,
}

/// The persisted form of a controller: a versioned header giving the four
/// layer sizes, followed by the three weight matrices (row-major) and the
/// three bias vectors. This is the only persisted-state format the core
/// requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerRecord {
    /// Format version, always [`CHECKPOINT_VERSION`] for records we write.
    pub version: u32,

    /// Input, hidden, hidden, output layer widths.
    pub layer_sizes: [usize; 4],

    /// Weight matrices in row-major order: input layer to first hidden,
    /// first hidden to second hidden, second hidden to output.
    pub w1: Vec<f32>,
    pub w2: Vec<f32>,
    pub w3: Vec<f32>,

    /// Bias vectors for the two hidden layers and the output layer.
    pub b1: Vec<f32>,
    pub b2: Vec<f32>,
    pub b3: Vec<f32>,
}

impl ControllerRecord {
    pub fn from_controller(controller: &NeuralController) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            layer_sizes: [INPUT_SIZE, HIDDEN_SIZE, HIDDEN_SIZE, OUTPUT_SIZE],
            w1: controller.w1.clone(),
            w2: controller.w2.clone(),
            w3: controller.w3.clone(),
            b1: controller.b1.clone(),
            b2: controller.b2.clone(),
            b3: controller.b3.clone(),
        }
    }

    /// Validate the record and rebuild the controller it describes.
    pub fn into_controller(self) -> Result<NeuralController, CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::VersionMismatch {
                expected: CHECKPOINT_VERSION,
                found: self.version,
            });
        }
        if self.layer_sizes != [INPUT_SIZE, HIDDEN_SIZE, HIDDEN_SIZE, OUTPUT_SIZE] {
            return Err(CheckpointError::TopologyMismatch(self.layer_sizes));
        }

        check_len("w1", &self.w1, INPUT_SIZE * HIDDEN_SIZE)?;
        check_len("w2", &self.w2, HIDDEN_SIZE * HIDDEN_SIZE)?;
        check_len("w3", &self.w3, HIDDEN_SIZE * OUTPUT_SIZE)?;
        check_len("b1", &self.b1, HIDDEN_SIZE)?;
        check_len("b2", &self.b2, HIDDEN_SIZE)?;
        check_len("b3", &self.b3, OUTPUT_SIZE)?;

        let controller = NeuralController::from_parts(
            self.w1, self.w2, self.w3, self.b1, self.b2, self.b3,
        );
        if !controller.is_finite() {
            return Err(CheckpointError::NonFinite);
        }
        Ok(controller)
    }
}

fn check_len(field: &'static str, values: &[f32], expected: usize) -> Result<(), CheckpointError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(CheckpointError::ShapeMismatch {
            field,
            expected,
            found: values.len(),
        })
    }
}
