use crate::error::DataError;
use crate::model::networks::encoder::STACK_DEPTH;

/// One training example: a frame stack, its action label and, when the data
/// carries it, the fused gaze map aligned with the frames.
///
/// `frames` and `gaze` are row-major `[4, H, W]` buffers.
#[derive(Debug, Clone)]
pub struct ActionSample {
    pub frames: Vec<f32>,
    pub action: usize,
    pub gaze: Option<Vec<f32>>,
}

/// Which fields a dataset is asked to provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DataFields {
    pub frames: bool,
    pub actions: bool,
    pub fused_gazes: bool,
}

impl DataFields {
    /// Frames and actions only; gaze has to come from a teacher model.
    pub const FRAMES_ACTIONS: DataFields = DataFields {
        frames: true,
        actions: true,
        fused_gazes: false,
    };

    /// Frames, actions and fused gaze maps.
    pub const WITH_FUSED_GAZES: DataFields = DataFields {
        frames: true,
        actions: true,
        fused_gazes: true,
    };
}

impl Default for DataFields {
    fn default() -> Self {
        DataFields::WITH_FUSED_GAZES
    }
}

/// Game and dataset splits a dual-stream classifier trains and validates on.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DatasetSplits {
    pub game: String,
    pub dataset_train: String,
    pub dataset_val: String,
    /// Request fused gaze maps from the data; when false the gaze comes
    /// from a teacher model.
    pub fused_gazes: bool,
}

impl Default for DatasetSplits {
    fn default() -> Self {
        DatasetSplits {
            game: "breakout".to_string(),
            dataset_train: "combined".to_string(),
            dataset_val: "combined".to_string(),
            fused_gazes: true,
        }
    }
}

impl DatasetSplits {
    pub fn fields(&self) -> DataFields {
        if self.fused_gazes {
            DataFields::WITH_FUSED_GAZES
        } else {
            DataFields::FRAMES_ACTIONS
        }
    }
}

/// Read access to a labelled set of frame stacks.
pub trait ActionDataset {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sample(&self, index: usize) -> Result<&ActionSample, DataError>;

    /// Spatial size `[H, W]` of every frame in the dataset.
    fn input_shape(&self) -> [usize; 2];

    /// True when every sample carries a fused gaze map.
    fn has_fused_gazes(&self) -> bool;

    /// Action labels in sample order.
    fn labels(&self) -> Vec<usize>;
}

/// Opens dataset splits for a game.
pub trait DatasetProvider {
    fn open(
        &self,
        game: &str,
        split: &str,
        fields: DataFields,
    ) -> Result<Box<dyn ActionDataset>, DataError>;
}

/// Dataset held entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    samples: Vec<ActionSample>,
    input_shape: [usize; 2],
    has_fused_gazes: bool,
}

impl InMemoryDataset {
    /// Build a dataset, checking every buffer against `[4, H, W]`.
    pub fn new(samples: Vec<ActionSample>, input_shape: [usize; 2]) -> Result<Self, DataError> {
        let expected = STACK_DEPTH * input_shape[0] * input_shape[1];
        for sample in &samples {
            if sample.frames.len() != expected {
                return Err(DataError::SampleSize {
                    what: "frame stack",
                    expected,
                    actual: sample.frames.len(),
                });
            }
            if let Some(gaze) = &sample.gaze {
                if gaze.len() != expected {
                    return Err(DataError::SampleSize {
                        what: "gaze map",
                        expected,
                        actual: gaze.len(),
                    });
                }
            }
        }
        let has_fused_gazes = !samples.is_empty() && samples.iter().all(|s| s.gaze.is_some());
        Ok(InMemoryDataset {
            samples,
            input_shape,
            has_fused_gazes,
        })
    }

    /// Drop gaze maps, as when a split is opened without `fused_gazes`.
    pub fn without_gazes(mut self) -> Self {
        for sample in &mut self.samples {
            sample.gaze = None;
        }
        self.has_fused_gazes = false;
        self
    }
}

impl ActionDataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn sample(&self, index: usize) -> Result<&ActionSample, DataError> {
        self.samples.get(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: self.samples.len(),
        })
    }

    fn input_shape(&self) -> [usize; 2] {
        self.input_shape
    }

    fn has_fused_gazes(&self) -> bool {
        self.has_fused_gazes
    }

    fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.action).collect()
    }
}
