use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },

    #[error("Slot {index} out of range (capacity {capacity})")]
    SlotOutOfRange { index: usize, capacity: usize },
}
