use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("TensorFlow error: {0}")]
    Tensorflow(#[from] tensorflow::Status),

    #[error(
        "Operation '{op}' requires device '{device}'. This model was exported with operations \
         pinned to a GPU and will not work in a CPU environment. Export the graph again with \
         device placement cleared (for example by freezing it with `clear_devices=True`) and \
         replace the cached artifact."
    )]
    IncompatibleArtifact { op: String, device: String },

    #[error("Could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Label error: {0}")]
    Labels(String),
}

pub type Result<T> = std::result::Result<T, Error>;
