//! Food image classification on top of a frozen TensorFlow graph.
//!
//! The crate covers the two startup steps of the service, fetching the
//! model artifact if it is not cached yet and loading it, plus the
//! inference path used by the HTTP server and the CLI.

pub mod classifier;
pub mod config;
pub mod error;
pub mod labels;
pub mod provision;
pub mod timer;

#[cfg(test)]
mod test_utils;

pub use classifier::{Classification, Classify, ImageClassifier};
pub use config::{ClassifierConfig, ModelOpts, Normalization};
pub use error::{Error, Result};
pub use labels::Labels;
pub use timer::Timer;

use log::info;

/// Provision the artifact described by `opts` and load it.
///
/// Runs to completion before callers start serving anything.
pub async fn setup_classifier(opts: &ModelOpts) -> Result<ImageClassifier> {
    let model_path = opts.model_path();

    if provision::ensure_artifact(&opts.model_url, &model_path).await? {
        info!("Downloaded model to {}", model_path.display());
    }

    let labels = match &opts.labels {
        Some(path) => Labels::from_file(path)?,
        None => Labels::food101(),
    };

    ImageClassifier::load(&model_path, labels, opts.classifier_config())
}
