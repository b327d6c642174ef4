use std::path::PathBuf;

use structopt::StructOpt;

/// Per-channel normalization applied after scaling pixels to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalization {
    pub const IMAGENET: Normalization = Normalization {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };
}

/// How images are turned into the model input tensor, and which graph
/// operations to feed and fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Side of the square `[1, size, size, 3]` input
    pub input_size: u32,

    pub input_op: String,

    pub output_op: String,

    pub normalization: Option<Normalization>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            input_size: 224,
            input_op: "serving_default_input_1".to_owned(),
            output_op: "StatefulPartitionedCall".to_owned(),
            normalization: Some(Normalization::IMAGENET),
        }
    }
}

/// Model location and preprocessing options shared by the binaries.
#[derive(StructOpt, Debug, Clone)]
pub struct ModelOpts {
    #[structopt(
        long,
        env = "FOOD_MODEL_URL",
        default_value = "https://www.dropbox.com/s/3x66dm6h52ynz8b/fullfood.pb?raw=1",
        help = "URL the model artifact is fetched from when not cached"
    )]
    pub model_url: String,

    #[structopt(
        long,
        env = "FOOD_MODEL_FILE",
        default_value = "fullfood.pb",
        help = "File name of the cached artifact inside the app directory"
    )]
    pub model_file: String,

    #[structopt(
        long,
        env = "FOOD_APP_DIR",
        default_value = "app",
        parse(from_os_str),
        help = "Application directory holding the model, static/ and view/"
    )]
    pub app_dir: PathBuf,

    #[structopt(
        long,
        env = "FOOD_LABELS",
        parse(from_os_str),
        help = "Labels file, one per line, overriding the built-in Food-101 list"
    )]
    pub labels: Option<PathBuf>,

    #[structopt(long, env = "FOOD_INPUT_OP", default_value = "serving_default_input_1")]
    pub input_op: String,

    #[structopt(long, env = "FOOD_OUTPUT_OP", default_value = "StatefulPartitionedCall")]
    pub output_op: String,

    #[structopt(long, env = "FOOD_INPUT_SIZE", default_value = "224")]
    pub input_size: u32,

    #[structopt(long, help = "Feed pixels scaled to [0, 1] without ImageNet normalization")]
    pub no_normalize: bool,
}

impl ModelOpts {
    pub fn model_path(&self) -> PathBuf {
        self.app_dir.join(&self.model_file)
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            input_size: self.input_size,
            input_op: self.input_op.clone(),
            output_op: self.output_op.clone(),
            normalization: if self.no_normalize {
                None
            } else {
                Some(Normalization::IMAGENET)
            },
        }
    }
}
