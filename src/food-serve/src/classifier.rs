use std::path::Path;

use image::DynamicImage;
use log::{debug, info};
use serde::Serialize;
use tensorflow::{
    Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor,
};

use crate::{ClassifierConfig, Error, Labels, Result, Timer};

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Classification tag of the image
    pub tag: String,

    /// Score of the winning class as produced by the model
    pub probability: f32,

    /// Time spent decoding the image
    pub time_image_load: i64,

    /// Time resizing and scaling the image
    pub time_image_resize: i64,

    /// Time spent on running session
    pub time_session_run: i64,
}

impl Classification {
    pub fn new(tag: &str, probability: f32) -> Self {
        Classification {
            tag: tag.to_owned(),
            probability,
            ..Default::default()
        }
    }
}

/// Something that can turn an image into a single class.
///
/// Implementations are shared read-only between concurrent requests.
pub trait Classify: Send + Sync {
    fn classify(&self, image: &DynamicImage) -> Result<Classification>;

    fn classify_from_raw(&self, data: &[u8]) -> Result<Classification> {
        let mut t = Timer::new_start("Load image from memory");
        let image = image::load_from_memory(data)?;
        t.stop();

        let mut classification = self.classify(&image)?;
        classification.time_image_load = t.duration();

        Ok(classification)
    }
}

pub struct ImageClassifier {
    /// TensorFlow model graph
    graph: Graph,

    /// TensorFlow session
    session: Session,

    labels: Labels,

    config: ClassifierConfig,
}

impl ImageClassifier {
    /// Load a frozen `GraphDef` from disk.
    pub fn load(path: &Path, labels: Labels, config: ClassifierConfig) -> Result<Self> {
        let mut t = Timer::new_start(&format!("Loading model {}", path.display()));
        let graph_def = std::fs::read(path)?;
        let classifier = Self::from_graph_def(&graph_def, labels, config)?;
        t.stop();

        Ok(classifier)
    }

    pub fn from_graph_def(
        graph_def: &[u8],
        labels: Labels,
        config: ClassifierConfig,
    ) -> Result<Self> {
        let mut graph = Graph::new();
        graph.import_graph_def(graph_def, &ImportGraphDefOptions::new())?;

        ensure_cpu_placement(&graph)?;

        graph.operation_by_name_required(&config.input_op)?;
        graph.operation_by_name_required(&config.output_op)?;

        let session = Session::new(&SessionOptions::new(), &graph)?;

        info!(
            "Model ready: {} -> {}, {} labels",
            config.input_op,
            config.output_op,
            labels.len()
        );

        Ok(ImageClassifier {
            graph,
            session,
            labels,
            config,
        })
    }

    /// Run the session on an already preprocessed image.
    pub fn run(&self, image: &[f32]) -> Result<Classification> {
        let mut t = Timer::new_start("Running session");

        let size = u64::from(self.config.input_size);
        let input = Tensor::new(&[1, size, size, 3]).with_values(image)?;

        let mut args = SessionRunArgs::new();
        args.add_feed(
            &self.graph.operation_by_name_required(&self.config.input_op)?,
            0,
            &input,
        );
        let result = args.request_fetch(
            &self.graph.operation_by_name_required(&self.config.output_op)?,
            0,
        );

        self.session.run(&mut args)?;
        let output: Tensor<f32> = args.fetch(result)?;

        t.stop();

        let mut classification = self.get_tag(&output)?;
        classification.time_session_run = t.duration();

        Ok(classification)
    }

    fn get_tag(&self, scores: &[f32]) -> Result<Classification> {
        let (index, probability) = best_score(scores)
            .ok_or_else(|| Error::Labels("model produced no scores".to_owned()))?;

        let tag = self.labels.get(index).ok_or_else(|| {
            Error::Labels(format!(
                "class index {} outside of {} known labels",
                index,
                self.labels.len()
            ))
        })?;

        Ok(Classification::new(tag, probability))
    }
}

impl Classify for ImageClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<Classification> {
        let mut t = Timer::new_start("Resizing image");
        let raw_image = preprocess(image, &self.config);
        t.stop();

        let mut classification = self.run(&raw_image)?;
        classification.time_image_resize = t.duration();

        debug!("Classified as {:?}", classification);

        Ok(classification)
    }
}

/// Resize to the square model input and lay out pixels as HWC floats.
pub fn preprocess(image: &DynamicImage, config: &ClassifierConfig) -> Vec<f32> {
    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(
        &rgb,
        config.input_size,
        config.input_size,
        image::imageops::FilterType::Triangle,
    );

    resized
        .into_raw()
        .iter()
        .enumerate()
        .map(|(i, x)| {
            let v = *x as f32 / 255f32;
            match &config.normalization {
                None => v,
                Some(n) => (v - n.mean[i % 3]) / n.std[i % 3],
            }
        })
        .collect()
}

/// Index and value of the highest score; ties go to the lowest index and
/// NaNs are ignored.
pub fn best_score(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| !s.is_nan())
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if s <= b => best,
            _ => Some((i, s)),
        })
}

fn ensure_cpu_placement(graph: &Graph) -> Result<()> {
    for op in graph.operation_iter() {
        let device = op.device()?;
        if is_gpu_device(&device) {
            return Err(Error::IncompatibleArtifact {
                op: op.name()?,
                device,
            });
        }
    }

    Ok(())
}

fn is_gpu_device(device: &str) -> bool {
    let device = device.to_ascii_lowercase();
    device.contains("device:gpu") || device.contains("/gpu:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use crate::test_utils::identity_graph_def;

    fn pixel_config() -> ClassifierConfig {
        ClassifierConfig {
            input_size: 1,
            input_op: "input".to_owned(),
            output_op: "output".to_owned(),
            normalization: None,
        }
    }

    fn solid(color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb(color)))
    }

    #[test]
    fn best_score_prefers_first_maximum() {
        assert_eq!(best_score(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(best_score(&[0.5, 0.5, 0.1]), Some((0, 0.5)));
        assert_eq!(best_score(&[f32::NAN, 0.3, 0.2]), Some((1, 0.3)));
        assert_eq!(best_score(&[-2.0, -1.0]), Some((1, -1.0)));
        assert_eq!(best_score(&[]), None);
    }

    #[test]
    fn gpu_devices_are_recognized() {
        assert!(is_gpu_device("/device:GPU:0"));
        assert!(is_gpu_device("/job:localhost/replica:0/task:0/device:GPU:1"));
        assert!(is_gpu_device("/gpu:0"));
        assert!(!is_gpu_device(""));
        assert!(!is_gpu_device("/device:CPU:0"));
    }

    #[test]
    fn preprocess_scales_to_unit_range() {
        let config = ClassifierConfig {
            input_size: 8,
            normalization: None,
            ..pixel_config()
        };

        let raw = preprocess(&solid([255, 0, 51]), &config);
        assert_eq!(raw.len(), 8 * 8 * 3);
        for px in raw.chunks(3) {
            assert_eq!(px[0], 1.0);
            assert_eq!(px[1], 0.0);
            assert!((px[2] - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn preprocess_applies_normalization() {
        let config = ClassifierConfig {
            input_size: 2,
            normalization: Some(crate::Normalization {
                mean: [0.5, 0.5, 0.5],
                std: [0.5, 0.25, 1.0],
            }),
            ..pixel_config()
        };

        let raw = preprocess(&solid([255, 255, 0]), &config);
        assert_eq!(&raw[..3], &[1.0, 2.0, -0.5]);
    }

    #[test]
    fn classifies_through_session() {
        let classifier = ImageClassifier::from_graph_def(
            &identity_graph_def(None),
            Labels::new(["red", "green", "blue"]),
            pixel_config(),
        )
        .unwrap();

        assert_eq!(classifier.classify(&solid([0, 0, 200])).unwrap().tag, "blue");
        assert_eq!(classifier.classify(&solid([10, 250, 3])).unwrap().tag, "green");

        let mut png = Vec::new();
        solid([240, 5, 5])
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let classification = classifier.classify_from_raw(&png).unwrap();
        assert_eq!(classification.tag, "red");
        assert!((classification.probability - 240.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn index_outside_labels_is_an_error() {
        let classifier = ImageClassifier::from_graph_def(
            &identity_graph_def(None),
            Labels::new(["red"]),
            pixel_config(),
        )
        .unwrap();

        match classifier.classify(&solid([0, 0, 255])) {
            Err(Error::Labels(msg)) => assert!(msg.contains("outside")),
            other => panic!("expected label error, got {:?}", other),
        }
    }

    #[test]
    fn gpu_pinned_graph_is_rejected() {
        let result = ImageClassifier::from_graph_def(
            &identity_graph_def(Some("/device:GPU:0")),
            Labels::new(["red", "green", "blue"]),
            pixel_config(),
        );

        match result {
            Err(Error::IncompatibleArtifact { op, device }) => {
                assert_eq!(op, "output");
                assert_eq!(device, "/device:GPU:0");
            }
            Err(other) => panic!("expected incompatible artifact, got {}", other),
            Ok(_) => panic!("GPU pinned graph was accepted"),
        }
    }

    #[test]
    fn missing_operations_fail_at_load() {
        let config = ClassifierConfig {
            output_op: "logits".to_owned(),
            ..pixel_config()
        };

        let result =
            ImageClassifier::from_graph_def(&identity_graph_def(None), Labels::food101(), config);
        assert!(matches!(result, Err(Error::Tensorflow(_))));
    }

    #[test]
    fn undecodable_bytes_are_rejected() {
        let classifier = ImageClassifier::from_graph_def(
            &identity_graph_def(None),
            Labels::food101(),
            pixel_config(),
        )
        .unwrap();

        assert!(matches!(
            classifier.classify_from_raw(b"not an image"),
            Err(Error::Decode(_))
        ));
        assert!(matches!(
            classifier.classify_from_raw(&[]),
            Err(Error::Decode(_))
        ));
    }
}
