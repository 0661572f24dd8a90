#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use florascope::{Backbone, Classifier, ClassifierError, Device, LabelResolver, RuntimeConfig};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::{Array1, Array4};

/// Returns the same logits for every input.
#[derive(Debug)]
pub struct FixedLogits(pub Vec<f32>);

impl Backbone for FixedLogits {
    fn forward(&self, _input: &Array4<f32>) -> Result<Array1<f32>, ClassifierError> {
        Ok(Array1::from_vec(self.0.clone()))
    }

    fn output_width(&self) -> Option<usize> {
        Some(self.0.len())
    }
}

/// Scores each class by the mean of one input channel, so different images give
/// different (but repeatable) predictions.
#[derive(Debug)]
pub struct ChannelMeans;

impl Backbone for ChannelMeans {
    fn forward(&self, input: &Array4<f32>) -> Result<Array1<f32>, ClassifierError> {
        assert_eq!(input.shape(), &[1, 3, 224, 224]);
        let means = (0..3)
            .map(|c| input.index_axis(ndarray::Axis(1), c).mean().unwrap_or(0.0))
            .collect::<Vec<f32>>();
        Ok(Array1::from_vec(means))
    }

    fn output_width(&self) -> Option<usize> {
        Some(3)
    }
}

/// Logits whose softmax puts `p` on class 0 and the rest on class 1.
pub fn logits_for(p: f32) -> Vec<f32> {
    vec![p.ln(), (1.0 - p).ln()]
}

pub fn labels(names: &[(&str, &str)], indices: &[(usize, &str)]) -> LabelResolver {
    LabelResolver::new(
        names.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>(),
        indices.iter().map(|(k, v)| (*k, v.to_string())).collect::<HashMap<_, _>>(),
    )
}

pub fn cpu_config() -> RuntimeConfig {
    RuntimeConfig {
        device: Device::Cpu,
        ..RuntimeConfig::default()
    }
}

pub fn build(backbone: Arc<dyn Backbone>, labels: LabelResolver) -> Classifier {
    Classifier::builder()
        .with_runtime_config(cpu_config())
        .with_backbone(backbone)
        .expect("backbone")
        .with_labels(labels)
        .build()
        .expect("Failed to create classifier")
}

/// Three-class classifier over `ChannelMeans`: red, green, blue.
pub fn color_classifier() -> Classifier {
    build(
        Arc::new(ChannelMeans),
        labels(
            &[("1", "red campion"), ("2", "green hellebore"), ("3", "bluebell")],
            &[(0, "1"), (1, "2"), (2, "3")],
        ),
    )
}

pub fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), format)
        .expect("encode test image");
    bytes
}

pub fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    encode(&solid_image(width, height, color), ImageFormat::Png)
}
