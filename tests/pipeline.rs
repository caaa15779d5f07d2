//! End-to-end pipeline scenarios with in-process backends.

use faceaugment::{
    AffineMatrix, AlignMode, Config, Error, FaceAugmentor, InferenceBackend, ModelInfo, Result,
};
use image::{Rgb, RgbImage};
use ndarray::Array4;

/// Returns its input unchanged, like a network that restores nothing.
struct Echo {
    info: ModelInfo,
    calls: usize,
}

impl Echo {
    fn new(size: Option<usize>) -> Self {
        Self {
            info: ModelInfo {
                channels: Some(3),
                height: size,
                width: size,
                ..ModelInfo::default()
            },
            calls: 0,
        }
    }
}

impl InferenceBackend for Echo {
    fn run(&mut self, batch: &Array4<f32>) -> Result<Vec<Array4<f32>>> {
        self.calls += 1;
        Ok(vec![batch.clone()])
    }

    fn info(&self) -> &ModelInfo {
        &self.info
    }
}

/// Always fails, like a runtime error inside the session.
struct Broken(ModelInfo);

impl InferenceBackend for Broken {
    fn run(&mut self, _batch: &Array4<f32>) -> Result<Vec<Array4<f32>>> {
        Err(Error::ShapeMismatch {
            expected: "[2, 3, 512, 512]".to_string(),
            actual: "runtime failure".to_string(),
        })
    }

    fn info(&self) -> &ModelInfo {
        &self.0
    }
}

fn augmentor(config: Config) -> FaceAugmentor<Echo> {
    FaceAugmentor::with_backend(Echo::new(Some(64)), config).unwrap()
}

fn assert_solid(img: &RgbImage, expected: [u8; 3]) {
    for pixel in img.pixels() {
        for (got, want) in pixel.0.iter().zip(expected) {
            assert!(got.abs_diff(want) <= 1, "got {:?}, want {expected:?}", pixel.0);
        }
    }
}

#[test]
fn solid_color_direct_mode_round_trips() {
    let mut augmentor = FaceAugmentor::with_backend(Echo::new(None), Config::default()).unwrap();
    assert_eq!(augmentor.canvas_size(), (512, 512));

    let img = RgbImage::from_pixel(256, 256, Rgb([40, 120, 220]));
    let restored = augmentor.forward(&img, &img).unwrap();

    assert_eq!(restored.first.dimensions(), (256, 256));
    assert_solid(&restored.first, [40, 120, 220]);
    assert_solid(&restored.second, [40, 120, 220]);
    assert!(restored.mask.as_array().iter().all(|&v| v == 1.0));
}

#[test]
fn outputs_follow_their_own_input_sizes() {
    let mut augmentor = augmentor(Config::default());

    let first = RgbImage::from_pixel(200, 160, Rgb([10, 20, 30]));
    let second = RgbImage::from_pixel(90, 130, Rgb([200, 150, 100]));
    let restored = augmentor.forward(&first, &second).unwrap();

    assert_eq!(restored.first.dimensions(), (200, 160));
    assert_eq!(restored.second.dimensions(), (90, 130));
    assert_eq!((restored.mask.width(), restored.mask.height()), (200, 160));
    assert_solid(&restored.first, [10, 20, 30]);
    assert_solid(&restored.second, [200, 150, 100]);
}

#[test]
fn forward_runs_inference_once() {
    let mut augmentor = augmentor(Config::default());
    let img = RgbImage::from_pixel(32, 32, Rgb([1, 2, 3]));

    augmentor.forward(&img, &img).unwrap();
    assert_eq!(augmentor.backend().calls, 1);

    let single = augmentor.preprocess(&img).unwrap();
    let batch = ndarray::concatenate(ndarray::Axis(0), &[single.view(), single.view()]).unwrap();
    assert_eq!(batch.shape(), &[2, 3, 64, 64]);

    let outputs = augmentor.run(&batch).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].shape(), &[2, 3, 64, 64]);
    assert_eq!(augmentor.backend().calls, 2);
}

#[test]
fn preprocess_range_and_shape() {
    let augmentor = augmentor(Config::default());
    let img = RgbImage::from_fn(123, 77, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 255]));

    let tensor = augmentor.preprocess(&img).unwrap();

    assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
    assert!(tensor.iter().all(|&v| (-1.0 - 1e-6..=1.0 + 1e-6).contains(&v)));
}

#[test]
fn affine_mode_mask_covers_pasted_face() {
    let align = AlignMode::Affine(AffineMatrix::new([[1.0, 0.0, -40.0], [0.0, 1.0, -30.0]]));
    let mut augmentor = augmentor(Config {
        upscale_factor: 1,
        align,
        ..Config::default()
    });

    let face = RgbImage::from_pixel(64, 64, Rgb([100, 100, 100]));
    let other = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
    let restored = augmentor.forward(&face, &other).unwrap();

    let mask = &restored.mask;
    assert_eq!((mask.width(), mask.height()), (64, 64));
    assert!(mask.as_array().iter().all(|&v| (-1e-6..=1.0 + 1e-6).contains(&v)));

    // Face canvas is shifted by (40, 30) and clipped by the 64x64 target
    assert_eq!(restored.first.get_pixel(10, 10), &Rgb([0, 0, 0]));
    assert_eq!(restored.first.get_pixel(50, 40), &Rgb([100, 100, 100]));
    assert_eq!(mask.get(5, 5), Some(0.0));
}

#[test]
fn affine_mode_outside_frame_yields_empty_mask() {
    let align = AlignMode::Affine(AffineMatrix::identity().translated(5_000.0, 5_000.0));
    let mut augmentor = augmentor(Config {
        align,
        ..Config::default()
    });

    let img = RgbImage::from_pixel(48, 48, Rgb([90, 90, 90]));
    let restored = augmentor.forward(&img, &img).unwrap();

    assert!(restored.mask.as_array().iter().all(|&v| v == 0.0));
    assert!(restored.first.pixels().all(|p| p.0 == [0, 0, 0]));
    assert_eq!(restored.second.dimensions(), (48, 48));
}

#[test]
fn restore_into_frame_blends_onto_background() {
    let align = AlignMode::Affine(AffineMatrix::new([[1.0, 0.0, -50.0], [0.0, 1.0, -50.0]]));
    let mut augmentor = augmentor(Config {
        upscale_factor: 1,
        align,
        ..Config::default()
    });

    let face = RgbImage::from_pixel(64, 64, Rgb([250, 250, 250]));
    let frame = RgbImage::from_pixel(200, 200, Rgb([20, 20, 20]));
    let pasted = augmentor.restore_into_frame(&face, &frame).unwrap();

    assert_eq!(pasted.dimensions(), (200, 200));
    assert_eq!(pasted.get_pixel(5, 5), &Rgb([20, 20, 20]));
    assert_eq!(pasted.get_pixel(82, 82), &Rgb([250, 250, 250]));
    let edge = pasted.get_pixel(51, 82).0[0];
    assert!((20..=250).contains(&edge));
}

#[test]
fn restore_into_frame_direct_mode_replaces_frame() {
    let mut augmentor = augmentor(Config::default());

    let face = RgbImage::from_pixel(64, 64, Rgb([7, 77, 177]));
    let frame = RgbImage::from_pixel(30, 20, Rgb([0, 0, 0]));
    let pasted = augmentor.restore_into_frame(&face, &frame).unwrap();

    assert_eq!(pasted.dimensions(), (30, 20));
    assert_solid(&pasted, [7, 77, 177]);
}

#[test]
fn inference_failure_propagates() {
    let mut augmentor =
        FaceAugmentor::with_backend(Broken(ModelInfo::default()), Config::default()).unwrap();
    let img = RgbImage::new(8, 8);

    let err = augmentor.forward(&img, &img).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}

#[test]
fn tiny_input_is_rejected() {
    let mut augmentor = augmentor(Config::default());
    let ok = RgbImage::new(8, 8);
    let tiny = RgbImage::new(1, 1);

    let err = augmentor.forward(&ok, &tiny).unwrap_err();
    assert!(matches!(err, Error::UnsupportedDimensions { .. }));
}

#[test]
fn missing_model_is_reported() {
    let result = FaceAugmentor::open("no/such/model.onnx", Config::default());
    assert!(matches!(result, Err(Error::ModelNotFound { .. })));
}

#[test]
fn bad_quality_is_rejected_before_loading() {
    let config = Config {
        output_quality: 0,
        ..Config::default()
    };
    let result = FaceAugmentor::open("no/such/model.onnx", config);
    assert!(matches!(result, Err(Error::InvalidParameter { .. })));
}
