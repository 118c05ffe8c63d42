mod common;

use akaze::image::GrayFloatImage;
use akaze::{Akaze, BuildError, Config, ConfigError, DescriptorType, Descriptors, Error, SequencingError};
use common::*;
use log::*;

#[test]
fn extraction_is_deterministic() {
    init_logger();
    let image = blobs(192, 192, 80, 1);
    let config = Config::new(192, 192);
    let first = Akaze::new(config).unwrap().extract_from_gray_float_image(&image).unwrap();
    let second = Akaze::new(config).unwrap().extract_from_gray_float_image(&image).unwrap();
    assert!(!first.0.is_empty());
    assert_eq!(first, second);

    // Reusing one engine gives the same result as a fresh one.
    let mut akaze = Akaze::new(config).unwrap();
    akaze.extract_from_gray_float_image(&square(192, 64)).unwrap();
    assert_eq!(akaze.extract_from_gray_float_image(&image).unwrap(), first);
}

#[test]
fn sigma_increases_along_the_pyramid() {
    init_logger();
    let mut akaze = Akaze::new(Config::new(320, 240)).unwrap();
    akaze.create_nonlinear_scale_space(&blobs(320, 240, 100, 2)).unwrap();
    let scale_space = akaze.scale_space().unwrap();
    assert_eq!(scale_space.len(), akaze.level_geometry().len());
    for pair in scale_space.levels().windows(2) {
        assert!(pair[0].esigma() < pair[1].esigma());
        assert!(pair[0].etime() < pair[1].etime());
    }
    for (level, schedule) in scale_space.levels().iter().zip(akaze.fed_schedule().levels()).skip(1) {
        assert_eq!(level.fed_steps, schedule.num_steps());
        assert!(level.fed_steps > 0);
    }
}

#[test]
fn keypoints_are_well_formed() {
    init_logger();
    let mut akaze = Akaze::new(Config::dense(192, 192)).unwrap();
    let (keypoints, descriptors) = akaze.extract_from_gray_float_image(&blobs(192, 192, 80, 3)).unwrap();
    info!("{} keypoints", keypoints.len());
    assert!(!keypoints.is_empty());
    assert_eq!(keypoints.len(), descriptors.len());
    let levels = akaze.level_geometry();
    for keypoint in &keypoints {
        assert!((0.0..192.0).contains(&keypoint.point.0));
        assert!((0.0..192.0).contains(&keypoint.point.1));
        assert!(keypoint.level > 0 && keypoint.level + 1 < levels.len());
        assert_eq!(keypoint.octave as u32, levels[keypoint.level].octave);
        assert!(keypoint.response > 0.0);
        assert!(keypoint.size > 0.0);
        assert!((0.0..2.0 * std::f32::consts::PI).contains(&keypoint.angle));
    }
}

#[test]
fn suppression_separates_keypoints() {
    init_logger();
    let image = blobs(192, 192, 120, 4);
    let mut dense = Akaze::new(Config::dense(192, 192)).unwrap();
    let (all, _) = dense.extract_from_gray_float_image(&image).unwrap();
    let mdist = 12.0;
    let mut sparse = Akaze::new(Config {
        suppression_distance: mdist as f64,
        ..Config::dense(192, 192)
    })
    .unwrap();
    let (kept, descriptors) = sparse.extract_from_gray_float_image(&image).unwrap();
    assert_eq!(kept.len(), descriptors.len());
    assert!(!kept.is_empty());
    assert!(kept.len() <= all.len());
    for (i, a) in kept.iter().enumerate() {
        for b in &kept[i + 1..] {
            assert!(distance(a.point, b.point) >= mdist, "{a:?} {b:?}");
        }
    }
    // Every survivor was detected without suppression too.
    for keypoint in &kept {
        assert!(all.iter().any(|other| other.point == keypoint.point));
    }
}

#[test]
fn square_corners_are_detected() {
    init_logger();
    let (size, side) = (256usize, 128usize);
    let mut akaze = Akaze::new(Config::dense(size as u32, size as u32)).unwrap();
    let (keypoints, _) = akaze.extract_from_gray_float_image(&square(size, side)).unwrap();
    info!("{} keypoints on the square", keypoints.len());
    let start = ((size - side) / 2) as f32;
    let end = start + side as f32;
    for corner in [(start, start), (end, start), (start, end), (end, end)] {
        let near = keypoints
            .iter()
            .filter(|kp| distance(kp.point, corner) < side as f32 / 6.0)
            .collect::<Vec<_>>();
        assert!(!near.is_empty(), "nothing near {corner:?} in {keypoints:?}");
        assert!(near.iter().all(|kp| kp.size < side as f32 / 2.0));
    }
}

#[test]
fn stages_out_of_order_fail() {
    init_logger();
    let mut akaze = Akaze::new(Config::new(64, 64)).unwrap();
    let mut keypoints = vec![];
    assert!(matches!(
        akaze.compute_descriptors(&mut keypoints),
        Err(Error::Sequencing(SequencingError::ScaleSpaceNotBuilt))
    ));
    assert!(matches!(
        akaze.feature_detection(),
        Err(Error::Sequencing(SequencingError::ScaleSpaceNotBuilt))
    ));
    akaze.create_nonlinear_scale_space(&square(64, 32)).unwrap();
    assert!(matches!(
        akaze.compute_descriptors(&mut keypoints),
        Err(Error::Sequencing(SequencingError::FeaturesNotDetected))
    ));
}

#[test]
fn rejected_configurations() {
    assert!(matches!(
        Akaze::new(Config::new(0, 10)),
        Err(Error::Config(ConfigError::InvalidDimensions { .. }))
    ));
    assert!(matches!(
        Akaze::new(Config {
            num_octaves: 0,
            ..Config::new(64, 64)
        }),
        Err(Error::Config(ConfigError::NoOctaves))
    ));
    assert!(matches!(
        Akaze::new(Config {
            descriptor_size: 30,
            ..Config::new(64, 64)
        }),
        Err(Error::Config(ConfigError::UnalignedDescriptorSize(30)))
    ));
    assert!(matches!(
        Akaze::new(Config {
            descriptor: DescriptorType::Mldb,
            descriptor_channels: 4,
            ..Config::new(64, 64)
        }),
        Err(Error::Config(ConfigError::InvalidChannels(4)))
    ));
}

#[test]
fn rejected_images() {
    init_logger();
    let mut akaze = Akaze::new(Config::new(64, 64)).unwrap();
    assert!(matches!(
        akaze.create_nonlinear_scale_space(&square(32, 16)),
        Err(Error::Config(ConfigError::ImageSizeMismatch {
            actual_width: 32,
            actual_height: 32,
            ..
        }))
    ));
    assert!(matches!(
        akaze.create_nonlinear_scale_space(&GrayFloatImage::from_fn(64, 64, |_, _| 0.3)),
        Err(Error::Build(BuildError::DegenerateContrast))
    ));
    assert!(akaze.scale_space().is_none());

    let mut tiny = Akaze::new(Config::new(5, 5)).unwrap();
    assert!(matches!(
        tiny.create_nonlinear_scale_space(&square(5, 3)),
        Err(Error::Build(BuildError::ImageTooSmall { min: 9, .. }))
    ));
}

#[test]
fn extract_from_dynamic_image() {
    init_logger();
    let gray = image::GrayImage::from_fn(128, 128, |x, y| {
        image::Luma([if (40..88).contains(&x) && (40..88).contains(&y) { 220 } else { 30 }])
    });
    let mut akaze = Akaze::new(Config {
        descriptor: DescriptorType::Surf,
        ..Config::dense(128, 128)
    })
    .unwrap();
    let (keypoints, descriptors) = akaze.extract(&image::DynamicImage::ImageLuma8(gray)).unwrap();
    assert!(matches!(descriptors, Descriptors::Float(_)));
    assert_eq!(keypoints.len(), descriptors.len());
}
