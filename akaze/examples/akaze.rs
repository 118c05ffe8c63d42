//! Extract AKAZE features from the images given on the command line.
//!
//! For every `name.png` this writes `name_kps.csv` with one keypoint per
//! line, `name_descs.txt` with the matching descriptors and `name_kps.png`
//! with the keypoints drawn over the image.

use std::io::{BufWriter, Write};
use std::{fs, path::Path};

use akaze::{Akaze, Config, Descriptors};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

fn replace_ext(filename: &str, new: &str) -> String {
    let stemmed = Path::new(filename).file_stem().unwrap().to_str().unwrap();
    format!("{stemmed}{new}")
}

fn main() {
    pretty_env_logger::init_timed();
    let args: Vec<_> = std::env::args().collect();
    for path in &args[1..] {
        let image = image::open(path).unwrap();
        let mut akaze = Akaze::new(Config::new(image.width(), image.height())).unwrap();
        let (keypoints, descriptors) = akaze.extract(&image).unwrap();

        let mut kp_file = BufWriter::new(fs::File::create(replace_ext(path, "_kps.csv")).unwrap());
        for kp in &keypoints {
            writeln!(
                kp_file,
                "{}, {}, {}, {}, {}, {}, {}",
                kp.point.0, kp.point.1, kp.angle, kp.size, kp.response, kp.octave, kp.level
            )
            .unwrap();
        }

        let mut desc_file =
            BufWriter::new(fs::File::create(replace_ext(path, "_descs.txt")).unwrap());
        match &descriptors {
            Descriptors::Binary(descriptors) => {
                for descriptor in descriptors {
                    let bits: Vec<String> =
                        descriptor.bytes().iter().map(|x| format!("{x:08b}")).collect();
                    writeln!(desc_file, "{}", bits.join("_")).unwrap();
                }
            }
            Descriptors::Float(descriptors) => {
                for descriptor in descriptors {
                    let values: Vec<String> = descriptor.iter().map(|x| format!("{x:.6}")).collect();
                    writeln!(desc_file, "{}", values.join(" ")).unwrap();
                }
            }
        }

        let mut canvas: RgbaImage = image.to_rgba8();
        let color = Rgba([255, 0, 0, 255]);
        for kp in &keypoints {
            let (x, y) = kp.point;
            draw_hollow_circle_mut(&mut canvas, (x as i32, y as i32), kp.size as i32, color);
            draw_line_segment_mut(
                &mut canvas,
                (x, y),
                (x + kp.size * kp.angle.cos(), y + kp.size * kp.angle.sin()),
                color,
            );
        }
        canvas.save(replace_ext(path, "_kps.png")).unwrap();
        println!("{path}: {} keypoints", keypoints.len());
    }
}
