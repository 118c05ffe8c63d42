use crate::KeyPoint;
use float_ord::FloatOrd;
use log::*;

/// Remove keypoints closer than `mdist` pixels to a stronger keypoint.
///
/// Keypoints are visited from the strongest response down, ties in detection
/// order, and each one is kept only if it is at least `mdist` away from every
/// keypoint kept so far. The survivors keep their detection order. A
/// distance of zero or less keeps everything.
pub(crate) fn suppress_neighbors(keypoints: Vec<KeyPoint>, mdist: f32) -> Vec<KeyPoint> {
    if mdist <= 0.0 || keypoints.len() < 2 {
        return keypoints;
    }
    let mdist_sq = mdist * mdist;
    let mut order: Vec<usize> = (0..keypoints.len()).collect();
    // Stable, so equal responses stay in detection order.
    order.sort_by_key(|&i| std::cmp::Reverse(FloatOrd(keypoints[i].response)));

    let mut keep = vec![false; keypoints.len()];
    let mut kept: Vec<(f32, f32)> = vec![];
    for i in order {
        let (x, y) = keypoints[i].point;
        let isolated = kept.iter().all(|&(kx, ky)| {
            let dx = x - kx;
            let dy = y - ky;
            dx * dx + dy * dy >= mdist_sq
        });
        if isolated {
            keep[i] = true;
            kept.push((x, y));
        }
    }
    let before = keypoints.len();
    let survivors: Vec<KeyPoint> = keypoints
        .into_iter()
        .zip(keep)
        .filter_map(|(keypoint, keep)| keep.then_some(keypoint))
        .collect();
    debug!(
        "{}/{} remain after suppression at distance {}.",
        survivors.len(),
        before,
        mdist
    );
    survivors
}
