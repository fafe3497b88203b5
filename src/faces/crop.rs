//! Default crop bounds for the moderator to start from.

use crate::config::CropConfig;
use crate::db::{CropBounds, QueuedImage};

use super::detector::FaceBox;

/// Suggest crop bounds for a `width` x `height` image.
///
/// With faces: a square around the union of every box, padded by
/// `face_margin` and moved (not shrunk) to stay inside the image where it
/// fits. The result always contains the union clipped to the image.
/// Without faces: a centered `default_aspect` rectangle covering
/// `default_fraction` of the shorter side.
pub fn suggest_crop(faces: &[FaceBox], width: u32, height: u32, config: &CropConfig) -> CropBounds {
    if width == 0 || height == 0 {
        return CropBounds::full(width, height);
    }

    match face_union(faces, width, height) {
        Some(union) => around_faces(&union, width, height, config.face_margin),
        None => centered_default(width, height, config.default_aspect, config.default_fraction),
    }
}

/// Union of all boxes clipped to the image, widened to whole pixels.
/// `None` when there are no boxes or none overlap the image.
pub fn face_union(faces: &[FaceBox], width: u32, height: u32) -> Option<CropBounds> {
    let first = faces.first()?;
    let (mut left, mut top, mut right, mut bottom) = (first.x, first.y, first.right(), first.bottom());
    for face in &faces[1..] {
        left = left.min(face.x);
        top = top.min(face.y);
        right = right.max(face.right());
        bottom = bottom.max(face.bottom());
    }

    let clip = |v: f32, limit: u32| v.max(0.0).min(limit as f32);
    let union = CropBounds::new(
        clip(left, width).floor() as u32,
        clip(top, height).floor() as u32,
        clip(right, width).ceil() as u32,
        clip(bottom, height).ceil() as u32,
    );

    (union.area() > 0).then_some(union)
}

fn around_faces(union: &CropBounds, width: u32, height: u32, margin: f64) -> CropBounds {
    let longest = union.width().max(union.height()) as f64;
    let side = (longest * (1.0 + 2.0 * margin.max(0.0))).ceil() as u32;

    let (min_x, max_x) = fit_span(union.min_x, union.max_x, side, width);
    let (min_y, max_y) = fit_span(union.min_y, union.max_y, side, height);
    CropBounds::new(min_x, min_y, max_x, max_y)
}

/// A span of `len` centred on `[lo, hi)`, slid back inside `[0, limit)`.
/// Never narrower than `[lo, hi)` itself.
fn fit_span(lo: u32, hi: u32, len: u32, limit: u32) -> (u32, u32) {
    let len = len.max(hi - lo).min(limit) as i64;
    let centre_x2 = lo as i64 + hi as i64;
    // floor((centre_x2 - len) / 2) without going through floats
    let start = (centre_x2 - len).div_euclid(2);
    let start = start.clamp(0, limit as i64 - len);
    (start as u32, (start + len) as u32)
}

fn centered_default(width: u32, height: u32, aspect: f64, fraction: f64) -> CropBounds {
    let aspect = if aspect > 0.0 { aspect } else { 1.0 };
    let fraction = fraction.clamp(0.0, 1.0);

    let shorter = width.min(height) as f64;
    let mut crop_h = shorter * fraction;
    let mut crop_w = crop_h * aspect;

    // Scale down uniformly so the aspect ratio survives
    if crop_w > width as f64 {
        crop_h *= width as f64 / crop_w;
        crop_w = width as f64;
    }
    if crop_h > height as f64 {
        crop_w *= height as f64 / crop_h;
        crop_h = height as f64;
    }

    let crop_w = (crop_w.round() as u32).clamp(1, width);
    let crop_h = (crop_h.round() as u32).clamp(1, height);
    let min_x = (width - crop_w) / 2;
    let min_y = (height - crop_h) / 2;
    CropBounds::new(min_x, min_y, min_x + crop_w, min_y + crop_h)
}

/// Bounds to pre-fill the review form with: whatever is stored, else the
/// whole image.
pub fn review_defaults(entry: &QueuedImage) -> CropBounds {
    entry
        .crop
        .unwrap_or_else(|| CropBounds::full(entry.image_width, entry.image_height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32, y: f32, width: f32, height: f32) -> FaceBox {
        FaceBox {
            x,
            y,
            width,
            height,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_single_face_gets_padded_square() {
        let config = CropConfig::default();
        let crop = suggest_crop(&[face(400.0, 300.0, 100.0, 100.0)], 1000, 1000, &config);

        // 100px face, 30% margin each side -> 160px square centred on the face
        assert_eq!(crop, CropBounds::new(370, 270, 530, 430));
        assert_eq!(crop.width(), crop.height());
    }

    #[test]
    fn test_crop_slides_inside_instead_of_shrinking() {
        let config = CropConfig::default();
        let crop = suggest_crop(&[face(0.0, 10.0, 100.0, 100.0)], 500, 500, &config);

        assert_eq!(crop.min_x, 0);
        assert_eq!(crop.width(), 160);
        assert_eq!(crop.height(), 160);
        assert!(crop.contains(&CropBounds::new(0, 10, 100, 110)));
    }

    #[test]
    fn test_multiple_faces_use_union_of_all() {
        let config = CropConfig::default();
        let small = face(10.0, 10.0, 20.0, 20.0);
        let large = face(200.0, 100.0, 80.0, 80.0);
        let crop = suggest_crop(&[large, small], 400, 300, &config);

        assert!(crop.contains(&CropBounds::new(10, 10, 30, 30)));
        assert!(crop.contains(&CropBounds::new(200, 100, 280, 180)));
        assert!(crop.check_within(400, 300).is_ok());
    }

    #[test]
    fn test_output_contains_clipped_union() {
        // Deterministic sweep of box layouts, including boxes hanging off
        // the image edges.
        let config = CropConfig::default();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |max: u32| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            (seed % max as u64) as f32
        };

        for _ in 0..500 {
            let (width, height) = (next(900) as u32 + 20, next(900) as u32 + 20);
            let count = next(4) as usize + 1;
            let faces: Vec<FaceBox> = (0..count)
                .map(|_| {
                    face(
                        next(width + 40) - 20.0,
                        next(height + 40) - 20.0,
                        next(200) + 1.0,
                        next(200) + 1.0,
                    )
                })
                .collect();

            let crop = suggest_crop(&faces, width, height, &config);
            assert!(crop.check_within(width, height).is_ok(), "{} in {}x{}", crop, width, height);
            if let Some(union) = face_union(&faces, width, height) {
                assert!(crop.contains(&union), "{} does not contain {}", crop, union);
            }
        }
    }

    #[test]
    fn test_faces_outside_image_fall_back() {
        let config = CropConfig::default();
        let crop = suggest_crop(&[face(-50.0, -50.0, 20.0, 20.0)], 300, 400, &config);
        assert_eq!(crop, suggest_crop(&[], 300, 400, &config));
    }

    #[test]
    fn test_no_faces_gives_centered_default_aspect() {
        let config = CropConfig::default();
        for (width, height) in [(300, 400), (400, 300), (1000, 1000), (120, 900), (900, 120)] {
            let crop = suggest_crop(&[], width, height, &config);
            let aspect = crop.width() as f64 / crop.height() as f64;

            assert!((aspect - config.default_aspect).abs() < 0.02, "{}x{} -> {}", width, height, crop);
            assert!(crop.min_x + crop.max_x == width || crop.min_x + crop.max_x + 1 == width);
            assert!(crop.min_y + crop.max_y == height || crop.min_y + crop.max_y + 1 == height);
            assert!(crop.check_within(width, height).is_ok());
        }

        // 300x400: 80% of 300 high, 3:4
        assert_eq!(suggest_crop(&[], 300, 400, &config), CropBounds::new(60, 80, 240, 320));
    }

    #[test]
    fn test_wide_aspect_is_scaled_to_fit() {
        let config = CropConfig {
            default_aspect: 2.0,
            default_fraction: 1.0,
            ..CropConfig::default()
        };
        let crop = suggest_crop(&[], 100, 200, &config);
        assert_eq!(crop, CropBounds::new(0, 75, 100, 125));
    }

    #[test]
    fn test_tiny_image() {
        let config = CropConfig::default();
        let crop = suggest_crop(&[], 1, 1, &config);
        assert_eq!(crop, CropBounds::full(1, 1));
    }
}
