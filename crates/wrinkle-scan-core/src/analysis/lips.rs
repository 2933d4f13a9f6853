//! Lip region masking.
//!
//! Lips produce high-contrast edges that are not wrinkles; filling the lip
//! contour into a binary mask lets edge scoring suppress them. Without a
//! detected face the mask stays all-zero and nothing is suppressed.

use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

use crate::inference::FaceLandmarks;

/// Ordered outer-lip contour indices in the 68-point landmark layout.
pub const LIP_OUTLINE: [usize; 12] = [48, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59];

/// Builds the binary (0/255) lip mask for an image of the given dimensions.
#[must_use]
pub fn lip_mask(landmarks: Option<&FaceLandmarks>, width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let Some(landmarks) = landmarks else {
        return mask;
    };

    let polygon = lip_polygon(landmarks, width, height);
    if polygon.len() >= 3 {
        draw_polygon_mut(&mut mask, &polygon, Luma([255u8]));
    }
    mask
}

/// Projects the lip contour into pixel space as an open polygon path.
fn lip_polygon(landmarks: &FaceLandmarks, width: u32, height: u32) -> Vec<Point<i32>> {
    let mut points: Vec<Point<i32>> = LIP_OUTLINE
        .iter()
        .filter_map(|&i| landmarks.pixel(i, width, height))
        .map(|(x, y)| Point::new(x, y))
        .collect();

    // draw_polygon_mut requires an open path with distinct neighbors.
    points.dedup();
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 68 placeholder points with the outer lip on a circle around `center`.
    fn landmarks_with_lip_ring(center: (f32, f32), radius: f32) -> FaceLandmarks {
        let mut points = vec![(0.1f32, 0.1f32); 68];
        for (step, &index) in LIP_OUTLINE.iter().enumerate() {
            let angle = (step as f32) / (LIP_OUTLINE.len() as f32) * std::f32::consts::TAU;
            points[index] = (center.0 + radius * angle.cos(), center.1 + radius * angle.sin());
        }
        FaceLandmarks::new(points)
    }

    #[test]
    fn test_lip_indices_within_layout() {
        assert!(LIP_OUTLINE.iter().all(|&i| i < 68));
    }

    #[test]
    fn test_no_landmarks_all_zero() {
        let mask = lip_mask(None, 40, 30);
        assert_eq!(mask.dimensions(), (40, 30));
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_ring_fills_center() {
        let landmarks = landmarks_with_lip_ring((0.5, 0.5), 0.2);
        let mask = lip_mask(Some(&landmarks), 100, 100);

        assert_eq!(mask.get_pixel(50, 50).0[0], 255, "center should be filled");
        assert_eq!(mask.get_pixel(2, 2).0[0], 0, "corner should stay clear");
        assert_eq!(mask.get_pixel(97, 97).0[0], 0);
    }

    #[test]
    fn test_mask_is_binary() {
        let landmarks = landmarks_with_lip_ring((0.5, 0.5), 0.15);
        let mask = lip_mask(Some(&landmarks), 80, 80);
        assert!(mask.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn test_degenerate_contour_leaves_mask_empty() {
        // All landmarks collapsed onto one point: no polygon to fill.
        let landmarks = FaceLandmarks::new(vec![(0.5, 0.5); 68]);
        let mask = lip_mask(Some(&landmarks), 64, 64);
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_off_image_contour_clipped() {
        // A lip ring centered outside the raster should not panic and should
        // leave in-bounds pixels near the opposite edge untouched.
        let landmarks = landmarks_with_lip_ring((1.4, 1.4), 0.2);
        let mask = lip_mask(Some(&landmarks), 50, 50);
        assert_eq!(mask.get_pixel(5, 5).0[0], 0);
    }
}
