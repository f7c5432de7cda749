//! Synthetic landmark faces
//!
//! Produces landmark sets with the same point layout a 68-point face
//! detector emits, with knobs for eye opening, mouth opening and head
//! movement. Used by the simulated detector and by tests.

use crate::detector::LandmarkFrame;
use crate::geometry::Point;

/// Eye width used for generated faces (pixels)
pub const EYE_WIDTH: f64 = 30.0;

/// Eye opening that yields EAR = 1/3 (clearly open)
pub const OPEN_EYE: f64 = 10.0;

/// Eye opening that yields EAR ~ 0.067 (clearly closed)
pub const CLOSED_EYE: f64 = 2.0;

/// Mouth width used for generated faces (pixels)
pub const MOUTH_WIDTH: f64 = 60.0;

/// Inner-lip gap giving a mouth-open ratio of 0.1
pub const RESTING_MOUTH: f64 = 6.0;

/// Inner-lip gap giving a mouth-open ratio of 0.7
pub const YAWNING_MOUTH: f64 = 42.0;

/// Pitch change (degrees) per pixel of `nose_drop` on the generated face
pub const PITCH_PER_NOSE_DROP: f64 = 0.6;

/// Shape parameters for [`face`]
#[derive(Debug, Clone, Copy)]
pub struct FaceShape {
    /// Lid separation of both eyes
    pub eye_opening: f64,
    /// Inner-lip separation
    pub mouth_opening: f64,
    /// Horizontal nose offset (turns yaw)
    pub nose_shift_x: f64,
    /// Vertical nose-tip offset (turns pitch)
    pub nose_drop: f64,
    /// Vertical offset of the right eye (turns roll)
    pub right_eye_lift: f64,
}

impl Default for FaceShape {
    fn default() -> Self {
        Self {
            eye_opening: OPEN_EYE,
            mouth_opening: RESTING_MOUTH,
            nose_shift_x: 0.0,
            nose_drop: 0.0,
            right_eye_lift: 0.0,
        }
    }
}

impl FaceShape {
    pub fn eyes_closed() -> Self {
        Self {
            eye_opening: CLOSED_EYE,
            ..Default::default()
        }
    }

    pub fn yawning() -> Self {
        Self {
            mouth_opening: YAWNING_MOUTH,
            ..Default::default()
        }
    }

    /// Frontal face whose computed pitch is `pitch` degrees
    pub fn with_pitch(pitch: f64) -> Self {
        Self {
            nose_drop: pitch / PITCH_PER_NOSE_DROP,
            ..Default::default()
        }
    }
}

/// 6-point eye contour centred on (cx, cy); EAR = opening / width
pub fn eye(cx: f64, cy: f64, width: f64, opening: f64) -> Vec<Point> {
    let half_w = width / 2.0;
    let third = width / 6.0;
    let half_o = opening / 2.0;
    vec![
        Point::new(cx - half_w, cy),
        Point::new(cx - third, cy - half_o),
        Point::new(cx + third, cy - half_o),
        Point::new(cx + half_w, cy),
        Point::new(cx + third, cy + half_o),
        Point::new(cx - third, cy + half_o),
    ]
}

/// 20-point mouth contour (12 outer, 8 inner); ratio = opening / width
pub fn mouth(cx: f64, cy: f64, width: f64, opening: f64) -> Vec<Point> {
    let half_w = width / 2.0;
    let half_o = opening / 2.0;
    let lip = 4.0;

    let mut points = Vec::with_capacity(20);
    // Outer contour: 0 and 6 are the corners
    for i in 0..12 {
        let angle = std::f64::consts::PI * i as f64 / 6.0;
        let x = cx - half_w * angle.cos();
        let y = cy - (half_o + lip) * angle.sin();
        points.push(Point::new(x, y));
    }
    points[0] = Point::new(cx - half_w, cy);
    points[6] = Point::new(cx + half_w, cy);

    // Inner contour: 12 and 16 inner corners, 13..15 upper lip, 17..19 lower lip
    let inner_w = half_w * 0.7;
    points.push(Point::new(cx - inner_w, cy));
    points.push(Point::new(cx, cy - half_o));
    points.push(Point::new(cx + inner_w / 2.0, cy - half_o * 0.8));
    points.push(Point::new(cx + inner_w * 0.9, cy - half_o * 0.3));
    points.push(Point::new(cx + inner_w, cy));
    points.push(Point::new(cx + inner_w / 2.0, cy + half_o * 0.8));
    points.push(Point::new(cx - inner_w / 2.0, cy + half_o * 0.8));
    points.push(Point::new(cx, cy + half_o));
    points
}

/// Full landmark set for a face centred at x = 200
///
/// Eye centres sit at (170, 200) and (230, 200), the chin at (200, 300) and
/// the nose tip at (200, 255), which puts the frontal pose at pitch = yaw =
/// roll = 0.
pub fn face(shape: FaceShape) -> LandmarkFrame {
    let left_eye = eye(170.0, 200.0, EYE_WIDTH, shape.eye_opening);
    let right_eye = eye(230.0, 200.0 + shape.right_eye_lift, EYE_WIDTH, shape.eye_opening);

    let mut nose: Vec<Point> = (0..4)
        .map(|i| Point::new(200.0, 205.0 + 10.0 * i as f64))
        .collect();
    nose.extend([
        Point::new(188.0, 250.0),
        Point::new(194.0, 252.0),
        Point::new(200.0 + shape.nose_shift_x, 255.0 + shape.nose_drop),
        Point::new(206.0, 252.0),
        Point::new(212.0, 250.0),
    ]);

    let jaw_outline = (0..17)
        .map(|i| {
            let t = std::f64::consts::PI * i as f64 / 16.0;
            Point::new(140.0 + 7.5 * i as f64, 200.0 + 100.0 * t.sin())
        })
        .collect();

    LandmarkFrame {
        left_eye,
        right_eye,
        mouth: mouth(200.0, 275.0, MOUTH_WIDTH, shape.mouth_opening),
        nose,
        jaw_outline,
    }
}
