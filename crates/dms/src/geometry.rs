//! Landmark geometry: eye aspect ratio, mouth opening, heuristic head pose
//!
//! All functions are pure. Every ratio divides by a reference distance; a
//! reference shorter than [`MIN_REFERENCE`], a non-finite landmark or a
//! non-finite result is reported as [`GeometryError::Degenerate`] instead of
//! producing inf/NaN.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detector::LandmarkFrame;

/// Shortest reference segment accepted as a divisor
pub const MIN_REFERENCE: f64 = 1e-6;

/// Degrees of yaw/pitch per unit of normalized offset
const ANGLE_SCALE: f64 = 60.0;

/// Geometry failures for a single frame
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("{set} needs at least {required} points, got {actual}")]
    TooFewPoints {
        set: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("Degenerate landmark geometry: {0}")]
    Degenerate(&'static str),
}

/// 2D landmark point (image coordinates, y grows downwards)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Raw head rotation estimate in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadAngles {
    /// Up-down tilt; positive when the nose drops towards the chin
    pub pitch: f64,
    /// Left-right rotation; positive when the nose moves to image-right
    pub yaw: f64,
    /// Side tilt
    pub roll: f64,
}

/// Check the point count and that every point of the set is finite
fn require(set: &'static str, points: &[Point], required: usize) -> Result<(), GeometryError> {
    if points.len() < required {
        return Err(GeometryError::TooFewPoints {
            set,
            required,
            actual: points.len(),
        });
    }
    if !points.iter().all(Point::is_finite) {
        return Err(GeometryError::Degenerate(set));
    }
    Ok(())
}

fn guarded_ratio(numerator: f64, reference: f64, name: &'static str) -> Result<f64, GeometryError> {
    if !reference.is_finite() || reference.abs() < MIN_REFERENCE {
        return Err(GeometryError::Degenerate(name));
    }
    let ratio = numerator / reference;
    if !ratio.is_finite() {
        return Err(GeometryError::Degenerate(name));
    }
    Ok(ratio)
}

/// Eye Aspect Ratio over the standard 6-point eye contour.
///
/// `EAR = (|p1-p5| + |p2-p4|) / (2 * |p0-p3|)` where p0/p3 are the horizontal
/// corners and (p1,p5), (p2,p4) the vertical lid pairs.
pub fn eye_aspect_ratio(eye: &[Point]) -> Result<f64, GeometryError> {
    require("eye", eye, 6)?;
    let horizontal = eye[0].distance(&eye[3]);
    let vertical = eye[1].distance(&eye[5]) + eye[2].distance(&eye[4]);
    guarded_ratio(vertical, 2.0 * horizontal, "eye width")
}

/// Inner-lip opening (points 13/19) over mouth width (points 0/6)
pub fn mouth_open_ratio(mouth: &[Point]) -> Result<f64, GeometryError> {
    require("mouth", mouth, 20)?;
    let opening = mouth[13].distance(&mouth[19]);
    let width = mouth[0].distance(&mouth[6]);
    guarded_ratio(opening, width, "mouth width")
}

/// Heuristic head pose from eye corners, nose and chin.
///
/// Linear approximations only: the sign and relative magnitude follow the
/// real rotation, the absolute values are not calibrated.
pub fn head_pose(landmarks: &LandmarkFrame) -> Result<HeadAngles, GeometryError> {
    require("left eye", &landmarks.left_eye, 6)?;
    require("right eye", &landmarks.right_eye, 6)?;
    require("nose", &landmarks.nose, 7)?;
    require("jaw outline", &landmarks.jaw_outline, 9)?;

    let left_center = landmarks.left_eye[0].midpoint(&landmarks.left_eye[3]);
    let right_center = landmarks.right_eye[0].midpoint(&landmarks.right_eye[3]);
    let eye_center = left_center.midpoint(&right_center);

    let nose_bridge = landmarks.nose[0];
    let nose_tip = landmarks.nose[6];
    let chin = landmarks.jaw_outline[8];

    let eye_width = right_center.x - left_center.x;
    let yaw = guarded_ratio(nose_tip.x - eye_center.x, eye_width, "eye width")? * ANGLE_SCALE;

    let face_height = chin.y - eye_center.y;
    let pitch =
        (guarded_ratio(nose_tip.y - nose_bridge.y, face_height, "face height")? - 0.5) * ANGLE_SCALE;

    let roll = (right_center.y - left_center.y)
        .atan2(right_center.x - left_center.x)
        .to_degrees();

    Ok(HeadAngles { pitch, yaw, roll })
}
