//! Space mapping — sensor-space 3D positions to canvas coordinates.
//!
//! Projection onto the depth image plane is sensor-specific, so it lives
//! behind the narrow `DepthProject` trait and can be swapped or mocked
//! without hardware.  The in-tree `PinholeProjector` models the usual
//! depth-camera intrinsics.  Scaling from the image plane into canvas
//! coordinates is plain linear math owned by `ScreenMapper`.

use thiserror::Error;

use super::skeleton::Position3;

// ── Errors ─────────────────────────────────────────────────

/// A frame-scoped projection failure.  The pipeline hides the pointer for
/// the frame and leaves the selection untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectError {
    #[error("point lies behind the sensor plane")]
    BehindSensor,
    #[error("projected point ({x:.1}, {y:.1}) falls outside the depth plane")]
    OutOfPlane { x: f32, y: f32 },
}

// ── Depth plane projection ─────────────────────────────────

/// A point on the sensor's depth image plane, in pixel units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanePoint {
    pub x: f32,
    pub y: f32,
}

/// Sensor-intrinsics seam: maps a 3D sensor-space position onto the depth
/// image plane.  Supplied by the sensor driver in production; mocked in
/// tests.
pub trait DepthProject {
    fn project(&self, p: Position3) -> Result<PlanePoint, ProjectError>;

    /// Resolution of the depth plane in pixels (width, height).
    fn plane_size(&self) -> (u32, u32);
}

/// Pinhole-model projector with fixed intrinsics.
#[derive(Debug, Clone)]
pub struct PinholeProjector {
    plane_w: u32,
    plane_h: u32,
    /// Focal lengths in pixels.
    fx: f32,
    fy: f32,
    /// Principal point (plane center).
    cx: f32,
    cy: f32,
}

impl PinholeProjector {
    /// Build a projector from plane resolution and field of view.
    pub fn new(plane_w: u32, plane_h: u32, hfov_deg: f32, vfov_deg: f32) -> Self {
        let fx = (plane_w as f32 / 2.0) / (hfov_deg.to_radians() / 2.0).tan();
        let fy = (plane_h as f32 / 2.0) / (vfov_deg.to_radians() / 2.0).tan();
        Self {
            plane_w,
            plane_h,
            fx,
            fy,
            cx: plane_w as f32 / 2.0,
            cy: plane_h as f32 / 2.0,
        }
    }
}

impl Default for PinholeProjector {
    /// Kinect-class depth camera: 640x480 plane, 57°x43° field of view.
    fn default() -> Self {
        Self::new(640, 480, 57.0, 43.0)
    }
}

impl DepthProject for PinholeProjector {
    fn project(&self, p: Position3) -> Result<PlanePoint, ProjectError> {
        if p.z <= 0.0 {
            return Err(ProjectError::BehindSensor);
        }
        // Sensor y points up, image y points down.
        let x = self.cx + self.fx * (p.x / p.z);
        let y = self.cy - self.fy * (p.y / p.z);
        if x < 0.0 || x >= self.plane_w as f32 || y < 0.0 || y >= self.plane_h as f32 {
            return Err(ProjectError::OutOfPlane { x, y });
        }
        Ok(PlanePoint { x, y })
    }

    fn plane_size(&self) -> (u32, u32) {
        (self.plane_w, self.plane_h)
    }
}

// ── Canvas mapping ─────────────────────────────────────────

/// Linear scaling from depth-plane coordinates to a canvas top-left
/// position for a pointer glyph of known size.
#[derive(Debug, Clone)]
pub struct ScreenMapper {
    pub canvas_w: f64,
    pub canvas_h: f64,
    pub plane_w: f64,
    pub plane_h: f64,
    pub glyph_w: f64,
    pub glyph_h: f64,
}

impl ScreenMapper {
    pub fn new(canvas: (f64, f64), plane: (u32, u32), glyph: (f64, f64)) -> Self {
        Self {
            canvas_w: canvas.0,
            canvas_h: canvas.1,
            plane_w: plane.0 as f64,
            plane_h: plane.1 as f64,
            glyph_w: glyph.0,
            glyph_h: glyph.1,
        }
    }

    /// Map a depth-plane point to the glyph's top-left canvas position.
    ///
    /// Scales each axis by (canvas / plane) and subtracts half the glyph
    /// size so the glyph is centered on the hand.  Coordinates truncate
    /// toward zero — truncation, not rounding, is the compatibility
    /// contract here.
    pub fn map(&self, p: PlanePoint) -> (i32, i32) {
        let x = (p.x as f64 * self.canvas_w / self.plane_w - self.glyph_w / 2.0) as i32;
        let y = (p.y as f64 * self.canvas_h / self.plane_h - self.glyph_h / 2.0) as i32;
        (x, y)
    }

    /// Center of a glyph whose top-left was produced by `map`.
    pub fn glyph_center(&self, top_left: (i32, i32)) -> (f64, f64) {
        (
            top_left.0 as f64 + self.glyph_w / 2.0,
            top_left.1 as f64 + self.glyph_h / 2.0,
        )
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinhole_center() {
        let proj = PinholeProjector::default();
        // A point straight ahead lands on the principal point.
        let p = proj.project(Position3::new(0.0, 0.0, 2.0)).unwrap();
        assert!((p.x - 320.0).abs() < 0.001);
        assert!((p.y - 240.0).abs() < 0.001);
    }

    #[test]
    fn test_pinhole_offsets() {
        let proj = PinholeProjector::default();
        let center = proj.project(Position3::new(0.0, 0.0, 2.0)).unwrap();
        // Right of center in sensor space lands right of center on the plane.
        let right = proj.project(Position3::new(0.3, 0.0, 2.0)).unwrap();
        assert!(right.x > center.x);
        // Above center in sensor space lands above center (smaller image y).
        let up = proj.project(Position3::new(0.0, 0.3, 2.0)).unwrap();
        assert!(up.y < center.y);
    }

    #[test]
    fn test_pinhole_behind_sensor() {
        let proj = PinholeProjector::default();
        assert_eq!(
            proj.project(Position3::new(0.0, 0.0, -1.0)),
            Err(ProjectError::BehindSensor)
        );
        assert_eq!(
            proj.project(Position3::new(0.0, 0.0, 0.0)),
            Err(ProjectError::BehindSensor)
        );
    }

    #[test]
    fn test_pinhole_out_of_plane() {
        let proj = PinholeProjector::default();
        // Far to the side at close range projects off the plane.
        let res = proj.project(Position3::new(2.0, 0.0, 0.5));
        assert!(matches!(res, Err(ProjectError::OutOfPlane { .. })));
    }

    #[test]
    fn test_map_scales_and_centers() {
        let mapper = ScreenMapper::new((1280.0, 960.0), (640, 480), (20.0, 20.0));
        // Plane center scales by 2x, then shifts by half the glyph.
        let (x, y) = mapper.map(PlanePoint { x: 320.0, y: 240.0 });
        assert_eq!(x, 630);
        assert_eq!(y, 470);
    }

    #[test]
    fn test_map_linearity_in_canvas_width() {
        let p = PlanePoint { x: 100.0, y: 0.0 };
        let narrow = ScreenMapper::new((640.0, 480.0), (640, 480), (0.0, 0.0));
        let wide = ScreenMapper::new((1280.0, 480.0), (640, 480), (0.0, 0.0));
        // Doubling the canvas width doubles the mapped X.
        assert_eq!(wide.map(p).0, narrow.map(p).0 * 2);
    }

    #[test]
    fn test_map_truncates_toward_zero() {
        let mapper = ScreenMapper::new((640.0, 480.0), (640, 480), (25.0, 25.0));
        // 10.0 - 12.5 = -2.5 truncates to -2, not -3.
        let (x, _) = mapper.map(PlanePoint { x: 10.0, y: 240.0 });
        assert_eq!(x, -2);
        // 100.9 stays 100 going the other way: 113.4 - 12.5 = 100.9 -> 100.
        let (x, _) = mapper.map(PlanePoint { x: 113.4, y: 240.0 });
        assert_eq!(x, 100);
    }

    #[test]
    fn test_glyph_center() {
        let mapper = ScreenMapper::new((640.0, 480.0), (640, 480), (20.0, 20.0));
        let (cx, cy) = mapper.glyph_center((120, 120));
        assert!((cx - 130.0).abs() < f64::EPSILON);
        assert!((cy - 130.0).abs() < f64::EPSILON);
    }
}
