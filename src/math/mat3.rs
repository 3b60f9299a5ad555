use super::Vec2;
use cgmath::SquareMatrix;

/// A 2D affine transform stored as a homogeneous 3x3 matrix.
///
/// Composes as translation * rotation * scale, restricted to two dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3(pub cgmath::Matrix3<f32>);

impl Mat3 {
    pub fn identity() -> Self {
        Mat3(cgmath::Matrix3::identity())
    }

    pub fn from_translation(x: f32, y: f32) -> Self {
        Mat3(cgmath::Matrix3::new(
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            x, y, 1.0,
        ))
    }

    pub fn from_rotation(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        Mat3(cgmath::Matrix3::new(
            c, s, 0.0, //
            -s, c, 0.0, //
            0.0, 0.0, 1.0,
        ))
    }

    pub fn from_scale(sx: f32, sy: f32) -> Self {
        Mat3(cgmath::Matrix3::new(
            sx, 0.0, 0.0, //
            0.0, sy, 0.0, //
            0.0, 0.0, 1.0,
        ))
    }

    /// Post-multiplies `self` by `rhs`, i.e. `rhs` is applied first.
    /// This is the composition used by the incremental `translate`/`rotate`/
    /// `scale` context ops: each new op happens in the current local frame.
    pub fn then(&self, rhs: &Mat3) -> Mat3 {
        Mat3(self.0 * rhs.0)
    }

    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        let v = cgmath::Vector3::new(p.x, p.y, 1.0);
        let r = self.0 * v;
        Vec2::new(r.x, r.y)
    }

    pub fn invert(&self) -> Option<Mat3> {
        self.0.invert().map(Mat3)
    }

    /// Row-major 4x4 suitable for uploading as a `mat4x4<f32>` uniform: the
    /// 2D affine transform embedded in the XY plane.
    pub fn to_mat4_array(&self) -> [[f32; 4]; 4] {
        let m = &self.0;
        [
            [m.x.x, m.x.y, 0.0, 0.0],
            [m.y.x, m.y.y, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [m.z.x, m.z.y, 0.0, 1.0],
        ]
    }
}

impl Default for Mat3 {
    fn default() -> Self {
        Mat3::identity()
    }
}
