//! Camera state and automatic framing.
//!
//! The viewer uses a single perspective camera that looks at the origin from
//! the +Z axis. Models are translated so that their bounding-box center sits
//! at the origin, which reduces framing to picking a distance.
//!
//! # Key types
//!
//! - [`frame`] computes the centering offset and camera distance for a bounding box
//! - [`CameraRig`] bundles the [`Camera`], its [`Projection`] and the GPU [`CameraUniform`]

use cgmath::{EuclideanSpace, Matrix4, Point3, Rad, Vector3, Zero};

use crate::data_structures::bounds::BoundingBox;

/// Multiplier applied to the exact fit distance so off-axis extents stay inside the frustum.
pub const FRAMING_MARGIN: f32 = 1.5;

/// Camera distance used when there is nothing to frame (no model, empty or degenerate bounds).
pub const DEFAULT_DISTANCE: f32 = 5.0;

/// Vertical field of view of the viewer camera.
pub const DEFAULT_FOVY: cgmath::Deg<f32> = cgmath::Deg(45.0);

const DEFAULT_ZNEAR: f32 = 0.1;
const DEFAULT_ZFAR: f32 = 1000.0;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Result of framing a bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Framing {
    /// Center of the bounding box. The model is translated by `-center_offset`.
    pub center_offset: Vector3<f32>,
    /// Distance of the camera from the origin along +Z.
    pub distance: f32,
}

impl Default for Framing {
    fn default() -> Self {
        Self {
            center_offset: Vector3::zero(),
            distance: DEFAULT_DISTANCE,
        }
    }
}

/**
 * Computes how to frame `bounds` with a camera of vertical field of view `fovy`.
 *
 * `distance = |max_dimension / 2 / tan(fovy / 2)| * FRAMING_MARGIN`
 *
 * Empty or zero-sized boxes, non-finite extents and unusable field of views
 * fall back to [`DEFAULT_DISTANCE`]; the result is always finite and positive.
 * Pure function: the same input always yields the same framing.
 */
pub fn frame(bounds: &BoundingBox, fovy: Rad<f32>) -> Framing {
    let center = bounds.center().to_vec();
    let center_offset = if center.x.is_finite() && center.y.is_finite() && center.z.is_finite() {
        center
    } else {
        Vector3::zero()
    };

    let max_dimension = bounds.max_dimension();
    let half_tan = (fovy.0 / 2.0).tan();
    let distance = (max_dimension / 2.0 / half_tan).abs() * FRAMING_MARGIN;

    let degenerate = bounds.is_empty()
        || !max_dimension.is_finite()
        || max_dimension <= 0.0
        || !half_tan.is_finite()
        || half_tan == 0.0
        || !distance.is_finite()
        || distance <= 0.0;
    if degenerate {
        log::debug!("Degenerate bounds {:?}, using the default camera distance.", bounds);
        return Framing {
            center_offset,
            distance: DEFAULT_DISTANCE,
        };
    }

    Framing {
        center_offset,
        distance,
    }
}

/// Eye and target of the camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
}

impl Camera {
    /// Camera on the +Z axis at `distance`, looking at the origin.
    pub fn looking_at_origin(distance: f32) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, distance),
            target: Point3::origin(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, Vector3::unit_y())
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::looking_at_origin(DEFAULT_DISTANCE)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        let mut projection = Self {
            aspect: 1.0,
            fovy: fovy.into(),
            znear,
            zfar,
        };
        projection.resize(width, height);
        projection
    }

    /// Zero-sized surfaces keep the previous aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::new(1, 1, DEFAULT_FOVY, DEFAULT_ZNEAR, DEFAULT_ZFAR)
    }
}

/// The data the backend binds for its camera uniform.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Camera, projection and uniform of one viewer.
#[derive(Clone, Debug, Default)]
pub struct CameraRig {
    pub camera: Camera,
    pub projection: Projection,
    uniform: CameraUniform,
}

impl CameraRig {
    pub fn new() -> Self {
        let mut rig = Self::default();
        rig.reset();
        rig
    }

    /// Moves the camera to `framing.distance` and widens the clip range for large models.
    pub fn apply(&mut self, framing: &Framing) {
        self.camera = Camera::looking_at_origin(framing.distance);
        self.projection.znear = (framing.distance / 100.0).min(DEFAULT_ZNEAR);
        self.projection.zfar = (framing.distance * 10.0).max(DEFAULT_ZFAR);
        self.refresh();
    }

    /// Returns to the fixed default view.
    pub fn reset(&mut self) {
        self.apply(&Framing::default());
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.projection.resize(width, height);
        self.refresh();
    }

    pub fn uniform(&self) -> &CameraUniform {
        &self.uniform
    }

    fn refresh(&mut self) {
        self.uniform.update_view_proj(&self.camera, &self.projection);
    }
}
