//! Node transforms and their packed GPU form.
//!
//! Every scene node carries a local [`Instance`] (translation, rotation and
//! scale). World matrices are produced while walking the scene graph and are
//! handed to the rendering backend as [`InstanceRaw`].

use cgmath::{Matrix, Matrix3, Matrix4, One, SquareMatrix};

/// Local transformation of a scene node: position, rotation (as quaternion), and scale.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl From<cgmath::Vector3<f32>> for Instance {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The raw instance is what a backend uploads per draw call: the world matrix,
 * the matrix used to transform normals and the handedness of the world matrix
 * (negative scales flip the winding order).
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 3]; 3],
    pub handedness: f32,
}

impl InstanceRaw {
    pub fn from_matrix(world: &Matrix4<f32>) -> Self {
        let linear = Matrix3::from_cols(
            world.x.truncate(),
            world.y.truncate(),
            world.z.truncate(),
        );
        // inverse-transpose keeps normals perpendicular under non-uniform scale
        let normal = linear
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(linear);
        Self {
            model: (*world).into(),
            normal: normal.into(),
            handedness: world.determinant().signum(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Vertex buffer layout for backends that upload instances as a per-instance buffer.
    /// Occupies shader locations 5 to 12.
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 8] = wgpu::vertex_attr_array![
            5 => Float32x4,
            6 => Float32x4,
            7 => Float32x4,
            8 => Float32x4,
            9 => Float32x3,
            10 => Float32x3,
            11 => Float32x3,
            12 => Float32,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}
