/// Interleaved vertex layout of the image quad.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl SceneVertex {
    pub const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self {
            position: [x, y, 0.0],
            tex_coords: [u, v],
        }
    }
}

/// Fixed attribute slots shared by every program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum VertexAttribute {
    Position = 0,
    TexCoords0 = 3,
}

impl VertexAttribute {
    pub fn name(self) -> &'static str {
        match self {
            VertexAttribute::Position => "a_position",
            VertexAttribute::TexCoords0 => "a_texCoords0",
        }
    }

    pub fn slot(self) -> u32 {
        self as u32
    }
}

/// Two triangles covering `[-hw, hw] x [-hh, hh]`, textured with a
/// bottom-left origin.
pub fn quad_vertices(half_width: f32, half_height: f32) -> [SceneVertex; 6] {
    let (w, h) = (half_width, half_height);
    [
        SceneVertex::new(-w, -h, 0.0, 0.0),
        SceneVertex::new(w, -h, 1.0, 0.0),
        SceneVertex::new(-w, h, 0.0, 1.0),
        SceneVertex::new(w, -h, 1.0, 0.0),
        SceneVertex::new(-w, h, 0.0, 1.0),
        SceneVertex::new(w, h, 1.0, 1.0),
    ]
}
