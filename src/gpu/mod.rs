//! The drawing surface the view talks to.
//!
//! Shader compilation and buffer management belong to the host's graphics
//! API; the view only needs the three traits below. [`headless`] provides a
//! backend that records calls instead of issuing them.

pub mod headless;
pub mod types;

pub use types::*;

use crate::errors::Result;
use crate::math::Transform;
use image::RgbaImage;
use std::ops::Range;

pub const UNIFORM_MVP_MATRIX: &str = "u_mvpMatrix";
pub const UNIFORM_CONSTANT_COLOR: &str = "u_constantColor";
pub const UNIFORM_SAMPLERS: &str = "u_units";

pub const VERTEX_SHADER: &str = r#"
attribute vec3 a_position;
attribute vec2 a_texCoords0;

uniform highp mat4 u_mvpMatrix;

varying lowp vec2 v_texCoords0;

void main()
{
    v_texCoords0 = a_texCoords0;
    gl_Position = u_mvpMatrix * vec4(a_position, 1.0);
}
"#;

pub const FRAGMENT_SHADER: &str = r#"
uniform sampler2D u_units;
uniform lowp vec4 u_constantColor;

varying lowp vec2 v_texCoords0;

void main()
{
    gl_FragColor = u_constantColor * texture2D(u_units, v_texCoords0);
}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveMode {
    Triangles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Uniform {
    Mat4([f32; 16]),
    Vec4([f32; 4]),
    Sampler(i32),
}

/// A compiled and linked program.
pub trait ShaderProgram {
    fn bind_attribute(&mut self, name: &str, slot: u32);
    fn set_uniform(&mut self, name: &str, value: Uniform);
    fn draw(&mut self, mode: PrimitiveMode, vertices: Range<u32>);
}

pub trait VertexBuffer {
    fn upload(&mut self, vertices: &[SceneVertex]) -> Result<()>;
    fn bind(&mut self);
    fn draw(&mut self, mode: PrimitiveMode, start: u32, count: u32);
}

/// Resource factory for one drawable surface. Everything it hands out is
/// invalid once the surface is torn down.
pub trait GraphicsBackend {
    type Program: ShaderProgram;
    type Buffer: VertexBuffer;

    fn compile(&mut self, vertex_source: &str, fragment_source: &str) -> Result<Self::Program>;
    fn create_buffer(&mut self) -> Result<Self::Buffer>;
    /// Uploads a bitmap whose first row is the bottom of the image.
    fn upload_texture(&mut self, bitmap: &RgbaImage) -> Result<TextureId>;
    fn bind_texture(&mut self, texture: TextureId);
    fn delete_texture(&mut self, texture: TextureId);
    fn clear(&mut self, color: [f32; 4]);
}

/// Everything the image shader needs for one draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawParams {
    pub model_view: Transform,
    pub projection: Transform,
    pub constant_color: [f32; 4],
    pub texture: Option<TextureId>,
}

impl Default for DrawParams {
    fn default() -> Self {
        Self {
            model_view: Transform::IDENTITY,
            projection: Transform::IDENTITY,
            constant_color: [1.0, 1.0, 1.0, 1.0],
            texture: None,
        }
    }
}

impl DrawParams {
    pub fn mvp(&self) -> Transform {
        self.projection.multiply(&self.model_view)
    }

    pub fn apply<P: ShaderProgram + ?Sized>(&self, program: &mut P) {
        program.set_uniform(UNIFORM_MVP_MATRIX, Uniform::Mat4(self.mvp().m));
        program.set_uniform(UNIFORM_CONSTANT_COLOR, Uniform::Vec4(self.constant_color));
        program.set_uniform(UNIFORM_SAMPLERS, Uniform::Sampler(0));
    }
}
