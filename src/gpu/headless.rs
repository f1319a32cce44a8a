//! A backend with no device behind it. Every call is appended to a shared
//! log so tests and the demo binary can inspect what would have been drawn.

use super::{GraphicsBackend, PrimitiveMode, SceneVertex, ShaderProgram, TextureId, Uniform, VertexBuffer};
use crate::errors::{Result, ShaderStage, ViewerError};
use image::RgbaImage;
use std::cell::RefCell;
use std::collections::HashSet;
use std::ops::Range;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    Compile,
    BindAttribute { name: String, slot: u32 },
    SetUniform { name: String, value: Uniform },
    ProgramDraw { mode: PrimitiveMode, vertices: Range<u32> },
    CreateBuffer,
    UploadVertices { count: usize, bytes: usize },
    BindBuffer,
    DrawArrays { mode: PrimitiveMode, start: u32, count: u32 },
    UploadTexture { texture: TextureId, width: u32, height: u32 },
    BindTexture(TextureId),
    DeleteTexture(TextureId),
    Clear([f32; 4]),
}

type CallLog = Rc<RefCell<Vec<GpuCall>>>;

pub struct RecordingProgram {
    log: CallLog,
}

impl ShaderProgram for RecordingProgram {
    fn bind_attribute(&mut self, name: &str, slot: u32) {
        self.log.borrow_mut().push(GpuCall::BindAttribute {
            name: name.to_string(),
            slot,
        });
    }

    fn set_uniform(&mut self, name: &str, value: Uniform) {
        self.log.borrow_mut().push(GpuCall::SetUniform {
            name: name.to_string(),
            value,
        });
    }

    fn draw(&mut self, mode: PrimitiveMode, vertices: Range<u32>) {
        self.log.borrow_mut().push(GpuCall::ProgramDraw { mode, vertices });
    }
}

pub struct RecordingBuffer {
    log: CallLog,
    vertex_count: usize,
}

impl VertexBuffer for RecordingBuffer {
    fn upload(&mut self, vertices: &[SceneVertex]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        self.vertex_count = vertices.len();
        self.log.borrow_mut().push(GpuCall::UploadVertices {
            count: vertices.len(),
            bytes: bytes.len(),
        });
        Ok(())
    }

    fn bind(&mut self) {
        self.log.borrow_mut().push(GpuCall::BindBuffer);
    }

    fn draw(&mut self, mode: PrimitiveMode, start: u32, count: u32) {
        if (start + count) as usize > self.vertex_count {
            tracing::warn!(start, count, uploaded = self.vertex_count, "draw past end of vertex buffer");
        }
        self.log.borrow_mut().push(GpuCall::DrawArrays { mode, start, count });
    }
}

/// Records calls instead of issuing them.
///
/// [`RecordingBackend::failing`] builds one whose shader compilation always
/// fails, for exercising the disabled-drawing path.
#[derive(Default)]
pub struct RecordingBackend {
    log: CallLog,
    next_texture: u32,
    live_textures: HashSet<TextureId>,
    fail_compile: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_compile: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<GpuCall> {
        self.log.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn count(&self, matches: impl Fn(&GpuCall) -> bool) -> usize {
        self.log.borrow().iter().filter(|call| matches(call)).count()
    }

    pub fn draw_count(&self) -> usize {
        self.count(|call| matches!(call, GpuCall::DrawArrays { .. } | GpuCall::ProgramDraw { .. }))
    }

    pub fn compile_count(&self) -> usize {
        self.count(|call| matches!(call, GpuCall::Compile))
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures.len()
    }
}

impl GraphicsBackend for RecordingBackend {
    type Program = RecordingProgram;
    type Buffer = RecordingBuffer;

    fn compile(&mut self, vertex_source: &str, fragment_source: &str) -> Result<RecordingProgram> {
        self.log.borrow_mut().push(GpuCall::Compile);
        if self.fail_compile {
            return Err(ViewerError::ProgramCompile {
                stage: ShaderStage::Vertex,
                log: "headless backend configured to fail".to_string(),
            });
        }
        if vertex_source.trim().is_empty() {
            return Err(ViewerError::ProgramCompile {
                stage: ShaderStage::Vertex,
                log: "empty source".to_string(),
            });
        }
        if fragment_source.trim().is_empty() {
            return Err(ViewerError::ProgramCompile {
                stage: ShaderStage::Fragment,
                log: "empty source".to_string(),
            });
        }
        Ok(RecordingProgram {
            log: Rc::clone(&self.log),
        })
    }

    fn create_buffer(&mut self) -> Result<RecordingBuffer> {
        self.log.borrow_mut().push(GpuCall::CreateBuffer);
        Ok(RecordingBuffer {
            log: Rc::clone(&self.log),
            vertex_count: 0,
        })
    }

    fn upload_texture(&mut self, bitmap: &RgbaImage) -> Result<TextureId> {
        let (width, height) = bitmap.dimensions();
        if width == 0 || height == 0 {
            return Err(ViewerError::TextureUpload {
                width,
                height,
                message: "empty bitmap".to_string(),
            });
        }
        self.next_texture += 1;
        let texture = TextureId(self.next_texture);
        self.live_textures.insert(texture);
        self.log.borrow_mut().push(GpuCall::UploadTexture { texture, width, height });
        Ok(texture)
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.log.borrow_mut().push(GpuCall::BindTexture(texture));
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.live_textures.remove(&texture);
        self.log.borrow_mut().push(GpuCall::DeleteTexture(texture));
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.log.borrow_mut().push(GpuCall::Clear(color));
    }
}
