//! A batch drawn with textures and a shader program

use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use super::batch::Batch;
use super::shader::Program;
use super::texture::TextureBase;
use crate::context::RenderContext;
use crate::geometry::GeometryResult;

/// [`Batch`] plus per-unit textures and an optional program.
///
/// Binding enables textures from the highest unit down, then the program,
/// then the geometry. Unbinding walks the same path back and leaves unit 0
/// active.
#[derive(Default)]
pub struct Mesh {
    batch: Batch,
    textures: Vec<Option<Rc<dyn TextureBase>>>,
    program: Option<Rc<Program>>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_batch(batch: Batch) -> Self {
        Self {
            batch,
            ..Self::default()
        }
    }

    /// Set or clear the texture on `unit`, growing the list as needed.
    pub fn set_texture(&mut self, unit: usize, texture: Option<Rc<dyn TextureBase>>) {
        if unit >= self.textures.len() {
            if texture.is_none() {
                return;
            }
            self.textures.resize_with(unit + 1, || None);
        }
        self.textures[unit] = texture;
    }

    pub fn texture(&self, unit: usize) -> Option<&Rc<dyn TextureBase>> {
        self.textures.get(unit).and_then(Option::as_ref)
    }

    pub fn texture_units(&self) -> usize {
        self.textures.len()
    }

    pub fn set_program(&mut self, program: Option<Rc<Program>>) {
        self.program = program;
    }

    pub fn program(&self) -> Option<&Rc<Program>> {
        self.program.as_ref()
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn into_batch(self) -> Batch {
        self.batch
    }

    /// Upload pending geometry, then enable textures, program and buffer.
    ///
    /// A failed upload leaves texture and program state untouched.
    pub fn bind(&mut self, ctx: &RenderContext) -> GeometryResult<()> {
        self.batch.update(ctx)?;
        for (unit, texture) in self.textures.iter().enumerate().rev() {
            if let Some(texture) = texture {
                ctx.api().active_texture_unit(unit as u32);
                texture.enable();
            }
        }
        if let Some(program) = &self.program {
            program.bind();
        }
        if let Err(err) = self.batch.bind(ctx) {
            self.unbind(ctx);
            return Err(err);
        }
        Ok(())
    }

    pub fn unbind(&self, ctx: &RenderContext) {
        self.batch.unbind();
        if let Some(program) = &self.program {
            program.unbind();
        }
        let mut touched = false;
        for (unit, texture) in self.textures.iter().enumerate().rev() {
            if let Some(texture) = texture {
                ctx.api().active_texture_unit(unit as u32);
                texture.disable();
                touched = true;
            }
        }
        if touched {
            ctx.api().active_texture_unit(0);
        }
    }

    /// Bind, draw, unbind.
    pub fn render(&mut self, ctx: &RenderContext) -> GeometryResult<()> {
        self.bind(ctx)?;
        let result = self.batch.render_once();
        self.unbind(ctx);
        result
    }
}

impl Deref for Mesh {
    type Target = Batch;

    fn deref(&self) -> &Batch {
        &self.batch
    }
}

impl DerefMut for Mesh {
    fn deref_mut(&mut self) -> &mut Batch {
        &mut self.batch
    }
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let textures: Vec<Option<String>> = self
            .textures
            .iter()
            .map(|t| t.as_ref().map(|t| t.debug_string()))
            .collect();
        f.debug_struct("Mesh")
            .field("batch", &self.batch)
            .field("textures", &textures)
            .field("program", &self.program)
            .finish()
    }
}
