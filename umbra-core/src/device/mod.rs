/// Software rasterizing device with GL-style binding semantics
///
/// Objects (textures, framebuffers, vertex buffers, programs) live in slabs
/// addressed by typed ids. Draws read the current `BindingState`: the bound
/// framebuffer (or the default one), program, vertex buffer, texture units,
/// depth test and face culling. Errors from misuse are recorded and can be
/// read back with `Device::take_error`, they never panic.

pub mod program;
mod raster;
pub mod state;
pub mod texture;

use nalgebra::Vector4;
use thiserror::Error;

use crate::error::ShaderBuildError;
use crate::geometry::AssembledVertex;

pub use program::{
    Fragment, FragmentStage, Program, Samplers, UniformValue, Uniforms, Varyings, VertexStage,
    MAX_VARYINGS,
};
pub use state::{BindingState, RenderScope};
pub use texture::{CompareFunc, Filter, SamplerParams, TextureFormat, TextureObject, Wrap};

use raster::{ClipVertex, RasterState, RasterTarget};
use texture::Texels;

/// Number of texture units a program can sample from
pub const MAX_TEXTURE_UNITS: usize = 4;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

handle!(
    /// Handle to a texture
    TextureId
);
handle!(
    /// Handle to a framebuffer object
    FramebufferId
);
handle!(
    /// Handle to a vertex buffer
    BufferId
);
handle!(
    /// Handle to a linked program
    ProgramId
);

impl ProgramId {
    /// Left in place of a program that failed to build
    pub const INVALID: ProgramId = ProgramId(u32::MAX);

    pub fn is_invalid(self) -> bool {
        self == Self::INVALID
    }
}

/// Which faces are discarded before rasterization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullFace {
    Front,
    Back,
    FrontAndBack,
}

/// Result of a framebuffer completeness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    /// No attachment at all
    IncompleteMissingAttachment,
    /// An attachment was deleted or has the wrong kind of format
    IncompleteAttachment,
    /// Attachments disagree on size, or one has zero area
    IncompleteDimensions,
}

/// Buffers affected by [`Device::clear`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearFlags(u8);

impl ClearFlags {
    pub const COLOR: Self = Self(1 << 0);
    pub const DEPTH: Self = Self(1 << 1);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for ClearFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Misuse recorded by the device
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Invalid operation: {0}")]
    InvalidOperation(&'static str),
    #[error("Invalid handle: {0}")]
    InvalidHandle(&'static str),
    #[error("Invalid framebuffer operation: {0:?}")]
    InvalidFramebufferOperation(FramebufferStatus),
}

/// Counters from the most recent draw call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub triangles_submitted: usize,
    pub triangles_rasterized: usize,
    pub fragments_written: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct FramebufferObject {
    color: Option<TextureId>,
    depth: Option<TextureId>,
}

#[derive(Debug)]
struct DefaultFramebuffer {
    width: usize,
    height: usize,
    color: Vec<Vector4<f32>>,
    depth: Vec<f32>,
}

impl DefaultFramebuffer {
    fn new(width: u32, height: u32) -> Self {
        let size = width as usize * height as usize;
        Self {
            width: width as usize,
            height: height as usize,
            color: vec![Vector4::zeros(); size],
            depth: vec![1.0; size],
        }
    }
}

/// Attachment storage moved out of its textures for the duration of a draw
struct Offscreen {
    width: usize,
    height: usize,
    color: Option<(TextureId, Vec<Vector4<f32>>)>,
    depth: Option<(TextureId, Vec<f32>, TextureFormat)>,
}

/// The single device context shared by every render pass
#[derive(Debug)]
pub struct Device {
    textures: Vec<Option<TextureObject>>,
    framebuffers: Vec<Option<FramebufferObject>>,
    buffers: Vec<Option<Vec<AssembledVertex>>>,
    programs: Vec<Option<Program>>,
    default_framebuffer: DefaultFramebuffer,
    state: BindingState,
    error: Option<DeviceError>,
    last_draw: DrawStats,
}

impl Device {
    /// Create a device whose default framebuffer is `width` x `height`
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            textures: Vec::new(),
            framebuffers: Vec::new(),
            buffers: Vec::new(),
            programs: Vec::new(),
            default_framebuffer: DefaultFramebuffer::new(width, height),
            state: BindingState::default(),
            error: None,
            last_draw: DrawStats::default(),
        }
    }

    pub fn width(&self) -> u32 {
        self.default_framebuffer.width as u32
    }

    pub fn height(&self) -> u32 {
        self.default_framebuffer.height as u32
    }

    /// Reallocate the default framebuffer; its contents are lost
    pub fn resize(&mut self, width: u32, height: u32) {
        let current = (self.default_framebuffer.width, self.default_framebuffer.height);
        if (width as usize, height as usize) != current {
            self.default_framebuffer = DefaultFramebuffer::new(width, height);
        }
    }

    /// Default framebuffer color, row 0 at the bottom
    pub fn color_buffer(&self) -> &[Vector4<f32>] {
        &self.default_framebuffer.color
    }

    /// Default framebuffer depth, row 0 at the bottom
    pub fn depth_buffer(&self) -> &[f32] {
        &self.default_framebuffer.depth
    }

    pub fn state(&self) -> &BindingState {
        &self.state
    }

    /// Acquire the device with automatic state restore
    pub fn scope(&mut self) -> RenderScope<'_> {
        RenderScope::new(self)
    }

    pub(crate) fn restore_state(&mut self, state: BindingState) {
        self.state = state;
    }

    /// Return and clear the oldest unread error
    pub fn take_error(&mut self) -> Option<DeviceError> {
        self.error.take()
    }

    pub fn last_draw(&self) -> DrawStats {
        self.last_draw
    }

    fn record(&mut self, error: DeviceError) {
        log::trace!("device error: {error}");
        self.error.get_or_insert(error);
    }

    // Textures

    pub fn create_texture(&mut self, width: u32, height: u32, format: TextureFormat) -> TextureId {
        insert(&mut self.textures, TextureObject::new(width, height, format), TextureId)
    }

    /// Create an RGBA8 texture from tightly packed rows, bottom row first
    pub fn create_texture_rgba8(&mut self, width: u32, height: u32, pixels: &[u8]) -> TextureId {
        let mut texture = TextureObject::new(width, height, TextureFormat::Rgba8);
        texture.upload_rgba8(pixels);
        insert(&mut self.textures, texture, TextureId)
    }

    pub fn set_sampler(&mut self, id: TextureId, params: SamplerParams) {
        match self.texture_mut(id) {
            Some(texture) => texture.sampler = params,
            None => self.record(DeviceError::InvalidHandle("texture")),
        }
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureObject> {
        self.textures.get(id.index()).and_then(Option::as_ref)
    }

    fn texture_mut(&mut self, id: TextureId) -> Option<&mut TextureObject> {
        self.textures.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn delete_texture(&mut self, id: TextureId) {
        if let Some(slot) = self.textures.get_mut(id.index()) {
            *slot = None;
        }
        for unit in &mut self.state.texture_units {
            if *unit == Some(id) {
                *unit = None;
            }
        }
    }

    pub fn bind_texture(&mut self, unit: usize, id: Option<TextureId>) {
        match self.state.texture_units.get_mut(unit) {
            Some(slot) => *slot = id,
            None => self.record(DeviceError::InvalidOperation("texture unit out of range")),
        }
    }

    // Framebuffers

    pub fn create_framebuffer(&mut self) -> FramebufferId {
        insert(&mut self.framebuffers, FramebufferObject::default(), FramebufferId)
    }

    pub fn attach_depth(&mut self, framebuffer: FramebufferId, texture: Option<TextureId>) {
        match self.framebuffers.get_mut(framebuffer.index()).and_then(Option::as_mut) {
            Some(fbo) => fbo.depth = texture,
            None => self.record(DeviceError::InvalidHandle("framebuffer")),
        }
    }

    pub fn attach_color(&mut self, framebuffer: FramebufferId, texture: Option<TextureId>) {
        match self.framebuffers.get_mut(framebuffer.index()).and_then(Option::as_mut) {
            Some(fbo) => fbo.color = texture,
            None => self.record(DeviceError::InvalidHandle("framebuffer")),
        }
    }

    pub fn delete_framebuffer(&mut self, id: FramebufferId) {
        if let Some(slot) = self.framebuffers.get_mut(id.index()) {
            *slot = None;
        }
        if self.state.framebuffer == Some(id) {
            self.state.framebuffer = None;
        }
    }

    /// `None` binds the default framebuffer
    pub fn bind_framebuffer(&mut self, id: Option<FramebufferId>) {
        self.state.framebuffer = id;
    }

    pub fn framebuffer_status(&self, id: FramebufferId) -> FramebufferStatus {
        let Some(fbo) = self.framebuffers.get(id.index()).and_then(Option::as_ref) else {
            return FramebufferStatus::IncompleteAttachment;
        };
        if fbo.color.is_none() && fbo.depth.is_none() {
            return FramebufferStatus::IncompleteMissingAttachment;
        }

        let mut size = None;
        for (attachment, wants_depth) in [(fbo.color, false), (fbo.depth, true)] {
            let Some(id) = attachment else {
                continue;
            };
            let Some(texture) = self.texture(id) else {
                return FramebufferStatus::IncompleteAttachment;
            };
            if texture.format().is_depth() != wants_depth {
                return FramebufferStatus::IncompleteAttachment;
            }

            let dims = (texture.width(), texture.height());
            if dims.0 == 0 || dims.1 == 0 || size.is_some_and(|size| size != dims) {
                return FramebufferStatus::IncompleteDimensions;
            }
            size = Some(dims);
        }

        FramebufferStatus::Complete
    }

    /// Completeness of the bound render destination
    pub fn check_framebuffer_status(&self) -> FramebufferStatus {
        match self.state.framebuffer {
            Some(id) => self.framebuffer_status(id),
            None => FramebufferStatus::Complete,
        }
    }

    // Buffers and programs

    /// Upload a vertex sequence; the device keeps its own copy
    pub fn create_vertex_buffer(&mut self, vertices: &[AssembledVertex]) -> BufferId {
        insert(&mut self.buffers, vertices.to_vec(), BufferId)
    }

    pub fn delete_buffer(&mut self, id: BufferId) {
        if let Some(slot) = self.buffers.get_mut(id.index()) {
            *slot = None;
        }
        if self.state.vertex_buffer == Some(id) {
            self.state.vertex_buffer = None;
        }
    }

    pub fn bind_vertex_buffer(&mut self, id: Option<BufferId>) {
        self.state.vertex_buffer = id;
    }

    pub fn vertex_count(&self, id: BufferId) -> Option<usize> {
        self.buffers.get(id.index()).and_then(Option::as_ref).map(Vec::len)
    }

    /// Compile and link a program from its two stages
    pub fn create_program(
        &mut self,
        vertex: Box<dyn VertexStage>,
        fragment: Box<dyn FragmentStage>,
    ) -> Result<ProgramId, ShaderBuildError> {
        let program = program::link(vertex, fragment)?;
        Ok(insert(&mut self.programs, program, ProgramId))
    }

    pub fn delete_program(&mut self, id: ProgramId) {
        if let Some(slot) = self.programs.get_mut(id.index()) {
            *slot = None;
        }
        if self.state.program == Some(id) {
            self.state.program = None;
        }
    }

    /// Binding is not validated; draws with an unusable program do nothing
    pub fn use_program(&mut self, id: Option<ProgramId>) {
        self.state.program = id;
    }

    pub fn program(&self, id: ProgramId) -> Option<&Program> {
        self.programs.get(id.index()).and_then(Option::as_ref)
    }

    /// Set a uniform on the bound program
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let program = self
            .state
            .program
            .and_then(|id| self.programs.get_mut(id.index()))
            .and_then(Option::as_mut);
        match program {
            Some(program) => program.uniforms.set(name, value),
            None => self.record(DeviceError::InvalidOperation("no usable program bound")),
        }
    }

    // Fixed-function state

    pub fn set_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    pub fn set_cull_face(&mut self, cull_face: Option<CullFace>) {
        self.state.cull_face = cull_face;
    }

    pub fn set_clear_color(&mut self, color: Vector4<f32>) {
        self.state.clear_color = color;
    }

    /// Clear the bound render destination; depth clears to 1.0
    pub fn clear(&mut self, flags: ClearFlags) {
        let clear_color = self.state.clear_color;
        match self.state.framebuffer {
            None => {
                if flags.contains(ClearFlags::COLOR) {
                    self.default_framebuffer.color.fill(clear_color);
                }
                if flags.contains(ClearFlags::DEPTH) {
                    self.default_framebuffer.depth.fill(1.0);
                }
            }
            Some(id) => {
                let Some(fbo) = self.framebuffers.get(id.index()).copied().flatten() else {
                    self.record(DeviceError::InvalidHandle("framebuffer"));
                    return;
                };
                if flags.contains(ClearFlags::COLOR) {
                    if let Some(texture) = fbo.color.and_then(|id| self.texture_mut(id)) {
                        texture.fill_color(clear_color);
                    }
                }
                if flags.contains(ClearFlags::DEPTH) {
                    if let Some(texture) = fbo.depth.and_then(|id| self.texture_mut(id)) {
                        texture.fill_depth(1.0);
                    }
                }
            }
        }
    }

    /// Draw `count` vertices starting at `first` as a triangle list
    pub fn draw_arrays(&mut self, first: usize, count: usize) {
        self.last_draw = DrawStats::default();

        let usable_program = self
            .state
            .program
            .is_some_and(|id| self.programs.get(id.index()).is_some_and(Option::is_some));
        if !usable_program {
            self.record(DeviceError::InvalidOperation("draw without a usable program"));
            return;
        }
        let Some(buffer_len) = self.state.vertex_buffer.and_then(|id| self.vertex_count(id)) else {
            self.record(DeviceError::InvalidOperation("draw without a vertex buffer"));
            return;
        };
        if first.saturating_add(count) > buffer_len {
            self.record(DeviceError::InvalidOperation("draw range exceeds vertex buffer"));
            return;
        }
        let status = self.check_framebuffer_status();
        if status != FramebufferStatus::Complete {
            self.record(DeviceError::InvalidFramebufferOperation(status));
            return;
        }

        let mut offscreen = self.state.framebuffer.map(|id| self.take_attachments(id));
        let stats = self.rasterize(offscreen.as_mut(), first, count);
        if let Some(offscreen) = offscreen {
            self.return_attachments(offscreen);
        }

        log::trace!("draw_arrays({first}, {count}): {stats:?}");
        self.last_draw = stats;
    }

    fn rasterize(
        &mut self,
        offscreen: Option<&mut Offscreen>,
        first: usize,
        count: usize,
    ) -> DrawStats {
        let mut stats = DrawStats::default();
        let state = self.state;

        let (Some(program), Some(vertices)) = (
            state
                .program
                .and_then(|id| self.programs.get(id.index()))
                .and_then(Option::as_ref),
            state
                .vertex_buffer
                .and_then(|id| self.buffers.get(id.index()))
                .and_then(Option::as_ref),
        ) else {
            return stats;
        };

        let units = state
            .texture_units
            .map(|unit| unit.and_then(|id| self.textures.get(id.index())).and_then(Option::as_ref));
        let samplers = Samplers::new(units);

        let mut target = match offscreen {
            Some(offscreen) => RasterTarget {
                width: offscreen.width,
                height: offscreen.height,
                color: offscreen.color.as_mut().map(|(_, texels)| texels.as_mut_slice()),
                depth_format: offscreen
                    .depth
                    .as_ref()
                    .map_or(TextureFormat::Depth32Float, |(_, _, format)| *format),
                depth: offscreen.depth.as_mut().map(|(_, texels, _)| texels.as_mut_slice()),
            },
            None => RasterTarget {
                width: self.default_framebuffer.width,
                height: self.default_framebuffer.height,
                color: Some(self.default_framebuffer.color.as_mut_slice()),
                depth: Some(self.default_framebuffer.depth.as_mut_slice()),
                depth_format: TextureFormat::Depth32Float,
            },
        };
        let raster = RasterState {
            depth_test: state.depth_test,
            cull_face: state.cull_face,
            varying_count: program.varying_count(),
        };

        for triangle in vertices[first..first + count].chunks_exact(3) {
            stats.triangles_submitted += 1;

            let clip = [0, 1, 2].map(|corner| {
                let mut varyings = [0.0; MAX_VARYINGS];
                let clip =
                    program.vertex.shade(&program.uniforms, &triangle[corner], &mut varyings);
                ClipVertex { clip, varyings }
            });

            let written =
                raster::rasterize_triangle(&mut target, &raster, &clip, |coord, varyings| {
                    program.fragment.shade(&Fragment {
                        coord,
                        varyings,
                        uniforms: &program.uniforms,
                        samplers: &samplers,
                    })
                });
            if let Some(written) = written {
                stats.triangles_rasterized += 1;
                stats.fragments_written += written;
            }
        }

        stats
    }

    fn take_attachments(&mut self, id: FramebufferId) -> Offscreen {
        let fbo = self.framebuffers.get(id.index()).copied().flatten().unwrap_or_default();
        let mut offscreen = Offscreen {
            width: 0,
            height: 0,
            color: None,
            depth: None,
        };

        if let Some(texture_id) = fbo.color {
            if let Some(texture) = self.texture_mut(texture_id) {
                offscreen.width = texture.width() as usize;
                offscreen.height = texture.height() as usize;
                if let Texels::Color(texels) = &mut texture.texels {
                    offscreen.color = Some((texture_id, std::mem::take(texels)));
                }
            }
        }
        if let Some(texture_id) = fbo.depth {
            if let Some(texture) = self.texture_mut(texture_id) {
                offscreen.width = texture.width() as usize;
                offscreen.height = texture.height() as usize;
                let format = texture.format();
                if let Texels::Depth(texels) = &mut texture.texels {
                    offscreen.depth = Some((texture_id, std::mem::take(texels), format));
                }
            }
        }

        offscreen
    }

    fn return_attachments(&mut self, offscreen: Offscreen) {
        if let Some((id, texels)) = offscreen.color {
            if let Some(texture) = self.texture_mut(id) {
                texture.texels = Texels::Color(texels);
            }
        }
        if let Some((id, texels, _)) = offscreen.depth {
            if let Some(texture) = self.texture_mut(id) {
                texture.texels = Texels::Depth(texels);
            }
        }
    }
}

fn insert<T, I>(slab: &mut Vec<Option<T>>, value: T, make_id: fn(u32) -> I) -> I {
    let index = match slab.iter().position(Option::is_none) {
        Some(free) => {
            slab[free] = Some(value);
            free
        }
        None => {
            slab.push(Some(value));
            slab.len() - 1
        }
    };
    make_id(index as u32)
}
