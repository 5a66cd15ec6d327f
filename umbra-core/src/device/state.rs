/// Binding state and scoped acquisition

use std::ops::{Deref, DerefMut};

use nalgebra::Vector4;

use super::{BufferId, CullFace, Device, FramebufferId, ProgramId, TextureId, MAX_TEXTURE_UNITS};

/// Everything a draw reads from the device besides object contents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BindingState {
    /// `None` is the default framebuffer
    pub framebuffer: Option<FramebufferId>,
    pub program: Option<ProgramId>,
    pub vertex_buffer: Option<BufferId>,
    pub texture_units: [Option<TextureId>; MAX_TEXTURE_UNITS],
    pub depth_test: bool,
    pub cull_face: Option<CullFace>,
    pub clear_color: Vector4<f32>,
}

impl Default for BindingState {
    fn default() -> Self {
        Self {
            framebuffer: None,
            program: None,
            vertex_buffer: None,
            texture_units: [None; MAX_TEXTURE_UNITS],
            depth_test: false,
            cull_face: None,
            clear_color: Vector4::zeros(),
        }
    }
}

/// Exclusive access to a device whose binding state is restored on drop.
///
/// Every bind, toggle and clear color set through the scope is undone when
/// it goes out of scope, including early returns through `?`.
pub struct RenderScope<'d> {
    device: &'d mut Device,
    saved: BindingState,
}

impl<'d> RenderScope<'d> {
    pub(crate) fn new(device: &'d mut Device) -> Self {
        let saved = *device.state();
        Self { device, saved }
    }

    /// State that will be restored
    pub fn saved(&self) -> &BindingState {
        &self.saved
    }
}

impl Deref for RenderScope<'_> {
    type Target = Device;

    fn deref(&self) -> &Device {
        self.device
    }
}

impl DerefMut for RenderScope<'_> {
    fn deref_mut(&mut self) -> &mut Device {
        self.device
    }
}

impl Drop for RenderScope<'_> {
    fn drop(&mut self) {
        self.device.restore_state(self.saved);
    }
}
