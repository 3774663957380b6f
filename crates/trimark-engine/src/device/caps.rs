/// Capability snapshot taken once at device creation.
///
/// The stage consults this when normalizing its submission options; the
/// snapshot never changes for the lifetime of the device.
#[derive(Debug, Clone)]
pub struct GpuCaps {
    pub features: wgpu::Features,
    pub limits: wgpu::Limits,
}

impl GpuCaps {
    pub(crate) fn of(device: &wgpu::Device) -> Self {
        Self {
            features: device.features(),
            limits: device.limits(),
        }
    }

    /// Whether batched indirect submission is available.
    ///
    /// Both features are needed: the indirect records seed the shader's
    /// `instance_index` through `first_instance`, which silently reads as
    /// zero without `INDIRECT_FIRST_INSTANCE`.
    pub fn multi_draw(&self) -> bool {
        self.features.contains(wgpu::Features::MULTI_DRAW_INDIRECT_COUNT)
            && self.features.contains(wgpu::Features::INDIRECT_FIRST_INSTANCE)
    }

    /// Largest uniform-block binding the device accepts, in bytes.
    pub fn max_uniform_block_bytes(&self) -> u32 {
        self.limits.max_uniform_buffer_binding_size
    }

    /// Required alignment for dynamic uniform-buffer offsets, in bytes.
    pub fn uniform_offset_alignment(&self) -> u32 {
        self.limits.min_uniform_buffer_offset_alignment
    }
}
