//! Content-addressed cache of immutable native state objects.
//!
//! The state manager builds a descriptor key for each monolithic native state object and asks the
//! cache for the matching object. Equal keys must yield the same id, otherwise the state manager's
//! snapshot comparisons stop deduplicating binds.

use std::hash::Hash;

use hashbrown::HashMap;

use crate::gl::{BlendState, DepthStencilState, FramebufferState, RasterizerState, SamplerState};
use crate::native::DeviceError;
use crate::serial::{InputLayoutId, ResourceSerial, SerialFactory, StateObjectId};
use crate::vertex::InputLayoutKey;

/// Serial base for objects created by [`HashingStateCache`].
pub const STATE_CACHE_SERIAL_BASE: u64 = 1 << 40;

/// Color attachments a blend key can describe.
pub const MAX_BLEND_RENDER_TARGETS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendStateKey {
    pub blend: BlendState,
    /// Effective RGBA write mask per bound render target; zero for unbound slots.
    pub render_target_write_masks: [u8; MAX_BLEND_RENDER_TARGETS],
    /// More than one render target is bound; enables independent blend.
    pub mrt: bool,
}

impl BlendStateKey {
    pub fn new(framebuffer: &FramebufferState, blend: &BlendState) -> Self {
        let mut render_target_write_masks = [0u8; MAX_BLEND_RENDER_TARGETS];
        let mut bound = 0;
        for (i, attachment) in framebuffer
            .color_attachments
            .iter()
            .take(MAX_BLEND_RENDER_TARGETS)
            .enumerate()
        {
            let Some(attachment) = attachment else {
                continue;
            };
            let mut mask = blend.color_write_mask();
            if !attachment.format.has_alpha() {
                mask &= 0b0111;
            }
            render_target_write_masks[i] = mask;
            bound += 1;
        }
        Self {
            blend: *blend,
            render_target_write_masks,
            mrt: bound > 1,
        }
    }
}

/// Rasterizer state with bit-exact float fields, plus the scissor enable the native object bakes
/// in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RasterizerStateKey {
    pub cull_face: bool,
    pub cull_mode: crate::gl::CullFaceMode,
    pub front_face: crate::gl::FrontFace,
    pub polygon_offset_fill: bool,
    pub polygon_offset_factor: u32,
    pub polygon_offset_units: u32,
    pub rasterizer_discard: bool,
    pub point_draw_mode: bool,
    pub multi_sample: bool,
    pub scissor_enabled: bool,
}

impl RasterizerStateKey {
    pub fn new(raster: &RasterizerState, scissor_enabled: bool) -> Self {
        Self {
            cull_face: raster.cull_face,
            cull_mode: raster.cull_mode,
            front_face: raster.front_face,
            polygon_offset_fill: raster.polygon_offset_fill,
            polygon_offset_factor: raster.polygon_offset_factor.to_bits(),
            polygon_offset_units: raster.polygon_offset_units.to_bits(),
            rasterizer_discard: raster.rasterizer_discard,
            point_draw_mode: raster.point_draw_mode,
            multi_sample: raster.multi_sample,
            scissor_enabled,
        }
    }
}

pub trait RenderStateCache {
    fn blend_state(&mut self, key: &BlendStateKey) -> Result<StateObjectId, DeviceError>;
    fn depth_stencil_state(&mut self, key: &DepthStencilState) -> Result<StateObjectId, DeviceError>;
    fn rasterizer_state(&mut self, key: &RasterizerStateKey) -> Result<StateObjectId, DeviceError>;
    fn sampler_state(&mut self, key: &SamplerState) -> Result<StateObjectId, DeviceError>;
    fn input_layout(&mut self, key: &InputLayoutKey) -> Result<InputLayoutId, DeviceError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// In-process [`RenderStateCache`] that memoizes keys to freshly issued ids.
///
/// Backends that create real driver objects wrap this pattern around their creation calls; tests
/// use it directly.
#[derive(Debug)]
pub struct HashingStateCache {
    serials: SerialFactory,
    blend: HashMap<BlendStateKey, StateObjectId>,
    depth_stencil: HashMap<DepthStencilState, StateObjectId>,
    rasterizer: HashMap<RasterizerStateKey, StateObjectId>,
    sampler: HashMap<SamplerState, StateObjectId>,
    input_layouts: HashMap<InputLayoutKey, InputLayoutId>,
    hits: u64,
    misses: u64,
    fail_next: Option<DeviceError>,
}

impl Default for HashingStateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HashingStateCache {
    pub fn new() -> Self {
        Self {
            serials: SerialFactory::starting_at(STATE_CACHE_SERIAL_BASE),
            blend: HashMap::new(),
            depth_stencil: HashMap::new(),
            rasterizer: HashMap::new(),
            sampler: HashMap::new(),
            input_layouts: HashMap::new(),
            hits: 0,
            misses: 0,
            fail_next: None,
        }
    }

    /// Makes the next cache miss fail with `err`.
    pub fn fail_next_creation(&mut self, err: DeviceError) {
        self.fail_next = Some(err);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.blend.len()
                + self.depth_stencil.len()
                + self.rasterizer.len()
                + self.sampler.len()
                + self.input_layouts.len(),
        }
    }

    pub fn rasterizer_key(&self, id: StateObjectId) -> Option<&RasterizerStateKey> {
        self.rasterizer
            .iter()
            .find_map(|(key, value)| (*value == id).then_some(key))
    }

    pub fn input_layout_key(&self, id: InputLayoutId) -> Option<&InputLayoutKey> {
        self.input_layouts
            .iter()
            .find_map(|(key, value)| (*value == id).then_some(key))
    }
}

fn get_or_create<K, V>(
    map: &mut HashMap<K, V>,
    key: &K,
    serials: &mut SerialFactory,
    hits: &mut u64,
    misses: &mut u64,
    fail_next: &mut Option<DeviceError>,
) -> Result<V, DeviceError>
where
    K: Hash + Eq + Clone,
    V: Copy + From<ResourceSerial>,
{
    if let Some(value) = map.get(key) {
        *hits += 1;
        return Ok(*value);
    }
    if let Some(err) = fail_next.take() {
        return Err(err);
    }
    *misses += 1;
    let value = V::from(serials.generate());
    map.insert(key.clone(), value);
    Ok(value)
}

impl RenderStateCache for HashingStateCache {
    fn blend_state(&mut self, key: &BlendStateKey) -> Result<StateObjectId, DeviceError> {
        get_or_create(
            &mut self.blend,
            key,
            &mut self.serials,
            &mut self.hits,
            &mut self.misses,
            &mut self.fail_next,
        )
    }

    fn depth_stencil_state(&mut self, key: &DepthStencilState) -> Result<StateObjectId, DeviceError> {
        get_or_create(
            &mut self.depth_stencil,
            key,
            &mut self.serials,
            &mut self.hits,
            &mut self.misses,
            &mut self.fail_next,
        )
    }

    fn rasterizer_state(&mut self, key: &RasterizerStateKey) -> Result<StateObjectId, DeviceError> {
        get_or_create(
            &mut self.rasterizer,
            key,
            &mut self.serials,
            &mut self.hits,
            &mut self.misses,
            &mut self.fail_next,
        )
    }

    fn sampler_state(&mut self, key: &SamplerState) -> Result<StateObjectId, DeviceError> {
        get_or_create(
            &mut self.sampler,
            key,
            &mut self.serials,
            &mut self.hits,
            &mut self.misses,
            &mut self.fail_next,
        )
    }

    fn input_layout(&mut self, key: &InputLayoutKey) -> Result<InputLayoutId, DeviceError> {
        get_or_create(
            &mut self.input_layouts,
            key,
            &mut self.serials,
            &mut self.hits,
            &mut self.misses,
            &mut self.fail_next,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{AttachmentSource, ColorAttachment, Extents, SizedFormat};
    use crate::native::TargetView;
    use crate::serial::ViewId;

    fn color_attachment(serials: &mut SerialFactory, format: SizedFormat) -> ColorAttachment {
        ColorAttachment {
            view: TargetView {
                id: ViewId(serials.generate()),
                resource: serials.generate(),
            },
            source: AttachmentSource::Renderbuffer,
            size: Extents {
                width: 4,
                height: 4,
            },
            format,
        }
    }

    #[test]
    fn equal_keys_return_the_same_object() {
        let mut cache = HashingStateCache::new();
        let a = cache.depth_stencil_state(&DepthStencilState::default()).unwrap();
        let b = cache.depth_stencil_state(&DepthStencilState::default()).unwrap();
        assert_eq!(a, b);

        let mut other = DepthStencilState::default();
        other.depth_test = true;
        assert_ne!(cache.depth_stencil_state(&other).unwrap(), a);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 2,
                entries: 2
            }
        );
    }

    #[test]
    fn creation_failure_is_not_memoized() {
        let mut cache = HashingStateCache::new();
        cache.fail_next_creation(DeviceError::OutOfMemory);
        let key = SamplerState::default();
        assert_eq!(cache.sampler_state(&key), Err(DeviceError::OutOfMemory));
        assert!(cache.sampler_state(&key).is_ok());
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn blend_key_masks_alpha_for_alphaless_targets() {
        let mut serials = SerialFactory::new();
        let framebuffer = FramebufferState {
            serial: Some(serials.generate()),
            color_attachments: vec![
                Some(color_attachment(&mut serials, SizedFormat::Rgba8)),
                None,
                Some(color_attachment(&mut serials, SizedFormat::Rgb8)),
            ],
            ..Default::default()
        };
        let key = BlendStateKey::new(&framebuffer, &BlendState::default());
        assert_eq!(key.render_target_write_masks[..3], [0b1111, 0, 0b0111]);
        assert!(key.mrt);
    }

    #[test]
    fn rasterizer_key_distinguishes_scissor() {
        let raster = RasterizerState::default();
        assert_ne!(
            RasterizerStateKey::new(&raster, false),
            RasterizerStateKey::new(&raster, true)
        );
    }
}
