//! Read/write hazard detection between shader-resource views and render targets.
//!
//! The native driver refuses to keep a resource bound for reading while it is also bound for
//! writing. Before a resource becomes a render target or depth-stencil target, every shader-resource
//! view that reads the same sub-resources has to be unbound.

use crate::gl::{ImageIndex, TextureType};
use crate::native::{ShaderResourceView, SrvDimension};
use crate::serial::ResourceSerial;
use crate::view_cache::ViewCache;

/// End of a view's mip range; `u32::MAX` levels means the whole tail.
fn srv_mip_end(most_detailed_mip: u32, mip_levels: u32) -> u32 {
    if mip_levels == u32::MAX {
        u32::MAX
    } else {
        most_detailed_mip.saturating_add(mip_levels)
    }
}

fn mip_in_range(mip: u32, most_detailed_mip: u32, mip_levels: u32) -> bool {
    most_detailed_mip <= mip && mip < srv_mip_end(most_detailed_mip, mip_levels)
}

/// Whether writing `index` would touch sub-resources the view exposes.
pub fn image_index_conflicts_with_srv(index: &ImageIndex, dimension: &SrvDimension) -> bool {
    let mip = index.mip_index;
    match *dimension {
        SrvDimension::Texture2D {
            most_detailed_mip,
            mip_levels,
        } => {
            // A 2D target covers its mip and every smaller one.
            let end = srv_mip_end(most_detailed_mip, mip_levels);
            index.texture_type == TextureType::Texture2D && most_detailed_mip < end && mip < end
        }
        SrvDimension::Texture2DMs => index.texture_type == TextureType::Texture2DMultisample,
        SrvDimension::Texture2DArray {
            most_detailed_mip,
            mip_levels,
            first_array_slice,
            array_size,
        } => {
            // Cube maps may be sampled through 2D array views.
            matches!(index.texture_type, TextureType::Texture2DArray | TextureType::CubeMap)
                && mip_in_range(mip, most_detailed_mip, mip_levels)
                && index.layer_index.map_or(true, |layer| {
                    first_array_slice <= layer && layer < first_array_slice.saturating_add(array_size)
                })
        }
        SrvDimension::Texture2DMsArray {
            first_array_slice,
            array_size,
        } => {
            index.texture_type == TextureType::Texture2DMultisample
                && index.layer_index.map_or(true, |layer| {
                    first_array_slice <= layer && layer < first_array_slice.saturating_add(array_size)
                })
        }
        SrvDimension::TextureCube {
            most_detailed_mip,
            mip_levels,
        } => index.texture_type == TextureType::CubeMap && mip_in_range(mip, most_detailed_mip, mip_levels),
        SrvDimension::Texture3D {
            most_detailed_mip,
            mip_levels,
        } => index.texture_type == TextureType::Texture3D && mip_in_range(mip, most_detailed_mip, mip_levels),
        SrvDimension::Buffer => false,
    }
}

/// Slots of `cache` whose view reads `resource`.
///
/// With an `index`, only views overlapping that sub-resource count; without one, any view of the
/// resource conflicts.
pub fn conflicting_srv_slots(
    cache: &ViewCache<ShaderResourceView>,
    resource: ResourceSerial,
    index: Option<&ImageIndex>,
) -> Vec<usize> {
    cache
        .bound()
        .filter(|(_, view)| {
            view.resource == resource
                && index.map_or(true, |index| image_index_conflicts_with_srv(index, &view.dimension))
        })
        .map(|(slot, _)| slot)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::{SerialFactory, ViewId};

    #[test]
    fn texture_2d_mip_ranges() {
        let view = SrvDimension::Texture2D {
            most_detailed_mip: 1,
            mip_levels: 2,
        };
        assert!(image_index_conflicts_with_srv(&ImageIndex::make_2d(0), &view));
        assert!(image_index_conflicts_with_srv(&ImageIndex::make_2d(1), &view));
        assert!(image_index_conflicts_with_srv(&ImageIndex::make_2d(2), &view));
        assert!(!image_index_conflicts_with_srv(&ImageIndex::make_2d(3), &view));

        let all_levels = SrvDimension::Texture2D {
            most_detailed_mip: 0,
            mip_levels: u32::MAX,
        };
        assert!(image_index_conflicts_with_srv(&ImageIndex::make_2d(12), &all_levels));
    }

    #[test]
    fn array_layers_and_cube_faces() {
        let view = SrvDimension::Texture2DArray {
            most_detailed_mip: 0,
            mip_levels: 1,
            first_array_slice: 2,
            array_size: 2,
        };
        let layer = |l| ImageIndex::make_layer(TextureType::Texture2DArray, 0, l);
        assert!(!image_index_conflicts_with_srv(&layer(1), &view));
        assert!(image_index_conflicts_with_srv(&layer(3), &view));
        assert!(!image_index_conflicts_with_srv(&layer(4), &view));

        let face = ImageIndex::make_layer(TextureType::CubeMap, 0, 2);
        assert!(image_index_conflicts_with_srv(&face, &view));
        // A 2D image never conflicts with an array view.
        assert!(!image_index_conflicts_with_srv(&ImageIndex::make_2d(0), &view));
    }

    #[test]
    fn conflicting_slots_filter_by_resource_and_range() {
        let mut serials = SerialFactory::new();
        let target = serials.generate();
        let other = serials.generate();
        let mut cache = ViewCache::with_capacity(4);
        let view = |resource, most_detailed_mip| ShaderResourceView {
            id: ViewId(resource),
            resource,
            dimension: SrvDimension::Texture2D {
                most_detailed_mip,
                mip_levels: 1,
            },
        };
        cache.update(0, Some(view(target, 0)));
        cache.update(1, Some(view(other, 0)));
        cache.update(3, Some(view(target, 2)));

        assert_eq!(conflicting_srv_slots(&cache, target, None), [0, 3]);
        assert_eq!(
            conflicting_srv_slots(&cache, target, Some(&ImageIndex::make_2d(2))),
            [3]
        );
        assert_eq!(
            conflicting_srv_slots(&cache, target, Some(&ImageIndex::make_2d(1))),
            [3]
        );
        assert!(conflicting_srv_slots(&cache, target, Some(&ImageIndex::make_2d(3))).is_empty());
    }
}
