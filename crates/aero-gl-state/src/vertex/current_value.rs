use crate::caps::MAX_VERTEX_ATTRIBS;
use crate::gl::CurrentValue;
use crate::native::{BufferDesc, BufferUsage, DeviceContext, DeviceError};
use crate::serial::BufferId;
use crate::vertex::{TranslatedAttribute, VertexDataManager};

#[derive(Clone, Copy, Debug)]
struct CurrentValueSlot {
    buffer: BufferId,
    stored: Option<CurrentValue>,
}

/// [`VertexDataManager`] that keeps each current value in its own 16-byte dynamic buffer.
///
/// The buffer is bound with stride zero, so every vertex reads the same value.
#[derive(Debug)]
pub struct CurrentValueBuffers {
    slots: [Option<CurrentValueSlot>; MAX_VERTEX_ATTRIBS],
}

impl Default for CurrentValueBuffers {
    fn default() -> Self {
        Self {
            slots: [None; MAX_VERTEX_ATTRIBS],
        }
    }
}

impl CurrentValueBuffers {
    pub fn buffer(&self, index: usize) -> Option<BufferId> {
        self.slots.get(index).copied().flatten().map(|slot| slot.buffer)
    }
}

impl VertexDataManager for CurrentValueBuffers {
    fn store_current_value(
        &mut self,
        device: &mut dyn DeviceContext,
        value: &CurrentValue,
        attrib: &mut TranslatedAttribute,
        index: usize,
    ) -> Result<(), DeviceError> {
        let Some(entry) = self.slots.get_mut(index) else {
            return Err(DeviceError::InvalidArgument(format!(
                "current value index {index} out of range"
            )));
        };
        let slot = match entry {
            Some(slot) => slot,
            None => {
                let buffer = device.create_buffer(
                    &BufferDesc {
                        size: 16,
                        usage: BufferUsage::Vertex,
                        dynamic: true,
                    },
                    None,
                )?;
                entry.insert(CurrentValueSlot {
                    buffer,
                    stored: None,
                })
            }
        };
        if slot.stored != Some(*value) {
            device.write_discard(slot.buffer, &value.to_bytes())?;
            slot.stored = Some(*value);
        }

        *attrib = TranslatedAttribute {
            active: false,
            format: value.format(),
            vertex_buffer: Some(slot.buffer),
            stride: 0,
            divisor: 0,
            base_offset: 0,
            uses_first_vertex_offset: false,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::VertexFormat;
    use crate::native::RecordingContext;

    #[test]
    fn value_is_rewritten_only_when_it_changes() {
        let mut ctx = RecordingContext::new();
        let mut buffers = CurrentValueBuffers::default();
        let mut attrib = TranslatedAttribute::default();

        let value = CurrentValue::Int([1, -2, 3, 4]);
        buffers.store_current_value(&mut ctx, &value, &mut attrib, 3).unwrap();
        buffers.store_current_value(&mut ctx, &value, &mut attrib, 3).unwrap();
        assert_eq!(ctx.count("CreateBuffer"), 1);
        assert_eq!(ctx.count("WriteDiscard"), 1);
        assert_eq!(attrib.format, VertexFormat::INT4);
        assert_eq!(attrib.stride, 0);
        assert_eq!(attrib.vertex_buffer, buffers.buffer(3));

        let contents = ctx.buffer_contents(buffers.buffer(3).unwrap()).unwrap();
        assert_eq!(contents, bytemuck::cast_slice::<i32, u8>(&[1, -2, 3, 4]));

        buffers
            .store_current_value(&mut ctx, &CurrentValue::default(), &mut attrib, 3)
            .unwrap();
        assert_eq!(ctx.count("WriteDiscard"), 2);
        assert_eq!(attrib.format, VertexFormat::FLOAT4);
    }

    #[test]
    fn write_failure_is_retried_next_time() {
        let mut ctx = RecordingContext::new();
        let mut buffers = CurrentValueBuffers::default();
        let mut attrib = TranslatedAttribute::default();
        ctx.fail_next_write(DeviceError::DeviceLost);
        let value = CurrentValue::default();
        assert!(buffers.store_current_value(&mut ctx, &value, &mut attrib, 0).is_err());
        buffers.store_current_value(&mut ctx, &value, &mut attrib, 0).unwrap();
        assert_eq!(ctx.count("WriteDiscard"), 1);
    }
}
