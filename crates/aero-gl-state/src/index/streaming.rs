use crate::error::{Result, StateError};
use crate::gl::{DrawElementsType, ElementArrayBuffer, IndexSource, IndexedDraw, PrimitiveMode};
use crate::index::rewrite::{close_line_loop, decode_indices, expand_triangle_fan, restart_index, widen_u8_indices};
use crate::index::{IndexDataManager, TranslatedIndexData};
use crate::native::{BufferDesc, BufferUsage, DeviceContext, IndexFormat};
use crate::serial::BufferId;

const INITIAL_STREAMING_BUFFER_SIZE: u32 = 16 * 1024;

#[derive(Clone, Copy, Debug)]
struct StreamingBuffer {
    buffer: BufferId,
    size: u32,
}

/// [`IndexDataManager`] that binds element array data directly when the driver can consume it and
/// otherwise rewrites it on the CPU into a dynamic streaming buffer.
#[derive(Debug, Default)]
pub struct StreamingIndexDataManager {
    streaming: Option<StreamingBuffer>,
}

impl StreamingIndexDataManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streaming_buffer(&self) -> Option<BufferId> {
        self.streaming.map(|s| s.buffer)
    }

    fn reserve(&mut self, device: &mut dyn DeviceContext, size: u32) -> Result<BufferId> {
        if let Some(streaming) = self.streaming.filter(|s| s.size >= size) {
            return Ok(streaming.buffer);
        }
        let size = size.max(INITIAL_STREAMING_BUFFER_SIZE).next_power_of_two();
        let buffer = device
            .create_buffer(
                &BufferDesc {
                    size,
                    usage: BufferUsage::Index,
                    dynamic: true,
                },
                None,
            )
            .map_err(StateError::allocation("streaming index buffer"))?;
        tracing::debug!(?buffer, size, "grew streaming index buffer");
        self.streaming = Some(StreamingBuffer { buffer, size });
        Ok(buffer)
    }

    fn upload(&mut self, device: &mut dyn DeviceContext, indices: &[u32], format: IndexFormat) -> Result<TranslatedIndexData> {
        let bytes: Vec<u8> = match format {
            IndexFormat::Uint16 => indices
                .iter()
                .flat_map(|&i| (i as u16).to_le_bytes())
                .collect(),
            IndexFormat::Uint32 => bytemuck::cast_slice(indices).to_vec(),
        };
        let size = u32::try_from(bytes.len())
            .map_err(|_| StateError::InvalidIndexData("rewritten index data too large"))?;
        let buffer = self.reserve(device, size)?;
        if !bytes.is_empty() {
            device.write_discard(buffer, &bytes).map_err(StateError::IndexData)?;
        }
        Ok(TranslatedIndexData {
            buffer,
            format,
            start_offset: 0,
            index_count: indices.len() as u32,
        })
    }
}

fn source_bytes<'a>(draw: &'a IndexedDraw, element_array: Option<&'a ElementArrayBuffer>) -> Result<&'a [u8]> {
    match &draw.source {
        IndexSource::Client(data) => Ok(&data[..]),
        IndexSource::ElementArray { offset } => {
            let element_array =
                element_array.ok_or(StateError::InvalidIndexData("no element array buffer bound"))?;
            element_array
                .data
                .get(*offset as usize..)
                .ok_or(StateError::InvalidIndexData("index offset past the end of the buffer"))
        }
    }
}

impl IndexDataManager for StreamingIndexDataManager {
    fn prepare_index_data(
        &mut self,
        device: &mut dyn DeviceContext,
        mode: PrimitiveMode,
        draw: &IndexedDraw,
        element_array: Option<&ElementArrayBuffer>,
    ) -> Result<TranslatedIndexData> {
        let needs_rewrite = matches!(mode, PrimitiveMode::TriangleFan | PrimitiveMode::LineLoop);
        let native_format = match draw.index_type {
            DrawElementsType::UnsignedByte => None,
            DrawElementsType::UnsignedShort => Some(IndexFormat::Uint16),
            DrawElementsType::UnsignedInt => Some(IndexFormat::Uint32),
        };

        if let (false, Some(format), IndexSource::ElementArray { offset }) =
            (needs_rewrite, native_format, &draw.source)
        {
            let element_array =
                element_array.ok_or(StateError::InvalidIndexData("no element array buffer bound"))?;
            if offset % format.byte_size() != 0 {
                return Err(StateError::InvalidIndexData("index offset is not aligned to the index size"));
            }
            return Ok(TranslatedIndexData {
                buffer: element_array.buffer,
                format,
                start_offset: *offset,
                index_count: draw.count,
            });
        }

        let mut indices = decode_indices(draw.index_type, source_bytes(draw, element_array)?, draw.count)?;
        let format = native_format.unwrap_or(IndexFormat::Uint16);
        if draw.index_type == DrawElementsType::UnsignedByte {
            widen_u8_indices(&mut indices, draw.primitive_restart);
        }
        // After widening, restart values match the output width.
        let strip_cut = match format {
            IndexFormat::Uint16 => restart_index(DrawElementsType::UnsignedShort),
            IndexFormat::Uint32 => restart_index(DrawElementsType::UnsignedInt),
        };
        let restart = draw.primitive_restart.then_some(strip_cut);

        let indices = match mode {
            PrimitiveMode::TriangleFan => expand_triangle_fan(&indices, restart),
            PrimitiveMode::LineLoop => close_line_loop(&indices, restart, strip_cut),
            _ => indices,
        };
        tracing::trace!(%mode, count = indices.len(), "streamed index data");
        self.upload(device, &indices, format)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::native::RecordingContext;
    use crate::serial::SerialFactory;

    fn element_array(data: &[u8]) -> ElementArrayBuffer {
        ElementArrayBuffer {
            buffer: BufferId(SerialFactory::new().generate()),
            data: Arc::from(data),
        }
    }

    fn draw(index_type: DrawElementsType, count: u32, source: IndexSource) -> IndexedDraw {
        IndexedDraw {
            index_type,
            count,
            source,
            primitive_restart: false,
        }
    }

    #[test]
    fn native_lists_bind_the_element_array() {
        let mut ctx = RecordingContext::new();
        let mut manager = StreamingIndexDataManager::new();
        let elements = element_array(&[0; 16]);
        let data = manager
            .prepare_index_data(
                &mut ctx,
                PrimitiveMode::Triangles,
                &draw(DrawElementsType::UnsignedShort, 3, IndexSource::ElementArray { offset: 4 }),
                Some(&elements),
            )
            .unwrap();
        assert_eq!(data.buffer, elements.buffer);
        assert_eq!((data.format, data.start_offset), (IndexFormat::Uint16, 4));
        assert!(ctx.calls().is_empty());

        let misaligned = manager.prepare_index_data(
            &mut ctx,
            PrimitiveMode::Triangles,
            &draw(DrawElementsType::UnsignedInt, 1, IndexSource::ElementArray { offset: 2 }),
            Some(&elements),
        );
        assert!(matches!(misaligned, Err(StateError::InvalidIndexData(_))));
    }

    #[test]
    fn byte_indices_are_widened() {
        let mut ctx = RecordingContext::new();
        let mut manager = StreamingIndexDataManager::new();
        let data = manager
            .prepare_index_data(
                &mut ctx,
                PrimitiveMode::Triangles,
                &draw(DrawElementsType::UnsignedByte, 3, IndexSource::Client(Arc::from(&[7u8, 8, 9][..]))),
                None,
            )
            .unwrap();
        assert_eq!(data.format, IndexFormat::Uint16);
        assert_eq!(data.index_count, 3);
        assert_eq!(ctx.buffer_contents(data.buffer).unwrap(), [7, 0, 8, 0, 9, 0]);
    }

    #[test]
    fn fans_and_loops_are_rewritten_into_one_streaming_buffer() {
        let mut ctx = RecordingContext::new();
        let mut manager = StreamingIndexDataManager::new();
        let indices: Vec<u8> = [0u16, 1, 2, 3].iter().flat_map(|i| i.to_le_bytes()).collect();
        let elements = element_array(&indices);
        let source = IndexSource::ElementArray { offset: 0 };

        let fan = manager
            .prepare_index_data(
                &mut ctx,
                PrimitiveMode::TriangleFan,
                &draw(DrawElementsType::UnsignedShort, 4, source.clone()),
                Some(&elements),
            )
            .unwrap();
        assert_eq!(fan.index_count, 6);
        assert_eq!(
            ctx.buffer_contents(fan.buffer).unwrap(),
            [0, 0, 1, 0, 2, 0, 0, 0, 2, 0, 3, 0]
        );

        let line_loop = manager
            .prepare_index_data(
                &mut ctx,
                PrimitiveMode::LineLoop,
                &draw(DrawElementsType::UnsignedShort, 3, source),
                Some(&elements),
            )
            .unwrap();
        assert_eq!(line_loop.buffer, fan.buffer);
        assert_eq!(line_loop.index_count, 4);
        assert_eq!(ctx.count("CreateBuffer"), 1);
    }

    #[test]
    fn out_of_range_draws_are_rejected() {
        let mut ctx = RecordingContext::new();
        let mut manager = StreamingIndexDataManager::new();
        let elements = element_array(&[0; 4]);
        let result = manager.prepare_index_data(
            &mut ctx,
            PrimitiveMode::TriangleFan,
            &draw(DrawElementsType::UnsignedShort, 3, IndexSource::ElementArray { offset: 0 }),
            Some(&elements),
        );
        assert!(matches!(result, Err(StateError::InvalidIndexData(_))));
        assert!(manager.streaming_buffer().is_none());
    }
}
