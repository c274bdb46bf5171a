//! GPU buffer creation and readback.

use crate::error::SortError;
use wgpu::{Buffer, BufferUsages, Device, Queue};

/// Create a buffer initialised from `data`.
pub fn create_buffer_init<T: bytemuck::Pod>(
    device: &Device,
    label: &str,
    data: &[T],
    usage: BufferUsages,
) -> Buffer {
    use wgpu::util::DeviceExt;

    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(data),
        usage,
    })
}

/// Create a zeroed buffer holding `len` elements of `T` (at least one).
pub fn create_buffer<T>(device: &Device, label: &str, len: usize, usage: BufferUsages) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (len.max(1) * std::mem::size_of::<T>()) as u64,
        usage,
        mapped_at_creation: false,
    })
}

/// Read the first `len` elements of `buffer` back to the CPU.
///
/// `buffer` needs `COPY_SRC` usage.
pub async fn read_buffer<T: bytemuck::Pod>(
    device: &Device,
    queue: &Queue,
    buffer: &Buffer,
    len: usize,
) -> Result<Vec<T>, SortError> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let size = (len * std::mem::size_of::<T>()) as u64;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Staging Buffer"),
        size,
        usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    queue.submit(Some(encoder.finish()));

    let (tx, rx) = futures::channel::oneshot::channel();
    staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).ok();
    });
    device.poll(wgpu::Maintain::Wait);

    rx.await
        .map_err(|_| SortError::Readback("map callback dropped".to_string()))?
        .map_err(|e| SortError::Readback(format!("buffer mapping failed: {e:?}")))?;

    let data = staging.slice(..).get_mapped_range();
    let result: Vec<T> = bytemuck::cast_slice(&data).to_vec();
    drop(data);
    staging.unmap();

    Ok(result)
}

/// Blocking wrapper for read_buffer.
pub fn read_buffer_blocking<T: bytemuck::Pod>(
    device: &Device,
    queue: &Queue,
    buffer: &Buffer,
    len: usize,
) -> Result<Vec<T>, SortError> {
    pollster::block_on(read_buffer(device, queue, buffer, len))
}
