mod pipeline;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use wgpu::util::DeviceExt;

use self::pipeline::{EdgeFilterPipeline, WORKGROUP_SIZE};
use super::{
    check_filter_operands, check_host_rows, pitch_for, BufferId, DeviceAllocation, FilterBackend,
    Roi,
};
use crate::common::{Error, Result};
use crate::filter::FilterOp;
use crate::image::SampleKind;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    width: u32,
    height: u32,
    src_pitch: u32,
    dst_pitch: u32,
    out_signed: u32,
    rows_per_layer: u32,
    _padding: [u32; 2],
    mask: [[i32; 4]; 3],
}

impl Params {
    fn new(
        op: FilterOp,
        src: &DeviceAllocation,
        dst: &DeviceAllocation,
        roi: Roi,
        rows_per_layer: u32,
    ) -> Self {
        let mask = op.mask();
        let row = |r: [i32; 3]| [r[0], r[1], r[2], 0];

        Self {
            width: roi.width,
            height: roi.height,
            src_pitch: src.pitch as u32,
            dst_pitch: dst.pitch as u32,
            out_signed: (dst.kind == SampleKind::Signed16) as u32,
            rows_per_layer,
            _padding: [0; 2],
            mask: [row(mask[0]), row(mask[1]), row(mask[2])],
        }
    }
}

/// Workgroup counts covering `words_per_row` x `rows`.
///
/// Rows beyond `max_groups` spill into the z dimension; the shader recovers the
/// row as `y + z * count[1]`.
fn dispatch_extent(words_per_row: u32, rows: u32, max_groups: u32) -> Result<[u32; 3]> {
    let columns = words_per_row.div_ceil(WORKGROUP_SIZE);
    let rows_per_layer = rows.min(max_groups);
    let layers = rows.div_ceil(rows_per_layer.max(1));

    if columns > max_groups || layers > max_groups {
        return Err(Error::Kernel(format!(
            "{} words x {} rows exceed the dispatch limit of {} groups per dimension",
            words_per_row, rows, max_groups
        )));
    }

    Ok([columns, rows_per_layer, layers])
}

#[derive(Debug)]
struct GpuAllocation {
    desc: DeviceAllocation,
    buffer: wgpu::Buffer,
}

/// wgpu compute implementation of [`FilterBackend`].
///
/// Device rows are padded to `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT` so that
/// every row starts on a word boundary the shader can address.
#[derive(Debug)]
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    pipeline: EdgeFilterPipeline,
    dispatch_limit: u32,
    next_id: AtomicU64,
    buffers: Mutex<HashMap<BufferId, GpuAllocation>>,
}

impl GpuBackend {
    /// Initializes wgpu on the highest performance adapter available.
    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| Error::Device(format!("failed to find suitable GPU adapter: {}", e)))?;

        let info = adapter.get_info();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("edgedetect_device"),
            required_limits: adapter.limits(),
            ..Default::default()
        }))
        .map_err(|e| Error::Device(format!("failed to create device: {}", e)))?;

        device.on_uncaptured_error(Box::new(|e: wgpu::Error| {
            tracing::error!("Uncaptured GPU error: {}", e);
        }));

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = EdgeFilterPipeline::new(&device)?;
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::Device(format!("failed to build filter pipeline: {}", e)));
        }

        let dispatch_limit = device.limits().max_compute_workgroups_per_dimension;
        Ok(Self {
            device,
            queue,
            adapter_name: format!("{} ({:?})", info.name, info.backend),
            pipeline,
            dispatch_limit,
            next_id: AtomicU64::new(1),
            buffers: Mutex::new(HashMap::new()),
        })
    }

    /// Blocks until all submitted work has finished.
    fn wait(&self) -> std::result::Result<(), String> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    /// Runs `f` inside a validation error scope and waits for the queue.
    fn scoped<T>(
        &self,
        f: impl FnOnce() -> std::result::Result<T, String>,
    ) -> std::result::Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = f();
        let error = pollster::block_on(self.device.pop_error_scope());
        let value = result?;
        if let Some(e) = error {
            return Err(e.to_string());
        }
        self.wait()?;
        Ok(value)
    }
}

impl FilterBackend for GpuBackend {
    fn name(&self) -> String {
        self.adapter_name.clone()
    }

    fn allocate(&self, width: u32, height: u32, kind: SampleKind) -> Result<DeviceAllocation> {
        if width == 0 || height == 0 {
            return Err(Error::Device(format!(
                "cannot allocate an empty {}x{} buffer",
                width, height
            )));
        }

        let pitch = pitch_for(
            width as usize * kind.byte_count(),
            wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize,
        );
        let desc = DeviceAllocation {
            id: BufferId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            width,
            height,
            kind,
            pitch,
        };

        let size = desc.size_in_bytes() as u64;
        let limits = self.device.limits();
        if size > limits.max_storage_buffer_binding_size as u64 || size > limits.max_buffer_size {
            return Err(Error::Device(format!(
                "{}x{} {} buffer of {} bytes exceeds device limits",
                width, height, kind, size
            )));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("device_image_buffer"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
            buffer.destroy();
            return Err(Error::Device(format!("allocation failed: {}", e)));
        }

        self.buffers
            .lock()
            .insert(desc.id, GpuAllocation { desc, buffer });

        Ok(desc)
    }

    fn upload(&self, dst: &DeviceAllocation, src: &[u8], src_stride: usize) -> Result<()> {
        check_host_rows(dst, src.len(), src_stride).map_err(Error::upload)?;

        let buffers = self.buffers.lock();
        let target = buffers
            .get(&dst.id)
            .ok_or_else(|| Error::upload(format!("unknown device buffer {}", dst.id)))?;

        // Lay the rows out at the device pitch before the copy.
        let row_bytes = dst.row_bytes();
        let pitch = target.desc.pitch;
        let mut staging = vec![0u8; target.desc.size_in_bytes()];
        for y in 0..dst.height as usize {
            staging[y * pitch..y * pitch + row_bytes]
                .copy_from_slice(&src[y * src_stride..y * src_stride + row_bytes]);
        }

        self.scoped(|| {
            self.queue.write_buffer(&target.buffer, 0, &staging);
            self.queue.submit(std::iter::empty());
            Ok(())
        })
        .map_err(Error::upload)
    }

    fn download(&self, src: &DeviceAllocation, dst: &mut [u8], dst_stride: usize) -> Result<()> {
        check_host_rows(src, dst.len(), dst_stride).map_err(Error::download)?;

        let buffers = self.buffers.lock();
        let source = buffers
            .get(&src.id)
            .ok_or_else(|| Error::download(format!("unknown device buffer {}", src.id)))?;

        let size = source.desc.size_in_bytes() as u64;
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("device_image_staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let map_result = Arc::new(Mutex::new(None));
        self.scoped(|| {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("device_image_download_encoder"),
                });
            encoder.copy_buffer_to_buffer(&source.buffer, 0, &staging_buffer, 0, size);
            self.queue.submit(std::iter::once(encoder.finish()));

            let map_result = Arc::clone(&map_result);
            staging_buffer
                .slice(..)
                .map_async(wgpu::MapMode::Read, move |result| {
                    *map_result.lock() = Some(result);
                });
            Ok(())
        })
        .map_err(Error::download)?;

        match map_result.lock().take() {
            Some(Ok(())) => {}
            Some(Err(e)) => return Err(Error::download(e.to_string())),
            None => return Err(Error::download("staging buffer was not mapped")),
        }

        {
            let data = staging_buffer.slice(..).get_mapped_range();
            let row_bytes = src.row_bytes();
            let pitch = source.desc.pitch;
            for y in 0..src.height as usize {
                dst[y * dst_stride..y * dst_stride + row_bytes]
                    .copy_from_slice(&data[y * pitch..y * pitch + row_bytes]);
            }
        }
        staging_buffer.unmap();
        staging_buffer.destroy();

        Ok(())
    }

    fn filter(
        &self,
        op: FilterOp,
        src: &DeviceAllocation,
        dst: &DeviceAllocation,
        roi: Roi,
    ) -> Result<()> {
        check_filter_operands(op, src, dst, roi).map_err(Error::Kernel)?;

        let buffers = self.buffers.lock();
        let input = buffers
            .get(&src.id)
            .ok_or_else(|| Error::Kernel(format!("unknown device buffer {}", src.id)))?;
        let output = buffers
            .get(&dst.id)
            .ok_or_else(|| Error::Kernel(format!("unknown device buffer {}", dst.id)))?;

        // Each invocation writes one u32 of an output row
        let words_per_row = (output.desc.pitch / 4) as u32;
        let [columns, rows_per_layer, layers] =
            dispatch_extent(words_per_row, roi.height, self.dispatch_limit)?;
        let params = Params::new(op, &input.desc, &output.desc, roi, rows_per_layer);

        self.scoped(|| {
            let params_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("edge_filter_params_buffer"),
                    contents: bytemuck::cast_slice(&[params]),
                    usage: wgpu::BufferUsages::UNIFORM,
                });

            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("edge_filter_bind_group"),
                layout: &self.pipeline.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: input.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: output.buffer.as_entire_binding(),
                    },
                ],
            });

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("edge_filter_encoder"),
                });

            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("edge_filter_pass"),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(&self.pipeline.compute_pipeline);
                compute_pass.set_bind_group(0, &bind_group, &[]);
                compute_pass.dispatch_workgroups(columns, rows_per_layer, layers);
            }

            self.queue.submit(std::iter::once(encoder.finish()));
            Ok(())
        })
        .map_err(Error::Kernel)
    }

    fn release(&self, id: BufferId) {
        match self.buffers.lock().remove(&id) {
            Some(allocation) => allocation.buffer.destroy(),
            None => tracing::warn!("Release of unknown device buffer {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_utils::{gradient_gray8, test_gpu};
    use crate::device::HostBackend;
    use crate::image::to_tight_buffer;

    fn run(backend: &dyn FilterBackend, op: FilterOp, width: u32, height: u32) -> Vec<u8> {
        let image = gradient_gray8(width, height);
        let tight = to_tight_buffer(&image);

        let src = backend.allocate(width, height, SampleKind::Unsigned8).unwrap();
        backend
            .upload(&src, tight.bytes(), tight.desc().stride)
            .unwrap();
        let kind = op.output_kind();
        let dst = backend.allocate(width, height, kind).unwrap();
        backend.filter(op, &src, &dst, Roi::full(&src)).unwrap();

        let stride = width as usize * kind.byte_count();
        let mut out = vec![0u8; stride * height as usize];
        backend.download(&dst, &mut out, stride).unwrap();

        backend.release(src.id);
        backend.release(dst.id);
        out
    }

    #[test]
    fn tall_dispatch_spills_into_layers() {
        assert_eq!(dispatch_extent(64, 10, 65535).unwrap(), [1, 10, 1]);
        assert_eq!(dispatch_extent(65, 70000, 65535).unwrap(), [2, 65535, 2]);
        assert_eq!(dispatch_extent(4, 10, 4).unwrap(), [1, 4, 3]);
        assert!(matches!(
            dispatch_extent(64 * 5, 1, 4),
            Err(Error::Kernel(_))
        ));
        assert!(matches!(dispatch_extent(1, 17, 4), Err(Error::Kernel(_))));
    }

    #[test]
    fn test_gpu_context_creation() {
        let Some(gpu) = test_gpu() else {
            return;
        };
        assert!(!gpu.name().is_empty());
    }

    #[test]
    fn gpu_pitch_is_copy_aligned() {
        let Some(gpu) = test_gpu() else {
            return;
        };
        let alloc = gpu.allocate(3, 3, SampleKind::Signed16).unwrap();
        assert_eq!(alloc.pitch % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize, 0);
        gpu.release(alloc.id);
    }

    #[test]
    fn gpu_matches_host_for_every_op() {
        let Some(gpu) = test_gpu() else {
            return;
        };
        let host = HostBackend::new();

        for op in FilterOp::ALL {
            for (w, h) in [(1, 1), (5, 3), (67, 9)] {
                let expected = run(&host, op, w, h);
                let actual = run(&gpu, op, w, h);
                assert_eq!(actual, expected, "{} {}x{}", op, w, h);
            }
        }
    }

    #[test]
    fn gpu_layered_dispatch_matches_host() {
        let Some(mut gpu) = test_gpu() else {
            return;
        };
        gpu.dispatch_limit = 4;
        let host = HostBackend::new();

        for op in [FilterOp::SobelVert, FilterOp::ScharrHoriz] {
            let expected = run(&host, op, 9, 11);
            let actual = run(&gpu, op, 9, 11);
            assert_eq!(actual, expected, "{}", op);
        }
    }
}
