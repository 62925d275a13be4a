//! wgpu backend: device plans as generated WGSL compute kernels.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use pixsched_core::Extent;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

use super::lut_table::LutTable;
use super::tiling::grid;
use super::DEVICE_TARGET;
use crate::buffer::{AsAny, DeviceStorage, OutputBuffer};
use crate::error::{ComputeResult, RuntimeError};
use crate::pipeline::{Pipeline, LUT_SIZE};
use crate::plan::TilePlan;
use crate::shaders::{self, CurvedKernel};
use crate::target::DeviceApi;

/// Dimensions uniform: [width, height, channels, 0]
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct DimsUniform {
    dims: [u32; 4],
}

/// Adapter info for the high-performance adapter on `backends`, if any.
pub(crate) fn probe_adapter(backends: wgpu::Backends) -> Option<wgpu::AdapterInfo> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map(|a| a.get_info())
    })
}

/// Device and queue for one API.
pub(crate) struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    api: DeviceApi,
    debug: bool,
}

impl WgpuContext {
    pub(crate) fn new(api: DeviceApi, debug: bool) -> ComputeResult<Self> {
        pollster::block_on(Self::new_async(api, debug))
    }

    async fn new_async(api: DeviceApi, debug: bool) -> ComputeResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: api.backends(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RuntimeError::NoAdapter { api })?;

        let adapter_info = adapter.get_info();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("pixsched_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| RuntimeError::DeviceCreation { api, reason: e.to_string() })?;

        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "using {api} device"
        );

        Ok(Self { device, queue, adapter_info, api, debug })
    }

    /// Compiles `source` into a compute pipeline, surfacing validation errors.
    fn compile_kernel(&self, source: &str, label: &str) -> ComputeResult<wgpu::ComputePipeline> {
        if self.debug {
            debug!(target: DEVICE_TARGET, label, bytes = source.len(), "wgpu: compile kernel");
        }
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: None,
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(e) => Err(RuntimeError::ShaderCompilation(e.to_string()).into()),
            None => Ok(pipeline),
        }
    }

    fn trace(&self, event: &str, bytes: u64) {
        if self.debug {
            debug!(target: DEVICE_TARGET, api = %self.api, bytes, "wgpu: {event}");
        }
    }
}

impl std::fmt::Debug for WgpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuContext")
            .field("device", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .finish()
    }
}

/// Output allocation on a wgpu device, one `u32` per sample.
#[derive(Debug)]
pub(crate) struct WgpuStorage {
    ctx: Arc<WgpuContext>,
    buffer: wgpu::Buffer,
    staging: wgpu::Buffer,
    samples: usize,
}

impl WgpuStorage {
    fn new(ctx: Arc<WgpuContext>, samples: usize) -> Self {
        let size = (samples * 4) as u64;
        ctx.trace("allocate output", size);
        let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("curved_output"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("curved_staging"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self { ctx, buffer, staging, samples }
    }
}

impl AsAny for WgpuStorage {
    fn as_any(&self) -> &dyn std::any::Any { self }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
}

impl DeviceStorage for WgpuStorage {
    fn api(&self) -> DeviceApi {
        self.ctx.api
    }

    fn size_bytes(&self) -> u64 {
        self.buffer.size()
    }

    fn read_back(&self, host: &mut [u8]) -> ComputeResult<()> {
        let ctx = &self.ctx;
        let size = self.buffer.size();

        ctx.trace("copy to staging", size);
        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("read_back"),
        });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &self.staging, 0, size);
        ctx.queue.submit(std::iter::once(encoder.finish()));

        ctx.trace("map staging", size);
        let slice = self.staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        let _ = ctx.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| RuntimeError::Device("map channel closed".into()))?
            .map_err(|e| RuntimeError::Device(format!("map failed: {e}")))?;

        {
            let data = slice.get_mapped_range();
            let words: &[u32] = bytemuck::cast_slice(&data);
            for (h, &w) in host.iter_mut().zip(&words[..self.samples]) {
                *h = w as u8;
            }
        }
        self.staging.unmap();
        Ok(())
    }
}

/// Compiled kernels and resident inputs for one artifact.
pub(crate) struct WgpuExecutor {
    ctx: Arc<WgpuContext>,
    plan: TilePlan,
    extent: Extent,
    curved: wgpu::ComputePipeline,
    lut_kernel: Option<wgpu::ComputePipeline>,
    input: wgpu::Buffer,
    lut: Option<wgpu::Buffer>,
    dims: wgpu::Buffer,
}

impl WgpuExecutor {
    pub(crate) fn new(plan: TilePlan, pipeline: &Pipeline, api: DeviceApi, debug: bool) -> ComputeResult<Self> {
        let ctx = Arc::new(WgpuContext::new(api, debug)?);
        let extent = pipeline.extent();

        let kernel = CurvedKernel {
            tile_width: plan.tile_width,
            tile_height: plan.tile_height,
            channels: extent.channels,
            unrolled: plan.channels.unrolled,
            shared: plan.padded_shared,
            lut_buffer: plan.lut.materialized,
            indexing: pipeline.indexing(),
        };
        let curved = ctx.compile_kernel(&shaders::curved_kernel(&kernel), "curved")?;
        let lut_kernel = match plan.lut.block {
            Some(block) => Some(ctx.compile_kernel(&shaders::lut_kernel(block), "lut")?),
            None => None,
        };

        let samples: Vec<u32> = pipeline.input().data().iter().map(|&v| u32::from(v)).collect();
        ctx.trace("upload input", (samples.len() * 4) as u64);
        let input = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("input"),
            contents: bytemuck::cast_slice(&samples),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let lut = if !plan.lut.materialized {
            None
        } else if lut_kernel.is_some() {
            Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("lut"),
                size: (LUT_SIZE * 4) as u64,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            }))
        } else {
            let table = LutTable::compute(&plan.lut);
            let words: Vec<u32> = (0..LUT_SIZE).map(|i| u32::from(table.get(i))).collect();
            ctx.trace("upload lut", (LUT_SIZE * 4) as u64);
            Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("lut"),
                contents: bytemuck::cast_slice(&words),
                usage: wgpu::BufferUsages::STORAGE,
            }))
        };

        let uniform = DimsUniform { dims: [extent.width, extent.height, extent.channels, 0] };
        let dims = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("dims_uniform"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        Ok(Self { ctx, plan, extent, curved, lut_kernel, input, lut, dims })
    }

    /// Enqueues the kernels; returns without waiting for the device.
    pub(crate) fn realize(&self, out: &mut OutputBuffer) -> ComputeResult<()> {
        let ctx = &self.ctx;
        let samples = self.extent.len();
        let storage = out.device_mut(
            |s: &WgpuStorage| Arc::ptr_eq(&s.ctx, ctx) && s.samples == samples,
            || Ok(WgpuStorage::new(Arc::clone(ctx), samples)),
        )?;

        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("realize"),
        });

        if let (Some(kernel), Some(lut), Some(block)) = (&self.lut_kernel, &self.lut, self.plan.lut.block) {
            let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("lut_bind_group"),
                layout: &kernel.get_bind_group_layout(0),
                entries: &[wgpu::BindGroupEntry { binding: 0, resource: lut.as_entire_binding() }],
            });
            let groups = (LUT_SIZE as u32).div_ceil(block);
            ctx.trace("dispatch lut", u64::from(groups));
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("lut_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(kernel);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups, 1, 1);
        }

        let bind_group = {
            let mut entries = vec![
                wgpu::BindGroupEntry { binding: 0, resource: self.input.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: storage.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: self.dims.as_entire_binding() },
            ];
            if let Some(lut) = &self.lut {
                entries.push(wgpu::BindGroupEntry { binding: 3, resource: lut.as_entire_binding() });
            }
            ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("curved_bind_group"),
                layout: &self.curved.get_bind_group_layout(0),
                entries: &entries,
            })
        };

        let (gx, gy) = grid(self.extent.width, self.extent.height, self.plan.tile_width, self.plan.tile_height);
        ctx.trace("dispatch curved", u64::from(gx * gy));
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("curved_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.curved);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(gx, gy, 1);
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        out.mark_device_written();
        Ok(())
    }
}
