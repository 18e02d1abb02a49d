//! Compute-shader backend.
//!
//! Heights stay `f64` on the device, so the adapter must support
//! `SHADER_F64`. Each step uploads `previous` and `current`, dispatches one
//! invocation per cell and reads `next` back through a staging buffer.

use std::sync::mpsc;

use tracing::{debug, info};

use crate::backend::{Backend, StencilBackend};
use crate::error::{BackendUnavailableError, Error, Result};
use crate::grid::Grid;
use crate::params::Coefficients;

const STENCIL_SHADER: &str = include_str!("stencil.wgsl");

const WORKGROUP_SIZE: u32 = 16;

/// Uniform block, laid out as `Params` in `stencil.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct StencilParams {
    rows: u32,
    cols: u32,
    _pad0: u32,
    _pad1: u32,
    gain: f64,
    lag: f64,
    denom: f64,
    _pad2: f64,
}

pub struct GpuStencil {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    params: wgpu::Buffer,
    height_prev: wgpu::Buffer,
    height_cur: wgpu::Buffer,
    height_next: wgpu::Buffer,
    staging: wgpu::Buffer,
    shape: (usize, usize),
    adapter_name: String,
}

fn unavailable(reason: impl Into<String>) -> BackendUnavailableError {
    BackendUnavailableError::new(Backend::Gpu, reason)
}

impl GpuStencil {
    /// Opens a device and allocates buffers for grids of `shape`.
    pub fn new(shape: (usize, usize)) -> std::result::Result<Self, BackendUnavailableError> {
        pollster::block_on(Self::new_async(shape))
    }

    async fn new_async(shape: (usize, usize)) -> std::result::Result<Self, BackendUnavailableError> {
        let (rows, cols) = shape;
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| unavailable("no GPU adapter found"))?;

        let adapter_info = adapter.get_info();
        if !adapter.features().contains(wgpu::Features::SHADER_F64) {
            return Err(unavailable(format!(
                "adapter `{}` has no 64-bit float shader support",
                adapter_info.name
            )));
        }

        let limits = adapter.limits();
        let cells = rows as u64 * cols as u64;
        let grid_bytes = cells * std::mem::size_of::<f64>() as u64;
        if grid_bytes > limits.max_storage_buffer_binding_size as u64 || grid_bytes > limits.max_buffer_size {
            return Err(unavailable(format!(
                "{}x{} grid needs {} bytes per buffer, adapter allows {}",
                rows, cols, grid_bytes, limits.max_storage_buffer_binding_size
            )));
        }
        let groups = (
            (cols as u64).div_ceil(WORKGROUP_SIZE as u64),
            (rows as u64).div_ceil(WORKGROUP_SIZE as u64),
        );
        let max_groups = limits.max_compute_workgroups_per_dimension as u64;
        if groups.0 > max_groups || groups.1 > max_groups || cells > u32::MAX as u64 {
            return Err(unavailable(format!("{}x{} grid exceeds the dispatch limits", rows, cols)));
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("fdm_surface device"),
                    required_features: wgpu::Features::SHADER_F64,
                    required_limits: limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| unavailable(format!("failed to create device: {}", e)))?;

        info!(
            "GPU stencil backend: {} ({:?}), {}x{} grid",
            adapter_info.name, adapter_info.backend, rows, cols
        );

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("stencil shader"),
            source: wgpu::ShaderSource::Wgsl(STENCIL_SHADER.into()),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("stencil bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, true),
                storage(3, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("stencil pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("stencil pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("advance"),
            compilation_options: Default::default(),
            cache: None,
        });
        if let Some(e) = device.pop_error_scope().await {
            return Err(unavailable(format!("stencil shader rejected: {}", e)));
        }

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stencil params"),
            size: std::mem::size_of::<StencilParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let height = |label: &str, usage: wgpu::BufferUsages| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: grid_bytes,
                usage,
                mapped_at_creation: false,
            })
        };
        let input = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;
        let height_prev = height("height_prev", input);
        let height_cur = height("height_cur", input);
        let height_next = height(
            "height_next",
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        );
        let staging = height(
            "height_staging",
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        );

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("stencil bind group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: height_prev.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: height_cur.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: height_next.as_entire_binding(),
                },
            ],
        });

        Ok(GpuStencil {
            device,
            queue,
            pipeline,
            bind_group,
            params,
            height_prev,
            height_cur,
            height_next,
            staging,
            shape,
            adapter_name: adapter_info.name,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn read_back(&self, next: &mut Grid) -> Result<()> {
        let slice = self.staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // the receiver only goes away if read_back already returned
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| Error::Device("staging buffer was never mapped".into()))?
            .map_err(|e| Error::Device(format!("failed to map staging buffer: {}", e)))?;

        {
            let data = slice.get_mapped_range();
            next.as_slice_mut().copy_from_slice(bytemuck::cast_slice(&data));
        }
        self.staging.unmap();
        Ok(())
    }
}

impl StencilBackend for GpuStencil {
    fn kind(&self) -> Backend {
        Backend::Gpu
    }

    fn shape(&self) -> Option<(usize, usize)> {
        Some(self.shape)
    }

    fn step(&mut self, previous: &Grid, current: &Grid, next: &mut Grid, co: &Coefficients) -> Result<()> {
        if current.shape() != self.shape {
            return Err(Error::Device(format!(
                "buffers hold a {:?} grid, got {:?}",
                self.shape,
                current.shape()
            )));
        }
        let (rows, cols) = self.shape;

        let params = StencilParams {
            rows: rows as u32,
            cols: cols as u32,
            _pad0: 0,
            _pad1: 0,
            gain: co.gain,
            lag: co.lag,
            denom: co.denom,
            _pad2: 0.,
        };
        self.queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
        self.queue
            .write_buffer(&self.height_prev, 0, bytemuck::cast_slice(previous.as_slice()));
        self.queue
            .write_buffer(&self.height_cur, 0, bytemuck::cast_slice(current.as_slice()));

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("stencil step"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("stencil pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(
                (cols as u32).div_ceil(WORKGROUP_SIZE),
                (rows as u32).div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        encoder.copy_buffer_to_buffer(&self.height_next, 0, &self.staging, 0, self.staging.size());
        self.queue.submit(Some(encoder.finish()));

        self.read_back(next)?;
        debug!(rows, cols, "GPU step finished");
        Ok(())
    }
}
