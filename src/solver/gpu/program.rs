use super::context::GpuContext;

/// A compiled shader module assembled from code fragments. Individual
/// kernels are instantiated from it by entry point name.
pub struct Program {
    module: wgpu::ShaderModule,
}

impl Program {
    pub async fn build(ctx: &GpuContext, sources: &[String]) -> Result<Self, String> {
        let source = sources.concat();
        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("solver program"),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(err) = ctx.device.pop_error_scope().await {
            return Err(format!("failed to build program executable!\n{err}"));
        }
        Ok(Self { module })
    }

    pub fn kernel(&self, ctx: &GpuContext, name: &str) -> Result<wgpu::ComputePipeline, String> {
        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = ctx
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(name),
                layout: None,
                module: &self.module,
                entry_point: name,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
        if let Some(err) = pollster::block_on(ctx.device.pop_error_scope()) {
            return Err(format!("failed to create kernel {name}: {err}"));
        }
        Ok(pipeline)
    }
}

/// Builds a bind group for a pipeline with an implicit layout. `entries`
/// must name exactly the binding slots the entry point statically uses.
pub fn bind_group(
    device: &wgpu::Device,
    pipeline: &wgpu::ComputePipeline,
    entries: &[(u32, &wgpu::Buffer)],
) -> wgpu::BindGroup {
    let entries: Vec<wgpu::BindGroupEntry> = entries
        .iter()
        .map(|(slot, buffer)| wgpu::BindGroupEntry {
            binding: *slot,
            resource: buffer.as_entire_binding(),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: None,
        layout: &pipeline.get_bind_group_layout(0),
        entries: &entries,
    })
}

const MAX_GROUPS_PER_DIM: u32 = 65_535;

/// Workgroup grid covering `threads` invocations at workgroup width 64.
/// Counts past the per-dimension limit spill into the second grid axis;
/// kernels linearize via `global_index`.
fn dispatch_extent(threads: u32) -> (u32, u32) {
    let groups = threads.div_ceil(64).max(1);
    let gx = groups.min(MAX_GROUPS_PER_DIM);
    (gx, groups.div_ceil(gx))
}

/// Encodes one compute pass covering `threads` invocations.
pub fn encode_dispatch(
    encoder: &mut wgpu::CommandEncoder,
    pipeline: &wgpu::ComputePipeline,
    bind: &wgpu::BindGroup,
    threads: u32,
) {
    let (gx, gy) = dispatch_extent(threads);
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: None,
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind, &[]);
    pass.dispatch_workgroups(gx, gy, 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_dispatches_stay_one_dimensional() {
        assert_eq!(dispatch_extent(1), (1, 1));
        assert_eq!(dispatch_extent(64), (1, 1));
        assert_eq!(dispatch_extent(65), (2, 1));
        assert_eq!(dispatch_extent(65_535 * 64), (65_535, 1));
    }

    #[test]
    fn large_dispatches_spill_into_the_second_axis() {
        // a 128^3 grid dispatches volume * 3 face threads
        for threads in [65_535 * 64 + 1, 128 * 128 * 128 * 3, u32::MAX] {
            let (gx, gy) = dispatch_extent(threads);
            assert!(gx <= 65_535 && gy <= 65_535, "{threads}");
            let covered = gx as u64 * gy as u64 * 64;
            assert!(covered >= threads as u64, "{threads} uncovered");
            // no more than one redundant row of workgroups
            assert!((gx as u64 * (gy as u64 - 1)) * 64 < threads as u64);
        }
    }
}
