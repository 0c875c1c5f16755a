use super::boundary::BoundaryTable;
use super::buffers::BufferArena;
use super::context::GpuContext;
use super::gravity::SelfGravitation;
use super::integrate::Integrator;
use super::program::{bind_group, encode_dispatch, Program};
use super::readback::{read_buffer_f32, read_buffer_u32};
use super::reduce::{MinReduce, REDUCE_GROUP_WIDTH};
use super::structs::StepParams;
use crate::solver::codegen::{self, slots};
use crate::solver::config::SolverConfig;
use crate::solver::equation::EquationDescriptor;
use crate::solver::scheme::{FluxScheme, SchemeKind, SchemeResources};

/// Owns the device context, the compiled program and every buffer of one
/// simulation, and drives the per-frame sequence: boundary refresh, step
/// preparation, timestep, integration.
pub struct Solver {
    ctx: GpuContext,
    config: SolverConfig,
    equation: Box<dyn EquationDescriptor>,
    scheme: Box<dyn FluxScheme>,
    arena: BufferArena,
    boundary: BoundaryTable,
    reduce: MinReduce,
    gravity: Option<SelfGravitation>,
    integrator: Integrator,
    state: wgpu::Buffer,
    flux: wgpu::Buffer,
    cfl_metric: wgpu::Buffer,
    cfl_scratch: [wgpu::Buffer; 2],
    dt_buffer: wgpu::Buffer,
    step_params: wgpu::Buffer,
    potential: [wgpu::Buffer; 2],
    display: wgpu::Buffer,
    display_pipeline: wgpu::ComputePipeline,
    display_binds: [wgpu::BindGroup; 2],
    num_states: u32,
    volume: u32,
    time: f32,
    step_count: u64,
}

impl Solver {
    pub async fn new(config: SolverConfig, scheme_kind: SchemeKind) -> Result<Self, String> {
        let ctx = GpuContext::new().await?;
        Self::with_context(ctx, config, scheme_kind).await
    }

    pub async fn with_context(
        ctx: GpuContext,
        config: SolverConfig,
        scheme_kind: SchemeKind,
    ) -> Result<Self, String> {
        let equation = scheme_kind.equation();
        let dim = config.grid.dim();
        let volume = config.grid.volume() as u32;
        let num_states = equation.num_states(dim) as u32;

        let sources = codegen::assemble(
            &config,
            equation.as_ref(),
            scheme_kind.program_sources(&config),
        );
        let program = Program::build(&ctx, &sources).await?;

        let mut arena = BufferArena::new();
        let device = &ctx.device;
        let state = arena.alloc(device, volume as u64 * num_states as u64 * 4, "stateBuffer");
        let flux = arena.alloc(
            device,
            volume as u64 * dim as u64 * num_states as u64 * 4,
            "fluxBuffer",
        );
        let cfl_metric = arena.alloc(device, volume as u64 * 4, "cflBuffer");
        let groups = volume.div_ceil(REDUCE_GROUP_WIDTH).max(1) as u64;
        let groups2 = (groups as u32).div_ceil(REDUCE_GROUP_WIDTH).max(1) as u64;
        let cfl_scratch = [
            arena.alloc(device, groups * 4, "cflSwapBuffer"),
            arena.alloc(device, groups2 * 4, "cflSwapBuffer2"),
        ];
        let dt_buffer = arena.alloc(device, 4, "dtBuffer");
        let step_params = arena.alloc_uniform(
            device,
            std::mem::size_of::<StepParams>() as u64,
            "stepParamsBuffer",
        );
        let potential = [
            arena.alloc(device, volume as u64 * 4, "potentialBuffer"),
            arena.alloc(device, volume as u64 * 4, "potentialSwapBuffer"),
        ];
        let display = arena.alloc(device, volume as u64 * 4 * 4, "displayBuffer");

        // cells the metric kernel never writes must not win the reduction
        ctx.queue.write_buffer(
            &cfl_metric,
            0,
            bytemuck::cast_slice(&vec![f32::MAX; volume as usize]),
        );
        ctx.queue.write_buffer(
            &step_params,
            0,
            bytemuck::bytes_of(&StepParams {
                dt: config.fixed_dt.unwrap_or(0.0),
                cfl: config.cfl,
                pad: [0.0; 2],
            }),
        );

        let boundary =
            BoundaryTable::build(&ctx, &program, &config, equation.as_ref(), &state, &potential)?;
        let reduce = MinReduce::new(&ctx, &program)?;

        let res = SchemeResources {
            ctx: &ctx,
            program: &program,
            state: &state,
            step_params: &step_params,
            cfl_metric: &cfl_metric,
            flux: &flux,
            volume,
            dim: dim as u32,
            num_states,
        };
        let scheme = scheme_kind.build(&res, &mut arena, &config)?;

        let gravity = if config.use_gravity {
            Some(SelfGravitation::new(
                &ctx,
                &program,
                &state,
                &potential,
                config.gravity_relax_iters,
                volume,
            )?)
        } else {
            None
        };

        let integrator = Integrator::new(
            config.integrator,
            &ctx,
            &program,
            &mut arena,
            &state,
            volume * num_states,
        )?;

        let display_pipeline = program.kernel(&ctx, "convert_to_display")?;
        let display_binds = [
            bind_group(
                device,
                &display_pipeline,
                &[
                    (slots::STATE, &state),
                    (slots::POTENTIAL, &potential[0]),
                    (slots::DISPLAY_OUT, &display),
                ],
            ),
            bind_group(
                device,
                &display_pipeline,
                &[
                    (slots::STATE, &state),
                    (slots::POTENTIAL, &potential[1]),
                    (slots::DISPLAY_OUT, &display),
                ],
            ),
        ];

        let mut solver = Self {
            ctx,
            config,
            equation,
            scheme,
            arena,
            boundary,
            reduce,
            gravity,
            integrator,
            state,
            flux,
            cfl_metric,
            cfl_scratch,
            dt_buffer,
            step_params,
            potential,
            display,
            display_pipeline,
            display_binds,
            num_states,
            volume,
            time: 0.0,
            step_count: 0,
        };
        if solver.config.init_state.is_some() {
            solver.reset_state()?;
        }
        Ok(solver)
    }

    /// Evaluates the configured initial-condition function at every cell
    /// center, uploads the packed field, and (with gravity enabled) runs
    /// the one-time potential solve whose result is folded into the
    /// total-energy channel.
    pub fn reset_state(&mut self) -> Result<(), String> {
        let grid = &self.config.grid;
        let dim = grid.dim();
        let ns = self.num_states as usize;
        let init = self
            .config
            .init_state
            .as_ref()
            .ok_or("no initial state function configured")?;

        let mut host = vec![0.0f32; grid.volume() * ns];
        let mut density = vec![0.0f32; grid.volume()];
        let mut idx = 0;
        for z in 0..grid.size(2) {
            for y in 0..grid.size(1) {
                for x in 0..grid.size(0) {
                    let center = grid.cell_center([x, y, z]);
                    let cell = init(center[0], center[1], center[2]);
                    self.equation
                        .pack_initial(dim, &cell, &mut host[idx * ns..(idx + 1) * ns]);
                    density[idx] = cell.density;
                    idx += 1;
                }
            }
        }
        self.ctx
            .queue
            .write_buffer(&self.state, 0, bytemuck::cast_slice(&host));

        // density is a workable seed for the relaxation solve; without
        // gravity the potential must read as zero
        if self.gravity.is_some() {
            for buf in &self.potential {
                self.ctx
                    .queue
                    .write_buffer(buf, 0, bytemuck::cast_slice(&density));
            }
        } else {
            let zeros = vec![0.0f32; grid.volume()];
            for buf in &self.potential {
                self.ctx
                    .queue
                    .write_buffer(buf, 0, bytemuck::cast_slice(&zeros));
            }
        }
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        self.boundary.encode_state(&mut encoder);
        if let Some(gravity) = &mut self.gravity {
            gravity.encode_relax(&mut encoder, &self.boundary);
        }
        self.ctx.queue.submit(Some(encoder.finish()));
        self.ctx.device.poll(wgpu::Maintain::Wait);

        if let Some(gravity) = &self.gravity {
            let phi = read_buffer_f32(
                &self.ctx,
                &self.potential[gravity.parity()],
                self.volume as usize,
            )?;
            for (i, p) in phi.iter().enumerate() {
                host[i * ns + ns - 1] -= 0.5 * density[i] * p;
            }
            self.ctx
                .queue
                .write_buffer(&self.state, 0, bytemuck::cast_slice(&host));
            let mut encoder = self
                .ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
            self.boundary.encode_state(&mut encoder);
            self.ctx.queue.submit(Some(encoder.finish()));
            self.ctx.device.poll(wgpu::Maintain::Wait);
        }

        self.time = 0.0;
        self.step_count = 0;
        Ok(())
    }

    /// Uploads raw state contents (interior and ghost cells) and refreshes
    /// the ghost layers. Intended for diagnostics and tests.
    pub fn write_state(&mut self, data: &[f32]) -> Result<(), String> {
        let expect = (self.volume * self.num_states) as usize;
        if data.len() != expect {
            return Err(format!(
                "state length mismatch: got {} expected {expect}",
                data.len()
            ));
        }
        self.ctx
            .queue
            .write_buffer(&self.state, 0, bytemuck::cast_slice(data));
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        self.boundary.encode_state(&mut encoder);
        self.ctx.queue.submit(Some(encoder.finish()));
        self.ctx.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    /// Advances the simulation by one step and returns the dt used.
    pub fn update(&mut self) -> Result<f32, String> {
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        self.boundary.encode_state(&mut encoder);
        self.scheme.begin_step(&self.ctx, &mut encoder);

        let dt = match self.config.fixed_dt {
            Some(dt) => {
                self.ctx.queue.submit(Some(encoder.finish()));
                dt
            }
            None => {
                self.scheme.encode_timestep_metric(&mut encoder);
                self.ctx.queue.submit(Some(encoder.finish()));
                self.reduce.run(
                    &self.ctx,
                    &self.cfl_metric,
                    &self.cfl_scratch,
                    &self.dt_buffer,
                    self.volume,
                )?
            }
        };
        if !dt.is_finite() || dt <= 0.0 {
            return Err(format!("non-positive timestep {dt}"));
        }
        self.ctx.queue.write_buffer(
            &self.step_params,
            0,
            bytemuck::bytes_of(&StepParams {
                dt,
                cfl: self.config.cfl,
                pad: [0.0; 2],
            }),
        );

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        let ctx = &self.ctx;
        let boundary = &self.boundary;
        let scheme = &self.scheme;
        let gravity = &mut self.gravity;
        let state = &self.state;
        let flux = &self.flux;
        let potential = &self.potential;
        self.integrator.encode(
            ctx,
            &mut encoder,
            state,
            dt,
            &mut |enc, deriv| {
                boundary.encode_state(enc);
                if let Some(gravity) = gravity.as_mut() {
                    gravity.encode_relax(enc, boundary);
                }
                scheme.encode_derivative(ctx, enc, state, flux, deriv);
                if let Some(gravity) = gravity.as_ref() {
                    gravity.encode_deriv(ctx, enc, state, potential, deriv);
                }
            },
        );
        self.ctx.queue.submit(Some(encoder.finish()));
        self.ctx.device.poll(wgpu::Maintain::Wait);

        self.time += dt;
        self.step_count += 1;
        if self.config.show_timestep {
            log::info!("dt {dt}");
        }
        Ok(dt)
    }

    /// Evaluates the derivative of the current state without advancing it.
    pub fn derivative_snapshot(&mut self) -> Result<Vec<f32>, String> {
        let bytes = (self.volume * self.num_states) as u64 * 4;
        let deriv = self
            .arena
            .alloc(&self.ctx.device, bytes, "derivSnapshotBuffer");
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        self.boundary.encode_state(&mut encoder);
        self.scheme.begin_step(&self.ctx, &mut encoder);
        if let Some(gravity) = self.gravity.as_mut() {
            gravity.encode_relax(&mut encoder, &self.boundary);
        }
        self.scheme
            .encode_derivative(&self.ctx, &mut encoder, &self.state, &self.flux, &deriv);
        if let Some(gravity) = self.gravity.as_ref() {
            gravity.encode_deriv(&self.ctx, &mut encoder, &self.state, &self.potential, &deriv);
        }
        self.ctx.queue.submit(Some(encoder.finish()));
        self.ctx.device.poll(wgpu::Maintain::Wait);
        read_buffer_f32(&self.ctx, &deriv, (self.volume * self.num_states) as usize)
    }

    /// Blocking copy of the full state field.
    pub fn state_snapshot(&self) -> Result<Vec<f32>, String> {
        read_buffer_f32(
            &self.ctx,
            &self.state,
            (self.volume * self.num_states) as usize,
        )
    }

    /// Blocking copy of the gravitational potential, when gravity is on.
    pub fn potential_snapshot(&self) -> Result<Vec<f32>, String> {
        let parity = self
            .gravity
            .as_ref()
            .map(|g| g.parity())
            .ok_or("gravity is not enabled")?;
        read_buffer_f32(&self.ctx, &self.potential[parity], self.volume as usize)
    }

    /// Blocking copy of the per-face flux diagnostic flags, for schemes
    /// that keep them.
    pub fn flux_flag_snapshot(&self) -> Result<Vec<u32>, String> {
        let buffer = self
            .scheme
            .flux_flag()
            .ok_or("scheme keeps no flux flag")?;
        read_buffer_u32(
            &self.ctx,
            buffer,
            (self.volume * self.config.grid.dim() as u32) as usize,
        )
    }

    /// Runs the display conversion kernel and reads back the 4-channel
    /// result (density, velocity magnitude, pressure, potential).
    pub fn display_snapshot(&self) -> Result<Vec<f32>, String> {
        let parity = self.gravity.as_ref().map(|g| g.parity()).unwrap_or(0);
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encode_dispatch(
            &mut encoder,
            &self.display_pipeline,
            &self.display_binds[parity],
            self.volume,
        );
        self.ctx.queue.submit(Some(encoder.finish()));
        self.ctx.device.poll(wgpu::Maintain::Wait);
        read_buffer_f32(&self.ctx, &self.display, self.volume as usize * 4)
    }

    pub fn state_buffer(&self) -> &wgpu::Buffer {
        &self.state
    }

    pub fn scheme_kind(&self) -> SchemeKind {
        self.scheme.kind()
    }

    /// State channel names in buffer order, e.g. for labeling diagnostics.
    pub fn channel_names(&self) -> Vec<&'static str> {
        self.equation.channel_names(self.config.grid.dim())
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn total_allocated(&self) -> u64 {
        self.arena.total_allocated()
    }
}
