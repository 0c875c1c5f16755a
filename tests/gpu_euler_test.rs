use hydro2::solver::{
    BoundaryMethod, Grid, InitialCell, IntegratorKind, SchemeKind, Solver, SolverConfig,
};

const GAMMA: f32 = 1.4;

fn try_solver(config: SolverConfig, kind: SchemeKind) -> Option<Solver> {
    let _ = env_logger::builder().is_test(true).try_init();
    match pollster::block_on(Solver::new(config, kind)) {
        Ok(solver) => Some(solver),
        Err(e) if e.contains("no compatible gpu adapter") => {
            eprintln!("skipping: {e}");
            None
        }
        Err(e) => panic!("{e}"),
    }
}

fn euler_state_1d(n: usize, f: impl Fn(usize) -> (f32, f32, f32)) -> Vec<f32> {
    let mut out = vec![0.0f32; n * 3];
    for i in 0..n {
        let (rho, u, p) = f(i);
        out[i * 3] = rho;
        out[i * 3 + 1] = rho * u;
        out[i * 3 + 2] = p / (GAMMA - 1.0) + 0.5 * rho * u * u;
    }
    out
}

#[test]
fn uniform_state_is_a_fixed_point() {
    for (kind, integrator) in [
        (SchemeKind::Burgers, IntegratorKind::ForwardEuler),
        (SchemeKind::EulerHll, IntegratorKind::ForwardEuler),
        (SchemeKind::EulerRoe, IntegratorKind::ForwardEuler),
        (SchemeKind::EulerRoe, IntegratorKind::RungeKutta4),
    ] {
        let n = 100;
        let grid = Grid::new(1, [n, 1, 1], [0.0; 3], [1.0; 3]).expect("grid");
        let mut config = SolverConfig::new(grid);
        config.boundary_methods = [[BoundaryMethod::Periodic; 2]; 3];
        config.fixed_dt = Some(1e-3);
        config.integrator = integrator;
        let Some(mut solver) = try_solver(config, kind) else {
            return;
        };
        assert_eq!(solver.scheme_kind(), kind);
        let state = euler_state_1d(n, |_| (1.0, 0.0, 1.0));
        solver.write_state(&state).expect("upload");
        for _ in 0..10 {
            solver.update().expect("update");
        }
        let got = solver.state_snapshot().expect("snapshot");
        for (a, b) in got.iter().zip(state.iter()) {
            assert!(
                (a - b).abs() < 1e-5,
                "{kind:?}/{integrator:?} drifted: {a} vs {b}"
            );
        }
    }
}

#[test]
fn periodic_roe_derivative_conserves_every_channel() {
    let n = 64;
    let grid = Grid::new(1, [n, 1, 1], [0.0; 3], [1.0; 3]).expect("grid");
    let dx = grid.dx(0);
    let mut config = SolverConfig::new(grid);
    config.boundary_methods = [[BoundaryMethod::Periodic; 2]; 3];
    config.fixed_dt = Some(1e-4);
    let Some(mut solver) = try_solver(config, SchemeKind::EulerRoe) else {
        return;
    };

    let tau = 2.0 * std::f32::consts::PI;
    let state = euler_state_1d(n, |i| {
        let x = (i as f32 + 0.5) / n as f32;
        (
            1.0 + 0.2 * (tau * x).sin(),
            0.3 * (tau * x).cos(),
            1.0 + 0.1 * (tau * 2.0 * x).sin(),
        )
    });
    solver.write_state(&state).expect("upload");
    let deriv = solver.derivative_snapshot().expect("derivative");

    let names = solver.channel_names();
    for s in 0..3 {
        let mut total = 0.0f64;
        let mut scale = 0.0f64;
        for i in 2..n - 2 {
            total += deriv[i * 3 + s] as f64 * dx as f64;
            scale += (deriv[i * 3 + s] as f64 * dx as f64).abs();
        }
        assert!(
            total.abs() <= 1e-4 * scale.max(1e-12),
            "{} gained {total} (scale {scale})",
            names[s]
        );
    }
    // ghost cells carry no derivative
    for i in [0usize, 1, n - 2, n - 1] {
        for s in 0..3 {
            assert_eq!(deriv[i * 3 + s], 0.0);
        }
    }
}

#[test]
fn sod_shock_tube_stays_monotonic() {
    let n = 128;
    let grid = Grid::new(1, [n, 1, 1], [0.0; 3], [1.0; 3]).expect("grid");
    let mut config = SolverConfig::new(grid);
    config.boundary_methods = [[BoundaryMethod::FreeFlow; 2]; 3];
    config.cfl = 0.5;
    config.init_state = Some(Box::new(|x, _, _| {
        let (density, pressure) = if x < 0.5 { (1.0, 1.0) } else { (0.125, 0.1) };
        InitialCell {
            density,
            momentum: [0.0; 3],
            magnetic: [0.0; 3],
            energy_total: pressure / (GAMMA - 1.0),
        }
    }));
    let Some(mut solver) = try_solver(config, SchemeKind::EulerRoe) else {
        return;
    };

    let mut t = 0.0f32;
    while t < 0.1 {
        t += solver.update().expect("update");
    }
    let got = solver.state_snapshot().expect("snapshot");

    let tol = 5e-3;
    for i in 2..n - 2 {
        let rho = got[i * 3];
        assert!(
            rho >= 0.125 - tol && rho <= 1.0 + tol,
            "density {rho} out of range at {i}"
        );
        if i > 2 {
            let prev = got[(i - 1) * 3];
            assert!(
                rho <= prev + tol,
                "density not monotone at {i}: {prev} -> {rho}"
            );
        }
    }
    // the wave structure must have developed
    let mid = got[(n / 2) * 3];
    assert!(mid > 0.2 && mid < 0.9, "midpoint density {mid}");
}

#[test]
fn display_conversion_reports_primitives() {
    let n = 16;
    let grid = Grid::new(1, [n, 1, 1], [0.0; 3], [1.0; 3]).expect("grid");
    let mut config = SolverConfig::new(grid);
    config.boundary_methods = [[BoundaryMethod::Periodic; 2]; 3];
    // initialized via reset_state so the potential seeding path runs
    config.init_state = Some(Box::new(|_, _, _| InitialCell {
        density: 2.0,
        momentum: [1.0, 0.0, 0.0],
        magnetic: [0.0; 3],
        energy_total: 3.0 / (GAMMA - 1.0) + 0.25,
    }));
    let Some(solver) = try_solver(config, SchemeKind::EulerHll) else {
        return;
    };
    let shown = solver.display_snapshot().expect("display");
    let i = 5;
    assert!((shown[i * 4] - 2.0).abs() < 1e-6, "density");
    assert!((shown[i * 4 + 1] - 0.5).abs() < 1e-6, "velocity magnitude");
    assert!((shown[i * 4 + 2] - 3.0).abs() < 1e-5, "pressure");
    // gravity is off, so the potential channel must stay zero
    assert_eq!(shown[i * 4 + 3], 0.0, "potential");
}
