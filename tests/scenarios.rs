//! End-to-end scenarios against the public API (spec.md §8).

use oxs_demag::{Config, Engine, MagnetizationField, MeshSpec, OutputRequest};

const MU0: f64 = 4.0 * std::f64::consts::PI * 1e-7;
const MS: f64 = 8e5;

fn uniform_field(mesh: &MeshSpec, direction: [f64; 3]) -> MagnetizationField {
    let mut field = MagnetizationField::zeros(mesh);
    for i in 0..field.len() {
        field.spin_mut()[i] = [
            direction[0] * MS,
            direction[1] * MS,
            direction[2] * MS,
        ];
        field.ms_mut()[i] = MS;
    }
    field
}

#[test]
fn s1_single_cube_self_demag() {
    let mesh = MeshSpec::new([1, 1, 1], [1e-9; 3], [false; 3]).unwrap();
    let field = uniform_field(&mesh, [1.0, 0.0, 0.0]);

    let mut engine = Engine::new(Config::default()).with_nthreads(1);
    let mut h = vec![[0.0; 3]; 1];
    let mut out = OutputRequest {
        h: Some(&mut h),
        ..Default::default()
    };
    let energy = engine.compute_energy(&mesh, &field, &mut out).unwrap();

    assert!((h[0][0] + MS / 3.0).abs() / MS < 1e-3);
    assert!(h[0][1].abs() / MS < 1e-6);
    assert!(h[0][2].abs() / MS < 1e-6);

    let cell_volume = 1e-9f64.powi(3);
    let expected_energy = 0.5 * MU0 * MS * MS * (1.0 / 3.0) * cell_volume;
    assert!((energy - expected_energy).abs() / expected_energy < 1e-2);
}

#[test]
fn s2_uniform_cube_along_z() {
    let mesh = MeshSpec::new([2, 2, 2], [1e-9; 3], [false; 3]).unwrap();
    let field = uniform_field(&mesh, [0.0, 0.0, 1.0]);

    let mut engine = Engine::new(Config::default()).with_nthreads(1);
    let mut h = vec![[0.0; 3]; mesh.cell_count()];
    let mut out = OutputRequest {
        h: Some(&mut h),
        ..Default::default()
    };
    engine.compute_energy(&mesh, &field, &mut out).unwrap();

    let first = h[0][2];
    for entry in &h {
        assert!((entry[2] - first).abs() / MS < 1e-3);
        assert!(entry[0].abs() / MS < 1e-3);
        assert!(entry[1].abs() / MS < 1e-3);
    }
}

#[test]
fn s3_long_bar_demag_factor() {
    let mesh = MeshSpec::new([64, 4, 4], [1e-9; 3], [false; 3]).unwrap();
    let field = uniform_field(&mesh, [1.0, 0.0, 0.0]);

    let mut engine = Engine::new(Config::default()).with_nthreads(4);
    let mut h = vec![[0.0; 3]; mesh.cell_count()];
    let mut out = OutputRequest {
        h: Some(&mut h),
        ..Default::default()
    };
    engine.compute_energy(&mesh, &field, &mut out).unwrap();

    let mean_hx: f64 = h.iter().map(|entry| entry[0]).sum::<f64>() / h.len() as f64;
    assert!((mean_hx / MS + 0.02).abs() < 1e-3, "mean_hx/Ms = {}", mean_hx / MS);
}

#[test]
fn s4_thread_count_agreement() {
    let mesh = MeshSpec::new([4, 4, 4], [1e-9; 3], [false; 3]).unwrap();
    let mut field = MagnetizationField::zeros(&mesh);
    for i in 0..field.len() {
        let angle = i as f64 * 0.7853981633974483;
        field.spin_mut()[i] = [MS * angle.cos(), MS * angle.sin(), 0.0];
        field.ms_mut()[i] = MS;
    }

    let mut reference: Option<(Vec<[f64; 3]>, f64)> = None;
    for &nthreads in &[1usize, 4, 8] {
        let mut engine = Engine::new(Config::default()).with_nthreads(nthreads);
        let mut h = vec![[0.0; 3]; mesh.cell_count()];
        let mut out = OutputRequest {
            h: Some(&mut h),
            ..Default::default()
        };
        engine.compute_energy(&mesh, &field, &mut out).unwrap();
        let tolerance = engine.energy_density_error_estimate().unwrap() / MU0;

        match &reference {
            None => reference = Some((h, tolerance)),
            Some((ref_h, _)) => {
                for (got, want) in h.iter().zip(ref_h.iter()) {
                    let diff = ((got[0] - want[0]).powi(2)
                        + (got[1] - want[1]).powi(2)
                        + (got[2] - want[2]).powi(2))
                    .sqrt();
                    assert!(diff <= tolerance.max(1.0), "diff={diff} tolerance={tolerance}");
                }
            }
        }
    }
}

#[test]
fn s5_x_periodic_uniform_field_cancels() {
    let mesh = MeshSpec::new([4, 8, 4], [1e-9; 3], [true, false, false]).unwrap();
    let field = uniform_field(&mesh, [1.0, 0.0, 0.0]);

    let mut engine = Engine::new(Config::default()).with_nthreads(1);
    let mut h = vec![[0.0; 3]; mesh.cell_count()];
    let mut out = OutputRequest {
        h: Some(&mut h),
        ..Default::default()
    };
    engine.compute_energy(&mesh, &field, &mut out).unwrap();

    for entry in &h {
        for component in entry {
            assert!(component.abs() / MS < 1e-2);
        }
    }
}

#[test]
fn s6_mesh_change_triggers_one_rebuild() {
    let mesh_a = MeshSpec::new([2, 2, 2], [1e-9; 3], [false; 3]).unwrap();
    let mesh_b = MeshSpec::new([3, 3, 2], [1e-9; 3], [false; 3]).unwrap();
    let field_a = MagnetizationField::zeros(&mesh_a);
    let field_b = MagnetizationField::zeros(&mesh_b);

    let mut engine = Engine::new(Config::default()).with_nthreads(1);
    let mut out = OutputRequest::default();

    assert!(engine.energy_density_error_estimate().is_none());
    engine.compute_energy(&mesh_a, &field_a, &mut out).unwrap();
    let estimate_a = engine.energy_density_error_estimate().unwrap();

    engine.compute_energy(&mesh_a, &field_a, &mut out).unwrap();
    assert_eq!(engine.energy_density_error_estimate().unwrap(), estimate_a);

    engine.compute_energy(&mesh_b, &field_b, &mut out).unwrap();
    let estimate_b = engine.energy_density_error_estimate().unwrap();
    assert_ne!(estimate_a, estimate_b);
}
