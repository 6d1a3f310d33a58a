//! Simulations of small rectangle layouts: reciprocity, mirror symmetry and
//! run-to-run determinism of the scattering matrix.

use inverso_core::solver::fdfd::FdfdEz;
use inverso_core::{simulate, DeviceModel, Direction, SimulateOptions};
use inverso_geometry::primitives::{LineAxis, Rect, Shape, Waveguide};
use inverso_geometry::transform::Mirror;
use inverso_geometry::{LayoutModel, LayoutSpec, PortSpec};
use ndarray::Array2;

/// A 1x2 junction: one input on the left, two outputs on the right placed
/// symmetrically about the horizontal centre line.
fn junction(symmetry: Option<Mirror>) -> LayoutSpec {
    let arm = |centre: f64, span: [f64; 2]| {
        Shape::Waveguide(Waveguide {
            axis: LineAxis::X,
            centre,
            width: 250.0,
            span: Some(span),
        })
    };
    let port = |centre: [f64; 2], direction: Direction| PortSpec {
        centre,
        width: 500.0,
        direction,
        monitor_offset: 125.0,
        order: 1,
    };
    LayoutSpec {
        extent: [2000.0, 2000.0],
        resolution: 25.0,
        pml_width: 250.0,
        cladding_permittivity: 2.25,
        slab_permittivity: 12.25,
        wavelengths: vec![1550.0],
        design_region: Rect::from_corners([800.0, 375.0], [1200.0, 1625.0]),
        design_symmetry: symmetry,
        shapes: vec![
            arm(1000.0, [0.0, 800.0]),
            arm(1500.0, [1200.0, 2000.0]),
            arm(500.0, [1200.0, 2000.0]),
        ],
        ports: vec![
            port([300.0, 1000.0], Direction::XPos),
            port([1700.0, 1500.0], Direction::XNeg),
            port([1700.0, 500.0], Direction::XNeg),
        ],
    }
}

fn irregular_design(shape: (usize, usize)) -> Array2<f64> {
    Array2::from_shape_fn(shape, |(i, j)| {
        let v = 0.5 + 0.45 * ((1.3 * i as f64 + 0.7 * j as f64).sin() * (0.4 * j as f64).cos());
        v.clamp(0.0, 1.0)
    })
}

#[test]
fn test_reciprocity() {
    let model = LayoutModel::new(junction(None)).unwrap();
    let design = irregular_design(model.design_variable_shape());
    let options = SimulateOptions::default().with_excitations(vec![0, 1, 2]);
    let out = simulate(&model, &FdfdEz::default(), design.view(), &options).unwrap();

    assert_eq!(out.sparams.dim(), (1, 3, 3));
    let magnitude = out.sparam_matrix(0).mapv(|s| s.norm());
    let diff = &magnitude - &magnitude.t();
    let frobenius = |a: &Array2<f64>| a.iter().map(|v| v * v).sum::<f64>().sqrt();
    let asymmetry = frobenius(&diff) / frobenius(&magnitude);
    assert!(asymmetry < 1e-3, "relative asymmetry of |S| {asymmetry:.2e}");
}

#[test]
fn test_mirror_symmetric_outputs() {
    let model = LayoutModel::new(junction(Some(Mirror::Y))).unwrap();
    let design = irregular_design(model.design_variable_shape());
    let options = SimulateOptions::default().with_excitations(vec![0, 1, 2]);
    let out = simulate(&model, &FdfdEz::default(), design.view(), &options).unwrap();

    let s = |e: usize, p: usize| out.sparams[[0, e, p]].norm();
    // Input splits equally into the mirrored arms
    assert!((s(0, 1) - s(0, 2)).abs() < 1e-6);
    // Mirrored excitations see mirrored responses
    assert!((s(1, 0) - s(2, 0)).abs() < 1e-6);
    assert!((s(1, 1) - s(2, 2)).abs() < 1e-6);
    assert!((s(1, 2) - s(2, 1)).abs() < 1e-6);
}

#[test]
fn test_repeated_simulations_agree() {
    let model = LayoutModel::new(junction(None)).unwrap();
    let design = Array2::<f64>::ones(model.design_variable_shape());
    let options = SimulateOptions::default()
        .with_excitations(vec![0, 2])
        .with_wavelengths(vec![1500.0, 1550.0]);
    let solver = FdfdEz::default();

    let first = simulate(&model, &solver, design.view(), &options).unwrap();
    let second = simulate(&model, &solver, design.view(), &options).unwrap();

    assert_eq!(first.sparams.dim(), (2, 2, 3));
    for (a, b) in first.sparams.iter().zip(second.sparams.iter()) {
        assert!((a - b).norm() <= 1e-10 * a.norm().max(1e-12));
    }
    assert_eq!(
        model.density(design.view()).unwrap(),
        model.density(design.view()).unwrap()
    );
    assert_eq!(
        model.epsilon_r(design.view()).unwrap(),
        model.epsilon_r(design.view()).unwrap()
    );

    // Passive device: no excitation gains power
    for w in 0..2 {
        for e in 0..2 {
            let total: f64 = (0..3).map(|p| first.sparams[[w, e, p]].norm_sqr()).sum();
            assert!(total < 1.05, "total scattered power {total}");
        }
    }
}

#[test]
fn test_spec_parses_from_toml() {
    let text = r#"
        extent = [2000.0, 2000.0]
        resolution = 25.0
        pml_width = 250.0
        cladding_permittivity = 2.25
        slab_permittivity = 12.25
        wavelengths = [1550.0]
        design_symmetry = "y"

        [design_region]
        centre = [1000.0, 1000.0]
        size = [400.0, 1250.0]

        [[shapes]]
        type = "Waveguide"
        axis = "x"
        centre = 1000.0
        width = 250.0

        [[shapes]]
        type = "Rect"
        centre = [1000.0, 1000.0]
        size = [100.0, 100.0]

        [[ports]]
        centre = [300.0, 1000.0]
        width = 500.0
        direction = "+x"
        monitor_offset = 125.0

        [[ports]]
        centre = [1700.0, 1000.0]
        width = 500.0
        direction = "-x"
        order = 2
    "#;
    let spec: LayoutSpec = toml::from_str(text).unwrap();
    assert_eq!(spec.design_symmetry, Some(Mirror::Y));
    assert_eq!(spec.shapes.len(), 2);
    assert_eq!(spec.ports[0].order, 1);
    assert_eq!(spec.ports[1].order, 2);
    assert_eq!(spec.ports[1].monitor_offset, 0.0);
    assert_eq!(spec.ports[1].direction, Direction::XNeg);

    let model = LayoutModel::new(spec).unwrap();
    assert_eq!(model.shape(), (80, 80));
    assert_eq!(model.design_variable_shape(), (16, 25));
}
