//! Device models and the simulation driver.
//!
//! A device is a background density map plus a rectangular design region.
//! The design variable is inlaid into the region, mapped affinely to
//! permittivity and simulated once per (excited port, wavelength) pair:
//!
//! ```text
//!   background      design region     design variable    simulated
//!   .________.      .________.          .___.            .________.
//!   |     ###|      |  ***   |          |871|            |  871###|
//!   |###     |  +   |  ***   |    <-    |811|     =      |###811  |
//!   |     ###|      |  ***   |          |117|            |  117###|
//!   .________.      .________.          .___.            .________.
//! ```

use ndarray::{s, Array1, Array2, Array3, Array4, ArrayD, ArrayView2};
use num_complex::Complex64;
use rayon::prelude::*;
use thiserror::Error;

use crate::constants::wavelength_nm_to_omega;
use crate::modes::{ModeError, Port};
use crate::primitives::{AffinePermittivity, DesignInlay, InlayError, Vjp};
use crate::scattering::{calculate_amplitudes, ScatteringError};
use crate::solver::{FieldProblem, FieldSolver, SolverError};
use crate::types::{BoxCoords, SimulationOutput};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("At least one port must be excited")]
    NoExcitation,

    #[error("Invalid port index {index}, the device has {num_ports} ports")]
    PortIndexOutOfRange { index: usize, num_ports: usize },

    #[error("Duplicate port index {0} in the excitation list")]
    DuplicatePort(usize),

    #[error("Excitation port indices must be sorted in ascending order, got {0:?}")]
    UnsortedPorts(Vec<usize>),

    #[error("Wavelengths must be a rank-1 array, got rank {0}")]
    WavelengthRank(usize),

    #[error("No wavelengths to simulate")]
    NoWavelengths,

    #[error("Invalid wavelength {0} nm")]
    InvalidWavelength(f64),

    #[error("Invalid design variable shape, got {got:?} but expected {expected:?}")]
    DesignShape {
        got: (usize, usize),
        expected: (usize, usize),
    },

    #[error("Cotangent of shape {got:?} does not match the domain shape {expected:?}")]
    CotangentShape {
        got: (usize, usize),
        expected: (usize, usize),
    },

    #[error("Excited port {0} has zero forward amplitude")]
    ZeroExcitation(usize),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),

    #[error(transparent)]
    Inlay(#[from] InlayError),

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error(transparent)]
    Scattering(#[from] ScatteringError),

    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// A planar device with a single design region.
///
/// Implementors describe the fixed parts of the device; the provided methods
/// build densities and permittivities from a design variable.
pub trait DeviceModel: Send + Sync {
    /// Domain shape `(nx, ny)` in cells.
    fn shape(&self) -> (usize, usize);

    /// Bounding box of the design region.
    fn design_region_coords(&self) -> BoxCoords;

    fn slab_permittivity(&self) -> f64;

    fn cladding_permittivity(&self) -> f64;

    /// Background density in [0, 1], shaped like the domain.
    fn density_bg(&self) -> ArrayView2<'_, f64>;

    /// Grid spacing (m).
    fn dl(&self) -> f64;

    /// PML thickness (cells), applied on every edge.
    fn pml_width(&self) -> usize;

    fn ports(&self) -> &[Box<dyn Port>];

    /// Wavelengths (nm) simulated when the caller gives none.
    fn output_wavelengths(&self) -> &[f64];

    fn design_region_shape(&self) -> (usize, usize) {
        self.design_region_coords().shape()
    }

    /// Shape of the free design variable. Equal to the design region unless
    /// [`DeviceModel::transform_design_variable`] resamples or mirrors.
    fn design_variable_shape(&self) -> (usize, usize) {
        self.design_region_shape()
    }

    /// Map the design variable onto the design region. Identity by default.
    fn transform_design_variable(&self, design_variable: ArrayView2<f64>) -> Array2<f64> {
        design_variable.to_owned()
    }

    /// Pull a cotangent on the transformed variable back to the design
    /// variable. Must be overridden together with the transform.
    fn transform_design_variable_vjp(
        &self,
        _design_variable: ArrayView2<f64>,
        cotangent: ArrayView2<f64>,
    ) -> Array2<f64> {
        cotangent.to_owned()
    }

    fn permittivity_map(&self) -> AffinePermittivity {
        AffinePermittivity::new(self.cladding_permittivity(), self.slab_permittivity())
    }

    /// Boolean mask of the design region.
    fn design_region(&self) -> Array2<bool> {
        let c = self.design_region_coords();
        let mut mask = Array2::from_elem(self.shape(), false);
        mask.slice_mut(s![c.x_min..c.x_max, c.y_min..c.y_max]).fill(true);
        mask
    }

    /// Background density with the (transformed) design variable inlaid.
    fn density(&self, design_variable: ArrayView2<f64>) -> Result<Array2<f64>, ModelError> {
        let expected = self.design_variable_shape();
        if design_variable.dim() != expected {
            return Err(ModelError::DesignShape {
                got: design_variable.dim(),
                expected,
            });
        }
        let inlay = DesignInlay::new(self.design_region_coords());
        let transformed = self.transform_design_variable(design_variable);
        Ok(inlay.forward(transformed.view(), self.density_bg())?)
    }

    fn epsilon_r(&self, design_variable: ArrayView2<f64>) -> Result<Array2<f64>, ModelError> {
        let density = self.density(design_variable)?;
        Ok(self.permittivity_map().forward(density.view()))
    }

    /// Permittivity of the background alone. Port modes are always solved on
    /// this, never on the design.
    fn epsilon_r_bg(&self) -> Array2<f64> {
        self.permittivity_map().forward(self.density_bg())
    }

    /// Gradient of a scalar loss with respect to the design variable, given
    /// its gradient with respect to [`DeviceModel::epsilon_r`].
    fn epsilon_r_vjp(
        &self,
        design_variable: ArrayView2<f64>,
        cotangent: ArrayView2<f64>,
    ) -> Result<Array2<f64>, ModelError> {
        let expected = self.design_variable_shape();
        if design_variable.dim() != expected {
            return Err(ModelError::DesignShape {
                got: design_variable.dim(),
                expected,
            });
        }
        if cotangent.dim() != self.shape() {
            return Err(ModelError::CotangentShape {
                got: cotangent.dim(),
                expected: self.shape(),
            });
        }
        let d_density = self.permittivity_map().vjp(cotangent);
        let d_region = DesignInlay::new(self.design_region_coords()).vjp(d_density.view());
        Ok(self.transform_design_variable_vjp(design_variable, d_region.view()))
    }
}

/// Options for [`simulate`].
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Ports to excite, strictly ascending.
    pub excite_port_idxs: Vec<usize>,
    /// Wavelengths (nm); must be rank 1. `None` uses the model's output
    /// wavelengths.
    pub wavelengths_nm: Option<ArrayD<f64>>,
    /// Worker-pool cap. `None` or `Some(0)` runs every task concurrently.
    pub max_parallelism: Option<usize>,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            excite_port_idxs: vec![0],
            wavelengths_nm: None,
            max_parallelism: None,
        }
    }
}

impl SimulateOptions {
    pub fn with_excitations(mut self, idxs: Vec<usize>) -> Self {
        self.excite_port_idxs = idxs;
        self
    }

    pub fn with_wavelengths(mut self, wavelengths_nm: Vec<f64>) -> Self {
        self.wavelengths_nm = Some(Array1::from(wavelengths_nm).into_dyn());
        self
    }

    pub fn with_max_parallelism(mut self, workers: usize) -> Self {
        self.max_parallelism = Some(workers);
        self
    }
}

fn validate_excitations(idxs: &[usize], num_ports: usize) -> Result<(), ModelError> {
    if idxs.is_empty() {
        return Err(ModelError::NoExcitation);
    }
    if let Some(&index) = idxs.iter().find(|&&i| i >= num_ports) {
        return Err(ModelError::PortIndexOutOfRange { index, num_ports });
    }
    let mut sorted = idxs.to_vec();
    sorted.sort_unstable();
    if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
        return Err(ModelError::DuplicatePort(pair[0]));
    }
    if sorted != idxs {
        return Err(ModelError::UnsortedPorts(idxs.to_vec()));
    }
    Ok(())
}

fn resolve_wavelengths<M: DeviceModel + ?Sized>(
    model: &M,
    requested: Option<&ArrayD<f64>>,
) -> Result<Vec<f64>, ModelError> {
    let wavelengths = match requested {
        Some(array) => {
            if array.ndim() != 1 {
                return Err(ModelError::WavelengthRank(array.ndim()));
            }
            array.iter().copied().collect::<Vec<f64>>()
        }
        None => model.output_wavelengths().to_vec(),
    };
    if wavelengths.is_empty() {
        return Err(ModelError::NoWavelengths);
    }
    if let Some(&bad) = wavelengths.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
        return Err(ModelError::InvalidWavelength(bad));
    }
    Ok(wavelengths)
}

/// One (excitation, wavelength) simulation.
struct TaskOutput {
    excite_slot: usize,
    wavelength_slot: usize,
    row: Vec<Complex64>,
    ez: Array2<Complex64>,
}

struct SharedInputs<'a> {
    ports: &'a [Box<dyn Port>],
    dl: f64,
    npml: usize,
    epsilon_r: ArrayView2<'a, f64>,
    epsilon_r_bg: ArrayView2<'a, f64>,
}

fn run_task<S: FieldSolver + ?Sized>(
    solver: &S,
    inputs: &SharedInputs<'_>,
    excite_slot: usize,
    port_idx: usize,
    wavelength_slot: usize,
    omega: f64,
) -> Result<TaskOutput, ModelError> {
    log::debug!(
        "simulating port {} at omega = {:.4e} rad/s with {}",
        port_idx,
        omega,
        solver.method_name()
    );

    let source = inputs.ports[port_idx].source_field(omega, inputs.dl, inputs.epsilon_r_bg)?;
    let problem = FieldProblem {
        omega,
        dl: inputs.dl,
        epsilon_r: inputs.epsilon_r,
        npml: [inputs.npml, inputs.npml],
    };
    let fields = solver.solve(&problem, source.view())?;

    let mut incident = Complex64::new(0.0, 0.0);
    let mut reflected = Vec::with_capacity(inputs.ports.len());
    for (j, port) in inputs.ports.iter().enumerate() {
        let (s_plus, s_minus) =
            calculate_amplitudes(omega, inputs.dl, port.as_ref(), &fields, inputs.epsilon_r_bg)?;
        if j == port_idx {
            incident = s_plus;
        }
        reflected.push(s_minus);
    }
    if incident.norm() == 0.0 {
        return Err(ModelError::ZeroExcitation(port_idx));
    }

    Ok(TaskOutput {
        excite_slot,
        wavelength_slot,
        row: reflected.into_iter().map(|s| s / incident).collect(),
        ez: fields.ez,
    })
}

/// Simulate `model` with `design_variable` inlaid.
///
/// Every (excited port, wavelength) pair is solved independently on a
/// bounded worker pool. All inputs are validated before any solve starts,
/// and the first failing task fails the whole call.
///
/// # Arguments
/// * `model` - The device.
/// * `solver` - Field solver used for every task.
/// * `design_variable` - Array of shape `model.design_variable_shape()`.
/// * `options` - Excitations, wavelengths and parallelism.
///
/// # Returns
/// S-parameters of shape (wavelength, excitation, port) and Ez of shape
/// (wavelength, excitation, nx, ny), ordered as requested.
pub fn simulate<M, S>(
    model: &M,
    solver: &S,
    design_variable: ArrayView2<f64>,
    options: &SimulateOptions,
) -> Result<SimulationOutput, ModelError>
where
    M: DeviceModel + ?Sized,
    S: FieldSolver + ?Sized,
{
    let ports = model.ports();
    validate_excitations(&options.excite_port_idxs, ports.len())?;
    let wavelengths_nm = resolve_wavelengths(model, options.wavelengths_nm.as_ref())?;
    let epsilon_r = model.epsilon_r(design_variable)?;
    let epsilon_r_bg = model.epsilon_r_bg();

    let excite = &options.excite_port_idxs;
    let omegas: Vec<f64> = wavelengths_nm.iter().map(|&nm| wavelength_nm_to_omega(nm)).collect();
    let tasks: Vec<(usize, usize)> = (0..excite.len())
        .flat_map(|e| (0..omegas.len()).map(move |w| (e, w)))
        .collect();

    let workers = match options.max_parallelism {
        Some(n) if n > 0 => n,
        _ => tasks.len(),
    };
    log::info!(
        "simulate: {} ports excited x {} wavelengths on {} workers",
        excite.len(),
        omegas.len(),
        workers
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| ModelError::WorkerPool(e.to_string()))?;

    let inputs = SharedInputs {
        ports,
        dl: model.dl(),
        npml: model.pml_width(),
        epsilon_r: epsilon_r.view(),
        epsilon_r_bg: epsilon_r_bg.view(),
    };

    let results: Vec<TaskOutput> = pool.install(|| {
        tasks
            .par_iter()
            .map(|&(e, w)| run_task(solver, &inputs, e, excite[e], w, omegas[w]))
            .collect::<Result<Vec<_>, ModelError>>()
    })?;

    let (nx, ny) = epsilon_r.dim();
    let mut sparams = Array3::<Complex64>::zeros((omegas.len(), excite.len(), ports.len()));
    let mut fields = Array4::<Complex64>::zeros((omegas.len(), excite.len(), nx, ny));
    for task in results {
        let (w, e) = (task.wavelength_slot, task.excite_slot);
        for (p, value) in task.row.into_iter().enumerate() {
            sparams[[w, e, p]] = value;
        }
        fields.slice_mut(s![w, e, .., ..]).assign(&task.ez);
    }

    Ok(SimulationOutput {
        wavelengths_nm,
        excite_port_idxs: excite.clone(),
        sparams,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::WaveguidePort;
    use crate::solver::FieldSolution;
    use crate::types::Direction;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Toy {
        density_bg: Array2<f64>,
        ports: Vec<Box<dyn Port>>,
        wavelengths: Vec<f64>,
    }

    impl Toy {
        fn new() -> Self {
            let ports: Vec<Box<dyn Port>> = vec![
                Box::new(WaveguidePort::new(4, 10, 8, 1, Direction::XPos, 1).unwrap()),
                Box::new(WaveguidePort::new(15, 10, 8, 1, Direction::XNeg, 1).unwrap()),
            ];
            Self {
                density_bg: Array2::ones((20, 20)),
                ports,
                wavelengths: vec![1550.0],
            }
        }
    }

    impl DeviceModel for Toy {
        fn shape(&self) -> (usize, usize) {
            (20, 20)
        }
        fn design_region_coords(&self) -> BoxCoords {
            BoxCoords::new(8, 8, 12, 14)
        }
        fn slab_permittivity(&self) -> f64 {
            12.0
        }
        fn cladding_permittivity(&self) -> f64 {
            2.0
        }
        fn density_bg(&self) -> ArrayView2<'_, f64> {
            self.density_bg.view()
        }
        fn dl(&self) -> f64 {
            100e-9
        }
        fn pml_width(&self) -> usize {
            2
        }
        fn ports(&self) -> &[Box<dyn Port>] {
            &self.ports
        }
        fn output_wavelengths(&self) -> &[f64] {
            &self.wavelengths
        }
    }

    /// Counts calls and returns a uniform field.
    struct CountingSolver {
        calls: AtomicUsize,
    }

    impl FieldSolver for CountingSolver {
        fn solve(
            &self,
            problem: &FieldProblem<'_>,
            _source: ArrayView2<'_, Complex64>,
        ) -> Result<FieldSolution, SolverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let dim = problem.epsilon_r.dim();
            Ok(FieldSolution {
                hx: Array2::zeros(dim),
                hy: Array2::from_elem(dim, Complex64::new(-1.0, 0.0)),
                ez: Array2::from_elem(dim, Complex64::new(problem.omega, 0.0)),
            })
        }

        fn method_name(&self) -> &str {
            "counting"
        }
    }

    struct FailingSolver;

    impl FieldSolver for FailingSolver {
        fn solve(
            &self,
            _problem: &FieldProblem<'_>,
            _source: ArrayView2<'_, Complex64>,
        ) -> Result<FieldSolution, SolverError> {
            Err(SolverError::ConvergenceFailure {
                residual: 1.0,
                tolerance: 1e-6,
            })
        }

        fn method_name(&self) -> &str {
            "failing"
        }
    }

    fn counting() -> CountingSolver {
        CountingSolver {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_density_and_permittivity() {
        let model = Toy::new();
        let design = Array2::<f64>::zeros((4, 6));
        let density = model.density(design.view()).unwrap();
        assert_eq!(density[[9, 9]], 0.0);
        assert_eq!(density[[0, 0]], 1.0);

        let eps = model.epsilon_r(design.view()).unwrap();
        assert_eq!(eps[[9, 9]], 2.0);
        assert_eq!(eps[[0, 0]], 12.0);
        assert!(model.epsilon_r_bg().iter().all(|&v| v == 12.0));

        let mask = model.design_region();
        assert_eq!(mask.iter().filter(|&&m| m).count(), 24);
        assert!(mask[[8, 8]] && !mask[[12, 8]]);
    }

    #[test]
    fn test_design_shape_is_validated() {
        let model = Toy::new();
        let wrong = Array2::<f64>::ones((4, 5));
        assert!(matches!(
            model.density(wrong.view()),
            Err(ModelError::DesignShape { got: (4, 5), expected: (4, 6) })
        ));
    }

    #[test]
    fn test_epsilon_r_vjp_scales_and_crops() {
        let model = Toy::new();
        let design = Array2::<f64>::zeros((4, 6));
        let cotangent = Array2::from_shape_fn((20, 20), |(i, j)| (i * 20 + j) as f64);
        let grad = model.epsilon_r_vjp(design.view(), cotangent.view()).unwrap();
        assert_eq!(grad.dim(), (4, 6));
        assert_eq!(grad[[0, 0]], cotangent[[8, 8]] * 10.0);
        assert_eq!(grad[[3, 5]], cotangent[[11, 13]] * 10.0);
    }

    #[test]
    fn test_excitation_validation() {
        assert!(matches!(validate_excitations(&[], 2), Err(ModelError::NoExcitation)));
        assert!(matches!(
            validate_excitations(&[0, 2], 2),
            Err(ModelError::PortIndexOutOfRange { index: 2, num_ports: 2 })
        ));
        assert!(matches!(
            validate_excitations(&[1, 1], 2),
            Err(ModelError::DuplicatePort(1))
        ));
        assert!(matches!(
            validate_excitations(&[1, 0], 2),
            Err(ModelError::UnsortedPorts(_))
        ));
        assert!(validate_excitations(&[0, 1], 2).is_ok());
    }

    #[test]
    fn test_wavelength_validation() {
        let model = Toy::new();
        assert_eq!(resolve_wavelengths(&model, None).unwrap(), vec![1550.0]);

        let rank2 = ArrayD::<f64>::ones(vec![2, 2]);
        assert!(matches!(
            resolve_wavelengths(&model, Some(&rank2)),
            Err(ModelError::WavelengthRank(2))
        ));
        let empty = ArrayD::<f64>::zeros(vec![0]);
        assert!(matches!(
            resolve_wavelengths(&model, Some(&empty)),
            Err(ModelError::NoWavelengths)
        ));
        let negative = ArrayD::from_shape_vec(vec![1], vec![-5.0]).unwrap();
        assert!(matches!(
            resolve_wavelengths(&model, Some(&negative)),
            Err(ModelError::InvalidWavelength(_))
        ));
    }

    #[test]
    fn test_validation_happens_before_dispatch() {
        let model = Toy::new();
        let solver = counting();
        let design = Array2::<f64>::ones((4, 6));
        let options = SimulateOptions::default().with_excitations(vec![1, 0]);
        assert!(simulate(&model, &solver, design.view(), &options).is_err());
        assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_results_are_keyed_by_slot() {
        let model = Toy::new();
        let solver = counting();
        let design = Array2::<f64>::ones((4, 6));
        let wavelengths = vec![1500.0, 1550.0, 1600.0];
        let options = SimulateOptions::default()
            .with_excitations(vec![0, 1])
            .with_wavelengths(wavelengths.clone())
            .with_max_parallelism(2);

        let out = simulate(&model, &solver, design.view(), &options).unwrap();
        assert_eq!(solver.calls.load(Ordering::SeqCst), 6);
        assert_eq!(out.sparams.dim(), (3, 2, 2));
        assert_eq!(out.fields.dim(), (3, 2, 20, 20));
        assert_eq!(out.wavelengths_nm, wavelengths);

        // The fake solver writes omega into Ez, so each slot must carry its own
        for (w, &nm) in wavelengths.iter().enumerate() {
            let omega = wavelength_nm_to_omega(nm);
            for e in 0..2 {
                assert_eq!(out.fields[[w, e, 0, 0]].re, omega);
            }
        }
    }

    #[test]
    fn test_task_failure_fails_the_call() {
        let model = Toy::new();
        let design = Array2::<f64>::ones((4, 6));
        let err = simulate(&model, &FailingSolver, design.view(), &SimulateOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::Solver(SolverError::ConvergenceFailure { .. })
        ));
    }
}
