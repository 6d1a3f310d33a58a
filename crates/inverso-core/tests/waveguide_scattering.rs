//! End-to-end scattering checks on straight and kinked dielectric waveguides.
//!
//! A uniform waveguide crossing the domain must transmit the mode it is fed
//! with almost no reflection and must not couple between modes of opposite
//! parity. A kinked waveguide must have a symmetric |S| matrix.

use inverso_core::constants::C_0;
use inverso_core::solver::fdfd::FdfdEz;
use inverso_core::types::power_db;
use inverso_core::{
    simulate, BoxCoords, DeviceModel, Direction, Port, SimulateOptions, SimulationOutput,
    WaveguidePort,
};
use ndarray::{s, Array2, ArrayView2};

const SLAB: f64 = 12.0;
const DL: f64 = 25e-9;

/// Maximum reflection of a straight waveguide.
const MAX_REFLECTION_DB: f64 = -40.0;
/// Minimum transmission of a straight waveguide.
const MIN_TRANSMISSION_DB: f64 = -1e-3;
/// Maximum transmission between the fundamental and second-order modes.
const MAX_CROSS_MODE_DB: f64 = -200.0;
/// Maximum relative asymmetry of |S|.
const MAX_ASYMMETRY: f64 = 1e-4;

fn wavelength_nm() -> f64 {
    C_0 / 200e12 * 1e9
}

/// A fixed pixel map of slab and cladding with a small design region that
/// reproduces the background when given [`PixelDevice::matching_design`].
struct PixelDevice {
    density_bg: Array2<f64>,
    region: BoxCoords,
    npml: usize,
    ports: Vec<Box<dyn Port>>,
    wavelengths: Vec<f64>,
}

impl PixelDevice {
    fn new(density_bg: Array2<f64>, region: BoxCoords, npml: usize, ports: [WaveguidePort; 2]) -> Self {
        let ports = ports.into_iter().map(|p| Box::new(p) as Box<dyn Port>).collect();
        Self {
            density_bg,
            region,
            npml,
            ports,
            wavelengths: vec![wavelength_nm()],
        }
    }

    fn matching_design(&self) -> Array2<f64> {
        let r = self.region;
        self.density_bg
            .slice(s![r.x_min..r.x_max, r.y_min..r.y_max])
            .to_owned()
    }

    /// Excite both ports.
    fn run(&self) -> SimulationOutput {
        let design = self.matching_design();
        let options = SimulateOptions::default().with_excitations(vec![0, 1]);
        simulate(self, &FdfdEz::default(), design.view(), &options).expect("simulation should succeed")
    }
}

impl DeviceModel for PixelDevice {
    fn shape(&self) -> (usize, usize) {
        self.density_bg.dim()
    }

    fn design_region_coords(&self) -> BoxCoords {
        self.region
    }

    fn slab_permittivity(&self) -> f64 {
        SLAB
    }

    fn cladding_permittivity(&self) -> f64 {
        1.0
    }

    fn density_bg(&self) -> ArrayView2<'_, f64> {
        self.density_bg.view()
    }

    fn dl(&self) -> f64 {
        DL
    }

    fn pml_width(&self) -> usize {
        self.npml
    }

    fn ports(&self) -> &[Box<dyn Port>] {
        &self.ports
    }

    fn output_wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }
}

/// A straight waveguide of `wg_width` cells across an `n`x`n` domain with a
/// port at each end. `orders` are the mode orders of the near and far ports.
fn straight_waveguide(n: usize, wg_width: usize, along_x: bool, orders: [usize; 2]) -> PixelDevice {
    const NPML: usize = 20;
    const PADDING: usize = 20;
    const OFFSET: usize = 5;

    let centre = n / 2;
    let core = centre - wg_width / 2..centre + wg_width / 2;
    let mut density_bg = Array2::<f64>::zeros((n, n));
    if along_x {
        density_bg.slice_mut(s![.., core]).fill(1.0);
    } else {
        density_bg.slice_mut(s![core, ..]).fill(1.0);
    }

    let width = wg_width + 2 * PADDING;
    let near = NPML + 1;
    let far = n - NPML - 1;
    let (first, second) = if along_x {
        (
            WaveguidePort::new(near, centre, width, orders[0], Direction::XPos, OFFSET),
            WaveguidePort::new(far, centre, width, 1, Direction::XNeg, OFFSET),
        )
    } else {
        (
            WaveguidePort::new(centre, near, width, orders[0], Direction::YPos, OFFSET),
            WaveguidePort::new(centre, far, width, 1, Direction::YNeg, OFFSET),
        )
    };
    let ports = [first.unwrap(), second.unwrap().with_order(orders[1])];

    let region = BoxCoords::new(centre - 10, centre - 10, centre + 10, centre + 10);
    PixelDevice::new(density_bg, region, NPML, ports)
}

/// Two feed waveguides joined by a short transverse section, laterally
/// offset by `kink` cells. The transposed device runs along y.
fn kinked_waveguide(kink: usize, transpose: bool) -> PixelDevice {
    const NPML: usize = 10;
    const FEED: usize = 24;
    const SECTION: usize = 12;
    const WG: usize = 12;
    const PADDING: usize = 24;
    const PML_GAP: usize = 2;
    const OFFSET: usize = 1;

    let nx = 2 * NPML + SECTION + 2 * FEED;
    let ny = 2 * NPML + kink + WG + 2 * PADDING;
    let lo = NPML + PADDING;
    let mut density_bg = Array2::<f64>::zeros((nx, ny));
    density_bg.slice_mut(s![..NPML + FEED, lo..lo + WG]).fill(1.0);
    density_bg
        .slice_mut(s![nx - NPML - FEED.., lo + kink..lo + kink + WG])
        .fill(1.0);
    density_bg
        .slice_mut(s![NPML + FEED..NPML + FEED + SECTION, lo..lo + kink + WG])
        .fill(1.0);

    let width = WG + 2 * PADDING;
    let mut p1 = (NPML + PML_GAP, lo + WG / 2);
    let mut p2 = (nx - NPML - PML_GAP, lo + WG / 2 + kink);
    let mut dirs = (Direction::XPos, Direction::XNeg);
    if transpose {
        p1 = (p1.1, p1.0);
        p2 = (p2.1, p2.0);
        dirs = (Direction::YPos, Direction::YNeg);
        density_bg = density_bg.reversed_axes().as_standard_layout().to_owned();
    }

    let ports = [
        WaveguidePort::new(p1.0, p1.1, width, 1, dirs.0, OFFSET).unwrap(),
        WaveguidePort::new(p2.0, p2.1, width, 1, dirs.1, OFFSET).unwrap(),
    ];
    PixelDevice::new(density_bg, BoxCoords::new(30, 30, 40, 40), NPML, ports)
}

/// Reflection and transmission of each excitation of a two-port run.
fn check_straight_transmission(out: &SimulationOutput) {
    for e in 0..2 {
        let reflection = power_db(out.sparams[[0, e, e]]);
        let transmission = power_db(out.sparams[[0, e, 1 - e]]);
        assert!(reflection < MAX_REFLECTION_DB, "port {e}: reflection {reflection:.2} dB");
        assert!(
            transmission > MIN_TRANSMISSION_DB,
            "port {e}: transmission {transmission:.2e} dB"
        );
    }
}

fn check_cross_mode(along_x: bool) {
    let out = straight_waveguide(130, 20, along_x, [1, 2]).run();
    for e in 0..2 {
        let reflection = power_db(out.sparams[[0, e, e]]);
        let cross = power_db(out.sparams[[0, e, 1 - e]]);
        assert!(reflection < MAX_REFLECTION_DB, "port {e}: reflection {reflection:.2} dB");
        assert!(cross < MAX_CROSS_MODE_DB, "port {e}: cross-mode transmission {cross:.1} dB");
    }
}

fn asymmetry(out: &SimulationOutput) -> f64 {
    let magnitude = out.sparam_matrix(0).mapv(|s| s.norm());
    let diff = &magnitude - &magnitude.t();
    let frobenius = |a: &Array2<f64>| a.iter().map(|v| v * v).sum::<f64>().sqrt();
    frobenius(&diff) / frobenius(&magnitude)
}

fn check_kink_reciprocity(transpose: bool) {
    for kink in [0, 8, 16, 24, 32] {
        let device = kinked_waveguide(kink, transpose);
        let out = device.run();
        assert_eq!(out.sparams.dim(), (1, 2, 2));
        let err = asymmetry(&out);
        assert!(err < MAX_ASYMMETRY, "kink of {kink} cells: asymmetry {err:.2e}");
    }
}

#[test]
fn test_fundamental_mode_along_x() {
    let device = straight_waveguide(100, 10, true, [1, 1]);
    let out = device.run();
    assert_eq!(out.sparams.dim(), (1, 2, 2));
    assert_eq!(out.fields.dim(), (1, 2, 100, 100));
    check_straight_transmission(&out);
}

#[test]
fn test_fundamental_mode_along_y() {
    check_straight_transmission(&straight_waveguide(100, 10, false, [1, 1]).run());
}

#[test]
fn test_second_order_mode_along_x() {
    check_straight_transmission(&straight_waveguide(130, 20, true, [2, 2]).run());
}

#[test]
fn test_second_order_mode_along_y() {
    check_straight_transmission(&straight_waveguide(130, 20, false, [2, 2]).run());
}

#[test]
fn test_no_coupling_between_mode_orders_along_x() {
    check_cross_mode(true);
}

#[test]
fn test_no_coupling_between_mode_orders_along_y() {
    check_cross_mode(false);
}

#[test]
fn test_kinked_waveguide_is_reciprocal() {
    check_kink_reciprocity(false);
}

#[test]
fn test_transposed_kinked_waveguide_is_reciprocal() {
    check_kink_reciprocity(true);
}
