//! Simulation runner: ties together the layout, the design variable and the
//! field solver.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use inverso_core::solver::fdfd::FdfdEz;
use inverso_core::types::{power_db, SimulationOutput};
use inverso_core::{simulate, DeviceModel, SimulateOptions};
use inverso_geometry::LayoutModel;
use ndarray::Array2;
use serde::Serialize;

use crate::config::{DesignConfig, JobConfig};

/// Everything produced by one job.
pub struct RunOutput {
    pub model: LayoutModel,
    pub result: SimulationOutput,
}

/// One S-parameter entry, as written to JSON.
#[derive(Debug, Serialize)]
pub struct SparamRecord {
    pub wavelength_nm: f64,
    pub excite_port: usize,
    pub port: usize,
    pub re: f64,
    pub im: f64,
    pub magnitude: f64,
    pub db: f64,
}

/// Run a full simulation from a parsed job configuration.
pub fn run_simulation(job: &JobConfig) -> Result<RunOutput> {
    let model = LayoutModel::new(job.device.clone()).context("building device layout")?;
    let (nx, ny) = model.shape();
    log::info!(
        "Device: {}x{} cells, {} ports, design variable {:?}",
        nx,
        ny,
        model.ports().len(),
        model.design_variable_shape()
    );

    let design = load_design(&job.simulation.design, model.design_variable_shape())?;

    let mut options = SimulateOptions::default().with_excitations(job.simulation.excite_ports.clone());
    if let Some(spec) = &job.simulation.wavelengths {
        options = options.with_wavelengths(spec.values());
    }
    options.max_parallelism = job.simulation.max_parallelism;

    let solver = FdfdEz::default().with_residual_tolerance(job.simulation.residual_tolerance);
    let result = simulate(&model, &solver, design.view(), &options).context("simulating device")?;

    for record in sparam_records(&result) {
        log::info!(
            "lambda = {:.2} nm, port {} -> port {}: |S| = {:.4} ({:.2} dB)",
            record.wavelength_nm,
            record.excite_port,
            record.port,
            record.magnitude,
            record.db
        );
    }

    Ok(RunOutput { model, result })
}

/// Build the design variable from the job's design settings.
fn load_design(config: &DesignConfig, shape: (usize, usize)) -> Result<Array2<f64>> {
    let Some(file) = &config.file else {
        return Ok(Array2::from_elem(shape, config.fill));
    };

    let content = std::fs::read_to_string(file).with_context(|| format!("reading design file {file}"))?;
    let rows: Vec<Vec<f64>> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.split(',')
                .map(|v| v.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<_, _>>()
        .with_context(|| format!("parsing design file {file}"))?;

    let ncols = rows.first().map_or(0, Vec::len);
    if (rows.len(), ncols) != shape || rows.iter().any(|r| r.len() != ncols) {
        bail!(
            "design file {} must hold {}x{} values, one row per x cell",
            file,
            shape.0,
            shape.1
        );
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec(shape, flat)?)
}

/// Flatten the S-parameter array in (wavelength, excitation, port) order.
pub fn sparam_records(result: &SimulationOutput) -> Vec<SparamRecord> {
    result
        .sparams
        .indexed_iter()
        .map(|((w, e, p), s)| SparamRecord {
            wavelength_nm: result.wavelengths_nm[w],
            excite_port: result.excite_port_idxs[e],
            port: p,
            re: s.re,
            im: s.im,
            magnitude: s.norm(),
            db: power_db(*s),
        })
        .collect()
}

/// Write S-parameters to a CSV file with a metadata header.
pub fn write_sparams_csv(run: &RunOutput, path: &Path, job: &JobConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let (nx, ny) = run.model.shape();
    writeln!(file, "# Inverso FDFD: S-parameters")?;
    writeln!(file, "# grid: {}x{} cells at {} nm", nx, ny, job.device.resolution)?;
    writeln!(
        file,
        "# permittivity: cladding={}, slab={}",
        job.device.cladding_permittivity, job.device.slab_permittivity
    )?;
    for (i, port) in job.device.ports.iter().enumerate() {
        writeln!(
            file,
            "# port {}: centre=({}, {}) nm, width={} nm, direction={:?}, order={}",
            i, port.centre[0], port.centre[1], port.width, port.direction, port.order
        )?;
    }
    writeln!(file, "#")?;
    writeln!(file, "wavelength_nm,excite_port,port,re,im,magnitude,db")?;

    for r in sparam_records(&run.result) {
        writeln!(
            file,
            "{:.3},{},{},{:.8e},{:.8e},{:.8e},{:.4}",
            r.wavelength_nm, r.excite_port, r.port, r.re, r.im, r.magnitude, r.db
        )?;
    }

    log::info!("S-parameters written to: {}", path.display());
    Ok(())
}

/// Write S-parameters to a JSON file.
pub fn write_sparams_json(run: &RunOutput, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(&sparam_records(&run.result))
        .context("serialising S-parameters")?;
    std::fs::write(path, json)?;

    log::info!("S-parameters (JSON) written to: {}", path.display());
    Ok(())
}

/// Write Ez of every (wavelength, excitation) pair to CSV files in `dir`.
pub fn write_fields_csv(run: &RunOutput, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let result = &run.result;

    for (w, wavelength) in result.wavelengths_nm.iter().enumerate() {
        for (e, port) in result.excite_port_idxs.iter().enumerate() {
            let path = dir.join(format!("ez_port{port}_{wavelength:.0}nm.csv"));
            let mut file =
                std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            writeln!(file, "# Ez for excitation of port {} at {:.3} nm", port, wavelength)?;
            writeln!(file, "x,y,re,im")?;
            for ((x, y), v) in result.field(w, e).indexed_iter() {
                writeln!(file, "{},{},{:.8e},{:.8e}", x, y, v.re, v.im)?;
            }
            log::info!("Field written to: {}", path.display());
        }
    }
    Ok(())
}
