//! Inverso command-line interface.
//!
//! Run device simulations from TOML job files:
//! ```sh
//! inverso run job.toml
//! inverso validate job.toml
//! inverso ports job.toml
//! ```

mod config;
mod runner;

use anyhow::Context;
use clap::{Parser, Subcommand};
use inverso_core::constants::wavelength_nm_to_omega;
use inverso_core::DeviceModel;
use inverso_geometry::LayoutModel;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "inverso")]
#[command(about = "Inverso: planar photonic device simulation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation from a TOML job file.
    Run {
        /// Path to the job file.
        config: PathBuf,
        /// Output directory (overrides job file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check that a job file parses and its layout fits the grid.
    Validate {
        /// Path to the job file.
        config: PathBuf,
    },
    /// Show the resolved ports and their mode indices.
    Ports {
        /// Path to the job file.
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            let job = config::load_config(&config)?;
            log::info!("Configuration: {}", config.display());

            let run = runner::run_simulation(&job)?;

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            if job.output.save_sparams {
                runner::write_sparams_csv(&run, &out_dir.join("sparams.csv"), &job)?;
            }
            if job.output.save_json {
                runner::write_sparams_json(&run, &out_dir.join("sparams.json"))?;
            }
            if job.output.save_fields {
                runner::write_fields_csv(&run, &out_dir.join("fields"))?;
            }

            println!("Simulation complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let model = LayoutModel::new(job.device).context("building device layout")?;
            let (nx, ny) = model.shape();
            println!("Configuration is valid: {}", config.display());
            println!("  grid:          {}x{} cells", nx, ny);
            println!("  design region: {:?}", model.design_region_coords());
            println!("  ports:         {}", model.ports().len());
            Ok(())
        }
        Commands::Ports { config } => {
            let job = config::load_config(&config)?;
            let model = LayoutModel::new(job.device).context("building device layout")?;
            let eps_bg = model.epsilon_r_bg();

            for (i, port) in model.ports().iter().enumerate() {
                let slice = port.slice();
                println!(
                    "port {}: cell ({}, {}), width {}, direction {:?}, monitor offset {}",
                    i,
                    slice.x,
                    slice.y,
                    slice.width,
                    slice.dir,
                    port.signed_offset()
                );
                let eps_slice: ndarray::Array1<f64> =
                    port.coords().iter().map(|&(x, y)| eps_bg[[x, y]]).collect();
                for &wavelength in model.output_wavelengths() {
                    let omega = wavelength_nm_to_omega(wavelength);
                    let mode = port
                        .field_profiles(eps_slice.view(), omega, model.dl())
                        .with_context(|| format!("solving the mode of port {i}"))?;
                    let n_eff = mode.effective_index(omega);
                    let guided = if n_eff > 1.0 { "guided" } else { "not guided" };
                    println!("    {:.2} nm: n_eff = {:.5} ({})", wavelength, n_eff, guided);
                }
            }
            Ok(())
        }
    }
}
