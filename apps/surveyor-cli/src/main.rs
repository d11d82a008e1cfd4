//! Damage surveyor command line
//!
//! Drives the assessment workflow against the configured inference service
//! and hosted store. Endpoints come from `SURVEYOR_API_URL`,
//! `SURVEYOR_STORE_URL` and `SURVEYOR_STORE_KEY`, optionally loaded from a
//! `.env` file. The signed-in session is kept in the user data directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use surveyor_remote::RemoteConfig;
use surveyor_types::NewCar;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod commands;
mod session_file;

use app::App;
use commands::{CarFiles, Click, CloseUps, Dimensions, Fit, Point};
use session_file::SessionFile;

#[derive(Parser, Debug)]
#[command(name = "surveyor")]
#[command(version, about = "Vehicle damage assessment from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Where the signed-in session is kept
    #[arg(long, global = true, env = "SURVEYOR_SESSION_FILE")]
    session_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in with email and password
    Login {
        email: String,
        #[arg(long, env = "SURVEYOR_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account
    Signup {
        email: String,
        #[arg(long, env = "SURVEYOR_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and forget the saved session
    Logout,

    /// Show where a path would lead for the current session
    Route { path: String },

    /// Upload a car photo for analysis
    Scan {
        image: PathBuf,
        /// Car model, e.g. "Honda City"
        #[arg(long)]
        car: String,
    },

    /// List your scans, newest first
    Dashboard,

    /// Cost breakdown of a scan
    Report { scan_id: String },

    /// Add, delete or verify damages on a scan
    Damage {
        #[command(subcommand)]
        action: DamageCommand,
    },

    /// Cars in the garage
    Garage {
        #[command(subcommand)]
        action: GarageCommand,
    },

    /// File an insurance claim for a scan
    Claim { scan_id: String },
}

#[derive(Subcommand, Debug)]
enum DamageCommand {
    /// Mark a damage the model missed
    Add {
        scan_id: String,
        /// Dent, Scratch, Paint Chip, Crack or Other
        #[arg(long = "type")]
        damage_type: String,
        /// Car part, e.g. "Front Bumper"
        #[arg(long)]
        part: String,
        #[arg(long)]
        notes: Option<String>,
        /// Click location as X,Y within the frame
        #[arg(long)]
        at: Option<Point>,
        /// Size of the frame the image is shown in
        #[arg(long, default_value = "800x600")]
        frame: Dimensions,
        /// Pixel size of the image, defaults to the frame size
        #[arg(long)]
        natural: Option<Dimensions>,
        #[arg(long, value_enum, default_value = "contain")]
        fit: Fit,
    },

    /// Delete a damage and update the scan totals
    Delete { scan_id: String, damage_id: String },

    /// Refine a damage with three close-up photos
    Verify {
        scan_id: String,
        damage_id: String,
        #[arg(long)]
        left: PathBuf,
        #[arg(long)]
        center: PathBuf,
        #[arg(long)]
        right: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum GarageCommand {
    /// List cars
    List,

    /// Register a car
    Add {
        /// Model name, e.g. "Maruti Swift"
        model: String,
        /// Registration number
        reg: String,
        /// Photo of the car
        #[arg(long)]
        photo: Option<PathBuf>,
        /// Insurance document, any file type
        #[arg(long)]
        insurance: Option<PathBuf>,
        /// Registration certificate, any file type
        #[arg(long)]
        rc: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr so command output stays clean
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let sessions = match cli.session_file {
        Some(path) => SessionFile::new(path),
        None => SessionFile::default_location()?,
    };
    tracing::debug!(path = %sessions.path().display(), "Session file");

    let mut app = App::load(RemoteConfig::from_env()?, sessions)?;

    match cli.command {
        Commands::Login { email, password } => commands::login(&mut app, &email, &password).await,
        Commands::Signup { email, password } => {
            commands::signup(&mut app, &email, &password).await
        }
        Commands::Logout => commands::logout(&mut app).await,
        Commands::Route { path } => commands::route(&app, &path),
        Commands::Scan { image, car } => commands::scan(&app, &image, &car).await,
        Commands::Dashboard => commands::dashboard(&app).await,
        Commands::Report { scan_id } => commands::report(&app, &scan_id).await,
        Commands::Damage { action } => match action {
            DamageCommand::Add {
                scan_id,
                damage_type,
                part,
                notes,
                at,
                frame,
                natural,
                fit,
            } => {
                let click = at.map(|at| Click {
                    at,
                    frame,
                    natural,
                    fit,
                });
                let draft = commands::mark(&damage_type, &part, notes.as_deref(), click)?;
                commands::add_damage(&app, &scan_id, draft).await
            }
            DamageCommand::Delete { scan_id, damage_id } => {
                commands::delete_damage(&app, &scan_id, &damage_id).await
            }
            DamageCommand::Verify {
                scan_id,
                damage_id,
                left,
                center,
                right,
            } => {
                let photos = CloseUps {
                    left,
                    center,
                    right,
                };
                commands::verify_damage(&app, &scan_id, &damage_id, photos).await
            }
        },
        Commands::Garage { action } => match action {
            GarageCommand::List => commands::list_cars(&app).await,
            GarageCommand::Add {
                model,
                reg,
                photo,
                insurance,
                rc,
            } => {
                let files = CarFiles {
                    photo,
                    insurance,
                    rc,
                };
                commands::add_car(&app, NewCar::new(model, reg), files).await
            }
        },
        Commands::Claim { scan_id } => commands::claim(&app, &scan_id).await,
    }
}
