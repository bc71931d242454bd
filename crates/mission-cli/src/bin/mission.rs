//! Mission - command line dashboard for drone missions.
//!
//! Usage:
//!   mission list
//!   mission upload survey.kml --name "Harbour survey"
//!   mission show --mission 3 --out scene.geojson
//!   mission parse survey.kml

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use mission_cli::{CliConfig, Dashboard, SelectedFile};
use mission_core::map::{InMemoryMapFactory, MapSettings, MapView};
use mission_core::models::{MissionId, Waypoint};
use mission_core::{derive_geometry, parse_kml};
use mission_sdk::MissionClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Mission API base URL (defaults to MISSION_API_BASE_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored missions
    List,
    /// Upload a KML file as a new mission
    Upload {
        file: PathBuf,
        /// Mission name
        #[arg(long)]
        name: String,
    },
    /// Render a mission onto the map and export the scene as GeoJSON
    Show {
        /// Mission to show (defaults to the first one)
        #[arg(long)]
        mission: Option<MissionId>,
        /// Map access token (defaults to MAPBOX_TOKEN)
        #[arg(long)]
        token: Option<String>,
        /// Write the scene here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Parse a KML file locally without uploading it
    Parse { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mission_cli=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = CliConfig::from_env();
    let client = MissionClient::new(args.api_url.unwrap_or(config.api_base_url.clone()));

    match args.command {
        Command::List => list(&client).await,
        Command::Upload { file, name } => upload(&client, &file, &name).await,
        Command::Show {
            mission,
            token,
            out,
        } => {
            let token = token.or(config.access_token);
            show(&client, mission, token.as_deref(), out.as_deref()).await
        }
        Command::Parse { file } => parse(&file),
    }
}

fn dashboard() -> Dashboard<InMemoryMapFactory> {
    Dashboard::new(MapView::new(
        InMemoryMapFactory::default(),
        MapSettings::default(),
    ))
}

async fn list(client: &MissionClient) -> Result<()> {
    let mut dashboard = dashboard();
    dashboard.load_missions(client).await;
    if let Some(error) = dashboard.error() {
        anyhow::bail!("{}", error);
    }

    if dashboard.missions().is_empty() {
        println!("No missions yet.");
        return Ok(());
    }
    println!("{:>6}  {:>9}  NAME", "ID", "WAYPOINTS");
    for mission in dashboard.missions() {
        let count = mission
            .waypoint_count
            .unwrap_or_else(|| mission.waypoints().len());
        println!("{:>6}  {:>9}  {}", mission.id, count, mission.name);
    }
    Ok(())
}

async fn upload(client: &MissionClient, file: &Path, name: &str) -> Result<()> {
    let content = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut dashboard = dashboard();
    dashboard.open_upload();
    let form = dashboard.upload_form_mut();
    form.select_file(Some(SelectedFile { file_name, content }));
    form.set_mission_name(name);
    dashboard.upload(client).await;

    let form = dashboard.upload_form();
    if let Some(error) = form.error() {
        anyhow::bail!("Error: {}", error);
    }
    if let Some(mission) = form.created() {
        println!(
            "Success! Mission \"{}\" created successfully with ID: {}",
            mission.name, mission.id
        );
    }
    println!("Extracted Waypoints ({})", form.waypoints().len());
    for waypoint in form.waypoints() {
        println!("  {}", describe(waypoint));
    }
    Ok(())
}

async fn show(
    client: &MissionClient,
    mission: Option<MissionId>,
    token: Option<&str>,
    out: Option<&Path>,
) -> Result<()> {
    let mut dashboard = dashboard();
    dashboard.mount_map(token);
    // The in-memory surface has no style to fetch; it is loaded once created.
    dashboard.handle_map_load();

    if let Some(message) = dashboard.map().error_message() {
        eprintln!("{}", message);
        return Ok(());
    }

    dashboard.load_missions(client).await;
    if let Some(error) = dashboard.error() {
        anyhow::bail!("{}", error);
    }
    if let Some(id) = mission {
        dashboard.select_mission(id);
    }

    let Some(active) = dashboard.active_mission() else {
        eprintln!("No mission to show.");
        return Ok(());
    };
    eprintln!(
        "Showing mission {} ({}) with {} waypoints",
        active.id,
        active.name,
        active.waypoints().len()
    );

    let Some(surface) = dashboard.map().surface() else {
        return Ok(());
    };
    let scene = serde_json::to_string_pretty(&surface.to_geojson())?;
    match out {
        Some(path) => {
            std::fs::write(path, scene).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Scene written to {}", path.display());
        }
        None => println!("{}", scene),
    }
    Ok(())
}

fn parse(file: &Path) -> Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let parsed = parse_kml(&content)?;

    let waypoints: Vec<Waypoint> = parsed
        .into_iter()
        .enumerate()
        .map(|(i, waypoint)| waypoint.into_waypoint(i as i64 + 1, 0))
        .collect();
    let geometry = derive_geometry(&waypoints);

    println!("Extracted Waypoints ({})", waypoints.len());
    for waypoint in &waypoints {
        println!("  {}", describe(waypoint));
    }
    if let Some(bounds) = geometry.bounds {
        let center = bounds.center();
        println!(
            "Bounds: [{:.6}, {:.6}] - [{:.6}, {:.6}], center {:.6}, {:.6}",
            bounds.south_west.lng,
            bounds.south_west.lat,
            bounds.north_east.lng,
            bounds.north_east.lat,
            center.lng,
            center.lat
        );
    }
    Ok(())
}

fn describe(waypoint: &Waypoint) -> String {
    let mut line = format!(
        "Waypoint {}: Lat: {:.6}, Lng: {:.6}",
        waypoint.index, waypoint.latitude, waypoint.longitude
    );
    if let Some(altitude) = waypoint.altitude {
        line.push_str(&format!(", Alt: {:.2}m", altitude));
    }
    line
}
