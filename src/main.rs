use anyhow::{bail, Context};
use clap::Parser;
use route_adapter::{
    sdk::routing::provider::{HttpEngine, HttpEngineConfig},
    sdk::util::log::init_logging,
    ExecutionMode, ReplyState, RouteCoordinator, RouteRequest, Waypoint,
};
use std::{fs::File, io::Write, path::PathBuf, time::Duration};

/// Computes a route through a routing daemon and writes it as JSON
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Start of the route as "lat,lon" (e.g., "52.5,13.4")
    #[arg(short, long)]
    from: Waypoint,

    /// End of the route as "lat,lon"
    #[arg(short, long)]
    to: Waypoint,

    /// Intermediate waypoints, in order
    #[arg(long)]
    via: Vec<Waypoint>,

    /// Run the engine call on a background worker
    #[arg(long)]
    background: bool,

    /// [Optional] Give up after this many seconds (background mode only)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Where to write the routes
    #[arg(short, long, default_value = "routes.json")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let engine_config = HttpEngineConfig::from_env()?;
    log::info!("Routing through {}", engine_config.base_url);
    let engine = HttpEngine::new(&engine_config)?;

    let mode = if cli.background {
        ExecutionMode::Background
    } else {
        ExecutionMode::Inline
    };
    let coordinator = RouteCoordinator::new(engine, mode);

    let mut waypoints = vec![cli.from];
    waypoints.extend(cli.via.iter().copied());
    waypoints.push(cli.to);
    let request = RouteRequest::new(waypoints)?;

    let reply = coordinator.calculate_route(request);
    let state = match cli.timeout_secs {
        Some(secs) => {
            let state = reply.wait_timeout(Duration::from_secs(secs));
            if state == ReplyState::Pending {
                log::warn!("No result after {}s, aborting", secs);
                reply.abort();
            }
            reply.state()
        }
        None => reply.wait(),
    };

    let routes = match state {
        ReplyState::Finished => reply.routes().unwrap_or_default(),
        _ => {
            let message = reply
                .error()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| format!("{:?}", state));
            bail!("Routing failed: {}", message);
        }
    };

    for (i, route) in routes.iter().enumerate() {
        log::info!(
            "Route {}: {:.1} km, {:.2} hrs, {} points",
            i,
            route.distance_km(),
            route.duration_hours(),
            route.path.len()
        );
    }

    let json_output = serde_json::to_string_pretty(routes)?;
    let mut file = File::create(&cli.output)
        .with_context(|| format!("Failed to create {}", cli.output.display()))?;
    file.write_all(json_output.as_bytes())?;
    log::info!("Routes written to {}", cli.output.display());

    Ok(())
}
