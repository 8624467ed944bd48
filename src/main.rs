//! SpinRide - indoor bike workout recorder
//!
//! Main entry point for the command-line application.

use anyhow::{bail, Context, Result};
use clap::Parser;
use spinride::integrations::strava::{StravaClient, StravaToken};
use spinride::recording::exporter_tcx::{export_tcx, tcx_filename, write_tcx};
use spinride::recording::{SessionSnapshot, WorkoutSession, WorkoutSummary};
use spinride::sensors::manager::select_sensor;
use spinride::sensors::{SensorEvent, SensorKind, SensorManager};
use spinride::storage::config::{self, AppConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

use cli::{Cli, Commands};

/// How often the ride loop logs a status line.
const STATUS_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SpinRide v{}", env!("CARGO_PKG_VERSION"));

    match cli.cmd {
        Commands::Ride { duration_secs } => {
            let config = load(cli.config.as_ref())?;
            ride(&config, duration_secs.map(Duration::from_secs)).await
        }
        Commands::StravaAuth => {
            let config = load(cli.config.as_ref())?;
            let client = StravaClient::new(&config.strava)?;
            println!("Open this URL and approve access:\n{}", client.authorize_url()?);
            println!("Then run: spinride strava-token --code <code from the redirect URL>");
            Ok(())
        }
        Commands::StravaToken { code } => {
            let config = load(cli.config.as_ref())?;
            let client = StravaClient::new(&config.strava)?;
            let token = client
                .exchange_code(&code)
                .await
                .context("Strava token exchange failed")?;
            let path = config.strava_token_path();
            token.save(&path)?;
            println!("Strava token stored in {}", path.display());
            Ok(())
        }
        Commands::Config { init } => {
            let path = cli.config.unwrap_or_else(config::get_config_path);
            if init {
                if path.exists() {
                    println!("Config already exists: {}", path.display());
                } else {
                    config::save_config_to(&AppConfig::default(), &path)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Wrote default config to {}", path.display());
                }
            } else {
                println!("{}", path.display());
            }
            Ok(())
        }
    }
}

fn load(path: Option<&PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    config.context("loading configuration")
}

async fn ride(config: &AppConfig, duration: Option<Duration>) -> Result<()> {
    let sensor_config = config.sensors.to_sensor_config();
    let mut manager = SensorManager::new(sensor_config.clone());
    let events = manager.event_receiver();
    manager
        .initialize()
        .await
        .context("Bluetooth initialization failed")?;

    std::thread::spawn(move || {
        for event in events.iter() {
            log_sensor_event(&event);
        }
    });

    let mut kinds = vec![SensorKind::Bike];
    if config.sensors.heart_rate_monitor {
        kinds.push(SensorKind::HeartRate);
    }
    let found = manager
        .discover(sensor_config.discovery_timeout, &kinds)
        .await?;

    let name_filter = config.sensors.bike_name_filter.as_deref();
    let Some(bike) = select_sensor(&found, SensorKind::Bike, name_filter) else {
        bail!("No FTMS bike found");
    };

    let session = WorkoutSession::spawn(config.session.to_session_config());
    manager.connect_bike(&bike.device_id, session.clone()).await?;

    if let Some(monitor) = select_sensor(&found, SensorKind::HeartRate, None) {
        if let Err(e) = manager
            .connect_heart_rate(&monitor.device_id, session.clone())
            .await
        {
            tracing::warn!("Riding without heart rate: {}", e);
        }
    }

    session.start().await?;
    println!("Recording. Press Ctrl-C to finish.");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let time_limit = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(time_limit);
    let mut status = tokio::time::interval(STATUS_INTERVAL);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    tracing::error!("Ctrl-C handler failed: {}", e);
                }
                break;
            }
            _ = &mut time_limit => break,
            _ = status.tick() => log_status(&session.snapshot()),
        }
    }

    let last = session.stop().await?;
    manager.shutdown().await;
    session.shutdown();

    let Some(summary) = WorkoutSummary::from_snapshot(&last, Some(&config.profile), &config.calories)
    else {
        bail!("Session never started");
    };
    print_summary(&summary);

    if summary.history.is_empty() {
        println!("Nothing recorded, no file written.");
        return Ok(());
    }

    let path = config.rides_dir().join(tcx_filename(&summary));
    write_tcx(&summary, &path).context("TCX export failed")?;
    println!("Saved {}", path.display());

    if config.strava.upload_after_ride {
        if let Err(e) = upload(config, &summary).await {
            tracing::warn!("Strava upload skipped: {:#}", e);
        }
    }

    Ok(())
}

async fn upload(config: &AppConfig, summary: &WorkoutSummary) -> Result<()> {
    let client = StravaClient::new(&config.strava)?;
    let token: StravaToken = client.ensure_token(&config.strava_token_path()).await?;
    let tcx = export_tcx(summary)?;
    let name = format!("Indoor ride {}", summary.started_at.format("%Y-%m-%d %H:%M"));
    let upload = client.upload_tcx(&token, tcx.into_bytes(), &name).await?;
    println!("Uploaded to Strava (upload id {})", upload.id);
    Ok(())
}

fn log_sensor_event(event: &SensorEvent) {
    match event {
        SensorEvent::Discovered(sensor) => {
            tracing::debug!("Found {} '{}' rssi={:?}", sensor.kind, sensor.name, sensor.signal_strength)
        }
        SensorEvent::ConnectionChanged { device_id, kind, state } => {
            tracing::info!("{} {}: {}", kind, device_id, state)
        }
        SensorEvent::ResistanceRange { min, max, step, .. } => {
            tracing::info!("Resistance range {}..{} step {}", min, max, step)
        }
        SensorEvent::ScanStarted => tracing::debug!("Scan started"),
        SensorEvent::ScanStopped => tracing::debug!("Scan stopped"),
        SensorEvent::Error(message) => tracing::error!("Sensor error: {}", message),
    }
}

fn log_status(snapshot: &SessionSnapshot) {
    fn show<T: std::fmt::Display>(value: Option<T>) -> String {
        value.map_or_else(|| "--".to_string(), |v| v.to_string())
    }

    tracing::info!(
        "{}s | {} W | {} km/h | {} rpm | {} bpm | resistance {} | {:.2} km",
        snapshot.elapsed_secs,
        show(snapshot.power_watts.map(|p| p.round())),
        show(snapshot.speed_kmh.map(|s| format!("{:.1}", s))),
        show(snapshot.cadence_rpm.map(|c| c.round())),
        show(snapshot.heart_rate_bpm),
        snapshot.resistance_label(),
        snapshot.distance_km,
    );
}

fn print_summary(summary: &WorkoutSummary) {
    let minutes = summary.elapsed_secs / 60;
    let seconds = summary.elapsed_secs % 60;
    println!("Workout summary");
    println!("  Time:          {}:{:02}", minutes, seconds);
    println!("  Distance:      {:.2} km", summary.distance_km);
    println!("  Avg power:     {:.0} W", summary.avg_power_watts);
    println!("  Max power:     {:.0} W", summary.top_power_watts);
    println!("  Max speed:     {:.1} km/h", summary.top_speed_kmh);
    if let Some(bpm) = summary.top_heart_rate_bpm {
        println!("  Max HR:        {} bpm", bpm);
    }
    println!("  Work:          {:.1} kJ", summary.total_kj);
    println!("  Calories:      {:.0} kcal", summary.estimated_kcal);
}
