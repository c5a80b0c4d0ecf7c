use std::path::PathBuf;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use companion_core::{MetricType, MetricsConfig, Period, Permission, ViewRequest};
use companion_snapshot::{evaluate_loaded, load_snapshot_str};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ViewName {
    Dashboard,
    TodaysDoses,
    DoseProgress,
    NextDose,
    MedicationAdherence,
    VitalTrend,
    VitalAverage,
    VitalBuckets,
    ReadingsCount,
    UpcomingAppointments,
    UnreadMessages,
    ActiveCaregivers,
    CaregiversWithPermission,
    ConnectedDevices,
    ActiveMedications,
    SymptomFrequency,
    AverageMood,
}

#[derive(Parser, Debug)]
#[command(
    name = "companion-cli",
    about = "Evaluate health companion views over a snapshot JSON document."
)]
struct Args {
    /// Path to the snapshot JSON document.
    #[arg(short, long)]
    input: PathBuf,

    /// Path to a JSON metrics config. Missing fields keep their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Evaluation instant (RFC 3339). Defaults to the snapshot's own time.
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Views to evaluate, comma separated.
    #[arg(long, value_enum, value_delimiter = ',', default_value = "dashboard")]
    view: Vec<ViewName>,

    /// Vital for trend, average and bucket views.
    #[arg(long)]
    metric: Option<MetricType>,

    /// Reporting period: today, 7d, 30d, 3m or 6m.
    #[arg(long, default_value = "7d")]
    period: Period,

    /// Medication id for the adherence view.
    #[arg(long)]
    medication: Option<String>,

    /// Permission for the caregiver permission view, e.g. view_vitals.
    #[arg(long, value_parser = parse_permission)]
    permission: Option<Permission>,

    /// Log as JSON lines instead of human readable text.
    #[arg(long)]
    log_json: bool,
}

fn parse_permission(value: &str) -> Result<Permission, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown permission: {value}"))
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,companion_cli=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn build_requests(args: &Args) -> anyhow::Result<Vec<ViewRequest>> {
    let metric = || {
        args.metric
            .ok_or_else(|| anyhow!("--metric is required for vital views"))
    };
    let period = args.period;

    let mut requests = Vec::new();
    for view in &args.view {
        match view {
            ViewName::Dashboard => requests.extend(ViewRequest::dashboard()),
            ViewName::TodaysDoses => requests.push(ViewRequest::TodaysDoses),
            ViewName::DoseProgress => requests.push(ViewRequest::DoseProgress),
            ViewName::NextDose => requests.push(ViewRequest::NextDose),
            ViewName::MedicationAdherence => {
                let medication_id = args
                    .medication
                    .clone()
                    .ok_or_else(|| anyhow!("--medication is required for medication-adherence"))?;
                requests.push(ViewRequest::MedicationAdherence {
                    medication_id,
                    period,
                });
            }
            ViewName::VitalTrend => requests.push(ViewRequest::VitalTrend {
                metric: metric()?,
                period,
            }),
            ViewName::VitalAverage => requests.push(ViewRequest::VitalAverage {
                metric: metric()?,
                period,
            }),
            ViewName::VitalBuckets => requests.push(ViewRequest::VitalBuckets {
                metric: metric()?,
                period,
            }),
            ViewName::ReadingsCount => requests.push(ViewRequest::ReadingsCount { period }),
            ViewName::UpcomingAppointments => requests.push(ViewRequest::UpcomingAppointments),
            ViewName::UnreadMessages => requests.push(ViewRequest::UnreadMessages),
            ViewName::ActiveCaregivers => requests.push(ViewRequest::ActiveCaregivers),
            ViewName::CaregiversWithPermission => {
                let permission = args.permission.ok_or_else(|| {
                    anyhow!("--permission is required for caregivers-with-permission")
                })?;
                requests.push(ViewRequest::CaregiversWithPermission { permission });
            }
            ViewName::ConnectedDevices => requests.push(ViewRequest::ConnectedDevices),
            ViewName::ActiveMedications => requests.push(ViewRequest::ActiveMedications),
            ViewName::SymptomFrequency => requests.push(ViewRequest::SymptomFrequency { period }),
            ViewName::AverageMood => requests.push(ViewRequest::AverageMood { period }),
        }
    }
    Ok(requests)
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<MetricsConfig> {
    let Some(path) = path else {
        return Ok(MetricsConfig::default());
    };
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config file {path:?}"))?;
    serde_json::from_str(&data).with_context(|| format!("Invalid config file {path:?}"))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let config = load_config(args.config.as_ref())?;
    let requests = build_requests(&args)?;

    let data = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Cannot read file {:?}", args.input))?;
    let snapshot = load_snapshot_str(&data)?;
    info!(
        entities = snapshot.store.len(),
        skipped = snapshot.skipped,
        views = requests.len(),
        "snapshot loaded"
    );

    let results = evaluate_loaded(&snapshot, &requests, args.now, &config)?;
    println!("{}", serde_json::to_string_pretty(&results)?);

    Ok(())
}
