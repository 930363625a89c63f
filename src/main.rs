use std::time::Duration;

use clap::Parser;
use dotenv::dotenv;
use pingmon::{
    config::Config,
    history::History,
    manager::Manager,
    probe::ProbeMode,
    status::{self, SparkPoint},
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Target host or address (overrides the config file)
    #[arg(short, long)]
    target: Option<String>,

    /// Probe mode, "echo" or "connect" (overrides the config file)
    #[arg(short = 'm', long)]
    probe_mode: Option<ProbeMode>,

    /// Seconds between probes
    #[arg(short, long, default_value_t = 1.0)]
    interval: f64,

    /// Per-probe timeout in seconds
    #[arg(long, default_value_t = 2.0)]
    timeout: f64,

    /// Number of samples retained in history
    #[arg(long, default_value_t = 60)]
    capacity: usize,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("pingmon", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = Config::load();
    let target = args.target.unwrap_or(config.target);
    let mode = args.probe_mode.unwrap_or(config.probe_mode);

    let manager = Manager::new(
        &target,
        Duration::from_secs_f64(args.interval.max(0.0)),
        Duration::from_secs_f64(args.timeout.max(0.0)),
        mode,
        args.capacity,
    );
    let history = manager.history();
    let mut results = manager
        .take_results()
        .expect("fresh manager always yields a receiver");

    manager.start().await;
    info!("probing {target} via {mode} every {}s", args.interval);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            sample = results.recv() => match sample {
                Some(sample) => report(&history, &sample),
                None => break,
            },
        }
    }

    info!("shutting down");
    manager.stop().await;
    Ok(())
}

/// Log one settled sample together with the derived status and a
/// textual sparkline of the plotted window.
fn report(history: &History, sample: &pingmon::Sample) {
    let level = status::derive_level(&history.latest(status::LEVEL_WINDOW), None);
    let spark = render_spark(&status::sparkline(&history.snapshot()));

    if sample.failed {
        info!("FAIL ({})  {spark}  [{level:?}]", sample.description);
    } else {
        info!("{:>4} ms  {spark}  [{level:?}]", sample.latency.as_millis());
    }
}

/// Eight-step vertical bars, worst on top; failures render as '×'.
fn render_spark(points: &[SparkPoint]) -> String {
    const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    points
        .iter()
        .map(|point| {
            if point.failed {
                '×'
            } else {
                let step = (point.position * (BARS.len() - 1) as f64).round() as usize;
                BARS[step.min(BARS.len() - 1)]
            }
        })
        .collect()
}
