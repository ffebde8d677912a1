use clap::Parser;
use fattree_rs::config::FabricConfig;
use fattree_rs::fabric::{MemoryFabric, Probe, Scenario};
use fattree_rs::install::install_plan;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    name = "fattree-probe",
    about = "Install a compiled plan into an in-memory fabric and run a fault scenario"
)]
struct Args {
    /// Pod count (even, >= 2)
    #[arg(long, default_value_t = 4)]
    k: usize,

    /// Hosts per edge switch
    #[arg(long, default_value_t = 2)]
    density: usize,

    /// JSON fabric config; overrides --k / --density
    #[arg(long)]
    config: Option<PathBuf>,

    /// bootstrap, node-failure, node-recovery, link-failure, link-recovery,
    /// partitioned-fabric or partitioned-fabric-plane
    #[arg(long, default_value = "bootstrap")]
    scenario: Scenario,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    let cfg = match &args.config {
        Some(path) => match FabricConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("error: {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => FabricConfig::new(args.k, args.density),
    };

    let compiled = match cfg.compile() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let fabric = Arc::new(MemoryFabric::for_topology(&compiled.topo));
    let report = install_plan(Arc::clone(&fabric), &compiled.plan, &cfg.install_opts()).await;
    if !report.is_complete() {
        for (sw, e) in &report.failed {
            eprintln!("install failed on {}: {e}", sw.node_name());
        }
        return ExitCode::FAILURE;
    }

    let mut probe = Probe::from_fabric(&compiled.topo, &compiled.addrs, &fabric);
    let result = args.scenario.run(&mut probe);

    if args.json {
        match serde_json::to_string(&result) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("error: failed to serialize report: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!(
            "scenario={} sent={} dropped={} loss={:.4}",
            result.scenario,
            result.ping.sent,
            result.ping.dropped,
            result.ping.loss_ratio()
        );
    }
    ExitCode::SUCCESS
}
