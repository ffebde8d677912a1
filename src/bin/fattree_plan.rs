use clap::{Parser, ValueEnum};
use fattree_rs::config::FabricConfig;
use fattree_rs::install::{OfctlInstaller, install_plan};
use fattree_rs::routing::{ShapeSupport, UplinkPolicy};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Ofctl,
}

#[derive(Debug, Parser)]
#[command(
    name = "fattree-plan",
    about = "Compile proactive forwarding rules for a k-ary fat-tree"
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

    /// Only accept the k=4 / k=8 reference shapes
    #[arg(long)]
    reference_shapes: bool,

    /// Compile downstream rules only
    #[arg(long)]
    no_uplink: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Write the plan here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Push the plan to the live switches with ovs-ofctl
    #[arg(long)]
    apply: bool,

    /// Set every bridge to OpenFlow13 before applying
    #[arg(long)]
    ovs_protocol13: bool,
}

fn render_text(cfg: &FabricConfig, compiled: &fattree_rs::config::CompiledFabric) -> String {
    let topo = &compiled.topo;
    let mut out = format!(
        "fat-tree k={} density={}: core={} agg={} edge={} hosts={} rules={}\n",
        cfg.k,
        cfg.density,
        topo.core_count(),
        topo.agg_count(),
        topo.edge_count(),
        topo.host_count(),
        compiled.plan.total_rules()
    );
    for table in compiled.plan.iter() {
        out.push_str(&format!(
            "{} ({}): {} rules\n",
            table.switch.node_name(),
            table.switch,
            table.len()
        ));
        for rule in &table.rules {
            out.push_str(&format!("  {rule}\n"));
        }
    }
    out
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

    let mut cfg = match &args.config {
        Some(path) => match FabricConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("error: {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => FabricConfig::new(args.k, args.density),
    };
    if args.reference_shapes {
        cfg.shapes = ShapeSupport::Reference;
    }
    if args.no_uplink {
        cfg.uplink = UplinkPolicy::None;
    }

    let compiled = match cfg.compile() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let rendered = match args.format {
        Format::Text => render_text(&cfg, &compiled),
        Format::Ofctl => compiled.plan.to_ofctl(),
        Format::Json => match serde_json::to_string_pretty(&compiled.plan) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: failed to serialize plan: {e}");
                return ExitCode::FAILURE;
            }
        },
    };

    match &args.out {
        Some(path) => {
            if let Err(e) = fs::write(path, &rendered) {
                eprintln!("error: {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
        None => print!("{rendered}"),
    }

    if !args.apply {
        return ExitCode::SUCCESS;
    }

    let installer = Arc::new(OfctlInstaller::default());
    if args.ovs_protocol13 {
        for sw in compiled.topo.all_switches() {
            if let Err(e) = installer.set_protocol13(sw).await {
                eprintln!("warning: {e}");
            }
        }
    }

    let report = install_plan(installer, &compiled.plan, &cfg.install_opts()).await;
    for (sw, e) in &report.failed {
        eprintln!("install failed on {}: {e}", sw.node_name());
    }
    println!(
        "installed={} failed={}",
        report.installed.len(),
        report.failed.len()
    );
    if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
