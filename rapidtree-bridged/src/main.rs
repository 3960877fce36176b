use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rapidtree_bridged::args::{Cli, Commands};
use rapidtree_bridged::driver::PnetLinkDriver;
use rapidtree_bridged::load_config;
use rapidtree_bridged::runtime::BridgeRuntime;
use rapidtree_core::{BridgeConfig, Error, MacAddr, Result, SimTime, StaticInterfaceTable};
use rapidtree_engine::Engine;
use rapidtree_sim::Network;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = dispatch(cli).await {
        error!(error = %e, "fatal");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { config } => run(load_config(config)?).await,
        Commands::CheckConfig { config } => {
            let config = load_config(config)?;
            info!(
                priority = config.priority,
                ports = config.ports.len(),
                "configuration ok"
            );
            Ok(())
        }
        Commands::Simulate { bridges, seconds } => simulate(bridges, seconds),
    }
}

async fn run(config: BridgeConfig) -> Result<()> {
    if config.ports.is_empty() {
        return Err(Error::config(
            "at least one [[port]] with an interface name is required",
        ));
    }
    let names = config
        .ports
        .iter()
        .enumerate()
        .map(|(i, p)| {
            p.interface
                .clone()
                .ok_or_else(|| Error::config(format!("port {i} has no interface name")))
        })
        .collect::<Result<Vec<_>>>()?;

    let driver = PnetLinkDriver::open(&names)?;
    let costs = (0..names.len()).map(|i| config.port(i).link_cost).collect();
    let interfaces = StaticInterfaceTable::new(driver.macs().to_vec(), costs);
    let engine = Engine::new(&config, &interfaces)?;
    info!(bridge = %engine.bridge_id(), ports = names.len(), "bridge starting");

    BridgeRuntime::new(engine, driver).run().await
}

fn simulate(bridges: usize, seconds: u64) -> Result<()> {
    let count = bridges.clamp(2, 64);
    let mut net = Network::new();
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let mac = MacAddr([0x02, 0, 0, 0, 0, (i + 1) as u8]);
        ids.push(net.add_bridge(BridgeConfig::default(), mac, 2)?);
    }
    for i in 0..count {
        net.link(ids[i], 1, ids[(i + 1) % count], 0);
    }
    net.start_all();
    net.run_until(SimTime::from_secs(seconds));

    for &b in &ids {
        println!("{}", net.engine(b).describe());
    }
    Ok(())
}
