//! network-measure - single-target or crawl-mode discv5 RTT/loss prober
//!
//! With `--enr`, probes one node and prints the result. With `--crawl`,
//! runs the full driver: crawl, measure, maintain a liveness-tracked node
//! set, and optionally persist it to `--file`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use discv5_probe::config::{Config, DEFAULT_LISTEN_ADDR};
use discv5_probe::crawl::{CrawlConfig, Crawler, RealDiscv5Handle};
use discv5_probe::driver::Driver;
use discv5_probe::measure::Client;
use discv5_probe::node::NodeRecord;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "network-measure")]
#[command(about = "Measure RTT/packet loss of discv5 nodes, one at a time or via a crawl")]
struct Args {
    /// Comma-separated bootstrap ENRs. Defaults to the built-in list.
    #[arg(long)]
    bootnodes: Option<String>,

    /// Run the full crawl-and-measure driver instead of a single probe.
    #[arg(long)]
    crawl: bool,

    /// Probe exactly this one node and exit. Mutually exclusive with
    /// `--crawl`.
    #[arg(long)]
    enr: Option<String>,

    /// Snapshot file path, only meaningful with `--crawl`.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Local address the measurement socket binds to.
    #[arg(long, default_value_t = DEFAULT_LISTEN_ADDR)]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let listen_addr = args.listen;

    match (&args.enr, args.crawl) {
        (Some(uri), false) => run_single_probe(uri, listen_addr).await,
        (None, true) => run_crawl_driver(args).await,
        _ => {
            tracing::error!("exactly one of --enr or --crawl must be given");
            std::process::exit(1);
        }
    }
}

async fn run_single_probe(uri: &str, listen_addr: SocketAddr) {
    let target = match NodeRecord::parse(uri) {
        Ok(node) => node,
        Err(err) => {
            tracing::error!(error = %err, "invalid --enr");
            std::process::exit(1);
        }
    };

    let client = match Client::listen(listen_addr).await {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(error = %err, "failed to bind measurement socket");
            std::process::exit(1);
        }
    };

    match client.run(&target).await {
        Ok(result) => {
            println!(
                "rtt={:?} loss_rate={:.2}",
                result.rtt, result.loss_rate
            );
        }
        Err(err) => {
            tracing::error!(error = %err, "probe failed");
            std::process::exit(1);
        }
    }

    client.close().await;
}

async fn run_crawl_driver(args: Args) {
    let bootnodes = match &args.bootnodes {
        Some(csv) => match Config::parse_bootnodes(csv) {
            Ok(nodes) => nodes,
            Err(err) => {
                tracing::error!(error = %err, "invalid --bootnodes");
                std::process::exit(1);
            }
        },
        None => Config::default_bootnodes(),
    };

    let discv5 = match build_discv5(&bootnodes).await {
        Ok(d) => d,
        Err(err) => {
            tracing::error!(error = %err, "failed to start discv5");
            std::process::exit(1);
        }
    };

    let crawler = Arc::new(Crawler::new(
        Arc::new(RealDiscv5Handle::new(discv5)),
        CrawlConfig {
            bootnodes,
            check_liveness: true,
        },
    ));

    let client = match Client::listen(args.listen).await {
        Ok(c) => Arc::new(c),
        Err(err) => {
            tracing::error!(error = %err, "failed to bind measurement socket");
            std::process::exit(1);
        }
    };

    let driver = Driver::new(crawler, client, args.file);

    if let Err(err) = driver.load_snapshot().await {
        tracing::error!(error = %err, "failed to load snapshot");
        std::process::exit(1);
    }

    if let Err(err) = driver.run().await {
        tracing::error!(error = %err, "driver failed to start");
        std::process::exit(1);
    }

    tracing::info!("driver running, press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");

    tracing::info!("shutting down");
    driver.shutdown().await;
}

async fn build_discv5(
    bootnodes: &[NodeRecord],
) -> Result<discv5::Discv5, discv5::Error> {
    let key = discv5::enr::CombinedKey::generate_secp256k1();
    let enr = discv5::enr::Enr::builder()
        .ip4(std::net::Ipv4Addr::UNSPECIFIED)
        .udp4(0)
        .build(&key)
        .expect("freshly generated key always builds a valid local ENR");

    let config = discv5::ConfigBuilder::new(discv5::ListenConfig::default()).build();
    let mut discv5 = discv5::Discv5::new(enr, key, config).map_err(discv5::Error::Custom)?;
    discv5.start().await?;

    for node in bootnodes {
        if let Err(err) = discv5.add_enr(node.enr().clone()) {
            tracing::warn!(error = %err, "failed to add bootnode");
        }
    }

    Ok(discv5)
}
