//! crawler - crawl-only discv5 enumeration tool
//!
//! Walks the discv5 DHT, printing every newly discovered ENR with its
//! SHA-256 hash and a running count. Does not measure RTT or loss.

use std::sync::Arc;

use clap::Parser;
use discv5_probe::config::Config;
use discv5_probe::crawl::{CrawlConfig, Crawler, RealDiscv5Handle};
use sha2::{Digest, Sha256};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl the discv5 DHT and print newly discovered ENRs")]
struct Args {
    /// Comma-separated bootstrap ENRs. Defaults to the built-in list.
    #[arg(long)]
    bootnodes: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let bootnodes = match args.bootnodes {
        Some(csv) => match Config::parse_bootnodes(&csv) {
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

    if let Err(err) = crawler.start().await {
        tracing::error!(error = %err, "crawler failed to start");
        std::process::exit(1);
    }

    let mut count: u64 = 0;
    loop {
        match crawler.next_node().await {
            Ok(node) => {
                count += 1;
                let hash = Sha256::digest(node.to_uri().as_bytes());
                let is_private = node.ip().map(is_private_ip).unwrap_or(false);
                println!(
                    "#{count} {} sha256={} private_ip={}",
                    node.to_uri(),
                    hex::encode(hash),
                    is_private
                );
            }
            Err(err) => {
                tracing::error!(error = %err, "crawler stopped");
                std::process::exit(1);
            }
        }
    }
}

fn is_private_ip(ip: std::net::IpAddr) -> bool {
    match ip {
        std::net::IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        std::net::IpAddr::V6(v6) => v6.is_loopback(),
    }
}

async fn build_discv5(
    bootnodes: &[discv5_probe::node::NodeRecord],
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
