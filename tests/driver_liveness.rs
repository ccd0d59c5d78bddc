//! End-to-end liveness-loop scenario: a node added to an otherwise idle
//! driver gets reprobed once its liveness timeout elapses, which only
//! happens if the loop wakes on the node set's change notification
//! instead of sleeping on a deadline computed before the node existed.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use discv5_probe::config::DEFAULT_LISTEN_ADDR;
use discv5_probe::crawl::{CrawlConfig, Crawler, FakeDiscv5Handle};
use discv5_probe::driver::Driver;
use discv5_probe::measure::{Client, ProbeResult};
use discv5_probe::node::NodeRecord;
use discv5_probe::nodeset::LIVENESS_TIMEOUT;
use discv5_probe::wire::{decode_raw, encode_raw, Flag, Header, StaticHeader, MAX_PACKET_SIZE, WHOAREYOU_AUTH_SIZE};
use tokio::net::UdpSocket;

/// Same echo-a-WHOAREYOU trick as the loopback measurement scenarios:
/// answers every incoming packet so the reprobe the liveness loop issues
/// always succeeds.
fn run_loopback_echoer(socket: UdpSocket, self_id: [u8; 32]) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            let (len, from) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(_) => return,
            };
            let Ok((incoming, _msg)) = decode_raw(&buf[..len], &self_id) else {
                continue;
            };
            let whoareyou = Header {
                iv: [1u8; 16],
                static_header: StaticHeader {
                    flag: Flag::Whoareyou,
                    nonce: incoming.nonce(),
                    auth_size: WHOAREYOU_AUTH_SIZE as u16,
                },
                auth_data: vec![0u8; WHOAREYOU_AUTH_SIZE],
            };
            let src_id: [u8; 32] = incoming.auth_data[..32].try_into().unwrap();
            let reply = encode_raw(&src_id, &whoareyou, &[]);
            let _ = socket.send_to(&reply, from).await;
        }
    });
}

fn target_at(addr: SocketAddr) -> NodeRecord {
    let key = discv5::enr::CombinedKey::generate_secp256k1();
    let enr = discv5::enr::Enr::builder()
        .ip4(match addr.ip() {
            std::net::IpAddr::V4(v4) => v4,
            _ => unreachable!("loopback echoer always binds ipv4"),
        })
        .udp4(addr.port())
        .build(&key)
        .unwrap();
    NodeRecord::from_enr(enr)
}

#[tokio::test(start_paused = true)]
async fn liveness_loop_wakes_on_add_to_an_empty_set_and_reprobes_the_new_node() {
    let echo_socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let echo_addr = echo_socket.local_addr().unwrap();
    let target = target_at(echo_addr);
    run_loopback_echoer(echo_socket, target.id());

    let fake = Arc::new(FakeDiscv5Handle::new(vec![], HashMap::new()));
    let crawler = Arc::new(Crawler::new(
        fake,
        CrawlConfig {
            bootnodes: vec![],
            check_liveness: true,
        },
    ));
    let client = Arc::new(Client::listen(DEFAULT_LISTEN_ADDR).await.unwrap());
    let driver = Driver::new(crawler, client, None);
    driver.run().await.unwrap();

    // The liveness loop starts against an empty node set. If it were
    // sleeping on a deadline computed from that empty state and never
    // re-armed, nothing added afterwards would ever be revisited.
    driver.node_set().lock().await.add(
        target.clone(),
        ProbeResult {
            rtt: Duration::from_millis(1),
            loss_rate: 0.0,
        },
    );
    let refreshed_at_before = driver
        .node_set()
        .lock()
        .await
        .get(&target.id())
        .unwrap()
        .refreshed_at;

    // Advance virtual time past the liveness timeout in small steps so
    // intermediate timers (the reprobe's own send timeout, if any replies
    // were ever lost) get to fire along the way.
    let mut refreshed = false;
    for _ in 0..20 {
        tokio::time::advance(LIVENESS_TIMEOUT / 10).await;
        tokio::task::yield_now().await;
        if let Some(entry) = driver.node_set().lock().await.get(&target.id()) {
            if entry.refreshed_at > refreshed_at_before {
                refreshed = true;
                break;
            }
        }
    }
    assert!(
        refreshed,
        "liveness loop never woke up to reprobe the node added after startup"
    );

    driver.shutdown().await;
}
