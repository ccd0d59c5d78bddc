//! Crawler scenarios against a scripted `FakeDiscv5Handle` instead of the
//! real DHT. Requires the `test-utils` feature, which exposes the fake
//! alongside the real `RealDiscv5Handle` binding.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use discv5_probe::crawl::{CrawlConfig, CrawlError, Crawler, FakeDiscv5Handle};
use discv5_probe::node::NodeRecord;

fn enr_with_port(port: u16) -> NodeRecord {
    let key = discv5::enr::CombinedKey::generate_secp256k1();
    let enr = discv5::enr::Enr::builder()
        .ip4(Ipv4Addr::LOCALHOST)
        .udp4(port)
        .build(&key)
        .unwrap();
    NodeRecord::from_enr(enr)
}

#[tokio::test]
async fn emits_only_nodes_that_answer_request_enr_and_skips_duplicates() {
    let alive_a = enr_with_port(30301);
    let alive_b = enr_with_port(30302);
    let dead = enr_with_port(30303);

    let mut answers = HashMap::new();
    answers.insert(alive_a.id(), Ok(alive_a.clone()));
    answers.insert(alive_b.id(), Ok(alive_b.clone()));
    answers.insert(dead.id(), Err("no response".to_string()));

    let candidates = vec![alive_a.clone(), dead.clone(), alive_b.clone(), alive_a.clone()];
    let fake = Arc::new(FakeDiscv5Handle::new(candidates, answers));

    let crawler = Crawler::new(
        fake,
        CrawlConfig {
            bootnodes: vec![],
            check_liveness: true,
        },
    );
    crawler.start().await.unwrap();

    let first = crawler.next_node().await.unwrap();
    let second = crawler.next_node().await.unwrap();
    assert_eq!(first.id(), alive_a.id());
    assert_eq!(second.id(), alive_b.id());

    crawler.stop().await;
}

#[tokio::test]
async fn start_twice_without_stop_fails() {
    let fake = Arc::new(FakeDiscv5Handle::new(vec![], HashMap::new()));
    let crawler = Crawler::new(
        fake,
        CrawlConfig {
            bootnodes: vec![],
            check_liveness: true,
        },
    );
    crawler.start().await.unwrap();
    assert!(matches!(crawler.start().await, Err(CrawlError::AlreadyRunning)));
    crawler.stop().await;
}
