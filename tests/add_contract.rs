//! Add contract tests
//!
//! An add either returns entries with a root CID or reports a failure.
//! It never reports success without data.

mod common;

use std::fs;

use ccs::operations::{AddOutcome, Operations};
use ccs::replication::{PeerStatus, META_ORG, META_SIZE};
use common::FakeCluster;

fn write_tree(root: &std::path::Path) {
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("a.txt"), b"alpha").unwrap();
    fs::write(root.join("b.txt"), b"bravo!").unwrap();
    fs::write(root.join("sub").join("c.txt"), b"charlie").unwrap();
}

#[tokio::test]
async fn test_directory_add_pins_root_with_profile_allocation() {
    let cluster = FakeCluster::start().await;
    let config = cluster.config();
    let docs = cluster.workdir().join("docs");
    write_tree(&docs);

    let result = Operations::new(&config).add(&docs, "orgA", true).await;

    assert_eq!(result.returncode, AddOutcome::Success, "{:?}", result.error);
    assert!(result.error.is_none());
    assert_eq!(result.entries.len(), 4);
    assert_eq!(result.allocations, vec!["pA", "pB", "pC"]);
    assert_eq!(result.profile.as_deref(), Some("orgA"));
    assert_eq!(result.cluster_host, "nodeA");

    let root = result.root_entry().unwrap();
    assert_eq!(root.path, "docs");
    assert_eq!(root.cid, result.root_cid);
    assert!(result.entries.last().unwrap().is_root);
    let children: Vec<&str> = result.child_entries().map(|e| e.path.as_str()).collect();
    assert_eq!(children, vec!["docs/a.txt", "docs/b.txt", "docs/sub/c.txt"]);

    let pin = cluster.pin(&result.root_cid).unwrap();
    assert_eq!(pin.name, "docs");
    assert_eq!(pin.metadata[META_ORG], "orgA");
    assert_eq!(pin.metadata[META_SIZE], "18");
    assert_eq!(pin.allocations, vec!["pA", "pB", "pC"]);
    assert_eq!(result.replica_count, Some(3));
}

#[tokio::test]
async fn test_single_file_add() {
    let cluster = FakeCluster::start().await;
    let config = cluster.config();
    let file = cluster.workdir().join("report.pdf");
    fs::write(&file, b"%PDF-1.4 tiny").unwrap();

    let result = Operations::new(&config).add(&file, "orgC", false).await;

    assert!(result.ok());
    assert_eq!(result.entries.len(), 1);
    assert!(result.entries[0].is_root);
    assert_eq!(result.entries[0].path, "report.pdf");
    assert_eq!(result.entries[0].size, 13);
    // orgC: own primary, shared backup, then the other org's node
    assert_eq!(result.allocations, vec!["pC", "pB", "pA"]);
    assert_eq!(result.cluster_host, "nodeC");
}

#[tokio::test]
async fn test_cluster_failure_is_never_success() {
    let cluster = FakeCluster::start().await;
    let config = cluster.config();
    let file = cluster.workdir().join("a.txt");
    fs::write(&file, b"data").unwrap();
    cluster.fail_next_add(
        "not enough peers to allocate CID. Needed at least: 3. Wanted at most: 5. Available candidates: 2.",
    );

    let result = Operations::new(&config).add(&file, "orgA", false).await;

    assert_eq!(result.returncode, AddOutcome::Failed);
    assert!(result.entries.is_empty());
    assert!(result.root_cid.is_empty());
    assert!(result.error.unwrap().contains("not enough peers"));
    assert_eq!(cluster.pin_count(), 0);
}

#[tokio::test]
async fn test_config_errors_send_nothing() {
    let cluster = FakeCluster::start().await;
    let config = cluster.config();
    let file = cluster.workdir().join("a.txt");
    fs::write(&file, b"data").unwrap();

    let result = Operations::new(&config).add(&file, "nobody", false).await;
    assert_eq!(result.returncode, AddOutcome::ConfigError);
    assert_eq!(result.returncode.code(), 3);

    let missing = Operations::new(&config)
        .add(&cluster.workdir().join("nope"), "orgA", false)
        .await;
    assert_eq!(missing.returncode, AddOutcome::Failed);

    assert_eq!(cluster.add_requests().await, 0);
}

#[tokio::test]
async fn test_replica_count_reflects_cluster_state() {
    let cluster = FakeCluster::start().await;
    let config = cluster.config();
    let file = cluster.workdir().join("a.txt");
    fs::write(&file, b"data").unwrap();

    let first = Operations::new(&config).add(&file, "orgA", false).await;
    assert_eq!(first.replica_count, Some(3));

    cluster.set_peer_status(
        &first.root_cid,
        "pC",
        common::status("pC", PeerStatus::Pinning),
    );
    let status = Operations::new(&config).status(&first.root_cid).await.unwrap();
    assert_eq!(status.pinned_count, 2);
    assert!(!status.fully_pinned);
}
