/// Integration tests for hot-spot migration and prefix replication.
use prefillsim_core::processor::PrefillProcessor;
use prefillsim_core::stats::peak_concentration;
use prefillsim_core::SimConfig;
use prefillsim_routing::{
    HotspotMigrationSelector, LruEviction, NodeSelector, PrefillNode, Request,
};

fn make_nodes(n: usize) -> Vec<PrefillNode> {
    (0..n)
        .map(|i| {
            PrefillNode::new(
                format!("node-{}", i),
                500,
                2.0,
                10.0,
                Box::new(LruEviction::new()),
            )
        })
        .collect()
}

fn request(ids: &[u64]) -> Request {
    Request {
        timestamp: 0,
        input_length: 1024,
        output_length: 64,
        hash_ids: ids.to_vec(),
    }
}

#[test]
fn test_concentration_migration_triggers_on_interval() {
    let mut nodes = make_nodes(4);

    // Node 0 holds the whole working set: five blocks, block 0 far hotter
    // than the rest.
    for id in 0..5 {
        nodes[0].admit_block(id);
    }
    for _ in 0..97 {
        nodes[0].touch_block(0);
    }

    let mut selector = HotspotMigrationSelector::new(0.6, 0.8, 0.7, 0.1).with_interval(100);
    for _ in 0..99 {
        selector.select(&request(&[0]), &mut nodes);
    }
    assert!(selector.migration_history().is_empty());

    // The 100th request crosses the interval and triggers the pass.
    selector.select(&request(&[0]), &mut nodes);
    assert_eq!(selector.migration_history().len(), 1);

    let record = &selector.migration_history()[0];
    assert_eq!(record.request_seq, 100);
    assert_eq!(record.source, "node-0");
    assert_eq!(record.target, "node-1");
    assert!(record.prefix_key.is_none());

    // ceil(5 * 0.2) = 1 block moved, and it must be a cold one; the hot
    // block 0 stays put.
    assert_eq!(record.block_ids, vec![1]);
    assert!(nodes[0].blocks.contains_key(&0));
    assert_eq!(nodes[0].block_count(), 4);
    assert_eq!(nodes[1].block_count(), 1);

    // The migrated copy arrives as a fresh block.
    let copy = &nodes[1].blocks[&1];
    assert_eq!(copy.hit_count, 1);
    assert_eq!(copy.create_seq, copy.access_seq);

    // Both sides keep their eviction mirrors intact.
    for node in &nodes {
        assert!(node.aux_consistent());
    }
}

#[test]
fn test_migration_lowers_concentration_over_a_run() {
    let config = SimConfig::from_str(
        r#"
[cluster]
node_count = 4

[routing]
selector = "hotspot_migration"
migration_threshold = 0.4
migration_interval = 50

[eviction]
policy = "lru"
"#,
    )
    .unwrap();

    // Every request wants the same five blocks, so without migration the
    // working set pins to the first nodes the affinity score warms.
    let requests: Vec<Request> = (0..500)
        .map(|i| Request {
            timestamp: i,
            input_length: 1024,
            output_length: 64,
            hash_ids: vec![0, 1, 2, 3, 4],
        })
        .collect();

    let params = config.selector_params();
    let selector =
        prefillsim_routing::selector_by_name(&config.routing.selector, &params).unwrap();
    let mut nodes = prefillsim_core::build_nodes(&config).unwrap();
    let mut proc = PrefillProcessor::new(selector);
    for req in &requests {
        proc.process(req, &mut nodes).unwrap();
    }

    let report = proc.into_report();
    assert!(
        !report.migrations.is_empty(),
        "concentrated run never triggered migration"
    );
    assert_eq!(report.migrations[0].request_seq, 50);
    assert!(
        peak_concentration(&nodes) < 1.0,
        "cluster still fully concentrated"
    );
    for node in &nodes {
        assert!(node.aux_consistent());
    }
}

#[test]
fn test_prefix_replication_copies_rather_than_moves() {
    let config = SimConfig::from_str(
        r#"
[cluster]
node_count = 4

[routing]
selector = "prefix_hotspot"
alpha = 0.5
beta = 0.6
gamma = 0.8
hotspot_threshold = 0.15

[eviction]
policy = "lru"
"#,
    )
    .unwrap();

    // One prefix dominates the trace and quickly goes hot.
    let requests: Vec<Request> = (0..200)
        .map(|i| Request {
            timestamp: i,
            input_length: 1536,
            output_length: 64,
            hash_ids: vec![7, 8, 9],
        })
        .collect();

    let params = config.selector_params();
    let selector =
        prefillsim_routing::selector_by_name(&config.routing.selector, &params).unwrap();
    let mut nodes = prefillsim_core::build_nodes(&config).unwrap();
    let mut proc = PrefillProcessor::new(selector);
    for req in &requests {
        proc.process(req, &mut nodes).unwrap();
    }

    let report = proc.into_report();
    assert!(!report.migrations.is_empty(), "hot prefix never replicated");

    let record = &report.migrations[0];
    assert!(record.prefix_key.is_some());
    assert!(record.intensity.is_some());
    assert_ne!(record.source, record.target);

    // Replication copies: the source keeps its blocks, and at least one
    // other node now holds the prefix head too.
    let holders = nodes.iter().filter(|n| n.blocks.contains_key(&7)).count();
    assert!(holders >= 2, "expected replicas, found {} holder(s)", holders);
}

#[test]
fn test_migration_history_append_only_across_selects() {
    let mut selector = HotspotMigrationSelector::new(0.6, 0.8, 0.7, 0.1).with_interval(25);
    let mut nodes = make_nodes(4);
    for id in 0..30 {
        nodes[0].admit_block(id);
    }

    let mut seen = 0;
    for i in 0..100u64 {
        selector.select(&request(&[0]), &mut nodes);
        let history = selector.migration_history();
        assert!(history.len() >= seen, "history shrank at request {}", i);
        if history.len() > seen {
            // Existing entries keep their positions and sequence numbers.
            assert!(history[..seen]
                .iter()
                .zip(history.iter())
                .all(|(a, b)| a.request_seq == b.request_seq));
            seen = history.len();
        }
    }
    assert!(seen > 0, "no migrations in a concentrated cluster");
}
