use std::sync::{Arc, Mutex};

use bytes::Bytes;
use hqts::{
    ConformanceLevel, FiveTuple, FlowClassifier, FlowTable, HfscFlowConfig, HfscScheduler,
    PacketPipeline, PolicyStore, RedAqmParameters, ServiceCurve, ShapingPolicy,
    StrictPriorityScheduler, TrafficShaper, WrrQueueConfig, WrrScheduler, NO_PARENT_POLICY_ID,
};

const DEFAULT_POLICY: u64 = 1;

/// CIR 1 Mbps / CBS 1500 B, PIR 2 Mbps / PBS 3000 B; green maps to the top
/// priority level, yellow to the middle, red to the bottom.
fn stock_policies(drop_on_red: bool) -> PolicyStore {
    let _ = tracing_subscriber::fmt::try_init();
    let mut store = PolicyStore::new();
    store
        .insert(
            ShapingPolicy::new(
                DEFAULT_POLICY,
                NO_PARENT_POLICY_ID,
                "default",
                1_000_000,
                2_000_000,
                1_500,
                3_000,
            )
            .with_drop_on_red(drop_on_red)
            .with_priority_targets(7, 4, 0),
        )
        .unwrap();
    store
}

fn wide_open_levels(levels: usize) -> StrictPriorityScheduler {
    let params = (0..levels)
        .map(|_| RedAqmParameters::new(100_000, 200_000, 0.1, 0.002, 1_000_000).unwrap())
        .collect();
    StrictPriorityScheduler::new(params).unwrap()
}

fn tuple(src_port: u16) -> FiveTuple {
    FiveTuple::new(0x0a00_0001, 0x0a00_0002, src_port, 80, 6)
}

#[test]
fn conformance_steers_packets_across_priority_levels() {
    let mut store = stock_policies(false);
    let table = Arc::new(Mutex::new(FlowTable::new()));
    let classifier = FlowClassifier::new(table, DEFAULT_POLICY, &store).unwrap();
    let mut scheduler = wide_open_levels(8);
    let shaper = TrafficShaper::new(&mut store, &classifier);
    let mut pipeline = PacketPipeline::new(shaper, &mut scheduler);

    let tuple = tuple(9000);
    // Green, yellow, yellow against the stock policy buckets.
    for _ in 0..3 {
        assert!(pipeline.handle_incoming_packet(&tuple, 1_000, None).unwrap());
    }

    // The green packet left at level 7 goes first, then the yellow pair from
    // level 4 in arrival order.
    let first = pipeline.get_next_packet_to_transmit().unwrap();
    assert_eq!(first.conformance, ConformanceLevel::Green);
    assert_eq!(first.priority, 7);

    for _ in 0..2 {
        let yellow = pipeline.get_next_packet_to_transmit().unwrap();
        assert_eq!(yellow.conformance, ConformanceLevel::Yellow);
        assert_eq!(yellow.priority, 4);
    }
}

#[test]
fn empty_scheduler_yields_the_sentinel_descriptor() {
    let mut store = stock_policies(false);
    let table = Arc::new(Mutex::new(FlowTable::new()));
    let classifier = FlowClassifier::new(table, DEFAULT_POLICY, &store).unwrap();
    let mut scheduler = wide_open_levels(8);
    let shaper = TrafficShaper::new(&mut store, &classifier);
    let mut pipeline = PacketPipeline::new(shaper, &mut scheduler);

    let sentinel = pipeline.get_next_packet_to_transmit().unwrap();
    assert!(sentinel.is_sentinel());
    assert_eq!(sentinel.flow_id, 0);
}

#[test]
fn red_packets_are_dropped_before_the_scheduler_when_configured() {
    let mut store = stock_policies(true);
    let table = Arc::new(Mutex::new(FlowTable::new()));
    let classifier = FlowClassifier::new(table, DEFAULT_POLICY, &store).unwrap();
    let mut scheduler = wide_open_levels(8);
    let shaper = TrafficShaper::new(&mut store, &classifier);
    let mut pipeline = PacketPipeline::new(shaper, &mut scheduler);

    let tuple = tuple(9100);
    // Green, yellow, yellow: the PIR bucket is empty afterwards and the CIR
    // bucket holds ~500 bytes.
    for _ in 0..3 {
        assert!(pipeline.handle_incoming_packet(&tuple, 1_000, None).unwrap());
    }
    // A fourth 1000-byte packet overruns both buckets: red, dropped.
    assert!(!pipeline.handle_incoming_packet(&tuple, 1_000, None).unwrap());

    // Only the three admitted packets reach the wire.
    for _ in 0..3 {
        assert!(!pipeline.get_next_packet_to_transmit().unwrap().is_sentinel());
    }
    assert!(pipeline.get_next_packet_to_transmit().unwrap().is_sentinel());
}

#[test]
fn flows_with_a_dangling_policy_are_policed_to_red() {
    let mut store = stock_policies(false);
    let table = Arc::new(Mutex::new(FlowTable::new()));
    let classifier = FlowClassifier::new(Arc::clone(&table), DEFAULT_POLICY, &store).unwrap();

    let tuple = tuple(9200);
    let flow_id = classifier.get_or_create_flow(&tuple);
    table.lock().unwrap().get_mut(flow_id).unwrap().policy_id = 404;

    let mut scheduler = wide_open_levels(8);
    let shaper = TrafficShaper::new(&mut store, &classifier);
    let mut pipeline = PacketPipeline::new(shaper, &mut scheduler);

    assert!(!pipeline.handle_incoming_packet(&tuple, 1_000, None).unwrap());
    assert!(pipeline.get_next_packet_to_transmit().unwrap().is_sentinel());
    assert_eq!(table.lock().unwrap().get(flow_id).unwrap().stats.packets_dropped, 1);
}

#[test]
fn payloads_ride_along_untouched() {
    let mut store = stock_policies(false);
    let table = Arc::new(Mutex::new(FlowTable::new()));
    let classifier = FlowClassifier::new(table, DEFAULT_POLICY, &store).unwrap();
    let mut scheduler = wide_open_levels(8);
    let shaper = TrafficShaper::new(&mut store, &classifier);
    let mut pipeline = PacketPipeline::new(shaper, &mut scheduler);

    let payload = Bytes::from_static(b"opaque bytes");
    pipeline.handle_incoming_packet(&tuple(9300), 1_000, Some(payload.clone())).unwrap();

    let out = pipeline.get_next_packet_to_transmit().unwrap();
    assert_eq!(out.payload, Some(payload));
    assert_eq!(out.packet_length_bytes, 1_000);
}

#[test]
fn wrr_pipeline_routes_colors_to_their_queues() {
    let mut store = stock_policies(false);
    let table = Arc::new(Mutex::new(FlowTable::new()));
    let classifier = FlowClassifier::new(table, DEFAULT_POLICY, &store).unwrap();

    // One WRR queue per marking target: green 7, yellow 4, red 0.
    let aqm = RedAqmParameters::new(100_000, 200_000, 0.1, 0.002, 1_000_000).unwrap();
    let mut scheduler = WrrScheduler::new(vec![
        WrrQueueConfig::new(7, 4, aqm.clone()),
        WrrQueueConfig::new(4, 2, aqm.clone()),
        WrrQueueConfig::new(0, 1, aqm),
    ])
    .unwrap();
    let shaper = TrafficShaper::new(&mut store, &classifier);
    let mut pipeline = PacketPipeline::new(shaper, &mut scheduler);

    let tuple = tuple(9500);
    // Green, yellow, yellow against the stock buckets, then a fourth
    // 1000-byte packet that overruns both buckets: red, surviving at queue 0
    // because drop_on_red is off.
    for _ in 0..3 {
        assert!(pipeline.handle_incoming_packet(&tuple, 1_000, None).unwrap());
    }
    assert!(pipeline.handle_incoming_packet(&tuple, 1_000, None).unwrap());

    let mut seen = Vec::new();
    loop {
        let packet = pipeline.get_next_packet_to_transmit().unwrap();
        if packet.is_sentinel() {
            break;
        }
        seen.push((packet.priority, packet.conformance));
    }
    assert_eq!(seen.len(), 4);
    assert_eq!(seen.iter().filter(|(p, _)| *p == 7).count(), 1);
    assert_eq!(seen.iter().filter(|(p, _)| *p == 4).count(), 2);
    assert_eq!(seen.iter().filter(|(p, _)| *p == 0).count(), 1);
    assert!(seen.contains(&(0, ConformanceLevel::Red)));
}

#[test]
fn hfsc_pipeline_schedules_flows_by_service_curves() {
    let mut store = stock_policies(false);
    let table = Arc::new(Mutex::new(FlowTable::new()));
    let classifier = FlowClassifier::new(table, DEFAULT_POLICY, &store).unwrap();

    // The classifier hands out flow ids 1 and 2 in arrival order; the
    // scheduler is provisioned to match. Flow 2's curve is twice as fast.
    let mut scheduler = HfscScheduler::new(
        vec![
            HfscFlowConfig::new(1, 0, ServiceCurve::new(1_000_000, 0)),
            HfscFlowConfig::new(2, 0, ServiceCurve::new(2_000_000, 0)),
        ],
        10_000_000,
    )
    .unwrap();
    let shaper = TrafficShaper::new(&mut store, &classifier);
    let mut pipeline = PacketPipeline::new(shaper, &mut scheduler);

    let slow = tuple(9600);
    let fast = tuple(9601);
    pipeline.handle_incoming_packet(&slow, 200, None).unwrap();
    pipeline.handle_incoming_packet(&fast, 200, None).unwrap();

    // 200 bytes finish at 1600 us on flow 1 but 800 us on flow 2.
    assert_eq!(pipeline.get_next_packet_to_transmit().unwrap().flow_id, 2);
    assert_eq!(pipeline.get_next_packet_to_transmit().unwrap().flow_id, 1);
    assert!(pipeline.get_next_packet_to_transmit().unwrap().is_sentinel());
}

#[test]
fn distinct_tuples_become_distinct_flows() {
    let mut store = stock_policies(false);
    let table = Arc::new(Mutex::new(FlowTable::new()));
    let classifier = FlowClassifier::new(table, DEFAULT_POLICY, &store).unwrap();
    let mut scheduler = wide_open_levels(8);
    let shaper = TrafficShaper::new(&mut store, &classifier);
    let mut pipeline = PacketPipeline::new(shaper, &mut scheduler);

    pipeline.handle_incoming_packet(&tuple(9400), 200, None).unwrap();
    pipeline.handle_incoming_packet(&tuple(9401), 200, None).unwrap();
    pipeline.handle_incoming_packet(&tuple(9400), 200, None).unwrap();

    let ids: Vec<_> =
        (0..3).map(|_| pipeline.get_next_packet_to_transmit().unwrap().flow_id).collect();
    assert_eq!(ids, vec![1, 2, 1]);
    assert_eq!(classifier.flow_count(), 2);
}
