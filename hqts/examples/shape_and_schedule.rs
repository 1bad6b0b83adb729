//! Minimal end-to-end run: one policy, one strict-priority scheduler, a
//! burst of packets from two flows, and the resulting transmit order.

use std::sync::{Arc, Mutex};

use hqts::{
    FiveTuple, FlowClassifier, FlowTable, PacketPipeline, PolicyStore, RedAqmParameters,
    ShapingPolicy, StrictPriorityScheduler, TrafficShaper, NO_PARENT_POLICY_ID,
};

fn main() {
    tracing_subscriber::fmt::init();

    let mut policies = PolicyStore::new();
    policies
        .insert(
            ShapingPolicy::new(1, NO_PARENT_POLICY_ID, "default", 1_000_000, 2_000_000, 1_500, 3_000)
                .with_priority_targets(7, 4, 1),
        )
        .expect("fresh store accepts the policy");

    let flow_table = Arc::new(Mutex::new(FlowTable::new()));
    let classifier = FlowClassifier::new(Arc::clone(&flow_table), 1, &policies)
        .expect("default policy exists");

    let level_params: Vec<_> = (0..8)
        .map(|_| RedAqmParameters::new(50_000, 100_000, 0.1, 0.002, 500_000).expect("valid params"))
        .collect();
    let mut scheduler = StrictPriorityScheduler::new(level_params).expect("levels configured");

    let shaper = TrafficShaper::new(&mut policies, &classifier);
    let mut pipeline = PacketPipeline::new(shaper, &mut scheduler);

    let voice = FiveTuple::new(0x0a00_0001, 0x0a00_0002, 16_384, 16_384, 17);
    let bulk = FiveTuple::new(0x0a00_0003, 0x0a00_0004, 40_000, 443, 6);

    for _ in 0..3 {
        pipeline.handle_incoming_packet(&voice, 200, None).expect("pipeline accepts");
        pipeline.handle_incoming_packet(&bulk, 1_200, None).expect("pipeline accepts");
    }

    loop {
        let packet = pipeline.get_next_packet_to_transmit().expect("scheduler consistent");
        if packet.is_sentinel() {
            break;
        }
        println!(
            "tx flow={} len={} prio={} conformance={:?}",
            packet.flow_id, packet.packet_length_bytes, packet.priority, packet.conformance
        );
    }

    let table = flow_table.lock().expect("pipeline done");
    for context in table.iter() {
        println!(
            "flow {} processed {} bytes in {} packets ({:?})",
            context.flow_id,
            context.stats.bytes_processed,
            context.stats.packets_processed,
            context.sla_status
        );
    }
}
