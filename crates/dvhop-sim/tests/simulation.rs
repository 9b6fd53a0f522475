use dvhop_protocol::{EventCode, StatsRecord};
use dvhop_sim::{stats_to_csv, Simulation, SimulationConfig};
use proptest::prelude::*;

fn scenario(seed: u64) -> SimulationConfig {
    SimulationConfig {
        seed,
        size: 16,
        beacons: 4,
        time: 3.0,
        ..Default::default()
    }
}

#[test]
fn text_stream_converts_to_csv() {
    let mut sim = Simulation::new(SimulationConfig {
        damage_extent: 1,
        ..scenario(42)
    })
    .unwrap();
    let summary = sim.run().unwrap();

    let mut text = Vec::new();
    sim.log().write_text(&mut text).unwrap();

    let mut receptions = Vec::new();
    let mut events = Vec::new();
    let counts = stats_to_csv(text.as_slice(), &mut receptions, Some(&mut events)).unwrap();

    assert_eq!(counts.malformed, 0);
    assert_eq!(counts.receptions, summary.receptions);
    assert_eq!(counts.events, summary.expired_entries + summary.disabled_nodes);
    assert_eq!(summary.disabled_nodes, 1);

    let events = String::from_utf8(events).unwrap();
    assert!(events.lines().skip(1).any(|l| l.ends_with(",DISABLED_NODE")));
    assert_eq!(
        String::from_utf8(receptions).unwrap().lines().count(),
        summary.receptions + 1
    );
}

#[test]
fn summary_serializes() {
    let mut sim = Simulation::new(scenario(7)).unwrap();
    let summary = sim.run().unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["nodes"], 16);
    assert_eq!(json["beacons"], 4);
    assert_eq!(json["duration_ms"], 3_000);
}

#[test]
fn scenario_file_and_flags() {
    let dir = std::env::temp_dir().join(format!("dvhop-sim-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("scenario.json");
    std::fs::write(&path, r#"{ "size": 20, "beacons": 5, "time": 2.0 }"#).unwrap();

    let mut config = SimulationConfig::from_json_file(&path).unwrap();
    let flags: Vec<String> = ["--seed", "99", "--damage-extent=2"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let pairs = dvhop_sim::parse_flags(&flags).unwrap();
    config
        .apply(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .unwrap();

    assert_eq!(config.size, 20);
    assert_eq!(config.seed, 99);
    assert_eq!(config.damage_extent, 2);
    assert_eq!(config.range, 75.0);

    let mut sim = Simulation::new(config).unwrap();
    let summary = sim.run().unwrap();
    assert_eq!(summary.disabled_nodes, 2);

    std::fs::remove_dir_all(&dir).unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn stats_are_time_ordered(seed in any::<u64>(), damage in 0u32..3) {
        let mut sim = Simulation::new(SimulationConfig {
            damage_extent: damage,
            ..scenario(seed)
        })
        .unwrap();
        let summary = sim.run().unwrap();

        let records = sim.log().records();
        prop_assert!(records.windows(2).all(|w| w[0].time() <= w[1].time()));
        prop_assert_eq!(sim.log().count_events(EventCode::DisabledNode), damage as usize);
        prop_assert!(summary.localized <= 12);

        // Every reception line names one of the simulated nodes.
        for record in records {
            if let StatsRecord::Reception(r) = record {
                prop_assert!(sim.nodes().iter().any(|n| n.address.local == r.node));
                prop_assert!(r.table_size <= 4);
            }
        }
    }
}
