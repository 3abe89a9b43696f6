//! Built-in scenarios, recorded sessions and replay.

use conclave_core::{BiographyField, PartId};
use conclave_sim::scenarios::ScenarioId;
use conclave_sim::{
    replay_session, run_scenario, ActionRef, Assertion, CompareOp, PartConfig, ProtectionConfig,
    RecordedSession, Scenario, ScenarioRunner,
};

#[test]
fn every_builtin_passes_across_seeds() {
    for seed in [1, 42, 1234, 0xdead_beef] {
        let runner = ScenarioRunner::new(seed);
        for id in ScenarioId::all() {
            let result = runner.run_builtin(id).unwrap();
            assert!(result.passed, "{} seed={}: {:?}", id, seed, result.failure_reason());
        }
    }
}

#[test]
fn blend_example() {
    let mut scenario = Scenario::new("blend_example");
    scenario.parts.push(PartConfig::new("a"));
    scenario.actions = vec![
        ActionRef::new("join_conference", "a"),
        ActionRef::new("blend", "a"),
    ];
    scenario.assertions = vec![
        Assertion::Blended { cloud_id: "a".into(), op: CompareOp::Eq, value: true },
        Assertion::Target { cloud_id: "a".into(), op: CompareOp::Eq, value: false },
    ];
    let result = run_scenario(&scenario).unwrap();
    assert!(result.passed, "{:?}", result.failure_reason());
    assert!(result.action_results.iter().all(|r| r.success));
}

#[test]
fn protector_exile_is_deterministic_per_seed() {
    let mut scenario = Scenario::new("protector_exile");
    scenario.parts = vec![PartConfig::new("guard").trust(0.2), PartConfig::new("kid").trust(0.3)];
    scenario.relationships.protections.push(ProtectionConfig {
        protector: "guard".into(),
        protectee: "kid".into(),
    });
    scenario.actions = vec![ActionRef::new("join_conference", "kid")];

    for seed in 0..20u64 {
        let runner = ScenarioRunner::new(seed);
        let a = runner.run(&scenario).unwrap();
        let b = runner.run(&scenario).unwrap();
        assert_eq!(a.final_snapshot, b.final_snapshot);
        assert_eq!(a.action_results[0].codes(), b.action_results[0].codes());

        // one backlash roll, whatever it decides
        assert_eq!(a.final_snapshot.rng.model.draws(), 1);
        let backlash = a.action_results[0].codes().contains(&"guard:backlash:kid".to_string());
        assert_eq!(backlash, a.final_snapshot.model.is_blended(&PartId::new("guard")));
    }
}

#[test]
fn join_then_help_is_deterministic_per_seed() {
    let mut scenario = Scenario::new("join_then_help");
    scenario.parts = vec![PartConfig::new("a").trust(0.5), PartConfig::new("b")];
    scenario.relationships.protections.push(ProtectionConfig {
        protector: "a".into(),
        protectee: "b".into(),
    });
    scenario.actions = vec![
        ActionRef::new("join_conference", "a"),
        ActionRef::new("help_protected", "a"),
    ];

    let mut consented = 0;
    for seed in 0..20u64 {
        let runner = ScenarioRunner::new(seed);
        let first = runner.run(&scenario).unwrap();
        let second = runner.run(&scenario).unwrap();
        assert_eq!(first.final_snapshot, second.final_snapshot);

        let codes: Vec<_> = first.action_results.iter().map(|r| r.codes()).collect();
        assert_eq!(codes, second.action_results.iter().map(|r| r.codes()).collect::<Vec<_>>());
        assert!(first.action_results.iter().all(|r| r.success));
        assert_eq!(codes[0], vec!["a:joined_conference".to_string()]);

        // one consent roll, no dialogue pools to pick from
        assert_eq!(first.final_snapshot.rng.model.draws(), 1);
        let revealed = first
            .final_snapshot
            .model
            .parts()
            .is_revealed(&PartId::new("a"), BiographyField::ConsentedToHelp);
        if revealed {
            consented += 1;
            assert_eq!(codes[1], vec!["a:help_consented".to_string()]);
        } else {
            assert_eq!(codes[1], vec!["a:help_refused".to_string()]);
        }
    }
    assert!(consented > 0 && consented < 20, "consented {} of 20", consented);
}

#[test]
fn ten_seconds_of_grievance_add_a_tenth() {
    let mut scenario = ScenarioId::GrievanceClock.scenario();
    scenario.actions = vec![ActionRef::wait(10.0)];
    scenario.assertions = vec![Assertion::NeedAttention {
        cloud_id: "critic".into(),
        op: CompareOp::Eq,
        value: 0.2,
    }];
    let result = run_scenario(&scenario).unwrap();
    assert!(result.passed, "{:?}", result.failure_reason());
}

#[test]
fn recorded_session_replays_clean() {
    let runner = ScenarioRunner::new(7).with_recorded_states(true);
    for id in ScenarioId::all() {
        let result = runner.run_builtin(id).unwrap();
        let report = replay_session(&result.session).unwrap();
        assert!(report.is_clean(), "{}: {:?}", id, report);
        assert_eq!(report.actions_replayed, result.session.actions.len());
    }
}

#[test]
fn session_survives_a_file_round_trip() {
    let result = ScenarioRunner::new(3)
        .run_builtin(ScenarioId::FullHousehold)
        .unwrap();
    let path = std::env::temp_dir().join(format!("conclave_session_{}.json", std::process::id()));
    result.session.write_to_file(&path).unwrap();
    let loaded = RecordedSession::from_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded, result.session);
    assert!(replay_session(&loaded).unwrap().is_clean());
}

#[test]
fn tampered_draw_count_reports_divergence() {
    let result = ScenarioRunner::new(5)
        .run_builtin(ScenarioId::ProtectorExile)
        .unwrap();
    let mut session = result.session;
    session.actions[0].rng_counts.model += 1;

    let report = replay_session(&session).unwrap();
    let divergence = report.divergence.expect("draw count mismatch is reported");
    assert_eq!(divergence.action_index, 0);
    assert_eq!(divergence.expected_count, divergence.actual_count + 1);
    assert_eq!(divergence.actual_log, vec!["backlash:guardian>kid".to_string()]);
    assert!(!divergence.recent_transitions.is_empty());
}

#[test]
fn tampered_final_state_reports_diffs() {
    let result = ScenarioRunner::new(5)
        .run_builtin(ScenarioId::FirstContact)
        .unwrap();
    let mut session = result.session;
    let snapshot = session.final_snapshot.as_mut().unwrap();
    snapshot.model.remove_cloud(&PartId::new("guardian"));

    let report = replay_session(&session).unwrap();
    assert!(report.divergence.is_none());
    assert!(!report.snapshot_diffs.is_empty());
    assert!(report.snapshot_diffs.iter().all(|d| d.path.starts_with("model")));
}
