//! End-to-end decision-cycle scenarios against the full agent.

mod common;

use std::sync::Arc;

use mindvalve::domain::models::{Config, Goal, Verbosity};
use mindvalve::engine::agent::CognitiveAgent;
use mindvalve::engine::rule_engine::{Rule, RuleEngine};
use mindvalve::operators::WriteFile;
use mindvalve::safety::DenyAllHook;
use mindvalve::EditorState;

use common::{state_in, tied_config_rules, transport, UnavailableTransport};

fn config(max_cycles: u32) -> Config {
    Config {
        cognitive_max_cycles: max_cycles,
        actr_noise_stddev: 0.0,
        ..Config::default()
    }
}

#[tokio::test]
async fn rule_matched_read_solves_in_one_cycle() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.py"), "print('ok')\n").unwrap();

    let mut agent = CognitiveAgent::builder(config(10))
        .transport(Arc::new(UnavailableTransport))
        .build();

    let (success, final_state) = agent
        .solve(Goal::new("Read main.py"), state_in(&dir), Verbosity::Silent)
        .await;

    assert!(success);
    assert!(final_state.open_files.contains_key("main.py"));
    assert_eq!(agent.stats().cycles, 1);
    assert_eq!(agent.stats().impasses, 0);
    assert_eq!(agent.stats().successful_ops, 1);
}

#[tokio::test]
async fn no_change_impasse_without_llm_is_fatal_with_reason() {
    let mut agent = CognitiveAgent::builder(config(10))
        .transport(Arc::new(UnavailableTransport))
        .build();

    // Empty state: no working directory, so no rule can fire.
    let (success, final_state) = agent
        .solve(
            Goal::new("Do something vague."),
            EditorState::default(),
            Verbosity::Silent,
        )
        .await;

    assert!(!success);
    let log: Vec<&String> = final_state.error_log.iter().collect();
    assert!(
        log.iter().any(|e| e.contains("no operators available")),
        "error log should explain the fatal impasse, got {log:?}"
    );
    // Symbolic subgoaling was attempted before giving up.
    assert!(agent.stats().impasses >= 2);
    assert!(agent.stats().max_goal_depth >= 1);
}

#[tokio::test]
async fn tie_escalates_to_the_utility_resolver_which_picks_the_winner() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.yaml"), "key: value\n").unwrap();
    std::fs::write(dir.path().join("config.json"), "{}\n").unwrap();

    let mut cfg = config(20);
    cfg.cognitive_time_threshold_ms = 1.0;

    let mut agent = CognitiveAgent::builder(cfg)
        .transport(transport(vec![(
            "CANDIDATE OPERATORS",
            common::config_tie_evaluation(),
        )]))
        .rules(tied_config_rules())
        .rng_seed(11)
        .build();

    let (success, final_state) = agent
        .solve(
            Goal::new("Open config.yaml or config.json"),
            state_in(&dir),
            Verbosity::Silent,
        )
        .await;

    assert!(success);
    assert!(final_state.open_files.contains_key("config.yaml"));
    assert!(!final_state.open_files.contains_key("config.json"));
    // The tie had to be hit at least twice before pressure crossed 0.7.
    assert!(agent.stats().impasses >= 2);
}

#[tokio::test]
async fn denied_destructive_write_is_recorded_and_never_touches_disk() {
    let dir = tempfile::tempdir().unwrap();

    let mut rules = RuleEngine::empty();
    rules.add_rule(Rule::new(
        "write_config",
        "Write a fresh config file",
        5.0,
        Box::new(|s, _g| !s.open_files.contains_key("config.json")),
        Box::new(|_s, _g| Some(WriteFile::shared("config.json", "{\"retries\": 3}"))),
    ));

    let mut agent = CognitiveAgent::builder(config(2))
        .transport(Arc::new(UnavailableTransport))
        .rules(rules)
        .approval_hook(Arc::new(DenyAllHook))
        .build();

    let (success, _final_state) = agent
        .solve(
            Goal::new("Create the configuration"),
            state_in(&dir),
            Verbosity::Silent,
        )
        .await;

    assert!(!success);
    assert!(!dir.path().join("config.json").exists());
    // Denials are recorded as ordinary operator failures and the cycle
    // continues until the budget runs out.
    assert_eq!(agent.stats().failed_ops, 2);
    assert_eq!(agent.safety_stats().denied, 2);
}

#[tokio::test]
async fn cancellation_stops_the_solve_between_cycles() {
    let mut agent = CognitiveAgent::builder(config(100))
        .transport(Arc::new(UnavailableTransport))
        .build();

    agent.cancellation_token().cancel();

    let (success, _state) = agent
        .solve(
            Goal::new("Read main.py"),
            EditorState::new("/nonexistent"),
            Verbosity::Silent,
        )
        .await;

    assert!(!success);
    assert_eq!(agent.stats().cycles, 0);
}

#[tokio::test]
async fn dry_run_reports_success_without_filesystem_changes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.py"), "print('ok')\n").unwrap();

    let mut safety = mindvalve::safety::SafetyConfig::default();
    safety.dry_run = true;

    let mut agent = CognitiveAgent::builder(config(3))
        .transport(Arc::new(UnavailableTransport))
        .safety(safety)
        .build();

    let (_success, final_state) = agent
        .solve(Goal::new("Read main.py"), state_in(&dir), Verbosity::Silent)
        .await;

    // The dry-run "executed" nothing, so the file never opened.
    assert!(!final_state.open_files.contains_key("main.py"));
    assert!(agent.safety_stats().dry_run >= 1);
}
