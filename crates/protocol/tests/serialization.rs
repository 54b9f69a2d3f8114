use mdap_protocol::*;

#[test]
fn test_pipeline_deserialization_from_yaml() {
    let yaml_str = r#"
name: solve-hanoi
strategy:
  file: hanoi-strategy
agent: hanoi-solver
total_steps: 7
input:
  num_disks: 3
  pegs:
    A: [1, 2, 3]
    B: []
    C: []
mdap_config:
  voting_strategy: "first-to-ahead-by-k"
  k: 3
  parallel_samples: 3
  temperature_first: 0.0
  temperature_subsequent: 0.1
  max_output_tokens: 500
  require_format: true
  checkpoint_interval: 10000
microsteps:
  - name: move
    use: hanoi-solver
    prompt: "Determine and execute the next move."
"#;

    let pipeline: MdapPipeline =
        serde_yaml::from_str(yaml_str).expect("Failed to deserialize MdapPipeline");

    assert_eq!(pipeline.name, "solve-hanoi");
    assert_eq!(
        pipeline.strategy,
        Some(StrategySource::File {
            file: "hanoi-strategy".to_string()
        })
    );
    assert_eq!(pipeline.agent.as_deref(), Some("hanoi-solver"));
    assert_eq!(pipeline.total_steps, Some(TotalSteps::Count(7)));

    // Initial state is opaque but structurally accessible.
    assert_eq!(
        pipeline.input.get("num_disks").and_then(Value::as_u64),
        Some(3)
    );
    assert!(pipeline.input.get("pegs").is_some());

    // Declared config keeps exactly the fields the author set.
    assert_eq!(pipeline.config.k, Some(KSetting::Fixed(3)));
    assert_eq!(pipeline.config.parallel_samples, Some(3));
    assert_eq!(pipeline.config.max_output_tokens, Some(500));
    assert_eq!(pipeline.config.checkpoint_interval, Some(10000));
    assert_eq!(pipeline.config.max_retries, None);

    assert_eq!(pipeline.microsteps.len(), 1);
    assert_eq!(pipeline.microsteps[0].name, "move");
    assert_eq!(pipeline.microsteps[0].agent.as_deref(), Some("hanoi-solver"));
}

#[test]
fn test_minimal_pipeline_defaults() {
    let yaml_str = "name: bare\n";
    let pipeline: MdapPipeline = serde_yaml::from_str(yaml_str).unwrap();

    assert_eq!(pipeline.name, "bare");
    assert!(pipeline.strategy.is_none());
    assert!(pipeline.agent.is_none());
    assert!(pipeline.total_steps.is_none());
    assert!(pipeline.input.is_null());
    assert_eq!(pipeline.config, MdapOverrides::default());
    assert!(pipeline.microsteps.is_empty());
}

#[test]
fn test_microstep_with_schema_and_red_flags() {
    let yaml_str = r#"
name: move-disk
use: hanoi-solver
prompt: "determine the next move"
output_schema:
  move: "disk N from A to B"
  next_state: "state representation"
red_flags:
  regex:
    - "(?i)i cannot"
  contains:
    - "as an AI"
  not_in:
    move:
      - "disk 1 from A to B"
      - "disk 1 from A to C"
"#;

    let step: Microstep = serde_yaml::from_str(yaml_str).expect("Failed to deserialize Microstep");

    let schema = step.output_schema.expect("schema");
    assert_eq!(schema.action_key(), Some("move"));
    assert_eq!(schema.state_key(), "next_state");

    assert_eq!(step.red_flags.regex.len(), 1);
    assert_eq!(step.red_flags.contains, vec!["as an AI".to_string()]);
    assert_eq!(
        step.red_flags.not_in.get("move").map(Vec::len),
        Some(2)
    );
}

#[test]
fn test_total_steps_infer_round_trip() {
    let pipeline: MdapPipeline =
        serde_yaml::from_str("name: estimated\ntotal_steps: infer\n").unwrap();
    assert!(matches!(
        pipeline.total_steps,
        Some(TotalSteps::Infer(_))
    ));

    let yaml = serde_yaml::to_string(&pipeline).unwrap();
    let back: MdapPipeline = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(back.total_steps, pipeline.total_steps);
}

#[test]
fn test_progress_event_serialization() {
    use std::collections::BTreeMap;
    use uuid::Uuid;

    let mut metadata = BTreeMap::new();
    metadata.insert("total_steps".to_string(), "7".to_string());
    metadata.insert("total_samples".to_string(), "21".to_string());
    metadata.insert("rejected_samples".to_string(), "0".to_string());
    metadata.insert("duration".to_string(), "1.2s".to_string());

    let event = ProgressEvent::Complete {
        execution_id: Uuid::new_v4(),
        message: "pipeline completed".to_string(),
        metadata,
    };

    let json = serde_json::to_string(&event).expect("Failed to serialize ProgressEvent");
    let back: ProgressEvent = serde_json::from_str(&json).expect("Failed to deserialize");
    assert_eq!(back, event);
}

#[test]
fn test_value_untagged_deserialization() {
    let value: Value = serde_yaml::from_str(
        "pegs:\n  A: [1, 2, 3]\n  B: []\n  C: []\nnum_disks: 3\n",
    )
    .unwrap();

    assert_eq!(
        value.to_string(),
        "{num_disks: 3, pegs: {A: [1, 2, 3], B: [], C: []}}"
    );
}
