//! End-to-end tests: specification, builder, workers, decorators.

use super::PipelineBuilder;
use crate::config::PipelineConfig;
use crate::core::{Payload, StageOutput, Stereotype, TypeTag};
use crate::decorators::{LOAD_BALANCE, SPIN_UP};
use crate::errors::PipeflowError;
use crate::events::{CollectingEventSink, PIPELINE_BUILT, WORKER_SPAWNED};
use crate::registry::{StageRegistry, StageType};
use crate::runtime::PipelineSystem;
use crate::spec::Specification;
use crate::stages::builtin::{LOG_FAILURE, LOG_STRING, LOWERCASE, SPLIT_WORDS, UPPERCASE};
use crate::stages::builtin::Uppercase;
use crate::stages::FnStage;
use crate::testing::{CollectingSink, ConstantStage, FailingStage, Gate, RecordingStage};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn system_with(config: PipelineConfig) -> PipelineSystem {
    PipelineSystem::builder("integration").config(config).build().unwrap()
}

fn texts(payloads: &[Payload]) -> Vec<String> {
    payloads
        .iter()
        .map(|p| p.as_text().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_uppercase_then_log() {
    let registry = Arc::new(StageRegistry::with_builtins());
    let mut spec = Specification::new(registry, UPPERCASE).unwrap();
    spec.add_child(spec.root_id(), LOG_STRING).unwrap();

    let system = PipelineSystem::new("scenario-a");
    let mut sink = CollectingSink::new(16);
    let entry = PipelineBuilder::new(system.clone())
        .build_with_sink(&spec, sink.stage_ref())
        .await
        .unwrap();

    entry.put("hello").await;
    assert_eq!(sink.next(WAIT).await, Some(Payload::from("HELLO")));

    assert!(entry.shutdown().await);
    assert!(system.wait_for_live_workers(0, WAIT).await);
}

#[tokio::test]
async fn test_multi_output_delivers_each_word() {
    let registry = Arc::new(StageRegistry::with_builtins());
    let mut spec = Specification::new(registry, SPLIT_WORDS).unwrap();
    spec.add_child(spec.root_id(), LOG_STRING).unwrap();

    let system = PipelineSystem::new("scenario-b");
    let mut sink = CollectingSink::new(16);
    let entry = PipelineBuilder::new(system)
        .build_with_sink(&spec, sink.stage_ref())
        .await
        .unwrap();

    entry.put("a b c").await;
    entry.close().await;

    let words = sink.collect_until_shutdown(WAIT).await;
    assert_eq!(texts(&words), vec!["a", "b", "c"]);
    assert!(sink.is_finished());
}

#[tokio::test]
async fn test_failure_goes_to_handler_only() {
    let registry = StageRegistry::with_builtins();
    registry.register_stage(StageType::transform("picky", TypeTag::TEXT, TypeTag::TEXT, || {
        FailingStage::on("X")
    }));
    let failures = RecordingStage::new();
    let recorder = failures.clone();
    registry.register_stage(StageType::error_handler("record_failures", move || recorder.clone()));

    let mut spec = Specification::new(Arc::new(registry), "picky").unwrap();
    spec.add_child(spec.root_id(), LOG_STRING).unwrap();
    spec.set_error_handler(spec.root_id(), "record_failures").unwrap();

    let system = PipelineSystem::new("scenario-c");
    let mut sink = CollectingSink::new(16);
    let entry = PipelineBuilder::new(system)
        .build_with_sink(&spec, sink.stage_ref())
        .await
        .unwrap();

    entry.put("X").await;
    entry.put("ok").await;
    entry.close().await;

    assert_eq!(texts(&sink.collect_until_shutdown(WAIT).await), vec!["ok"]);
    assert!(entry.shutdown().await);

    let notices = failures.payloads();
    assert_eq!(notices.len(), 1);
    let notice = notices[0].as_failure().unwrap();
    assert_eq!(notice.stage_type, "picky");
    assert_eq!(notice.input, Some(Payload::from("X")));
    assert!(notice.message.contains("rejected"));
}

#[tokio::test]
async fn test_filter_passes_matching_and_drops_rest() {
    let registry = StageRegistry::with_builtins();
    registry.register_stage(StageType::filter("larger_than_10", TypeTag::INTEGER, || {
        FnStage::new("larger_than_10", |input: Payload| {
            Ok(match input.as_integer() {
                Some(value) if value > 10 => StageOutput::Single(input),
                _ => StageOutput::Empty,
            })
        })
    }));
    let spec = Specification::new(Arc::new(registry), "larger_than_10").unwrap();

    let system = PipelineSystem::new("filter");
    let mut sink = CollectingSink::new(16);
    let entry = PipelineBuilder::new(system.clone())
        .build_with_sink(&spec, sink.stage_ref())
        .await
        .unwrap();

    entry.put(11_i64).await;
    entry.put(3_i64).await;
    entry.close().await;

    assert_eq!(sink.collect_until_shutdown(WAIT).await, vec![Payload::from(11_i64)]);
    assert!(sink.is_finished());
    assert!(system.violations().is_empty());
}

#[tokio::test]
async fn test_filter_altering_input_is_violation() {
    let registry = StageRegistry::with_builtins();
    registry.register_stage(StageType::filter("rewriter", TypeTag::TEXT, || ConstantStage::new("other")));
    let spec = Specification::new(Arc::new(registry), "rewriter").unwrap();

    let system = PipelineSystem::new("filter-violation");
    let mut sink = CollectingSink::new(16);
    let entry = PipelineBuilder::new(system.clone())
        .build_with_sink(&spec, sink.stage_ref())
        .await
        .unwrap();

    entry.put("x").await;

    // The terminated filter still forwards its shutdown.
    assert!(sink.collect_until_shutdown(WAIT).await.is_empty());
    assert!(sink.is_finished());

    let violations = system.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].stage_type, "rewriter");
    assert_eq!(violations[0].stereotype, Stereotype::Filter);
    assert!(system.wait_for_live_workers(0, WAIT).await);
}

#[tokio::test]
async fn test_pipeline_feeds_another_pipeline() {
    let registry = Arc::new(StageRegistry::with_builtins());
    let upper = Specification::new(registry.clone(), UPPERCASE).unwrap();
    let lower = Specification::new(registry, LOWERCASE).unwrap();

    let system = PipelineSystem::new("chained");
    let builder = PipelineBuilder::new(system.clone());
    let mut sink = CollectingSink::new(16);
    let downstream = builder.build_with_sink(&upper, sink.stage_ref()).await.unwrap();
    downstream.put("direct").await;
    assert_eq!(sink.next(WAIT).await, Some(Payload::from("DIRECT")));

    let upstream = builder
        .build_with_sink(&lower, downstream.root().clone())
        .await
        .unwrap();
    upstream.put("Chained").await;
    assert_eq!(sink.next(WAIT).await, Some(Payload::from("CHAINED")));

    // Closing one producer leaves the shared root running for the other.
    upstream.close().await;
    downstream.put("late").await;
    downstream.close().await;

    assert_eq!(texts(&sink.collect_until_shutdown(WAIT).await), vec!["LATE"]);
    assert!(sink.is_finished());
    assert!(system.wait_for_live_workers(0, WAIT).await);
}

#[tokio::test]
async fn test_shared_child_waits_for_every_parent() {
    let registry = StageRegistry::with_builtins();
    let recorder = RecordingStage::new();
    let shared = recorder.clone();
    registry.register_stage(StageType::side_effect("record", TypeTag::TEXT, move || shared.clone()));

    let mut spec = Specification::new(Arc::new(registry), UPPERCASE).unwrap();
    let root = spec.root_id();
    let lower = spec.add_child(root, LOWERCASE).unwrap();
    let log = spec.add_child(root, LOG_STRING).unwrap();
    let merge = spec.add_child(lower, "record").unwrap();
    spec.add_existing_child(log, merge).unwrap();
    assert_eq!(spec.len(), 4);

    let system = PipelineSystem::new("dag");
    let mut sink = CollectingSink::new(16);
    let entry = PipelineBuilder::new(system.clone())
        .build_with_sink(&spec, sink.stage_ref())
        .await
        .unwrap();
    assert_eq!(system.live_workers(), 4);

    entry.put("Hi").await;
    entry.close().await;

    let mut results = texts(&sink.collect_until_shutdown(WAIT).await);
    results.sort();
    assert_eq!(results, vec!["HI", "hi"]);
    assert!(sink.is_finished());
    assert_eq!(recorder.len(), 2);
    assert!(system.wait_for_live_workers(0, WAIT).await);
}

#[tokio::test]
async fn test_pool_spreads_idle_load_over_distinct_members() {
    let gate = Gate::new();
    let registry = StageRegistry::with_builtins();
    let stage_gate = gate.clone();
    registry.register_stage(StageType::side_effect("gated", TypeTag::TEXT, move || stage_gate.stage()));

    let mut spec = Specification::new(Arc::new(registry), "gated").unwrap();
    spec.wrap(spec.root_id(), LOAD_BALANCE).unwrap();

    let system = system_with(PipelineConfig::default().with_pool_size(3));
    let mut sink = CollectingSink::new(16);
    let entry = PipelineBuilder::new(system.clone())
        .build_with_sink(&spec, sink.stage_ref())
        .await
        .unwrap();

    for text in ["a", "b", "c"] {
        entry.put(text).await;
    }
    assert!(gate.wait_entered(3, WAIT).await);
    let members: HashSet<_> = gate.entered().into_iter().collect();
    assert_eq!(members.len(), 3);
    assert_eq!(system.live_workers(), 4);

    gate.open();
    entry.close().await;
    let mut results = texts(&sink.collect_until_shutdown(WAIT).await);
    results.sort();
    assert_eq!(results, vec!["a", "b", "c"]);
    assert!(system.wait_for_live_workers(0, WAIT).await);
}

#[tokio::test]
async fn test_terminated_pool_member_is_excluded() {
    let registry = StageRegistry::with_builtins();
    registry.register_stage(StageType::side_effect("touchy", TypeTag::TEXT, || {
        FnStage::new("touchy", |input: Payload| {
            if input == Payload::from("bad") {
                return Ok(StageOutput::single("tampered"));
            }
            Ok(StageOutput::Single(input))
        })
    }));

    let mut spec = Specification::new(Arc::new(registry), "touchy").unwrap();
    spec.wrap(spec.root_id(), LOAD_BALANCE).unwrap();

    let system = system_with(PipelineConfig::default().with_pool_size(2));
    let mut sink = CollectingSink::new(16);
    let entry = PipelineBuilder::new(system.clone())
        .build_with_sink(&spec, sink.stage_ref())
        .await
        .unwrap();

    entry.put("bad").await;
    let violated = tokio::time::timeout(WAIT, async {
        while system.violations().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });
    assert!(violated.await.is_ok());
    assert!(system.wait_for_live_workers(2, WAIT).await);
    assert_eq!(system.violations()[0].stage_type, "touchy");

    entry.put("a").await;
    entry.put("b").await;
    entry.close().await;

    assert_eq!(texts(&sink.collect_until_shutdown(WAIT).await), vec!["a", "b"]);
    assert!(system.wait_for_live_workers(0, WAIT).await);
}

#[tokio::test]
async fn test_spin_up_uses_fresh_instances_and_returns_to_baseline() {
    let registry = StageRegistry::with_builtins();
    let recorder = RecordingStage::new();
    let stage = recorder.clone();
    registry.register_stage(StageType::side_effect("record", TypeTag::TEXT, move || stage.clone()));

    let mut spec = Specification::new(Arc::new(registry), "record").unwrap();
    spec.wrap(spec.root_id(), SPIN_UP).unwrap();

    let system = PipelineSystem::new("spin-up");
    let mut sink = CollectingSink::new(16);
    let entry = PipelineBuilder::new(system.clone())
        .build_with_sink(&spec, sink.stage_ref())
        .await
        .unwrap();
    let baseline = system.live_workers();
    assert_eq!(baseline, 1);

    for text in ["a", "b", "c"] {
        entry.put(text).await;
        assert!(sink.next(WAIT).await.is_some());
        assert!(system.wait_for_live_workers(baseline, WAIT).await);
    }

    let instances: HashSet<_> = recorder.instances().into_iter().collect();
    assert_eq!(instances.len(), 3);
    assert!(entry.shutdown().await);
}

#[tokio::test]
async fn test_nested_decorators_and_wrapped_handler() {
    let registry = StageRegistry::with_builtins();
    registry.register_stage(StageType::transform("picky", TypeTag::TEXT, TypeTag::TEXT, || {
        FailingStage::on("X")
    }));
    let mut spec = Specification::new(Arc::new(registry), "picky").unwrap();
    let root = spec.root_id();
    let slot = spec.wrap(root, LOAD_BALANCE).unwrap();
    spec.wrap_wrapper(slot, SPIN_UP).unwrap();
    let handler = spec.set_error_handler(root, LOG_FAILURE).unwrap();
    spec.wrap_error_handler(handler, SPIN_UP).unwrap();

    let system = system_with(PipelineConfig::default().with_pool_size(2));
    let mut sink = CollectingSink::new(16);
    let entry = PipelineBuilder::new(system.clone())
        .build_with_sink(&spec, sink.stage_ref())
        .await
        .unwrap();

    entry.put("X").await;
    entry.put("y").await;
    entry.close().await;

    assert_eq!(texts(&sink.collect_until_shutdown(WAIT).await), vec!["y"]);
    assert!(system.wait_for_live_workers(0, WAIT).await);
}

#[tokio::test]
async fn test_global_handler_reaches_nodes_added_later() {
    let registry = StageRegistry::with_builtins();
    registry.register_stage(StageType::transform("picky", TypeTag::TEXT, TypeTag::TEXT, || {
        FailingStage::on("x")
    }));
    let failures = RecordingStage::new();
    let recorder = failures.clone();
    registry.register_stage(StageType::error_handler("record_failures", move || recorder.clone()));

    let mut spec = Specification::new(Arc::new(registry), UPPERCASE).unwrap();
    spec.set_global_error_handler("record_failures").unwrap();
    let lower = spec.add_child(spec.root_id(), LOWERCASE).unwrap();
    spec.add_child(lower, "picky").unwrap();

    let system = PipelineSystem::new("global-handler");
    let entry = PipelineBuilder::new(system).build(&spec).await.unwrap();
    entry.put("X").await;
    assert!(entry.shutdown().await);

    let notices = failures.payloads();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].as_failure().unwrap().stage_type, "picky");
}

#[tokio::test]
async fn test_build_emits_event() {
    let events = Arc::new(CollectingEventSink::new());
    let system = PipelineSystem::builder("events")
        .event_sink(events.clone())
        .build()
        .unwrap();
    let mut spec = Specification::new(Arc::new(StageRegistry::with_builtins()), UPPERCASE).unwrap();
    let handler = spec.set_error_handler(spec.root_id(), LOG_FAILURE).unwrap();
    assert_ne!(handler, spec.root_id());

    let entry = PipelineBuilder::new(system).build(&spec).await.unwrap();
    let built = events.events_of_type(PIPELINE_BUILT);
    assert_eq!(built.len(), 1);
    assert!(entry.shutdown().await);
}

#[tokio::test]
async fn test_closed_system_builds_nothing() {
    let system = PipelineSystem::new("closed");
    system.shutdown();
    let spec = Specification::new(Arc::new(StageRegistry::with_builtins()), UPPERCASE).unwrap();

    let result = PipelineBuilder::new(system.clone()).build(&spec).await;
    assert!(matches!(result, Err(PipeflowError::SystemClosed(_))));
    assert_eq!(system.live_workers(), 0);
}

#[tokio::test]
async fn test_failed_build_aborts_spawned_workers() {
    let events = Arc::new(CollectingEventSink::new());
    let system = PipelineSystem::builder("half-built")
        .event_sink(events.clone())
        .build()
        .unwrap();

    // The root is spawned after its child, so the child is already running
    // when the root's factory closes the system.
    let registry = StageRegistry::with_builtins();
    let closer = system.clone();
    registry.register_stage(StageType::transform("closer", TypeTag::TEXT, TypeTag::TEXT, move || {
        closer.shutdown();
        Uppercase
    }));
    let mut spec = Specification::new(Arc::new(registry), "closer").unwrap();
    spec.add_child(spec.root_id(), LOG_STRING).unwrap();

    let result = PipelineBuilder::new(system.clone()).build(&spec).await;

    assert!(matches!(result, Err(PipeflowError::SystemClosed(_))));
    assert_eq!(events.events_of_type(WORKER_SPAWNED).len(), 1);
    assert!(events.events_of_type(PIPELINE_BUILT).is_empty());
    assert!(system.wait_for_live_workers(0, WAIT).await);
}

#[tokio::test]
async fn test_system_shutdown_stops_every_worker() {
    let mut spec = Specification::new(Arc::new(StageRegistry::with_builtins()), UPPERCASE).unwrap();
    let root = spec.root_id();
    spec.wrap(root, LOAD_BALANCE).unwrap();
    spec.add_child(root, LOG_STRING).unwrap();

    let system = PipelineSystem::new("teardown");
    let mut sink = CollectingSink::new(16);
    let entry = PipelineBuilder::new(system.clone())
        .build_with_sink(&spec, sink.stage_ref())
        .await
        .unwrap();
    entry.put("x").await;
    assert_eq!(sink.next(WAIT).await, Some(Payload::from("X")));
    assert_eq!(system.live_workers(), 6);

    system.shutdown();
    assert!(system.wait_for_live_workers(0, WAIT).await);
}
