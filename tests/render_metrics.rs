mod support;

use std::collections::HashMap;

use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::json;
use tutor_render::application::render::RenderOptions;

use support::{Readiness, ScriptedEngine, manager, tree};

#[test]
fn render_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime should build");

        runtime.block_on(async {
            let (manager, _) = manager(ScriptedEngine::new(Readiness::Immediate));
            manager.set_solution_metadata(&json!({
                "renderMetadata": { "contentTypes": { "finalAnswer": "text" } }
            }));

            let answer = tree(json!({ "attributes": { "data-field": "finalAnswer" } }));
            let prose = tree(json!({ "classes": ["smart-content"] }));
            let broken = tree(json!({ "classes": ["latex-content"] }));

            manager
                .render_element(answer.as_ref(), Some("Sonuç beş"), RenderOptions::default())
                .await;
            manager
                .render_element(prose.as_ref(), Some("Merhaba dünya"), RenderOptions::default())
                .await;
            manager
                .render_element(broken.as_ref(), Some(r"\broken"), RenderOptions::default())
                .await;
        });
    });

    let values: HashMap<String, DebugValue> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| (composite_key.key().name().to_string(), value))
        .collect();

    let counter = |name: &str| match values.get(name) {
        Some(DebugValue::Counter(value)) => *value,
        other => panic!("missing counter {name}: {other:?}"),
    };

    assert_eq!(counter("tutor_render_success_total"), 2);
    assert_eq!(counter("tutor_render_failure_total"), 1);
    assert_eq!(counter("tutor_render_svg_error_total"), 1);
    assert_eq!(counter("tutor_render_metadata_hit_total"), 1);
    assert_eq!(counter("tutor_render_metadata_miss_total"), 1);
    assert!(
        matches!(
            values.get("tutor_render_duration_ms"),
            Some(DebugValue::Histogram(samples)) if samples.len() == 3
        ),
        "missing render duration histogram"
    );
}
