use std::{process::ExitCode, sync::Arc};

use serde::Serialize;
use tracing::{Dispatch, Level, debug, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use tutor_render::{
    application::{
        error::{AppError, ErrorReport},
        render::{
            ContainerOptions, ContainerReport, ContentSpan, RenderManager, StatsSnapshot,
            analyze_content, apply_defensive_override, normalize_content, split_mixed_content,
        },
    },
    config::{self, ClassifyArgs, Command, RenderArgs, Settings},
    domain::types::RenderDecision,
    infra::{
        error::InfraError,
        headless::{DocumentFixture, ElementSnapshot, HeadlessDocument, HeadlessElement},
        katex::KatexEngine,
        telemetry,
    },
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report_application_error(&error);
            ExitCode::from(error.exit_code())
        }
    }
}

fn report_application_error(error: &AppError) {
    let report = ErrorReport::from_error("main", error);
    let log = || {
        error!(
            source = report.source,
            causes = ?report.messages,
            "tutor-render failed: {error}"
        );
    };

    if dispatcher::has_been_set() {
        log();
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, log);
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    match &cli_args.command {
        Command::Render(args) => run_render(&settings, args).await,
        Command::Classify(args) => run_classify(args),
    }
}

#[derive(Serialize)]
struct RenderOutput {
    report: ContainerReport,
    elements: Vec<ElementSnapshot>,
    stats: StatsSnapshot,
}

async fn run_render(settings: &Settings, args: &RenderArgs) -> Result<(), AppError> {
    let raw = tokio::fs::read_to_string(&args.fixture)
        .await
        .map_err(InfraError::from)?;
    let fixture: DocumentFixture = serde_json::from_str(&raw).map_err(InfraError::from)?;

    let document = Arc::new(HeadlessDocument::new());
    let manager = RenderManager::from_settings(
        Arc::new(KatexEngine::new()),
        Arc::clone(&document) as _,
        settings,
    );
    if let Some(solution) = fixture.solution.as_ref() {
        manager.set_solution_metadata(solution);
    }

    let container = HeadlessElement::from_fixture(&fixture.container);
    let options = ContainerOptions::default().with_progress(|completed, total| {
        debug!(completed, total, "Render progress");
    });
    let report = manager.render_container(container.as_ref(), options).await;

    if document.attached_surfaces() > 0 {
        return Err(AppError::unexpected(format!(
            "{} measurement surfaces left attached",
            document.attached_surfaces()
        )));
    }
    manager.log_performance_report();
    info!(
        fixture = %args.fixture.display(),
        rendered = report.rendered,
        failed = report.failed,
        "Fixture rendered"
    );

    let output = RenderOutput {
        report,
        elements: container.snapshot_renderables(),
        stats: manager.stats(),
    };
    print_json(&output, args.pretty)
}

#[derive(Serialize)]
struct ClassifyOutput {
    normalized: String,
    decision: RenderDecision,
    spans: Vec<ContentSpan>,
}

fn run_classify(args: &ClassifyArgs) -> Result<(), AppError> {
    let normalized = normalize_content(&args.text);
    if normalized.is_empty() {
        return Err(AppError::validation("content is empty after normalization"));
    }

    let decision = apply_defensive_override(analyze_content(&normalized), &normalized);
    let spans = split_mixed_content(&normalized);

    print_json(
        &ClassifyOutput {
            normalized,
            decision,
            spans,
        },
        true,
    )
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), AppError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(InfraError::from)?;
    println!("{json}");
    Ok(())
}
