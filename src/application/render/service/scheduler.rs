//! Container scan with priority-first, batched rendering.

use std::{sync::Arc, time::Instant};

use futures::future::join_all;
use tracing::{debug, info};

use crate::application::render::runtime::LayoutGuard;
use crate::application::render::types::{
    ContainerOptions, ContainerReport, RenderOptions, RenderTarget,
};
use crate::domain::dom::{RenderContainer, RenderElement, attributes, markers};

use super::RenderManager;

const TARGET: &str = "application::render::scheduler";

impl RenderManager {
    /// Render every smart-content and latex-content element under `container`.
    ///
    /// Priority elements render one at a time before any normal batch starts.
    /// Normal elements render in batches whose members run concurrently. The
    /// container's layout is restored before returning, cancelled or not.
    pub async fn render_container(
        &self,
        container: &dyn RenderContainer,
        options: ContainerOptions,
    ) -> ContainerReport {
        let ContainerOptions {
            mut on_progress,
            cancel,
        } = options;
        let cancel = cancel.unwrap_or_else(|| self.cancel_token());
        let started = Instant::now();

        let _layout = LayoutGuard::ensure_measurable(container);

        if !self.adapter.is_ready() {
            self.adapter.initialize().await;
        }

        let targets = collect_targets(container);
        let mut report = ContainerReport {
            total: targets.len(),
            ..ContainerReport::default()
        };
        if targets.is_empty() {
            debug!(target = TARGET, "No renderable elements in container");
            return report;
        }

        let (priority, normal): (Vec<_>, Vec<_>) = targets
            .into_iter()
            .partition(|target| self.is_priority(target.element.as_ref()));
        report.priority = priority.len();
        report.normal = normal.len();

        for target in &priority {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let rendered = self.render_target(target).await;
            tally(&mut report, rendered);
            tokio::time::sleep(self.config.priority_pause).await;
        }

        let batch_size = self.batch_size();
        let batch_count = normal.len().div_ceil(batch_size);

        for (index, batch) in normal.chunks(batch_size).enumerate() {
            if report.cancelled || cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let outcomes = join_all(batch.iter().map(|target| self.render_target(target))).await;
            for rendered in outcomes {
                tally(&mut report, rendered);
            }
            report.batches += 1;

            let completed = priority.len() + ((index + 1) * batch_size).min(normal.len());
            if let Some(callback) = on_progress.as_mut() {
                callback(completed, report.total);
            }

            if index + 1 < batch_count {
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        info!(
            target = TARGET,
            total = report.total,
            priority = report.priority,
            normal = report.normal,
            batches = report.batches,
            rendered = report.rendered,
            failed = report.failed,
            cancelled = report.cancelled,
            batch_size,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Container render finished"
        );

        report
    }

    async fn render_target(&self, target: &RenderTarget) -> bool {
        let options = RenderOptions {
            display_mode: target.display_mode,
        };
        self.render_element(target.element.as_ref(), target.content.as_deref(), options)
            .await
    }
}

fn tally(report: &mut ContainerReport, rendered: bool) {
    if rendered {
        report.rendered += 1;
    } else {
        report.failed += 1;
    }
}

/// Smart-content elements first, then latex-content elements, each in
/// document order. Elements with blank content are skipped.
fn collect_targets(container: &dyn RenderContainer) -> Vec<RenderTarget> {
    let smart = container
        .collect(markers::SMART_CONTENT)
        .into_iter()
        .filter(|element| !element.has_marker(markers::LATEX_CONTENT))
        .map(|element| target_for(element, attributes::CONTENT, false));
    let latex = container
        .collect(markers::LATEX_CONTENT)
        .into_iter()
        .map(|element| target_for(element, attributes::LATEX, true));

    smart
        .chain(latex)
        .filter(|target| {
            target
                .content
                .as_deref()
                .is_some_and(|content| !content.trim().is_empty())
        })
        .collect()
}

fn target_for(
    element: Arc<dyn RenderElement>,
    attribute: &str,
    display_mode: bool,
) -> RenderTarget {
    let content = element
        .attribute(attribute)
        .unwrap_or_else(|| element.text_content());
    RenderTarget {
        element,
        content: Some(content),
        display_mode,
    }
}
