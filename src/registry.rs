//! Startup assembly: which transitions and tasks run, built explicitly from
//! configuration.
//!
//! A transition whose configuration fails validation is left out and
//! reported; the others still load. With `strict_transitions = true` any such
//! failure aborts startup instead.

use std::sync::Arc;

use crate::config::{self, SentinelConfig};
use crate::error::{Result, SentinelError};
use crate::pipeline::TransitionPipeline;
use crate::scheduler::{Clock, Task, TaskContext, Windowed};
use crate::tasks::DueTasks;
use crate::transitions::update_contact::{self, UpdateContactConfig};
use crate::transitions::update_sent_forms;
use crate::transitions::{Transition, UpdateContact, UpdateSentForms, WellFormedSubmission};

type Builder = fn(&TaskContext) -> Result<Arc<dyn Transition>>;

/// Every known transition, in execution order.
const TRANSITIONS: &[(&str, Builder)] = &[
    (update_contact::NAME, build_update_contact),
    (update_sent_forms::NAME, build_update_sent_forms),
];

fn build_update_contact(ctx: &TaskContext) -> Result<Arc<dyn Transition>> {
    let config = UpdateContactConfig::from_provider(ctx.config.as_ref())?;
    Ok(Arc::new(UpdateContact::new(
        config,
        ctx.store.clone(),
        Arc::new(WellFormedSubmission),
    )))
}

fn build_update_sent_forms(ctx: &TaskContext) -> Result<Arc<dyn Transition>> {
    Ok(Arc::new(UpdateSentForms::new(ctx.store.clone())))
}

/// Outcome of loading transitions.
#[derive(Debug, Default)]
pub struct StartupReport {
    pub loaded: Vec<String>,
    pub disabled: Vec<String>,
    pub failed: Vec<(String, SentinelError)>,
}

impl StartupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The assembled process: tasks in tick order plus what was loaded.
pub struct Registry {
    pub tasks: Vec<Arc<dyn Task>>,
    pub report: StartupReport,
}

/// Build and validate every enabled transition.
pub fn load_transitions(
    ctx: &TaskContext,
    settings: &SentinelConfig,
) -> (Vec<Arc<dyn Transition>>, StartupReport) {
    let mut transitions = Vec::new();
    let mut report = StartupReport::default();

    for (name, build) in TRANSITIONS {
        if !settings.transition_enabled(name) {
            tracing::info!(transition = name, "transition disabled");
            report.disabled.push(name.to_string());
            continue;
        }
        match build(ctx).and_then(|t| t.init().map(|()| t)) {
            Ok(transition) => {
                tracing::info!(transition = name, "transition loaded");
                report.loaded.push(name.to_string());
                transitions.push(transition);
            }
            Err(e) => {
                tracing::error!(transition = name, error = %e, "transition failed to load");
                report.failed.push((name.to_string(), e));
            }
        }
    }
    (transitions, report)
}

/// Assemble the tick's task list: the transition pipeline first, then the
/// windowed tasks.
pub fn assemble(ctx: &TaskContext, clock: Arc<dyn Clock>) -> Result<Registry> {
    let settings: SentinelConfig = config::section_root(ctx.config.as_ref())?;
    let (transitions, report) = load_transitions(ctx, &settings);

    if settings.strict_transitions && !report.is_clean() {
        let names: Vec<&str> = report.failed.iter().map(|(n, _)| n.as_str()).collect();
        return Err(SentinelError::Config(format!(
            "Refusing to start with invalid transitions: {}",
            names.join(", ")
        )));
    }

    let pipeline = TransitionPipeline::new(transitions, ctx.audit.clone());
    tracing::info!(transitions = ?pipeline.names(), "transition pipeline ready");
    let tasks: Vec<Arc<dyn Task>> = vec![
        Arc::new(pipeline),
        Arc::new(Windowed::new(DueTasks::new(clock.clone()), clock)),
    ];
    Ok(Registry { tasks, report })
}
