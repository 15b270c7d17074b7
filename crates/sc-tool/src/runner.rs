use std::path::Path;

use sc_api::{create_session, CreateSessionOptions};
use sc_core::{ScValue, ScribeError};
use sc_runtime::{RenderedPassage, Session, SessionOptions};

use crate::source::{read_story_files_from_dir, read_test_case};
use crate::{ObservedEvent, ScToolError, TestAction, TestCase};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub observed_events: Vec<ObservedEvent>,
    pub consumed_actions: usize,
}

fn observe(result: Result<RenderedPassage, ScribeError>) -> ObservedEvent {
    match result {
        Ok(rendered) => ObservedEvent::Passage {
            links: rendered
                .all_links()
                .into_iter()
                .map(|link| link.text)
                .collect(),
            name: rendered.passage,
            body: rendered.body,
        },
        Err(error) => ObservedEvent::Error { code: error.code },
    }
}

fn apply_action(
    session: &mut Session,
    action: &TestAction,
) -> Result<RenderedPassage, ScribeError> {
    match action {
        TestAction::Goto { passage } => session.goto(passage),
        TestAction::Choose { index } => session.choose(*index),
        TestAction::Input { path, value, next } => {
            session.submit_input(path, ScValue::String(value.clone()), next.as_deref())
        }
    }
}

/// Starts the story, then records one event per action. Engine errors raised
/// by an action are recorded rather than aborting the run.
pub fn run_case(story_dir: &Path, case: &TestCase) -> Result<RunReport, ScToolError> {
    let story_files = read_story_files_from_dir(story_dir)?;
    let mut session = create_session(CreateSessionOptions {
        story_files,
        session: SessionOptions {
            debug: case.debug,
            random_seed: Some(case.random_seed),
            fixed_time: None,
        },
    })?;

    let mut observed_events = vec![observe(session.start())];
    for action in &case.actions {
        observed_events.push(observe(apply_action(&mut session, action)));
    }

    Ok(RunReport {
        observed_events,
        consumed_actions: case.actions.len(),
    })
}

pub fn assert_case(story_dir: &Path, case_path: &Path) -> Result<(), ScToolError> {
    let case = read_test_case(case_path)?;
    let report = run_case(story_dir, &case)?;

    if report.observed_events.len() != case.expected_events.len() {
        let observed = serde_json::to_string_pretty(&report.observed_events)
            .map_err(ScToolError::EventSerialize)?;
        return Err(ScToolError::EventCountMismatch {
            expected: case.expected_events.len(),
            actual: report.observed_events.len(),
            observed,
        });
    }

    for (index, (expected, actual)) in case
        .expected_events
        .iter()
        .zip(report.observed_events.iter())
        .enumerate()
    {
        if !expected.matches(actual) {
            let expected = serde_json::to_string(expected).map_err(ScToolError::EventSerialize)?;
            let actual = serde_json::to_string(actual).map_err(ScToolError::EventSerialize)?;
            return Err(ScToolError::EventMismatch {
                index,
                expected,
                actual,
            });
        }
    }

    Ok(())
}
