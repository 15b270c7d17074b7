use sc_api::load_story;
use sc_core::{ScribeError, Story};
use sc_runtime::SessionOptions;

use crate::{create_session_for_story, load_story_by_dir, CheckArgs, CliFailure, InspectArgs};

/// Exit code of `check` when the story parses but has problems to report.
const CHECK_ISSUES_EXIT_CODE: i32 = 2;

pub(crate) fn check_lines(story: &Story) -> (Vec<String>, bool) {
    let mut lines = vec![
        "RESULT:OK".to_string(),
        format!("PASSAGES:{}", story.passages.len()),
    ];
    let start = &story.config.starting_passage;
    let start_found = story.contains(start);
    lines.push(format!(
        "START:{}|{}",
        start,
        if start_found { "FOUND" } else { "MISSING" }
    ));

    for duplicate in &story.duplicates {
        lines.push(format!(
            "DUPLICATE:{}|{}|{}",
            duplicate.name,
            duplicate.source_file.as_deref().unwrap_or("-"),
            duplicate.span.start.line
        ));
    }

    let dangling = story.dangling_links();
    for (passage, link) in &dangling {
        lines.push(format!(
            "DANGLING:{}|{}|{}",
            passage,
            link.target,
            serde_json::to_string(&link.text).expect("string json")
        ));
    }

    let clean = start_found && dangling.is_empty() && story.duplicates.is_empty();
    (lines, clean)
}

pub(crate) fn run_check(args: CheckArgs) -> Result<i32, ScribeError> {
    let loaded = load_story_by_dir(&args.story_dir)?;
    let story = load_story(&loaded.files)?;
    let (lines, clean) = check_lines(&story);
    for line in lines {
        println!("{}", line);
    }
    Ok(if clean { 0 } else { CHECK_ISSUES_EXIT_CODE })
}

/// Debug dump of a fresh session, or of one passage when `passage` is set.
pub(crate) fn inspect_json(
    story_dir: &str,
    passage: Option<&str>,
) -> Result<String, ScribeError> {
    let loaded = load_story_by_dir(story_dir)?;
    let session = create_session_for_story(
        &loaded,
        SessionOptions {
            debug: true,
            ..SessionOptions::default()
        },
    )?;
    match passage {
        Some(name) => serde_json::to_string(session.passage_view(name)?),
        None => serde_json::to_string(&session.debug_view()?),
    }
    .map_err(CliFailure::JsonEncode.wrap())
}

pub(crate) fn run_inspect(args: InspectArgs) -> Result<i32, ScribeError> {
    let json = inspect_json(&args.story_dir, args.passage.as_deref())?;
    println!("RESULT:OK");
    println!("INSPECT_JSON:{}", json);
    Ok(0)
}
