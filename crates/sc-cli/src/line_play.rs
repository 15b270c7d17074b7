use std::io::{self, BufRead, Write};

use sc_api::JsonFileSaveStore;
use sc_core::{LinkKind, ScribeError};
use sc_runtime::{Diagnostic, RenderedPassage, Session, SessionOptions};

use crate::{
    create_session_for_story, load_story_by_dir, CliFailure, LineCommandAction,
    LineCommandContext, PlayArgs, DEFAULT_SAVES_DIR,
};

const HELP_LINE: &str = "commands: :help :save N :load N :restart :quit";

pub(crate) fn run_play(args: PlayArgs) -> Result<i32, ScribeError> {
    let story = load_story_by_dir(&args.story_dir)?;
    let store = JsonFileSaveStore::new(
        args.saves_dir
            .unwrap_or_else(|| DEFAULT_SAVES_DIR.to_string()),
    );
    let mut session = create_session_for_story(
        &story,
        SessionOptions {
            debug: args.debug,
            random_seed: args.seed,
            fixed_time: None,
        },
    )?;
    let context = LineCommandContext {
        story: &story,
        store: &store,
    };

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut writer = io::stdout();
    run_play_with_io(&context, &mut session, &mut reader, &mut writer)
}

pub(crate) fn run_play_with_io(
    context: &LineCommandContext<'_>,
    session: &mut Session,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> Result<i32, ScribeError> {
    writeln!(writer, "{}", session.story().config.title).map_err(CliFailure::PlayIo.wrap())?;
    writeln!(writer, "{}", HELP_LINE).map_err(CliFailure::PlayIo.wrap())?;

    let rendered = session.start()?;
    show(session, rendered, writer)?;

    loop {
        let Some(raw) = prompt_input_from("> ", reader, writer)? else {
            return Ok(0);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let mut emit =
            |line: String| writeln!(writer, "{}", line).map_err(CliFailure::PlayIo.wrap());
        match handle_line_cmd(raw, context, session, &mut emit)? {
            LineCommandAction::Continue => continue,
            LineCommandAction::Quit => return Ok(0),
            LineCommandAction::Rerender => {
                let target = session.state().current_passage.clone();
                let result = session.goto(&target);
                show_result(session, result, writer)?;
                continue;
            }
            LineCommandAction::NotHandled => {}
        }

        let result = match raw.parse::<usize>() {
            Ok(index) => session.choose(index),
            Err(_) => Err(ScribeError::navigation(
                "PLAY_CHOICE_PARSE",
                format!("Invalid link index: {}", raw),
            )),
        };
        show_result(session, result, writer)?;
    }
}

/// Handles `:`-commands. Story errors inside a command are reported and
/// the loop keeps going; only I/O on the terminal aborts.
pub(crate) fn handle_line_cmd(
    raw: &str,
    context: &LineCommandContext<'_>,
    session: &mut Session,
    emit: &mut dyn FnMut(String) -> Result<(), ScribeError>,
) -> Result<LineCommandAction, ScribeError> {
    let (command, argument) = match raw.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (raw, ""),
    };
    let slot = if argument.is_empty() { "1" } else { argument };

    match command {
        ":help" => {
            emit(HELP_LINE.to_string())?;
            Ok(LineCommandAction::Continue)
        }
        ":save" => {
            match context.store.save(slot, &session.snapshot()) {
                Ok(()) => emit(format!("saved: slot {}", slot))?,
                Err(error) => emit(format!("error: {}", error))?,
            }
            Ok(LineCommandAction::Continue)
        }
        ":load" => match context.store.load(slot) {
            Ok(Some(state)) => {
                session.restore(state);
                emit(format!("loaded: slot {}", slot))?;
                Ok(LineCommandAction::Rerender)
            }
            Ok(None) => {
                emit(format!("empty slot: {}", slot))?;
                Ok(LineCommandAction::Continue)
            }
            Err(error) => {
                emit(format!("error: {}", error))?;
                Ok(LineCommandAction::Continue)
            }
        },
        ":restart" => {
            session.reset();
            emit(format!("restarted: {}", context.story.id))?;
            Ok(LineCommandAction::Rerender)
        }
        ":quit" => {
            emit("bye".to_string())?;
            Ok(LineCommandAction::Quit)
        }
        _ => Ok(LineCommandAction::NotHandled),
    }
}

fn show_result(
    session: &mut Session,
    result: Result<RenderedPassage, ScribeError>,
    writer: &mut dyn Write,
) -> Result<(), ScribeError> {
    match result {
        Ok(rendered) => show(session, rendered, writer),
        Err(error) => writeln!(writer, "error: {}", error).map_err(CliFailure::PlayIo.wrap()),
    }
}

/// Prints a render and follows redirect links the way a browser client
/// would, bounded by the story's redirect limit.
fn show(
    session: &mut Session,
    mut rendered: RenderedPassage,
    writer: &mut dyn Write,
) -> Result<(), ScribeError> {
    let max_follows = session.story().config.sandbox.max_redirects;
    for _ in 0..=max_follows {
        print_passage(&rendered, session.options().debug, writer)?;
        let Some(redirect) = rendered
            .all_links()
            .into_iter()
            .find(|link| link.kind == LinkKind::Redirect)
        else {
            return Ok(());
        };
        writeln!(writer, "(continuing to {})", redirect.target).map_err(CliFailure::PlayIo.wrap())?;
        rendered = match session.choose(redirect.index) {
            Ok(next) => next,
            Err(error) => {
                return writeln!(writer, "error: {}", error).map_err(CliFailure::PlayIo.wrap());
            }
        };
    }
    writeln!(writer, "error: too many redirect links in a row").map_err(CliFailure::PlayIo.wrap())
}

fn print_passage(
    rendered: &RenderedPassage,
    debug: bool,
    writer: &mut dyn Write,
) -> Result<(), ScribeError> {
    writeln!(writer).map_err(CliFailure::PlayIo.wrap())?;
    if !rendered.body.is_empty() {
        writeln!(writer, "{}", rendered.body).map_err(CliFailure::PlayIo.wrap())?;
    }
    for link in rendered.all_links() {
        match link.kind {
            LinkKind::External => {
                writeln!(writer, "  [{}] {} ({})", link.index, link.text, link.target)
            }
            _ => writeln!(writer, "  [{}] {}", link.index, link.text),
        }
        .map_err(CliFailure::PlayIo.wrap())?;
    }
    if !debug {
        return Ok(());
    }
    for diagnostic in &rendered.diagnostics {
        match diagnostic {
            Diagnostic::Error { error, .. } => writeln!(writer, "! {}", error),
            Diagnostic::Log { message, .. } => writeln!(writer, "~ {}", message),
        }
        .map_err(CliFailure::PlayIo.wrap())?;
    }
    Ok(())
}

/// `None` at end of input.
pub(crate) fn prompt_input_from(
    prefix: &str,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> Result<Option<String>, ScribeError> {
    write!(writer, "{}", prefix).map_err(CliFailure::PlayIo.wrap())?;
    writer.flush().map_err(CliFailure::PlayIo.wrap())?;
    let mut input = String::new();
    let read = reader.read_line(&mut input).map_err(CliFailure::PlayIo.wrap())?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim_end_matches(&['\r', '\n'][..]).to_string()))
}

#[cfg(test)]
mod line_play_tests {
    use super::*;
    use crate::cli_test_support::*;
    use sc_api::MemorySaveStore;

    fn play(story: &str, input: &str) -> String {
        let loaded = load_story_by_dir(&story_dir(story)).expect("story");
        let store = MemorySaveStore::new();
        let context = LineCommandContext {
            story: &loaded,
            store: &store,
        };
        let mut session =
            create_session_for_story(&loaded, SessionOptions::default()).expect("session");
        let mut reader = io::Cursor::new(input.as_bytes().to_vec());
        let mut writer = Vec::new();
        let code = run_play_with_io(&context, &mut session, &mut reader, &mut writer)
            .expect("play should finish");
        assert_eq!(code, 0);
        String::from_utf8(writer).expect("utf-8 output")
    }

    #[test]
    fn numbered_choices_follow_links_until_input_ends() {
        let output = play("01-basic-links", "0\n9\nnope\n");
        assert!(output.starts_with("Crossroads\n"));
        assert!(output.contains("  [0] North"));
        assert!(output.contains("  [2] Restart"));
        assert!(output.contains("A cold wind blows from the mountains."));
        assert!(output.contains("error: NAV_INVALID_LINK"));
        assert!(output.contains("error: PLAY_CHOICE_PARSE"));
    }

    #[test]
    fn save_load_and_restart_commands() {
        let output = play(
            "01-basic-links",
            ":save 2\n0\n:load 2\n:load 5\n:restart\n:help\n:quit\n0\n",
        );
        assert!(output.contains("saved: slot 2"));
        assert!(output.contains("loaded: slot 2"));
        assert!(output.contains("empty slot: 5"));
        assert!(output.contains("restarted: story-dir:"));
        assert!(output.ends_with("bye\n"));
        assert_eq!(output.matches("You stand at a crossroads.").count(), 3);
    }

    #[test]
    fn redirect_links_are_followed_automatically() {
        let root = temp_path("play-redirect");
        write_file(
            &root.join("story.tgame"),
            ":: start\nLoading\n[[Continue=>hall]]\n\n:: hall\nReady",
        );
        let loaded = load_story_by_dir(root.to_string_lossy().as_ref()).expect("story");
        let store = MemorySaveStore::new();
        let context = LineCommandContext {
            story: &loaded,
            store: &store,
        };
        let mut session =
            create_session_for_story(&loaded, SessionOptions::default()).expect("session");
        let mut reader = io::Cursor::new(Vec::new());
        let mut writer = Vec::new();
        run_play_with_io(&context, &mut session, &mut reader, &mut writer).expect("play");
        let output = String::from_utf8(writer).expect("utf-8 output");
        assert!(output.contains("(continuing to hall)"));
        assert!(output.contains("Ready"));
        assert_eq!(session.state().current_passage, "hall");
    }

    #[test]
    fn prompt_input_reports_end_of_input() {
        let mut reader = io::Cursor::new(b"line\r\n".to_vec());
        let mut writer = Vec::new();
        assert_eq!(
            prompt_input_from("> ", &mut reader, &mut writer).expect("read"),
            Some("line".to_string())
        );
        assert_eq!(prompt_input_from("> ", &mut reader, &mut writer).expect("eof"), None);
        assert_eq!(writer, b"> > ".to_vec());
    }
}
