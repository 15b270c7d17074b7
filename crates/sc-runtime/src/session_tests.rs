use std::collections::BTreeMap;

use sc_core::{ErrorKind, LinkKind, ScValue};

use crate::runtime_test_support::*;
use crate::{Diagnostic, Session};

#[test]
fn plain_links_are_described_and_followed() {
    let mut session = session(":: start\nHi\n[[Go->B]]\n\n:: B\nThere");
    let first = session.start().expect("start");
    assert_eq!(first.passage, "start");
    assert!(first.body.contains("Hi"));
    assert_eq!(first.links.len(), 1);
    assert_eq!(first.links[0].text, "Go");
    assert_eq!(first.links[0].target, "B");
    assert_eq!(first.links[0].kind, LinkKind::Plain);

    let second = session.choose(0).expect("choose");
    assert_eq!(second.body, "There");
    assert!(second.links.is_empty());
    assert_eq!(second.last_passage.as_deref(), Some("B"));
    assert_eq!(session.state().current_passage, "B");
}

#[test]
fn unknown_passages_fail_the_request() {
    let mut session = session(":: start\n[[Nowhere->void]]");
    let error = session.goto("missing").expect_err("unknown");
    assert_eq!(error.kind, ErrorKind::UnknownPassage);
    assert_eq!(error.code, "NAV_UNKNOWN_PASSAGE");

    session.start().expect("start");
    let error = session.choose(0).expect_err("dangling link");
    assert_eq!(error.kind, ErrorKind::UnknownPassage);
    let error = session.choose(9).expect_err("invalid index");
    assert_eq!(error.code, "NAV_INVALID_LINK");
}

#[test]
fn silent_passages_redirect_without_output_or_history() {
    let mut session = session(
        ":: start\nHome\n[[Check->gate]]\n\n\
         :: gate #silent\nSILENT TEXT\n{$- if get_flag(\"pass\") { redirect(\"inside\") } -$}\n[[x=>outside]]\n\n\
         :: inside\nWelcome\n\n\
         :: outside\nGo away",
    );
    session.start().expect("start");
    let rendered = session.choose(0).expect("choose");
    assert_eq!(rendered.passage, "outside");
    assert_eq!(rendered.redirected_from, vec!["gate"]);
    assert!(!rendered.body.contains("SILENT"));
    assert_eq!(session.state().last_passage.as_deref(), Some("outside"));

    session.start().expect("start again");
    let mut state = session.snapshot();
    state.set_flag("pass", true);
    session.restore(state);
    let rendered = session.goto("gate").expect("redirect via script");
    assert_eq!(rendered.passage, "inside");
    assert_ne!(session.state().last_passage.as_deref(), Some("gate"));
}

#[test]
fn silent_passage_without_a_target_is_an_error() {
    let mut session = session(":: start #silent\nnothing here");
    let error = session.start().expect_err("no target");
    assert_eq!(error.code, "NAV_SILENT_WITHOUT_TARGET");
    assert_eq!(error.kind, ErrorKind::Navigation);
}

#[test]
fn redirect_discards_the_passage_output_and_loops_are_bounded() {
    let mut session = session(
        ":: start\nnever shown{$ redirect(\"end\") $}\n\n:: end\nDone\n\n\
         :: ping\n{$ redirect(\"pong\") $}\n\n:: pong\n{$ redirect(\"ping\") $}",
    );
    let rendered = session.start().expect("start");
    assert_eq!(rendered.passage, "end");
    assert_eq!(rendered.body, "Done");

    let error = session.goto("ping").expect_err("loop");
    assert_eq!(error.code, "NAV_REDIRECT_LOOP");
}

#[test]
fn menu_passages_do_not_update_last_passage() {
    let mut session = session(
        ":: start\nRoom\n[[Inventory->bag]]\n\n\
         :: bag #menu\nYour bag.\n[[Back->{{ last_passage }}]]",
    );
    session.start().expect("start");
    let bag = session.choose(0).expect("open menu");
    assert_eq!(bag.passage, "bag");
    assert_eq!(bag.last_passage.as_deref(), Some("start"));
    assert_eq!(bag.links[0].target, "start");
    assert_eq!(session.state().current_passage, "bag");

    let back = session.choose(0).expect("back");
    assert_eq!(back.passage, "start");
}

#[test]
fn passage_tags_are_visible_to_templates() {
    let mut session = session(
        ":: start #dark #cave\n{% if \"dark\" in passage_tags %}Pitch black.{% endif %}",
    );
    let rendered = session.start().expect("start");
    assert_eq!(rendered.body, "Pitch black.");
    assert_eq!(rendered.tags, vec!["dark", "cave"]);
    assert_eq!(session.state().passage_tags, vec!["dark", "cave"]);
}

#[test]
fn wrappers_and_nav_menu_are_composed() {
    let mut session = session(
        ":: PrePassage\nHP {{ player.health }}\n[[hidden->start]]\n\n\
         :: PostPassage\n-- end --\n\n\
         :: NavMenu\n[[Restart->start]]\n\n\
         :: start\nMain text\n[[Next->two]]\n\n\
         :: two\nSecond",
    );
    let rendered = session.start().expect("start");
    assert_eq!(rendered.body, "HP 100\n\nMain text\n\n-- end --");
    assert_eq!(rendered.links.len(), 1);
    let nav = rendered.nav.clone().expect("nav menu");
    assert_eq!(nav.links[0].index, 1);
    assert_eq!(nav.links[0].target, "start");
    assert_eq!(session.links().len(), 2);

    let again = session.choose(1).expect("nav link");
    assert_eq!(again.passage, "start");
}

#[test]
fn pre_passage_runs_before_the_main_passage() {
    let mut session = session(
        ":: PrePassage\n{$ set_variable(\"turn\", get_variable(\"turn\", 0) + 1) $}Turn {{ variables.turn }}\n\n\
         :: start\nMain sees {{ variables.turn }}\n[[Hop->hop]]\n\n\
         :: hop\n{$ redirect(\"end\") $}\n\n\
         :: end\nEnd sees {{ variables.turn }}",
    );
    let rendered = session.start().expect("start");
    assert_eq!(rendered.body, "Turn 1\n\nMain sees 1");

    let rendered = session.choose(0).expect("hop");
    assert_eq!(rendered.passage, "end");
    assert_eq!(rendered.body, "Turn 2\n\nEnd sees 2");
    assert_eq!(
        session.state().get_variable("turn"),
        Some(&ScValue::Number(2.0))
    );
}

#[test]
fn failed_requests_leave_the_session_untouched() {
    let mut session = session(
        ":: start #home\nHome\n[[Go->gate]]\n[[Grab->gate||{$ set_flag(\"grabbed\") $}]]\n\n\
         :: gate #silent\n{$ set_flag(\"x\") $}[[y=>missing]]",
    );
    session.start().expect("start");
    let before = session.snapshot();

    let error = session.choose(0).expect_err("dangling redirect");
    assert_eq!(error.code, "NAV_UNKNOWN_PASSAGE");
    assert_eq!(session.snapshot(), before);
    assert_eq!(session.state().current_passage, "start");
    assert_eq!(session.state().passage_tags, vec!["home"]);

    session.choose(1).expect_err("action is rolled back too");
    assert!(!session.state().get_flag("grabbed", false));
    assert!(!session.state().get_flag("x", false));
    assert_eq!(session.links().len(), 2);

    session
        .submit_input("player.name", ScValue::from("Ada"), Some("gate"))
        .expect_err("input is rolled back");
    assert_eq!(session.state().player.name, before.player.name);

    let rendered = session.goto("start").expect("still usable");
    assert_eq!(rendered.body, "Home");
}

#[test]
fn fragments_run_in_order_before_templates() {
    let mut session = session(
        ":: start\n{$- set_variable(\"count\", 1); -$}\
         {$ set_variable(\"count\", get_variable(\"count\") + 1); write(get_variable(\"count\")) $}\n\
         Count is {{ variables.count }}.",
    );
    let rendered = session.start().expect("start");
    assert_eq!(rendered.body, "2\nCount is 2.");
}

#[test]
fn failing_fragments_are_contained() {
    let source = ":: start\nBefore {$ read_file(\"/etc/passwd\") $}after.\n{$ write(\"ok\") $}";
    let mut quiet = session(source);
    let rendered = quiet.start().expect("render survives");
    assert_eq!(rendered.body, "Before after.\nok");
    let errors: Vec<_> = rendered.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::SandboxCapability);
    assert_eq!(errors[0].passage.as_deref(), Some("start"));

    let mut loud = Session::new(story(source), options(true));
    let rendered = loud.start().expect("render survives");
    assert!(rendered.body.contains("[error: SANDBOX_NAME_NOT_FOUND:"));
}

#[test]
fn action_links_run_once_per_choice() {
    let mut session = Session::new(
        story_with(
            ":: start\n[[Take lamp->start||{$ add_to_inventory(\"lamp\"); set_flag(\"took\") $}]]\n\
             {% if get_flag(\"took\") %}Taken.{% endif %}",
            inventory_config(),
        ),
        options(false),
    );
    let rendered = session.start().expect("start");
    assert_eq!(rendered.links[0].kind, LinkKind::Action);
    assert!(!session.state().get_flag("took", false));
    assert_eq!(session.state().item_count("lamp"), 0);

    let after = session.choose(0).expect("first click");
    assert!(session.state().get_flag("took", false));
    assert_eq!(session.state().item_count("lamp"), 1);
    assert_eq!(after.body, "Taken.");

    session.choose(0).expect("second click");
    assert_eq!(session.state().item_count("lamp"), 2);
}

#[test]
fn action_errors_surface_on_the_next_render() {
    let mut session = session(":: start\n[[Break->||{$ undefined_call() $}]]\nHere");
    session.start().expect("start");
    let rendered = session.choose(0).expect("same passage");
    assert_eq!(rendered.passage, "start");
    assert!(matches!(
        &rendered.diagnostics[0],
        Diagnostic::Error { error, .. } if error.code == "SANDBOX_NAME_NOT_FOUND"
    ));
}

#[test]
fn redirect_links_are_marked_for_auto_follow() {
    let mut session = session(":: start\nLoading\n[[Continue=>next]]\n\n:: next\nReady");
    let rendered = session.start().expect("start");
    assert_eq!(rendered.links[0].kind, LinkKind::Redirect);
    assert_eq!(session.choose(0).expect("follow").body, "Ready");
}

#[test]
fn external_links_cannot_be_chosen() {
    let mut session = session(":: start\n[[Docs->https://example.org]]");
    let rendered = session.start().expect("start");
    assert_eq!(rendered.links[0].kind, LinkKind::External);
    assert_eq!(
        session.choose(0).expect_err("external").code,
        "NAV_EXTERNAL_LINK"
    );
}

#[test]
fn submit_input_and_apply_updates_write_state_paths() {
    let mut session = session(":: start\nName?\n\n:: hello\nHello {{ player.name }}!");
    session.start().expect("start");
    let rendered = session
        .submit_input("player.name", ScValue::from("Ada"), Some("hello"))
        .expect("input");
    assert_eq!(rendered.body, "Hello Ada!");

    let updates = BTreeMap::from([
        ("flags.door".to_string(), ScValue::Bool(true)),
        ("quest.stage".to_string(), ScValue::Number(2.0)),
    ]);
    session.apply_updates(&updates).expect("updates");
    assert!(session.state().get_flag("door", false));
    assert_eq!(
        session.state().get_variable("quest.stage"),
        Some(&ScValue::Number(2.0))
    );

    let bad = BTreeMap::from([
        ("aaa".to_string(), ScValue::Number(1.0)),
        ("flags.x".to_string(), ScValue::from("nope")),
    ]);
    assert!(session.apply_updates(&bad).is_err());
    assert_eq!(session.state().get_variable("aaa"), None);
}

#[test]
fn sessions_are_isolated() {
    let source = ":: start\n{$ set_flag(\"seen\") $}Hi";
    let mut first = session(source);
    let second = session(source);
    first.start().expect("start");
    assert!(first.state().get_flag("seen", false));
    assert!(!second.state().get_flag("seen", false));
}

#[test]
fn debug_views_are_gated() {
    let quiet = session(":: start\nHi");
    let error = quiet.debug_view().expect_err("gated");
    assert_eq!(error.kind, ErrorKind::Access);
    assert!(quiet.passage_view("start").is_err());

    let loud = Session::new(story(":: start\nHi"), options(true));
    let view = loud.debug_view().expect("debug view");
    assert!(view.passages.contains_key("start"));
    assert!(!view.capabilities.is_empty());
    assert_eq!(loud.passage_view("start").expect("passage").name, "start");
}

#[test]
fn debug_mode_collects_script_logs() {
    let mut session = Session::new(
        story(":: start\n{$ debug_log(\"entered\") $}Hi"),
        options(true),
    );
    let rendered = session.start().expect("start");
    assert!(rendered
        .diagnostics
        .iter()
        .any(|diagnostic| matches!(diagnostic, Diagnostic::Log { message, .. } if message == "entered")));
}

#[test]
fn reload_keeps_state_and_reset_starts_over() {
    let mut session = session(":: start\n{$ set_flag(\"a\") $}Old");
    session.start().expect("start");
    session.reload(story(":: start\nNew"));
    assert!(session.state().get_flag("a", false));
    assert_eq!(session.start().expect("start").body, "New");

    session.reset();
    assert!(session.state().flags.is_empty());
    assert_eq!(session.state().current_passage, "start");
    assert!(session.links().is_empty());
}

#[test]
fn seeded_sessions_render_identically() {
    let source = ":: start\nRoll {{ random(100) }} {$ write(random(100)) $}";
    let mut first = session(source);
    let mut second = session(source);
    assert_eq!(
        first.start().expect("first").body,
        second.start().expect("second").body
    );
}
