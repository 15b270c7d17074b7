use sc_core::ScribeError;
use sc_runtime::RenderedPassage;

use crate::CliFailure;

/// Agent protocol lines for one render, in output order.
pub(crate) fn render_lines(
    rendered: &RenderedPassage,
    state_out: Option<&str>,
) -> Result<Vec<String>, ScribeError> {
    let mut lines = vec![
        "RESULT:OK".to_string(),
        format!("PASSAGE:{}", rendered.passage),
        format!(
            "BODY_JSON:{}",
            serde_json::to_string(&rendered.body).expect("string json")
        ),
    ];

    for link in rendered.all_links() {
        lines.push(format!(
            "LINK:{}|{}|{}|{}",
            link.index,
            link.kind.as_str(),
            link.target,
            serde_json::to_string(&link.text).expect("string json")
        ));
    }

    lines.push(format!(
        "TAGS:{}",
        serde_json::to_string(&rendered.tags).map_err(CliFailure::JsonEncode.wrap())?
    ));
    lines.push(format!(
        "LAST_PASSAGE:{}",
        rendered.last_passage.as_deref().unwrap_or("NONE")
    ));
    for passage in &rendered.redirected_from {
        lines.push(format!("REDIRECTED_FROM:{}", passage));
    }
    for diagnostic in &rendered.diagnostics {
        lines.push(format!(
            "DIAGNOSTIC_JSON:{}",
            serde_json::to_string(diagnostic).map_err(CliFailure::JsonEncode.wrap())?
        ));
    }
    lines.push(format!("STATE_OUT:{}", state_out.unwrap_or("NONE")));
    Ok(lines)
}

pub(crate) fn emit_render(
    rendered: &RenderedPassage,
    state_out: Option<&str>,
) -> Result<(), ScribeError> {
    for line in render_lines(rendered, state_out)? {
        println!("{}", line);
    }
    Ok(())
}

#[cfg(test)]
mod render_output_tests {
    use super::*;
    use sc_core::LinkKind;
    use sc_runtime::{LinkDescriptor, NavRender};

    fn link(index: usize, text: &str, target: &str, kind: LinkKind) -> LinkDescriptor {
        LinkDescriptor {
            index,
            text: text.to_string(),
            target: target.to_string(),
            kind,
            action: None,
        }
    }

    #[test]
    fn render_lines_follow_the_agent_protocol() {
        let rendered = RenderedPassage {
            passage: "hall".to_string(),
            body: "A \"long\" hall.\nTorches.".to_string(),
            links: vec![
                link(0, "North", "north", LinkKind::Plain),
                link(1, "Onward", "yard", LinkKind::Redirect),
            ],
            tags: vec!["indoor".to_string()],
            last_passage: Some("hall".to_string()),
            nav: Some(NavRender {
                body: String::new(),
                links: vec![link(2, "Restart", "start", LinkKind::Plain)],
            }),
            diagnostics: Vec::new(),
            redirected_from: vec!["door".to_string()],
        };

        let lines = render_lines(&rendered, Some("/tmp/state.json")).expect("lines");
        assert_eq!(
            lines,
            vec![
                "RESULT:OK",
                "PASSAGE:hall",
                "BODY_JSON:\"A \\\"long\\\" hall.\\nTorches.\"",
                "LINK:0|plain|north|\"North\"",
                "LINK:1|redirect|yard|\"Onward\"",
                "LINK:2|plain|start|\"Restart\"",
                "TAGS:[\"indoor\"]",
                "LAST_PASSAGE:hall",
                "REDIRECTED_FROM:door",
                "STATE_OUT:/tmp/state.json",
            ]
        );
    }

    #[test]
    fn missing_state_out_and_last_passage_print_none() {
        let rendered = RenderedPassage {
            passage: "start".to_string(),
            body: String::new(),
            links: Vec::new(),
            tags: Vec::new(),
            last_passage: None,
            nav: None,
            diagnostics: Vec::new(),
            redirected_from: Vec::new(),
        };
        let lines = render_lines(&rendered, None).expect("lines");
        assert!(lines.contains(&"LAST_PASSAGE:NONE".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("STATE_OUT:NONE"));
    }
}
