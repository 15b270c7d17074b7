mod lexer;
mod link;
mod markup;

use std::collections::BTreeMap;

use sc_core::{DuplicatePassage, PassageTable, ProjectConfig, ScribeError, Story};

pub use markup::{parse_source, PASSAGE_MARKER};

pub const STORY_EXTENSION: &str = "tgame";

/// Parses one story file into a name-keyed table. Later passages replace
/// earlier ones sharing a name.
pub fn parse_passage_table(source: &str) -> Result<PassageTable, ScribeError> {
    let mut table = PassageTable::new();
    for passage in parse_source(source, None)? {
        if table.contains_key(&passage.name) {
            log::warn!("duplicate passage \"{}\" replaces the earlier one", passage.name);
        }
        table.insert(passage.name.clone(), passage);
    }
    Ok(table)
}

pub fn is_story_file(path: &str) -> bool {
    path.rsplit_once('.')
        .is_some_and(|(_, extension)| extension == STORY_EXTENSION)
}

/// Builds a story from a path-keyed file map. Only `.tgame` files are parsed,
/// in path order, and the first parse error aborts the whole load.
pub fn build_story(
    config: ProjectConfig,
    files: &BTreeMap<String, String>,
) -> Result<Story, ScribeError> {
    let mut passages = PassageTable::new();
    let mut duplicates = Vec::new();

    for (path, source) in files.iter().filter(|(path, _)| is_story_file(path)) {
        for passage in parse_source(source, Some(path))? {
            if let Some(previous) = passages.get(&passage.name) {
                log::warn!(
                    "passage \"{}\" in {} replaces the one defined at line {}",
                    passage.name,
                    path,
                    previous.span.start.line
                );
                duplicates.push(DuplicatePassage {
                    name: passage.name.clone(),
                    span: passage.span.clone(),
                    source_file: Some(path.clone()),
                });
            }
            passages.insert(passage.name.clone(), passage);
        }
    }

    if !passages.contains_key(&config.starting_passage) {
        log::warn!(
            "starting passage \"{}\" is not defined",
            config.starting_passage
        );
    }
    log::info!("loaded story \"{}\" with {} passages", config.title, passages.len());

    Ok(Story {
        config,
        passages,
        duplicates,
    })
}

#[cfg(test)]
mod parser_tests {
    use super::*;
    use sc_core::{LinkKind, Segment};

    #[test]
    fn two_passage_story_parses_links_and_bodies() {
        let table = parse_passage_table(":: A\nHi\n[[Go->B]]\n\n:: B\nThere").expect("parse");
        assert_eq!(table.len(), 2);
        let a = &table["A"];
        assert_eq!(a.links.len(), 1);
        assert_eq!(a.links[0].text, "Go");
        assert_eq!(a.links[0].target, "B");
        assert_eq!(a.links[0].kind, LinkKind::Plain);
        assert_eq!(
            table["B"].segments,
            vec![Segment::Text {
                value: "There".to_string()
            }]
        );
    }

    #[test]
    fn duplicate_names_keep_the_last_definition() {
        let table = parse_passage_table(":: A\nfirst\n:: A\nsecond").expect("parse");
        assert_eq!(table.len(), 1);
        assert_eq!(
            table["A"].segments,
            vec![Segment::Text {
                value: "second".to_string()
            }]
        );
    }

    #[test]
    fn build_story_reads_story_files_in_path_order() {
        let files = BTreeMap::from([
            ("a.tgame".to_string(), ":: start\nfrom a\n:: shared\none".to_string()),
            ("b.tgame".to_string(), ":: shared\ntwo".to_string()),
            ("notes.txt".to_string(), ":: ignored\nnope".to_string()),
        ]);
        let story = build_story(ProjectConfig::default(), &files).expect("story");
        assert_eq!(story.passages.len(), 2);
        assert!(!story.contains("ignored"));
        assert_eq!(story.duplicates.len(), 1);
        assert_eq!(story.duplicates[0].source_file.as_deref(), Some("b.tgame"));
        assert_eq!(
            story.passage("shared").and_then(|p| p.source_file.as_deref()),
            Some("b.tgame")
        );
    }

    #[test]
    fn first_parse_error_aborts_the_load() {
        let files = BTreeMap::from([
            ("a.tgame".to_string(), ":: start\nok".to_string()),
            ("b.tgame".to_string(), ":: broken\n{{ open".to_string()),
        ]);
        let error = build_story(ProjectConfig::default(), &files).expect_err("must fail");
        assert_eq!(error.code, "PARSE_UNTERMINATED_EXPRESSION");
        assert_eq!(error.passage.as_deref(), Some("broken"));
    }

    #[test]
    fn story_extension_is_checked_by_suffix() {
        assert!(is_story_file("dir/intro.tgame"));
        assert!(!is_story_file("dir/intro.tgame.bak"));
        assert!(!is_story_file("tgame"));
    }
}
