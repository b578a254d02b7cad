use tracing::{debug, warn};

use super::{Scene, Script};
use crate::error::ParseError;

const IDEA_LABEL: &str = "Idea:";
const SCENE_LABEL: &str = "Scene";

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Idea(&'a str),
    Scene(&'a str),
    Other,
}

/// Classify one trimmed line as an idea line, a scene line, or anything else.
fn classify(line: &str) -> Line<'_> {
    if let Some(rest) = line.strip_prefix(IDEA_LABEL) {
        return Line::Idea(rest.trim());
    }

    // "Scene" <whitespace> <digits> ":" <text>
    let Some(rest) = line.strip_prefix(SCENE_LABEL) else {
        return Line::Other;
    };
    let after_space = rest.trim_start();
    if after_space.len() == rest.len() {
        return Line::Other;
    }
    let digits = after_space
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(after_space.len());
    if digits == 0 {
        return Line::Other;
    }
    match after_space[digits..].strip_prefix(':') {
        Some(text) => Line::Scene(text.trim()),
        None => Line::Other,
    }
}

/// Parse model output into the overall idea and the ordered scene list.
///
/// Scenes keep the order they appear in; the model's own numbering is ignored.
/// When several `Idea:` lines are present the last non-empty one wins.
pub fn parse_script(content: &str) -> Result<Script, ParseError> {
    let mut idea = String::new();
    let mut scenes = Vec::new();

    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match classify(line) {
            Line::Idea("") => warn!(line, "Idea line has no text, ignoring"),
            Line::Idea(text) => {
                debug!(idea = text, "Extracted idea");
                idea = text.to_string();
            }
            Line::Scene("") => warn!(line, "Scene line has no description, dropping"),
            Line::Scene(text) => {
                let scene = Scene::new(scenes.len() + 1, text);
                debug!(scene = scene.index, description = text, "Extracted scene");
                scenes.push(scene);
            }
            Line::Other => {}
        }
    }

    if idea.is_empty() {
        warn!("Could not find an 'Idea:' line in generated content");
        return Err(ParseError::MissingIdea);
    }
    if scenes.is_empty() {
        warn!("Could not find any 'Scene N:' lines in generated content");
        return Err(ParseError::NoScenes);
    }

    Ok(Script { idea, scenes })
}
