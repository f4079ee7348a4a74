//! Viewer/editor mode, read once from the `mode` query parameter.

use shared::domain::Mode;
use url::Url;

pub const MODE_PARAM: &str = "mode";
pub const VIEW_MODE_VALUE: &str = "view";

/// The first `mode` pair decides; later duplicates are ignored.
pub fn mode_from_query(query: &str) -> Mode {
    let is_view = url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .find(|(key, _)| key == MODE_PARAM)
        .is_some_and(|(_, value)| value == VIEW_MODE_VALUE);
    if is_view {
        Mode::Viewer
    } else {
        Mode::Editor
    }
}

pub fn mode_from_location(location: &Url) -> Mode {
    location.query().map(mode_from_query).unwrap_or_default()
}

/// Returns `url` with `mode=view` set, replacing any existing `mode` pair.
pub fn with_view_mode(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != MODE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut out = url.clone();
    out.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(MODE_PARAM, VIEW_MODE_VALUE);
    out
}

/// Which mutating affordances the presentation layer attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub upload: bool,
    pub delete: bool,
    pub edit_toggle: bool,
    pub publish: bool,
    pub share: bool,
}

impl Capabilities {
    pub fn for_mode(mode: Mode) -> Self {
        let editor = mode == Mode::Editor;
        Self {
            upload: editor,
            delete: editor,
            edit_toggle: editor,
            publish: editor,
            share: editor,
        }
    }

    pub fn any_mutation(&self) -> bool {
        self.upload || self.delete || self.publish || self.share
    }
}

#[derive(Debug, Clone)]
pub struct ModeController {
    mode: Mode,
    capabilities: Capabilities,
    editing: bool,
}

impl ModeController {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            capabilities: Capabilities::for_mode(mode),
            editing: false,
        }
    }

    pub fn from_location(location: Option<&Url>) -> Self {
        Self::new(location.map(mode_from_location).unwrap_or_default())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// Flips edit mode. Viewers have no toggle, so this is a no-op for them.
    pub fn toggle_edit_mode(&mut self) -> bool {
        if self.capabilities.edit_toggle {
            self.editing = !self.editing;
        }
        self.editing
    }

    pub fn edit_toggle_label(&self) -> &'static str {
        if self.editing {
            "Exit edit mode"
        } else {
            "Toggle edit mode"
        }
    }

    pub fn delete_visible(&self) -> bool {
        self.capabilities.delete && self.editing
    }
}

#[cfg(test)]
#[path = "tests/mode_tests.rs"]
mod tests;
