//! Monitored board descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::TopicLabel;

/// Markup variant a board is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardLayout {
    /// University main notice board (listing only, no detail fetch)
    AjouNormal,
    /// Legacy department board with image-marked pinned rows
    SoftwareBoard,
    /// Legacy department board with a listing date and no detail fetch
    DatedBoard,
    /// Board whose links are javascript calls carrying the article number
    ScriptView,
    /// CMS board with `b-top-box` pinned rows
    AjouCms,
}

impl BoardLayout {
    pub const ALL: [BoardLayout; 5] = [
        BoardLayout::AjouNormal,
        BoardLayout::SoftwareBoard,
        BoardLayout::DatedBoard,
        BoardLayout::ScriptView,
        BoardLayout::AjouCms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoardLayout::AjouNormal => "ajou_normal",
            BoardLayout::SoftwareBoard => "software_board",
            BoardLayout::DatedBoard => "dated_board",
            BoardLayout::ScriptView => "script_view",
            BoardLayout::AjouCms => "ajou_cms",
        }
    }
}

impl fmt::Display for BoardLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One monitored notice board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    /// Storage key, also used as the watermark key
    pub key: String,

    /// Human-readable label
    pub display_name: String,

    /// Absolute URL of the board's listing page
    pub listing_url: String,

    /// Markup variant used to read the board
    pub layout: BoardLayout,
}

impl Topic {
    pub fn label(&self) -> TopicLabel {
        TopicLabel {
            key: self.key.clone(),
            display_name: self.display_name.clone(),
        }
    }
}
