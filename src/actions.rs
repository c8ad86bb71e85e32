//! Action grammar: the catalog of action kinds a policy may emit and the
//! functions that recognise them inside raw policy output.
//!
//! Atomic kinds ([`ActionKind`]) are executed directly by the environment.
//! Composite kinds ([`ModuleActionKind`]) name a sub-objective that a fresh
//! policy instance handles on its own dispatch frame.
//!
//! Classification ([`parse`], [`classify`], [`composite_kind`]) scans the raw
//! string with every kind's pattern and keeps the leftmost match; when two
//! kinds match at the same offset the one earlier in [`PRIORITY`] wins. The
//! leftmost rule means an action whose *argument* happens to mention another
//! kind's name (`type [5] [find_directions]`) is still classified by the verb
//! the policy actually wrote.
//!
//! Token extraction ([`extract_token`]) instead walks [`PRIORITY`] and
//! returns the first atomic kind that matches anywhere in the string.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::GrammarError;

/// Directly executable browser operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Type,
    Hover,
    Press,
    Scroll,
    Select,
    NewTab,
    TabFocus,
    CloseTab,
    Goto,
    GoBack,
    GoForward,
    Stop,
}

/// Actions that open a sub-objective instead of touching the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleActionKind {
    MapPlanner,
    FindDirections,
    SearchNearestPlace,
}

/// Either side of the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionTag {
    Atomic(ActionKind),
    Composite(ModuleActionKind),
}

/// Order in which [`extract_token`] tries kinds, and the tie-break when two
/// kinds match at the same offset during classification.
///
/// Terminal first, then composites, then the atomic kinds with the
/// multi-argument forms (`select`, `type`) ahead of the single-id forms.
pub const PRIORITY: [ActionTag; 16] = [
    ActionTag::Atomic(ActionKind::Stop),
    ActionTag::Composite(ModuleActionKind::FindDirections),
    ActionTag::Composite(ModuleActionKind::SearchNearestPlace),
    ActionTag::Composite(ModuleActionKind::MapPlanner),
    ActionTag::Atomic(ActionKind::Select),
    ActionTag::Atomic(ActionKind::Type),
    ActionTag::Atomic(ActionKind::Click),
    ActionTag::Atomic(ActionKind::Hover),
    ActionTag::Atomic(ActionKind::Press),
    ActionTag::Atomic(ActionKind::Scroll),
    ActionTag::Atomic(ActionKind::TabFocus),
    ActionTag::Atomic(ActionKind::NewTab),
    ActionTag::Atomic(ActionKind::CloseTab),
    ActionTag::Atomic(ActionKind::Goto),
    ActionTag::Atomic(ActionKind::GoBack),
    ActionTag::Atomic(ActionKind::GoForward),
];

static PATTERNS: LazyLock<Vec<(ActionTag, Regex)>> = LazyLock::new(|| {
    PRIORITY
        .iter()
        .map(|tag| {
            let re = Regex::new(tag.matcher()).expect("action grammar regex");
            (*tag, re)
        })
        .collect()
});

static TERMINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bstop\b").expect("terminal regex"));

static TERMINAL_PAYLOAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bstop\b\s*\[(.*?)\]").expect("terminal payload regex"));

impl ActionKind {
    pub const ALL: [ActionKind; 13] = [
        ActionKind::Click,
        ActionKind::Type,
        ActionKind::Hover,
        ActionKind::Press,
        ActionKind::Scroll,
        ActionKind::Select,
        ActionKind::NewTab,
        ActionKind::TabFocus,
        ActionKind::CloseTab,
        ActionKind::Goto,
        ActionKind::GoBack,
        ActionKind::GoForward,
        ActionKind::Stop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Hover => "hover",
            ActionKind::Press => "press",
            ActionKind::Scroll => "scroll",
            ActionKind::Select => "select",
            ActionKind::NewTab => "new_tab",
            ActionKind::TabFocus => "tab_focus",
            ActionKind::CloseTab => "close_tab",
            ActionKind::Goto => "goto",
            ActionKind::GoBack => "go_back",
            ActionKind::GoForward => "go_forward",
            ActionKind::Stop => "stop",
        }
    }

    /// Human-readable grammar, e.g. `type [id] [content] [press_enter_after=0|1]`.
    pub fn pattern(self) -> &'static str {
        match self {
            ActionKind::Click => "click [id]",
            ActionKind::Type => "type [id] [content] [press_enter_after=0|1]",
            ActionKind::Hover => "hover [id]",
            ActionKind::Press => "press [key_comb]",
            ActionKind::Scroll => "scroll [direction=down|up]",
            ActionKind::Select => "select [id] [option]",
            ActionKind::NewTab => "new_tab",
            ActionKind::TabFocus => "tab_focus [tab_index]",
            ActionKind::CloseTab => "close_tab",
            ActionKind::Goto => "goto [url]",
            ActionKind::GoBack => "go_back",
            ActionKind::GoForward => "go_forward",
            ActionKind::Stop => "stop [answer]",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ActionKind::Click => "This action clicks on an element with a specific id on the webpage.",
            ActionKind::Type => {
                "Use this to type the content into the field with id. By default, the 'Enter' key is pressed after typing unless press_enter_after is set to 0."
            }
            ActionKind::Hover => "Hover over an element with id.",
            ActionKind::Press => {
                "Simulates the pressing of a key combination on the keyboard (e.g., Ctrl+v)."
            }
            ActionKind::Scroll => "Scroll the page up or down.",
            ActionKind::Select => "Select an option from a dropdown menu.",
            ActionKind::NewTab => "Open a new, empty browser tab.",
            ActionKind::TabFocus => {
                "Switch the browser's focus to a specific tab using its index."
            }
            ActionKind::CloseTab => "Close the currently active tab.",
            ActionKind::Goto => "Navigate to a specific URL.",
            ActionKind::GoBack => "Navigate to the previously viewed page.",
            ActionKind::GoForward => {
                "Navigate to the next page (if a previous 'go_back' action was performed)."
            }
            ActionKind::Stop => {
                "Issue this action when you believe the task is complete. If the objective is to find a text-based answer, provide the answer in the bracket."
            }
        }
    }

    pub fn example(self) -> &'static str {
        match self {
            ActionKind::Click => "click [7]",
            ActionKind::Type => "type [7] [Zoe] [1]",
            ActionKind::Hover => "hover [7]",
            ActionKind::Press => "press [Ctrl+v]",
            ActionKind::Scroll => "scroll [down]",
            ActionKind::Select => "select [7] [option_2]",
            ActionKind::NewTab => "new_tab",
            ActionKind::TabFocus => "tab_focus [2]",
            ActionKind::CloseTab => "close_tab",
            ActionKind::Goto => "goto [https://www.google.com]",
            ActionKind::GoBack => "go_back",
            ActionKind::GoForward => "go_forward",
            ActionKind::Stop => "stop [The answer is 42]",
        }
    }

    fn matcher(self) -> &'static str {
        match self {
            ActionKind::Click => r"\bclick\s*\[(\d+)\]",
            ActionKind::Type => r"\btype\s*\[(\d+)\]\s*\[(.*?)\](?:\s*\[([01])\])?",
            ActionKind::Hover => r"\bhover\s*\[(\d+)\]",
            ActionKind::Press => r"\bpress\s*\[(.+?)\]",
            ActionKind::Scroll => r"\bscroll\s*\[(down|up)\]",
            ActionKind::Select => r"\bselect\s*\[(\d+)\]\s*\[(.+?)\]",
            ActionKind::NewTab => r"\bnew_tab\b",
            ActionKind::TabFocus => r"\btab_focus\s*\[(\d+)\]",
            ActionKind::CloseTab => r"\bclose_tab\b",
            ActionKind::Goto => r"\bgoto\s*\[(.+?)\]",
            ActionKind::GoBack => r"\bgo_back\b",
            ActionKind::GoForward => r"\bgo_forward\b",
            ActionKind::Stop => r"(?i)\bstop\b(?:\s*\[(.*?)\])?",
        }
    }
}

impl ModuleActionKind {
    pub const ALL: [ModuleActionKind; 3] = [
        ModuleActionKind::MapPlanner,
        ModuleActionKind::FindDirections,
        ModuleActionKind::SearchNearestPlace,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModuleActionKind::MapPlanner => "map_planner",
            ModuleActionKind::FindDirections => "find_directions",
            ModuleActionKind::SearchNearestPlace => "search_nearest_place",
        }
    }

    pub fn pattern(self) -> &'static str {
        match self {
            ModuleActionKind::MapPlanner => "map_planner [query]",
            ModuleActionKind::FindDirections => "find_directions [query]",
            ModuleActionKind::SearchNearestPlace => "search_nearest_place [query]",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ModuleActionKind::MapPlanner => "Plan and carry out a map-related objective.",
            ModuleActionKind::FindDirections => {
                "Find directions between two locations to answer the query."
            }
            ModuleActionKind::SearchNearestPlace => "Search for the places near the query location.",
        }
    }

    pub fn example(self) -> &'static str {
        match self {
            ModuleActionKind::MapPlanner => {
                "map_planner [Pull up the description of Carnegie Mellon University]"
            }
            ModuleActionKind::FindDirections => {
                "find_directions [Check if the social security administration in pittsburgh can be reached in one hour by car from Carnegie Mellon University]"
            }
            ModuleActionKind::SearchNearestPlace => {
                "search_nearest_place [Tell me the closest cafe(s) to CMU Hunt library]"
            }
        }
    }

    /// The action menu a policy for this module is allowed to choose from.
    pub fn allowed_actions(self) -> &'static [ActionTag] {
        const PLANNER: &[ActionTag] = &[
            ActionTag::Atomic(ActionKind::Click),
            ActionTag::Atomic(ActionKind::Type),
            ActionTag::Atomic(ActionKind::Scroll),
            ActionTag::Atomic(ActionKind::Stop),
            ActionTag::Atomic(ActionKind::Select),
            ActionTag::Composite(ModuleActionKind::FindDirections),
            ActionTag::Composite(ModuleActionKind::SearchNearestPlace),
        ];
        const SUBTASK: &[ActionTag] = &[
            ActionTag::Atomic(ActionKind::Click),
            ActionTag::Atomic(ActionKind::Type),
            ActionTag::Atomic(ActionKind::Scroll),
            ActionTag::Atomic(ActionKind::Select),
            ActionTag::Atomic(ActionKind::Stop),
        ];
        match self {
            ModuleActionKind::MapPlanner => PLANNER,
            ModuleActionKind::FindDirections | ModuleActionKind::SearchNearestPlace => SUBTASK,
        }
    }

    fn matcher(self) -> &'static str {
        match self {
            ModuleActionKind::MapPlanner => r"\bmap_planner\s*\[(.*?)\]",
            ModuleActionKind::FindDirections => r"\bfind_directions\s*\[(.*?)\]",
            ModuleActionKind::SearchNearestPlace => r"\bsearch_nearest_place\s*\[(.*?)\]",
        }
    }
}

impl ActionTag {
    pub fn name(self) -> &'static str {
        match self {
            ActionTag::Atomic(kind) => kind.name(),
            ActionTag::Composite(kind) => kind.name(),
        }
    }

    pub fn pattern(self) -> &'static str {
        match self {
            ActionTag::Atomic(kind) => kind.pattern(),
            ActionTag::Composite(kind) => kind.pattern(),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ActionTag::Atomic(kind) => kind.description(),
            ActionTag::Composite(kind) => kind.description(),
        }
    }

    pub fn example(self) -> &'static str {
        match self {
            ActionTag::Atomic(kind) => kind.example(),
            ActionTag::Composite(kind) => kind.example(),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ActionTag::Atomic(ActionKind::Stop)
    }

    fn matcher(self) -> &'static str {
        match self {
            ActionTag::Atomic(kind) => kind.matcher(),
            ActionTag::Composite(kind) => kind.matcher(),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ModuleActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModuleActionKind {
    type Err = GrammarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ModuleActionKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| GrammarError::Unrecognized(s.to_string()))
    }
}

/// One recognised action: its kind, the exact matched text, and the
/// contents of its bracketed arguments in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedAction {
    pub tag: ActionTag,
    pub token: String,
    pub args: Vec<String>,
}

fn capture(tag: ActionTag, re: &Regex, raw: &str) -> Option<(usize, ParsedAction)> {
    let caps = re.captures(raw)?;
    let whole = caps.get(0)?;
    let args = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str().to_string())
        .collect();
    Some((
        whole.start(),
        ParsedAction {
            tag,
            token: whole.as_str().to_string(),
            args,
        },
    ))
}

fn scan(raw: &str) -> Option<ParsedAction> {
    let mut best: Option<(usize, ParsedAction)> = None;

    for (tag, re) in PATTERNS.iter() {
        let Some((start, parsed)) = capture(*tag, re, raw) else {
            continue;
        };
        // Strictly-less keeps the earlier-priority kind on ties.
        if best.as_ref().is_some_and(|(best_start, _)| *best_start <= start) {
            continue;
        }
        best = Some((start, parsed));
    }

    best.map(|(_, parsed)| parsed)
}

/// Recognise the action inside `raw`, atomic or composite.
pub fn parse(raw: &str) -> Result<ParsedAction, GrammarError> {
    scan(raw).ok_or_else(|| GrammarError::Unrecognized(raw.to_string()))
}

pub fn classify(raw: &str) -> Result<ActionTag, GrammarError> {
    parse(raw).map(|parsed| parsed.tag)
}

/// The substring of `raw` that forms a valid atomic action, taken from the
/// first kind in [`PRIORITY`] whose pattern matches.
pub fn extract_token(raw: &str) -> Result<String, GrammarError> {
    PATTERNS
        .iter()
        .filter(|(tag, _)| matches!(tag, ActionTag::Atomic(_)))
        .find_map(|(tag, re)| capture(*tag, re, raw))
        .map(|(_, parsed)| parsed.token)
        .ok_or_else(|| GrammarError::Unrecognized(raw.to_string()))
}

/// True when `raw` contains the word `stop` in any case.
pub fn is_terminal(raw: &str) -> bool {
    TERMINAL.is_match(raw)
}

/// The bracketed result carried by a terminal action: `stop [42]` -> `42`.
pub fn terminal_payload(raw: &str) -> Result<String, GrammarError> {
    TERMINAL_PAYLOAD
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| GrammarError::MissingPayload(raw.to_string()))
}

/// The composite kind `raw` names, if its leading action is a composite.
pub fn composite_kind(raw: &str) -> Option<ModuleActionKind> {
    match scan(raw)?.tag {
        ActionTag::Composite(kind) => Some(kind),
        ActionTag::Atomic(_) => None,
    }
}

pub fn is_composite(raw: &str, known: &[ModuleActionKind]) -> bool {
    composite_kind(raw).is_some_and(|kind| known.contains(&kind))
}

pub fn is_atomic(raw: &str, known: &[ModuleActionKind]) -> bool {
    !is_composite(raw, known)
}

/// Render an action menu, one `pattern: description, example: ...` line per
/// entry, in catalog order regardless of the order of `tags`.
pub fn describe_actions(tags: &[ActionTag]) -> String {
    ActionKind::ALL
        .into_iter()
        .map(ActionTag::Atomic)
        .chain(ModuleActionKind::ALL.into_iter().map(ActionTag::Composite))
        .filter(|tag| tags.contains(tag))
        .map(|tag| {
            format!(
                "{}: {}, example: {}",
                tag.pattern(),
                tag.description(),
                tag.example()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
