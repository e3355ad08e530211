//! Autocomplete Suggestions
//!
//! Mocked completion engine: keyword snippets plus a few regex heuristics
//! on the line under the cursor. Stateless; safe to call from any handler.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// A single completion suggestion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    /// Text to insert (empty when nothing matched)
    pub suggestion: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Short explanation
    pub description: String,
}

impl Suggestion {
    fn new(suggestion: &str, confidence: f64, description: impl Into<String>) -> Self {
        Self {
            suggestion: suggestion.to_string(),
            confidence,
            description: description.into(),
        }
    }

    /// The "nothing to offer" answer
    pub fn none() -> Self {
        Self::new("", 0.0, "No suggestion available")
    }

    pub fn is_empty(&self) -> bool {
        self.suggestion.is_empty()
    }
}

/// Confidence for keyword-triggered snippets
const KEYWORD_CONFIDENCE: f64 = 0.85;

const PYTHON_SNIPPETS: &[(&str, &str)] = &[
    ("async def ", "async def function_name(parameter):\n    pass"),
    ("def ", "def function_name(parameter):\n    pass"),
    ("class ", "class ClassName:\n    def __init__(self):\n        pass"),
    ("for ", "for item in items:\n    pass"),
    ("if ", "if condition:\n    pass"),
    ("while ", "while condition:\n    pass"),
    ("import ", "import module_name"),
    ("from ", "from module import function"),
    ("print(", "print(variable)"),
    ("return ", "return value"),
];

const JAVASCRIPT_SNIPPETS: &[(&str, &str)] = &[
    ("function ", "function functionName(parameter) {\n  return value;\n}"),
    ("const ", "const variableName = value;"),
    ("let ", "let variableName = value;"),
    ("for ", "for (let i = 0; i < length; i++) {\n  \n}"),
    ("if ", "if (condition) {\n  \n}"),
    ("class ", "class ClassName {\n  constructor() {\n  }\n}"),
    ("async ", "async function functionName() {\n  await promise;\n}"),
    ("import ", "import module from 'module';"),
];

struct Patterns {
    assignment: Regex,
    call: Regex,
    index: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        assignment: Regex::new(r"\w+\s*=\s*$").expect("valid assignment pattern"),
        call: Regex::new(r"\w+\($").expect("valid call pattern"),
        index: Regex::new(r"\w+\[$").expect("valid index pattern"),
    })
}

fn is_python(language: &str) -> bool {
    language.eq_ignore_ascii_case("python")
}

/// Byte index of the `cursor`-th character, or the end of `code`
fn char_offset(code: &str, cursor: usize) -> usize {
    code.char_indices()
        .nth(cursor)
        .map(|(i, _)| i)
        .unwrap_or(code.len())
}

/// Suggest a completion for `code` with the cursor `cursor_position` characters in
pub fn suggest(code: &str, cursor_position: usize, language: &str) -> Suggestion {
    let before = &code[..char_offset(code, cursor_position)];
    let line = before.rsplit('\n').next().unwrap_or("");

    let snippets = if is_python(language) {
        PYTHON_SNIPPETS
    } else {
        JAVASCRIPT_SNIPPETS
    };

    let trimmed = line.trim();
    for (trigger, snippet) in snippets {
        let trigger = trigger.trim();
        if trimmed.ends_with(trigger) {
            return Suggestion::new(
                snippet,
                KEYWORD_CONFIDENCE,
                format!("Auto-complete for {}", trigger),
            );
        }
    }

    pattern_suggestion(line, language).unwrap_or_else(Suggestion::none)
}

fn pattern_suggestion(line: &str, language: &str) -> Option<Suggestion> {
    let p = patterns();

    if is_python(language) && p.assignment.is_match(line) {
        return Some(Suggestion::new("value", 0.7, "Variable assignment"));
    }
    if p.call.is_match(line) {
        return Some(Suggestion::new("parameter", 0.75, "Function parameter"));
    }
    if p.index.is_match(line) {
        return Some(Suggestion::new("0]", 0.8, "Array index"));
    }

    None
}
