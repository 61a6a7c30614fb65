use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Fallback label for titles matching no rule.
pub const OTHER_LABEL: &str = "Other";

/// One entry of the keyword policy: a label and the word-boundary pattern
/// that claims a title for it.
#[derive(Debug)]
pub struct StackRule {
    label: String,
    pattern: Regex,
}

impl StackRule {
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Ordered keyword→label policy. Order is load-bearing: the first rule with
/// a match wins, so a title containing both "python" and "data" resolves to
/// whichever label sits earlier in the table. Reordering the table changes
/// classification outcomes for ambiguous titles, hence the version tag.
#[derive(Debug)]
pub struct StackPolicy {
    version: String,
    rules: Vec<StackRule>,
}

/// Built-in policy table, 11 labels in priority order. Language labels sit
/// above role labels so "Full Stack Python Developer" lands on Python, and
/// the IT labels sit above the engineering trades.
const BUILTIN_RULES: &[(&str, &str)] = &[
    ("Python", r"\bpython\b"),
    ("Java", r"\bjava\b"),
    ("React/JS", r"\b(react|node|javascript|typescript|vue|angular)\b"),
    ("Cloud/AWS", r"\b(aws|azure|cloud|gcp|google cloud)\b"),
    (
        "Data/AI",
        r"\b(data|ai|machine learning|nlp|torch|tensorflow|bi|tableau)\b",
    ),
    ("Cybersecurity", r"\b(cyber|security|infosec)\b"),
    ("DevOps", r"\b(devops|sre|ci/cd|kubernetes|docker|jenkins)\b"),
    (".NET/C#", r"(\.net\b|\bdotnet\b|\bc#)"),
    (
        "Civil/Struct",
        r"\b(civil|structural|tunnel|bridge|geotechnical)\b",
    ),
    ("Mechanical", r"\b(mechanical|hvac|piping|m&e)\b"),
    ("Electrical", r"\b(electrical|power|switchgear)\b"),
];

static BUILTIN: Lazy<StackPolicy> = Lazy::new(|| {
    StackPolicy::new("v4", BUILTIN_RULES).expect("built-in stack policy must compile")
});

impl StackPolicy {
    /// Build a policy from (label, pattern) pairs, preserving their order.
    pub fn new(version: &str, pairs: &[(&str, &str)]) -> Result<Self> {
        let mut rules = Vec::with_capacity(pairs.len());
        for (label, pattern) in pairs {
            let pattern = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("compiling pattern for label {:?}", label))?;
            rules.push(StackRule {
                label: (*label).to_string(),
                pattern,
            });
        }
        Ok(Self {
            version: version.to_string(),
            rules,
        })
    }

    /// The policy shipped with the pipeline.
    pub fn builtin() -> &'static StackPolicy {
        &BUILTIN
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(StackRule::label)
    }

    /// Assign exactly one label to a title. First matching rule wins and
    /// evaluation stops; an empty or unmatched title yields [`OTHER_LABEL`].
    pub fn classify(&self, title: &str) -> &str {
        let title = title.trim();
        if title.is_empty() {
            return OTHER_LABEL;
        }
        for rule in &self.rules {
            if rule.pattern.is_match(title) {
                return &rule.label;
            }
        }
        OTHER_LABEL
    }
}
