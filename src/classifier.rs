//! Keyword rules that turn a free-text scene description into alert decisions.
//!
//! Each category is a [`DetectionRule`]: the prompt phrases that activate it,
//! positive and negative indicators over the response, an optional set of
//! phrases that cancel the negatives, and an optional severity sub-rule.
//! An indicator is a list of phrases that must all appear in the text.
//! Matching is case-insensitive substring search over the whole response.

use std::fmt;

/// An indicator matches when every phrase in it occurs in the text.
pub type Indicator = &'static [&'static str];

/// The two independent event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Gesture,
    Weapon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    ToyReplica,
    Genuine,
}

/// Outcome of evaluating one category against one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub fires: bool,
    pub severity: Option<Severity>,
}

/// Severity is `when_matched` if any indicator matches, else `otherwise`.
#[derive(Debug)]
pub struct SeverityRule {
    pub indicators: &'static [Indicator],
    pub when_matched: Severity,
    pub otherwise: Severity,
}

#[derive(Debug)]
pub struct DetectionRule {
    pub category: Category,
    pub triggers: &'static [&'static str],
    pub positive: &'static [Indicator],
    pub negative: &'static [Indicator],
    /// Any match here disables the negative indicators.
    pub negative_overridden_by: &'static [Indicator],
    pub severity: Option<SeverityRule>,
}

const TOY_INDICATORS: &[Indicator] = &[
    &["toy"],
    &["replica"],
    &["prop gun"],
    &["prop weapon"],
    &["prop knife"],
    &["imitation"],
    &["water gun"],
    &["nerf"],
];

pub static GESTURE_RULE: DetectionRule = DetectionRule {
    category: Category::Gesture,
    triggers: &["gesture", "hand sign", "hand signal", "peace sign", "v sign"],
    positive: &[
        &["peace sign detected"],
        &["✌"],
        &["peace", "sign", "v"],
        &["victory", "sign"],
    ],
    negative: &[
        &["no peace sign"],
        &["no visible peace sign"],
        &["no peace or victory sign"],
        &["cannot see a peace sign"],
        &["can't see a peace sign"],
        &["not making a v"],
        &["no gesture"],
        &["no hand gesture"],
        &["no hand sign"],
        &["not making a peace sign"],
        &["not showing a peace sign"],
        &["does not show a peace sign"],
        &["doesn't show a peace sign"],
        &["no victory sign"],
    ],
    negative_overridden_by: &[],
    severity: None,
};

pub static WEAPON_RULE: DetectionRule = DetectionRule {
    category: Category::Weapon,
    triggers: &["weapon", "firearm", "gun", "knife"],
    positive: &[
        &["weapon detected"],
        &["firearm"],
        &["gun"],
        &["pistol"],
        &["rifle"],
        &["knife"],
        &["blade"],
        &["explosive"],
        &["toy weapon"],
        &["replica weapon"],
        &["replica gun"],
        &["prop weapon"],
        &["prop gun"],
    ],
    negative: &[
        &["no weapon detected"],
        &["no weapons detected"],
        &["no weapon"],
        &["no weapons"],
        &["no visible weapon"],
    ],
    negative_overridden_by: TOY_INDICATORS,
    severity: Some(SeverityRule {
        indicators: TOY_INDICATORS,
        when_matched: Severity::ToyReplica,
        otherwise: Severity::Genuine,
    }),
};

/// All rules, in evaluation order.
pub static RULES: [&DetectionRule; 2] = [&GESTURE_RULE, &WEAPON_RULE];

impl Category {
    pub fn rule(self) -> &'static DetectionRule {
        match self {
            Category::Gesture => &GESTURE_RULE,
            Category::Weapon => &WEAPON_RULE,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Gesture => write!(f, "gesture"),
            Category::Weapon => write!(f, "weapon"),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::ToyReplica => write!(f, "toy/replica"),
            Severity::Genuine => write!(f, "genuine"),
        }
    }
}

impl Classification {
    const QUIET: Classification = Classification {
        fires: false,
        severity: None,
    };
}

fn matches(text: &str, indicator: Indicator) -> bool {
    indicator
        .iter()
        .all(|phrase| text.contains(&phrase.to_lowercase()))
}

fn any_match(text: &str, indicators: &[Indicator]) -> bool {
    indicators.iter().any(|indicator| matches(text, indicator))
}

impl DetectionRule {
    /// Whether the prompt asks for this category at all.
    pub fn is_triggered_by(&self, prompt: &str) -> bool {
        let prompt = prompt.to_lowercase();
        self.triggers.iter().any(|t| prompt.contains(t))
    }

    /// Evaluate the response text, ignoring the prompt.
    pub fn evaluate(&self, response: &str) -> Classification {
        let text = response.to_lowercase();

        if !any_match(&text, self.positive) {
            return Classification::QUIET;
        }

        let negatives_apply = !any_match(&text, self.negative_overridden_by);
        if negatives_apply && any_match(&text, self.negative) {
            return Classification::QUIET;
        }

        let severity = self.severity.as_ref().map(|rule| {
            if any_match(&text, rule.indicators) {
                rule.when_matched
            } else {
                rule.otherwise
            }
        });

        Classification {
            fires: true,
            severity,
        }
    }
}

/// Decide whether `category` fired for this prompt and response.
///
/// A category whose triggers do not appear in the prompt never fires.
pub fn classify(category: Category, prompt: &str, response: &str) -> Classification {
    let rule = category.rule();
    if !rule.is_triggered_by(prompt) {
        return Classification::QUIET;
    }
    rule.evaluate(response)
}

/// Categories the prompt activates, in evaluation order.
pub fn triggered_categories(prompt: &str) -> Vec<Category> {
    RULES
        .iter()
        .filter(|rule| rule.is_triggered_by(prompt))
        .map(|rule| rule.category)
        .collect()
}
