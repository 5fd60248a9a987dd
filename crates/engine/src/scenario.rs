//! Declarative scenario model
//!
//! A scenario is a named, ordered list of steps followed by the
//! post-conditions expected once the steps complete. Scenarios are parsed
//! from YAML (one scenario or a list per file) or built in code.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::unique::UniqueValueGenerator;

static BINDING_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("static pattern"));

/// Compiled accessible-name patterns, keyed by source. Invalid sources map to `None`.
static NAME_PATTERNS: Lazy<Mutex<HashMap<String, Option<Regex>>>> = Lazy::new(Default::default);

const NAME_PATTERN_CACHE_LIMIT: usize = 256;

fn name_pattern(source: &str) -> Option<Regex> {
    let mut cache = NAME_PATTERNS.lock();
    if let Some(compiled) = cache.get(source) {
        return compiled.clone();
    }
    // Bound names differ on every attempt
    if cache.len() >= NAME_PATTERN_CACHE_LIMIT {
        cache.clear();
    }
    let compiled = Regex::new(source).ok();
    cache.insert(source.to_string(), compiled.clone());
    compiled
}

/// A complete scenario definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name within a run
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Named input values, referenced from steps as `${name}`
    #[serde(default)]
    pub bindings: BTreeMap<String, Binding>,

    /// Steps to execute in order
    pub steps: Vec<Step>,

    /// Post-conditions checked after the last step
    #[serde(default)]
    pub expectations: Vec<Expectation>,

    /// Overrides the computed per-scenario timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Where a binding's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Binding {
    /// Fresh value on every attempt: `prefix.<token>suffix`
    Unique {
        prefix: String,
        #[serde(default)]
        suffix: String,
    },

    /// Deliberately reused value, e.g. an email that already exists
    Fixed { value: String },
}

/// How an accessible name is compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatch {
    /// Case-insensitive containment
    #[default]
    Substring,
    /// Case-sensitive full match
    Exact,
    /// Regular expression over the accessible name
    Regex,
}

/// Identifies an interactive element by role and accessible name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    pub role: String,
    pub name: String,
    #[serde(default)]
    pub matching: NameMatch,
}

impl ElementRef {
    pub fn new(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            name: name.into(),
            matching: NameMatch::Substring,
        }
    }

    pub fn exact(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            matching: NameMatch::Exact,
            ..Self::new(role, name)
        }
    }

    pub fn pattern(role: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            matching: NameMatch::Regex,
            ..Self::new(role, pattern)
        }
    }

    /// Whether `candidate` is an accessible name this reference selects.
    pub fn matches_name(&self, candidate: &str) -> bool {
        match self.matching {
            NameMatch::Substring => candidate
                .trim()
                .to_lowercase()
                .contains(&self.name.trim().to_lowercase()),
            NameMatch::Exact => candidate.trim() == self.name.trim(),
            NameMatch::Regex => name_pattern(&self.name)
                .map(|re| re.is_match(candidate.trim()))
                .unwrap_or(false),
        }
    }

    fn bind(&self, bindings: &Bindings) -> Self {
        Self {
            role: self.role.clone(),
            name: bindings.interpolate(&self.name),
            matching: self.matching,
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.matching {
            NameMatch::Substring => write!(f, "{} \"{}\"", self.role, self.name),
            NameMatch::Exact => write!(f, "{} \"{}\" (exact)", self.role, self.name),
            NameMatch::Regex => write!(f, "{} /{}/", self.role, self.name),
        }
    }
}

/// A single driven interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a URL (relative to the configured base URL)
    Navigate { url: String },

    /// Fill a text input
    Fill { target: ElementRef, value: String },

    /// Click a button, link, radio or checkbox
    Click { target: ElementRef },

    /// Select an option from a list element
    Select { target: ElementRef, option: String },
}

impl Step {
    pub fn navigate(url: impl Into<String>) -> Self {
        Step::Navigate { url: url.into() }
    }

    pub fn fill(target: ElementRef, value: impl Into<String>) -> Self {
        Step::Fill {
            target,
            value: value.into(),
        }
    }

    pub fn click(target: ElementRef) -> Self {
        Step::Click { target }
    }

    pub fn select(target: ElementRef, option: impl Into<String>) -> Self {
        Step::Select {
            target,
            option: option.into(),
        }
    }

    pub fn target(&self) -> Option<&ElementRef> {
        match self {
            Step::Navigate { .. } => None,
            Step::Fill { target, .. } | Step::Click { target } | Step::Select { target, .. } => {
                Some(target)
            }
        }
    }

    /// Substitute `${name}` references with resolved binding values.
    pub fn bind(&self, bindings: &Bindings) -> Self {
        match self {
            Step::Navigate { url } => Step::Navigate {
                url: bindings.interpolate(url),
            },
            Step::Fill { target, value } => Step::Fill {
                target: target.bind(bindings),
                value: bindings.interpolate(value),
            },
            Step::Click { target } => Step::Click {
                target: target.bind(bindings),
            },
            Step::Select { target, option } => Step::Select {
                target: target.bind(bindings),
                option: bindings.interpolate(option),
            },
        }
    }

    fn texts(&self) -> Vec<&str> {
        match self {
            Step::Navigate { url } => vec![url.as_str()],
            Step::Fill { target, value } => vec![target.name.as_str(), value.as_str()],
            Step::Click { target } => vec![target.name.as_str()],
            Step::Select { target, option } => vec![target.name.as_str(), option.as_str()],
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Navigate { url } => write!(f, "navigate:{}", url),
            Step::Fill { target, .. } => write!(f, "fill:{}", target),
            Step::Click { target } => write!(f, "click:{}", target),
            Step::Select { target, option } => write!(f, "select:{} = {}", target, option),
        }
    }
}

/// A post-condition evaluated against the current page state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum Expectation {
    Visible { target: ElementRef },
    NotVisible { target: ElementRef },
    TextPresent { text: String },
    TextAbsent { text: String },
    CountAtLeast { selector: String, min: usize },
}

impl Expectation {
    pub fn visible(target: ElementRef) -> Self {
        Expectation::Visible { target }
    }

    pub fn not_visible(target: ElementRef) -> Self {
        Expectation::NotVisible { target }
    }

    pub fn text_present(text: impl Into<String>) -> Self {
        Expectation::TextPresent { text: text.into() }
    }

    pub fn text_absent(text: impl Into<String>) -> Self {
        Expectation::TextAbsent { text: text.into() }
    }

    pub fn count_at_least(selector: impl Into<String>, min: usize) -> Self {
        Expectation::CountAtLeast {
            selector: selector.into(),
            min,
        }
    }

    pub fn bind(&self, bindings: &Bindings) -> Self {
        match self {
            Expectation::Visible { target } => Expectation::Visible {
                target: target.bind(bindings),
            },
            Expectation::NotVisible { target } => Expectation::NotVisible {
                target: target.bind(bindings),
            },
            Expectation::TextPresent { text } => Expectation::TextPresent {
                text: bindings.interpolate(text),
            },
            Expectation::TextAbsent { text } => Expectation::TextAbsent {
                text: bindings.interpolate(text),
            },
            Expectation::CountAtLeast { selector, min } => Expectation::CountAtLeast {
                selector: bindings.interpolate(selector),
                min: *min,
            },
        }
    }

    fn texts(&self) -> Vec<&str> {
        match self {
            Expectation::Visible { target } | Expectation::NotVisible { target } => {
                vec![target.name.as_str()]
            }
            Expectation::TextPresent { text } | Expectation::TextAbsent { text } => {
                vec![text.as_str()]
            }
            Expectation::CountAtLeast { selector, .. } => vec![selector.as_str()],
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Visible { target } => write!(f, "visible: {}", target),
            Expectation::NotVisible { target } => write!(f, "not visible: {}", target),
            Expectation::TextPresent { text } => write!(f, "text present: \"{}\"", text),
            Expectation::TextAbsent { text } => write!(f, "text absent: \"{}\"", text),
            Expectation::CountAtLeast { selector, min } => {
                write!(f, "count at least {}: {}", min, selector)
            }
        }
    }
}

/// Binding values resolved for one scenario attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bindings(BTreeMap<String, String>);

impl Bindings {
    /// Resolve declared bindings, drawing fresh values for `unique` ones.
    pub fn resolve(declared: &BTreeMap<String, Binding>, generator: &UniqueValueGenerator) -> Self {
        let values = declared
            .iter()
            .map(|(name, binding)| {
                let value = match binding {
                    Binding::Unique { prefix, suffix } => {
                        format!("{}{}", generator.generate(prefix), suffix)
                    }
                    Binding::Fixed { value } => value.clone(),
                };
                (name.clone(), value)
            })
            .collect();
        Self(values)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Replace `${name}` with its value. Unknown names are left verbatim.
    pub fn interpolate(&self, input: &str) -> String {
        if !input.contains("${") {
            return input.to_string();
        }
        BINDING_REF
            .replace_all(input, |caps: &regex::Captures<'_>| {
                self.0
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

impl FromIterator<(String, String)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScenarioFile {
    Many(Vec<Scenario>),
    One(Box<Scenario>),
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            bindings: BTreeMap::new(),
            steps: Vec::new(),
            expectations: Vec::new(),
            timeout_ms: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn bind_unique(
        mut self,
        name: impl Into<String>,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        self.bindings.insert(
            name.into(),
            Binding::Unique {
                prefix: prefix.into(),
                suffix: suffix.into(),
            },
        );
        self
    }

    pub fn bind_fixed(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.insert(
            name.into(),
            Binding::Fixed {
                value: value.into(),
            },
        );
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Parse one scenario, or a list of scenarios, from YAML
    pub fn from_yaml(yaml: &str) -> EngineResult<Vec<Self>> {
        let parsed: ScenarioFile = serde_yaml::from_str(yaml)?;
        Ok(match parsed {
            ScenarioFile::Many(scenarios) => scenarios,
            ScenarioFile::One(scenario) => vec![*scenario],
        })
    }

    /// Parse scenarios from a YAML file
    pub fn from_file(path: &Path) -> EngineResult<Vec<Self>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| {
            EngineError::ScenarioParse(format!("{}: {}", path.display(), e))
        })
    }

    /// Load all scenarios from a directory, in path order
    pub fn load_all(dir: &Path) -> EngineResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            let is_yaml = entry
                .path()
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);
            if entry.file_type().is_file() && is_yaml {
                scenarios.extend(Self::from_file(entry.path())?);
            }
        }

        Ok(scenarios)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }

    /// Check the scenario's own invariants.
    pub fn validate(&self) -> EngineResult<()> {
        let invalid = |reason: String| EngineError::InvalidScenario {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty".into()));
        }
        if self.steps.is_empty() {
            return Err(invalid("steps list is empty".into()));
        }

        for name in self.bindings.keys() {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid(format!("invalid binding name '{}'", name)));
            }
        }

        let targets = self
            .steps
            .iter()
            .filter_map(Step::target)
            .chain(self.expectations.iter().filter_map(|e| match e {
                Expectation::Visible { target } | Expectation::NotVisible { target } => {
                    Some(target)
                }
                _ => None,
            }));
        for target in targets {
            if target.matching == NameMatch::Regex {
                Regex::new(&target.name)
                    .map_err(|e| invalid(format!("bad name pattern /{}/: {}", target.name, e)))?;
            }
        }

        let texts = self
            .steps
            .iter()
            .flat_map(Step::texts)
            .chain(self.expectations.iter().flat_map(Expectation::texts));
        for text in texts {
            for caps in BINDING_REF.captures_iter(text) {
                if !self.bindings.contains_key(&caps[1]) {
                    return Err(invalid(format!("undeclared binding '${{{}}}'", &caps[1])));
                }
            }
        }

        Ok(())
    }
}

/// Validate every scenario and require names to be unique.
pub fn validate_suite(scenarios: &[Scenario]) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for scenario in scenarios {
        scenario.validate()?;
        if !seen.insert(scenario.name.as_str()) {
            return Err(EngineError::DuplicateScenario(scenario.name.clone()));
        }
    }
    Ok(())
}
