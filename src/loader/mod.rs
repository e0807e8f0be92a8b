mod iis;

use crate::rule::{
    Conditions, MatchInput, RedirectStatus, Rule, RuleAction, RuleParseError, RuleSet,
    RewriteMaps, TargetTemplate,
};
use regex::Regex;
use std::path::Path;
use tracing::info;

/// Builder for a `RuleSet`: programmatic rule registration plus IIS-style
/// rule file loading. Patterns registered programmatically compile
/// case-sensitively; rule-file patterns honor the file's `ignoreCase`
/// attribute (default true).
#[derive(Debug, Default)]
pub struct RewriteOptions {
    rules: Vec<Rule>,
    maps: RewriteMaps,
}

impl RewriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a redirect rule with the default 302 status. Redirects are always
    /// terminal.
    pub fn add_redirect(self, pattern: &str, target: &str) -> Result<Self, RuleParseError> {
        self.add_redirect_with_status(pattern, target, RedirectStatus::Found)
    }

    pub fn add_redirect_with_status(
        mut self,
        pattern: &str,
        target: &str,
        status: RedirectStatus,
    ) -> Result<Self, RuleParseError> {
        self.rules.push(Rule {
            name: None,
            input: MatchInput::Url,
            pattern: compile(pattern)?,
            negate: false,
            conditions: Conditions::default(),
            action: RuleAction::Redirect {
                target: template(pattern, target)?,
                status,
                append_query_string: true,
            },
        });
        Ok(self)
    }

    /// Add an internal rewrite rule. With `skip_remaining_rules` the rewrite
    /// is terminal; otherwise later rules see the rewritten path.
    pub fn add_rewrite(
        mut self,
        pattern: &str,
        target: &str,
        skip_remaining_rules: bool,
    ) -> Result<Self, RuleParseError> {
        self.rules.push(Rule {
            name: None,
            input: MatchInput::Url,
            pattern: compile(pattern)?,
            negate: false,
            conditions: Conditions::default(),
            action: RuleAction::Rewrite {
                target: template(pattern, target)?,
                stop_processing: skip_remaining_rules,
                append_query_string: true,
            },
        });
        Ok(self)
    }

    /// Add a fully specified rule. Escape hatch for rules the convenience
    /// methods cannot express, e.g. server-variable match inputs.
    pub fn add_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Append the rules and rewrite maps from an IIS-style rule document.
    /// Fails fast on the first malformed rule.
    pub fn add_iis_url_rewrite(mut self, xml: &str) -> Result<Self, RuleParseError> {
        let (rules, maps) = iis::parse_document(xml)?;
        info!(count = rules.len(), "loaded rewrite rules");
        self.rules.extend(rules);
        self.maps.merge(maps);
        Ok(self)
    }

    pub fn add_iis_url_rewrite_file(self, path: &Path) -> Result<Self, RuleParseError> {
        let xml = std::fs::read_to_string(path)?;
        self.add_iis_url_rewrite(&xml)
    }

    /// Register a rewrite map for `{MapName:key}` template references.
    pub fn add_rewrite_map(
        mut self,
        name: &str,
        entries: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.maps.insert(name, entries);
        self
    }

    /// Freeze into an immutable rule set.
    pub fn build(self) -> RuleSet {
        RuleSet::new(self.rules, self.maps)
    }
}

fn compile(pattern: &str) -> Result<Regex, RuleParseError> {
    Regex::new(pattern).map_err(|source| RuleParseError::InvalidRegex {
        rule: pattern.to_string(),
        source,
    })
}

fn template(rule: &str, raw: &str) -> Result<TargetTemplate, RuleParseError> {
    TargetTemplate::parse(raw).map_err(|source| RuleParseError::MalformedTemplate {
        rule: rule.to_string(),
        source,
    })
}
