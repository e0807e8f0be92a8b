pub mod map;
pub mod template;

pub use map::RewriteMaps;
pub use template::{TargetTemplate, TemplateError};

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleParseError {
    #[error("rule '{rule}': invalid regex pattern: {source}")]
    InvalidRegex {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule '{rule}': unsupported action type '{kind}'")]
    UnsupportedAction { rule: String, kind: String },

    #[error("rule '{rule}': missing required attribute '{attribute}'")]
    MissingAttribute { rule: String, attribute: String },

    #[error("rule '{rule}': unsupported status code {code}")]
    InvalidStatusCode { rule: String, code: u16 },

    #[error("rule '{rule}': unknown logical grouping '{value}'")]
    UnknownLogicalGrouping { rule: String, value: String },

    #[error("rule '{rule}': malformed target template: {source}")]
    MalformedTemplate {
        rule: String,
        #[source]
        source: TemplateError,
    },

    #[error("invalid rewrite rule document: {0}")]
    Document(#[from] quick_xml::DeError),

    #[error("failed to read rule file: {0}")]
    Io(#[from] std::io::Error),
}

/// Which part of the request the primary pattern is matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MatchInput {
    /// The request path with the leading `/` stripped. When a non-stopping
    /// rewrite fired earlier in the same evaluation, this is the rewritten
    /// path rather than the original one.
    #[default]
    Url,
    /// A named server variable such as `HTTP_HOST` or `HTTPS`.
    ServerVariable(String),
}

/// How a rule's conditions are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogicalGrouping {
    /// Every condition must hold.
    #[default]
    MatchAll,
    /// At least one condition must hold.
    MatchAny,
}

/// A single rule condition: an input template expanded against the request,
/// matched against a pattern. `negate` inverts the result.
#[derive(Debug, Clone)]
pub struct Condition {
    pub input: TargetTemplate,
    pub pattern: Regex,
    pub negate: bool,
}

/// Ordered condition list plus grouping semantics.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    pub grouping: LogicalGrouping,
    /// When false (the IIS default) only the last matched condition's capture
    /// groups are exposed as `{C:n}`. When true, each matched condition
    /// appends its full group list (whole match at the condition's first
    /// index, then its groups), so `{C:n}` numbering continues across
    /// conditions.
    pub track_all_captures: bool,
    pub list: Vec<Condition>,
}

impl Conditions {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// Redirect status codes accepted by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RedirectStatus {
    MovedPermanently,
    #[default]
    Found,
    TemporaryRedirect,
    PermanentRedirect,
}

impl RedirectStatus {
    #[inline]
    pub fn code(self) -> u16 {
        match self {
            RedirectStatus::MovedPermanently => 301,
            RedirectStatus::Found => 302,
            RedirectStatus::TemporaryRedirect => 307,
            RedirectStatus::PermanentRedirect => 308,
        }
    }

    /// Accepts the standard redirect set only; anything else is a parse error.
    pub fn from_code(code: u16, rule: &str) -> Result<Self, RuleParseError> {
        match code {
            301 => Ok(RedirectStatus::MovedPermanently),
            302 => Ok(RedirectStatus::Found),
            307 => Ok(RedirectStatus::TemporaryRedirect),
            308 => Ok(RedirectStatus::PermanentRedirect),
            _ => Err(RuleParseError::InvalidStatusCode {
                rule: rule.to_string(),
                code,
            }),
        }
    }
}

/// What a matched rule does to the request.
#[derive(Debug, Clone)]
pub enum RuleAction {
    /// Match without acting; useful with `stop_processing` to pin a path.
    None { stop_processing: bool },
    Rewrite {
        target: TargetTemplate,
        stop_processing: bool,
        append_query_string: bool,
    },
    Redirect {
        target: TargetTemplate,
        status: RedirectStatus,
        append_query_string: bool,
    },
    /// Terminate the connection without a response.
    AbortRequest,
    /// Terminate with a fixed status and optional body.
    CustomResponse {
        status: u16,
        reason: Option<String>,
        description: Option<String>,
    },
}

/// One ordered entry in a rule set.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: Option<String>,
    pub input: MatchInput,
    pub pattern: Regex,
    /// Fire when the pattern does NOT match. Negated matches expose no
    /// capture groups.
    pub negate: bool,
    pub conditions: Conditions,
    pub action: RuleAction,
}

impl Rule {
    /// Display label used in log output: the configured name, or the rule's
    /// position for unnamed rules.
    pub fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{index}"),
        }
    }
}

/// An ordered, immutable collection of rules plus the rewrite maps their
/// templates may reference. Built once by the loader and shared read-only
/// across concurrent evaluations.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    maps: RewriteMaps,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>, maps: RewriteMaps) -> Self {
        Self { rules, maps }
    }

    #[inline]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[inline]
    pub fn maps(&self) -> &RewriteMaps {
        &self.maps
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_status_codes() {
        assert_eq!(RedirectStatus::from_code(301, "r").unwrap().code(), 301);
        assert_eq!(RedirectStatus::from_code(302, "r").unwrap().code(), 302);
        assert_eq!(RedirectStatus::from_code(307, "r").unwrap().code(), 307);
        assert_eq!(RedirectStatus::from_code(308, "r").unwrap().code(), 308);
        assert_eq!(RedirectStatus::default().code(), 302);
    }

    #[test]
    fn test_redirect_status_rejects_non_redirect_codes() {
        for code in [200, 303, 304, 404, 500] {
            let err = RedirectStatus::from_code(code, "bad-rule").unwrap_err();
            assert!(matches!(
                err,
                RuleParseError::InvalidStatusCode { ref rule, code: c } if rule == "bad-rule" && c == code
            ));
        }
    }

    #[test]
    fn test_rule_label() {
        let rule = Rule {
            name: Some("my rule".to_string()),
            input: MatchInput::Url,
            pattern: Regex::new("^a$").unwrap(),
            negate: false,
            conditions: Conditions::default(),
            action: RuleAction::AbortRequest,
        };
        assert_eq!(rule.label(3), "my rule");

        let unnamed = Rule { name: None, ..rule };
        assert_eq!(unnamed.label(3), "#3");
    }
}
