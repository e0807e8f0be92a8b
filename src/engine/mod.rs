mod logger;

pub use logger::{MemoryLogger, RewriteLogger, TracingLogger};

use crate::request::RequestDescriptor;
use crate::rule::template::ExpandContext;
use crate::rule::{LogicalGrouping, MatchInput, RedirectStatus, Rule, RuleAction, RuleSet};
use regex::Regex;
use std::fmt;

/// Final outcome of evaluating a rule set against one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Keep handling the request with this effective path-and-query. Emitted
    /// when no rule matched, or after one or more internal rewrites.
    Continue(String),
    /// Respond with a `Location` header and redirect status; terminal.
    Redirect {
        location: String,
        status: RedirectStatus,
    },
    /// Close the connection without a response; terminal.
    Abort,
    /// Respond with a fixed status and optional body; terminal.
    CustomResponse {
        status: u16,
        reason: Option<String>,
        description: Option<String>,
    },
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Continue(path) => write!(f, "continue '{path}'"),
            Decision::Redirect { location, status } => {
                write!(f, "redirect '{location}' ({})", status.code())
            }
            Decision::Abort => write!(f, "abort"),
            Decision::CustomResponse { status, .. } => {
                write!(f, "custom response ({status})")
            }
        }
    }
}

/// Evaluates an immutable rule set against requests, one at a time. Strict
/// first-match in declaration order; evaluation is pure and synchronous, so
/// one engine can be shared across threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RewriteEngine {
    rule_set: RuleSet,
}

impl RewriteEngine {
    pub fn new(rule_set: RuleSet) -> Self {
        Self { rule_set }
    }

    #[inline]
    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    /// Evaluate with the default `tracing`-backed logger.
    pub fn evaluate(&self, request: &RequestDescriptor) -> Decision {
        self.evaluate_with(request, &TracingLogger)
    }

    /// Evaluate the rule set in declaration order. One log line is emitted
    /// per rule evaluated plus one terminal-outcome line; the sequence and
    /// phrasing of those lines is a stable contract.
    pub fn evaluate_with(
        &self,
        request: &RequestDescriptor,
        logger: &dyn RewriteLogger,
    ) -> Decision {
        let mut path = if request.path().is_empty() {
            "/".to_string()
        } else {
            request.path().to_string()
        };
        let mut query = request.query().to_string();

        for (index, rule) in self.rule_set.rules().iter().enumerate() {
            let label = rule.label(index);

            // Rules match the path with its leading slash stripped.
            let input = match &rule.input {
                MatchInput::Url => path.strip_prefix('/').unwrap_or(&path).to_string(),
                MatchInput::ServerVariable(name) => request
                    .server_variable(name)
                    .map(|v| v.into_owned())
                    .unwrap_or_default(),
            };

            let Some(rule_captures) = match_pattern(&rule.pattern, rule.negate, &input) else {
                logger.log(&format!("Request did not match current rule '{label}'."));
                continue;
            };

            let Some(condition_captures) = self.check_conditions(rule, request, &rule_captures)
            else {
                logger.log(&format!("Request did not match current rule '{label}'."));
                continue;
            };

            logger.log(&format!("Request matched current rule '{label}'."));

            let ctx = ExpandContext {
                request,
                rule_captures: &rule_captures,
                condition_captures: &condition_captures,
                maps: self.rule_set.maps(),
            };

            match &rule.action {
                RuleAction::Redirect {
                    target,
                    status,
                    append_query_string,
                } => {
                    let location =
                        resolve_redirect(request, &target.expand(&ctx), &query, *append_query_string);
                    logger.log(&format!(
                        "Returning redirect response to '{location}' with status {}.",
                        status.code()
                    ));
                    return Decision::Redirect {
                        location,
                        status: *status,
                    };
                }
                RuleAction::Rewrite {
                    target,
                    stop_processing,
                    append_query_string,
                } => {
                    let (new_path, new_query) =
                        resolve_rewrite(&target.expand(&ctx), &query, *append_query_string);
                    path = new_path;
                    query = new_query;
                    logger.log(&format!(
                        "Rewritten url is '{}'.",
                        join_path_query(&path, &query)
                    ));
                    if *stop_processing {
                        break;
                    }
                }
                RuleAction::AbortRequest => {
                    logger.log("Aborting request.");
                    return Decision::Abort;
                }
                RuleAction::CustomResponse {
                    status,
                    reason,
                    description,
                } => {
                    logger.log(&format!("Returning custom response with status {status}."));
                    return Decision::CustomResponse {
                        status: *status,
                        reason: reason.clone(),
                        description: description.clone(),
                    };
                }
                RuleAction::None { stop_processing } => {
                    if *stop_processing {
                        break;
                    }
                }
            }
        }

        let result = join_path_query(&path, &query);
        logger.log(&format!(
            "Continuing request processing with url '{result}'."
        ));
        Decision::Continue(result)
    }

    /// Returns the condition captures on success, `None` when the rule's
    /// conditions reject the request.
    fn check_conditions(
        &self,
        rule: &Rule,
        request: &RequestDescriptor,
        rule_captures: &[String],
    ) -> Option<Vec<String>> {
        let conditions = &rule.conditions;
        if conditions.is_empty() {
            return Some(Vec::new());
        }

        let mut captured: Vec<String> = Vec::new();
        let mut any_matched = false;

        for condition in &conditions.list {
            let input = {
                let ctx = ExpandContext {
                    request,
                    rule_captures,
                    condition_captures: &captured,
                    maps: self.rule_set.maps(),
                };
                condition.input.expand(&ctx)
            };

            match match_pattern(&condition.pattern, condition.negate, &input) {
                Some(captures) => {
                    any_matched = true;
                    if conditions.track_all_captures {
                        // Each matched condition appends its full group list,
                        // whole match included, so {C:n} numbering runs on
                        // across conditions.
                        captured.extend(captures);
                    } else {
                        captured = captures;
                    }
                    if conditions.grouping == LogicalGrouping::MatchAny {
                        break;
                    }
                }
                None => {
                    tracing::debug!(
                        input = %input,
                        pattern = %condition.pattern,
                        "condition did not match"
                    );
                    if conditions.grouping == LogicalGrouping::MatchAll {
                        return None;
                    }
                }
            }
        }

        if any_matched { Some(captured) } else { None }
    }
}

/// Match `input` against `pattern`, honoring negation. Returns the capture
/// groups (index 0 is the whole match); negated matches expose none.
fn match_pattern(pattern: &Regex, negate: bool, input: &str) -> Option<Vec<String>> {
    if negate {
        if pattern.is_match(input) {
            None
        } else {
            Some(Vec::new())
        }
    } else {
        pattern.captures(input).map(|caps| {
            caps.iter()
                .map(|m| m.map_or(String::new(), |m| m.as_str().to_string()))
                .collect()
        })
    }
}

fn join_path_query(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

fn split_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

/// Merge a resolved target's query with the request's current query string.
fn merge_query(target_query: Option<&str>, current: &str, append: bool) -> String {
    match (target_query, append) {
        (Some(tq), true) if !current.is_empty() && !tq.is_empty() => format!("{tq}&{current}"),
        (Some(tq), true) if tq.is_empty() => current.to_string(),
        (Some(tq), _) => tq.to_string(),
        (None, true) => current.to_string(),
        (None, false) => String::new(),
    }
}

/// Resolve a rewrite target into the new effective path and query.
fn resolve_rewrite(target: &str, current_query: &str, append: bool) -> (String, String) {
    let (raw_path, target_query) = split_target(target);
    let path = if raw_path.starts_with('/') {
        raw_path.to_string()
    } else {
        format!("/{raw_path}")
    };
    (path, merge_query(target_query, current_query, append))
}

/// Resolve a redirect target into a `Location` value. Absolute URLs pass
/// through untouched apart from query merging; relative targets get a
/// leading slash and inherit the request's path base.
fn resolve_redirect(
    request: &RequestDescriptor,
    target: &str,
    current_query: &str,
    append: bool,
) -> String {
    let (raw_path, target_query) = split_target(target);
    let query = merge_query(target_query, current_query, append);

    let location = if raw_path.contains("://") {
        raw_path.to_string()
    } else {
        let path = if raw_path.starts_with('/') {
            raw_path.to_string()
        } else {
            format!("/{raw_path}")
        };
        let base = request.path_base();
        if base.is_empty() || base == "/" {
            path
        } else {
            format!("{}{path}", base.trim_end_matches('/'))
        }
    };

    join_path_query(&location, &query)
}
