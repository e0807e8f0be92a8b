//! IIS-style rewrite rule file parsing.
//!
//! Accepts the `<rewrite><rules>…</rules><rewriteMaps>…</rewriteMaps></rewrite>`
//! document produced for the IIS URL Rewrite module and converts it into the
//! engine's rule model. Malformed or unsupported entries fail loading with a
//! `RuleParseError` naming the offending rule; nothing is silently skipped.

use crate::rule::{
    Condition, Conditions, LogicalGrouping, MatchInput, RedirectStatus, Rule, RuleAction,
    RuleParseError, RewriteMaps, TargetTemplate,
};
use regex::RegexBuilder;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RewriteDoc {
    rules: Option<RulesElem>,
    #[serde(rename = "rewriteMaps")]
    rewrite_maps: Option<RewriteMapsElem>,
}

#[derive(Debug, Deserialize)]
struct RulesElem {
    #[serde(rename = "rule", default)]
    rules: Vec<RuleElem>,
}

#[derive(Debug, Deserialize)]
struct RuleElem {
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "@stopProcessing")]
    stop_processing: Option<bool>,
    #[serde(rename = "@enabled")]
    enabled: Option<bool>,
    #[serde(rename = "match")]
    match_elem: Option<MatchElem>,
    conditions: Option<ConditionsElem>,
    action: Option<ActionElem>,
}

#[derive(Debug, Deserialize)]
struct MatchElem {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@ignoreCase")]
    ignore_case: Option<bool>,
    #[serde(rename = "@negate")]
    negate: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ConditionsElem {
    #[serde(rename = "@logicalGrouping")]
    logical_grouping: Option<String>,
    #[serde(rename = "@trackAllCaptures")]
    track_all_captures: Option<bool>,
    #[serde(rename = "add", default)]
    conditions: Vec<ConditionElem>,
}

#[derive(Debug, Deserialize)]
struct ConditionElem {
    #[serde(rename = "@input")]
    input: Option<String>,
    #[serde(rename = "@pattern")]
    pattern: Option<String>,
    #[serde(rename = "@negate")]
    negate: Option<bool>,
    #[serde(rename = "@ignoreCase")]
    ignore_case: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ActionElem {
    #[serde(rename = "@type")]
    action_type: Option<String>,
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@statusCode")]
    status_code: Option<u16>,
    #[serde(rename = "@redirectType")]
    redirect_type: Option<String>,
    #[serde(rename = "@appendQueryString")]
    append_query_string: Option<bool>,
    #[serde(rename = "@statusReason")]
    status_reason: Option<String>,
    #[serde(rename = "@statusDescription")]
    status_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RewriteMapsElem {
    #[serde(rename = "rewriteMap", default)]
    maps: Vec<RewriteMapElem>,
}

#[derive(Debug, Deserialize)]
struct RewriteMapElem {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "add", default)]
    entries: Vec<MapEntryElem>,
}

#[derive(Debug, Deserialize)]
struct MapEntryElem {
    #[serde(rename = "@key")]
    key: String,
    #[serde(rename = "@value")]
    value: String,
}

/// Parse a rule document into rules and rewrite maps.
pub(crate) fn parse_document(xml: &str) -> Result<(Vec<Rule>, RewriteMaps), RuleParseError> {
    let doc: RewriteDoc = quick_xml::de::from_str(xml)?;

    let mut rules = Vec::new();
    if let Some(elem) = doc.rules {
        for (index, rule) in elem.rules.into_iter().enumerate() {
            if !rule.enabled.unwrap_or(true) {
                continue;
            }
            let label = rule.name.clone().unwrap_or_else(|| format!("#{index}"));
            rules.push(convert_rule(rule, &label)?);
        }
    }

    let mut maps = RewriteMaps::default();
    if let Some(elem) = doc.rewrite_maps {
        for map in elem.maps {
            maps.insert(
                &map.name,
                map.entries.into_iter().map(|e| (e.key, e.value)),
            );
        }
    }

    Ok((rules, maps))
}

fn convert_rule(elem: RuleElem, label: &str) -> Result<Rule, RuleParseError> {
    let match_elem = elem
        .match_elem
        .ok_or_else(|| missing(label, "match"))?;
    let url = match_elem.url.ok_or_else(|| missing(label, "url"))?;

    let pattern = compile(&url, match_elem.ignore_case.unwrap_or(true), label)?;

    let conditions = match elem.conditions {
        Some(conds) => convert_conditions(conds, label)?,
        None => Conditions::default(),
    };

    let stop_processing = elem.stop_processing.unwrap_or(false);
    let action = convert_action(elem.action, stop_processing, label)?;

    Ok(Rule {
        name: elem.name,
        input: MatchInput::Url,
        pattern,
        negate: match_elem.negate.unwrap_or(false),
        conditions,
        action,
    })
}

fn convert_conditions(elem: ConditionsElem, label: &str) -> Result<Conditions, RuleParseError> {
    let grouping = match elem.logical_grouping.as_deref() {
        None => LogicalGrouping::MatchAll,
        Some(value) if value.eq_ignore_ascii_case("MatchAll") => LogicalGrouping::MatchAll,
        Some(value) if value.eq_ignore_ascii_case("MatchAny") => LogicalGrouping::MatchAny,
        Some(value) => {
            return Err(RuleParseError::UnknownLogicalGrouping {
                rule: label.to_string(),
                value: value.to_string(),
            });
        }
    };

    let mut list = Vec::with_capacity(elem.conditions.len());
    for cond in elem.conditions {
        let input = cond.input.ok_or_else(|| missing(label, "input"))?;
        let pattern = cond.pattern.ok_or_else(|| missing(label, "pattern"))?;
        list.push(Condition {
            input: template(&input, label)?,
            pattern: compile(&pattern, cond.ignore_case.unwrap_or(true), label)?,
            negate: cond.negate.unwrap_or(false),
        });
    }

    Ok(Conditions {
        grouping,
        track_all_captures: elem.track_all_captures.unwrap_or(false),
        list,
    })
}

fn convert_action(
    elem: Option<ActionElem>,
    stop_processing: bool,
    label: &str,
) -> Result<RuleAction, RuleParseError> {
    let Some(elem) = elem else {
        return Ok(RuleAction::None { stop_processing });
    };

    let kind = elem.action_type.unwrap_or_else(|| "None".to_string());
    match kind.to_ascii_lowercase().as_str() {
        "none" => Ok(RuleAction::None { stop_processing }),
        "rewrite" => {
            let url = elem.url.ok_or_else(|| missing(label, "url"))?;
            Ok(RuleAction::Rewrite {
                target: template(&url, label)?,
                stop_processing,
                append_query_string: elem.append_query_string.unwrap_or(true),
            })
        }
        "redirect" => {
            let url = elem.url.ok_or_else(|| missing(label, "url"))?;
            let status = match (elem.status_code, elem.redirect_type.as_deref()) {
                (Some(code), _) => RedirectStatus::from_code(code, label)?,
                (None, Some(kind)) => redirect_type(kind, label)?,
                (None, None) => RedirectStatus::default(),
            };
            Ok(RuleAction::Redirect {
                target: template(&url, label)?,
                status,
                append_query_string: elem.append_query_string.unwrap_or(true),
            })
        }
        "abortrequest" => Ok(RuleAction::AbortRequest),
        "customresponse" => {
            let status = elem
                .status_code
                .ok_or_else(|| missing(label, "statusCode"))?;
            if !(200..=599).contains(&status) {
                return Err(RuleParseError::InvalidStatusCode {
                    rule: label.to_string(),
                    code: status,
                });
            }
            Ok(RuleAction::CustomResponse {
                status,
                reason: elem.status_reason,
                description: elem.status_description,
            })
        }
        _ => Err(RuleParseError::UnsupportedAction {
            rule: label.to_string(),
            kind,
        }),
    }
}

fn redirect_type(kind: &str, label: &str) -> Result<RedirectStatus, RuleParseError> {
    match kind.to_ascii_lowercase().as_str() {
        "permanent" => Ok(RedirectStatus::MovedPermanently),
        "found" => Ok(RedirectStatus::Found),
        "temporary" => Ok(RedirectStatus::TemporaryRedirect),
        // SeeOther (303) falls outside the supported redirect set.
        "seeother" => Err(RuleParseError::InvalidStatusCode {
            rule: label.to_string(),
            code: 303,
        }),
        _ => Err(RuleParseError::UnsupportedAction {
            rule: label.to_string(),
            kind: format!("redirectType '{kind}'"),
        }),
    }
}

fn compile(pattern: &str, ignore_case: bool, label: &str) -> Result<regex::Regex, RuleParseError> {
    RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|source| RuleParseError::InvalidRegex {
            rule: label.to_string(),
            source,
        })
}

fn template(raw: &str, label: &str) -> Result<TargetTemplate, RuleParseError> {
    TargetTemplate::parse(raw).map_err(|source| RuleParseError::MalformedTemplate {
        rule: label.to_string(),
        source,
    })
}

fn missing(label: &str, attribute: &str) -> RuleParseError {
    RuleParseError::MissingAttribute {
        rule: label.to_string(),
        attribute: attribute.to_string(),
    }
}
