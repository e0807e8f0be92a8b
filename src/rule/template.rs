use crate::request::RequestDescriptor;
use crate::rule::map::RewriteMaps;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unbalanced braces in template '{0}'")]
    UnbalancedBraces(String),

    #[error("empty group in template '{0}'")]
    EmptyGroup(String),
}

/// A parsed target template. Supports `$n` rule back-references, `{R:n}` as
/// the IIS spelling of the same, `{C:n}` condition back-references (the bare
/// `{Cn}` spelling is also accepted), `{SERVER_VAR}` lookups and
/// `{MapName:key}` rewrite-map lookups where the key may itself be a
/// template, e.g. `{StaticRewrites:{REQUEST_URI}}`.
#[derive(Debug, Clone)]
pub struct TargetTemplate {
    raw: String,
    tokens: Vec<Token>,
}

#[derive(Debug, Clone)]
enum Token {
    Literal(String),
    RuleCapture(usize),
    ConditionCapture(usize),
    ServerVariable(String),
    MapLookup { map: String, key: TargetTemplate },
}

/// Everything a template may draw values from during expansion. Capture
/// slices use regex numbering: index 0 is the whole match.
pub struct ExpandContext<'a> {
    pub request: &'a RequestDescriptor,
    pub rule_captures: &'a [String],
    pub condition_captures: &'a [String],
    pub maps: &'a RewriteMaps,
}

impl TargetTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '$' => {
                    let mut digits = String::new();
                    while let Some(d) = chars.peek() {
                        if d.is_ascii_digit() {
                            digits.push(*d);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if digits.is_empty() {
                        // Bare '$' is a literal.
                        literal.push('$');
                    } else {
                        flush(&mut tokens, &mut literal);
                        tokens.push(Token::RuleCapture(digits.parse().unwrap_or(0)));
                    }
                }
                '{' => {
                    let mut depth = 1usize;
                    let mut inner = String::new();
                    for d in chars.by_ref() {
                        match d {
                            '{' => {
                                depth += 1;
                                inner.push(d);
                            }
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                                inner.push(d);
                            }
                            _ => inner.push(d),
                        }
                    }
                    if depth != 0 {
                        return Err(TemplateError::UnbalancedBraces(raw.to_string()));
                    }
                    if inner.is_empty() {
                        return Err(TemplateError::EmptyGroup(raw.to_string()));
                    }
                    flush(&mut tokens, &mut literal);
                    tokens.push(parse_group(&inner, raw)?);
                }
                '}' => return Err(TemplateError::UnbalancedBraces(raw.to_string())),
                _ => literal.push(c),
            }
        }
        flush(&mut tokens, &mut literal);

        Ok(Self {
            raw: raw.to_string(),
            tokens,
        })
    }

    /// The template source text as written in the rule.
    #[inline]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Expand the template. References to capture groups, server variables
    /// or map keys that do not exist resolve to the empty string rather than
    /// failing the request.
    pub fn expand(&self, ctx: &ExpandContext<'_>) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for token in &self.tokens {
            match token {
                Token::Literal(s) => out.push_str(s),
                Token::RuleCapture(n) => {
                    if let Some(value) = ctx.rule_captures.get(*n) {
                        out.push_str(value);
                    }
                }
                Token::ConditionCapture(n) => {
                    if let Some(value) = ctx.condition_captures.get(*n) {
                        out.push_str(value);
                    }
                }
                Token::ServerVariable(name) => {
                    if let Some(value) = ctx.request.server_variable(name) {
                        out.push_str(&value);
                    }
                }
                Token::MapLookup { map, key } => {
                    let key = key.expand(ctx);
                    if let Some(value) = ctx.maps.lookup(map, &key) {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }
}

fn flush(tokens: &mut Vec<Token>, literal: &mut String) {
    if !literal.is_empty() {
        tokens.push(Token::Literal(std::mem::take(literal)));
    }
}

fn parse_group(inner: &str, raw: &str) -> Result<Token, TemplateError> {
    if let Some(rest) = inner.strip_prefix("C:") {
        if let Ok(n) = rest.parse::<usize>() {
            return Ok(Token::ConditionCapture(n));
        }
    }
    if let Some(rest) = inner.strip_prefix("R:") {
        if let Ok(n) = rest.parse::<usize>() {
            return Ok(Token::RuleCapture(n));
        }
    }
    // {C1} shorthand
    if let Some(rest) = inner.strip_prefix('C') {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(Token::ConditionCapture(rest.parse().unwrap_or(0)));
        }
    }
    // A colon outside of nested braces separates map name from key.
    if let Some(pos) = top_level_colon(inner) {
        let (name, key) = (&inner[..pos], &inner[pos + 1..]);
        if key.is_empty() {
            return Err(TemplateError::EmptyGroup(raw.to_string()));
        }
        return Ok(Token::MapLookup {
            map: name.to_string(),
            key: TargetTemplate::parse(key)?,
        });
    }
    Ok(Token::ServerVariable(inner.to_string()))
}

fn top_level_colon(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}
