// src/expand.rs
use crate::types::{Query, RustReconError, Target, TargetKind, Template};
use log::debug;
use regex::Regex;
use std::collections::HashSet;

/// Auxiliary fields the user may supply alongside the target. `words` backs
/// the multi-valued `{word}` placeholder (subdomain wordlists).
#[derive(Debug, Clone, Default)]
pub struct AuxFields {
    pub first: Option<String>,
    pub last: Option<String>,
    pub words: Option<Vec<String>>,
}

/// Values a single placeholder can take for this target + aux combination.
/// Most placeholders are single-valued; `{word}` fans out over the wordlist.
fn placeholder_values(name: &str, target: &Target, aux: &AuxFields) -> Option<Vec<String>> {
    match name {
        "query" => Some(vec![urlencoding::encode(&target.normalized).into_owned()]),
        "username" if target.kind == TargetKind::Username => {
            Some(vec![target.normalized.clone()])
        }
        "domain" => match target.kind {
            TargetKind::Domain => Some(vec![target.normalized.clone()]),
            TargetKind::Email => target
                .normalized
                .split_once('@')
                .map(|(_, d)| vec![d.to_string()]),
            _ => None,
        },
        "address" if matches!(target.kind, TargetKind::Ip | TargetKind::Crypto) => {
            Some(vec![target.normalized.clone()])
        }
        "first" => aux.first.as_ref().map(|v| vec![v.to_lowercase()]),
        "last" => aux.last.as_ref().map(|v| vec![v.to_lowercase()]),
        "fi" => aux
            .first
            .as_ref()
            .and_then(|v| v.chars().next())
            .map(|c| vec![c.to_lowercase().to_string()]),
        "li" => aux
            .last
            .as_ref()
            .and_then(|v| v.chars().next())
            .map(|c| vec![c.to_lowercase().to_string()]),
        "word" => aux.words.clone(),
        _ => None,
    }
}

fn placeholder_regex() -> Regex {
    Regex::new(r"\{(\w+)\}").expect("placeholder regex is valid")
}

/// Placeholder names a pattern declares, in order of first appearance.
pub fn placeholders(pattern: &str) -> Vec<String> {
    let re = placeholder_regex();
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for cap in re.captures_iter(pattern) {
        let name = cap[1].to_string();
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    names
}

/// Expand one template against a target. The output is the cross-product of
/// every placeholder's value set, deduplicated and in substitution order.
/// Pure: same inputs always yield the same sequence.
pub fn expand(
    template: &Template,
    target: &Target,
    aux: &AuxFields,
) -> Result<Vec<String>, RustReconError> {
    let names = placeholders(&template.pattern);
    if names.is_empty() {
        return Ok(vec![template.pattern.clone()]);
    }

    let mut expanded = vec![template.pattern.clone()];
    for name in &names {
        let values = placeholder_values(name, target, aux).ok_or_else(|| {
            RustReconError::TemplateError(format!(
                "template '{}': no source for placeholder '{{{}}}'",
                template.id, name
            ))
        })?;
        if values.is_empty() {
            return Err(RustReconError::TemplateError(format!(
                "template '{}': placeholder '{{{}}}' has an empty value set",
                template.id, name
            )));
        }

        let token = format!("{{{}}}", name);
        let mut next = Vec::with_capacity(expanded.len() * values.len());
        for partial in &expanded {
            for value in &values {
                next.push(partial.replace(&token, value));
            }
        }
        expanded = next;
    }

    let mut seen = HashSet::new();
    expanded.retain(|s| seen.insert(s.clone()));
    Ok(expanded)
}

/// Expand a template set into queries. Templates whose placeholders the
/// target cannot satisfy are skipped, not errored; siblings still run.
/// Deduplication spans the whole set, preserving declaration order first and
/// substitution order second.
pub fn expand_all(templates: &[Template], target: &Target, aux: &AuxFields) -> Vec<Query> {
    let mut seen = HashSet::new();
    let mut queries = Vec::new();

    for template in templates {
        match expand(template, target, aux) {
            Ok(resolved) => {
                for value in resolved {
                    if seen.insert(value.clone()) {
                        queries.push(Query {
                            resolved: value,
                            template_id: template.id.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
            Err(e) => {
                debug!("Skipping template '{}': {}", template.id, e);
            }
        }
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::parse_target;

    fn email_target() -> Target {
        parse_target("contact@example.com", None).unwrap()
    }

    fn username_target() -> Target {
        parse_target("johndoe123", None).unwrap()
    }

    #[test]
    fn test_email_pattern_expansion() {
        let template = Template::new("first.last", "{first}.{last}@{domain}");
        let aux = AuxFields {
            first: Some("john".to_string()),
            last: Some("doe".to_string()),
            words: None,
        };
        let out = expand(&template, &email_target(), &aux).unwrap();
        assert_eq!(out, vec!["john.doe@example.com".to_string()]);
    }

    #[test]
    fn test_username_template() {
        let template = Template::new("github", "https://github.com/{username}");
        let out = expand(&template, &username_target(), &AuxFields::default()).unwrap();
        assert_eq!(out, vec!["https://github.com/johndoe123".to_string()]);
    }

    #[test]
    fn test_unsatisfiable_placeholder_errors() {
        let template = Template::new("first.last", "{first}.{last}@{domain}");
        let err = expand(&template, &email_target(), &AuxFields::default());
        assert!(matches!(err, Err(RustReconError::TemplateError(_))));
    }

    #[test]
    fn test_word_cross_product_order_and_dedup() {
        let target = parse_target("example.com", None).unwrap();
        let template = Template::new("sub", "{word}.{domain}");
        let aux = AuxFields {
            words: Some(vec![
                "www".to_string(),
                "mail".to_string(),
                "www".to_string(),
            ]),
            ..Default::default()
        };
        let out = expand(&template, &target, &aux).unwrap();
        assert_eq!(out, vec!["www.example.com", "mail.example.com"]);
    }

    #[test]
    fn test_expansion_is_deterministic() {
        let target = parse_target("example.com", None).unwrap();
        let template = Template::new("sub", "{word}.{domain}");
        let aux = AuxFields {
            words: Some(vec!["api".to_string(), "dev".to_string()]),
            ..Default::default()
        };
        let a = expand(&template, &target, &aux).unwrap();
        let b = expand(&template, &target, &aux).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_expand_all_skips_bad_templates() {
        let templates = vec![
            Template::new("needs-name", "{first}@{domain}"),
            Template::new("plain", "https://haveibeenpwned.com/account/{query}"),
        ];
        let queries = expand_all(&templates, &email_target(), &AuxFields::default());
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].template_id, "plain");
    }

    #[test]
    fn test_query_placeholder_is_urlencoded() {
        let target = parse_target("john doe", Some(crate::types::TargetKind::Username)).unwrap();
        let template = Template::new("google", "https://www.google.com/search?q={query}");
        let out = expand(&template, &target, &AuxFields::default()).unwrap();
        assert_eq!(out, vec!["https://www.google.com/search?q=john%20doe"]);
    }

    #[test]
    fn test_expand_all_dedups_across_templates() {
        let templates = vec![
            Template::new("a", "{last}@{domain}"),
            Template::new("b", "{last}@{domain}"),
        ];
        let aux = AuxFields {
            first: Some("john".to_string()),
            last: Some("doe".to_string()),
            words: None,
        };
        let queries = expand_all(&templates, &email_target(), &aux);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].template_id, "a");
    }
}
