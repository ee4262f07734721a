//! `{name}` placeholder substitution for prompts and provider commands.
//!
//! `{{` and `}}` render literal braces. Undefined placeholders are errors,
//! never silently blank.

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A placeholder names a variable that was not provided.
    UndefinedVariable { name: String, position: usize },
    /// A `{` without a closing `}`.
    UnmatchedBrace { position: usize },
    /// `{}` with nothing inside.
    EmptyVariableName { position: usize },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::UndefinedVariable { name, position } => {
                write!(f, "undefined placeholder '{{{}}}' at offset {}", name, position)
            }
            TemplateError::UnmatchedBrace { position } => {
                write!(f, "unclosed '{{' at offset {}", position)
            }
            TemplateError::EmptyVariableName { position } => {
                write!(f, "empty placeholder '{{}}' at offset {}", position)
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Substitute `{name}` placeholders from `variables`.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use gatekeep::agent::render_template;
///
/// let mut vars = HashMap::new();
/// vars.insert("model".to_string(), "opus".to_string());
///
/// let line = render_template("claude --model {model}", &vars).unwrap();
/// assert_eq!(line, "claude --model opus");
/// assert_eq!(render_template("{{literal}}", &vars).unwrap(), "{literal}");
/// ```
pub fn render_template(
    template: &str,
    variables: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        match ch {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                rendered.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, c)) => name.push(c),
                        None => return Err(TemplateError::UnmatchedBrace { position }),
                    }
                }

                let name = name.trim();
                if name.is_empty() {
                    return Err(TemplateError::EmptyVariableName { position });
                }
                let value = variables
                    .get(name)
                    .ok_or_else(|| TemplateError::UndefinedVariable {
                        name: name.to_string(),
                        position,
                    })?;
                rendered.push_str(value);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                }
                rendered.push('}');
            }
            _ => rendered.push(ch),
        }
    }

    Ok(rendered)
}

/// Build a variables map from pairs.
pub fn vars<I, K, V>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_and_trims_names() {
        let vars = vars([("step", "plan"), ("task", "Add sum")]);
        let rendered = render_template("[{ step }] {task}", &vars).unwrap();
        assert_eq!(rendered, "[plan] Add sum");
    }

    #[test]
    fn test_escaped_braces_survive() {
        let vars = vars([("x", "1")]);
        let rendered = render_template("fn f() {{ {x} }}", &vars).unwrap();
        assert_eq!(rendered, "fn f() { 1 }");
        // A lone closing brace is literal.
        assert_eq!(render_template("a } b", &vars).unwrap(), "a } b");
    }

    #[test]
    fn test_undefined_placeholder_reports_offset() {
        let err = render_template("run {prompt_file}", &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UndefinedVariable {
                name: "prompt_file".to_string(),
                position: 4,
            }
        );
        assert!(err.to_string().contains("{prompt_file}"));
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(
            render_template("oops {model", &HashMap::new()).unwrap_err(),
            TemplateError::UnmatchedBrace { position: 5 }
        );
        assert_eq!(
            render_template("x {} y", &HashMap::new()).unwrap_err(),
            TemplateError::EmptyVariableName { position: 2 }
        );
    }
}
