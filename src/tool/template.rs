//! Argument template rendering.

use thiserror::Error;

pub const RESOURCE_PLACEHOLDER: &str = "{resource}";
pub const ACCOUNT_PLACEHOLDER: &str = "{account}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("'{command}' template is empty")]
    Empty { command: &'static str },

    #[error("'{command}' template needs {placeholder} but no value is available")]
    Unresolved {
        command: &'static str,
        placeholder: &'static str,
    },
}

/// Values substituted into templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateVars<'a> {
    pub resource: Option<&'a str>,
    pub account: Option<&'a str>,
}

/// Render `template` into an argument list.
///
/// Only `{resource}` and `{account}` are recognized; any other text,
/// including other braces, is passed through verbatim.
pub fn render(
    command: &'static str,
    template: &[String],
    vars: TemplateVars<'_>,
) -> Result<Vec<String>, TemplateError> {
    if template.is_empty() {
        return Err(TemplateError::Empty { command });
    }

    template
        .iter()
        .map(|arg| {
            let arg = substitute(command, arg, RESOURCE_PLACEHOLDER, vars.resource)?;
            substitute(command, &arg, ACCOUNT_PLACEHOLDER, vars.account)
        })
        .collect()
}

fn substitute(
    command: &'static str,
    arg: &str,
    placeholder: &'static str,
    value: Option<&str>,
) -> Result<String, TemplateError> {
    if !arg.contains(placeholder) {
        return Ok(arg.to_string());
    }
    match value {
        Some(value) => Ok(arg.replace(placeholder, value)),
        None => Err(TemplateError::Unresolved {
            command,
            placeholder,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let args = render(
            "provision",
            &template(&["deploy", "{resource}", "--wallet={account}"]),
            TemplateVars {
                resource: Some("backend"),
                account: Some("wallet-1"),
            },
        )
        .unwrap();
        assert_eq!(args, vec!["deploy", "backend", "--wallet=wallet-1"]);
    }

    #[test]
    fn test_render_leaves_other_braces() {
        let args = render(
            "status",
            &template(&["--format", "{json}", "{resource}"]),
            TemplateVars {
                resource: Some("a"),
                account: None,
            },
        )
        .unwrap();
        assert_eq!(args, vec!["--format", "{json}", "a"]);
    }

    #[test]
    fn test_render_missing_account_is_error() {
        let result = render(
            "provision",
            &template(&["deploy", "{resource}", "--wallet", "{account}"]),
            TemplateVars {
                resource: Some("a"),
                account: None,
            },
        );
        assert_eq!(
            result,
            Err(TemplateError::Unresolved {
                command: "provision",
                placeholder: ACCOUNT_PLACEHOLDER,
            })
        );
    }

    #[test]
    fn test_render_empty_template_is_error() {
        let result = render("status", &[], TemplateVars::default());
        assert_eq!(result, Err(TemplateError::Empty { command: "status" }));
    }
}
