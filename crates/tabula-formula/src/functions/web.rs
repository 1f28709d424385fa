//! Web functions

use super::{arg, text};
use crate::coercion::to_text;
use crate::context::EvalContext;
use crate::error::{EvalResult, RegistrationError};
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::Value;

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // HYPERLINK
    registry.add(
        "HYPERLINK",
        FunctionDef::new(
            "Creates a hyperlink in a cell.",
            &["url (string)", "link_label (string, optional)"],
            "STRING",
            fn_hyperlink,
        ),
    )?;

    Ok(())
}

/// Markdown link `[label](url)`, the text stored in link cells
pub fn markdown_link(label: &str, url: &str) -> String {
    format!("[{}]({})", label, url)
}

fn fn_hyperlink(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let url = text(args, 0)?.trim().to_string();
    let label = to_text(arg(args, 1))?;
    let label = if label.is_empty() { url.clone() } else { label };
    if url.is_empty() {
        return Ok(Value::Text(label));
    }
    Ok(Value::Text(markdown_link(&label, &url)))
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hyperlink() {
        assert_eq!(
            eval("=HYPERLINK(\"https://example.com\", \"site\")"),
            Value::from("[site](https://example.com)")
        );
        assert_eq!(
            eval("=HYPERLINK(\" https://example.com \")"),
            Value::from("[https://example.com](https://example.com)")
        );
        assert_eq!(eval("=HYPERLINK(\"\", \"label\")"), Value::from("label"));
        assert_eq!(eval("=HYPERLINK(\"\")"), Value::from(""));
    }
}
