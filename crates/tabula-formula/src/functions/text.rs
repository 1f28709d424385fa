//! Text functions
//!
//! Positions and lengths count characters, not bytes.

use super::{arg, has_arg, num, text};
use crate::coercion::{number_to_text as fmt, to_boolean, to_number, to_text};
use crate::context::EvalContext;
use crate::error::{EvalResult, EvaluationError, RegistrationError};
use crate::helpers::{ensure, visit_any};
use crate::registry::{FunctionDef, FunctionRegistry};
use crate::value::Value;
use lazy_regex::regex_replace_all;
use tabula_core::format::format_number;

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistrationError> {
    // CHAR
    registry.add(
        "CHAR",
        FunctionDef::new(
            "Gets character associated with number.",
            &["table_number (number)"],
            "STRING",
            fn_char,
        ),
    )?;

    // CLEAN
    registry.add(
        "CLEAN",
        FunctionDef::new("Remove non-printable characters from a piece of text.", &["text (string)"], "STRING", fn_clean),
    )?;

    // CODE
    registry.add(
        "CODE",
        FunctionDef::new("Numeric code of the first character.", &["text (string)"], "NUMBER", fn_code),
    )?;

    // CONCATENATE
    registry.add(
        "CONCATENATE",
        FunctionDef::new(
            "Appends strings to one another.",
            &["string1 (string, range<string>)", "string2 (string, range<string>, repeating)"],
            "STRING",
            fn_concatenate,
        ),
    )?;

    // EXACT
    registry.add(
        "EXACT",
        FunctionDef::new(
            "Tests whether two strings are identical.",
            &["string1 (string)", "string2 (string)"],
            "BOOLEAN",
            fn_exact,
        ),
    )?;

    // FIND
    registry.add(
        "FIND",
        FunctionDef::new(
            "First position of string found in text, case-sensitive.",
            &[
                "search_for (string)",
                "text_to_search (string)",
                "starting_at (number, optional, default=1)",
            ],
            "NUMBER",
            fn_find,
        ),
    )?;

    // JOIN
    registry.add(
        "JOIN",
        FunctionDef::new(
            "Concatenates elements of arrays with delimiter.",
            &[
                "delimiter (string)",
                "value_or_array1 (string, range<string>)",
                "value_or_array2 (string, range<string>, repeating)",
            ],
            "STRING",
            fn_join,
        ),
    )?;

    // LEFT
    registry.add(
        "LEFT",
        FunctionDef::new(
            "Substring from beginning of specified string.",
            &["text (string)", "number_of_characters (number, optional, default=1)"],
            "STRING",
            fn_left,
        ),
    )?;

    // LEN
    registry.add("LEN", FunctionDef::new("Length of a string.", &["text (string)"], "NUMBER", fn_len))?;

    // LOWER
    registry.add(
        "LOWER",
        FunctionDef::new("Converts a specified string to lowercase.", &["text (string)"], "STRING", fn_lower),
    )?;

    // MID
    registry.add(
        "MID",
        FunctionDef::new(
            "A segment of a string.",
            &["text (string)", "starting_at (number)", "extract_length (number)"],
            "STRING",
            fn_mid,
        ),
    )?;

    // PROPER
    registry.add(
        "PROPER",
        FunctionDef::new(
            "Capitalizes each word in a specified string.",
            &["text_to_capitalize (string)"],
            "STRING",
            fn_proper,
        ),
    )?;

    // REPLACE
    registry.add(
        "REPLACE",
        FunctionDef::new(
            "Replaces part of a text string with different text.",
            &["text (string)", "position (number)", "length (number)", "new_text (string)"],
            "STRING",
            fn_replace,
        ),
    )?;

    // REPT
    registry.add(
        "REPT",
        FunctionDef::new(
            "Repeats text a specified number of times.",
            &["text_to_repeat (string)", "number_of_repetitions (number)"],
            "STRING",
            fn_rept,
        ),
    )?;

    // RIGHT
    registry.add(
        "RIGHT",
        FunctionDef::new(
            "A substring from the end of a specified string.",
            &["text (string)", "number_of_characters (number, optional, default=1)"],
            "STRING",
            fn_right,
        ),
    )?;

    // SEARCH
    registry.add(
        "SEARCH",
        FunctionDef::new(
            "First position of string found in text, ignoring case.",
            &[
                "search_for (string)",
                "text_to_search (string)",
                "starting_at (number, optional, default=1)",
            ],
            "NUMBER",
            fn_search,
        ),
    )?;

    // SPLIT
    registry.add(
        "SPLIT",
        FunctionDef::new(
            "Split text by specific character delimiter(s).",
            &[
                "text (string)",
                "delimiter (string)",
                "split_by_each (boolean, optional, default=TRUE)",
                "remove_empty_text (boolean, optional, default=TRUE)",
            ],
            "STRING",
            fn_split,
        ),
    )?;

    // SUBSTITUTE
    registry.add(
        "SUBSTITUTE",
        FunctionDef::new(
            "Replaces existing text with new text in a string.",
            &[
                "text_to_search (string)",
                "search_for (string)",
                "replace_with (string)",
                "occurrence_number (number, optional)",
            ],
            "STRING",
            fn_substitute,
        ),
    )?;

    // TEXT
    registry.add(
        "TEXT",
        FunctionDef::new(
            "Converts a number to text according to a specified format.",
            &["number (number)", "format (string)"],
            "STRING",
            fn_text,
        ),
    )?;

    // TEXTJOIN
    registry.add(
        "TEXTJOIN",
        FunctionDef::new(
            "Combines text from multiple strings and/or arrays.",
            &[
                "delimiter (string)",
                "ignore_empty (boolean)",
                "text1 (string, range<string>)",
                "text2 (string, range<string>, repeating)",
            ],
            "STRING",
            fn_textjoin,
        ),
    )?;

    // TRIM
    registry.add(
        "TRIM",
        FunctionDef::new("Removes space characters.", &["text (string)"], "STRING", fn_trim),
    )?;

    // UNICHAR
    registry.add(
        "UNICHAR",
        FunctionDef::new("Unicode character of a number.", &["number (number)"], "STRING", fn_unichar),
    )?;

    // UPPER
    registry.add(
        "UPPER",
        FunctionDef::new("Converts a specified string to uppercase.", &["text (string)"], "STRING", fn_upper),
    )?;

    // VALUE
    registry.add(
        "VALUE",
        FunctionDef::new(
            "Converts a string to a numeric value.",
            &["value (number)"],
            "NUMBER",
            fn_value,
        ),
    )?;

    Ok(())
}

fn string(s: impl Into<String>) -> EvalResult<Value> {
    Ok(Value::Text(s.into()))
}

fn non_negative(name: &str, value: f64) -> EvalResult<()> {
    ensure(value >= 0.0, || format!("The {} ({}) must be positive or null.", name, fmt(value)))
}

fn fn_char(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let code = num(args, 0, ctx)?.trunc();
    ensure((1.0..=255.0).contains(&code), || {
        format!("The table_number ({}) is out of range.", fmt(code))
    })?;
    let c = char::from(code as u8);
    string(c.to_string())
}

fn fn_unichar(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let code = num(args, 0, ctx)?.trunc();
    let c = (code >= 1.0)
        .then(|| char::from_u32(code as u32))
        .flatten()
        .ok_or_else(|| EvaluationError::new(format!("The number ({}) is not a valid character code.", fmt(code))))?;
    string(c.to_string())
}

fn fn_code(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let s = text(args, 0)?;
    let first = s
        .chars()
        .next()
        .ok_or_else(|| EvaluationError::new("The text must not be empty."))?;
    Ok(Value::Number(first as u32 as f64))
}

fn fn_clean(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    string(text(args, 0)?.chars().filter(|c| (*c as u32) >= 32).collect::<String>())
}

/// Text of every element, ranges walked column by column
fn texts(args: &[Value]) -> EvalResult<Vec<String>> {
    let mut out = Vec::new();
    for a in args {
        let mut failure = None;
        visit_any(a, |v| match to_text(v) {
            Ok(s) => out.push(s),
            Err(e) => failure = Some(e),
        });
        if let Some(e) = failure {
            return Err(e);
        }
    }
    Ok(out)
}

fn fn_concatenate(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    string(texts(args)?.concat())
}

fn fn_join(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let delimiter = text(args, 0)?;
    string(texts(&args[1..])?.join(&delimiter))
}

fn fn_textjoin(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let delimiter = text(args, 0)?;
    let ignore_empty = to_boolean(arg(args, 1))?;
    let parts: Vec<String> = texts(&args[2..])?
        .into_iter()
        .filter(|s| !ignore_empty || !s.is_empty())
        .collect();
    string(parts.join(&delimiter))
}

fn fn_exact(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Boolean(text(args, 0)? == text(args, 1)?))
}

/// 1-based character position of `needle` in `haystack`, looking from `start`
fn find_position(needle: &str, haystack: &str, start: f64, ignore_case: bool) -> EvalResult<Value> {
    ensure(!haystack.is_empty(), || "The text_to_search must be non-empty.".to_string())?;
    let length = haystack.chars().count();
    ensure(start >= 1.0, || format!("The starting_at ({}) must be greater than or equal to 1.", fmt(start)))?;
    ensure(start <= length as f64, || {
        format!(
            "The starting_at ({}) must be smaller than or equal to the text_to_search length ({}).",
            fmt(start),
            length
        )
    })?;
    let (needle, haystack) = if ignore_case {
        (needle.to_lowercase(), haystack.to_lowercase())
    } else {
        (needle.to_string(), haystack.to_string())
    };
    let chars: Vec<char> = haystack.chars().collect();
    let pattern: Vec<char> = needle.chars().collect();
    let from = start as usize - 1;
    let found = (from..=chars.len().saturating_sub(pattern.len()))
        .find(|i| chars[*i..].starts_with(&pattern));
    match found {
        Some(i) => Ok(Value::Number(i as f64 + 1.0)),
        None => Err(EvaluationError::new(format!(
            "In [[FUNCTION_NAME]] evaluation, cannot find '{}' within '{}'.",
            needle, haystack
        ))
        .into()),
    }
}

fn fn_find(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    find_position(&text(args, 0)?, &text(args, 1)?, num(args, 2, ctx)?.trunc(), false)
}

fn fn_search(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    find_position(&text(args, 0)?, &text(args, 1)?, num(args, 2, ctx)?.trunc(), true)
}

fn fn_left(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let s = text(args, 0)?;
    let count = num(args, 1, ctx)?.trunc();
    non_negative("number_of_characters", count)?;
    string(s.chars().take(count as usize).collect::<String>())
}

fn fn_right(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let s = text(args, 0)?;
    let count = num(args, 1, ctx)?.trunc();
    non_negative("number_of_characters", count)?;
    let length = s.chars().count();
    string(s.chars().skip(length.saturating_sub(count as usize)).collect::<String>())
}

fn fn_mid(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let s = text(args, 0)?;
    let start = num(args, 1, ctx)?.trunc();
    let length = num(args, 2, ctx)?.trunc();
    ensure(start >= 1.0, || format!("The starting_at argument ({}) must be positive greater than one.", fmt(start)))?;
    non_negative("extract_length", length)?;
    string(s.chars().skip(start as usize - 1).take(length as usize).collect::<String>())
}

fn fn_len(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(text(args, 0)?.chars().count() as f64))
}

fn fn_lower(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    string(text(args, 0)?.to_lowercase())
}

fn fn_upper(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    string(text(args, 0)?.to_uppercase())
}

fn fn_proper(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let mut out = String::new();
    let mut previous_is_letter = false;
    for c in text(args, 0)?.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    string(out)
}

fn fn_replace(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let s = text(args, 0)?;
    let position = num(args, 1, ctx)?.trunc();
    let length = num(args, 2, ctx)?.trunc();
    let new_text = text(args, 3)?;
    ensure(position >= 1.0, || format!("The position ({}) must be greater than or equal to 1.", fmt(position)))?;
    non_negative("length", length)?;
    let chars: Vec<char> = s.chars().collect();
    let start = (position as usize - 1).min(chars.len());
    let end = (start + length as usize).min(chars.len());
    let mut out: String = chars[..start].iter().collect();
    out.push_str(&new_text);
    out.extend(&chars[end..]);
    string(out)
}

fn fn_rept(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let s = text(args, 0)?;
    let times = num(args, 1, ctx)?.trunc();
    non_negative("number_of_repetitions", times)?;
    string(s.repeat(times as usize))
}

fn fn_split(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let s = text(args, 0)?;
    let delimiter = text(args, 1)?;
    let split_by_each = to_boolean(arg(args, 2))?;
    let remove_empty = to_boolean(arg(args, 3))?;
    ensure(!delimiter.is_empty(), || "The delimiter must not be empty.".to_string())?;

    let parts: Vec<&str> = if split_by_each {
        s.split(|c| delimiter.contains(c)).collect()
    } else {
        s.split(delimiter.as_str()).collect()
    };
    let columns: Vec<Vec<Value>> = parts
        .into_iter()
        .filter(|p| !remove_empty || !p.is_empty())
        .map(|p| vec![Value::Text(p.to_string())])
        .collect();
    if columns.is_empty() {
        return string("");
    }
    Ok(Value::Matrix(columns))
}

fn fn_substitute(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let s = text(args, 0)?;
    let search_for = text(args, 1)?;
    let replace_with = text(args, 2)?;
    if search_for.is_empty() {
        return string(s);
    }
    if !has_arg(args, 3) {
        return string(s.replace(&search_for, &replace_with));
    }
    let occurrence = num(args, 3, ctx)?.trunc();
    non_negative("occurrence_number", occurrence)?;
    if occurrence == 0.0 {
        return string(s.replace(&search_for, &replace_with));
    }
    match s.match_indices(&search_for).nth(occurrence as usize - 1) {
        Some((index, found)) => {
            let mut out = String::with_capacity(s.len());
            out.push_str(&s[..index]);
            out.push_str(&replace_with);
            out.push_str(&s[index + found.len()..]);
            string(out)
        }
        None => string(s),
    }
}

fn fn_text(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let format = text(args, 1)?;
    match to_number(arg(args, 0), ctx.locale) {
        Ok(n) => string(format_number(n, Some(&format), ctx.locale)),
        Err(_) => string(text(args, 0)?),
    }
}

fn fn_trim(args: &[Value], _ctx: &EvalContext<'_>) -> EvalResult<Value> {
    let s = text(args, 0)?;
    string(regex_replace_all!(r" +", s.trim(), " ").into_owned())
}

fn fn_value(args: &[Value], ctx: &EvalContext<'_>) -> EvalResult<Value> {
    Ok(Value::Number(to_number(arg(args, 0), ctx.locale)?))
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_substrings() {
        assert_eq!(eval("=LEFT(\"héllo\", 2)"), Value::from("hé"));
        assert_eq!(eval("=LEFT(\"hello\")"), Value::from("h"));
        assert_eq!(eval("=RIGHT(\"hello\", 3)"), Value::from("llo"));
        assert_eq!(eval("=RIGHT(\"hi\", 10)"), Value::from("hi"));
        assert_eq!(eval("=MID(\"spreadsheet\", 7, 5)"), Value::from("sheet"));
        assert_eq!(eval("=LEN(\"héllo\")"), Value::Number(5.0));
        assert!(eval("=LEFT(\"hello\", -1)").is_error());
    }

    #[test]
    fn test_search() {
        assert_eq!(eval_number("=FIND(\"l\", \"hello\")"), 3.0);
        assert_eq!(eval_number("=FIND(\"l\", \"hello\", 4)"), 4.0);
        assert_eq!(eval_number("=SEARCH(\"L\", \"hello\")"), 3.0);
        assert!(eval("=FIND(\"L\", \"hello\")").is_error());
        assert_eq!(
            eval_error("=FIND(\"z\", \"abc\")"),
            "In FIND evaluation, cannot find 'z' within 'abc'."
        );
    }

    #[test]
    fn test_joins() {
        let mut grid = Grid::new(&[
            ("A1", Value::from("a")),
            ("A3", Value::from("c")),
        ]);
        assert_eq!(eval_in("=CONCATENATE(A1:A3, \"!\")", &mut grid), Value::from("ac!"));
        assert_eq!(eval_in("=JOIN(\"-\", A1:A3)", &mut grid), Value::from("a--c"));
        assert_eq!(eval_in("=TEXTJOIN(\"-\", TRUE, A1:A3)", &mut grid), Value::from("a-c"));
        assert_eq!(eval("=CONCATENATE(1, TRUE)"), Value::from("1TRUE"));
    }

    #[test]
    fn test_transformations() {
        assert_eq!(eval("=PROPER(\"hello wORLD-foo\")"), Value::from("Hello World-Foo"));
        assert_eq!(eval("=TRIM(\"  a   b  \")"), Value::from("a b"));
        assert_eq!(eval("=REPLACE(\"abcdef\", 2, 3, \"X\")"), Value::from("aXef"));
        assert_eq!(eval("=REPT(\"ab\", 3)"), Value::from("ababab"));
        assert_eq!(eval("=SUBSTITUTE(\"a-b-c\", \"-\", \"+\")"), Value::from("a+b+c"));
        assert_eq!(eval("=SUBSTITUTE(\"a-b-c\", \"-\", \"+\", 2)"), Value::from("a-b+c"));
        assert_eq!(eval("=UPPER(\"abc\")"), Value::from("ABC"));
        assert_eq!(eval("=EXACT(\"a\", \"A\")"), Value::Boolean(false));
        assert_eq!(eval("=CLEAN(CHAR(7) & \"ok\")"), Value::from("ok"));
    }

    #[test]
    fn test_codes() {
        assert_eq!(eval("=CHAR(65)"), Value::from("A"));
        assert_eq!(eval_number("=CODE(\"A\")"), 65.0);
        assert_eq!(eval("=UNICHAR(8364)"), Value::from("€"));
        assert!(eval("=CHAR(0)").is_error());
    }

    #[test]
    fn test_split() {
        assert_eq!(
            eval("=COLUMNS(SPLIT(\"a,b;;c\", \",;\"))"),
            Value::Number(3.0)
        );
        assert_eq!(
            eval("=COLUMNS(SPLIT(\"a,b;;c\", \",;\", TRUE, FALSE))"),
            Value::Number(4.0)
        );
    }

    #[test]
    fn test_value_and_text() {
        assert_eq!(eval_number("=VALUE(\"12.5\")"), 12.5);
        assert_eq!(eval_number("=VALUE(\"50%\")"), 0.5);
        assert!(eval("=VALUE(\"abc\")").is_error());
        assert_eq!(eval("=TEXT(0.5, \"0%\")"), Value::from("50%"));
        assert_eq!(eval("=TEXT(1234.5, \"#,##0.00\")"), Value::from("1,234.50"));
    }
}
