//! `{column}` templates.
//!
//! `{name}` is replaced by the row's value for `name`; `{{` and `}}` stand
//! for literal braces. Templates are parsed once, when the operation is built.

use crate::columns::has_value;
use rowtask::{
    ApplyError, Error, Operation, OperationDecl, OperationFactory, Options, Result, Row, RowExt,
    parse_options,
};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Column(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                return Err(Error::config(format!(
                                    "unclosed '{{' in template \"{source}\""
                                )));
                            }
                            Some(c) => name.push(c),
                        }
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(Error::config(format!(
                            "empty column name in template \"{source}\""
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Column(name.to_string()));
                }
                '}' => {
                    return Err(Error::config(format!(
                        "unmatched '}}' in template \"{source}\" (use '}}}}' for a literal brace)"
                    )));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Columns the template reads, in order of first use.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Column(c) => Some(c.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Fill the template from `row`. A missing column is a lookup error.
    pub fn render(&self, row: &Row) -> std::result::Result<String, ApplyError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Column(c) => out.push_str(row.require(c)?),
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Deserialize)]
struct TemplateConfig {
    template: String,
    output: String,
}

/// Write a filled-in template to a column.
#[derive(Debug, Clone)]
pub struct TemplateOperation {
    template: Template,
    output: String,
}

impl TemplateOperation {
    pub fn new(template: Template, output: impl Into<String>) -> Self {
        Self {
            template,
            output: output.into(),
        }
    }
}

impl Operation for TemplateOperation {
    fn apply(&self, row: &Row) -> std::result::Result<Row, ApplyError> {
        Ok(Row::new().with(&self.output, self.template.render(row)?))
    }

    fn has_previous_result(&self, row: &Row) -> bool {
        has_value(row, &self.output)
    }

    fn name(&self) -> &str {
        "template"
    }
}

pub(crate) struct TemplateFactory {
    decl: OperationDecl,
}

impl TemplateFactory {
    pub fn new() -> Self {
        Self {
            decl: OperationDecl::new("template")
                .description("Fill a text template with row values")
                .required("template", "Text with {column} placeholders; {{ and }} for braces")
                .required("output", "Column to write"),
        }
    }
}

impl OperationFactory for TemplateFactory {
    fn decl(&self) -> &OperationDecl {
        &self.decl
    }

    fn build(&self, options: &Options) -> Result<Box<dyn Operation>> {
        let config: TemplateConfig = parse_options("template", options)?;
        let template = Template::parse(&config.template)?;
        Ok(Box::new(TemplateOperation::new(template, config.output)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let template = Template::parse("{name} was born on {date}.").unwrap();
        let row = Row::new().with("name", "Ada").with("date", "1815-12-10");
        assert_eq!(template.render(&row).unwrap(), "Ada was born on 1815-12-10.");
        assert_eq!(template.columns().collect::<Vec<_>>(), ["name", "date"]);
    }

    #[test]
    fn test_escaped_braces() {
        let template = Template::parse("{{literal}} {x}}}").unwrap();
        let row = Row::new().with("x", "1");
        assert_eq!(template.render(&row).unwrap(), "{literal} 1}");
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["{open", "{}", "stray }", "{a{b}"] {
            let err = Template::parse(bad).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{bad}: {err:?}");
        }
    }

    #[test]
    fn test_missing_column() {
        let template = Template::parse("{a}-{b}").unwrap();
        let err = template.render(&Row::new().with("a", "1")).unwrap_err();
        assert!(matches!(err, ApplyError::Lookup(ref c) if c == "b"));
    }

    #[test]
    fn test_operation() {
        let mut options = Options::new();
        options.insert("template".into(), "{patient}/{date}".into());
        options.insert("output".into(), "key".into());
        let op = TemplateFactory::new().build(&options).unwrap();

        let row = Row::new().with("patient", "p1").with("date", "d1");
        assert_eq!(op.apply(&row).unwrap(), Row::new().with("key", "p1/d1"));
        assert!(op.has_previous_result(&row.merged(Row::new().with("key", "p1/d1"))));
    }
}
