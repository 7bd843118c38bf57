use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};

use crate::error::{ErrorCategory, ExprError};

const SOURCE_NAME: &str = "<expression>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub color: bool,
}

impl RenderOptions {
    pub const fn plain() -> Self {
        Self { color: false }
    }

    pub const fn colored() -> Self {
        Self { color: true }
    }
}

fn category_name(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Lexical => "syntax error",
        ErrorCategory::Semantic => "invalid expression",
        ErrorCategory::UnknownSymbol => "unresolved symbol",
    }
}

/// Renders `error` against the expression text it came from.
///
/// Errors with a known column get an underlined report; the others are a
/// single line.
pub fn render_error(source: &str, error: &ExprError, options: RenderOptions) -> String {
    let Some(range) = error.span(source) else {
        return format!("error: {error}");
    };

    let span = (SOURCE_NAME, range);
    let report = Report::build(ReportKind::Error, span.clone())
        .with_config(
            Config::default()
                .with_index_type(IndexType::Byte)
                .with_color(options.color),
        )
        .with_message(error.to_string())
        .with_label(
            Label::new(span)
                .with_color(Color::Red)
                .with_message("here"),
        )
        .with_note(category_name(error.category()))
        .finish();

    let mut output = Vec::new();
    if report
        .write((SOURCE_NAME, Source::from(source)), &mut output)
        .is_ok()
    {
        return String::from_utf8_lossy(&output).into_owned();
    }
    format!("error: {error}\n --> {SOURCE_NAME}:1:{}", error.column().unwrap_or(1))
}
