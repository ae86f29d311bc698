//! Fan-out reporting of errors to a file, the log stream and a database table.
//!
//! Every sink swallows its own failures (a warning is emitted instead) so a
//! broken sink never turns one error into two.

use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::driver::DatabaseDriver;
use crate::error::{AppError, DbError, Severity};
use crate::statement::Params;
use crate::translation::is_plain_identifier;
use crate::types::{FetchMode, ParamType};

/// Something that can be reported: a public message, an internal diagnostic
/// and a severity.
pub trait ErrorReport {
    fn public_message(&self) -> &str;

    fn diagnostic(&self) -> Cow<'_, str>;

    fn severity(&self) -> Severity;

    fn code(&self) -> i32;

    /// Append the diagnostic to `path` as one line.
    fn log_to_file(&self, path: impl AsRef<Path>) -> &Self
    where
        Self: Sized,
    {
        let path = path.as_ref();
        let line = format!(
            "{} [{}] {}\n",
            chrono::Local::now().format("%F %T"),
            self.severity(),
            self.diagnostic()
        );
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(e) = written {
            tracing::warn!(path = %path.display(), error = %e, "could not write error log");
        }
        self
    }

    /// Emit the diagnostic as a `tracing` event at the matching level.
    fn log_to_syslog(&self) -> &Self
    where
        Self: Sized,
    {
        let diagnostic = self.diagnostic();
        let code = self.code();
        match self.severity() {
            Severity::Fatal => tracing::error!(code, "{diagnostic}"),
            Severity::Warning => tracing::warn!(code, "{diagnostic}"),
            Severity::Info => tracing::info!(code, "{diagnostic}"),
            Severity::Debug => tracing::debug!(code, "{diagnostic}"),
        }
        self
    }

    /// The public message, wrapped and HTML-escaped when `html` is set.
    fn render(&self, html: bool) -> String {
        if html {
            format!(r#"<div class="app_error">{}</div>"#, escape_html(self.public_message()))
        } else {
            self.public_message().to_string()
        }
    }
}

impl ErrorReport for AppError {
    fn public_message(&self) -> &str {
        self.message()
    }

    fn diagnostic(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.internal_message())
    }

    fn severity(&self) -> Severity {
        AppError::severity(self)
    }

    fn code(&self) -> i32 {
        AppError::code(self)
    }
}

impl ErrorReport for DbError {
    fn public_message(&self) -> &str {
        self.message()
    }

    fn diagnostic(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{}: {}", self.kind(), self.internal_message()))
    }

    fn severity(&self) -> Severity {
        DbError::severity(self)
    }

    fn code(&self) -> i32 {
        self.app().code()
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Insert the diagnostic, prefixed with `prefix`, into `table`.
///
/// The table needs `severity`, `code`, `message` and `logged_at` columns.
/// Returns whether the row was written; failures are logged, never raised.
pub async fn log_to_db<R>(
    report: &R,
    driver: &mut dyn DatabaseDriver,
    table: &str,
    prefix: &str,
) -> bool
where
    R: ErrorReport + ?Sized,
{
    if !is_plain_identifier(table) {
        tracing::warn!(table, "refusing to log errors into a table with an unusual name");
        return false;
    }
    let sql = format!(
        "INSERT INTO {table} (severity, code, message, logged_at) VALUES (?, ?, ?, CURRENT_TIMESTAMP)"
    );
    let params = Params::new()
        .with(1usize, report.severity().as_i64(), ParamType::Integer)
        .with(2usize, i64::from(report.code()), ParamType::Integer)
        .with(3usize, format!("{prefix}{}", report.diagnostic()), ParamType::String);
    match driver.stmt_query(&sql, params, false, FetchMode::Assoc).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(table, error = %e, "could not write error to the database");
            false
        }
    }
}
