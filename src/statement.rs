//! Prepared statements and the values bound to them.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::DbError;
use crate::results::CursorLink;
use crate::translation::{ParsedSql, PlaceholderSet};
use crate::types::{BindParam, ParamType, RowValues};

/// Identifies one placeholder: a 1-based position for `?` SQL, a name for `:name` SQL.
///
/// Strings convert the way configuration usually spells them: `":id"` and
/// `"id"` are both the name `id`, while an all-digit string such as `"2"` is
/// position 2.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Placeholder {
    Position(usize),
    Named(String),
}

impl From<usize> for Placeholder {
    fn from(position: usize) -> Self {
        Placeholder::Position(position)
    }
}

impl From<&str> for Placeholder {
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(position) = trimmed.parse() {
                return Placeholder::Position(position);
            }
        }
        Placeholder::Named(trimmed.trim_start_matches(':').to_string())
    }
}

impl From<String> for Placeholder {
    fn from(value: String) -> Self {
        Placeholder::from(value.as_str())
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::Position(n) => write!(f, "?#{n}"),
            Placeholder::Named(name) => write!(f, ":{name}"),
        }
    }
}

/// Ordered placeholder → value pairs for a one-call `stmt_query`.
///
/// ```rust
/// use sql_facade::prelude::*;
///
/// let positional = Params::positional(["Super", "::1"]);
/// let named = Params::named([(":log_id", RowValues::Int(2)), (":log_desc", "::2".into())]);
/// assert_eq!(positional.len(), 2);
/// assert_eq!(named.iter().next().unwrap().0, Placeholder::Named("log_id".into()));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(Placeholder, BindParam)>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Values for `?` markers, numbered from 1 in iteration order.
    #[must_use]
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<BindParam>,
    {
        Self(
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Placeholder::Position(i + 1), v.into()))
                .collect(),
        )
    }

    #[must_use]
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<BindParam>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (Placeholder::Named(k.as_ref().trim_start_matches(':').to_string()), v.into()))
                .collect(),
        )
    }

    /// Add one binding with an explicit declared type.
    #[must_use]
    pub fn with(mut self, placeholder: impl Into<Placeholder>, value: impl Into<RowValues>, kind: ParamType) -> Self {
        self.0.push((placeholder.into(), BindParam::new(value, kind)));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Placeholder, BindParam)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for Params {
    type Item = (Placeholder, BindParam);
    type IntoIter = std::vec::IntoIter<(Placeholder, BindParam)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<RowValues>> for Params {
    fn from(values: Vec<RowValues>) -> Self {
        Params::positional(values)
    }
}

/// Driver-side part of a prepared statement.
pub trait StatementHandle: Send + fmt::Debug + 'static {
    /// Drop server-side buffered results and rearm for another execution.
    ///
    /// # Errors
    /// Returns `DbErrorKind::Statement` if the client refuses the reset.
    fn reset(&mut self) -> Result<(), DbError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A prepared statement: original SQL, the rewritten SQL actually sent, the
/// placeholders it expects and the values bound so far.
///
/// Owned by the caller but tied to the driver instance that prepared it.
#[derive(Debug)]
pub struct Statement {
    connection_id: u64,
    sql: String,
    native_sql: String,
    placeholders: PlaceholderSet,
    column_names: Arc<Vec<String>>,
    bindings: BTreeMap<Placeholder, BindParam>,
    cursor: Option<CursorLink>,
    handle: Box<dyn StatementHandle>,
}

impl Statement {
    /// # Errors
    /// Returns `DbErrorKind::Statement` when the prepared form holds no SQL
    /// beyond whitespace and comments.
    pub fn new(
        connection_id: u64,
        sql: &str,
        parsed: ParsedSql<'_>,
        column_names: Vec<String>,
        handle: Box<dyn StatementHandle>,
    ) -> Result<Self, DbError> {
        if parsed.is_blank() {
            return Err(DbError::statement(
                "An empty statement was passed where a prepared statement was expected",
            )
            .with_query(sql));
        }
        Ok(Self {
            connection_id,
            sql: sql.to_string(),
            native_sql: parsed.sql.into_owned(),
            placeholders: parsed.placeholders,
            column_names: Arc::new(column_names),
            bindings: BTreeMap::new(),
            cursor: None,
            handle,
        })
    }

    /// SQL as the caller wrote it.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// SQL as sent to the client, named placeholders rewritten.
    #[must_use]
    pub fn native_sql(&self) -> &str {
        &self.native_sql
    }

    #[must_use]
    pub fn placeholders(&self) -> &PlaceholderSet {
        &self.placeholders
    }

    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    /// Whether executing yields rows (decided from the prepared column metadata).
    #[must_use]
    pub fn is_row_producing(&self) -> bool {
        !self.column_names.is_empty()
    }

    /// Record one value for one placeholder, coercing it to its declared type.
    ///
    /// Bindings that match no placeholder of this statement are rejected;
    /// binding the same placeholder again replaces the earlier value.
    ///
    /// # Errors
    /// `DbErrorKind::Statement` while a result of the previous execution is
    /// still open; `DbErrorKind::Bind` for unknown placeholders or values that
    /// do not fit the declared type.
    pub fn bind(&mut self, placeholder: Placeholder, param: BindParam) -> Result<(), DbError> {
        self.ensure_no_open_cursor()?;
        let attempted = |why: &str| {
            DbError::bind(
                &self.sql,
                format!(
                    "Wrong placeholder {placeholder} | {:?} | {:?}: {why}",
                    param.value, param.kind
                ),
            )
        };
        match (&self.placeholders, &placeholder) {
            (PlaceholderSet::Positional(n), Placeholder::Position(p)) if (1..=*n).contains(p) => {}
            (PlaceholderSet::Named(_), Placeholder::Named(name))
                if self.placeholders.contains_name(name) => {}
            (PlaceholderSet::None, _) => {
                return Err(attempted("the statement has no placeholders"));
            }
            _ => return Err(attempted("no such placeholder in the statement")),
        }
        let value = param
            .kind
            .coerce(param.value.clone())
            .map_err(|why| attempted(&why))?;
        self.bindings.insert(
            placeholder,
            BindParam {
                value,
                kind: param.kind,
            },
        );
        Ok(())
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&Placeholder, &BindParam)> {
        self.bindings.iter()
    }

    /// Bound values in the order of the positions in [`Statement::native_sql`].
    ///
    /// # Errors
    /// Returns `DbErrorKind::Bind` naming the first placeholder without a value.
    pub fn ordered_params(&self) -> Result<Vec<BindParam>, DbError> {
        let lookup = |key: Placeholder| {
            self.bindings.get(&key).cloned().ok_or_else(|| {
                DbError::bind(&self.sql, format!("Placeholder {key} has no bound value"))
            })
        };
        match &self.placeholders {
            PlaceholderSet::None => Ok(Vec::new()),
            PlaceholderSet::Positional(n) => (1..=*n).map(|p| lookup(Placeholder::Position(p))).collect(),
            PlaceholderSet::Named(names) => names
                .iter()
                .map(|name| lookup(Placeholder::Named(name.clone())))
                .collect(),
        }
    }

    /// Return the statement to a rebindable state without preparing it again.
    ///
    /// Closes any result still linked to the previous execution and discards
    /// the bound values.
    ///
    /// # Errors
    /// Returns `DbErrorKind::Statement` if the driver handle cannot be reset.
    pub fn reset_statement(&mut self) -> Result<(), DbError> {
        if let Some(link) = self.cursor.take() {
            link.close();
        }
        self.bindings.clear();
        self.handle.reset()
    }

    /// # Errors
    /// Returns `DbErrorKind::Statement` while a linked result is still open.
    pub fn ensure_no_open_cursor(&self) -> Result<(), DbError> {
        match &self.cursor {
            Some(link) if link.is_open() => Err(DbError::statement(
                "A result of the previous execution is still open; free it or reset the statement",
            )
            .with_query(self.sql.clone())),
            _ => Ok(()),
        }
    }

    /// Open a fresh link for a result about to be handed out.
    pub(crate) fn attach_cursor(&mut self) -> CursorLink {
        let link = CursorLink::open();
        self.cursor = Some(link.clone());
        link
    }

    /// Borrow the driver handle as its concrete type.
    ///
    /// # Errors
    /// Returns `DbErrorKind::Statement` when the statement was prepared by a
    /// different kind of driver.
    pub fn handle_mut<T: StatementHandle>(&mut self) -> Result<&mut T, DbError> {
        let sql = self.sql.clone();
        self.handle.as_any_mut().downcast_mut::<T>().ok_or_else(|| {
            DbError::statement("The statement was prepared by a different driver").with_query(sql)
        })
    }

    /// # Errors
    /// Returns `DbErrorKind::Statement` when the statement was prepared by a
    /// different kind of driver.
    pub fn handle<T: StatementHandle>(&self) -> Result<&T, DbError> {
        self.handle.as_any().downcast_ref::<T>().ok_or_else(|| {
            DbError::statement("The statement was prepared by a different driver")
                .with_query(self.sql.clone())
        })
    }
}
