//! Table-level constraint definitions.

use std::fmt;
use std::str::FromStr;

use rowkeeper_proto::quote_identifier;
use serde::Deserialize;

use super::error::ConfigError;

/// `MATCH` mode of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// `MATCH FULL`.
    Full,
    /// `MATCH PARTIAL`.
    Partial,
    /// `MATCH SIMPLE`.
    Simple,
}

impl FromStr for MatchType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let keyword = normalized.strip_prefix("MATCH ").unwrap_or(&normalized).trim();
        match keyword {
            "FULL" => Ok(MatchType::Full),
            "PARTIAL" => Ok(MatchType::Partial),
            "SIMPLE" => Ok(MatchType::Simple),
            _ => Err(ConfigError::InvalidKeyword {
                part: "ref_match",
                value: s.to_string(),
                allowed: "MATCH FULL, MATCH PARTIAL, MATCH SIMPLE",
            }),
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Full => write!(f, "MATCH FULL"),
            MatchType::Partial => write!(f, "MATCH PARTIAL"),
            MatchType::Simple => write!(f, "MATCH SIMPLE"),
        }
    }
}

/// Referential action for `ON DELETE` / `ON UPDATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    /// `NO ACTION`.
    NoAction,
    /// `RESTRICT`.
    Restrict,
    /// `CASCADE`.
    Cascade,
    /// `SET NULL`.
    SetNull,
    /// `SET DEFAULT`.
    SetDefault,
}

impl ReferentialAction {
    fn parse(part: &'static str, s: &str) -> Result<Self, ConfigError> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "NO ACTION" => Ok(ReferentialAction::NoAction),
            "RESTRICT" => Ok(ReferentialAction::Restrict),
            "CASCADE" => Ok(ReferentialAction::Cascade),
            "SET NULL" => Ok(ReferentialAction::SetNull),
            "SET DEFAULT" => Ok(ReferentialAction::SetDefault),
            _ => Err(ConfigError::InvalidKeyword {
                part,
                value: s.to_string(),
                allowed: "NO ACTION, RESTRICT, CASCADE, SET NULL, SET DEFAULT",
            }),
        }
    }
}

impl FromStr for ReferentialAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse("referential action", s)
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferentialAction::NoAction => write!(f, "NO ACTION"),
            ReferentialAction::Restrict => write!(f, "RESTRICT"),
            ReferentialAction::Cascade => write!(f, "CASCADE"),
            ReferentialAction::SetNull => write!(f, "SET NULL"),
            ReferentialAction::SetDefault => write!(f, "SET DEFAULT"),
        }
    }
}

/// Raw constraint arguments, validated by [`ConstraintDef::new`].
///
/// Exactly one of `check`, `unique`, `primary_key`, `exclude`, and
/// `foreign_key` must be set. SQL fragments (`check`, `predicate`,
/// `exclude` elements, `index_method`, `index_parameters`) are emitted
/// verbatim; column and table names are quoted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConstraintArgs {
    /// Explicit constraint name.
    pub name: Option<String>,
    /// `DEFERRABLE` (true) or `NOT DEFERRABLE` (false).
    pub deferrable: Option<bool>,
    /// `INITIALLY DEFERRED` (true) or `INITIALLY IMMEDIATE` (false).
    pub initially_deferred: Option<bool>,
    /// Check expression.
    pub check: Option<String>,
    /// Append `NO INHERIT` to a check constraint.
    pub check_no_inherit: bool,
    /// Unique columns.
    pub unique: Option<Vec<String>>,
    /// Primary-key columns.
    pub primary_key: Option<Vec<String>>,
    /// Exclusion elements (`element WITH operator`).
    pub exclude: Option<Vec<String>>,
    /// Index method for exclusion constraints.
    pub index_method: Option<String>,
    /// `WHERE` predicate for exclusion constraints.
    pub predicate: Option<String>,
    /// Index parameters for unique, primary-key, and exclusion constraints.
    pub index_parameters: Option<String>,
    /// Foreign-key columns.
    pub foreign_key: Option<Vec<String>>,
    /// Referenced table.
    pub ref_table: Option<String>,
    /// Referenced columns.
    pub ref_columns: Option<Vec<String>>,
    /// `MATCH` mode keyword.
    pub ref_match: Option<String>,
    /// `ON DELETE` action keyword.
    pub ref_on_delete: Option<String>,
    /// `ON UPDATE` action keyword.
    pub ref_on_update: Option<String>,
}

/// The kind-specific body of a constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    /// `CHECK ( expression ) [NO INHERIT]`.
    Check {
        /// Boolean expression.
        expression: String,
        /// Whether `NO INHERIT` is appended.
        no_inherit: bool,
    },
    /// `UNIQUE ( columns ) [index parameters]`.
    Unique {
        /// Columns that must be unique together.
        columns: Vec<String>,
        /// Index parameters.
        index_parameters: Option<String>,
    },
    /// `PRIMARY KEY ( columns ) [index parameters]`.
    PrimaryKey {
        /// Key columns.
        columns: Vec<String>,
        /// Index parameters.
        index_parameters: Option<String>,
    },
    /// `EXCLUDE [USING method] ( elements ) [index parameters] [WHERE ( predicate )]`.
    Exclude {
        /// Exclusion elements.
        elements: Vec<String>,
        /// Index method.
        index_method: Option<String>,
        /// Index parameters.
        index_parameters: Option<String>,
        /// Partial-constraint predicate.
        predicate: Option<String>,
    },
    /// `FOREIGN KEY ( columns ) REFERENCES table [( ref_columns )] ...`.
    ForeignKey {
        /// Referencing columns.
        columns: Vec<String>,
        /// Referenced table.
        ref_table: String,
        /// Referenced columns.
        ref_columns: Option<Vec<String>>,
        /// `MATCH` mode.
        ref_match: Option<MatchType>,
        /// `ON DELETE` action.
        on_delete: Option<ReferentialAction>,
        /// `ON UPDATE` action.
        on_update: Option<ReferentialAction>,
    },
}

impl ConstraintKind {
    /// Short name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::Check { .. } => "check",
            ConstraintKind::Unique { .. } => "unique",
            ConstraintKind::PrimaryKey { .. } => "primary key",
            ConstraintKind::Exclude { .. } => "exclude",
            ConstraintKind::ForeignKey { .. } => "foreign key",
        }
    }
}

/// A validated table constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintDef {
    name: Option<String>,
    deferrable: Option<bool>,
    initially_deferred: Option<bool>,
    kind: ConstraintKind,
}

impl ConstraintDef {
    /// Validate arguments and build a constraint.
    pub fn new(args: ConstraintArgs) -> Result<Self, ConfigError> {
        let ConstraintArgs {
            name,
            deferrable,
            initially_deferred,
            check,
            check_no_inherit,
            unique,
            primary_key,
            exclude,
            index_method,
            predicate,
            index_parameters,
            foreign_key,
            ref_table,
            ref_columns,
            ref_match,
            ref_on_delete,
            ref_on_update,
        } = args;

        let found = [
            check.is_some(),
            unique.is_some(),
            primary_key.is_some(),
            exclude.is_some(),
            foreign_key.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count();
        if found != 1 {
            return Err(ConfigError::ConstraintKindCount { found });
        }

        let name = name.map(|n| non_blank("name", n)).transpose()?;
        let index_method = index_method.map(|m| non_blank("index_method", m)).transpose()?;
        let predicate = predicate.map(|p| non_blank("predicate", p)).transpose()?;
        let index_parameters = index_parameters
            .map(|p| non_blank("index_parameters", p))
            .transpose()?;

        let kind = if let Some(expression) = check {
            if deferrable.is_some() || initially_deferred.is_some() {
                return Err(ConfigError::DeferrableCheck);
            }
            ConstraintKind::Check {
                expression: non_blank("check", expression)?,
                no_inherit: check_no_inherit,
            }
        } else if let Some(columns) = unique {
            ConstraintKind::Unique {
                columns: non_empty_list("unique", columns)?,
                index_parameters: index_parameters.clone(),
            }
        } else if let Some(columns) = primary_key {
            ConstraintKind::PrimaryKey {
                columns: non_empty_list("primary_key", columns)?,
                index_parameters: index_parameters.clone(),
            }
        } else if let Some(elements) = exclude {
            ConstraintKind::Exclude {
                elements: non_empty_list("exclude", elements)?,
                index_method: index_method.clone(),
                index_parameters: index_parameters.clone(),
                predicate: predicate.clone(),
            }
        } else if let Some(columns) = foreign_key {
            let columns = non_empty_list("foreign_key", columns)?;
            let ref_table = ref_table.clone().ok_or(ConfigError::MissingRefTable)?;
            ConstraintKind::ForeignKey {
                columns,
                ref_table: non_blank("ref_table", ref_table)?,
                ref_columns: ref_columns
                    .clone()
                    .map(|c| non_empty_list("ref_columns", c))
                    .transpose()?,
                ref_match: ref_match.as_deref().map(MatchType::from_str).transpose()?,
                on_delete: ref_on_delete
                    .as_deref()
                    .map(|a| ReferentialAction::parse("ref_on_delete", a))
                    .transpose()?,
                on_update: ref_on_update
                    .as_deref()
                    .map(|a| ReferentialAction::parse("ref_on_update", a))
                    .transpose()?,
            }
        } else {
            return Err(ConfigError::ConstraintKindCount { found: 0 });
        };

        let kind_name = kind.name();
        let misplaced = |option: &'static str| ConfigError::MisplacedOption {
            option,
            kind: kind_name,
        };
        if check_no_inherit && !matches!(kind, ConstraintKind::Check { .. }) {
            return Err(misplaced("check_no_inherit"));
        }
        if !matches!(kind, ConstraintKind::Exclude { .. }) {
            if index_method.is_some() {
                return Err(misplaced("index_method"));
            }
            if predicate.is_some() {
                return Err(misplaced("predicate"));
            }
        }
        if index_parameters.is_some()
            && matches!(kind, ConstraintKind::Check { .. } | ConstraintKind::ForeignKey { .. })
        {
            return Err(misplaced("index_parameters"));
        }
        if !matches!(kind, ConstraintKind::ForeignKey { .. }) {
            let ref_options = [
                ("ref_table", ref_table.is_some()),
                ("ref_columns", ref_columns.is_some()),
                ("ref_match", ref_match.is_some()),
                ("ref_on_delete", ref_on_delete.is_some()),
                ("ref_on_update", ref_on_update.is_some()),
            ];
            if let Some((option, _)) = ref_options.into_iter().find(|(_, set)| *set) {
                return Err(misplaced(option));
            }
        }

        Ok(Self {
            name,
            deferrable,
            initially_deferred,
            kind,
        })
    }

    /// Parse and validate constraint arguments from JSON.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ConfigError> {
        if !value.is_object() {
            return Err(ConfigError::InvalidArguments(
                "args must be an object".to_string(),
            ));
        }
        let args = ConstraintArgs::deserialize(value)
            .map_err(|e| ConfigError::InvalidArguments(e.to_string()))?;
        Self::new(args)
    }

    /// Check constraint.
    pub fn check(expression: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(ConstraintArgs {
            check: Some(expression.into()),
            ..Default::default()
        })
    }

    /// Unique constraint over `columns`.
    pub fn unique(columns: impl IntoIterator<Item = impl Into<String>>) -> Result<Self, ConfigError> {
        Self::new(ConstraintArgs {
            unique: Some(columns.into_iter().map(Into::into).collect()),
            ..Default::default()
        })
    }

    /// Primary-key constraint over `columns`.
    pub fn primary_key(
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ConfigError> {
        Self::new(ConstraintArgs {
            primary_key: Some(columns.into_iter().map(Into::into).collect()),
            ..Default::default()
        })
    }

    /// Foreign key from `columns` to `ref_table`'s primary key.
    pub fn foreign_key(
        columns: impl IntoIterator<Item = impl Into<String>>,
        ref_table: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self::new(ConstraintArgs {
            foreign_key: Some(columns.into_iter().map(Into::into).collect()),
            ref_table: Some(ref_table.into()),
            ..Default::default()
        })
    }

    /// Explicit constraint name, if set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The kind-specific body.
    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// Deferrability flag, if set.
    pub fn deferrable(&self) -> Option<bool> {
        self.deferrable
    }

    /// Initial check timing, if set.
    pub fn initially_deferred(&self) -> Option<bool> {
        self.initially_deferred
    }

    /// Constraint clause for `CREATE TABLE`.
    ///
    /// `fallback_name` is used when no explicit name was given.
    pub fn to_sql(&self, fallback_name: Option<&str>) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(name) = self.name.as_deref().or(fallback_name) {
            parts.push(format!("CONSTRAINT {}", quote_identifier(name)));
        }

        match &self.kind {
            ConstraintKind::Check {
                expression,
                no_inherit,
            } => {
                parts.push(format!("CHECK ( {expression} )"));
                if *no_inherit {
                    parts.push("NO INHERIT".to_string());
                }
            }
            ConstraintKind::Unique {
                columns,
                index_parameters,
            } => {
                parts.push(format!("UNIQUE ( {} )", quote_list(columns)));
                parts.extend(index_parameters.clone());
            }
            ConstraintKind::PrimaryKey {
                columns,
                index_parameters,
            } => {
                parts.push(format!("PRIMARY KEY ( {} )", quote_list(columns)));
                parts.extend(index_parameters.clone());
            }
            ConstraintKind::Exclude {
                elements,
                index_method,
                index_parameters,
                predicate,
            } => {
                parts.push("EXCLUDE".to_string());
                if let Some(method) = index_method {
                    parts.push(format!("USING {method}"));
                }
                parts.push(format!("( {} )", elements.join(", ")));
                parts.extend(index_parameters.clone());
                if let Some(predicate) = predicate {
                    parts.push(format!("WHERE ( {predicate} )"));
                }
            }
            ConstraintKind::ForeignKey {
                columns,
                ref_table,
                ref_columns,
                ref_match,
                on_delete,
                on_update,
            } => {
                parts.push(format!(
                    "FOREIGN KEY ( {} ) REFERENCES {}",
                    quote_list(columns),
                    quote_identifier(ref_table)
                ));
                if let Some(ref_columns) = ref_columns {
                    parts.push(format!("( {} )", quote_list(ref_columns)));
                }
                if let Some(ref_match) = ref_match {
                    parts.push(ref_match.to_string());
                }
                if let Some(action) = on_delete {
                    parts.push(format!("ON DELETE {action}"));
                }
                if let Some(action) = on_update {
                    parts.push(format!("ON UPDATE {action}"));
                }
            }
        }

        match self.deferrable {
            Some(true) => parts.push("DEFERRABLE".to_string()),
            Some(false) => parts.push("NOT DEFERRABLE".to_string()),
            None => {}
        }
        match self.initially_deferred {
            Some(true) => parts.push("INITIALLY DEFERRED".to_string()),
            Some(false) => parts.push("INITIALLY IMMEDIATE".to_string()),
            None => {}
        }

        parts.join(" ")
    }
}

fn non_blank(what: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Empty { what });
    }
    Ok(value)
}

fn non_empty_list(part: &'static str, items: Vec<String>) -> Result<Vec<String>, ConfigError> {
    let items: Vec<String> = items
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .collect();
    if items.is_empty() {
        return Err(ConfigError::EmptyList { part });
    }
    Ok(items)
}

fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| quote_identifier(name))
        .collect::<Vec<_>>()
        .join(", ")
}
