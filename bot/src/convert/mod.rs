//! Unit conversion rules.
//!
//! Each guild keeps its own table of conversions, keyed by unit and an
//! optional subunit (for example `pmol/l` qualified by `e2`). A rule either
//! multiplies by a fixed factor or evaluates a formula over `x`.

mod expr;

pub use expr::{EvalError, Formula};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::settings::Section;
use crate::tenant::Tenant;

/// Joins unit and subunit in stored keys. Not allowed inside unit names.
const KEY_SEPARATOR: char = '|';

/// Value `x` used to check that a new formula evaluates.
const CHECK_VALUE: f64 = 1.0;

/// How a rule turns the input into the output.
#[derive(Debug, Clone, PartialEq)]
pub enum Factor {
    Linear(f64),
    Formula(Formula),
}

impl Factor {
    /// Classify and check user input: a plain decimal, or a formula that
    /// evaluates cleanly at the check value.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let raw = raw.trim();
        if let Ok(value) = raw.parse::<f64>() {
            if value.is_finite() {
                return Ok(Self::Linear(value));
            }
        }

        let formula =
            Formula::parse(raw).map_err(|e| EngineError::InvalidFormula(format!("{raw}: {e}")))?;
        formula
            .eval(CHECK_VALUE)
            .map_err(|e| EngineError::InvalidFormula(format!("{raw}: {e}")))?;
        Ok(Self::Formula(formula))
    }

    pub fn apply(&self, value: f64) -> Result<f64, EngineError> {
        match self {
            Self::Linear(factor) => {
                let result = value * factor;
                if result.is_finite() {
                    Ok(result)
                } else {
                    Err(EngineError::InvalidArgument(format!(
                        "Cannot convert {value}: {}",
                        EvalError::NotFinite
                    )))
                }
            }
            Self::Formula(formula) => formula
                .eval(value)
                .map_err(|e| EngineError::InvalidArgument(format!("Cannot convert {value}: {e}"))),
        }
    }
}

/// Stored form of a rule (the JSON value of a `convert` section entry).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRule {
    unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subunit: Option<String>,
    target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_subunit: Option<String>,
    factor: String,
}

/// A conversion rule as listed back to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRule {
    pub unit: String,
    pub subunit: Option<String>,
    pub target: String,
    pub target_subunit: Option<String>,
    /// The factor or formula exactly as it was defined.
    pub factor: String,
}

/// Result of a successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    pub target: String,
    pub target_subunit: Option<String>,
    pub value: f64,
}

/// Stored key for a unit and optional subunit.
pub fn make_key(unit: &str, subunit: Option<&str>) -> String {
    match subunit {
        Some(sub) => format!("{unit}{KEY_SEPARATOR}{sub}"),
        None => unit.to_string(),
    }
}

fn check_name(kind: &str, name: &str) -> Result<(), EngineError> {
    if name.is_empty() || name.contains(KEY_SEPARATOR) || name.chars().any(char::is_whitespace) {
        return Err(EngineError::InvalidArgument(format!(
            "Invalid {kind} '{name}': must be non-empty without spaces or '{KEY_SEPARATOR}'"
        )));
    }
    Ok(())
}

fn describe(unit: &str, subunit: Option<&str>) -> String {
    match subunit {
        Some(sub) => format!("Conversion for '{unit}' ({sub})"),
        None => format!("Conversion for '{unit}'"),
    }
}

/// Create or replace a rule.
#[tracing::instrument(skip(tenant), fields(tenant = %tenant.id()))]
pub async fn define(
    tenant: &Tenant,
    unit: &str,
    subunit: Option<&str>,
    target: &str,
    target_subunit: Option<&str>,
    factor: &str,
) -> Result<ConversionRule, EngineError> {
    check_name("unit", unit)?;
    check_name("unit", target)?;
    for sub in [subunit, target_subunit].into_iter().flatten() {
        check_name("subunit", sub)?;
    }
    Factor::parse(factor)?;

    let stored = StoredRule {
        unit: unit.to_string(),
        subunit: subunit.map(str::to_string),
        target: target.to_string(),
        target_subunit: target_subunit.map(str::to_string),
        factor: factor.trim().to_string(),
    };
    let encoded = serde_json::to_string(&stored).map_err(crate::StorageError::from)?;
    tenant
        .put(Section::Convert, &make_key(unit, subunit), Some(&encoded))
        .await?;

    Ok(stored.into())
}

/// Look up the rule for a unit.
pub async fn lookup(
    tenant: &Tenant,
    unit: &str,
    subunit: Option<&str>,
) -> Result<ConversionRule, EngineError> {
    let raw = tenant
        .entry(Section::Convert, &make_key(unit, subunit))
        .await
        .ok_or_else(|| EngineError::not_found(describe(unit, subunit)))?;
    let stored: StoredRule = serde_json::from_str(&raw).map_err(crate::StorageError::from)?;
    Ok(stored.into())
}

/// Convert `value` using the guild's rule for the unit.
pub async fn convert(
    tenant: &Tenant,
    value: f64,
    unit: &str,
    subunit: Option<&str>,
) -> Result<Converted, EngineError> {
    let rule = lookup(tenant, unit, subunit).await?;
    let result = Factor::parse(&rule.factor)?.apply(value)?;
    Ok(Converted {
        target: rule.target,
        target_subunit: rule.target_subunit,
        value: result,
    })
}

/// Delete a rule. Missing rules are reported as `NotFound` and nothing changes.
pub async fn remove(tenant: &Tenant, unit: &str, subunit: Option<&str>) -> Result<(), EngineError> {
    let key = make_key(unit, subunit);
    if tenant.entry(Section::Convert, &key).await.is_none() {
        return Err(EngineError::not_found(describe(unit, subunit)));
    }
    Ok(tenant.put(Section::Convert, &key, None).await?)
}

/// All rules, ordered by key.
pub async fn list(tenant: &Tenant) -> Vec<ConversionRule> {
    tenant
        .entries(Section::Convert)
        .await
        .iter()
        .filter_map(|(key, raw)| match serde_json::from_str::<StoredRule>(raw) {
            Ok(stored) => Some(stored.into()),
            Err(e) => {
                tracing::warn!(tenant = %tenant.id(), key = %key, error = %e, "Skipping unreadable conversion rule");
                None
            }
        })
        .collect()
}

impl From<StoredRule> for ConversionRule {
    fn from(stored: StoredRule) -> Self {
        Self {
            unit: stored.unit,
            subunit: stored.subunit,
            target: stored.target,
            target_subunit: stored.target_subunit,
            factor: stored.factor,
        }
    }
}
