use super::{usage, Invocation};
use crate::convert::{self, ConversionRule};
use crate::error::EngineError;

/// Split `UNIT[:SUB]` into unit and subunit.
fn split_unit(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once(':') {
        Some((unit, sub)) => (unit, Some(sub)),
        None => (raw, None),
    }
}

fn with_subunit(unit: &str, subunit: Option<&str>) -> String {
    match subunit {
        Some(sub) => format!("{unit} ({sub})"),
        None => unit.to_string(),
    }
}

fn describe(rule: &ConversionRule) -> String {
    format!(
        "{} -> {}: {}",
        with_subunit(&rule.unit, rule.subunit.as_deref()),
        with_subunit(&rule.target, rule.target_subunit.as_deref()),
        rule.factor
    )
}

pub(super) async fn convert(call: &Invocation<'_>) -> Result<String, EngineError> {
    let (raw_value, unit, subunit) = match call.args {
        [value, unit] => (*value, *unit, None),
        [value, unit, sub] => (*value, *unit, Some(*sub)),
        _ => return Err(usage(call.def)),
    };
    let value: f64 = raw_value
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| EngineError::InvalidArgument(format!("'{raw_value}' is not a number")))?;

    let converted = convert::convert(call.tenant, value, unit, subunit).await?;
    Ok(format!(
        "{raw_value} {} = {:.2} {}",
        with_subunit(unit, subunit),
        converted.value,
        with_subunit(&converted.target, converted.target_subunit.as_deref())
    ))
}

pub(super) async fn conversion(call: &Invocation<'_>) -> Result<String, EngineError> {
    let tenant = call.tenant;

    match call.args {
        [] | ["list"] => {
            let rules = convert::list(tenant).await;
            if rules.is_empty() {
                return Ok("No conversions defined".to_string());
            }
            let lines: Vec<String> = rules.iter().map(|rule| format!("* {}", describe(rule))).collect();
            Ok(format!("Conversions:\n{}", lines.join("\n")))
        }
        ["add", from, to, factor @ ..] if !factor.is_empty() => {
            let (unit, subunit) = split_unit(from);
            let (target, target_subunit) = split_unit(to);
            let rule = convert::define(
                tenant,
                unit,
                subunit,
                target,
                target_subunit,
                &factor.join(" "),
            )
            .await?;
            Ok(format!("Added conversion {}", describe(&rule)))
        }
        ["remove", from] => {
            let (unit, subunit) = split_unit(from);
            convert::remove(tenant, unit, subunit).await?;
            Ok(format!("Removed conversion for {}", with_subunit(unit, subunit)))
        }
        _ => Err(usage(call.def)),
    }
}
