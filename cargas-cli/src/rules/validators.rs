//! Per-category rule validators
//!
//! Each validator consumes the cell value plus its stage configuration and
//! returns a possibly-coerced value along with zero or more localized error
//! messages. Cross-field rules additionally read the row snapshot, which the
//! driver freezes before any rule runs.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::ingest::Value;

use super::parsers::{parse_date_generic, parse_value};
use super::types::{
    CompositeListConfig, DataType, DateConfig, DependencyConfig, EmailConfig, JointConfig,
    LengthConfig, ListConfig, NumberConfig, PhoneConfig, RuleCheck, RuleStage, fold_label,
};

/// Everything a validator may read besides the cell value itself
pub struct CellContext<'a> {
    /// Column under validation
    pub column: &'a str,
    /// Frozen row snapshot: every column's normalized value
    pub row: &'a HashMap<String, Value>,
    /// Fallback parser for the column's declared data type
    pub fallback: Option<DataType>,
}

/// Apply one stage: required-field gate, then the category check
pub fn apply_stage(stage: &RuleStage, value: Value, ctx: &CellContext<'_>) -> (Value, Vec<String>) {
    let message = stage.message.as_deref();
    if value.is_null() {
        if stage.required {
            let error = compose(message, format!("{}: es obligatorio", ctx.column));
            return (Value::Null, vec![error]);
        }
        // Joint rules must see null members too, so a half-populated field
        // set errors on every field carrying the rule
        if !matches!(stage.check, RuleCheck::Joint(_)) {
            return (Value::Null, Vec::new());
        }
    }
    apply_check(&stage.check, value, message, ctx)
}

/// Dispatch a category check against a non-null value
pub fn apply_check(
    check: &RuleCheck,
    value: Value,
    message: Option<&str>,
    ctx: &CellContext<'_>,
) -> (Value, Vec<String>) {
    match check {
        RuleCheck::Text(config) | RuleCheck::Document(config) => {
            validate_length(value, config, message, ctx.column)
        }
        RuleCheck::Number(config) => validate_number(value, config, message, ctx.column),
        RuleCheck::List(config) => validate_list(value, config, message, ctx.column),
        RuleCheck::CompositeList(config) => validate_composite(value, config, message, ctx),
        RuleCheck::Phone(config) => validate_phone(value, config, message, ctx.column),
        RuleCheck::Email(config) => validate_email(value, config, message, ctx.column),
        RuleCheck::Date(config) => validate_date(value, config, message, ctx.column),
        RuleCheck::Dependency(config) => validate_dependency(value, config, message, ctx),
        RuleCheck::Joint(config) => validate_joint(value, config, message, ctx),
        // Duplicate detection runs over the whole grid after the cell pass;
        // per cell only the fallback parser applies
        RuleCheck::Duplicates(_) => apply_fallback(value, message, ctx),
    }
}

/// Run the column's fallback type parser; parse failures keep the original
/// value so the report shows the offending input
pub fn apply_fallback(value: Value, message: Option<&str>, ctx: &CellContext<'_>) -> (Value, Vec<String>) {
    let Some(data_type) = ctx.fallback else {
        return (value, Vec::new());
    };
    match parse_value(data_type, &value) {
        Ok(parsed) => (parsed, Vec::new()),
        Err(error) => {
            let error = compose(message, format!("{}: {}", ctx.column, error));
            (value, vec![error])
        }
    }
}

fn compose(message: Option<&str>, fallback: String) -> String {
    match message {
        Some(message) => format!("{} ({})", message, fallback),
        None => fallback,
    }
}

fn validate_length(
    value: Value,
    config: &LengthConfig,
    message: Option<&str>,
    column: &str,
) -> (Value, Vec<String>) {
    let text = value.to_text();
    let length = text.chars().count();
    let mut errors = Vec::new();
    if let Some(min) = config.min {
        if length < min {
            errors.push(compose(
                message,
                format!("{}: longitud mínima {} caracteres", column, min),
            ));
        }
    }
    if let Some(max) = config.max {
        if length > max {
            errors.push(compose(
                message,
                format!("{}: longitud máxima {} caracteres", column, max),
            ));
        }
    }
    (Value::Text(text), errors)
}

fn decimal_of(value: &Value) -> Option<Decimal> {
    match value {
        Value::Int(i) => Some(Decimal::from(*i)),
        Value::Float(f) => Decimal::try_from(*f).ok(),
        Value::Text(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn validate_number(
    value: Value,
    config: &NumberConfig,
    message: Option<&str>,
    column: &str,
) -> (Value, Vec<String>) {
    let Some(numeric) = decimal_of(&value) else {
        let error = compose(message, format!("{}: debe ser numérico", column));
        return (value, vec![error]);
    };

    let mut errors = Vec::new();

    if let Some(decimals) = config.decimals {
        // Trailing zeros do not count: "10.0" has zero significant decimals
        if numeric.normalize().scale() > decimals {
            errors.push(compose(
                message,
                format!("{}: máximo {} decimales", column, decimals),
            ));
        }
    }
    if let Some(min) = config.min {
        if numeric < min {
            errors.push(compose(message, format!("{}: valor mínimo {}", column, min)));
        }
    }
    if let Some(max) = config.max {
        if numeric > max {
            errors.push(compose(message, format!("{}: valor máximo {}", column, max)));
        }
    }

    if !errors.is_empty() {
        return (value, errors);
    }

    if config.decimals == Some(0) {
        match numeric.normalize().to_i64() {
            Some(integer) => (Value::Int(integer), Vec::new()),
            None => {
                let error = compose(message, format!("{}: debe ser numérico", column));
                (value, vec![error])
            }
        }
    } else {
        (Value::Float(numeric.to_f64().unwrap_or_default()), Vec::new())
    }
}

fn validate_list(
    value: Value,
    config: &ListConfig,
    message: Option<&str>,
    column: &str,
) -> (Value, Vec<String>) {
    let text = value.to_text();
    if config.allowed.is_empty() {
        return (Value::Text(text), Vec::new());
    }
    if config.allowed.iter().any(|choice| choice == &text) {
        return (Value::Text(text), Vec::new());
    }
    let mut choices = config.allowed.clone();
    choices.sort();
    let error = compose(
        message,
        format!("{}: valor no permitido ({})", column, choices.join(", ")),
    );
    (Value::Text(text), vec![error])
}

fn validate_composite(
    value: Value,
    config: &CompositeListConfig,
    message: Option<&str>,
    ctx: &CellContext<'_>,
) -> (Value, Vec<String>) {
    let text = value.to_text();
    if config.combinations.is_empty() {
        return (Value::Text(text), Vec::new());
    }

    let current = |field: &str| -> Option<String> {
        let cell = if field == ctx.column {
            value.clone()
        } else {
            ctx.row.get(field).cloned().unwrap_or(Value::Null)
        };
        let normalized = cell.normalized();
        if normalized.is_null() {
            None
        } else {
            Some(normalized.to_text())
        }
    };

    let mut missing_for_viable: Vec<String> = Vec::new();
    for combination in &config.combinations {
        let missing: Vec<&String> = combination
            .iter()
            .filter(|(field, _)| current(field).is_none())
            .map(|(field, _)| field)
            .collect();
        if missing.is_empty() {
            if combination
                .iter()
                .all(|(field, expected)| current(field).as_deref() == Some(expected.as_str()))
            {
                return (Value::Text(text), Vec::new());
            }
        } else if combination
            .iter()
            .filter(|(field, _)| !missing.contains(&field))
            .all(|(field, expected)| current(field).as_deref() == Some(expected.as_str()))
        {
            for field in missing {
                if !missing_for_viable.contains(field) {
                    missing_for_viable.push(field.clone());
                }
            }
        }
    }

    if !missing_for_viable.is_empty() {
        missing_for_viable.sort();
        let error = compose(
            message,
            format!(
                "{}: completa los campos relacionados ({})",
                ctx.column,
                missing_for_viable.join(", ")
            ),
        );
        return (Value::Text(text), vec![error]);
    }

    let summary: Vec<String> = config
        .combinations
        .iter()
        .map(|combination| {
            combination
                .iter()
                .map(|(field, expected)| format!("{}={}", field, expected))
                .collect::<Vec<_>>()
                .join(" / ")
        })
        .collect();
    let error = compose(
        message,
        format!("{}: combinación no permitida ({})", ctx.column, summary.join("; ")),
    );
    (Value::Text(text), vec![error])
}

fn validate_phone(
    value: Value,
    config: &PhoneConfig,
    message: Option<&str>,
    column: &str,
) -> (Value, Vec<String>) {
    let text = value.to_text();
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        let error = compose(message, format!("{}: debe contener solo números", column));
        return (Value::Text(text), vec![error]);
    }

    let code_digits: String = config
        .country_code
        .as_deref()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();

    let local_digits = if code_digits.is_empty() {
        digits.as_str()
    } else {
        match digits.strip_prefix(code_digits.as_str()) {
            Some(rest) => rest,
            None => {
                let error = compose(
                    message,
                    format!(
                        "{}: debe iniciar con el código de país {}",
                        column,
                        config.country_code.as_deref().unwrap_or("")
                    ),
                );
                return (Value::Text(text), vec![error]);
            }
        }
    };

    if let Some(min) = config.min_local_digits {
        if local_digits.len() < min {
            let error = compose(
                message,
                format!("{}: longitud mínima de {} dígitos", column, min),
            );
            return (Value::Text(text), vec![error]);
        }
    }

    let formatted = if code_digits.is_empty() {
        local_digits.to_string()
    } else {
        format!("+{}{}", code_digits, local_digits)
    };
    (Value::Text(formatted), Vec::new())
}

fn validate_email(
    value: Value,
    config: &EmailConfig,
    message: Option<&str>,
    column: &str,
) -> (Value, Vec<String>) {
    let text = value.to_text();
    if let Some(pattern) = &config.pattern {
        if !pattern.is_match(&text) {
            let error = compose(message, format!("{}: formato de correo inválido", column));
            return (Value::Text(text), vec![error]);
        }
    }
    if let Some(max) = config.max_length {
        if text.chars().count() > max {
            let error = compose(
                message,
                format!("{}: longitud máxima {} caracteres", column, max),
            );
            return (Value::Text(text), vec![error]);
        }
    }
    (Value::Text(text.to_lowercase()), Vec::new())
}

fn validate_date(
    value: Value,
    config: &DateConfig,
    message: Option<&str>,
    column: &str,
) -> (Value, Vec<String>) {
    match &value {
        Value::Date(d) => return (Value::Date(*d), Vec::new()),
        Value::DateTime(dt) => return (Value::Date(dt.date()), Vec::new()),
        _ => {}
    }
    let text = value.to_text();

    if let Some(alias) = config.format {
        match chrono::NaiveDate::parse_from_str(text.trim(), alias.pattern()) {
            Ok(date) => return (Value::Date(date), Vec::new()),
            Err(_) => {
                let error = compose(message, format!("{}: formato de fecha inválido", column));
                return (value, vec![error]);
            }
        }
    }

    match parse_date_generic(&text) {
        Some(date) => (Value::Date(date), Vec::new()),
        None => {
            let error = compose(message, format!("{}: fecha inválida", column));
            (value, vec![error])
        }
    }
}

fn validate_dependency(
    value: Value,
    config: &DependencyConfig,
    message: Option<&str>,
    ctx: &CellContext<'_>,
) -> (Value, Vec<String>) {
    let Some(field) = config.field.as_deref() else {
        return apply_fallback(value, message, ctx);
    };
    if config.branches.is_empty() {
        return apply_fallback(value, message, ctx);
    }

    // Exact header match first, then accent-folded lookup
    let dependent = ctx.row.get(field).cloned().or_else(|| {
        let folded = fold_label(field);
        ctx.row
            .iter()
            .find(|(header, _)| fold_label(header) == folded)
            .map(|(_, cell)| cell.clone())
    });
    let Some(dependent) = dependent else {
        return apply_fallback(value, message, ctx);
    };

    let mut matched = false;
    let mut errors = Vec::new();
    let mut resulting = value.clone();

    for branch in &config.branches {
        if !values_equal(&dependent, &branch.trigger) {
            continue;
        }
        matched = true;
        let mut candidate = value.clone();
        let mut branch_errors = Vec::new();
        for check in &branch.checks {
            let (next, check_errors) = apply_check(check, candidate, message, ctx);
            candidate = next;
            branch_errors.extend(check_errors);
        }
        if branch_errors.is_empty() {
            resulting = candidate;
        } else {
            errors.extend(branch_errors);
        }
    }

    if !errors.is_empty() {
        // Report against the raw input, not a partially-transformed value
        return (value, errors);
    }
    if matched {
        return (resulting, Vec::new());
    }
    apply_fallback(value, message, ctx)
}

/// Trigger comparison: boolean, then numeric, then accent-folded text
fn values_equal(actual: &Value, expected: &Value) -> bool {
    let actual = actual.clone().normalized();
    let expected = expected.clone().normalized();

    match (&actual, &expected) {
        (Value::Null, Value::Null) => return true,
        (Value::Null, _) | (_, Value::Null) => return false,
        (Value::Bool(a), Value::Bool(b)) => return a == b,
        _ => {}
    }

    if let (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) = (&actual, &expected) {
        if let (Some(a), Some(b)) = (decimal_of(&actual), decimal_of(&expected)) {
            return a == b;
        }
    }

    fold_label(&actual.to_text()) == fold_label(&expected.to_text())
}

fn validate_joint(
    value: Value,
    config: &JointConfig,
    message: Option<&str>,
    ctx: &CellContext<'_>,
) -> (Value, Vec<String>) {
    let mut fields: Vec<String> = config.fields.clone();
    if !fields.iter().any(|f| f == ctx.column) {
        fields.push(ctx.column.to_string());
    }

    let populated = fields
        .iter()
        .filter(|field| {
            let cell = if field.as_str() == ctx.column {
                value.clone()
            } else {
                ctx.row.get(field.as_str()).cloned().unwrap_or(Value::Null)
            };
            !cell.normalized().is_null()
        })
        .count();

    if populated > 0 && populated < fields.len() {
        let error = compose(
            message,
            format!(
                "{}: completa todos los campos relacionados ({})",
                ctx.column,
                fields.join(", ")
            ),
        );
        return (value, vec![error]);
    }

    apply_fallback(value, message, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::types::{DependencyBranch, RuleExpr};
    use crate::rules::parse_rule;
    use serde_json::json;

    fn ctx<'a>(
        column: &'a str,
        row: &'a HashMap<String, Value>,
        fallback: Option<DataType>,
    ) -> CellContext<'a> {
        CellContext {
            column,
            row,
            fallback,
        }
    }

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    fn stage_of(payload: serde_json::Value) -> RuleStage {
        match parse_rule(&payload).unwrap() {
            RuleExpr::Stage(stage) => stage,
            RuleExpr::Chain(_) => panic!("expected single stage"),
        }
    }

    #[test]
    fn test_required_short_circuits() {
        let stage = stage_of(json!({
            "Tipo de dato": "Texto",
            "Campo obligatorio": true,
            "Regla": {"Longitud minima": 3}
        }));
        let row = HashMap::new();
        let (value, errors) = apply_stage(&stage, Value::Null, &ctx("Nombre", &row, None));
        assert_eq!(value, Value::Null);
        assert_eq!(errors, vec!["Nombre: es obligatorio".to_string()]);
    }

    #[test]
    fn test_optional_null_passes() {
        let stage = stage_of(json!({
            "Tipo de dato": "Texto",
            "Regla": {"Longitud minima": 3}
        }));
        let row = HashMap::new();
        let (value, errors) = apply_stage(&stage, Value::Null, &ctx("Nombre", &row, None));
        assert_eq!(value, Value::Null);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_message_override_wraps_detail() {
        let stage = stage_of(json!({
            "Tipo de dato": "Texto",
            "Mensaje de error": "Nombre inválido",
            "Regla": {"Longitud maxima": 2}
        }));
        let row = HashMap::new();
        let (_, errors) = apply_stage(&stage, text("Carlos"), &ctx("Nombre", &row, None));
        assert_eq!(
            errors,
            vec!["Nombre inválido (Nombre: longitud máxima 2 caracteres)".to_string()]
        );
    }

    #[test]
    fn test_number_zero_decimals_coerces_to_int() {
        let stage = stage_of(json!({
            "Tipo de dato": "Número",
            "Regla": {"Número de decimales": 0}
        }));
        let row = HashMap::new();
        let (value, errors) = apply_stage(&stage, text("10.0"), &ctx("Edad", &row, None));
        assert!(errors.is_empty());
        assert_eq!(value, Value::Int(10));
    }

    #[test]
    fn test_number_excess_decimals_error_keeps_original() {
        let stage = stage_of(json!({
            "Tipo de dato": "Número",
            "Regla": {"Número de decimales": 0}
        }));
        let row = HashMap::new();
        let (value, errors) = apply_stage(&stage, text("10.5"), &ctx("Edad", &row, None));
        assert_eq!(value, text("10.5"));
        assert_eq!(errors, vec!["Edad: máximo 0 decimales".to_string()]);
    }

    #[test]
    fn test_number_bounds() {
        let stage = stage_of(json!({
            "Tipo de dato": "Número",
            "Regla": {"Valor mínimo": 0, "Valor máximo": 120}
        }));
        let row = HashMap::new();
        let (_, errors) = apply_stage(&stage, text("130"), &ctx("Edad", &row, None));
        assert_eq!(errors, vec!["Edad: valor máximo 120".to_string()]);
        let (_, errors) = apply_stage(&stage, text("-1"), &ctx("Edad", &row, None));
        assert_eq!(errors, vec!["Edad: valor mínimo 0".to_string()]);
    }

    #[test]
    fn test_number_non_numeric() {
        let stage = stage_of(json!({"Tipo de dato": "Número", "Regla": {}}));
        let row = HashMap::new();
        let (value, errors) = apply_stage(&stage, text("abc"), &ctx("Edad", &row, None));
        assert_eq!(value, text("abc"));
        assert_eq!(errors, vec!["Edad: debe ser numérico".to_string()]);
    }

    #[test]
    fn test_list_membership() {
        let stage = stage_of(json!({
            "Tipo de dato": "Lista",
            "Regla": {"Valores permitidos": ["DNI", "RUC"]}
        }));
        let row = HashMap::new();
        let (value, errors) = apply_stage(&stage, text("DNI"), &ctx("Tipo", &row, None));
        assert!(errors.is_empty());
        assert_eq!(value, text("DNI"));
        let (_, errors) = apply_stage(&stage, text("CE"), &ctx("Tipo", &row, None));
        assert_eq!(errors, vec!["Tipo: valor no permitido (DNI, RUC)".to_string()]);
    }

    #[test]
    fn test_empty_list_is_unconstrained() {
        let stage = stage_of(json!({"Tipo de dato": "Lista", "Regla": {}}));
        let row = HashMap::new();
        let (_, errors) = apply_stage(&stage, text("cualquiera"), &ctx("Tipo", &row, None));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_phone_reconstruction() {
        let stage = stage_of(json!({
            "Tipo de dato": "Teléfono",
            "Regla": {"Código de país": "+51", "Longitud minima": 9}
        }));
        let row = HashMap::new();
        let (value, errors) = apply_stage(&stage, text("51 987654321"), &ctx("Celular", &row, None));
        assert!(errors.is_empty());
        assert_eq!(value, text("+51987654321"));
    }

    #[test]
    fn test_phone_local_length_error() {
        let stage = stage_of(json!({
            "Tipo de dato": "Teléfono",
            "Regla": {"Código de país": "+51", "Longitud minima": 9}
        }));
        let row = HashMap::new();
        let (_, errors) = apply_stage(&stage, text("51987"), &ctx("Celular", &row, None));
        assert_eq!(
            errors,
            vec!["Celular: longitud mínima de 9 dígitos".to_string()]
        );
    }

    #[test]
    fn test_phone_missing_country_code() {
        let stage = stage_of(json!({
            "Tipo de dato": "Teléfono",
            "Regla": {"Código de país": "+51"}
        }));
        let row = HashMap::new();
        let (_, errors) = apply_stage(&stage, text("987654321"), &ctx("Celular", &row, None));
        assert_eq!(
            errors,
            vec!["Celular: debe iniciar con el código de país +51".to_string()]
        );
    }

    #[test]
    fn test_phone_without_country_code_keeps_local_digits() {
        let stage = stage_of(json!({
            "Tipo de dato": "Teléfono",
            "Regla": {"Longitud minima": 6}
        }));
        let row = HashMap::new();
        let (value, errors) = apply_stage(&stage, text("(01) 234-567"), &ctx("Celular", &row, None));
        assert!(errors.is_empty());
        assert_eq!(value, text("01234567"));
    }

    #[test]
    fn test_email_canonicalizes_to_lowercase() {
        let stage = stage_of(json!({
            "Tipo de dato": "Correo",
            "Regla": {"Formato": r"[^@\s]+@[^@\s]+\.[^@\s]+"}
        }));
        let row = HashMap::new();
        let (value, errors) = apply_stage(&stage, text("Ana@X.Com"), &ctx("Correo", &row, None));
        assert!(errors.is_empty());
        assert_eq!(value, text("ana@x.com"));
        let (_, errors) = apply_stage(&stage, text("bad-email"), &ctx("Correo", &row, None));
        assert_eq!(errors, vec!["Correo: formato de correo inválido".to_string()]);
    }

    #[test]
    fn test_date_alias_and_native() {
        let stage = stage_of(json!({
            "Tipo de dato": "Fecha",
            "Regla": {"Formato": "dd/mm/yyyy"}
        }));
        let row = HashMap::new();
        let expected = chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let (value, errors) = apply_stage(&stage, text("15/03/2024"), &ctx("Fecha", &row, None));
        assert!(errors.is_empty());
        assert_eq!(value, Value::Date(expected));

        let native = expected.and_hms_opt(8, 0, 0).unwrap();
        let (value, _) = apply_stage(&stage, Value::DateTime(native), &ctx("Fecha", &row, None));
        assert_eq!(value, Value::Date(expected));

        let (value, errors) = apply_stage(&stage, text("2024-03-15"), &ctx("Fecha", &row, None));
        assert_eq!(value, text("2024-03-15"));
        assert_eq!(errors, vec!["Fecha: formato de fecha inválido".to_string()]);
    }

    fn dependency_stage() -> RuleStage {
        stage_of(json!({
            "Tipo de dato": "Dependencia",
            "Regla": {
                "reglas especifica": [
                    {"Tipo Documento": "DNI", "documento": {"Longitud minima": 8, "Longitud maxima": 8}}
                ]
            }
        }))
    }

    #[test]
    fn test_dependency_trigger_match_applies_nested_checks() {
        let stage = dependency_stage();
        let mut row = HashMap::new();
        row.insert("Tipo Documento".to_string(), text("DNI"));
        let (_, errors) = apply_stage(
            &stage,
            text("1234"),
            &ctx("Documento", &row, Some(DataType::Text)),
        );
        assert_eq!(
            errors,
            vec!["Documento: longitud mínima 8 caracteres".to_string()]
        );

        let (value, errors) = apply_stage(
            &stage,
            text("12345678"),
            &ctx("Documento", &row, Some(DataType::Text)),
        );
        assert!(errors.is_empty());
        assert_eq!(value, text("12345678"));
    }

    #[test]
    fn test_dependency_no_trigger_match_falls_back() {
        let stage = dependency_stage();
        let mut row = HashMap::new();
        row.insert("Tipo Documento".to_string(), text("RUC"));
        // RUC has no branch: the 4-char value passes through the fallback
        let (value, errors) = apply_stage(
            &stage,
            text("1234"),
            &ctx("Documento", &row, Some(DataType::Text)),
        );
        assert!(errors.is_empty());
        assert_eq!(value, text("1234"));
    }

    #[test]
    fn test_dependency_trigger_is_accent_and_case_insensitive() {
        let config = DependencyConfig {
            field: Some("Categoría".to_string()),
            branches: vec![DependencyBranch {
                trigger: text("sí"),
                checks: vec![RuleCheck::Text(LengthConfig {
                    min: Some(10),
                    max: None,
                })],
            }],
        };
        let mut row = HashMap::new();
        row.insert("Categoría".to_string(), text("SI"));
        let (_, errors) = validate_dependency(
            text("corto"),
            &config,
            None,
            &ctx("Detalle", &row, None),
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_joint_all_or_nothing() {
        let stage = stage_of(json!({
            "Tipo de dato": "Validación conjunta",
            "Regla": {"Nombre de campos": ["Calle", "Ciudad"]}
        }));
        let mut row = HashMap::new();
        row.insert("Calle".to_string(), text("Av. Lima"));
        row.insert("Ciudad".to_string(), Value::Null);

        let (_, errors) = apply_stage(
            &stage,
            text("Av. Lima"),
            &ctx("Calle", &row, Some(DataType::Text)),
        );
        assert_eq!(
            errors,
            vec!["Calle: completa todos los campos relacionados (Calle, Ciudad)".to_string()]
        );

        row.insert("Ciudad".to_string(), text("Lima"));
        let (_, errors) = apply_stage(
            &stage,
            text("Av. Lima"),
            &ctx("Calle", &row, Some(DataType::Text)),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_joint_null_member_receives_error() {
        let stage = stage_of(json!({
            "Tipo de dato": "Validación conjunta",
            "Regla": {"Nombre de campos": ["Calle", "Ciudad"]}
        }));
        let mut row = HashMap::new();
        row.insert("Calle".to_string(), text("Av. Lima"));
        row.insert("Ciudad".to_string(), Value::Null);

        // The null field itself carries the rule and must still error
        let (value, errors) = apply_stage(
            &stage,
            Value::Null,
            &ctx("Ciudad", &row, Some(DataType::Text)),
        );
        assert_eq!(value, Value::Null);
        assert_eq!(
            errors,
            vec!["Ciudad: completa todos los campos relacionados (Calle, Ciudad)".to_string()]
        );
    }

    #[test]
    fn test_joint_all_empty_is_valid() {
        let stage = stage_of(json!({
            "Tipo de dato": "Validación conjunta",
            "Regla": {"Nombre de campos": ["Calle", "Ciudad"]}
        }));
        let mut row = HashMap::new();
        row.insert("Calle".to_string(), Value::Null);
        row.insert("Ciudad".to_string(), Value::Null);
        let (value, errors) = apply_stage(
            &stage,
            Value::Null,
            &ctx("Calle", &row, Some(DataType::Text)),
        );
        assert_eq!(value, Value::Null);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_composite_list_combinations() {
        let stage = stage_of(json!({
            "Tipo de dato": "Lista compleja",
            "Regla": {
                "Lista compleja": [
                    {"Departamento": "Lima", "Provincia": "Lima"},
                    {"Departamento": "Cusco", "Provincia": "Urubamba"}
                ]
            }
        }));
        let mut row = HashMap::new();
        row.insert("Departamento".to_string(), text("Lima"));
        row.insert("Provincia".to_string(), text("Lima"));
        let (_, errors) = apply_stage(&stage, text("Lima"), &ctx("Provincia", &row, None));
        assert!(errors.is_empty());

        row.insert("Provincia".to_string(), text("Urubamba"));
        let (_, errors) = apply_stage(&stage, text("Urubamba"), &ctx("Provincia", &row, None));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("combinación no permitida"));
    }
}
