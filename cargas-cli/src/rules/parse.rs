//! Parse opaque rule payloads into the typed rule tree
//!
//! A payload is a single rule object or an ordered list of them (a chain).
//! Everything questionable is rejected here, once per load, so per-cell
//! evaluation never trips over malformed configuration: unknown `Tipo de
//! dato` labels, non-object configs, invalid regexes and inconsistent
//! dependency branches are all resolution-time errors.

use std::str::FromStr;

use anyhow::{Result, bail};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value as Json};

use crate::ingest::Value;

use super::types::{
    CompositeListConfig, DateConfig, DateFormatAlias, DependencyBranch, DependencyConfig,
    DuplicateConfig, EmailConfig, JointConfig, LengthConfig, ListConfig, NumberConfig,
    PhoneConfig, RuleCheck, RuleExpr, RuleStage, fold_label,
};

/// Keys inside dependency entries that carry documentation, not checks
const DEPENDENCY_METADATA_KEYS: [&str; 8] = [
    "ejemplo",
    "ejemplos",
    "example",
    "examples",
    "descripcion",
    "descripcion general",
    "descripcion corta",
    "notas",
];

/// Parse a rule payload (object or ordered list) into a [`RuleExpr`]
pub fn parse_rule(payload: &Json) -> Result<RuleExpr> {
    match payload {
        Json::Array(entries) => {
            if entries.is_empty() {
                bail!("la regla encadenada no contiene definiciones");
            }
            let mut stages = Vec::with_capacity(entries.len());
            for entry in entries {
                stages.push(parse_rule(entry)?);
            }
            Ok(RuleExpr::Chain(stages))
        }
        Json::Object(object) => Ok(RuleExpr::Stage(parse_stage(object)?)),
        _ => bail!("configuración de regla inválida"),
    }
}

fn parse_stage(object: &Map<String, Json>) -> Result<RuleStage> {
    let tipo = match get_folded(object, "tipo de dato").and_then(Json::as_str) {
        Some(label) if !label.trim().is_empty() => label.trim().to_string(),
        _ => bail!("la regla no indica un 'Tipo de dato' reconocido"),
    };

    let required = get_folded(object, "campo obligatorio")
        .map(json_truthy)
        .unwrap_or(false);

    let message = get_folded(object, "mensaje de error")
        .and_then(Json::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from);

    let empty = Map::new();
    let config = match get_folded(object, "regla") {
        Some(Json::Object(map)) => map,
        _ => &empty,
    };

    let check = match fold_label(&tipo).as_str() {
        "texto" => RuleCheck::Text(parse_length(config)),
        "documento" => RuleCheck::Document(parse_length(config)),
        "numero" => RuleCheck::Number(parse_number(config)?),
        "lista" => RuleCheck::List(parse_list(config)),
        "lista compleja" => RuleCheck::CompositeList(parse_composite_list(config)),
        "telefono" => RuleCheck::Phone(parse_phone(config)),
        "correo" => RuleCheck::Email(parse_email(config)?),
        "fecha" => RuleCheck::Date(parse_date(config)),
        "dependencia" => RuleCheck::Dependency(parse_dependency(config)?),
        "validacion conjunta" => RuleCheck::Joint(parse_joint(config)),
        "duplicados" => RuleCheck::Duplicates(parse_duplicates(object, config, message.as_deref())),
        other => bail!("Tipo de dato no soportado: '{}'", other),
    };

    Ok(RuleStage {
        required,
        message,
        check,
    })
}

/// Look up a key by folded label, preferring an exact match
fn get_folded<'a>(object: &'a Map<String, Json>, folded_key: &str) -> Option<&'a Json> {
    object
        .iter()
        .find(|(key, _)| fold_label(key) == folded_key)
        .map(|(_, value)| value)
}

fn json_truthy(value: &Json) -> bool {
    match value {
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Json::String(s) => {
            let folded = fold_label(s);
            matches!(folded.as_str(), "true" | "si" | "yes" | "1")
        }
        _ => false,
    }
}

/// Convert a scalar JSON value to a cell [`Value`]
fn json_scalar(value: &Json) -> Value {
    match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        Json::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

fn usize_at(config: &Map<String, Json>, folded_key: &str) -> Option<usize> {
    get_folded(config, folded_key)
        .and_then(Json::as_u64)
        .map(|n| n as usize)
}

fn parse_length(config: &Map<String, Json>) -> LengthConfig {
    LengthConfig {
        min: usize_at(config, "longitud minima"),
        max: usize_at(config, "longitud maxima"),
    }
}

fn parse_number(config: &Map<String, Json>) -> Result<NumberConfig> {
    let decimals = get_folded(config, "numero de decimales")
        .and_then(Json::as_u64)
        .map(|n| n as u32);

    let parse_bound = |folded_key: &str, label: &str| -> Result<Option<Decimal>> {
        match get_folded(config, folded_key) {
            None | Some(Json::Null) => Ok(None),
            Some(Json::Number(n)) => match Decimal::from_str(&n.to_string()) {
                Ok(decimal) => Ok(Some(decimal)),
                Err(_) => bail!("{} inválido en la regla numérica", label),
            },
            Some(Json::String(s)) => match Decimal::from_str(s.trim()) {
                Ok(decimal) => Ok(Some(decimal)),
                Err(_) => bail!("{} inválido en la regla numérica", label),
            },
            Some(_) => bail!("{} inválido en la regla numérica", label),
        }
    };

    Ok(NumberConfig {
        decimals,
        min: parse_bound("valor minimo", "límite mínimo")?,
        max: parse_bound("valor maximo", "límite máximo")?,
    })
}

fn parse_list(config: &Map<String, Json>) -> ListConfig {
    const CANDIDATE_KEYS: [&str; 6] = [
        "valores permitidos",
        "valores",
        "lista",
        "opciones",
        "options",
        "choices",
    ];
    for key in CANDIDATE_KEYS {
        if let Some(Json::Array(values)) = get_folded(config, key) {
            let allowed = values.iter().map(|v| json_scalar(v).to_text()).collect();
            return ListConfig { allowed };
        }
    }
    ListConfig::default()
}

fn parse_composite_list(config: &Map<String, Json>) -> CompositeListConfig {
    const CANDIDATE_KEYS: [&str; 4] = ["lista compleja", "lista", "listas", "combinaciones"];
    for key in CANDIDATE_KEYS {
        let Some(Json::Array(entries)) = get_folded(config, key) else {
            continue;
        };
        let mut combinations = Vec::new();
        for entry in entries {
            let Json::Object(map) = entry else { continue };
            let mut combination = Vec::new();
            for (field, expected) in map {
                let field = field.trim();
                if field.is_empty() || expected.is_array() || expected.is_object() {
                    continue;
                }
                let expected = json_scalar(expected).normalized();
                if expected.is_null() {
                    continue;
                }
                combination.push((field.to_string(), expected.to_text()));
            }
            if !combination.is_empty() {
                combinations.push(combination);
            }
        }
        if !combinations.is_empty() {
            return CompositeListConfig { combinations };
        }
    }
    CompositeListConfig::default()
}

fn parse_phone(config: &Map<String, Json>) -> PhoneConfig {
    let country_code = get_folded(config, "codigo de pais")
        .map(|v| json_scalar(v).to_text())
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty());
    PhoneConfig {
        country_code,
        min_local_digits: usize_at(config, "longitud minima"),
    }
}

fn parse_email(config: &Map<String, Json>) -> Result<EmailConfig> {
    let pattern = match get_folded(config, "formato").and_then(Json::as_str) {
        Some(raw) if !raw.trim().is_empty() => {
            match Regex::new(&format!("^(?:{})$", raw.trim())) {
                Ok(regex) => Some(regex),
                Err(_) => bail!("el formato de correo configurado no es una expresión válida"),
            }
        }
        _ => None,
    };
    Ok(EmailConfig {
        pattern,
        max_length: usize_at(config, "longitud maxima"),
    })
}

fn parse_date(config: &Map<String, Json>) -> DateConfig {
    let format = get_folded(config, "formato")
        .and_then(Json::as_str)
        .and_then(DateFormatAlias::from_label);
    DateConfig { format }
}

fn parse_joint(config: &Map<String, Json>) -> JointConfig {
    let fields = match get_folded(config, "nombre de campos") {
        Some(Json::Array(values)) => values
            .iter()
            .filter_map(Json::as_str)
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };
    JointConfig { fields }
}

fn parse_duplicates(
    object: &Map<String, Json>,
    config: &Map<String, Json>,
    message: Option<&str>,
) -> DuplicateConfig {
    const FIELD_KEYS: [&str; 3] = ["campos", "columnas", "fields"];
    let mut fields: Vec<String> = Vec::new();
    for key in FIELD_KEYS {
        if let Some(Json::Array(values)) = get_folded(config, key) {
            for value in values {
                if let Some(field) = value.as_str() {
                    let field = field.trim();
                    if !field.is_empty() && !fields.iter().any(|f| f == field) {
                        fields.push(field.to_string());
                    }
                }
            }
            if !fields.is_empty() {
                break;
            }
        }
    }

    let ignore_empty = ["ignorar vacios", "ignore empty", "ignore empties"]
        .iter()
        .any(|key| get_folded(config, key).map(json_truthy).unwrap_or(false));

    let name = get_folded(object, "nombre de la regla")
        .and_then(Json::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from);

    DuplicateConfig {
        fields,
        ignore_empty,
        name,
        message: message.map(String::from),
    }
}

fn parse_dependency(config: &Map<String, Json>) -> Result<DependencyConfig> {
    let Some(entries) = find_specific_rules(config) else {
        return Ok(DependencyConfig {
            field: None,
            branches: Vec::new(),
        });
    };

    let mut dependent: Option<String> = None;
    let mut branches = Vec::new();

    for entry in entries {
        let Json::Object(map) = entry else {
            bail!("configuración dependiente inválida");
        };
        if map.len() < 2 {
            bail!("configuración dependiente inválida");
        }

        let mut trigger: Option<Value> = None;
        let mut checks = Vec::new();

        for (key, body) in map {
            let key = key.trim();
            if key.is_empty() {
                bail!("clave de dependencia inválida");
            }
            let folded = fold_label(key);
            if DEPENDENCY_METADATA_KEYS.contains(&folded.as_str()) {
                continue;
            }

            if !body.is_object() && !body.is_array() {
                // The single scalar entry names the dependent field and its
                // trigger value
                match &dependent {
                    Some(existing) if fold_label(existing) != folded => {
                        bail!(
                            "la configuración dependiente mezcla campos distintos: '{}' y '{}'",
                            existing,
                            key
                        );
                    }
                    Some(_) => {}
                    None => dependent = Some(key.to_string()),
                }
                if trigger.is_some() {
                    bail!("la configuración dependiente repite el campo dependiente");
                }
                let value = json_scalar(body).normalized();
                if value.is_null() {
                    bail!("falta indicar el valor para '{}' en la configuración dependiente", key);
                }
                trigger = Some(value);
                continue;
            }

            let Json::Object(body) = body else {
                bail!("la configuración asociada a '{}' debe ser un objeto", key);
            };

            let check = match folded.as_str() {
                "texto" => RuleCheck::Text(parse_length(body)),
                "documento" => RuleCheck::Document(parse_length(body)),
                "numero" => RuleCheck::Number(parse_number(body)?),
                "lista" => RuleCheck::List(parse_list(body)),
                "lista compleja" => RuleCheck::CompositeList(parse_composite_list(body)),
                "telefono" => RuleCheck::Phone(parse_phone(body)),
                "correo" => RuleCheck::Email(parse_email(body)?),
                "fecha" => RuleCheck::Date(parse_date(body)),
                other => bail!("tipo dependiente '{}' no soportado", other),
            };
            checks.push(check);
        }

        let Some(trigger) = trigger else {
            bail!("falta indicar el valor del campo dependiente en la configuración");
        };
        branches.push(DependencyBranch { trigger, checks });
    }

    Ok(DependencyConfig {
        field: dependent,
        branches,
    })
}

/// Locate the `reglas especifica` list, tolerating one level of nesting
/// inside an extra `Regla` block (rules generated by external tools do this)
fn find_specific_rules(config: &Map<String, Json>) -> Option<&Vec<Json>> {
    if let Some(Json::Array(entries)) = get_folded(config, "reglas especifica") {
        return Some(entries);
    }
    if let Some(Json::Object(nested)) = get_folded(config, "regla") {
        return find_specific_rules(nested);
    }
    None
}
