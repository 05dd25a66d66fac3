//! Typed rule model
//!
//! Rule payloads arrive as opaque JSON keyed by Spanish labels. They are
//! parsed once, when a template's rules are resolved, into this tree of
//! tagged enums; per-cell evaluation never re-interprets JSON.

use regex::Regex;
use rust_decimal::Decimal;

use crate::ingest::Value;

/// Base data type of a template column, driving the fallback parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Json,
}

impl DataType {
    /// Resolve a column's `data_type` label. Accepts both the storage-level
    /// labels (string, integer, ...) and the Spanish rule-category labels,
    /// which fall back to the parser their category ultimately needs.
    pub fn from_label(label: &str) -> Option<DataType> {
        match fold_label(label).as_str() {
            "string" | "text" | "texto" | "documento" | "lista" | "lista compleja"
            | "telefono" | "correo" | "dependencia" | "validacion conjunta" | "duplicados" => {
                Some(DataType::Text)
            }
            "integer" | "entero" => Some(DataType::Integer),
            "float" | "number" | "numero" => Some(DataType::Float),
            "boolean" | "booleano" => Some(DataType::Boolean),
            "date" | "fecha" => Some(DataType::Date),
            "datetime" | "fecha y hora" => Some(DataType::DateTime),
            "json" => Some(DataType::Json),
            _ => None,
        }
    }
}

/// A resolved rule: either a single stage or an ordered chain
///
/// Chains thread each stage's coerced value into the next stage; error
/// lists from every stage are concatenated.
#[derive(Debug, Clone)]
pub enum RuleExpr {
    Stage(RuleStage),
    Chain(Vec<RuleExpr>),
}

/// One validation stage with its required flag and error-message override
#[derive(Debug, Clone)]
pub struct RuleStage {
    /// Null values error when this is set; otherwise they pass untouched
    pub required: bool,
    /// Administrator-supplied message prefixed to generated errors
    pub message: Option<String>,
    pub check: RuleCheck,
}

/// Category-specific validation configuration
#[derive(Debug, Clone)]
pub enum RuleCheck {
    Text(LengthConfig),
    Document(LengthConfig),
    Number(NumberConfig),
    List(ListConfig),
    CompositeList(CompositeListConfig),
    Phone(PhoneConfig),
    Email(EmailConfig),
    Date(DateConfig),
    Dependency(DependencyConfig),
    Joint(JointConfig),
    Duplicates(DuplicateConfig),
}

/// Length bounds for text and document rules
#[derive(Debug, Clone, Default)]
pub struct LengthConfig {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

/// Decimal-place and bound checks; arithmetic uses `rust_decimal` so decimal
/// strings never pick up float rounding artifacts
#[derive(Debug, Clone, Default)]
pub struct NumberConfig {
    pub decimals: Option<u32>,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

/// Allow-list membership; an empty list means "no constraint"
#[derive(Debug, Clone, Default)]
pub struct ListConfig {
    pub allowed: Vec<String>,
}

/// Allowed cross-field value combinations
#[derive(Debug, Clone, Default)]
pub struct CompositeListConfig {
    /// Each combination maps sibling field name -> expected value
    pub combinations: Vec<Vec<(String, String)>>,
}

#[derive(Debug, Clone, Default)]
pub struct PhoneConfig {
    pub country_code: Option<String>,
    pub min_local_digits: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Anchored pattern compiled from the rule's `Formato`
    pub pattern: Option<Regex>,
    pub max_length: Option<usize>,
}

/// Named date format aliases tried before the generic parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormatAlias {
    IsoYmd,
    SlashDmy,
    DashMdy,
}

impl DateFormatAlias {
    pub fn from_label(label: &str) -> Option<DateFormatAlias> {
        match fold_label(label).as_str() {
            "yyyy mm dd" => Some(DateFormatAlias::IsoYmd),
            "dd/mm/yyyy" => Some(DateFormatAlias::SlashDmy),
            "mm dd yyyy" => Some(DateFormatAlias::DashMdy),
            _ => None,
        }
    }

    pub fn pattern(&self) -> &'static str {
        match self {
            DateFormatAlias::IsoYmd => "%Y-%m-%d",
            DateFormatAlias::SlashDmy => "%d/%m/%Y",
            DateFormatAlias::DashMdy => "%m-%d-%Y",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DateConfig {
    pub format: Option<DateFormatAlias>,
}

/// Conditional cross-field rule: when the dependent column matches a
/// branch's trigger, that branch's nested checks run against the current
/// value; otherwise only the fallback parser applies
#[derive(Debug, Clone)]
pub struct DependencyConfig {
    /// Sibling column whose normalized value selects the branch; `None`
    /// degrades the rule to the plain fallback parser
    pub field: Option<String>,
    pub branches: Vec<DependencyBranch>,
}

#[derive(Debug, Clone)]
pub struct DependencyBranch {
    pub trigger: Value,
    /// Nested single-key checks applied in declaration order
    pub checks: Vec<RuleCheck>,
}

/// All-or-nothing population across a set of sibling fields
#[derive(Debug, Clone, Default)]
pub struct JointConfig {
    /// Configured field names; the current column is implied when absent
    pub fields: Vec<String>,
}

/// Row-set rule: rows sharing identical values over `fields` are all marked
#[derive(Debug, Clone, Default)]
pub struct DuplicateConfig {
    pub fields: Vec<String>,
    pub ignore_empty: bool,
    pub name: Option<String>,
    pub message: Option<String>,
}

/// Fold a label for comparison: lowercase, accents stripped, camelCase
/// split, separator runs collapsed to single spaces
pub fn fold_label(label: &str) -> String {
    let mut spaced = String::with_capacity(label.len() + 4);
    let mut prev_lower = false;
    for ch in label.chars() {
        if ch.is_uppercase() && prev_lower {
            spaced.push(' ');
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        spaced.push(ch);
    }

    let mut folded = String::with_capacity(spaced.len());
    let mut pending_space = false;
    for ch in spaced.chars() {
        let ch = strip_accent(ch);
        if ch.is_whitespace() || matches!(ch, '-' | '_') {
            pending_space = !folded.is_empty();
            continue;
        }
        if pending_space {
            folded.push(' ');
            pending_space = false;
        }
        for lower in ch.to_lowercase() {
            folded.push(lower);
        }
    }
    folded
}

pub(crate) fn strip_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'a',
        'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'u',
        'ñ' | 'Ñ' => 'n',
        other => other,
    }
}
