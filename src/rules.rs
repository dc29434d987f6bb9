// 🏷️ Validation Rules - Rules as Data
// Field-level type / required / pattern rules loaded from a YAML document

use crate::error::ConfigError;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

// ============================================================================
// FIELD TYPE
// ============================================================================

/// Scalar kinds a rule can demand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
}

impl FieldType {
    /// Resolve a declared type name. Unknown names return `None`, which the
    /// validator treats as "no type check".
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "str" | "string" => Some(FieldType::String),
            "int" | "integer" => Some(FieldType::Int),
            "float" => Some(FieldType::Float),
            "bool" | "boolean" => Some(FieldType::Bool),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
        }
    }
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Rule {
    /// Declared type; `None` skips the type check
    pub field_type: Option<FieldType>,

    /// Failure discards the whole record instead of nulling the field
    pub required: bool,

    /// Anchored at the start of the value (`^(?:...)`)
    pub pattern: Option<Regex>,
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: declare a type
    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    /// Builder: mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Builder: add a pattern. The match must start at the beginning of the
    /// value but may stop before its end.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pattern = Some(Regex::new(&format!("^(?:{pattern})"))?);
        Ok(self)
    }

    pub fn matches_pattern(&self, text: &str) -> bool {
        self.pattern.as_ref().map_or(true, |re| re.is_match(text))
    }
}

// ============================================================================
// DOCUMENT SHAPE
// ============================================================================

#[derive(Debug, Deserialize)]
struct RuleDocument {
    fields: BTreeMap<String, Option<RuleSpec>>,
}

#[derive(Debug, Default, Deserialize)]
struct RuleSpec {
    #[serde(rename = "type")]
    type_name: Option<String>,

    #[serde(default)]
    required: bool,

    regex: Option<String>,
}

impl RuleSpec {
    fn into_rule(self, field: &str) -> Result<Rule, ConfigError> {
        let mut rule = Rule {
            field_type: self.type_name.as_deref().and_then(FieldType::from_name),
            required: self.required,
            pattern: None,
        };

        if let Some(pattern) = self.regex.as_deref().filter(|p| !p.is_empty()) {
            rule = rule
                .with_pattern(pattern)
                .map_err(|source| ConfigError::InvalidPattern {
                    field: field.to_string(),
                    source,
                })?;
        }

        Ok(rule)
    }
}

// ============================================================================
// RULE SET
// ============================================================================

/// field name → Rule. Read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: BTreeMap<String, Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rules from a YAML file with shape
    /// `fields: { <name>: { type?, required?, regex? } }`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading validation rules");

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let document: RuleDocument = serde_yaml::from_str(content)?;

        let mut rules = BTreeMap::new();
        for (field, spec) in document.fields {
            let rule = spec.unwrap_or_default().into_rule(&field)?;
            rules.insert(field, rule);
        }

        let rule_set = RuleSet { rules };
        info!(
            count = rule_set.len(),
            fields = ?rule_set.field_names().collect::<Vec<_>>(),
            "validation rules loaded"
        );
        Ok(rule_set)
    }

    /// Create a rule set from (field, rule) pairs
    pub fn from_rules<I, K>(rules: I) -> Self
    where
        I: IntoIterator<Item = (K, Rule)>,
        K: Into<String>,
    {
        RuleSet {
            rules: rules.into_iter().map(|(k, r)| (k.into(), r)).collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Rule> {
        self.rules.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rule)> + '_ {
        self.rules.iter().map(|(k, r)| (k.as_str(), r))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RULES_YAML: &str = r#"
fields:
  title:
    type: str
    required: true
  created_at:
    type: str
    required: true
    regex: '\d{4}-\d{2}-\d{2}'
  rtype_id:
    type: int
  summary:
    type: text
  external_link:
"#;

    #[test]
    fn test_load_rules_from_yaml() {
        let rules = RuleSet::from_yaml_str(RULES_YAML).unwrap();

        assert_eq!(rules.len(), 5);

        let title = rules.get("title").unwrap();
        assert_eq!(title.field_type, Some(FieldType::String));
        assert!(title.required);
        assert!(title.pattern.is_none());

        let rtype = rules.get("rtype_id").unwrap();
        assert_eq!(rtype.field_type, Some(FieldType::Int));
        assert!(!rtype.required, "required defaults to false");
    }

    #[test]
    fn test_unknown_type_is_permissive() {
        let rules = RuleSet::from_yaml_str(RULES_YAML).unwrap();
        assert_eq!(rules.get("summary").unwrap().field_type, None);
    }

    #[test]
    fn test_empty_field_definition() {
        let rules = RuleSet::from_yaml_str(RULES_YAML).unwrap();
        let link = rules.get("external_link").unwrap();

        assert_eq!(link.field_type, None);
        assert!(!link.required);
        assert!(link.pattern.is_none());
    }

    #[test]
    fn test_pattern_anchored_at_start_only() {
        let rules = RuleSet::from_yaml_str(RULES_YAML).unwrap();
        let created = rules.get("created_at").unwrap();

        assert!(created.matches_pattern("2024-01-01"));
        assert!(created.matches_pattern("2024-01-01 10:30:00"));
        assert!(!created.matches_pattern("on 2024-01-01"));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(FieldType::from_name("integer"), Some(FieldType::Int));
        assert_eq!(FieldType::from_name(" Bool "), Some(FieldType::Bool));
        assert_eq!(FieldType::from_name("string"), Some(FieldType::String));
        assert_eq!(FieldType::from_name("date"), None);
    }

    #[test]
    fn test_missing_fields_key_is_config_error() {
        let result = RuleSet::from_yaml_str("rules:\n  title:\n    required: true\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_non_mapping_document_is_config_error() {
        assert!(matches!(
            RuleSet::from_yaml_str("- title\n- created_at\n"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            RuleSet::from_yaml_str("fields: [title, created_at]\n"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_invalid_regex_is_config_error() {
        let yaml = "fields:\n  title:\n    regex: '(unclosed'\n";
        match RuleSet::from_yaml_str(yaml) {
            Err(ConfigError::InvalidPattern { field, .. }) => assert_eq!(field, "title"),
            other => panic!("expected InvalidPattern, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = RuleSet::from_file("/definitely/not/here/rules.yaml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RULES_YAML.as_bytes()).unwrap();

        let rules = RuleSet::from_file(file.path()).unwrap();
        assert_eq!(rules.len(), 5);
    }
}
