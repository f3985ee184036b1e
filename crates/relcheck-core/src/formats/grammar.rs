//! # Grammar Format
//!
//! TOML description of the role grammar.
//!
//! ```toml
//! [[entry]]
//! name = "Turn restriction"
//! match = [ { key = "type", values = ["restriction"] } ]
//!
//! [[entry.role]]
//! key = "from"
//! types = ["line"]
//! count = "1"
//!
//! [[entry.role]]
//! key = "stop(_entry_only|_exit_only)?"
//! regexp = true
//! member_expression = "public_transport=stop_position"
//! ```
//!
//! `types` takes `point`, `line`, `closed_line`, `multipolygon` and
//! `composite`. `count` takes `*`, `N`, `N+`, `N-M` or `?N` and defaults to
//! `*`.

use crate::grammar::{Cardinality, GrammarEntry, MemberExpression, MemberType, RoleDef, TagCondition};
use crate::primitives::MAX_DOCUMENT_SIZE;
use crate::ValidatorError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GrammarWire {
    #[serde(default)]
    entry: Vec<EntryWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryWire {
    name: String,
    #[serde(default, rename = "match")]
    conditions: Vec<ConditionWire>,
    #[serde(default)]
    role: Vec<RoleWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionWire {
    key: String,
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RoleWire {
    #[serde(default)]
    key: String,
    #[serde(default)]
    regexp: bool,
    #[serde(default)]
    types: Vec<MemberType>,
    count: Option<String>,
    member_expression: Option<String>,
}

impl EntryWire {
    fn into_entry(self) -> Result<GrammarEntry, ValidatorError> {
        let name = self.name;
        let invalid = |e: ValidatorError| ValidatorError::InvalidGrammar {
            entry: name.clone(),
            message: e.to_string(),
        };

        let mut roles = Vec::with_capacity(self.role.len());
        for wire in self.role {
            let mut role = if wire.regexp {
                RoleDef::pattern(wire.key).map_err(invalid)?
            } else {
                RoleDef::new(wire.key)
            };
            role = role.with_types(wire.types);
            if let Some(count) = wire.count {
                role = role.with_count(count.parse::<Cardinality>().map_err(invalid)?);
            }
            if let Some(expression) = wire.member_expression {
                role = role.with_expression(MemberExpression::parse(&expression).map_err(invalid)?);
            }
            roles.push(role);
        }

        let conditions = self
            .conditions
            .into_iter()
            .map(|c| TagCondition {
                key: c.key,
                values: c.values,
            })
            .collect();
        Ok(GrammarEntry::new(name, conditions, roles))
    }
}

/// Parse a TOML grammar. Entries keep their document order.
pub fn grammar_from_toml(text: &str) -> Result<Vec<GrammarEntry>, ValidatorError> {
    if text.len() > MAX_DOCUMENT_SIZE {
        return Err(ValidatorError::DeserializationError(format!(
            "Grammar of {} bytes exceeds maximum allowed {} bytes",
            text.len(),
            MAX_DOCUMENT_SIZE
        )));
    }
    let wire: GrammarWire =
        toml::from_str(text).map_err(|e| ValidatorError::DeserializationError(e.to_string()))?;
    wire.entry.into_iter().map(EntryWire::into_entry).collect()
}
