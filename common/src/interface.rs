use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::entry::{Event, Function, InterfaceEntry};
use crate::error::{AbiError, Result};

/// Most indexed parameters a single event can carry; topic 0 holds the signature.
pub const MAX_INDEXED_PARAMS: usize = 3;

/// A contract's published interface: an ordered, validated list of entries.
///
/// Entry order is significant and preserved through parsing and
/// serialisation. Members are looked up by position or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<InterfaceEntry>", into = "Vec<InterfaceEntry>")]
pub struct ContractInterface {
    entries: Vec<InterfaceEntry>,
}

impl ContractInterface {
    /// Parse the JSON array form. Syntax errors, including unquoted field
    /// values, are reported with their line and column.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<InterfaceEntry> = serde_json::from_str(json)?;
        Self::from_entries(entries)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let entries: Vec<InterfaceEntry> = serde_json::from_slice(bytes)?;
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<InterfaceEntry>) -> Result<Self> {
        let interface = Self { entries };
        interface.validate()?;
        Ok(interface)
    }

    /// Check every parameter type against the vocabulary, the indexed-parameter
    /// limit on events, and that no two members share a signature.
    pub fn validate(&self) -> Result<()> {
        let mut signatures = HashSet::new();

        for (index, entry) in self.entries.iter().enumerate() {
            match entry {
                InterfaceEntry::Function(f) => {
                    f.input_types()?;
                    f.output_types()?;
                }
                InterfaceEntry::Event(e) => {
                    e.input_types()?;
                    let indexed = e.inputs.iter().filter(|p| p.indexed).count();
                    if indexed > MAX_INDEXED_PARAMS {
                        return Err(AbiError::InvalidEntry {
                            index,
                            reason: format!(
                                "event `{}` has {indexed} indexed parameters, at most {MAX_INDEXED_PARAMS} allowed",
                                e.name
                            ),
                        });
                    }
                }
            }

            let signature = format!("{}:{}", entry.kind(), entry.signature()?);
            if !signatures.insert(signature) {
                return Err(AbiError::DuplicateMember(entry.signature()?));
            }
        }

        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.entries).map_err(|e| AbiError::InvalidArgument(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.entries)
            .map_err(|e| AbiError::InvalidArgument(e.to_string()))
    }

    pub fn entries(&self) -> &[InterfaceEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&InterfaceEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.entries.iter().filter_map(InterfaceEntry::as_function)
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter().filter_map(InterfaceEntry::as_event)
    }

    /// First function declared with `name`. Overloads are reachable through
    /// [`ContractInterface::function_by_signature`].
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions().find(|f| f.name == name)
    }

    pub fn function_by_signature(&self, signature: &str) -> Option<&Function> {
        self.functions()
            .find(|f| f.signature().map(|s| s == signature).unwrap_or(false))
    }

    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events().find(|e| e.name == name)
    }
}

impl TryFrom<Vec<InterfaceEntry>> for ContractInterface {
    type Error = AbiError;

    fn try_from(entries: Vec<InterfaceEntry>) -> Result<Self> {
        Self::from_entries(entries)
    }
}

impl From<ContractInterface> for Vec<InterfaceEntry> {
    fn from(interface: ContractInterface) -> Self {
        interface.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquoted_field_value_reports_location() {
        let json = "[\n  {\"constant\":false,\n   \"inputs\":[{\"name\":_to,\"type\":\"address\"}],\n   \"name\":\"kill\",\"outputs\":[],\"type\":\"function\"}\n]";
        match ContractInterface::from_json(json) {
            Err(AbiError::Parse { line, column, .. }) => {
                assert_eq!(line, 3);
                assert!(column > 0);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_parameter_type_is_rejected() {
        let json = r#"[{"constant":true,"inputs":[{"name":"x","type":"uint7"}],"name":"f","outputs":[],"type":"function"}]"#;
        assert!(matches!(
            ContractInterface::from_json(json),
            Err(AbiError::UnknownType(t)) if t == "uint7"
        ));
    }

    #[test]
    fn oversized_or_deeply_nested_types_are_rejected() {
        let huge = r#"[{"constant":true,"inputs":[],"name":"f","outputs":[{"name":"r","type":"uint8[1000000000000000000]"}],"type":"function"}]"#;
        assert!(matches!(
            ContractInterface::from_json(huge),
            Err(AbiError::UnknownType(_))
        ));

        let deep = format!(
            r#"[{{"constant":true,"inputs":[{{"name":"x","type":"uint8{}"}}],"name":"f","outputs":[],"type":"function"}}]"#,
            "[]".repeat(200_000)
        );
        assert!(matches!(
            ContractInterface::from_json(&deep),
            Err(AbiError::UnknownType(_))
        ));
    }

    #[test]
    fn duplicate_signatures_are_rejected_but_overloads_allowed() {
        let dup = r#"[
            {"constant":false,"inputs":[{"name":"a","type":"hash256"}],"name":"f","outputs":[],"type":"function"},
            {"constant":true,"inputs":[{"name":"b","type":"bytes32"}],"name":"f","outputs":[],"type":"function"}
        ]"#;
        assert!(matches!(
            ContractInterface::from_json(dup),
            Err(AbiError::DuplicateMember(s)) if s == "f(bytes32)"
        ));

        let overload = r#"[
            {"constant":false,"inputs":[{"name":"a","type":"uint256"}],"name":"f","outputs":[],"type":"function"},
            {"constant":false,"inputs":[{"name":"a","type":"address"}],"name":"f","outputs":[],"type":"function"}
        ]"#;
        let interface = ContractInterface::from_json(overload).unwrap();
        assert_eq!(interface.function("f").unwrap().inputs[0].kind, "uint256");
        assert_eq!(
            interface.function_by_signature("f(address)").unwrap().inputs[0].kind,
            "address"
        );
    }

    #[test]
    fn too_many_indexed_params() {
        let json = r#"[{"inputs":[
            {"indexed":true,"name":"a","type":"uint8"},
            {"indexed":true,"name":"b","type":"uint8"},
            {"indexed":true,"name":"c","type":"uint8"},
            {"indexed":true,"name":"d","type":"uint8"}
        ],"name":"E","type":"event"}]"#;
        assert!(matches!(
            ContractInterface::from_json(json),
            Err(AbiError::InvalidEntry { index: 0, .. })
        ));
    }

    #[test]
    fn empty_interface_is_valid() {
        let interface = ContractInterface::from_json("[]").unwrap();
        assert!(interface.is_empty());
        assert_eq!(interface.to_json().unwrap(), "[]");
    }
}
