use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::{keccak256, selector};
use crate::types::ParamType;

/// A named, typed function parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    /// Type spelling exactly as written in the interface, e.g. "hash256".
    #[serde(rename = "type")]
    pub kind: String,
}

/// An event parameter. Indexed parameters are carried in log topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParam {
    pub indexed: bool,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A callable contract member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    /// True when the function does not modify contract state.
    pub constant: bool,
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
}

/// A log-emitting contract member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub inputs: Vec<EventParam>,
}

/// One descriptor in a contract's published interface.
///
/// The JSON form uses the field names `constant`, `inputs`, `outputs`,
/// `name`, `type` and `indexed`, and is reproduced exactly on output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEntry", into = "RawEntry")]
pub enum InterfaceEntry {
    Function(Function),
    Event(Event),
}

impl Param {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }

    pub fn param_type(&self) -> Result<ParamType> {
        self.kind.parse()
    }
}

impl EventParam {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, indexed: bool) -> Self {
        Self {
            indexed,
            name: name.into(),
            kind: kind.into(),
        }
    }

    pub fn param_type(&self) -> Result<ParamType> {
        self.kind.parse()
    }
}

fn signature_of<'a>(name: &str, kinds: impl Iterator<Item = &'a str>) -> Result<String> {
    let types = kinds
        .map(|k| k.parse::<ParamType>().map(|t| t.canonical()))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("{}({})", name, types.join(",")))
}

impl Function {
    pub fn input_types(&self) -> Result<Vec<ParamType>> {
        self.inputs.iter().map(Param::param_type).collect()
    }

    pub fn output_types(&self) -> Result<Vec<ParamType>> {
        self.outputs.iter().map(Param::param_type).collect()
    }

    /// Canonical signature, e.g. `execute(address,uint256,bytes)`.
    pub fn signature(&self) -> Result<String> {
        signature_of(&self.name, self.inputs.iter().map(|p| p.kind.as_str()))
    }

    /// First four bytes of the Keccak-256 hash of the signature.
    pub fn selector(&self) -> Result<[u8; 4]> {
        Ok(selector(&self.signature()?))
    }
}

impl Event {
    pub fn input_types(&self) -> Result<Vec<ParamType>> {
        self.inputs.iter().map(EventParam::param_type).collect()
    }

    pub fn signature(&self) -> Result<String> {
        signature_of(&self.name, self.inputs.iter().map(|p| p.kind.as_str()))
    }

    /// Topic 0 of every log this event emits.
    pub fn topic(&self) -> Result<[u8; 32]> {
        Ok(keccak256(self.signature()?.as_bytes()))
    }
}

impl InterfaceEntry {
    pub fn name(&self) -> &str {
        match self {
            InterfaceEntry::Function(f) => &f.name,
            InterfaceEntry::Event(e) => &e.name,
        }
    }

    /// The value of the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            InterfaceEntry::Function(_) => "function",
            InterfaceEntry::Event(_) => "event",
        }
    }

    pub fn signature(&self) -> Result<String> {
        match self {
            InterfaceEntry::Function(f) => f.signature(),
            InterfaceEntry::Event(e) => e.signature(),
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            InterfaceEntry::Function(f) => Some(f),
            InterfaceEntry::Event(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            InterfaceEntry::Event(e) => Some(e),
            InterfaceEntry::Function(_) => None,
        }
    }
}

/// Field-for-field mirror of the JSON object, shared by both entry kinds.
#[derive(Serialize, Deserialize)]
struct RawEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    constant: Option<bool>,
    inputs: Vec<RawParam>,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    outputs: Option<Vec<Param>>,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize, Deserialize)]
struct RawParam {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    indexed: Option<bool>,
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

impl TryFrom<RawEntry> for InterfaceEntry {
    type Error = String;

    fn try_from(raw: RawEntry) -> std::result::Result<Self, Self::Error> {
        if raw.kind.is_empty() {
            return Err("entry `type` must be a non-empty string".into());
        }
        if raw.name.is_empty() {
            return Err(format!("{} entry has an empty `name`", raw.kind));
        }
        match raw.kind.as_str() {
            "function" => {
                let constant = raw
                    .constant
                    .ok_or_else(|| format!("function `{}` is missing boolean `constant`", raw.name))?;
                let outputs = raw
                    .outputs
                    .ok_or_else(|| format!("function `{}` is missing `outputs`", raw.name))?;
                let inputs = raw
                    .inputs
                    .into_iter()
                    .map(|p| match p.indexed {
                        Some(_) => Err(format!(
                            "function `{}` input `{}` cannot be `indexed`",
                            raw.name, p.name
                        )),
                        None => Ok(Param::new(p.name, p.kind)),
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(InterfaceEntry::Function(Function {
                    name: raw.name,
                    constant,
                    inputs,
                    outputs,
                }))
            }
            "event" => {
                if raw.constant.is_some() || raw.outputs.is_some() {
                    return Err(format!(
                        "event `{}` cannot carry `constant` or `outputs`",
                        raw.name
                    ));
                }
                let inputs = raw
                    .inputs
                    .into_iter()
                    .map(|p| match p.indexed {
                        Some(indexed) => Ok(EventParam::new(p.name, p.kind, indexed)),
                        None => Err(format!(
                            "event `{}` input `{}` is missing boolean `indexed`",
                            raw.name, p.name
                        )),
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(InterfaceEntry::Event(Event {
                    name: raw.name,
                    inputs,
                }))
            }
            other => Err(format!("unsupported entry type `{other}`")),
        }
    }
}

impl From<InterfaceEntry> for RawEntry {
    fn from(entry: InterfaceEntry) -> Self {
        match entry {
            InterfaceEntry::Function(f) => RawEntry {
                constant: Some(f.constant),
                inputs: f
                    .inputs
                    .into_iter()
                    .map(|p| RawParam {
                        indexed: None,
                        name: p.name,
                        kind: p.kind,
                    })
                    .collect(),
                name: f.name,
                outputs: Some(f.outputs),
                kind: "function".into(),
            },
            InterfaceEntry::Event(e) => RawEntry {
                constant: None,
                inputs: e
                    .inputs
                    .into_iter()
                    .map(|p| RawParam {
                        indexed: Some(p.indexed),
                        name: p.name,
                        kind: p.kind,
                    })
                    .collect(),
                name: e.name,
                outputs: None,
                kind: "event".into(),
            },
        }
    }
}
