use serde::Serialize;
use serde_json::{json, Value};

use crate::address::Address;
use crate::codec;
use crate::entry::{Event, Function};
use crate::error::{AbiError, Result};
use crate::hash::to_hex;
use crate::interface::ContractInterface;
use crate::log::{DecodedEvent, DecodedParam, Log};
use crate::token::Token;

/// A contract interface bound to a deployment address: the client-side proxy.
#[derive(Debug, Clone)]
pub struct BoundContract {
    name: String,
    address: Address,
    interface: ContractInterface,
    /// Topic 0 of each event, in declaration order.
    topics: Vec<([u8; 32], Event)>,
}

/// Transaction object for `eth_call` / `eth_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    #[serde(with = "crate::log::hex_bytes")]
    pub data: Vec<u8>,
    /// Whether the target function leaves state untouched.
    #[serde(skip)]
    pub constant: bool,
}

impl CallRequest {
    /// Constant functions are evaluated with `eth_call`; everything else
    /// has to be sent as a transaction.
    pub fn method(&self) -> &'static str {
        if self.constant {
            "eth_call"
        } else {
            "eth_sendTransaction"
        }
    }

    /// A complete JSON-RPC request for this call.
    pub fn rpc_request(&self, id: u64) -> Value {
        let params = if self.constant {
            json!([self, "latest"])
        } else {
            json!([self])
        };
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": self.method(),
            "params": params,
        })
    }
}

/// Bind `interface` to the contract deployed at `address`.
pub fn bind(interface: ContractInterface, address: Address) -> Result<BoundContract> {
    let topics = interface
        .events()
        .map(|e| Ok((e.topic()?, e.clone())))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        "Bound contract at {} ({} functions, {} events)",
        address,
        interface.functions().count(),
        topics.len()
    );

    Ok(BoundContract {
        name: address.to_string(),
        address,
        interface,
        topics,
    })
}

impl BoundContract {
    /// Label used in decoded events. Defaults to the address.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn interface(&self) -> &ContractInterface {
        &self.interface
    }

    pub fn function(&self, name: &str) -> Result<&Function> {
        self.interface
            .function(name)
            .or_else(|| self.interface.function_by_signature(name))
            .ok_or_else(|| AbiError::UnknownFunction(name.to_string()))
    }

    pub fn event(&self, name: &str) -> Result<&Event> {
        self.interface
            .event(name)
            .ok_or_else(|| AbiError::UnknownEvent(name.to_string()))
    }

    /// Call data for `name`: the four-byte selector followed by the encoded arguments.
    pub fn encode_call(&self, name: &str, args: &[Token]) -> Result<Vec<u8>> {
        let function = self.function(name)?;
        let types = function.input_types()?;
        if args.len() != types.len() {
            return Err(AbiError::InvalidArgument(format!(
                "`{}` takes {} arguments, got {}",
                function.name,
                types.len(),
                args.len()
            )));
        }
        for ((arg, kind), param) in args.iter().zip(&types).zip(&function.inputs) {
            if !arg.matches(kind) {
                return Err(AbiError::InvalidArgument(format!(
                    "argument `{}` of `{}` is not a valid {}",
                    param.name, function.name, param.kind
                )));
            }
        }

        let mut data = function.selector()?.to_vec();
        data.extend(codec::encode(args));
        Ok(data)
    }

    /// Like [`BoundContract::encode_call`], converting JSON arguments by parameter type.
    pub fn encode_call_json(&self, name: &str, args: &[Value]) -> Result<Vec<u8>> {
        let function = self.function(name)?;
        let types = function.input_types()?;
        if args.len() != types.len() {
            return Err(AbiError::InvalidArgument(format!(
                "`{}` takes {} arguments, got {}",
                function.name,
                types.len(),
                args.len()
            )));
        }
        let tokens = types
            .iter()
            .zip(args)
            .map(|(kind, value)| Token::from_json(kind, value))
            .collect::<Result<Vec<_>>>()?;
        self.encode_call(name, &tokens)
    }

    /// Prepare a call of `name` against this contract.
    pub fn call_request(&self, name: &str, args: &[Value], from: Option<Address>) -> Result<CallRequest> {
        let data = self.encode_call_json(name, args)?;
        Ok(CallRequest {
            from,
            to: self.address,
            data,
            constant: self.function(name)?.constant,
        })
    }

    /// Decode the return data of `name` into named values.
    pub fn decode_output(&self, name: &str, data: &[u8]) -> Result<Vec<(String, Token)>> {
        let function = self.function(name)?;
        let tokens = codec::decode(&function.output_types()?, data)?;
        Ok(function
            .outputs
            .iter()
            .map(|p| p.name.clone())
            .zip(tokens)
            .collect())
    }

    /// Identify the function a piece of call data targets and decode its arguments.
    pub fn decode_call(&self, data: &[u8]) -> Result<(&Function, Vec<Token>)> {
        let selector = data
            .get(..4)
            .ok_or_else(|| AbiError::Decode("call data shorter than a selector".into()))?;
        let function = self
            .interface
            .functions()
            .find(|f| f.selector().map(|s| s.as_slice() == selector).unwrap_or(false))
            .ok_or_else(|| AbiError::UnknownFunction(to_hex(selector)))?;
        let tokens = codec::decode(&function.input_types()?, &data[4..])?;
        Ok((function, tokens))
    }

    /// Match a log to one of this contract's events and decode its parameters.
    ///
    /// Indexed parameters that do not fit in a single word are stored in the
    /// topic as a hash, so they are surfaced as that 32-byte hash.
    pub fn decode_log(&self, log: &Log) -> Result<DecodedEvent> {
        if log.address != self.address {
            return Err(AbiError::UnknownEvent(format!(
                "log from {} does not belong to {}",
                log.address, self.address
            )));
        }
        let topic0 = log
            .topics
            .first()
            .ok_or_else(|| AbiError::UnknownEvent("log has no topics".into()))?;
        let (_, event) = self
            .topics
            .iter()
            .find(|(topic, _)| topic.as_slice() == topic0.as_slice())
            .ok_or_else(|| AbiError::UnknownEvent(format!("no event with topic {}", to_hex(topic0))))?;

        let types = event.input_types()?;
        let indexed_count = event.inputs.iter().filter(|p| p.indexed).count();
        if log.topics.len() != indexed_count + 1 {
            return Err(AbiError::Decode(format!(
                "`{}` log has {} topics, expected {}",
                event.name,
                log.topics.len(),
                indexed_count + 1
            )));
        }

        let data_types: Vec<_> = event
            .inputs
            .iter()
            .zip(&types)
            .filter(|(p, _)| !p.indexed)
            .map(|(_, t)| t.clone())
            .collect();
        let mut data_tokens = codec::decode(&data_types, &log.data)?.into_iter();
        let mut topics = log.topics[1..].iter();

        let mut params = Vec::with_capacity(event.inputs.len());
        for (param, kind) in event.inputs.iter().zip(&types) {
            let token = if param.indexed {
                let topic = topics
                    .next()
                    .ok_or_else(|| AbiError::Decode("missing topic".into()))?;
                let word: [u8; 32] = topic
                    .as_slice()
                    .try_into()
                    .map_err(|_| AbiError::Decode(format!("topic for `{}` is not 32 bytes", param.name)))?;
                if kind.is_dynamic() || kind.head_size() != 32 {
                    Token::FixedBytes(word.to_vec())
                } else {
                    codec::decode_word(kind, &word)?
                }
            } else {
                data_tokens
                    .next()
                    .ok_or_else(|| AbiError::Decode("missing data value".into()))?
            };
            params.push(DecodedParam {
                name: param.name.clone(),
                kind: param.kind.clone(),
                indexed: param.indexed,
                value: token.to_json(),
            });
        }

        Ok(DecodedEvent {
            contract: self.name.clone(),
            address: self.address,
            event: event.name.clone(),
            signature: event.signature()?,
            block_number: log.block_number,
            transaction_hash: log.transaction_hash.clone(),
            log_index: log.log_index,
            indexed_at_ms: 0,
            params,
        })
    }

    /// `eth_getLogs` filter for every event of this contract from `from_block`.
    pub fn event_filter(&self, from_block: u64, to_block: Option<u64>) -> Value {
        let topics: Vec<String> = self.topics.iter().map(|(t, _)| to_hex(t)).collect();
        let to_block = match to_block {
            Some(b) => json!(format!("{b:#x}")),
            None => json!("latest"),
        };
        json!({
            "address": self.address,
            "fromBlock": format!("{from_block:#x}"),
            "toBlock": to_block,
            "topics": [topics],
        })
    }
}
