use abi_common::valkey;
use abi_common::{bind, Address, BoundContract, ContractInterface};
use lru::LruCache;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::num::NonZero;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::ApiError;

/// Registered contracts, keyed by name.
///
/// Valkey is the source of truth when connected and the LRU only caches
/// bound contracts. Without Valkey the cache is unbounded and is the store.
/// The cache lock is never held across a Valkey round trip.
pub struct Registry {
    cache: Mutex<LruCache<String, Arc<BoundContract>>>,
    valkey: Option<redis::aio::MultiplexedConnection>,
}

/// Whether `name` is usable as a registry key and URL segment.
pub fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

impl Registry {
    pub fn new(valkey: redis::aio::MultiplexedConnection) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(NonZero::new(256).unwrap())),
            valkey: Some(valkey),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            cache: Mutex::new(LruCache::unbounded()),
            valkey: None,
        }
    }

    /// Bind and store a new contract. Names are never overwritten.
    pub async fn register(
        &self,
        name: &str,
        address: Address,
        interface: ContractInterface,
    ) -> Result<Arc<BoundContract>, ApiError> {
        if !valid_name(name) {
            return Err(ApiError::BadRequest(format!(
                "invalid contract name `{name}`: use 1-64 letters, digits, `_` or `-`"
            )));
        }
        let conflict = || ApiError::Conflict(format!("contract `{name}` is already registered"));

        let abi = interface.to_json()?;
        let contract = Arc::new(bind(interface, address)?.with_name(name));

        match self.valkey.clone() {
            Some(mut con) => {
                // SADD claims the name; only the first writer sees it added.
                let added: bool = con.sadd(valkey::CONTRACTS, name).await?;
                if !added {
                    return Err(conflict());
                }
                let stored: redis::RedisResult<()> = con
                    .hset_multiple(
                        valkey::contract_key(name),
                        &[("address", address.to_string()), ("abi", abi)],
                    )
                    .await;
                if let Err(e) = stored {
                    let _: redis::RedisResult<()> = con.srem(valkey::CONTRACTS, name).await;
                    return Err(e.into());
                }
                self.cache.lock().await.put(name.to_string(), contract.clone());
            }
            None => {
                let mut cache = self.cache.lock().await;
                if cache.contains(name) {
                    return Err(conflict());
                }
                cache.put(name.to_string(), contract.clone());
            }
        }

        tracing::info!("Registered contract {} at {}", name, address);
        Ok(contract)
    }

    /// Register `name` unless it is already taken, returning whichever
    /// contract holds the name afterwards.
    pub async fn ensure(
        &self,
        name: &str,
        address: Address,
        interface: ContractInterface,
    ) -> Result<Arc<BoundContract>, ApiError> {
        match self.register(name, address, interface).await {
            Err(ApiError::Conflict(message)) => {
                let existing = self
                    .get(name)
                    .await?
                    .ok_or(ApiError::Conflict(message))?;
                if existing.address() != address {
                    tracing::warn!(
                        "Contract {} stays registered at {}, not {}; unregister it to move it",
                        name,
                        existing.address(),
                        address
                    );
                }
                Ok(existing)
            }
            other => other,
        }
    }

    /// Look up a contract, loading and binding it from Valkey on a cache miss.
    pub async fn get(&self, name: &str) -> Result<Option<Arc<BoundContract>>, ApiError> {
        if let Some(contract) = self.cache.lock().await.get(name) {
            return Ok(Some(contract.clone()));
        }

        let Some(mut con) = self.valkey.clone() else {
            return Ok(None);
        };
        let fields: HashMap<String, String> = con.hgetall(valkey::contract_key(name)).await?;
        let Some(contract) = load(name, &fields)? else {
            return Ok(None);
        };

        let contract = Arc::new(contract);
        self.cache.lock().await.put(name.to_string(), contract.clone());
        Ok(Some(contract))
    }

    pub async fn unregister(&self, name: &str) -> Result<bool, ApiError> {
        let cached = self.cache.lock().await.pop(name).is_some();

        let stored = match self.valkey.clone() {
            Some(mut con) => {
                let (deleted, _): (u64, u64) = redis::pipe()
                    .del(valkey::contract_key(name))
                    .srem(valkey::CONTRACTS, name)
                    .query_async(&mut con)
                    .await?;
                deleted > 0
            }
            None => false,
        };

        if cached || stored {
            tracing::info!("Unregistered contract {}", name);
        }
        Ok(cached || stored)
    }

    /// All registered contracts, sorted by name.
    pub async fn list(&self) -> Result<Vec<Arc<BoundContract>>, ApiError> {
        let names: Vec<String> = match self.valkey.clone() {
            Some(mut con) => con.smembers(valkey::CONTRACTS).await?,
            None => self
                .cache
                .lock()
                .await
                .iter()
                .map(|(name, _)| name.clone())
                .collect(),
        };

        let mut contracts = Vec::with_capacity(names.len());
        for name in names {
            if let Some(contract) = self.get(&name).await? {
                contracts.push(contract);
            }
        }
        contracts.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(contracts)
    }

    pub async fn len(&self) -> Result<usize, ApiError> {
        match self.valkey.clone() {
            Some(mut con) => Ok(con.scard(valkey::CONTRACTS).await?),
            None => Ok(self.cache.lock().await.len()),
        }
    }
}

/// Rebuild a bound contract from its stored hash fields.
fn load(name: &str, fields: &HashMap<String, String>) -> Result<Option<BoundContract>, ApiError> {
    let (Some(address), Some(abi)) = (fields.get("address"), fields.get("abi")) else {
        return Ok(None);
    };
    let unreadable = |e: abi_common::AbiError| {
        tracing::error!("Stored contract {} is unreadable: {}", name, e);
        ApiError::Internal(format!("stored contract `{name}` is unreadable"))
    };
    let interface = ContractInterface::from_json(abi).map_err(unreadable)?;
    let address: Address = address.parse().map_err(unreadable)?;
    let contract = bind(interface, address).map_err(unreadable)?.with_name(name);
    Ok(Some(contract))
}

#[cfg(test)]
mod tests {
    use super::*;
    use abi_common::literal::coin_interface;

    #[test]
    fn names_are_restricted() {
        assert!(valid_name("coin"));
        assert!(valid_name("multi-sig_2"));
        assert!(!valid_name(""));
        assert!(!valid_name("has space"));
        assert!(!valid_name("a/b"));
        assert!(!valid_name(&"x".repeat(65)));
    }

    #[test]
    fn load_requires_both_fields() {
        let mut fields = HashMap::new();
        fields.insert("address".to_string(), "0x1111111111111111111111111111111111111111".to_string());
        assert!(load("coin", &fields).unwrap().is_none());

        fields.insert("abi".to_string(), coin_interface().unwrap().to_json().unwrap());
        let contract = load("coin", &fields).unwrap().unwrap();
        assert_eq!(contract.name(), "coin");
        assert_eq!(contract.interface().len(), 7);
    }

    #[test]
    fn unreadable_stored_contract_is_a_server_error() {
        let mut fields = HashMap::new();
        fields.insert("address".to_string(), "0x1111111111111111111111111111111111111111".to_string());
        fields.insert("abi".to_string(), "[{".to_string());
        let err = load("coin", &fields).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        fields.insert("abi".to_string(), "[]".to_string());
        fields.insert("address".to_string(), "nope".to_string());
        assert!(matches!(load("coin", &fields), Err(ApiError::Internal(_))));
    }

    #[tokio::test]
    async fn in_memory_register_get_unregister() {
        let registry = Registry::in_memory();
        let address = Address([0x11; 20]);

        registry.register("coin", address, coin_interface().unwrap()).await.unwrap();
        assert_eq!(registry.len().await.unwrap(), 1);
        assert_eq!(registry.get("coin").await.unwrap().unwrap().address(), address);

        let dup = registry.register("coin", address, coin_interface().unwrap()).await;
        assert!(matches!(dup, Err(ApiError::Conflict(_))));

        assert!(registry.unregister("coin").await.unwrap());
        assert!(!registry.unregister("coin").await.unwrap());
        assert!(registry.get("coin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ensure_keeps_the_first_address() {
        let registry = Registry::in_memory();
        let first = Address([0x11; 20]);
        let second = Address([0x22; 20]);

        let kept = registry.ensure("coin", first, coin_interface().unwrap()).await.unwrap();
        assert_eq!(kept.address(), first);
        let kept = registry.ensure("coin", second, coin_interface().unwrap()).await.unwrap();
        assert_eq!(kept.address(), first);
        assert_eq!(registry.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reads_share_the_registry() {
        let registry = Arc::new(Registry::in_memory());
        registry
            .register("coin", Address([0x11; 20]), coin_interface().unwrap())
            .await
            .unwrap();

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get("coin").await.unwrap().is_some() })
            })
            .collect();
        for reader in readers {
            assert!(reader.await.unwrap());
        }
    }

    #[tokio::test]
    async fn list_is_sorted() {
        let registry = Registry::in_memory();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register(name, Address([0x22; 20]), coin_interface().unwrap())
                .await
                .unwrap();
        }
        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
