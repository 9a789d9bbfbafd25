//! ESDT token records stored in account storage
//!
//! Tokens are not a separate table: every instance, last-nonce counter and
//! role list lives under a reserved key in the owning account's storage.
//! This module builds those keys and converts between the raw key/value
//! pairs and [`TokenRecord`]s.

use crate::{WorldError, WorldResult};
use bincode::{Decode, Encode};
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use scenario_core::expression::biguint_minimal;
use std::collections::BTreeMap;

/// Keys under this prefix belong to the protocol, not to contracts
pub const PROTECTED_KEY_PREFIX: &[u8] = b"ELROND";
pub const ESDT_TOKEN_KEY_PREFIX: &[u8] = b"ELRONDesdt";
pub const ESDT_NONCE_KEY_PREFIX: &[u8] = b"ELRONDnonce";
pub const ESDT_ROLE_KEY_PREFIX: &[u8] = b"ELRONDroleesdt";

pub const MAX_ROYALTIES: u32 = 10_000;

/// Length of the random part in identifiers such as `TICKER-a1b2c3`
pub const RANDOM_SEQUENCE_LEN: usize = 6;

/// Account storage: raw key to raw value
pub type Storage = BTreeMap<Vec<u8>, Vec<u8>>;

/// Fungible or not, derived from the nonce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Fungible = 0,
    NonFungible = 1,
}

impl TokenType {
    pub fn for_nonce(nonce: u64) -> Self {
        if nonce == 0 {
            TokenType::Fungible
        } else {
            TokenType::NonFungible
        }
    }
}

/// One nonce of a token held by an account
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenInstance {
    pub nonce: u64,
    pub balance: BigUint,
    pub creator: Vec<u8>,
    pub royalties: u32,
    pub hash: Vec<u8>,
    pub uris: Vec<Vec<u8>>,
    pub attributes: Vec<u8>,
    pub frozen: bool,
}

impl TokenInstance {
    pub fn fungible(balance: BigUint) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }
}

/// Everything an account holds of one token identifier
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenRecord {
    pub identifier: Vec<u8>,
    pub instances: Vec<TokenInstance>,
    pub last_nonce: u64,
    pub roles: Vec<Vec<u8>>,
}

impl TokenRecord {
    pub fn new(identifier: impl Into<Vec<u8>>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    pub fn instance(&self, nonce: u64) -> Option<&TokenInstance> {
        self.instances.iter().find(|i| i.nonce == nonce)
    }
}

#[derive(Debug, Clone, Encode, Decode)]
struct StoredMetadata {
    name: Vec<u8>,
    nonce: u64,
    creator: Vec<u8>,
    royalties: u32,
    hash: Vec<u8>,
    uris: Vec<Vec<u8>>,
    attributes: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
struct StoredToken {
    value: Vec<u8>,
    token_type: u32,
    properties: Vec<u8>,
    metadata: Option<StoredMetadata>,
}

#[derive(Debug, Clone, Encode, Decode)]
struct StoredRoles {
    roles: Vec<Vec<u8>>,
}

const FROZEN_BIT: u8 = 0x01;

fn encode<T: Encode>(value: &T) -> WorldResult<Vec<u8>> {
    Ok(bincode::encode_to_vec(value, bincode::config::standard())?)
}

fn decode<T: Decode<()>>(bytes: &[u8]) -> WorldResult<T> {
    let (value, _) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(value)
}

/// `prefix | identifier | nonce`, the nonce minimal big-endian and absent for 0
pub fn make_token_key(identifier: &[u8], nonce: u64) -> Vec<u8> {
    let mut key = [ESDT_TOKEN_KEY_PREFIX, identifier].concat();
    key.extend(biguint_minimal(&BigUint::from(nonce)));
    key
}

pub fn make_last_nonce_key(identifier: &[u8]) -> Vec<u8> {
    [ESDT_NONCE_KEY_PREFIX, identifier].concat()
}

pub fn make_roles_key(identifier: &[u8]) -> Vec<u8> {
    [ESDT_ROLE_KEY_PREFIX, identifier].concat()
}

pub fn is_protected_key(key: &[u8]) -> bool {
    key.starts_with(PROTECTED_KEY_PREFIX)
}

fn is_role_key(key: &[u8]) -> bool {
    key.starts_with(ESDT_ROLE_KEY_PREFIX)
}

fn is_token_key(key: &[u8]) -> bool {
    key.starts_with(ESDT_TOKEN_KEY_PREFIX)
}

fn is_nonce_key(key: &[u8]) -> bool {
    key.starts_with(ESDT_NONCE_KEY_PREFIX)
}

fn validate_instance(identifier: &[u8], instance: &TokenInstance) -> WorldResult<()> {
    if instance.royalties > MAX_ROYALTIES {
        return Err(WorldError::Validation(format!(
            "invalid royalties for token {}: {} exceeds {}",
            String::from_utf8_lossy(identifier),
            instance.royalties,
            MAX_ROYALTIES
        )));
    }
    Ok(())
}

fn encode_instance(identifier: &[u8], instance: &TokenInstance) -> WorldResult<Vec<u8>> {
    validate_instance(identifier, instance)?;
    let stored = StoredToken {
        value: biguint_minimal(&instance.balance),
        token_type: TokenType::for_nonce(instance.nonce) as u32,
        properties: if instance.frozen {
            vec![FROZEN_BIT]
        } else {
            Vec::new()
        },
        metadata: Some(StoredMetadata {
            name: identifier.to_vec(),
            nonce: instance.nonce,
            creator: instance.creator.clone(),
            royalties: instance.royalties,
            hash: instance.hash.clone(),
            uris: instance.uris.clone(),
            attributes: instance.attributes.clone(),
        }),
    };
    encode(&stored)
}

fn decode_instance(bytes: &[u8]) -> WorldResult<TokenInstance> {
    let stored: StoredToken = decode(bytes)?;
    let frozen = stored.properties.first().is_some_and(|b| b & FROZEN_BIT != 0);
    let mut instance = TokenInstance {
        balance: BigUint::from_bytes_be(&stored.value),
        frozen,
        ..TokenInstance::default()
    };
    if let Some(meta) = stored.metadata {
        instance.nonce = meta.nonce;
        instance.creator = meta.creator;
        instance.royalties = meta.royalties;
        instance.hash = meta.hash;
        instance.uris = meta.uris;
        instance.attributes = meta.attributes;
    }
    Ok(instance)
}

/// Write one instance under its key. A zero balance removes the key.
pub fn write_instance(
    storage: &mut Storage,
    identifier: &[u8],
    instance: &TokenInstance,
) -> WorldResult<()> {
    let key = make_token_key(identifier, instance.nonce);
    if instance.balance.is_zero() {
        storage.remove(&key);
        return Ok(());
    }
    storage.insert(key, encode_instance(identifier, instance)?);
    Ok(())
}

/// Read one instance, `None` when the account holds none of it
pub fn read_instance(
    storage: &Storage,
    identifier: &[u8],
    nonce: u64,
) -> WorldResult<Option<TokenInstance>> {
    match storage.get(&make_token_key(identifier, nonce)) {
        Some(bytes) if !bytes.is_empty() => {
            let mut instance = decode_instance(bytes)?;
            instance.nonce = nonce;
            Ok(Some(instance))
        }
        _ => Ok(None),
    }
}

/// Balance of one instance, zero when absent
pub fn token_balance(storage: &Storage, identifier: &[u8], nonce: u64) -> WorldResult<BigUint> {
    Ok(read_instance(storage, identifier, nonce)?
        .map(|instance| instance.balance)
        .unwrap_or_default())
}

/// Encode records into the key/value pairs that represent them
pub fn encode_records<'a, I>(records: I) -> WorldResult<Storage>
where
    I: IntoIterator<Item = &'a TokenRecord>,
{
    let mut storage = Storage::new();
    write_records(&mut storage, records)?;
    Ok(storage)
}

/// Write records into existing account storage
pub fn write_records<'a, I>(storage: &mut Storage, records: I) -> WorldResult<()>
where
    I: IntoIterator<Item = &'a TokenRecord>,
{
    for record in records {
        for instance in &record.instances {
            write_instance(storage, &record.identifier, instance)?;
        }
        if record.last_nonce > 0 {
            storage.insert(
                make_last_nonce_key(&record.identifier),
                biguint_minimal(&BigUint::from(record.last_nonce)),
            );
        }
        if !record.roles.is_empty() {
            let roles = StoredRoles {
                roles: record.roles.clone(),
            };
            storage.insert(make_roles_key(&record.identifier), encode(&roles)?);
        }
    }
    Ok(())
}

/// Splits a token key's tail into identifier and nonce suffix when the
/// identifier follows the `TICKER-random` shape. Other shapes are returned
/// whole with an empty suffix.
pub fn split_identifier_suffix(name_from_key: &[u8]) -> (&[u8], &[u8]) {
    match name_from_key.iter().position(|b| *b == b'-') {
        Some(dash) if dash > 0 => {
            let end = dash + 1 + RANDOM_SEQUENCE_LEN;
            if name_from_key.len() > end {
                name_from_key.split_at(end)
            } else {
                (name_from_key, &[])
            }
        }
        _ => (name_from_key, &[]),
    }
}

fn load_instance_from_key(key: &[u8], value: &[u8]) -> WorldResult<(Vec<u8>, TokenInstance)> {
    let mut instance = decode_instance(value)?;
    let name_from_key = &key[ESDT_TOKEN_KEY_PREFIX.len()..];

    if instance.nonce == 0 {
        let (identifier, suffix) = split_identifier_suffix(name_from_key);
        if !suffix.is_empty() {
            instance.nonce = BigUint::from_bytes_be(suffix)
                .to_u64()
                .ok_or_else(|| WorldError::Codec("token nonce suffix exceeds u64".to_string()))?;
        }
        return Ok((identifier.to_vec(), instance));
    }

    let nonce_bytes = biguint_minimal(&BigUint::from(instance.nonce));
    if !name_from_key.ends_with(&nonce_bytes) {
        return Err(WorldError::Codec(
            "invalid key for NFT (key does not end in nonce)".to_string(),
        ));
    }
    let identifier = &name_from_key[..name_from_key.len() - nonce_bytes.len()];
    Ok((identifier.to_vec(), instance))
}

/// Rebuild every token record from a flat storage map.
///
/// Instances, nonce counters and role lists are recognised by prefix
/// independently and merged by identifier. Zero-balance instances are
/// dropped. Instances come out ordered by nonce.
pub fn decode_records(storage: &Storage) -> WorldResult<BTreeMap<Vec<u8>, TokenRecord>> {
    let mut records: BTreeMap<Vec<u8>, TokenRecord> = BTreeMap::new();
    fn entry<'m>(
        records: &'m mut BTreeMap<Vec<u8>, TokenRecord>,
        identifier: &[u8],
    ) -> &'m mut TokenRecord {
        records
            .entry(identifier.to_vec())
            .or_insert_with(|| TokenRecord::new(identifier))
    }

    for (key, value) in storage {
        if is_role_key(key) {
            let identifier = &key[ESDT_ROLE_KEY_PREFIX.len()..];
            let roles = if value.is_empty() {
                Vec::new()
            } else {
                decode::<StoredRoles>(value)?.roles
            };
            entry(&mut records, identifier).roles = roles;
        } else if is_token_key(key) {
            if value.is_empty() {
                continue;
            }
            let (identifier, instance) = load_instance_from_key(key, value)?;
            if !instance.balance.is_zero() {
                entry(&mut records, &identifier).instances.push(instance);
            }
        } else if is_nonce_key(key) {
            let identifier = &key[ESDT_NONCE_KEY_PREFIX.len()..];
            let last_nonce = BigUint::from_bytes_be(value)
                .to_u64()
                .ok_or_else(|| WorldError::Codec("last nonce exceeds u64".to_string()))?;
            entry(&mut records, identifier).last_nonce = last_nonce;
        }
    }

    for record in records.values_mut() {
        record.instances.sort_by_key(|instance| instance.nonce);
    }
    Ok(records)
}

/// Move `value` of one instance between two storages. The receiver gets
/// the sender's metadata when it does not hold the instance yet.
pub fn transfer(
    from: &mut Storage,
    to: &mut Storage,
    identifier: &[u8],
    nonce: u64,
    value: &BigUint,
) -> WorldResult<()> {
    let mut source = read_instance(from, identifier, nonce)?.unwrap_or_else(|| TokenInstance {
        nonce,
        ..TokenInstance::default()
    });
    if source.balance < *value {
        return Err(WorldError::InsufficientFunds(format!(
            "insufficient ESDT funds for {} nonce {}: have {}, need {}",
            String::from_utf8_lossy(identifier),
            nonce,
            source.balance,
            value
        )));
    }
    if source.frozen {
        return Err(WorldError::Execution(format!(
            "ESDT {} is frozen for the sender",
            String::from_utf8_lossy(identifier)
        )));
    }

    let mut destination = match read_instance(to, identifier, nonce)? {
        Some(existing) => existing,
        None => TokenInstance {
            balance: BigUint::zero(),
            frozen: false,
            ..source.clone()
        },
    };
    source.balance -= value;
    destination.balance += value;
    write_instance(from, identifier, &source)?;
    write_instance(to, identifier, &destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nft(nonce: u64, balance: u32) -> TokenInstance {
        TokenInstance {
            nonce,
            balance: BigUint::from(balance),
            creator: b"creator".to_vec(),
            royalties: 500,
            hash: b"hash".to_vec(),
            uris: vec![b"uri-1".to_vec(), b"uri-2".to_vec()],
            attributes: b"attr".to_vec(),
            frozen: false,
        }
    }

    #[test]
    fn test_keys() {
        assert_eq!(make_token_key(b"TOK-123456", 0), b"ELRONDesdtTOK-123456");
        assert_eq!(make_token_key(b"NFT-123456", 5), b"ELRONDesdtNFT-123456\x05");
        assert_eq!(make_token_key(b"NFT-123456", 256), b"ELRONDesdtNFT-123456\x01\x00");
        assert_eq!(make_last_nonce_key(b"X"), b"ELRONDnonceX");
        assert_eq!(make_roles_key(b"X"), b"ELRONDroleesdtX");
        assert!(is_protected_key(b"ELRONDreward"));
        assert!(!is_protected_key(b"counter"));
    }

    #[test]
    fn test_record_round_trip() {
        let record = TokenRecord {
            identifier: b"NFT-abcdef".to_vec(),
            instances: vec![
                TokenInstance::fungible(BigUint::from(100u32)),
                nft(5, 1),
            ],
            last_nonce: 5,
            roles: vec![b"ESDTRoleNFTCreate".to_vec(), b"ESDTRoleNFTBurn".to_vec()],
        };
        let storage = encode_records([&record]).unwrap();
        assert_eq!(storage.len(), 4);

        let decoded = decode_records(&storage).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded.get(b"NFT-abcdef".as_slice()), Some(&record));
    }

    #[test]
    fn test_decode_merges_scattered_keys() {
        let mut storage = Storage::new();
        storage.insert(b"counter".to_vec(), b"\x01".to_vec());
        write_records(
            &mut storage,
            [
                &TokenRecord {
                    identifier: b"AAA-111111".to_vec(),
                    instances: vec![TokenInstance::fungible(BigUint::from(7u32))],
                    ..TokenRecord::default()
                },
                &TokenRecord {
                    identifier: b"BBB-222222".to_vec(),
                    last_nonce: 3,
                    ..TokenRecord::default()
                },
            ],
        )
        .unwrap();
        storage.insert(
            make_roles_key(b"AAA-111111"),
            encode(&StoredRoles {
                roles: vec![b"ESDTRoleLocalMint".to_vec()],
            })
            .unwrap(),
        );

        let records = decode_records(&storage).unwrap();
        assert_eq!(records.len(), 2);
        let aaa = &records[b"AAA-111111".as_slice()];
        assert_eq!(aaa.instances[0].balance, BigUint::from(7u32));
        assert_eq!(aaa.roles, vec![b"ESDTRoleLocalMint".to_vec()]);
        assert_eq!(records[b"BBB-222222".as_slice()].last_nonce, 3);
        assert!(records[b"BBB-222222".as_slice()].instances.is_empty());
    }

    #[test]
    fn test_decode_drops_zero_balance_and_checks_nonce_suffix() {
        let mut storage = Storage::new();
        let zero = TokenInstance {
            nonce: 0,
            ..TokenInstance::default()
        };
        storage.insert(make_token_key(b"Z-000000", 0), encode_instance(b"Z-000000", &zero).unwrap());
        assert!(decode_records(&storage).unwrap().is_empty());

        let mut bad = Storage::new();
        bad.insert(
            make_token_key(b"NFT-abcdef", 4),
            encode_instance(b"NFT-abcdef", &nft(5, 1)).unwrap(),
        );
        let err = decode_records(&bad).unwrap_err();
        assert!(err.to_string().contains("key does not end in nonce"));
    }

    #[test]
    fn test_wipe_style_identifier_suffix() {
        assert_eq!(
            split_identifier_suffix(b"NFT-abcdef\x07"),
            (b"NFT-abcdef".as_slice(), b"\x07".as_slice())
        );
        assert_eq!(split_identifier_suffix(b"NFT-abcdef"), (b"NFT-abcdef".as_slice(), b"".as_slice()));
        assert_eq!(split_identifier_suffix(b"PLAIN"), (b"PLAIN".as_slice(), b"".as_slice()));

        // an instance stored without metadata nonce still lands on its key's nonce
        let mut storage = Storage::new();
        let stored = StoredToken {
            value: vec![3],
            token_type: 1,
            properties: Vec::new(),
            metadata: None,
        };
        storage.insert(make_token_key(b"SFT-abcdef", 7), encode(&stored).unwrap());
        let records = decode_records(&storage).unwrap();
        let record = &records[b"SFT-abcdef".as_slice()];
        assert_eq!(record.instances[0].nonce, 7);
        assert_eq!(record.instances[0].balance, BigUint::from(3u32));
    }

    #[test]
    fn test_royalties_validated() {
        let mut storage = Storage::new();
        let mut instance = nft(1, 1);
        instance.royalties = 10_001;
        let err = write_instance(&mut storage, b"NFT-abcdef", &instance).unwrap_err();
        assert!(matches!(err, WorldError::Validation(_)));
    }

    #[test]
    fn test_transfer() {
        let mut alice = Storage::new();
        let mut bob = Storage::new();
        write_instance(&mut alice, b"NFT-abcdef", &nft(2, 10)).unwrap();

        transfer(&mut alice, &mut bob, b"NFT-abcdef", 2, &BigUint::from(4u32)).unwrap();
        assert_eq!(token_balance(&alice, b"NFT-abcdef", 2).unwrap(), BigUint::from(6u32));
        let received = read_instance(&bob, b"NFT-abcdef", 2).unwrap().unwrap();
        assert_eq!(received.balance, BigUint::from(4u32));
        assert_eq!(received.creator, b"creator");

        transfer(&mut alice, &mut bob, b"NFT-abcdef", 2, &BigUint::from(6u32)).unwrap();
        assert!(read_instance(&alice, b"NFT-abcdef", 2).unwrap().is_none());

        let err = transfer(&mut alice, &mut bob, b"NFT-abcdef", 2, &BigUint::from(1u32)).unwrap_err();
        assert!(err.to_string().contains("insufficient ESDT funds"));
    }
}
