use super::value::{is_star, parse_string_list};
use super::{parse_str, FieldContext, FieldError, FieldResult, ScenarioParser};
use crate::model::{
    Account, BlockInfo, CheckAccount, CheckAccounts, CheckEsdt, CheckEsdtData, CheckEsdtInstance,
    CheckStorage, CheckStorageEntry, EsdtData, EsdtInstance, JsonBytes, JsonUint64,
    NewAddressMock, StorageEntry,
};
use scenario_core::{OrderedJson, OrderedMap};

/// Key allowing entries beyond the ones listed
const MORE_ALLOWED_KEY: &str = "+";

impl ScenarioParser {
    pub(crate) fn process_account_map(&self, obj: &OrderedJson) -> FieldResult<Vec<Account>> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("unmarshalled account map object is not a map"))?;
        let mut accounts = Vec::with_capacity(map.len());
        for (key, value) in map.iter() {
            let address = self.parse_account_address(key)?;
            accounts.push(self.process_account(address, value)?);
        }
        Ok(accounts)
    }

    fn process_account(&self, address: JsonBytes, obj: &OrderedJson) -> FieldResult<Account> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("unmarshalled account object is not a map"))?;
        let mut account = Account {
            address,
            ..Account::default()
        };

        for (key, value) in map.iter() {
            match key {
                "comment" => {
                    account.comment =
                        Some(parse_str(value).context("invalid account comment")?.to_string())
                }
                "shard" => account.shard = Some(self.process_uint64(value).context("invalid account shard")?),
                "nonce" => account.nonce = Some(self.process_uint64(value).context("invalid account nonce")?),
                "balance" => {
                    account.balance =
                        Some(self.process_big_int(value).context("invalid account balance")?)
                }
                "esdt" => account.esdt = self.process_esdt_map(value).context("invalid ESDT")?,
                "username" => {
                    account.username = Some(
                        self.process_string_as_bytes(value)
                            .context("invalid account username")?,
                    )
                }
                "storage" => account.storage = Some(self.process_storage(value)?),
                "code" => {
                    account.code = Some(
                        self.process_string_as_bytes(value)
                            .context("invalid account code")?,
                    )
                }
                "owner" => {
                    account.owner = Some(
                        self.process_string_as_bytes(value)
                            .context("invalid account owner")?,
                    )
                }
                "asyncCallData" => {
                    account.async_call_data = Some(
                        self.process_string_as_bytes(value)
                            .context("invalid asyncCallData string")?,
                    )
                }
                "update" => {
                    account.update = value
                        .as_bool()
                        .ok_or_else(|| FieldError::new("account update flag is not boolean"))?
                }
                "developerRewards" => {
                    account.developer_rewards = Some(
                        self.process_big_int(value)
                            .context("invalid account developer rewards")?,
                    )
                }
                other => return Err(FieldError::new(format!("unknown account field: {other}"))),
            }
        }
        Ok(account)
    }

    fn process_storage(&self, obj: &OrderedJson) -> FieldResult<Vec<StorageEntry>> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("invalid account storage"))?;
        let mut entries = Vec::with_capacity(map.len());
        for (key, value) in map.iter() {
            let key = self
                .process_string_as_bytes(&OrderedJson::str(key))
                .context("invalid account storage key")?;
            let value = self
                .process_sub_tree_as_bytes(value)
                .context("invalid account storage value")?;
            entries.push(StorageEntry { key, value });
        }
        Ok(entries)
    }

    fn process_token_identifier(&self, key: &str) -> FieldResult<JsonBytes> {
        let value = self
            .interpreter()
            .interpret_string(key)
            .context("invalid esdt token identifier")?;
        Ok(JsonBytes::from_string(value, key))
    }

    fn process_esdt_map(&self, obj: &OrderedJson) -> FieldResult<Vec<EsdtData>> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("invalid ESDT map"))?;
        let mut tokens = Vec::with_capacity(map.len());
        for (key, value) in map.iter() {
            let token_identifier = self.process_token_identifier(key)?;
            tokens.push(self.process_esdt_data(token_identifier, value)?);
        }
        Ok(tokens)
    }

    fn process_esdt_data(&self, token_identifier: JsonBytes, obj: &OrderedJson) -> FieldResult<EsdtData> {
        let mut data = EsdtData {
            token_identifier,
            ..EsdtData::default()
        };
        match obj {
            OrderedJson::String(_) => {
                let balance = self.process_big_int(obj).context("invalid ESDT balance")?;
                data.instances.push(EsdtInstance {
                    balance,
                    ..EsdtInstance::default()
                });
                data.is_short_form = true;
            }
            OrderedJson::Map(map) => {
                for (key, value) in map.iter() {
                    match key {
                        "instances" => {
                            let items = value
                                .as_list()
                                .ok_or_else(|| FieldError::new("ESDT instances not a list"))?;
                            for item in items {
                                data.instances.push(self.process_esdt_instance(item)?);
                            }
                        }
                        "lastNonce" => {
                            data.last_nonce =
                                Some(self.process_uint64(value).context("invalid ESDT last nonce")?)
                        }
                        "roles" => {
                            data.roles = parse_string_list(value).context("invalid ESDT roles")?
                        }
                        "frozen" => {
                            data.frozen =
                                Some(self.process_uint64(value).context("invalid ESDT frozen flag")?)
                        }
                        other => {
                            return Err(FieldError::new(format!("unknown ESDT data field: {other}")))
                        }
                    }
                }
            }
            _ => return Err(FieldError::new("invalid JSON object for ESDT")),
        }
        Ok(data)
    }

    fn process_esdt_instance(&self, obj: &OrderedJson) -> FieldResult<EsdtInstance> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("JSON map expected in ESDT instances list"))?;
        let mut instance = EsdtInstance::default();
        for (key, value) in map.iter() {
            match key {
                "nonce" => instance.nonce = self.process_uint64(value).context("invalid ESDT nonce")?,
                "balance" => {
                    instance.balance = self.process_big_int(value).context("invalid ESDT balance")?
                }
                "creator" => {
                    instance.creator = Some(
                        self.process_string_as_bytes(value)
                            .context("invalid ESDT creator")?,
                    )
                }
                "royalties" => {
                    instance.royalties =
                        Some(self.process_uint64(value).context("invalid ESDT royalties")?)
                }
                "hash" => {
                    instance.hash = Some(
                        self.process_string_as_bytes(value)
                            .context("invalid ESDT hash")?,
                    )
                }
                "uri" => instance.uris = self.process_uris(value)?,
                "attributes" => {
                    instance.attributes = Some(
                        self.process_sub_tree_as_bytes(value)
                            .context("invalid ESDT attributes")?,
                    )
                }
                other => {
                    return Err(FieldError::new(format!("unknown ESDT instance field: {other}")))
                }
            }
        }
        Ok(instance)
    }

    /// A single URI string or a list of them
    fn process_uris(&self, obj: &OrderedJson) -> FieldResult<Vec<JsonBytes>> {
        match obj {
            OrderedJson::List(items) => items
                .iter()
                .map(|item| self.process_string_as_bytes(item).context("invalid ESDT uri"))
                .collect(),
            _ => Ok(vec![self
                .process_string_as_bytes(obj)
                .context("invalid ESDT uri")?]),
        }
    }

    pub(crate) fn process_new_address_mocks(
        &self,
        obj: &OrderedJson,
    ) -> FieldResult<Vec<NewAddressMock>> {
        let items = obj
            .as_list()
            .ok_or_else(|| FieldError::new("new address mocks not a list"))?;
        let mut mocks = Vec::with_capacity(items.len());
        for item in items {
            let map = item
                .as_map()
                .ok_or_else(|| FieldError::new("new address mock is not a map"))?;
            let mut mock = NewAddressMock::default();
            for (key, value) in map.iter() {
                match key {
                    "creatorAddress" => {
                        mock.creator_address = self.parse_account_address(parse_str(value)?)?
                    }
                    "creatorNonce" => {
                        mock.creator_nonce =
                            self.process_uint64(value).context("invalid creator nonce")?
                    }
                    "newAddress" => mock.new_address = self.parse_account_address(parse_str(value)?)?,
                    other => {
                        return Err(FieldError::new(format!(
                            "unknown new address mock field: {other}"
                        )))
                    }
                }
            }
            mocks.push(mock);
        }
        Ok(mocks)
    }

    pub(crate) fn process_block_info(&self, obj: &OrderedJson) -> FieldResult<BlockInfo> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("unmarshalled block info object is not a map"))?;
        let mut info = BlockInfo::default();
        for (key, value) in map.iter() {
            match key {
                "blockTimestamp" => {
                    info.timestamp =
                        Some(self.process_uint64(value).context("invalid block timestamp")?)
                }
                "blockNonce" => {
                    info.nonce = Some(self.process_uint64(value).context("invalid block nonce")?)
                }
                "blockRound" => {
                    info.round = Some(self.process_uint64(value).context("invalid block round")?)
                }
                "blockEpoch" => {
                    info.epoch = Some(self.process_uint64(value).context("invalid block epoch")?)
                }
                "blockRandomSeed" => {
                    info.random_seed = Some(
                        self.process_sub_tree_as_bytes(value)
                            .context("invalid block random seed")?,
                    )
                }
                other => return Err(FieldError::new(format!("unknown block info field: {other}"))),
            }
        }
        Ok(info)
    }

    pub(crate) fn process_check_account_map(&self, obj: &OrderedJson) -> FieldResult<CheckAccounts> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("unmarshalled check account map object is not a map"))?;
        let mut check = CheckAccounts::default();
        for (key, value) in map.iter() {
            if key == MORE_ALLOWED_KEY {
                check.other_accounts_allowed = true;
                continue;
            }
            let address = self.parse_account_address(key)?;
            check.accounts.push(self.process_check_account(address, value)?);
        }
        Ok(check)
    }

    fn process_check_account(&self, address: JsonBytes, obj: &OrderedJson) -> FieldResult<CheckAccount> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("unmarshalled check account object is not a map"))?;
        let mut account = CheckAccount {
            address,
            ..CheckAccount::default()
        };

        for (key, value) in map.iter() {
            match key {
                "comment" => {
                    account.comment =
                        Some(parse_str(value).context("invalid check account comment")?.to_string())
                }
                "nonce" => {
                    account.nonce = self
                        .process_check_uint64(value)
                        .context("invalid account nonce")?
                }
                "balance" => {
                    account.balance = self
                        .process_check_big_int(value)
                        .context("invalid account balance")?
                }
                "esdt" => account.esdt = self.process_check_esdt(value).context("invalid ESDT")?,
                "username" => {
                    account.username = self
                        .process_check_bytes(value)
                        .context("invalid account username")?
                }
                "storage" => account.storage = self.process_check_storage(value)?,
                "code" => {
                    account.code = self
                        .process_check_bytes(value)
                        .context("invalid account code")?
                }
                "owner" => {
                    account.owner = self
                        .process_check_bytes(value)
                        .context("invalid account owner")?
                }
                "asyncCallData" => {
                    account.async_call_data = self
                        .process_check_bytes(value)
                        .context("invalid asyncCallData")?
                }
                "developerRewards" => {
                    account.developer_rewards = self
                        .process_check_big_int(value)
                        .context("invalid account developer rewards")?
                }
                other => return Err(FieldError::new(format!("unknown account field: {other}"))),
            }
        }
        Ok(account)
    }

    fn process_check_storage(&self, obj: &OrderedJson) -> FieldResult<CheckStorage> {
        if is_star(obj) {
            return Ok(CheckStorage::Star);
        }
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("invalid account storage"))?;
        let mut entries = Vec::with_capacity(map.len());
        let mut more_allowed = false;
        for (key, value) in map.iter() {
            if key == MORE_ALLOWED_KEY {
                more_allowed = true;
                continue;
            }
            let key = self
                .process_string_as_bytes(&OrderedJson::str(key))
                .context("invalid account storage key")?;
            let value = self
                .process_check_bytes(value)
                .context("invalid account storage value")?;
            entries.push(CheckStorageEntry { key, value });
        }
        Ok(CheckStorage::Entries {
            entries,
            more_allowed,
        })
    }

    fn process_check_esdt(&self, obj: &OrderedJson) -> FieldResult<CheckEsdt> {
        if is_star(obj) {
            return Ok(CheckEsdt::Star);
        }
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("invalid ESDT map"))?;
        let mut tokens = Vec::with_capacity(map.len());
        let mut more_allowed = false;
        for (key, value) in map.iter() {
            if key == MORE_ALLOWED_KEY {
                more_allowed = true;
                continue;
            }
            let token_identifier = self.process_token_identifier(key)?;
            tokens.push(self.process_check_esdt_data(token_identifier, value)?);
        }
        Ok(CheckEsdt::Tokens {
            tokens,
            more_allowed,
        })
    }

    fn process_check_esdt_data(
        &self,
        token_identifier: JsonBytes,
        obj: &OrderedJson,
    ) -> FieldResult<CheckEsdtData> {
        let mut data = CheckEsdtData {
            token_identifier,
            ..CheckEsdtData::default()
        };
        match obj {
            OrderedJson::String(_) => {
                let balance = self
                    .process_check_big_int(obj)
                    .context("invalid ESDT balance")?;
                data.instances.push(CheckEsdtInstance {
                    balance,
                    ..CheckEsdtInstance::default()
                });
                data.is_short_form = true;
            }
            OrderedJson::Map(map) => self.process_check_esdt_fields(map, &mut data)?,
            _ => return Err(FieldError::new("invalid JSON object for ESDT")),
        }
        Ok(data)
    }

    fn process_check_esdt_fields(&self, map: &OrderedMap, data: &mut CheckEsdtData) -> FieldResult<()> {
        for (key, value) in map.iter() {
            match key {
                "instances" => {
                    let items = value
                        .as_list()
                        .ok_or_else(|| FieldError::new("ESDT instances not a list"))?;
                    for item in items {
                        data.instances.push(self.process_check_esdt_instance(item)?);
                    }
                }
                "lastNonce" => {
                    data.last_nonce = self
                        .process_check_uint64(value)
                        .context("invalid ESDT last nonce")?
                }
                "roles" => data.roles = parse_string_list(value).context("invalid ESDT roles")?,
                "frozen" => {
                    data.frozen = self
                        .process_check_uint64(value)
                        .context("invalid ESDT frozen flag")?
                }
                other => return Err(FieldError::new(format!("unknown ESDT data field: {other}"))),
            }
        }
        Ok(())
    }

    fn process_check_esdt_instance(&self, obj: &OrderedJson) -> FieldResult<CheckEsdtInstance> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("JSON map expected in ESDT instances list"))?;
        let mut instance = CheckEsdtInstance::default();
        let mut nonce: Option<JsonUint64> = None;
        for (key, value) in map.iter() {
            match key {
                "nonce" => nonce = Some(self.process_uint64(value).context("invalid ESDT nonce")?),
                "balance" => {
                    instance.balance = self
                        .process_check_big_int(value)
                        .context("invalid ESDT balance")?
                }
                "creator" => {
                    instance.creator = self
                        .process_check_bytes(value)
                        .context("invalid ESDT creator")?
                }
                "royalties" => {
                    instance.royalties = self
                        .process_check_uint64(value)
                        .context("invalid ESDT royalties")?
                }
                "hash" => instance.hash = self.process_check_bytes(value).context("invalid ESDT hash")?,
                "uri" => instance.uri = self.process_check_bytes(value).context("invalid ESDT uri")?,
                "attributes" => {
                    instance.attributes = self
                        .process_check_bytes(value)
                        .context("invalid ESDT attributes")?
                }
                other => {
                    return Err(FieldError::new(format!("unknown ESDT instance field: {other}")))
                }
            }
        }
        instance.nonce = nonce.unwrap_or_default();
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CheckValue;
    use num_bigint::BigUint;

    fn parse(json: &str) -> OrderedJson {
        scenario_core::ojson::parse(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_account_fields() {
        let parser = ScenarioParser::default();
        let accounts = parser
            .process_account_map(&parse(
                r#"{
                    "sc:adder": {
                        "nonce": "1",
                        "balance": "0",
                        "storage": { "str:sum": "5" },
                        "code": "str:adder-code",
                        "owner": "address:owner",
                        "developerRewards": "100",
                        "esdt": {
                            "str:TOK-123456": "1000",
                            "str:NFT-abcdef": {
                                "instances": [
                                    { "nonce": "5", "balance": "1", "royalties": "2000", "uri": ["str:a", "str:b"] }
                                ],
                                "lastNonce": "5",
                                "roles": ["ESDTRoleNFTCreate"]
                            }
                        }
                    }
                }"#,
            ))
            .unwrap();
        let account = &accounts[0];
        assert_eq!(account.nonce.as_ref().unwrap().value, 1);
        assert_eq!(account.storage.as_ref().unwrap()[0].key.value, b"sum");
        assert_eq!(account.code.as_ref().unwrap().value, b"adder-code");
        assert_eq!(
            account.developer_rewards.as_ref().unwrap().value,
            BigUint::from(100u32)
        );
        assert_eq!(account.esdt.len(), 2);
        assert!(account.esdt[0].is_short_form);
        assert_eq!(account.esdt[0].token_identifier.value, b"TOK-123456");
        assert_eq!(account.esdt[0].instances[0].balance.value, BigUint::from(1000u32));
        let nft = &account.esdt[1];
        assert_eq!(nft.instances[0].nonce.value, 5);
        assert_eq!(nft.instances[0].royalties.as_ref().unwrap().value, 2000);
        assert_eq!(nft.instances[0].uris.len(), 2);
        assert_eq!(nft.last_nonce.as_ref().unwrap().value, 5);
        assert_eq!(nft.roles, vec!["ESDTRoleNFTCreate".to_string()]);
    }

    #[test]
    fn test_unknown_account_field() {
        let parser = ScenarioParser::default();
        let err = parser
            .process_account_map(&parse(r#"{ "address:a": { "balanse": "1" } }"#))
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown account field: balanse");
    }

    #[test]
    fn test_check_esdt_variants() {
        let parser = ScenarioParser::default();
        let check = parser
            .process_check_account_map(&parse(
                r#"{
                    "address:a": { "esdt": "*" },
                    "address:b": { "esdt": { "str:TOK-123456": "*", "+": "" } },
                    "address:c": {}
                }"#,
            ))
            .unwrap();
        assert_eq!(check.accounts[0].esdt, CheckEsdt::Star);
        match &check.accounts[1].esdt {
            CheckEsdt::Tokens {
                tokens,
                more_allowed,
            } => {
                assert!(*more_allowed);
                assert!(tokens[0].instances[0].balance.is_star());
                assert_eq!(tokens[0].instances[0].nonce.value, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(check.accounts[2].esdt, CheckEsdt::Unspecified);
        assert!(!check.other_accounts_allowed);
    }

    #[test]
    fn test_block_info_and_new_addresses() {
        let parser = ScenarioParser::default();
        let info = parser
            .process_block_info(&parse(r#"{ "blockNonce": "7", "blockRandomSeed": "0x01" }"#))
            .unwrap();
        assert_eq!(info.nonce.unwrap().value, 7);
        assert_eq!(info.random_seed.unwrap().value, vec![1]);
        assert!(info.timestamp.is_none());

        let mocks = parser
            .process_new_address_mocks(&parse(
                r#"[{ "creatorAddress": "address:owner", "creatorNonce": "0", "newAddress": "sc:new" }]"#,
            ))
            .unwrap();
        assert_eq!(mocks[0].creator_nonce.value, 0);
        assert_eq!(mocks[0].new_address.original_text(), "sc:new");

        let err = parser
            .process_block_info(&parse(r#"{ "blockHeight": "1" }"#))
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown block info field: blockHeight");
    }

    #[test]
    fn test_check_values_keep_unspecified() {
        let parser = ScenarioParser::default();
        let check = parser
            .process_check_account_map(&parse(r#"{ "address:a": { "nonce": "*", "code": "" } }"#))
            .unwrap();
        let account = &check.accounts[0];
        assert!(account.nonce.is_star());
        assert_eq!(account.code, CheckValue::Exact(JsonBytes::from_tree(Vec::new(), OrderedJson::str(""))));
        assert!(account.owner.is_unspecified());
        assert!(account.developer_rewards.is_unspecified());
    }
}
