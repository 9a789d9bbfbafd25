//! Parsed scenario values to ledger types

use crate::model::{
    Account as ModelAccount, BlockInfo as ModelBlockInfo, EsdtData, JsonBytes,
    NewAddressMock as ModelNewAddressMock, SetStateStep, Transaction,
};
use crate::{RunnerError, RunnerResult};
use scenario_core::Address;
use scenario_world::esdt::{self, MAX_ROYALTIES};
use scenario_world::{
    Account, AccountEntry, AccountPatch, BlockInfo, EsdtTransfer, NewAddressMock, SetState,
    Storage, TokenInstance, TokenRecord, TxRequest,
};

fn address(bytes: &JsonBytes) -> RunnerResult<Address> {
    Ok(Address::from_slice(&bytes.value)?)
}

/// Zero address for a field the transaction kind does not use
fn optional_address(bytes: &JsonBytes) -> RunnerResult<Address> {
    if bytes.value.is_empty() {
        Ok(Address::zero())
    } else {
        address(bytes)
    }
}

fn narrow_u32(value: u64, what: &str) -> RunnerResult<u32> {
    u32::try_from(value)
        .map_err(|_| RunnerError::Validation(format!("{what} {value} does not fit in 32 bits")))
}

pub(crate) fn set_state(step: &SetStateStep) -> RunnerResult<SetState> {
    let accounts = step
        .accounts
        .iter()
        .map(account_entry)
        .collect::<RunnerResult<Vec<_>>>()?;
    let new_address_mocks = step
        .new_address_mocks
        .iter()
        .map(new_address_mock)
        .collect::<RunnerResult<Vec<_>>>()?;
    Ok(SetState {
        accounts,
        new_address_mocks,
        previous_block_info: step.previous_block_info.as_ref().map(block_info).transpose()?,
        current_block_info: step.current_block_info.as_ref().map(block_info).transpose()?,
        block_hashes: step
            .block_hashes
            .as_ref()
            .map(|hashes| hashes.iter().map(|h| h.value.clone()).collect()),
    })
}

fn account_entry(account: &ModelAccount) -> RunnerResult<AccountEntry> {
    let records = account
        .esdt
        .iter()
        .map(token_record)
        .collect::<RunnerResult<Vec<_>>>()?;
    let shard = account
        .shard
        .as_ref()
        .map(|shard| narrow_u32(shard.value, "shard"))
        .transpose()?;
    let storage: Option<Storage> = account.storage.as_ref().map(|entries| {
        entries
            .iter()
            .map(|entry| (entry.key.value.clone(), entry.value.value.clone()))
            .collect()
    });

    if account.update {
        return Ok(AccountEntry::Update(AccountPatch {
            address: address(&account.address)?,
            nonce: account.nonce.as_ref().map(|n| n.value),
            balance: account.balance.as_ref().map(|b| b.value.clone()),
            username: account.username.as_ref().map(|u| u.value.clone()),
            storage,
            code: account.code.as_ref().map(|c| c.value.clone()),
            owner: account.owner.as_ref().map(|o| o.value.clone()),
            async_call_data: account
                .async_call_data
                .as_ref()
                .map(|d| String::from_utf8_lossy(&d.value).into_owned()),
            developer_rewards: account.developer_rewards.as_ref().map(|r| r.value.clone()),
            shard,
            esdt: records,
        }));
    }

    let mut world_account = Account::new(address(&account.address)?);
    world_account.nonce = account.nonce.as_ref().map(|n| n.value).unwrap_or_default();
    world_account.balance = account
        .balance
        .as_ref()
        .map(|b| b.value.clone())
        .unwrap_or_default();
    world_account.username = account
        .username
        .as_ref()
        .map(|u| u.value.clone())
        .unwrap_or_default();
    for (key, value) in storage.unwrap_or_default() {
        world_account.set_storage(key, value);
    }
    world_account.code = account.code.as_ref().map(|c| c.value.clone()).unwrap_or_default();
    world_account.owner = account.owner.as_ref().map(|o| o.value.clone()).unwrap_or_default();
    world_account.async_call_data = account
        .async_call_data
        .as_ref()
        .map(|d| String::from_utf8_lossy(&d.value).into_owned())
        .unwrap_or_default();
    world_account.developer_rewards = account
        .developer_rewards
        .as_ref()
        .map(|r| r.value.clone())
        .unwrap_or_default();
    world_account.shard = shard.unwrap_or_default();
    esdt::write_records(&mut world_account.storage, &records)?;
    Ok(AccountEntry::Put(world_account))
}

fn token_record(data: &EsdtData) -> RunnerResult<TokenRecord> {
    let frozen = data.frozen.as_ref().is_some_and(|f| f.value != 0);
    let mut record = TokenRecord::new(data.token_identifier.value.clone());
    for instance in &data.instances {
        let royalties = match &instance.royalties {
            Some(royalties) => narrow_u32(royalties.value, "royalties")?,
            None => 0,
        };
        if royalties > MAX_ROYALTIES {
            return Err(RunnerError::Validation(format!(
                "royalties {} of token {} exceed {}",
                royalties,
                data.token_identifier.original_text(),
                MAX_ROYALTIES
            )));
        }
        record.instances.push(TokenInstance {
            nonce: instance.nonce.value,
            balance: instance.balance.value.clone(),
            creator: instance.creator.as_ref().map(|c| c.value.clone()).unwrap_or_default(),
            royalties,
            hash: instance.hash.as_ref().map(|h| h.value.clone()).unwrap_or_default(),
            uris: instance.uris.iter().map(|u| u.value.clone()).collect(),
            attributes: instance
                .attributes
                .as_ref()
                .map(|a| a.value.clone())
                .unwrap_or_default(),
            frozen,
        });
    }
    record.last_nonce = data.last_nonce.as_ref().map(|n| n.value).unwrap_or_default();
    record.roles = data.roles.iter().map(|role| role.as_bytes().to_vec()).collect();
    Ok(record)
}

fn new_address_mock(mock: &ModelNewAddressMock) -> RunnerResult<NewAddressMock> {
    Ok(NewAddressMock {
        creator_address: address(&mock.creator_address)?,
        creator_nonce: mock.creator_nonce.value,
        new_address: address(&mock.new_address)?,
    })
}

/// Unspecified fields are zero
fn block_info(info: &ModelBlockInfo) -> RunnerResult<BlockInfo> {
    let value = |field: &Option<crate::model::JsonUint64>| field.as_ref().map(|f| f.value).unwrap_or_default();
    Ok(BlockInfo {
        timestamp: value(&info.timestamp),
        nonce: value(&info.nonce),
        round: value(&info.round),
        epoch: narrow_u32(value(&info.epoch), "block epoch")?,
        random_seed: BlockInfo::seed_from_slice(
            info.random_seed
                .as_ref()
                .map(|seed| seed.value.as_slice())
                .unwrap_or_default(),
        ),
    })
}

pub(crate) fn tx_request(id: &str, tx: &Transaction) -> RunnerResult<TxRequest> {
    let mut request = TxRequest::new(id, tx.kind);
    request.from = optional_address(&tx.from)?;
    request.to = optional_address(&tx.to)?;
    request.value = tx.egld_value.value.clone();
    request.esdt = tx
        .esdt_value
        .iter()
        .map(|esdt| EsdtTransfer {
            token_identifier: esdt.token_identifier.value.clone(),
            nonce: esdt.nonce.value,
            value: esdt.value.value.clone(),
        })
        .collect();
    request.function = tx.function.clone();
    request.arguments = tx.arguments.iter().map(|arg| arg.value.clone()).collect();
    request.code = tx.code.value.clone();
    request.gas_limit = tx.gas_limit.value;
    request.gas_price = tx.gas_price.value;
    Ok(request)
}
