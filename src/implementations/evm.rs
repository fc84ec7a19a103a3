use std::str::FromStr;

use ethers::{
    types::{
        Address, Signature, TransactionRequest, U256, transaction::eip2718::TypedTransaction,
    },
    utils::to_checksum,
};

use crate::{
    error::{AppError, AppResult},
    types::EvmTransaction,
};

const TRANSFER_GAS: u64 = 21_000;
const CALL_GAS: u64 = 100_000;

/// Account id as exposed on the session: EIP-55 checksummed.
pub fn format_account(address: Address) -> String {
    to_checksum(&address, None)
}

pub fn parse_account(account: &str) -> AppResult<Address> {
    Address::from_str(account)
        .map_err(|err| AppError::InvalidInput(format!("invalid evm account {account}: {err}")))
}

/// `0x`-prefixed hex, the encoding `personal_sign` returns.
pub fn encode_signature(signature: &[u8]) -> String {
    format!("0x{}", hex::encode(signature))
}

/// Check an EIP-191 personal message signature against `account`.
pub fn verify_message(account: &str, message: &[u8], signature: &[u8]) -> AppResult<bool> {
    let address = parse_account(account)?;
    let signature = Signature::try_from(signature)
        .map_err(|err| AppError::InvalidInput(format!("malformed evm signature: {err}")))?;
    Ok(signature.verify(message.to_vec(), address).is_ok())
}

/// Legacy transaction a local signer can sign. Remote wallets estimate fees
/// themselves; a local signer uses fixed gas limits.
pub fn to_typed_transaction(tx: &EvmTransaction, from: Address, chain_id: u64) -> TypedTransaction {
    let gas = if tx.data.as_ref().is_some_and(|data| !data.is_empty()) {
        CALL_GAS
    } else {
        TRANSFER_GAS
    };
    let mut request = TransactionRequest::new()
        .from(from)
        .to(tx.to)
        .value(tx.value)
        .gas(U256::from(gas))
        .chain_id(chain_id);
    if let Some(data) = tx.data.clone() {
        request = request.data(data);
    }
    TypedTransaction::Legacy(request)
}
