use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    implementations::rpc::{BlockReferenceSource, Commitment},
    types::Instruction,
};

pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
pub const MEMO_PROGRAM_ID: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";

/// An instruction with its program and account list resolved.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id: String,
    pub accounts: Vec<String>,
    pub instruction: Instruction,
}

/// Transaction handed to a Solana wallet for signing. Never submitted here.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub fee_payer: String,
    pub recent_block_reference: String,
    pub instructions: Vec<CompiledInstruction>,
}

impl UnsignedTransaction {
    /// Bytes a wallet signs over.
    pub fn message_bytes(&self) -> AppResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

pub fn parse_public_key(account: &str) -> AppResult<[u8; 32]> {
    let raw = bs58::decode(account)
        .into_vec()
        .map_err(|err| AppError::InvalidInput(format!("invalid solana account {account}: {err}")))?;
    raw.try_into().map_err(|raw: Vec<u8>| {
        AppError::InvalidInput(format!(
            "solana account {account} decodes to {} bytes, expected 32",
            raw.len()
        ))
    })
}

pub fn encode_signature(signature: &[u8]) -> String {
    bs58::encode(signature).into_string()
}

/// Check an ed25519 message signature against a base58 public key.
pub fn verify_message(account: &str, message: &[u8], signature: &[u8]) -> AppResult<bool> {
    let key = parse_public_key(account)?;
    let key = VerifyingKey::from_bytes(&key)
        .map_err(|err| AppError::InvalidInput(format!("invalid ed25519 key {account}: {err}")))?;
    let signature = Signature::from_slice(signature)
        .map_err(|err| AppError::InvalidInput(format!("malformed ed25519 signature: {err}")))?;
    Ok(key.verify(message, &signature).is_ok())
}

/// Reject malformed instructions before anything leaves the process.
pub fn validate(fee_payer: &str, instructions: &[Instruction]) -> AppResult<()> {
    parse_public_key(fee_payer)?;
    if instructions.is_empty() {
        return Err(AppError::InvalidInput(
            "solana transaction needs at least one instruction".into(),
        ));
    }
    for instruction in instructions {
        match instruction {
            Instruction::Transfer { to, lamports } => {
                parse_public_key(to)?;
                if *lamports == 0 {
                    return Err(AppError::InvalidInput(
                        "transfer amount must be greater than zero".into(),
                    ));
                }
            }
            Instruction::Memo { text } => {
                if text.is_empty() {
                    return Err(AppError::InvalidInput("memo text must not be empty".into()));
                }
            }
        }
    }
    Ok(())
}

fn compile(fee_payer: &str, instruction: Instruction) -> CompiledInstruction {
    match &instruction {
        Instruction::Transfer { to, .. } => CompiledInstruction {
            program_id: SYSTEM_PROGRAM_ID.to_string(),
            accounts: vec![fee_payer.to_string(), to.clone()],
            instruction,
        },
        Instruction::Memo { .. } => CompiledInstruction {
            program_id: MEMO_PROGRAM_ID.to_string(),
            accounts: vec![fee_payer.to_string()],
            instruction,
        },
    }
}

/// Fetch a recent blockhash and attach it, with the fee payer, to the instructions.
pub async fn assemble(
    blocks: &dyn BlockReferenceSource,
    commitment: Commitment,
    fee_payer: &str,
    instructions: Vec<Instruction>,
) -> AppResult<UnsignedTransaction> {
    validate(fee_payer, &instructions)?;
    let recent_block_reference = blocks.recent_block_reference(commitment).await?;

    Ok(UnsignedTransaction {
        fee_payer: fee_payer.to_string(),
        recent_block_reference,
        instructions: instructions
            .into_iter()
            .map(|instruction| compile(fee_payer, instruction))
            .collect(),
    })
}
