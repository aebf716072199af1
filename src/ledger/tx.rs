use rlp::{Rlp, RlpStream};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};
use tracing::debug;

use super::{Address, LedgerError, H256};
use crate::codec::keccak256;

/// EIP-2718 type byte of an EIP-1559 transaction.
const EIP1559_TX_TYPE: u8 = 0x02;

/// A decoded, signature-checked transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Keccak-256 of the raw encoding
    pub hash: H256,
    /// Sender recovered from the signature
    pub from: Address,
    pub nonce: u64,
    /// Gas price (max fee per gas for EIP-1559)
    pub gas_price: u128,
    pub gas: u64,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    pub value: u128,
    pub data: Vec<u8>,
    /// Chain ID (from EIP-155 or the typed envelope)
    pub chain_id: Option<u64>,
}

/// Fields of a legacy transaction before signing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas: u64,
    pub to: Option<Address>,
    pub value: u128,
    pub data: Vec<u8>,
}

fn decode_err(e: rlp::DecoderError) -> LedgerError {
    LedgerError::InvalidTransaction(format!("RLP parse error: {e}"))
}

/// Decode and verify a raw transaction.
/// Supports legacy (with or without EIP-155) and EIP-1559 transactions.
pub fn decode_raw_transaction(raw_tx: &[u8]) -> Result<SignedTransaction, LedgerError> {
    let Some(&first) = raw_tx.first() else {
        return Err(LedgerError::InvalidTransaction("empty transaction".to_string()));
    };

    if first <= 0x7f {
        debug!("Typed transaction detected: type={}", first);
        if first != EIP1559_TX_TYPE {
            return Err(LedgerError::InvalidTransaction(format!(
                "unsupported transaction type {first}"
            )));
        }
        return decode_eip1559_transaction(raw_tx);
    }

    let rlp = Rlp::new(raw_tx);
    if !rlp.is_list() {
        return Err(LedgerError::InvalidTransaction(
            "transaction RLP is not a list".to_string(),
        ));
    }
    match rlp.item_count().map_err(decode_err)? {
        // [nonce, gasPrice, gasLimit, to, value, data, v, r, s]
        9 => decode_legacy_transaction(&rlp, raw_tx),
        6 => Err(LedgerError::InvalidTransaction(
            "transaction is not signed".to_string(),
        )),
        n => Err(LedgerError::InvalidTransaction(format!(
            "unexpected RLP item count: {n} (expected 9)"
        ))),
    }
}

fn decode_legacy_transaction(rlp: &Rlp<'_>, raw_tx: &[u8]) -> Result<SignedTransaction, LedgerError> {
    let v: u64 = rlp.val_at(6).map_err(decode_err)?;

    // EIP-155 chain ID extraction
    let (chain_id, recovery) = match v {
        27 | 28 => (None, v - 27),
        v if v >= 35 => {
            let chain_id = (v - 35) / 2;
            (Some(chain_id), v - 35 - chain_id * 2)
        }
        v => {
            return Err(LedgerError::InvalidSignature(format!(
                "invalid v value {v}"
            )))
        }
    };

    let mut stream = RlpStream::new_list(if chain_id.is_some() { 9 } else { 6 });
    for index in 0..6 {
        stream.append_raw(rlp.at(index).map_err(decode_err)?.as_raw(), 1);
    }
    if let Some(chain_id) = chain_id {
        stream.append(&chain_id);
        stream.append_empty_data();
        stream.append_empty_data();
    }
    let signing_hash = keccak256(stream.out());

    let from = recover_sender(&signing_hash, rlp, 7, recovery)?;

    Ok(SignedTransaction {
        hash: keccak256(raw_tx),
        from,
        nonce: rlp.val_at(0).map_err(decode_err)?,
        gas_price: u128_at(rlp, 1)?,
        gas: rlp.val_at(2).map_err(decode_err)?,
        to: address_at(rlp, 3)?,
        value: u128_at(rlp, 4)?,
        data: rlp.val_at(5).map_err(decode_err)?,
        chain_id,
    })
}

fn decode_eip1559_transaction(raw_tx: &[u8]) -> Result<SignedTransaction, LedgerError> {
    // [chain_id, nonce, max_priority_fee, max_fee, gas_limit, to, value, data, access_list, y_parity, r, s]
    let rlp = Rlp::new(&raw_tx[1..]);
    let item_count = rlp.item_count().map_err(decode_err)?;
    if item_count != 12 {
        return Err(LedgerError::InvalidTransaction(format!(
            "unexpected RLP item count: {item_count} (expected 12)"
        )));
    }

    let mut stream = RlpStream::new_list(9);
    for index in 0..9 {
        stream.append_raw(rlp.at(index).map_err(decode_err)?.as_raw(), 1);
    }
    let mut payload = vec![EIP1559_TX_TYPE];
    payload.extend_from_slice(&stream.out());
    let signing_hash = keccak256(&payload);

    let y_parity: u64 = rlp.val_at(9).map_err(decode_err)?;
    let from = recover_sender(&signing_hash, &rlp, 10, y_parity)?;

    Ok(SignedTransaction {
        hash: keccak256(raw_tx),
        from,
        nonce: rlp.val_at(1).map_err(decode_err)?,
        gas_price: u128_at(&rlp, 3)?,
        gas: rlp.val_at(4).map_err(decode_err)?,
        to: address_at(&rlp, 5)?,
        value: u128_at(&rlp, 6)?,
        data: rlp.val_at(7).map_err(decode_err)?,
        chain_id: Some(rlp.val_at(0).map_err(decode_err)?),
    })
}

/// Recover the signer from the `r`/`s` pair starting at `r_index`.
fn recover_sender(
    signing_hash: &H256,
    rlp: &Rlp<'_>,
    r_index: usize,
    recovery: u64,
) -> Result<Address, LedgerError> {
    let r: Vec<u8> = rlp.val_at(r_index).map_err(decode_err)?;
    let s: Vec<u8> = rlp.val_at(r_index + 1).map_err(decode_err)?;
    if r.len() > 32 || s.len() > 32 {
        return Err(LedgerError::InvalidSignature(
            "signature component longer than 32 bytes".to_string(),
        ));
    }

    let mut compact = [0u8; 64];
    compact[32 - r.len()..32].copy_from_slice(&r);
    compact[64 - s.len()..].copy_from_slice(&s);

    // Only 0 and 1 are valid recovery ids.
    let recovery_id = match recovery {
        0 => RecoveryId::from_i32(0),
        1 => RecoveryId::from_i32(1),
        other => {
            return Err(LedgerError::InvalidSignature(format!(
                "invalid recovery id {other}"
            )))
        }
    }
    .map_err(|e| LedgerError::InvalidSignature(e.to_string()))?;
    let signature = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|e| LedgerError::InvalidSignature(e.to_string()))?;
    let message = Message::from_slice(signing_hash)
        .map_err(|e| LedgerError::InvalidSignature(e.to_string()))?;
    let public_key = SECP256K1
        .recover_ecdsa(&message, &signature)
        .map_err(|e| LedgerError::InvalidSignature(e.to_string()))?;

    Ok(public_key_to_address(&public_key))
}

/// Derive the account address of a public key.
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let hash = keccak256(&public_key.serialize_uncompressed()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Derive the account address of a secret key.
pub fn secret_key_to_address(secret_key: &SecretKey) -> Address {
    public_key_to_address(&PublicKey::from_secret_key(SECP256K1, secret_key))
}

/// Address of a contract created by `sender` at `nonce`.
pub fn contract_address(sender: &Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(&sender.to_vec());
    stream.append(&nonce);
    let hash = keccak256(stream.out());
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

impl LegacyTransaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&u128_to_bytes(self.gas_price));
        stream.append(&self.gas);
        match &self.to {
            Some(to) => stream.append(&to.to_vec()),
            None => stream.append_empty_data(),
        };
        stream.append(&u128_to_bytes(self.value));
        stream.append(&self.data);
    }

    /// Sign with `secret_key` and return the raw encoding. With a chain id the
    /// signature follows EIP-155.
    pub fn sign(&self, secret_key: &SecretKey, chain_id: Option<u64>) -> Result<Vec<u8>, LedgerError> {
        let mut unsigned = RlpStream::new_list(if chain_id.is_some() { 9 } else { 6 });
        self.append_fields(&mut unsigned);
        if let Some(chain_id) = chain_id {
            unsigned.append(&chain_id);
            unsigned.append_empty_data();
            unsigned.append_empty_data();
        }
        let signing_hash = keccak256(unsigned.out());

        let message = Message::from_slice(&signing_hash)
            .map_err(|e| LedgerError::InvalidSignature(e.to_string()))?;
        let (recovery_id, compact) = SECP256K1
            .sign_ecdsa_recoverable(&message, secret_key)
            .serialize_compact();
        let recovery = recovery_id.to_i32() as u64;
        let v = match chain_id {
            Some(chain_id) => chain_id * 2 + 35 + recovery,
            None => 27 + recovery,
        };

        let mut signed = RlpStream::new_list(9);
        self.append_fields(&mut signed);
        signed.append(&v);
        signed.append(&trim_leading_zeros(&compact[..32]).to_vec());
        signed.append(&trim_leading_zeros(&compact[32..]).to_vec());
        Ok(signed.out().to_vec())
    }
}

fn address_at(rlp: &Rlp<'_>, index: usize) -> Result<Option<Address>, LedgerError> {
    let bytes: Vec<u8> = rlp.val_at(index).map_err(decode_err)?;
    match bytes.len() {
        0 => Ok(None),
        20 => {
            let mut addr = [0u8; 20];
            addr.copy_from_slice(&bytes);
            Ok(Some(addr))
        }
        n => Err(LedgerError::InvalidTransaction(format!(
            "recipient must be 20 bytes, got {n}"
        ))),
    }
}

fn u128_at(rlp: &Rlp<'_>, index: usize) -> Result<u128, LedgerError> {
    let bytes: Vec<u8> = rlp.val_at(index).map_err(decode_err)?;
    bytes_to_u128(&bytes)
}

fn bytes_to_u128(bytes: &[u8]) -> Result<u128, LedgerError> {
    if bytes.len() > 16 {
        return Err(LedgerError::InvalidTransaction(format!(
            "integer field of {} bytes overflows u128",
            bytes.len()
        )));
    }
    Ok(bytes.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b)))
}

fn u128_to_bytes(value: u128) -> Vec<u8> {
    trim_leading_zeros(&value.to_be_bytes()).to_vec()
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
