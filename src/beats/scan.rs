//! # Spend queries over the beat's block.
//!
//! Consumers often only care whether one of their outpoints was spent in the
//! announced block. These helpers do a linear scan over the block's
//! transactions and inputs; blocks are bounded, so no index is kept.
//!
//! The script-checking variant reconstructs the spent pkScript from the
//! spending input the way btcd's `ComputePkScript` does. Taproot spends are
//! the exception: the script cannot be derived from the witness alone, so
//! taproot queries match on the outpoint and skip the comparison.

use bitcoin::{
    hashes::Hash, script::Instruction, OutPoint, Script, ScriptBuf, ScriptHash, Transaction, TxIn,
    Txid, WPubkeyHash, WScriptHash,
};
use tracing::trace;

use crate::error::ScanError;

use super::Beat;

/// Details about an input found spending a watched outpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendDetail {
    /// The outpoint that was spent.
    pub spent_outpoint: OutPoint,
    /// Txid of the spending transaction.
    pub spender_tx_hash: Txid,
    /// The spending transaction itself.
    pub spending_tx: Transaction,
    /// Position of the spending input within the transaction.
    pub spender_input_index: u32,
    /// Height of the block the spend was confirmed in.
    pub spending_height: i32,
}

impl Beat {
    /// Queries the block for a transaction input spending `outpoint`.
    /// Returns the spend details of the first match, or `None`.
    pub fn has_outpoint_spent(&self, outpoint: OutPoint) -> Option<SpendDetail> {
        trace!(height = self.height(), %outpoint, "querying spending tx");

        for tx in &self.epoch().block.txdata {
            for (i, txin) in tx.input.iter().enumerate() {
                if txin.previous_output != outpoint {
                    continue;
                }

                return Some(self.spend_detail(tx, outpoint, i));
            }
        }

        None
    }

    /// Queries the block for a transaction input spending `outpoint` with
    /// the given `pk_script`.
    ///
    /// For taproot scripts the comparison is skipped and the outpoint alone
    /// decides the match. If the outpoint is found but the reconstructed
    /// script disagrees, [`ScanError::PkScriptMismatch`] is returned: the
    /// caller asked about a specific-script spend and got a different one, a
    /// protocol anomaly worth inspection.
    pub fn has_outpoint_spent_by_script(
        &self,
        outpoint: OutPoint,
        pk_script: &Script,
    ) -> Result<Option<SpendDetail>, ScanError> {
        trace!(
            height = self.height(),
            %outpoint,
            %pk_script,
            "querying spending tx by script",
        );

        // The spent pkScript cannot be derived from a taproot witness.
        let is_taproot = pk_script.is_p2tr();

        for tx in &self.epoch().block.txdata {
            for (i, txin) in tx.input.iter().enumerate() {
                if txin.previous_output != outpoint {
                    continue;
                }

                if !is_taproot {
                    let got = compute_pk_script(txin)?;
                    if got.as_script() != pk_script {
                        return Err(ScanError::PkScriptMismatch {
                            want: pk_script.to_owned(),
                            got,
                        });
                    }
                }

                return Ok(Some(self.spend_detail(tx, outpoint, i)));
            }
        }

        Ok(None)
    }

    fn spend_detail(&self, tx: &Transaction, outpoint: OutPoint, input_index: usize) -> SpendDetail {
        SpendDetail {
            spent_outpoint: outpoint,
            spender_tx_hash: tx.compute_txid(),
            spending_tx: tx.clone(),
            spender_input_index: input_index as u32,
            spending_height: self.height(),
        }
    }
}

/// Reconstructs the pkScript an input spends from its witness or signature
/// script.
///
/// Supported templates: P2WPKH (witness of `[sig, compressed pubkey]`),
/// P2WSH (witness script is the last witness element), and P2SH (redeem
/// script is the final data push of the signature script). Anything else is
/// [`ScanError::UnsupportedScriptType`].
fn compute_pk_script(txin: &TxIn) -> Result<ScriptBuf, ScanError> {
    if let Some(last) = txin.witness.last() {
        // A two-element witness ending in a compressed pubkey is a key
        // spend; everything else commits to a witness script.
        if txin.witness.len() == 2 && last.len() == 33 {
            return Ok(ScriptBuf::new_p2wpkh(&WPubkeyHash::hash(last)));
        }

        return Ok(ScriptBuf::new_p2wsh(&WScriptHash::hash(last)));
    }

    if txin.script_sig.is_empty() {
        return Err(ScanError::UnsupportedScriptType);
    }

    // Legacy path: the redeem script is the final data push.
    let mut redeem: Option<&[u8]> = None;
    for instruction in txin.script_sig.instructions() {
        match instruction {
            Ok(Instruction::PushBytes(push)) => redeem = Some(push.as_bytes()),
            Ok(Instruction::Op(_)) => {}
            Err(_) => return Err(ScanError::UnsupportedScriptType),
        }
    }

    let redeem = redeem.ok_or(ScanError::UnsupportedScriptType)?;
    Ok(ScriptBuf::new_p2sh(&ScriptHash::hash(redeem)))
}

#[cfg(test)]
mod tests {
    use bitcoin::{
        absolute::LockTime,
        block::{self, Header},
        opcodes::all::OP_PUSHNUM_1,
        script::Builder,
        transaction::Version,
        Block, BlockHash, CompactTarget, Sequence, TxMerkleNode, Witness,
    };

    use crate::chain::BlockEpoch;

    use super::*;

    const PUBKEY: [u8; 33] = [0x02; 33];
    const SIG: [u8; 71] = [0x30; 71];

    fn spending_tx(outpoint: OutPoint, witness: Witness) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![
                // Unrelated input ahead of the match, so the reported index
                // is meaningful.
                TxIn {
                    previous_output: OutPoint::new(Txid::all_zeros(), 7),
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                },
                TxIn {
                    previous_output: outpoint,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness,
                },
            ],
            output: vec![],
        }
    }

    fn beat_with_tx(tx: Transaction) -> Beat {
        let block = Block {
            header: Header {
                version: block::Version::TWO,
                prev_blockhash: BlockHash::all_zeros(),
                merkle_root: TxMerkleNode::all_zeros(),
                time: 0,
                bits: CompactTarget::from_consensus(0),
                nonce: 0,
            },
            txdata: vec![tx],
        };

        let (beat, _ack) = Beat::new(BlockEpoch::from_block(500_000, block));
        beat
    }

    fn watched_outpoint() -> OutPoint {
        OutPoint::new(Txid::all_zeros(), 1)
    }

    fn p2wpkh_witness() -> Witness {
        Witness::from_slice(&[&SIG[..], &PUBKEY[..]])
    }

    #[test]
    fn finds_spend_and_reports_input_index() {
        let outpoint = watched_outpoint();
        let tx = spending_tx(outpoint, p2wpkh_witness());
        let beat = beat_with_tx(tx.clone());

        let detail = beat.has_outpoint_spent(outpoint).unwrap();
        assert_eq!(detail.spent_outpoint, outpoint);
        assert_eq!(detail.spender_input_index, 1);
        assert_eq!(detail.spender_tx_hash, tx.compute_txid());
        assert_eq!(detail.spending_height, 500_000);
    }

    #[test]
    fn unspent_outpoint_returns_none() {
        let tx = spending_tx(watched_outpoint(), p2wpkh_witness());
        let beat = beat_with_tx(tx);

        let other = OutPoint::new(Txid::all_zeros(), 9);
        assert!(beat.has_outpoint_spent(other).is_none());
    }

    #[test]
    fn spent_by_matching_script() {
        let outpoint = watched_outpoint();
        let beat = beat_with_tx(spending_tx(outpoint, p2wpkh_witness()));

        let script = ScriptBuf::new_p2wpkh(&WPubkeyHash::hash(&PUBKEY));
        let detail = beat
            .has_outpoint_spent_by_script(outpoint, &script)
            .unwrap()
            .unwrap();
        assert_eq!(detail.spender_input_index, 1);
    }

    #[test]
    fn mismatching_script_is_an_error() {
        let outpoint = watched_outpoint();
        let beat = beat_with_tx(spending_tx(outpoint, p2wpkh_witness()));

        let unrelated = ScriptBuf::new_p2wpkh(&WPubkeyHash::hash(&[0x03; 33]));
        let err = beat
            .has_outpoint_spent_by_script(outpoint, &unrelated)
            .unwrap_err();
        assert!(matches!(err, ScanError::PkScriptMismatch { .. }));
    }

    #[test]
    fn taproot_query_skips_script_verification() {
        let outpoint = watched_outpoint();

        // Keyspend witness: a single 64-byte signature, from which no
        // pkScript could ever be reconstructed.
        let witness = Witness::from_slice(&[&[0xab; 64][..]]);
        let beat = beat_with_tx(spending_tx(outpoint, witness));

        let taproot = Builder::new()
            .push_opcode(OP_PUSHNUM_1)
            .push_slice([0u8; 32])
            .into_script();
        assert!(taproot.is_p2tr());

        let detail = beat
            .has_outpoint_spent_by_script(outpoint, &taproot)
            .unwrap()
            .unwrap();
        assert_eq!(detail.spent_outpoint, outpoint);
    }

    #[test]
    fn p2wsh_witness_reconstructs() {
        let outpoint = watched_outpoint();
        let witness_script = Builder::new().push_opcode(OP_PUSHNUM_1).into_script();
        let witness = Witness::from_slice(&[witness_script.as_bytes()]);
        let beat = beat_with_tx(spending_tx(outpoint, witness));

        let script = ScriptBuf::new_p2wsh(&WScriptHash::hash(witness_script.as_bytes()));
        assert!(beat
            .has_outpoint_spent_by_script(outpoint, &script)
            .unwrap()
            .is_some());
    }

    #[test]
    fn bare_input_is_unsupported() {
        let outpoint = watched_outpoint();
        let beat = beat_with_tx(spending_tx(outpoint, Witness::new()));

        let script = ScriptBuf::new_p2wpkh(&WPubkeyHash::hash(&PUBKEY));
        let err = beat
            .has_outpoint_spent_by_script(outpoint, &script)
            .unwrap_err();
        assert_eq!(err, ScanError::UnsupportedScriptType);
    }
}
