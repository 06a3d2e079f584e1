pub use ed25519_dalek::{SigningKey, VerifyingKey};
use anyhow::{anyhow, Result};
use ed25519_dalek::{Signature, Signer, Verifier};
use idstake_types::{Address, Transaction};
use rand::rngs::OsRng;

pub fn generate_keypair() -> SigningKey {
    let mut csprng = OsRng;
    SigningKey::generate(&mut csprng)
}

pub fn address_of(key: &SigningKey) -> Address {
    key.verifying_key().to_bytes()
}

pub fn sign(key: &SigningKey, message: &[u8]) -> Vec<u8> {
    let sig: Signature = key.sign(message);
    sig.to_bytes().to_vec()
}

/// Fills in `tx.signature` over its signing bytes.
pub fn sign_transaction(key: &SigningKey, tx: &mut Transaction) {
    tx.signature = sign(key, &tx.signing_bytes());
}

pub fn verify_signature(pubkey_bytes: &Address, message: &[u8], signature_bytes: &[u8]) -> Result<()> {
    let pubkey = VerifyingKey::from_bytes(pubkey_bytes).map_err(|_| anyhow!("Invalid public key"))?;

    let bytes: &[u8; 64] = signature_bytes
        .try_into()
        .map_err(|_| anyhow!("Invalid signature length"))?;
    let signature = Signature::from_bytes(bytes);

    pubkey.verify(message, &signature).map_err(|_| anyhow!("Signature verification failed"))?;
    Ok(())
}

pub fn verify_transaction(tx: &Transaction) -> Result<()> {
    verify_signature(&tx.sender, &tx.signing_bytes(), &tx.signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use idstake_types::StakingInstruction;

    #[test]
    fn signed_transaction_verifies_and_tamper_fails() {
        let key = generate_keypair();
        let mut tx = Transaction {
            sender: address_of(&key),
            nonce: 0,
            instruction: StakingInstruction::AdvanceRound,
            signature: vec![],
        };
        sign_transaction(&key, &mut tx);
        assert!(verify_transaction(&tx).is_ok());

        tx.nonce = 1;
        assert!(verify_transaction(&tx).is_err());

        tx.signature.truncate(10);
        assert!(verify_transaction(&tx).is_err());
    }
}
