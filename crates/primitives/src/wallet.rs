//! A `Wallet` is a wrapper around the relayer signing key

use ethers::{
    prelude::k256::ecdsa::SigningKey,
    signers::{coins_bip39::English, LocalWallet, MnemonicBuilder, Signer},
};

/// Wrapper around the ethers wallet signing bundles on behalf of the relayer
#[derive(Clone, Debug)]
pub struct Wallet {
    /// Signing key of the wallet
    pub signer: ethers::signers::Wallet<SigningKey>,
}

impl Wallet {
    /// Create a new wallet from the given private key
    ///
    /// # Arguments
    /// * `key` - The private key in hex (with or without 0x prefix)
    /// * `chain_id` - The chain id of the blockchain network to be used
    ///
    /// # Returns
    /// * `Self` - A new `Wallet` instance
    pub fn from_key(key: &str, chain_id: u64) -> eyre::Result<Self> {
        let wallet: LocalWallet = key.trim_start_matches("0x").parse()?;
        Ok(Self { signer: wallet.with_chain_id(chain_id) })
    }

    /// Create a new wallet from the given mnemonic phrase
    ///
    /// # Arguments
    /// * `phrase` - The mnemonic phrase
    /// * `chain_id` - The chain id of the blockchain network to be used
    ///
    /// # Returns
    /// * `Self` - A new `Wallet` instance
    pub fn from_phrase(phrase: &str, chain_id: u64) -> eyre::Result<Self> {
        let wallet = MnemonicBuilder::<English>::default()
            .phrase(phrase)
            .derivation_path("m/44'/60'/0'/0/0")?
            .build()?;
        Ok(Self { signer: wallet.with_chain_id(chain_id) })
    }

    /// Address of the relayer signer
    pub fn address(&self) -> ethers::types::Address {
        self.signer.address()
    }
}
