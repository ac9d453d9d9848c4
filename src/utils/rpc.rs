use async_trait::async_trait;
use solana_account_decoder::{UiAccountEncoding, UiDataSliceConfig};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use solana_sdk::{account::Account, commitment_config::CommitmentConfig, pubkey::Pubkey};

use crate::utils::error::Result;

/// The slice of the Solana JSON-RPC API the backfill path needs.
#[async_trait]
pub trait RpcProvider: Send + Sync {
    /// Addresses of every account owned by `program_id` whose data starts
    /// with `discriminator`. Account data is not transferred.
    async fn get_program_account_keys(
        &self,
        program_id: &Pubkey,
        discriminator: &[u8],
    ) -> Result<Vec<Pubkey>>;

    /// Fetches up to 100 accounts in one call, in request order.
    async fn get_multiple_accounts(&self, pubkeys: &[Pubkey]) -> Result<Vec<Option<Account>>>;

    /// Most recent signatures touching `address`, newest first.
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<RpcConfirmedTransactionStatusWithSignature>>;
}

pub struct DefaultRpcProvider {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl DefaultRpcProvider {
    /// Creates a provider connecting to `rpc_url` with `confirmed` commitment.
    pub fn new(rpc_url: &str) -> Self {
        Self::new_with_commitment(rpc_url, CommitmentConfig::confirmed())
    }

    /// Creates a provider with a specific commitment configuration.
    pub fn new_with_commitment(rpc_url: &str, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url.to_string(), commitment),
            commitment,
        }
    }
}

#[async_trait]
impl RpcProvider for DefaultRpcProvider {
    async fn get_program_account_keys(
        &self,
        program_id: &Pubkey,
        discriminator: &[u8],
    ) -> Result<Vec<Pubkey>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                0,
                discriminator,
            ))]),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                data_slice: Some(UiDataSliceConfig {
                    offset: 0,
                    length: 0,
                }),
                commitment: Some(self.commitment),
                ..RpcAccountInfoConfig::default()
            },
            ..RpcProgramAccountsConfig::default()
        };

        let accounts = self
            .client
            .get_program_accounts_with_config(program_id, config)
            .await?;
        Ok(accounts.into_iter().map(|(pubkey, _)| pubkey).collect())
    }

    async fn get_multiple_accounts(&self, pubkeys: &[Pubkey]) -> Result<Vec<Option<Account>>> {
        Ok(self
            .client
            .get_multiple_accounts_with_commitment(pubkeys, self.commitment)
            .await?
            .value)
    }

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<RpcConfirmedTransactionStatusWithSignature>> {
        let config = GetConfirmedSignaturesForAddress2Config {
            before: None,
            until: None,
            limit: Some(limit),
            commitment: Some(self.commitment),
        };
        Ok(self
            .client
            .get_signatures_for_address_with_config(address, config)
            .await?)
    }
}
