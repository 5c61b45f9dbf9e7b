//! [`WalletProvider`] over a JSON-RPC endpoint.
//!
//! Works against anything that speaks the EIP-1193 method set over HTTP: a
//! wallet bridge, or a development node with unlocked accounts. Endpoints
//! that do not implement `eth_requestAccounts` fall back to `eth_accounts`.

use std::error::Error;
use std::io;

use alloy_primitives::{Address, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_transport::{TransportError, TransportErrorKind};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use url::Url;
use walletsession::registry::{AddChainParameters, ChainId};
use walletsession::{ProviderError, WalletProvider};

/// Marker value persisted for sessions opened through this provider
pub const RPC_WALLET_KIND: &str = "json-rpc";

#[derive(Debug, Clone)]
pub struct RpcWallet {
    provider: RootProvider,
    url: Url,
}

impl RpcWallet {
    pub fn new(url: Url) -> Self {
        Self::with_provider(RootProvider::new_http(url.clone()), url)
    }

    /// Wraps an already built provider; `url` is only used for logging
    pub fn with_provider(provider: RootProvider, url: Url) -> Self {
        Self { provider, url }
    }

    pub fn from_url_str(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Maps an alloy transport error onto the provider error taxonomy, keeping the RPC code
pub fn to_provider_error(err: TransportError) -> ProviderError {
    match err.as_error_resp() {
        Some(payload) => ProviderError::rpc(payload.code, payload.message.to_string()),
        None => ProviderError::Transport(err.to_string()),
    }
}

/// Whether the request never reached a wallet at all
fn is_unreachable(err: &TransportError) -> bool {
    match err.as_transport_err() {
        Some(TransportErrorKind::BackendGone) => true,
        Some(TransportErrorKind::Custom(inner)) => {
            let mut source: Option<&(dyn Error + 'static)> = Some(&**inner);
            while let Some(err) = source {
                if let Some(io_err) = err.downcast_ref::<io::Error>() {
                    return matches!(
                        io_err.kind(),
                        io::ErrorKind::ConnectionRefused
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::NotConnected
                            | io::ErrorKind::AddrNotAvailable
                            | io::ErrorKind::HostUnreachable
                            | io::ErrorKind::NetworkUnreachable
                    );
                }
                source = err.source();
            }
            false
        }
        _ => false,
    }
}

/// Account lookups double as wallet detection: an endpoint nobody answers on is no wallet
fn to_account_error(err: TransportError) -> ProviderError {
    if is_unreachable(&err) {
        debug!(error = %err, "wallet endpoint unreachable");
        ProviderError::NotAvailable
    } else {
        to_provider_error(err)
    }
}

fn switch_chain_params(hex_chain_id: &str) -> [serde_json::Value; 1] {
    [json!({ "chainId": hex_chain_id })]
}

#[async_trait]
impl WalletProvider for RpcWallet {
    fn kind(&self) -> &str {
        RPC_WALLET_KIND
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let requested = self
            .provider
            .raw_request::<_, Vec<Address>>("eth_requestAccounts".into(), ())
            .await
            .map_err(to_account_error);

        let accounts = match requested {
            Ok(accounts) => accounts,
            Err(err) if err.is_method_not_found() => {
                debug!(url = %self.url, "endpoint has no eth_requestAccounts, using eth_accounts");
                self.get_accounts().await?
            }
            Err(err) => return Err(err),
        };

        if accounts.is_empty() {
            return Err(ProviderError::NotAvailable);
        }
        Ok(accounts)
    }

    async fn get_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.provider
            .get_accounts()
            .await
            .map_err(to_account_error)
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ProviderError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(to_provider_error)
    }

    async fn get_chain_id(&self) -> Result<ChainId, ProviderError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(to_provider_error)
    }

    async fn switch_chain(&self, hex_chain_id: &str) -> Result<(), ProviderError> {
        self.provider
            .raw_request::<_, serde_json::Value>(
                "wallet_switchEthereumChain".into(),
                switch_chain_params(hex_chain_id),
            )
            .await
            .map(|_| ())
            .map_err(to_provider_error)
    }

    async fn add_chain(&self, params: &AddChainParameters) -> Result<(), ProviderError> {
        self.provider
            .raw_request::<_, serde_json::Value>(
                "wallet_addEthereumChain".into(),
                [params.clone()],
            )
            .await
            .map(|_| ())
            .map_err(to_provider_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_json_rpc::{ErrorPayload, RpcError};
    use alloy_rpc_client::RpcClient;
    use alloy_transport::mock::Asserter;
    use walletsession::registry::ChainRegistry;
    use walletsession::{SessionController, SessionError};

    fn error_response(code: i64, message: &'static str) -> TransportError {
        RpcError::ErrorResp(error_payload(code, message))
    }

    fn error_payload(code: i64, message: &'static str) -> ErrorPayload {
        ErrorPayload {
            code,
            message: message.into(),
            data: None,
        }
    }

    fn mocked_wallet() -> (RpcWallet, Asserter) {
        let asserter = Asserter::new();
        let provider = RootProvider::new(RpcClient::mocked(asserter.clone()));
        let url = Url::parse("http://wallet.invalid").unwrap();
        (RpcWallet::with_provider(provider, url), asserter)
    }

    fn account() -> Address {
        "0x1234567890123456789012345678901234567890".parse().unwrap()
    }

    #[test]
    fn test_error_response_keeps_code() {
        let err = to_provider_error(error_response(4902, "Unrecognized chain ID \"0x89\""));
        assert!(err.is_unrecognized_chain());
        assert_eq!(err, ProviderError::rpc(4902, "Unrecognized chain ID \"0x89\""));

        let err = to_provider_error(error_response(4001, "User rejected the request."));
        assert!(err.is_user_rejection());

        let err = to_provider_error(error_response(-32601, "the method eth_requestAccounts does not exist"));
        assert!(err.is_method_not_found());
    }

    #[test]
    fn test_transport_failure_is_not_an_rpc_error() {
        let err = to_provider_error(TransportErrorKind::custom_str("connection refused"));
        assert!(matches!(err, ProviderError::Transport(_)));
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_account_errors_detect_missing_wallet() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(
            to_account_error(TransportErrorKind::custom(refused)),
            ProviderError::NotAvailable
        );
        assert_eq!(
            to_account_error(TransportErrorKind::backend_gone()),
            ProviderError::NotAvailable
        );

        // delivered but failed: still a fault, not a missing wallet
        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "timed out");
        assert!(matches!(
            to_account_error(TransportErrorKind::custom(timed_out)),
            ProviderError::Transport(_)
        ));
        assert_eq!(
            to_account_error(error_response(4001, "User rejected the request.")),
            ProviderError::rpc(4001, "User rejected the request.")
        );
    }

    #[test]
    fn test_from_url_str() {
        let wallet = RpcWallet::from_url_str("http://127.0.0.1:8545").unwrap();
        assert_eq!(wallet.url().as_str(), "http://127.0.0.1:8545/");
        assert_eq!(wallet.kind(), RPC_WALLET_KIND);

        assert!(RpcWallet::from_url_str("not a url").is_err());
    }

    #[test]
    fn test_switch_chain_params_shape() {
        let params = serde_json::to_value(switch_chain_params("0x89")).unwrap();
        assert_eq!(params, json!([{ "chainId": "0x89" }]));
    }

    #[test]
    fn test_add_chain_params_shape() {
        let registry = ChainRegistry::builtin();
        let params = registry.get(137).and_then(|c| c.add_chain_params()).unwrap();

        let value = serde_json::to_value([params]).unwrap();
        let entry = &value[0];
        assert_eq!(entry["chainId"], "0x89");
        assert_eq!(entry["chainName"], "Polygon Mainnet");
        assert_eq!(entry["nativeCurrency"]["symbol"], "MATIC");
        assert_eq!(entry["nativeCurrency"]["decimals"], 18);
        assert!(entry["rpcUrls"].as_array().is_some_and(|urls| !urls.is_empty()));
        assert!(entry["blockExplorerUrls"].as_array().is_some());
    }

    #[tokio::test]
    async fn test_request_accounts_returns_approved_accounts() {
        let (wallet, asserter) = mocked_wallet();
        asserter.push_success(&vec![account()]);

        assert_eq!(wallet.request_accounts().await.unwrap(), vec![account()]);
    }

    #[tokio::test]
    async fn test_request_accounts_falls_back_to_eth_accounts() {
        let (wallet, asserter) = mocked_wallet();
        asserter.push_failure(error_payload(-32601, "the method eth_requestAccounts does not exist"));
        asserter.push_success(&vec![account()]);

        assert_eq!(wallet.request_accounts().await.unwrap(), vec![account()]);
    }

    #[tokio::test]
    async fn test_request_accounts_without_accounts_is_no_wallet() {
        let (wallet, asserter) = mocked_wallet();
        asserter.push_success(&Vec::<Address>::new());

        assert_eq!(
            wallet.request_accounts().await,
            Err(ProviderError::NotAvailable)
        );
    }

    #[tokio::test]
    async fn test_request_accounts_rejection_keeps_code() {
        let (wallet, asserter) = mocked_wallet();
        asserter.push_failure(error_payload(4001, "User rejected the request."));

        let err = wallet.request_accounts().await.unwrap_err();
        assert!(err.is_user_rejection());
    }

    #[tokio::test]
    async fn test_reads_decode_chain_and_balance() {
        let (wallet, asserter) = mocked_wallet();
        asserter.push_success(&"0x89");
        asserter.push_success(&U256::from(1_500_000_000_000_000_000u128));

        assert_eq!(wallet.get_chain_id().await.unwrap(), 137);
        assert_eq!(
            wallet.get_balance(account()).await.unwrap(),
            U256::from(1_500_000_000_000_000_000u128)
        );
    }

    #[tokio::test]
    async fn test_switch_chain_reports_unrecognized_chain() {
        let (wallet, asserter) = mocked_wallet();
        asserter.push_failure(error_payload(4902, "Unrecognized chain ID \"0x89\""));
        asserter.push_success(&serde_json::Value::Null);

        let err = wallet.switch_chain("0x89").await.unwrap_err();
        assert!(err.is_unrecognized_chain());
        assert_eq!(wallet.switch_chain("0x89").await, Ok(()));
    }

    #[tokio::test]
    async fn test_add_chain_accepts_null_result() {
        let (wallet, asserter) = mocked_wallet();
        asserter.push_success(&serde_json::Value::Null);

        let params = ChainRegistry::builtin()
            .get(43114)
            .and_then(|c| c.add_chain_params())
            .unwrap();
        assert_eq!(wallet.add_chain(&params).await, Ok(()));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_transport_error() {
        let wallet = RpcWallet::from_url_str("http://127.0.0.1:1").unwrap();
        let err = wallet.get_chain_id().await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_has_no_wallet() {
        let wallet = RpcWallet::from_url_str("http://127.0.0.1:1").unwrap();
        assert_eq!(wallet.get_accounts().await, Err(ProviderError::NotAvailable));

        let controller = SessionController::with_provider(std::sync::Arc::new(wallet));
        assert_eq!(controller.connect().await, Err(SessionError::NoProvider));
    }
}
