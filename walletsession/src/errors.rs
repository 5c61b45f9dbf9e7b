use thiserror::Error;

/// EIP-1193 code for a request the user declined in the wallet UI.
pub const USER_REJECTED_CODE: i64 = 4001;
/// Code returned by `wallet_switchEthereumChain` when the wallet does not know the chain.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;
/// JSON-RPC code for a method the endpoint does not implement.
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// Failures reported by a wallet provider
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ProviderError {
    #[error("No wallet provider available")]
    NotAvailable,
    #[error("Provider error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code() == Some(USER_REJECTED_CODE)
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code() == Some(UNRECOGNIZED_CHAIN_CODE)
    }

    pub fn is_method_not_found(&self) -> bool {
        self.code() == Some(METHOD_NOT_FOUND_CODE)
    }
}

/// The controller's public error type. Every public operation resolves to one of these.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum SessionError {
    #[error("No wallet found. Install a browser wallet extension such as MetaMask and try again")]
    NoProvider,
    #[error("Request was rejected in the wallet")]
    UserRejected,
    #[error("Chain {0} is unknown to the wallet and cannot be added")]
    UnknownChain(u64),
    #[error("Wallet provider fault: {0}")]
    ProviderFault(String),
    #[error("No wallet is connected")]
    NotConnected,
    #[error("Another wallet request is already in progress")]
    Busy,
    #[error("Session was reset while the request was in flight")]
    Superseded,
}

impl From<ProviderError> for SessionError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotAvailable => Self::NoProvider,
            err if err.is_user_rejection() => Self::UserRejected,
            err => Self::ProviderFault(err.to_string()),
        }
    }
}

/// Errors raised while building a chain registry
#[derive(Debug, Eq, PartialEq, Error)]
pub enum RegistryError {
    #[error("Chain {0} is configured more than once")]
    DuplicateChain(u64),
    #[error("Chain {chain_id} has hex id '{hex}', expected '{expected}'")]
    HexMismatch {
        chain_id: u64,
        hex: String,
        expected: String,
    },
    #[error("Failed to load chain descriptors: {0}")]
    Load(String),
}

/// Errors from a persisted marker store
#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("Marker store I/O failed")]
    Io(#[from] std::io::Error),
    #[error("Marker store is not valid JSON")]
    Json(#[from] serde_json::Error),
}
