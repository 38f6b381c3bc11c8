pub mod correlation;
pub mod credentials;
pub mod manager;
pub mod store;

pub use correlation::{CorrelationReport, Correlator, InboundEvent, InboundMessage, Injection};
pub use credentials::FileCredentialSource;
pub use manager::{BridgeError, Delivery, SendOutcome, SessionManager, SessionSeed};
pub use store::FileStateStore;
