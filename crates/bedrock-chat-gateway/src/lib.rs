pub mod dispatch;
pub mod router;
pub mod server;
pub mod state;

pub use dispatch::{ChatDispatcher, InboundEnvelope, OutboundEnvelope};
pub use server::GatewayServer;
