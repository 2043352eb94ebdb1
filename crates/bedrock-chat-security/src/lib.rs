pub mod credentials;
pub mod redaction;
pub mod signing;

pub use credentials::{
    AwsCredentials, CredentialsProvider, EnvCredentialsProvider, StaticCredentialsProvider,
};
pub use redaction::{RedactingWriter, redact_secrets};
pub use signing::{RequestSigner, SignedHeaders};
