mod credentials;
mod session;

pub use credentials::CREDENTIAL_FORMAT_VERSION;
pub use credentials::CredentialStore;
pub use session::SessionProvider;
