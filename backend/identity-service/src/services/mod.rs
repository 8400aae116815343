/// Business logic layer for identity service
pub mod email;
pub mod local;
pub mod oauth;

pub use email::{AccountMailer, EmailService, Mailer, OutgoingMail};
pub use local::LocalAuthService;
pub use oauth::{
    ExternalProfile, FederatedLoginService, IdentityProvider, OAuth2Provider, PendingAuthorization,
    ProviderRegistry,
};
