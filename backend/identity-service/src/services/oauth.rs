/// Federated login through OAuth 2.0 providers
///
/// Supports Facebook, Google and Twitter. Each provider is a plugin registered
/// only when its client credentials are configured.
///
/// ## Flow
///
/// - `login` keeps a random state (and PKCE verifier when the provider needs
///   one) in the caller's session, then redirects to the provider
/// - `callback` checks the state, exchanges the code and fetches the profile
/// - the profile is linked to the logged-in user, or logs in the user already
///   linked to it, or creates a new user
use crate::config::{OAuthSettings, ProviderCredentials};
use crate::db::UserRepository;
use crate::error::{IdentityError, Result};
use crate::models::{ProviderLink, User};
use crate::security::{generate_token, pkce_pair};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Account details reported by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    pub id: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &str;

    fn uses_pkce(&self) -> bool;

    fn authorization_url(&self, state: &str, code_challenge: Option<&str>) -> String;

    /// Exchange an authorization code and read the account profile
    async fn fetch_profile(&self, code: &str, code_verifier: Option<&str>)
        -> Result<ExternalProfile>;
}

#[derive(Debug, Clone)]
struct ProviderEndpoints {
    authorize_url: &'static str,
    token_url: &'static str,
    profile_url: &'static str,
    scope: &'static str,
    pkce: bool,
    /// Send client credentials as HTTP basic auth instead of form fields
    basic_auth: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Generic authorization-code provider
pub struct OAuth2Provider {
    name: &'static str,
    endpoints: ProviderEndpoints,
    credentials: ProviderCredentials,
    http: Client,
}

impl OAuth2Provider {
    pub fn facebook(credentials: ProviderCredentials) -> Self {
        Self::new(
            "facebook",
            ProviderEndpoints {
                authorize_url: "https://www.facebook.com/v19.0/dialog/oauth",
                token_url: "https://graph.facebook.com/v19.0/oauth/access_token",
                profile_url: "https://graph.facebook.com/me?fields=id,email",
                scope: "email",
                pkce: false,
                basic_auth: false,
            },
            credentials,
        )
    }

    pub fn google(credentials: ProviderCredentials) -> Self {
        Self::new(
            "google",
            ProviderEndpoints {
                authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
                token_url: "https://oauth2.googleapis.com/token",
                profile_url: "https://www.googleapis.com/oauth2/v2/userinfo",
                scope: "openid email profile",
                pkce: false,
                basic_auth: false,
            },
            credentials,
        )
    }

    pub fn twitter(credentials: ProviderCredentials) -> Self {
        Self::new(
            "twitter",
            ProviderEndpoints {
                authorize_url: "https://twitter.com/i/oauth2/authorize",
                token_url: "https://api.twitter.com/2/oauth2/token",
                profile_url: "https://api.twitter.com/2/users/me",
                scope: "users.read tweet.read",
                pkce: true,
                basic_auth: true,
            },
            credentials,
        )
    }

    fn new(name: &'static str, endpoints: ProviderEndpoints, credentials: ProviderCredentials) -> Self {
        Self {
            name,
            endpoints,
            credentials,
            http: Client::new(),
        }
    }
}

fn provider_error(e: reqwest::Error) -> IdentityError {
    IdentityError::OAuthError(e.to_string())
}

#[async_trait]
impl IdentityProvider for OAuth2Provider {
    fn name(&self) -> &str {
        self.name
    }

    fn uses_pkce(&self) -> bool {
        self.endpoints.pkce
    }

    fn authorization_url(&self, state: &str, code_challenge: Option<&str>) -> String {
        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.endpoints.authorize_url,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(&self.credentials.callback_url),
            urlencoding::encode(self.endpoints.scope),
            urlencoding::encode(state),
        );
        if let Some(challenge) = code_challenge {
            url.push_str(&format!(
                "&code_challenge={}&code_challenge_method=S256",
                challenge
            ));
        }
        url
    }

    async fn fetch_profile(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<ExternalProfile> {
        let credentials = &self.credentials;
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", credentials.callback_url.as_str()),
            ("client_id", credentials.client_id.as_str()),
        ];
        if !self.endpoints.basic_auth {
            form.push(("client_secret", credentials.client_secret.as_str()));
        }
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }

        let mut request = self.http.post(self.endpoints.token_url).form(&form);
        if self.endpoints.basic_auth {
            request = request.basic_auth(&credentials.client_id, Some(&credentials.client_secret));
        }

        let token = request
            .send()
            .await
            .map_err(provider_error)?
            .error_for_status()
            .map_err(provider_error)?
            .json::<TokenResponse>()
            .await
            .map_err(provider_error)?;

        let profile = self
            .http
            .get(self.endpoints.profile_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(provider_error)?
            .error_for_status()
            .map_err(provider_error)?
            .json::<Value>()
            .await
            .map_err(provider_error)?;

        parse_profile(&profile)
    }
}

/// Read `id` and `email` from a profile body, unwrapping a `data` envelope
pub fn parse_profile(body: &Value) -> Result<ExternalProfile> {
    let profile = body.get("data").unwrap_or(body);
    let id = match profile.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            return Err(IdentityError::OAuthError(
                "Provider profile has no account id".to_string(),
            ))
        }
    };

    Ok(ExternalProfile {
        id,
        email: profile
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Enabled providers, keyed by name
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn IdentityProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &OAuthSettings) -> Self {
        let mut registry = Self::new();
        if let Some(credentials) = &settings.facebook {
            registry.register(Arc::new(OAuth2Provider::facebook(credentials.clone())));
        }
        if let Some(credentials) = &settings.google {
            registry.register(Arc::new(OAuth2Provider::google(credentials.clone())));
        }
        if let Some(credentials) = &settings.twitter {
            registry.register(Arc::new(OAuth2Provider::twitter(credentials.clone())));
        }
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn IdentityProvider>) {
        info!(provider = provider.name(), "Federated login provider enabled");
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn IdentityProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| IdentityError::UnknownProvider(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

/// Authorization in progress, kept in the session between login and callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAuthorization {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
}

impl PendingAuthorization {
    /// Start an authorization and return it with the provider redirect URL
    pub fn start(provider: &dyn IdentityProvider) -> (Self, String) {
        let state = generate_token();
        let (code_verifier, challenge) = if provider.uses_pkce() {
            let (verifier, challenge) = pkce_pair();
            (Some(verifier), Some(challenge))
        } else {
            (None, None)
        };
        let url = provider.authorization_url(&state, challenge.as_deref());
        (
            Self {
                state,
                code_verifier,
            },
            url,
        )
    }

    pub fn session_key(provider: &str) -> String {
        format!("oauth2:{}", provider)
    }
}

/// Maps provider accounts onto users
#[derive(Clone)]
pub struct FederatedLoginService {
    users: Arc<dyn UserRepository>,
}

impl FederatedLoginService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Resolve the user a provider account signs in as
    pub async fn resolve(
        &self,
        provider: &str,
        profile: ExternalProfile,
        current_user_id: Option<&str>,
    ) -> Result<User> {
        let linked = self.users.find_by_provider(provider, &profile.id).await?;
        let link = ProviderLink {
            id: profile.id,
            email: profile.email,
        };

        match (current_user_id, linked) {
            (Some(current), Some(owner)) => {
                if owner.id_string() == current {
                    Ok(owner)
                } else {
                    Err(IdentityError::ProviderAccountInUse(provider.to_string()))
                }
            }
            (Some(current), None) => {
                let mut user = self
                    .users
                    .find_by_id(current)
                    .await?
                    .ok_or(IdentityError::UserNotFound)?;
                user.providers.insert(provider.to_string(), link);
                self.users.update(&user).await?;
                info!(user_id = %current, provider, "Provider account linked");
                Ok(user)
            }
            (None, Some(owner)) => Ok(owner),
            (None, None) => {
                let account_id = link.id.clone();
                let mut user = User::new();
                user.providers.insert(provider.to_string(), link);
                match self.users.insert(&user).await {
                    Ok(()) => {
                        info!(user_id = %user.id_string(), provider, "User created from provider account");
                        Ok(user)
                    }
                    // A concurrent first login created the user in between
                    Err(IdentityError::ProviderAccountInUse(_)) => self
                        .users
                        .find_by_provider(provider, &account_id)
                        .await?
                        .ok_or_else(|| IdentityError::ProviderAccountInUse(provider.to_string())),
                    Err(err) => Err(err),
                }
            }
        }
    }
}
