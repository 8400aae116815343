pub mod user;

pub use user::{
    ChangePasswordRequest, ForgotPasswordRequest, LocalCredentials, LoginRequest, ProviderLink,
    PublicLocal, PublicUser, RegisterRequest, ResetPasswordRequest, SetUsernameRequest, User,
    VerifyEmailRequest,
};
