use git2::{Cred, CredentialType, RemoteCallbacks};
use std::env;
use std::path::PathBuf;
use tracing::debug;

/// Upper bound on credential callback invocations per operation.
///
/// libgit2 re-invokes the callback for as long as it keeps returning
/// credentials the server rejects.
const MAX_CREDENTIAL_ATTEMPTS: usize = 4;

/// Decorates the remote callbacks of every fetch and push.
///
/// Called once per network operation; implementations must be idempotent
/// and free of side effects.
pub trait TransportSetter: Send + Sync {
    fn set_transport(&self, callbacks: &mut RemoteCallbacks<'_>);
}

/// Credential chain used by the CLI.
///
/// Order: SSH agent, configured SSH key, HTTPS token from the environment,
/// then libgit2 default credentials.
#[derive(Debug, Clone, Default)]
pub struct CredentialTransport {
    pub ssh_key: Option<PathBuf>,
    pub ssh_passphrase_env: Option<String>,
    pub username: Option<String>,
    pub token_env: Option<String>,
}

impl TransportSetter for CredentialTransport {
    fn set_transport(&self, callbacks: &mut RemoteCallbacks<'_>) {
        let cfg = self.clone();
        let mut attempts = 0usize;
        callbacks.credentials(move |url, username_from_url, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str(&format!(
                    "authentication failed for {}",
                    url
                )));
            }
            let user = username_from_url
                .or(cfg.username.as_deref())
                .unwrap_or("git");
            debug!(url, user, attempts, "resolving credentials");

            if allowed.contains(CredentialType::SSH_KEY) {
                // Agent first, key file on the retry.
                if attempts == 1
                    && let Ok(c) = Cred::ssh_key_from_agent(user)
                {
                    return Ok(c);
                }
                if let Some(key) = &cfg.ssh_key {
                    let passphrase = cfg
                        .ssh_passphrase_env
                        .as_deref()
                        .and_then(|v| env::var(v).ok());
                    return Cred::ssh_key(user, None, key, passphrase.as_deref());
                }
            }
            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT)
                && let Some(token) = cfg.token_env.as_deref().and_then(|v| env::var(v).ok())
            {
                return Cred::userpass_plaintext(user, &token);
            }
            Cred::default()
        });
    }
}

/// Transport that adds nothing. Enough for local and anonymous remotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl TransportSetter for NoCredentials {
    fn set_transport(&self, _callbacks: &mut RemoteCallbacks<'_>) {}
}
