//! Resolution of a stable per-user identity for namespacing state.
//!
//! The host page is the only source of truth for who is signed in, and
//! it renders its account indicator late. The resolver retries on a
//! fixed backoff and falls back to a shared sentinel identity rather
//! than fail; an overlay scoped to "default" beats no overlay.

use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

/// Identity used when no account indicator could be found.
pub const DEFAULT_IDENTITY: &str = "default";

/// Namespace prefix for persisted per-user keys.
pub const KEY_PREFIX: &str = "gemfold_data_";

const DEFAULT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// One inspection of the host page for an authenticated-account
/// indicator. Implementations live at the host-integration boundary;
/// the resolver only cares whether an identity string came back.
pub trait AccountProbe {
    fn probe(&mut self) -> Option<String>;
}

impl<F> AccountProbe for F
where
    F: FnMut() -> Option<String>,
{
    fn probe(&mut self) -> Option<String> {
        self()
    }
}

/// Resolves the current user identity with bounded retries and caches
/// the answer for the rest of the process lifetime. Account switching
/// within a loaded session is not detected.
pub struct IdentityResolver<P> {
    probe: P,
    max_attempts: u32,
    retry_interval: Duration,
    cached: Option<String>,
}

impl<P: AccountProbe> IdentityResolver<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            cached: None,
        }
    }

    /// Override the retry budget (tests use a zero interval).
    pub fn with_retry(mut self, max_attempts: u32, retry_interval: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.retry_interval = retry_interval;
        self
    }

    /// The resolved identity, probing on first call only.
    pub fn resolve(&mut self) -> String {
        if let Some(id) = &self.cached {
            return id.clone();
        }

        for attempt in 1..=self.max_attempts {
            if let Some(id) = self.probe.probe() {
                debug!(attempt, "resolved user identity");
                self.cached = Some(id.clone());
                return id;
            }
            if attempt < self.max_attempts {
                thread::sleep(self.retry_interval);
            }
        }

        warn!("could not identify user, falling back to \"{DEFAULT_IDENTITY}\"");
        self.cached = Some(DEFAULT_IDENTITY.to_string());
        DEFAULT_IDENTITY.to_string()
    }

    /// Storage key for the resolved identity.
    pub fn storage_key(&mut self) -> String {
        let id = self.resolve();
        storage_key_for(&id)
    }
}

/// Pull an email address out of an account label shaped like
/// `"Google Account: Name (addr@host.tld)"`.
pub fn extract_email(label: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"\(([\w.-]+@[\w.-]+\.\w+)\)").expect("hardcoded pattern is valid")
    });
    re.captures(label).map(|c| c[1].to_string())
}

/// Build the persisted key for an identity, stripping everything
/// outside `[A-Za-z0-9@._-]` so the id is safe as a file stem.
pub fn storage_key_for(user_id: &str) -> String {
    let safe: String = user_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-'))
        .collect();
    format!("{KEY_PREFIX}{safe}")
}
