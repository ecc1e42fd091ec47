use std::collections::HashMap;
use std::fmt;

use dockwright_core::RegistryConfig;
use secrecy::{ExposeSecret, SecretString};

/// Docker Hub's login server, used when a repository names no host.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// A registry the final image may be pushed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTarget {
    pub name: String,
    /// Full repository path without tag, e.g. `ghcr.io/acme/webapp`
    pub repository: String,
    pub auth: AuthRequirement,
}

/// What has to be present before a target may be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequirement {
    /// Ambient credentials (e.g. a CI-provided token already logged in)
    None,
    /// Secret names for username and password
    Credentials {
        username: String,
        password: String,
        server: Option<String>,
    },
}

impl From<&RegistryConfig> for RegistryTarget {
    fn from(config: &RegistryConfig) -> Self {
        let auth = match &config.auth {
            Some(auth) => AuthRequirement::Credentials {
                username: auth.username.clone(),
                password: auth.password.clone(),
                server: auth.server.clone(),
            },
            None => AuthRequirement::None,
        };
        Self {
            name: config.name.clone(),
            repository: config.repository.clone(),
            auth,
        }
    }
}

impl RegistryTarget {
    /// Host part of the repository. The first path segment counts as a host
    /// when it looks like one (`ghcr.io`, `localhost:5000`).
    pub fn registry_host(&self) -> &str {
        match self.repository.split_once('/') {
            Some((first, _))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                first
            }
            _ => DEFAULT_REGISTRY,
        }
    }

    /// `repository:tag`
    pub fn reference(&self, tag: &str) -> String {
        format!("{}:{tag}", self.repository)
    }

    /// Decide whether this target can be published to with the given secrets.
    pub fn capability(&self, secrets: &Secrets) -> Capability {
        match &self.auth {
            AuthRequirement::None => Capability::Enabled { credentials: None },
            AuthRequirement::Credentials {
                username,
                password,
                server,
            } => {
                let user = secrets.get(username);
                let pass = secrets.get(password);
                match (user, pass) {
                    (Some(user), Some(pass)) => Capability::Enabled {
                        credentials: Some(Credentials {
                            server: server
                                .clone()
                                .unwrap_or_else(|| self.registry_host().to_owned()),
                            username: user.expose_secret().to_owned(),
                            password: pass.clone(),
                        }),
                    },
                    (user, pass) => {
                        let mut missing = Vec::new();
                        if user.is_none() {
                            missing.push(username.clone());
                        }
                        if pass.is_none() {
                            missing.push(password.clone());
                        }
                        Capability::Disabled { missing }
                    }
                }
            }
        }
    }
}

/// Outcome of the capability check for one target.
#[derive(Debug, Clone)]
pub enum Capability {
    Enabled { credentials: Option<Credentials> },
    Disabled { missing: Vec<String> },
}

impl Capability {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Capability::Enabled { .. })
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub server: String,
    pub username: String,
    pub password: SecretString,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Secret values available to this run, keyed by name.
///
/// Empty values are dropped: CI systems expose unset secrets as empty strings.
#[derive(Default, Clone)]
pub struct Secrets {
    values: HashMap<String, SecretString>,
}

impl Secrets {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k, SecretString::from(v)))
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&SecretString> {
        self.values.get(name)
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Secrets").field("names", &names).finish()
    }
}
