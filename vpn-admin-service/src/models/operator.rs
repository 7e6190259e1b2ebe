//! Per-request operator context: which node we are and which modules are on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use utoipa::ToSchema;

/// Whether this node holds write authority over the roster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ServerRole {
    Primary,
    Replica,
}

impl ServerRole {
    pub fn is_primary(&self) -> bool {
        matches!(self, ServerRole::Primary)
    }
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ServerRole::Primary => write!(f, "primary"),
            ServerRole::Replica => write!(f, "replica"),
        }
    }
}

impl std::str::FromStr for ServerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary" | "master" => Ok(ServerRole::Primary),
            "replica" | "slave" => Ok(ServerRole::Replica),
            _ => Err(format!("Invalid server role: {}", s)),
        }
    }
}

/// Optional feature modules. `Core` is always on.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum Module {
    Core,
    PasswordAuth,
    PerClientRouting,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Module::Core => write!(f, "core"),
            Module::PasswordAuth => write!(f, "password-auth"),
            Module::PerClientRouting => write!(f, "per-client-routing"),
        }
    }
}

impl std::str::FromStr for Module {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "core" => Ok(Module::Core),
            "password-auth" | "passwdAuth" => Ok(Module::PasswordAuth),
            "per-client-routing" | "ccd" => Ok(Module::PerClientRouting),
            other => Err(format!("Unknown module: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSet(BTreeSet<Module>);

impl ModuleSet {
    pub fn new(modules: impl IntoIterator<Item = Module>) -> Self {
        let mut set: BTreeSet<Module> = modules.into_iter().collect();
        set.insert(Module::Core);
        Self(set)
    }

    pub fn core_only() -> Self {
        Self::new([])
    }

    pub fn contains(&self, module: Module) -> bool {
        self.0.contains(&module)
    }

    pub fn iter(&self) -> impl Iterator<Item = Module> + '_ {
        self.0.iter().copied()
    }

    /// Parse a comma separated list such as `core,passwdAuth,ccd`.
    pub fn parse_list(list: &str) -> Result<Self, String> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Module>, String>>()
            .map(Self::new)
    }
}

impl Default for ModuleSet {
    fn default() -> Self {
        Self::core_only()
    }
}

/// Who is asking, built fresh for every inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorContext {
    pub role: ServerRole,
    pub modules: ModuleSet,
}

impl OperatorContext {
    pub fn new(role: ServerRole, modules: ModuleSet) -> Self {
        Self { role, modules }
    }
}
