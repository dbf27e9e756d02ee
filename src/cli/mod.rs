//! Simulated vendor command-line interpreter.
//!
//! A [`CliSession`] binds one interpreter to one device: a modal state
//! machine ([`CliMode`]) plus the per-session context (current interface,
//! VLAN, OSPF process, ACL, BGP AS) needed to interpret short commands.
//! Sessions mutate devices exclusively through
//! [`DeviceStore::merge_config`](crate::device::DeviceStore::merge_config),
//! the same operation form-style callers use, so command edits and form
//! edits can interleave safely. Several sessions may exist at once, one per
//! open CLI window.

mod exec;
pub mod parse;
mod session;
pub mod tree;

pub use session::{CliSession, CompletionResult};

/// Interpreter mode; determines which command grammar is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CliMode {
    Exec,
    Privileged,
    Config,
    ConfigVlan,
    ConfigIf,
    ConfigSubIf,
    ConfigRouter,
    ConfigStdNacl,
    ConfigRouterBgp,
}

impl CliMode {
    /// Prompt suffix rendered after the hostname.
    pub fn prompt_suffix(self) -> &'static str {
        match self {
            CliMode::Exec => ">",
            CliMode::Privileged => "#",
            CliMode::Config => "(config)#",
            CliMode::ConfigVlan => "(config-vlan)#",
            CliMode::ConfigIf => "(config-if)#",
            CliMode::ConfigSubIf => "(config-subif)#",
            CliMode::ConfigRouter => "(config-router)#",
            CliMode::ConfigStdNacl => "(config-std-nacl)#",
            CliMode::ConfigRouterBgp => "(config-router-bgp)#",
        }
    }
}
