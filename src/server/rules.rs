use crate::{auth::AuthContext, proto::socks5::Command};

/// Decides whether a negotiated connection may proceed with a given command
/// against a given destination. Evaluated before *every* command dispatch,
/// including `BIND`/`UDP ASSOCIATE` which always end up replying "command
/// not supported" regardless — the rule check still runs first so a denial
/// is reported as such rather than as an unsupported command.
pub trait RuleSet: Send + Sync {
    fn allow(&self, auth: &AuthContext, command: Command, destination: &str) -> bool;
}

/// Allows every command unconditionally. The default ruleset.
pub struct PermitAll;

impl RuleSet for PermitAll {
    fn allow(&self, _auth: &AuthContext, _command: Command, _destination: &str) -> bool {
        true
    }
}

/// Allows only the commands listed, regardless of identity or destination.
pub struct PermitCommand {
    pub enable_connect: bool,
    pub enable_bind: bool,
    pub enable_associate: bool,
}

impl Default for PermitCommand {
    fn default() -> Self {
        PermitCommand {
            enable_connect: true,
            enable_bind: false,
            enable_associate: false,
        }
    }
}

impl RuleSet for PermitCommand {
    fn allow(&self, _auth: &AuthContext, command: Command, _destination: &str) -> bool {
        match command {
            Command::Connect => self.enable_connect,
            Command::Bind => self.enable_bind,
            Command::UdpAssociate => self.enable_associate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permit_all_allows_everything() {
        let ctx = AuthContext::anonymous();
        assert!(PermitAll.allow(&ctx, Command::Connect, "example.test:80"));
        assert!(PermitAll.allow(&ctx, Command::Bind, "example.test:80"));
    }

    #[test]
    fn permit_command_respects_configured_flags() {
        let ctx = AuthContext::anonymous();
        let rules = PermitCommand::default();
        assert!(rules.allow(&ctx, Command::Connect, "x"));
        assert!(!rules.allow(&ctx, Command::Bind, "x"));
        assert!(!rules.allow(&ctx, Command::UdpAssociate, "x"));
    }
}
