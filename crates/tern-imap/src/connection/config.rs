//! Connection security modes and default ports.

/// Connection security mode.
///
/// STARTTLS upgrade is not supported; a connection is either plaintext
/// for its whole lifetime or TLS from the first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    Plain,
    /// Implicit TLS from the start (port 993). **Recommended.**
    #[default]
    Tls,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Plain => 143,
            Self::Tls => 993,
        }
    }

    /// Substitutes the default port when the caller passes 0.
    #[must_use]
    pub const fn resolve_port(self, port: u16) -> u16 {
        if port == 0 { self.default_port() } else { port }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::unreadable_literal
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::Plain.default_port(), 143);
        assert_eq!(Security::Tls.default_port(), 993);
    }

    #[test]
    fn test_resolve_port() {
        assert_eq!(Security::Tls.resolve_port(0), 993);
        assert_eq!(Security::Plain.resolve_port(0), 143);
        assert_eq!(Security::Tls.resolve_port(1993), 1993);
    }

    #[test]
    fn test_default_mode_is_tls() {
        assert_eq!(Security::default(), Security::Tls);
    }
}
