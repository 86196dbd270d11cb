/// Escalation ladder state definitions
///
/// This module defines the states a single fetch moves through while it
/// escalates from the requested mode towards more expensive strategies, the
/// modes an individual attempt can use, and the outcome of each attempt.
use std::fmt;

/// How a single attempt reaches the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Plain GET from this host
    Direct,

    /// GET through the bypass service running next to this host
    BypassLocal,

    /// GET through the bypass service running on the proxy host
    BypassViaProxy,

    /// Plain GET tunnelled through a proxy
    ProxyDirect,
}

impl FetchMode {
    /// Picks the mode for a request from its proxy and bypass switches
    pub fn from_flags(proxied: bool, bypass: bool) -> Self {
        match (proxied, bypass) {
            (false, false) => Self::Direct,
            (true, false) => Self::ProxyDirect,
            (false, true) => Self::BypassLocal,
            (true, true) => Self::BypassViaProxy,
        }
    }

    /// Returns true if the attempt goes through the bypass service
    pub fn uses_bypass(&self) -> bool {
        matches!(self, Self::BypassLocal | Self::BypassViaProxy)
    }

    /// Returns true if the attempt depends on a pool proxy
    pub fn uses_proxy(&self) -> bool {
        matches!(self, Self::ProxyDirect | Self::BypassViaProxy)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::BypassLocal => "bypass_local",
            Self::BypassViaProxy => "bypass_via_proxy",
            Self::ProxyDirect => "proxy_direct",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(Self::Direct),
            "bypass_local" => Some(Self::BypassLocal),
            "bypass_via_proxy" => Some(Self::BypassViaProxy),
            "proxy_direct" => Some(Self::ProxyDirect),
            _ => None,
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Position of a fetch on the escalation ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LadderState {
    // ===== Requested Mode =====
    /// First attempt in the requested mode
    Initial,

    /// The requested mode once more, unchanged
    RetrySameMode,

    // ===== Escalation =====
    /// Direct fetch through the current proxy (or none), bypass disabled
    ProxyDirectNoBypass,

    /// Bypass service on the current proxy host (or locally)
    ProxyBypass,

    /// Fail the current proxy over to the next selectable one
    SwitchProxy,

    // ===== Terminal =====
    /// Every step was tried; the fetch yields no content
    Exhausted,
}

/// Facts the transition function needs about the fetch in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderContext {
    /// Mode of the `Initial` attempt
    pub initial_mode: FetchMode,

    /// Whether the bypass service may be used at all
    pub bypass_enabled: bool,

    /// Whether a proxy is currently held for this fetch
    pub has_proxy: bool,

    /// Whether another `SwitchProxy` step is allowed
    pub can_switch: bool,

    /// Whether a proxy switch already happened during this fetch
    pub switched: bool,
}

impl LadderState {
    /// Returns true once no further attempt will be made
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// Returns true for states that issue a page request
    pub fn issues_request(&self) -> bool {
        matches!(
            self,
            Self::Initial | Self::RetrySameMode | Self::ProxyDirectNoBypass | Self::ProxyBypass
        )
    }

    /// Mode this state would fetch with, or `None` for action states
    pub fn mode(&self, ctx: &LadderContext) -> Option<FetchMode> {
        match self {
            Self::Initial | Self::RetrySameMode => Some(ctx.initial_mode),
            Self::ProxyDirectNoBypass => Some(FetchMode::from_flags(ctx.has_proxy, false)),
            Self::ProxyBypass => Some(FetchMode::from_flags(ctx.has_proxy, true)),
            Self::SwitchProxy | Self::Exhausted => None,
        }
    }

    /// The single transition function of the ladder
    ///
    /// Steps that would only repeat the initial mode a third time before any
    /// proxy switch are skipped, and so is `ProxyBypass` while the bypass
    /// service is disabled. `SwitchProxy` always leads back to
    /// `ProxyDirectNoBypass`; the driver decides whether the switch itself
    /// found a target.
    pub fn advance(self, ctx: &LadderContext) -> LadderState {
        let mut next = self.successor(ctx);
        while next.skipped(ctx) {
            next = next.successor(ctx);
        }
        next
    }

    fn successor(self, ctx: &LadderContext) -> LadderState {
        match self {
            Self::Initial => Self::RetrySameMode,
            Self::RetrySameMode => Self::ProxyDirectNoBypass,
            Self::ProxyDirectNoBypass => Self::ProxyBypass,
            Self::ProxyBypass if ctx.can_switch => Self::SwitchProxy,
            Self::ProxyBypass => Self::Exhausted,
            Self::SwitchProxy => Self::ProxyDirectNoBypass,
            Self::Exhausted => Self::Exhausted,
        }
    }

    fn skipped(&self, ctx: &LadderContext) -> bool {
        match self {
            Self::ProxyBypass if !ctx.bypass_enabled => true,
            Self::ProxyDirectNoBypass | Self::ProxyBypass => {
                !ctx.switched && self.mode(ctx) == Some(ctx.initial_mode)
            }
            _ => false,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::RetrySameMode => "retry_same_mode",
            Self::ProxyDirectNoBypass => "proxy_direct_no_bypass",
            Self::ProxyBypass => "proxy_bypass",
            Self::SwitchProxy => "switch_proxy",
            Self::Exhausted => "exhausted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "initial" => Some(Self::Initial),
            "retry_same_mode" => Some(Self::RetrySameMode),
            "proxy_direct_no_bypass" => Some(Self::ProxyDirectNoBypass),
            "proxy_bypass" => Some(Self::ProxyBypass),
            "switch_proxy" => Some(Self::SwitchProxy),
            "exhausted" => Some(Self::Exhausted),
            _ => None,
        }
    }

    /// Returns all ladder states in ladder order
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Initial,
            Self::RetrySameMode,
            Self::ProxyDirectNoBypass,
            Self::ProxyBypass,
            Self::SwitchProxy,
            Self::Exhausted,
        ]
    }
}

impl fmt::Display for LadderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Why a page came back as a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Cloudflare Turnstile verification page
    Turnstile,
}

/// Why an attempt did not produce usable content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Connection, timeout or body read error
    Network(String),

    /// Non-success HTTP status
    HttpStatus(u16),

    /// Body shorter than the minimum content size
    TooSmall(usize),

    /// The bypass service reported that it could not solve the page
    BypassFailure,

    /// Consent gate still in place after following its link
    ConsentGate,

    /// The mode needs a proxy and none is selectable
    NoProxy,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(e) => write!(f, "network error: {}", e),
            Self::HttpStatus(code) => write!(f, "HTTP {}", code),
            Self::TooSmall(len) => write!(f, "body too small ({} bytes)", len),
            Self::BypassFailure => write!(f, "bypass service failure"),
            Self::ConsentGate => write!(f, "consent gate not cleared"),
            Self::NoProxy => write!(f, "no proxy available"),
        }
    }
}

/// Outcome of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success,
    Blocked(BlockKind),
    Failed(FailureReason),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if a challenge page was served
    pub fn is_challenge(&self) -> bool {
        matches!(self, Self::Blocked(BlockKind::Turnstile))
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Blocked(BlockKind::Turnstile) => write!(f, "blocked (turnstile)"),
            Self::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// One rung climbed during a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    pub mode: FetchMode,
    pub state: LadderState,
    pub proxy_name: Option<String>,
    pub outcome: FetchOutcome,
}
