//! Hard-fork rule gates

/// Activation heights of the supported hard forks. `None` means the fork
/// never activates on this chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainConfig {
    /// Homestead activation block
    pub homestead_block: Option<u64>,
    /// EIP-150 activation block (63/64 rule, raised IO gas costs)
    pub eip150_block: Option<u64>,
    /// EIP-158 activation block (empty-account rule, contract nonce 1)
    pub eip158_block: Option<u64>,
    /// Byzantium activation block (REVERT, RETURNDATA*, STATICCALL)
    pub byzantium_block: Option<u64>,
}

impl ChainConfig {
    /// A chain that never forks past Frontier
    pub fn frontier() -> Self {
        Self::default()
    }

    /// A chain with Homestead active from genesis
    pub fn homestead() -> Self {
        Self {
            homestead_block: Some(0),
            ..Self::default()
        }
    }

    /// A chain with every supported fork active from genesis
    pub fn byzantium() -> Self {
        Self {
            homestead_block: Some(0),
            eip150_block: Some(0),
            eip158_block: Some(0),
            byzantium_block: Some(0),
        }
    }

    /// Whether Homestead rules apply at `block`
    pub fn is_homestead(&self, block: u64) -> bool {
        self.homestead_block.is_some_and(|b| block >= b)
    }

    /// Whether EIP-150 rules apply at `block`
    pub fn is_eip150(&self, block: u64) -> bool {
        self.eip150_block.is_some_and(|b| block >= b)
    }

    /// Whether EIP-158 rules apply at `block`
    pub fn is_eip158(&self, block: u64) -> bool {
        self.eip158_block.is_some_and(|b| block >= b)
    }

    /// Whether Byzantium rules apply at `block`
    pub fn is_byzantium(&self, block: u64) -> bool {
        self.byzantium_block.is_some_and(|b| block >= b)
    }

    /// Flag set for `block`, computed once per top-level call
    pub fn rules(&self, block: u64) -> Rules {
        Rules {
            is_homestead: self.is_homestead(block),
            is_eip150: self.is_eip150(block),
            is_eip158: self.is_eip158(block),
            is_byzantium: self.is_byzantium(block),
        }
    }
}

/// The fork flags active at a given block height
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rules {
    /// Homestead semantics (CREATE failure handling)
    pub is_homestead: bool,
    /// EIP-150 semantics (63/64 rule, raised gas costs)
    pub is_eip150: bool,
    /// EIP-158 semantics (empty accounts, exponent repricing)
    pub is_eip158: bool,
    /// Byzantium semantics (REVERT, RETURNDATA*, STATICCALL)
    pub is_byzantium: bool,
}
