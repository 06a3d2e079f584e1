use anyhow::{anyhow, bail, Context, Result};
use idstake_types::access::{Capability, RoleRegistry};
use idstake_types::custody::TokenLedger;
use idstake_types::params::{parse_units, DEFAULT_ROUND_DURATION};
use idstake_types::state::{LedgerSnapshot, LedgerState, Lifecycle};
use idstake_types::{parse_address, Address};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Deployment parameters, read from a JSON file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenesisConfig {
    /// Unix timestamp the ledger is deployed at; the first round opens here.
    pub deployed_at: u64,
    #[serde(default = "default_round_duration")]
    pub minimum_round_duration: u64,
    /// Hex account allowed to grant and revoke capabilities.
    pub admin: String,
    #[serde(default)]
    pub slashers: Vec<String>,
    #[serde(default)]
    pub releasers: Vec<String>,
    #[serde(default)]
    pub pausers: Vec<String>,
    /// Starting token balances held by the custodian, in decimal token units.
    #[serde(default)]
    pub balances: Vec<GenesisBalance>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenesisBalance {
    pub account: String,
    pub amount: String,
}

fn default_round_duration() -> u64 {
    DEFAULT_ROUND_DURATION
}

impl GenesisConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read genesis file {}", path.display()))?;
        serde_json::from_str(&content).context("Invalid genesis JSON")
    }

    /// A development deployment administered by `admin`, who also holds every capability.
    pub fn dev(admin: &Address, deployed_at: u64) -> Self {
        let admin = hex_account(admin);
        Self {
            deployed_at,
            minimum_round_duration: DEFAULT_ROUND_DURATION,
            admin: admin.clone(),
            slashers: vec![admin.clone()],
            releasers: vec![admin.clone()],
            pausers: vec![admin],
            balances: Vec::new(),
        }
    }
}

fn hex_account(address: &Address) -> String {
    idstake_types::format_address(address)
}

fn account(s: &str) -> Result<Address> {
    parse_address(s).map_err(|e| anyhow!("Invalid account {:?}: {}", s, e))
}

pub fn create_genesis_state(config: &GenesisConfig) -> Result<LedgerSnapshot> {
    if config.minimum_round_duration == 0 {
        bail!("minimum_round_duration must be positive");
    }

    // 1. Authorization
    let admin = account(&config.admin)?;
    let mut roles = RoleRegistry::new(admin);
    let grants = [
        (Capability::Slash, &config.slashers),
        (Capability::Release, &config.releasers),
        (Capability::Pause, &config.pausers),
    ];
    for (capability, holders) in grants {
        for holder in holders {
            roles
                .grant(&admin, capability, account(holder)?)
                .map_err(|e| anyhow!("{}", e))?;
        }
    }

    // 2. Token balances
    let mut custody = TokenLedger::default();
    for balance in &config.balances {
        let amount = parse_units(&balance.amount)
            .ok_or_else(|| anyhow!("Invalid amount {:?} for {}", balance.amount, balance.account))?;
        custody
            .credit(account(&balance.account)?, amount)
            .ok_or_else(|| anyhow!("Balance overflow for {}", balance.account))?;
    }

    // 3. Empty ledger opening round 1
    Ok(LedgerSnapshot {
        state: LedgerState::new(config.deployed_at, config.minimum_round_duration),
        lifecycle: Lifecycle::default(),
        roles,
        custody,
    })
}
