//! # Simulate Subcommand
//!
//! Replays a scripted scenario against a sale wired to in-process
//! collaborators: an [`Allowlist`], a membership [`Token`], a paused sale
//! [`Token`] and a [`ManualClock`]. Each step reports success or the
//! rejection kind; rejected steps do not stop the run.
//!
//! ## Scenario format
//!
//! ```yaml
//! start_at: "2026-02-28T00:00:00Z"   # optional, default one hour before start
//! steps:
//!   - action: approve
//!     accounts: ["0x…01", "0x…02"]
//!   - action: credit_membership
//!     account: "0x…01"
//!     amount: "10"
//!   - action: hand_over_minting
//!   - action: advance_to
//!     time: "2026-03-02T00:00:00Z"
//!   - action: buy
//!     caller: "0x…01"
//!     payment: "1"
//!   - action: finalize
//! ```
//!
//! Amounts are quoted decimal strings. Administrator steps act as the
//! configured administrator unless `caller` is given.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};

use presale_core::amount::decimal;
use presale_core::{Address, CoreError, ManualClock, SaleConfig, Timestamp, U256};
use presale_registry::{Allowlist, AllowlistUpdate, HoldingOracle, RegistryError, Token};
use presale_state::{Collaborators, Crowdsale, EventRecord, SaleError, SaleSnapshot};

use crate::check_config::load_config;

/// Arguments for `presale simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Sale configuration file (YAML).
    #[arg(long, value_name = "CONFIG")]
    pub config: PathBuf,

    /// Scenario file (YAML).
    #[arg(long, value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// Ignore `PRESALE_RATE` / `PRESALE_WALLET`.
    #[arg(long)]
    pub no_env: bool,

    /// Exit with status 1 if any step is rejected.
    #[arg(long)]
    pub strict: bool,

    /// Write the final report as JSON to this path instead of stdout.
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

// ─── Scenario ────────────────────────────────────────────────────────

/// A scripted run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// Initial clock reading. Defaults to one hour before the sale starts.
    #[serde(default)]
    pub start_at: Option<Timestamp>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("cannot parse scenario")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::from_yaml_str(&raw)
    }
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Allowlist `accounts`.
    Approve { accounts: Vec<Address> },
    /// Remove `accounts` from the allowlist.
    Revoke { accounts: Vec<Address> },
    /// Mint membership tokens to `account`.
    CreditMembership {
        account: Address,
        #[serde(with = "decimal")]
        amount: U256,
    },
    /// Transfer sale-token ownership from the administrator to the sale.
    HandOverMinting,
    /// Move the clock forward.
    Advance { seconds: u64 },
    /// Move the clock to an absolute instant.
    AdvanceTo { time: Timestamp },
    /// Purchase; `beneficiary` defaults to `caller`.
    Buy {
        caller: Address,
        beneficiary: Option<Address>,
        #[serde(with = "decimal")]
        payment: U256,
    },
    /// Value sent to the sale outside the purchase entry point.
    DirectPayment {
        from: Address,
        #[serde(with = "decimal")]
        payment: U256,
    },
    SetRate {
        caller: Option<Address>,
        #[serde(with = "decimal")]
        rate: U256,
    },
    Pause { caller: Option<Address> },
    Unpause { caller: Option<Address> },
    /// Premium pre-allocation.
    Premium {
        caller: Option<Address>,
        beneficiary: Address,
        #[serde(with = "decimal")]
        amount: U256,
    },
    Finalize { caller: Option<Address> },
    /// Sale-token transfer between holders.
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "decimal")]
        amount: U256,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "approve",
            Self::Revoke { .. } => "revoke",
            Self::CreditMembership { .. } => "credit_membership",
            Self::HandOverMinting => "hand_over_minting",
            Self::Advance { .. } => "advance",
            Self::AdvanceTo { .. } => "advance_to",
            Self::Buy { .. } => "buy",
            Self::DirectPayment { .. } => "direct_payment",
            Self::SetRate { .. } => "set_rate",
            Self::Pause { .. } => "pause",
            Self::Unpause { .. } => "unpause",
            Self::Premium { .. } => "premium",
            Self::Finalize { .. } => "finalize",
            Self::Transfer { .. } => "transfer",
        }
    }

    fn accounts(&self) -> Vec<Address> {
        match self {
            Self::Approve { accounts } | Self::Revoke { accounts } => accounts.clone(),
            Self::CreditMembership { account, .. } => vec![*account],
            Self::Buy {
                caller,
                beneficiary,
                ..
            } => std::iter::once(*caller).chain(*beneficiary).collect(),
            Self::Premium { beneficiary, .. } => vec![*beneficiary],
            Self::Transfer { from, to, .. } => vec![*from, *to],
            _ => Vec::new(),
        }
    }
}

// ─── Outcomes ────────────────────────────────────────────────────────

/// Why a step was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    /// Stable rejection name, e.g. `NOT_APPROVED`.
    pub kind: String,
    pub message: String,
}

impl From<SaleError> for StepFailure {
    fn from(e: SaleError) -> Self {
        Self {
            kind: e.kind().as_str().to_string(),
            message: e.to_string(),
        }
    }
}

impl From<RegistryError> for StepFailure {
    fn from(e: RegistryError) -> Self {
        let kind = match &e {
            RegistryError::NotOwner { .. } => "NOT_OWNER",
            RegistryError::TokenPaused => "TOKEN_PAUSED",
            RegistryError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            RegistryError::Overflow => "OVERFLOW",
        };
        Self {
            kind: kind.to_string(),
            message: e.to_string(),
        }
    }
}

impl From<CoreError> for StepFailure {
    fn from(e: CoreError) -> Self {
        Self {
            kind: "CLOCK".to_string(),
            message: e.to_string(),
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// 1-based position in the scenario.
    pub step: usize,
    pub action: String,
    /// Clock reading after the step.
    pub at: Timestamp,
    /// Summary on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

/// Sale-token balance of an account touched by the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub account: Address,
    #[serde(with = "decimal")]
    pub tokens: U256,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub outcomes: Vec<StepOutcome>,
    pub sale: SaleSnapshot,
    pub events: Vec<EventRecord>,
    pub balances: Vec<Balance>,
    pub allowlist_updates: Vec<AllowlistUpdate>,
    pub minting_authority: Address,
    pub token_paused: bool,
}

impl SimulationReport {
    /// Number of rejected steps.
    pub fn rejected(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_ok()).count()
    }
}

// ─── Simulation ──────────────────────────────────────────────────────

/// A sale plus the in-process collaborators it runs against.
#[derive(Debug)]
pub struct Simulation {
    sale: Crowdsale,
    clock: ManualClock,
    allowlist: Arc<Allowlist>,
    membership: Arc<Token>,
    token: Arc<Token>,
    touched: BTreeSet<Address>,
}

impl Simulation {
    /// Wire up a fresh sale. The administrator owns the allowlist and both
    /// tokens; the sale token starts paused.
    pub fn new(config: SaleConfig, start_at: Option<Timestamp>) -> Result<Self> {
        let administrator = config.administrator;
        let start_at = match start_at {
            Some(t) => t,
            None => Timestamp::from_epoch_secs(config.schedule.start_time().epoch_secs() - 3_600)?,
        };
        let clock = ManualClock::new(start_at);
        let allowlist = Arc::new(Allowlist::with_clock(administrator, Arc::new(clock.clone())));
        let membership = Arc::new(Token::unpaused(administrator));
        let token = Arc::new(Token::paused(administrator));

        let mut touched = BTreeSet::new();
        touched.insert(config.wallet);

        let collaborators = Collaborators {
            access: allowlist.clone(),
            holdings: membership.clone(),
            mint: token.clone(),
            clock: Arc::new(clock.clone()),
        };
        let sale = Crowdsale::new(config, collaborators)?;
        Ok(Self {
            sale,
            clock,
            allowlist,
            membership,
            token,
            touched,
        })
    }

    pub fn sale(&self) -> &Crowdsale {
        &self.sale
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn now(&self) -> Timestamp {
        presale_core::Clock::now(&self.clock)
    }

    /// Apply one step and describe what happened.
    pub fn apply(&mut self, step: &Step) -> Result<String, StepFailure> {
        self.touched.extend(step.accounts());
        let admin = self.sale.administrator();
        let sale_address = self.sale.config().sale_address;
        match step {
            Step::Approve { accounts } => {
                let update = self.allowlist.add_approved(&admin, accounts)?;
                Ok(format!("{} account(s) approved", update.addresses.len()))
            }
            Step::Revoke { accounts } => {
                let update = self.allowlist.remove_approved(&admin, accounts)?;
                Ok(format!("{} account(s) revoked", update.addresses.len()))
            }
            Step::CreditMembership { account, amount } => {
                self.membership.mint(&admin, account, *amount)?;
                Ok(format!(
                    "membership balance {}",
                    self.membership.balance_of(account)
                ))
            }
            Step::HandOverMinting => {
                self.token.transfer_ownership(&admin, &sale_address)?;
                Ok(format!("minting authority {sale_address}"))
            }
            Step::Advance { seconds } => {
                let now = self.clock.advance(*seconds)?;
                Ok(format!("now {now}, {}", self.sale.phase()))
            }
            Step::AdvanceTo { time } => {
                self.clock.set(*time)?;
                Ok(format!("now {time}, {}", self.sale.phase()))
            }
            Step::Buy {
                caller,
                beneficiary,
                payment,
            } => {
                let beneficiary = beneficiary.unwrap_or(*caller);
                let receipt = self.sale.buy_tokens(caller, &beneficiary, *payment)?;
                let mut detail = format!(
                    "{} tokens in phase {}",
                    receipt.granted_tokens, receipt.phase
                );
                if receipt.is_partial() {
                    detail.push_str(&format!(", {} refunded", receipt.refunded_payment));
                }
                Ok(detail)
            }
            Step::DirectPayment { from, payment } => {
                self.sale.receive_payment(from, *payment)?;
                Ok("accepted".to_string())
            }
            Step::SetRate { caller, rate } => {
                self.sale.set_rate(&caller.unwrap_or(admin), *rate)?;
                Ok(format!("rate {}", self.sale.rate()))
            }
            Step::Pause { caller } => {
                self.sale.pause(&caller.unwrap_or(admin))?;
                Ok("paused".to_string())
            }
            Step::Unpause { caller } => {
                self.sale.unpause(&caller.unwrap_or(admin))?;
                Ok("unpaused".to_string())
            }
            Step::Premium {
                caller,
                beneficiary,
                amount,
            } => {
                self.sale
                    .allocate_to_premium_holder(&caller.unwrap_or(admin), beneficiary, *amount)?;
                Ok(format!("{amount} tokens allocated"))
            }
            Step::Finalize { caller } => {
                let unsold = self.sale.finalize(&caller.unwrap_or(admin))?;
                Ok(format!("{unsold} unsold tokens minted to the wallet"))
            }
            Step::Transfer { from, to, amount } => {
                self.token.transfer(from, to, *amount)?;
                Ok(format!("{amount} tokens transferred"))
            }
        }
    }

    /// Apply every step of `scenario` in order.
    pub fn run(&mut self, scenario: &Scenario) -> Vec<StepOutcome> {
        scenario
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let result = self.apply(step);
                let outcome = StepOutcome {
                    step: i + 1,
                    action: step.name().to_string(),
                    at: self.now(),
                    detail: result.as_ref().ok().cloned(),
                    failure: result.err(),
                };
                match &outcome.failure {
                    None => tracing::debug!(
                        step = outcome.step,
                        action = %outcome.action,
                        "step applied"
                    ),
                    Some(f) => tracing::debug!(
                        step = outcome.step,
                        action = %outcome.action,
                        kind = %f.kind,
                        "step rejected"
                    ),
                }
                outcome
            })
            .collect()
    }

    /// Summarize the current state after `outcomes`.
    pub fn report(&self, outcomes: Vec<StepOutcome>) -> SimulationReport {
        let balances = self
            .touched
            .iter()
            .map(|account| Balance {
                account: *account,
                tokens: self.token.balance_of(account),
            })
            .collect();
        SimulationReport {
            outcomes,
            sale: self.sale.snapshot(),
            events: self.sale.events().records().to_vec(),
            balances,
            allowlist_updates: self.allowlist.updates(),
            minting_authority: self.token.owner(),
            token_paused: self.token.is_paused(),
        }
    }
}

/// Execute the simulate subcommand.
///
/// Returns exit code: 0 on completion, 1 in `--strict` mode when a step
/// was rejected.
pub fn run_simulate(args: &SimulateArgs) -> Result<u8> {
    let config = load_config(&args.config, !args.no_env)?;
    let scenario = Scenario::load(&args.scenario)?;
    tracing::info!(
        sale_id = %config.sale_id,
        steps = scenario.steps.len(),
        "starting simulation"
    );

    let mut simulation = Simulation::new(config, scenario.start_at)?;
    let outcomes = simulation.run(&scenario);
    for outcome in &outcomes {
        match (&outcome.detail, &outcome.failure) {
            (_, Some(f)) => eprintln!(
                "[{:>3}] {:<18} {}: {}",
                outcome.step, outcome.action, f.kind, f.message
            ),
            (Some(d), None) => {
                eprintln!("[{:>3}] {:<18} ok: {d}", outcome.step, outcome.action)
            }
            (None, None) => eprintln!("[{:>3}] {:<18} ok", outcome.step, outcome.action),
        }
    }

    let report = simulation.report(outcomes);
    let rejected = report.rejected();
    let json = serde_json::to_string_pretty(&report)?;
    match &args.report {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("cannot write report to {}", path.display()))?,
        None => println!("{json}"),
    }

    tracing::info!(rejected, "simulation complete");
    if args.strict && rejected > 0 {
        return Ok(1);
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use presale_core::{Rate, SaleSchedule};

    const DAY: u64 = 86_400;
    const START: i64 = 1_800_000_000;

    fn admin() -> Address {
        Address::with_last_byte(0xa1)
    }
    fn sale_address() -> Address {
        Address::with_last_byte(0xc5)
    }
    fn wallet() -> Address {
        Address::with_last_byte(0xf0)
    }
    fn buyer() -> Address {
        Address::with_last_byte(0x01)
    }

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_epoch_secs(secs).unwrap()
    }

    fn make_config() -> SaleConfig {
        let day = DAY as i64;
        let schedule = SaleSchedule::new(
            at(START),
            vec![at(START + 30 * day), at(START + 50 * day), at(START + 70 * day)],
        )
        .unwrap();
        SaleConfig::new(
            admin(),
            sale_address(),
            wallet(),
            schedule,
            Rate::from_u64(10).unwrap(),
            U256::from(1_000u64),
        )
        .unwrap()
    }

    fn buy(payment: u64) -> Step {
        Step::Buy {
            caller: buyer(),
            beneficiary: None,
            payment: U256::from(payment),
        }
    }

    #[test]
    fn test_scenario_yaml_parses() {
        let yaml = r#"
steps:
  - action: approve
    accounts: ["0x0000000000000000000000000000000000000001"]
  - action: credit_membership
    account: "0x0000000000000000000000000000000000000001"
    amount: "10"
  - action: hand_over_minting
  - action: advance
    seconds: 7200
  - action: buy
    caller: "0x0000000000000000000000000000000000000001"
    payment: "1"
  - action: pause
  - action: finalize
"#;
        let scenario = Scenario::from_yaml_str(yaml).unwrap();
        assert_eq!(scenario.steps.len(), 7);
        assert_eq!(scenario.steps[2], Step::HandOverMinting);
        assert_eq!(scenario.steps[4], buy(1));
        assert_eq!(scenario.steps[5], Step::Pause { caller: None });
        assert!(scenario.start_at.is_none());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let yaml = "steps:\n  - action: teleport\n";
        assert!(Scenario::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_default_clock_is_before_start() {
        let sim = Simulation::new(make_config(), None).unwrap();
        assert_eq!(sim.now(), at(START - 3_600));
    }

    #[test]
    fn test_run_reports_purchase_and_rejections() {
        let mut sim = Simulation::new(make_config(), None).unwrap();
        let scenario = Scenario {
            start_at: None,
            steps: vec![
                Step::Approve {
                    accounts: vec![buyer()],
                },
                Step::CreditMembership {
                    account: buyer(),
                    amount: U256::from(10u64),
                },
                buy(1),
                Step::HandOverMinting,
                Step::Advance { seconds: 7_200 },
                buy(1),
                Step::DirectPayment {
                    from: buyer(),
                    payment: U256::from(1u64),
                },
            ],
        };
        let outcomes = sim.run(&scenario);
        assert_eq!(outcomes.len(), 7);
        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[2].failure.as_ref().unwrap().kind, "SALE_NOT_OPEN");
        assert!(outcomes[5].is_ok());
        assert_eq!(
            outcomes[6].failure.as_ref().unwrap().kind,
            "DIRECT_PAYMENT_REJECTED"
        );

        let report = sim.report(outcomes);
        assert_eq!(report.rejected(), 2);
        assert_eq!(report.sale.tokens_issued, U256::from(10u64));
        let buyer_balance = report.balances.iter().find(|b| b.account == buyer()).unwrap();
        assert_eq!(buyer_balance.tokens, U256::from(10u64));
        assert_eq!(report.minting_authority, sale_address());
        assert_eq!(report.allowlist_updates.len(), 1);
        assert_eq!(report.allowlist_updates[0].timestamp, at(START - 3_600));
    }

    #[test]
    fn test_finalize_returns_minting_authority() {
        let mut sim = Simulation::new(make_config(), None).unwrap();
        let scenario = Scenario {
            start_at: None,
            steps: vec![
                Step::HandOverMinting,
                Step::AdvanceTo {
                    time: at(START + 71 * DAY as i64),
                },
                Step::Finalize { caller: None },
                Step::Finalize { caller: None },
            ],
        };
        let outcomes = sim.run(&scenario);
        assert!(outcomes[2].is_ok());
        assert_eq!(outcomes[3].failure.as_ref().unwrap().kind, "ALREADY_FINALIZED");

        let report = sim.report(outcomes);
        assert_eq!(report.minting_authority, admin());
        assert!(report.token_paused);
        let wallet_balance = report.balances.iter().find(|b| b.account == wallet()).unwrap();
        assert_eq!(wallet_balance.tokens, U256::from(1_000u64));
    }

    #[test]
    fn test_registry_failures_are_reported() {
        let mut sim = Simulation::new(make_config(), None).unwrap();
        let err = sim
            .apply(&Step::Transfer {
                from: buyer(),
                to: wallet(),
                amount: U256::from(1u64),
            })
            .unwrap_err();
        assert_eq!(err.kind, "TOKEN_PAUSED");

        let err = sim
            .apply(&Step::AdvanceTo {
                time: at(START - 7_200),
            })
            .unwrap_err();
        assert_eq!(err.kind, "CLOCK");
    }
}
