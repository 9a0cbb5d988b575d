#[macro_use]
extern crate tracing;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sproc::procedure::application::{ProcedureBody, StoredProcedure};
use sproc::procedure::domain::SpResultSet;
use sproc::procedure::error::{BodyError, ParameterError};
use sproc::procedure::params::{Arguments, ParamHelper, ParamState};
use sproc::procedure::registry::ProcedureRegistry;
use sproc::transaction::memory::{InMemoryTransaction, InMemoryTransactionManager};
use sproc::value::Value;
use sproc::{config, tracer};
use std::env;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CLIENTS: usize = 8;
const DEFAULT_ACCOUNTS: usize = 16;
const DEFAULT_ROUNDS: usize = 50;
const DEFAULT_LOCK_TIMEOUT: u64 = 100; //ms
const INITIAL_BALANCE: i64 = 1000;
const MAX_AMOUNT: i64 = 50;

const ENV_WORKLOAD_CLIENTS: &str = "WORKLOAD_CLIENTS";
const ENV_WORKLOAD_ACCOUNTS: &str = "WORKLOAD_ACCOUNTS";
const ENV_WORKLOAD_ROUNDS: &str = "WORKLOAD_ROUNDS";
const ENV_WORKLOAD_LOCK_TIMEOUT: &str = "WORKLOAD_LOCK_TIMEOUT";

const PROC_TRANSFER: &str = "transfer";
const PROC_BALANCE: &str = "balance";

static CLIENTS: Lazy<usize> = Lazy::new(|| {
    env::var(ENV_WORKLOAD_CLIENTS)
        .map(|clients| clients.parse().unwrap())
        .unwrap_or(DEFAULT_CLIENTS)
});

static ACCOUNTS: Lazy<usize> = Lazy::new(|| {
    env::var(ENV_WORKLOAD_ACCOUNTS)
        .map(|accounts| accounts.parse().unwrap())
        .unwrap_or(DEFAULT_ACCOUNTS)
});

static ROUNDS: Lazy<usize> = Lazy::new(|| {
    env::var(ENV_WORKLOAD_ROUNDS)
        .map(|rounds| rounds.parse().unwrap())
        .unwrap_or(DEFAULT_ROUNDS)
});

static LOCK_TIMEOUT: Lazy<Duration> = Lazy::new(|| {
    env::var(ENV_WORKLOAD_LOCK_TIMEOUT)
        .map(|timeout| timeout.parse().unwrap())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(DEFAULT_LOCK_TIMEOUT))
});

fn account(index: usize) -> String {
    format!("account-{index}")
}

async fn read_balance(tx: &mut InMemoryTransaction, account: &str) -> Result<i64, BodyError> {
    tx.read(account)
        .await?
        .and_then(|value| value.as_integer())
        .ok_or_else(|| BodyError::Fatal(format!("account {account} not found")))
}

#[derive(Default)]
struct TransferParams {
    state: ParamState,
    from: String,
    to: String,
    amount: i64,
}

impl ParamHelper for TransferParams {
    type ResultSet = SpResultSet;

    fn prepare_parameters(&mut self, args: &[Value]) -> Result<(), ParameterError> {
        let mut args = Arguments::with_arity(args, 3)?;
        self.from = args.varchar()?;
        self.to = args.varchar()?;
        self.amount = args.integer()?;

        if self.amount <= 0 {
            return Err(ParameterError::Invalid(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }

        Ok(())
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn set_abort_reason(&mut self, reason: &str) {
        self.state.set_abort_reason(reason);
    }

    fn set_committed(&mut self, committed: bool) {
        self.state.set_committed(committed);
    }

    fn create_result_set(&self) -> SpResultSet {
        self.state.result_set()
    }
}

struct Transfer;

#[async_trait]
impl ProcedureBody<InMemoryTransaction, TransferParams> for Transfer {
    fn name(&self) -> &str {
        PROC_TRANSFER
    }

    async fn run(
        &self,
        tx: &mut InMemoryTransaction,
        params: &mut TransferParams,
    ) -> Result<(), BodyError> {
        let from = read_balance(tx, &params.from).await?;
        if from < params.amount {
            return Err(BodyError::Fatal(format!(
                "insufficient funds in {}",
                params.from
            )));
        }

        tx.write(&params.from, Value::Integer(from - params.amount))
            .await?;

        let to = read_balance(tx, &params.to).await?;
        tx.write(&params.to, Value::Integer(to + params.amount))
            .await?;

        Ok(())
    }
}

struct BalanceParams {
    state: ParamState,
    accounts: Vec<String>,
    total: i64,
}

impl Default for BalanceParams {
    fn default() -> Self {
        Self {
            state: ParamState::new(true),
            accounts: Vec::new(),
            total: 0,
        }
    }
}

impl ParamHelper for BalanceParams {
    type ResultSet = SpResultSet;

    fn prepare_parameters(&mut self, args: &[Value]) -> Result<(), ParameterError> {
        let mut args = Arguments::with_min_arity(args, 1)?;
        while args.remaining() > 0 {
            self.accounts.push(args.varchar()?);
        }

        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.state.read_only
    }

    fn set_committed(&mut self, committed: bool) {
        self.state.set_committed(committed);
    }

    fn create_result_set(&self) -> SpResultSet {
        self.state.result_set().with_field("total", self.total)
    }
}

/// Sums up the balance of every given account.
struct Balance;

#[async_trait]
impl ProcedureBody<InMemoryTransaction, BalanceParams> for Balance {
    fn name(&self) -> &str {
        PROC_BALANCE
    }

    async fn run(
        &self,
        tx: &mut InMemoryTransaction,
        params: &mut BalanceParams,
    ) -> Result<(), BodyError> {
        let mut total = 0;
        for account in &params.accounts {
            total += read_balance(tx, account).await?;
        }

        params.total = total;
        Ok(())
    }
}

fn new_registry(tx_mgr: Arc<InMemoryTransactionManager>) -> ProcedureRegistry {
    let mut registry = ProcedureRegistry::default();

    let transfer_tx_mgr = tx_mgr.clone();
    registry.register(PROC_TRANSFER, move || {
        StoredProcedure::new(transfer_tx_mgr.clone(), TransferParams::default(), Transfer)
    });

    registry.register(PROC_BALANCE, move || {
        StoredProcedure::new(tx_mgr.clone(), BalanceParams::default(), Balance)
    });

    registry
}

#[derive(Debug, Default)]
struct Stats {
    committed: usize,
    aborted: usize,
    rejected: usize,
}

async fn run_client(registry: Arc<ProcedureRegistry>, client: usize) -> Stats {
    let mut rng = StdRng::from_entropy();
    let mut stats = Stats::default();

    for _ in 0..*ROUNDS {
        let from = rng.gen_range(0..*ACCOUNTS);
        let to = (from + rng.gen_range(1..*ACCOUNTS)) % *ACCOUNTS;
        let amount = rng.gen_range(1..=MAX_AMOUNT);

        let args = vec![
            Value::from(account(from)),
            Value::from(account(to)),
            Value::from(amount),
        ];

        match registry.call(PROC_TRANSFER, &args).await {
            Ok(result_set) if result_set.is_committed() => stats.committed += 1,
            Ok(_) => stats.aborted += 1,
            Err(error) => {
                error!(client, error = error.to_string(), "calling transfer procedure");
                stats.rejected += 1;
            }
        }
    }

    stats
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if let Err(err) = dotenv::dotenv() {
        warn!(error = err.to_string(), "processing dotenv file",);
    }

    tracer::init()?;

    if *ACCOUNTS < 2 {
        return Err("a transfer workload requires at least two accounts".into());
    }

    let tx_mgr = Arc::new(InMemoryTransactionManager::new(
        *LOCK_TIMEOUT,
        *config::MAX_ACTIVE_TRANSACTIONS,
    ));
    tx_mgr.load((0..*ACCOUNTS).map(|index| (account(index), Value::Integer(INITIAL_BALANCE))));

    let registry = Arc::new(new_registry(tx_mgr.clone()));

    info!(
        clients = *CLIENTS,
        accounts = *ACCOUNTS,
        rounds = *ROUNDS,
        lock_timeout_ms = LOCK_TIMEOUT.as_millis() as u64,
        "running transfer workload"
    );

    let clients = (0..*CLIENTS).map(|client| tokio::spawn(run_client(registry.clone(), client)));

    let mut stats = Stats::default();
    for client in futures::future::join_all(clients).await {
        let client = client?;
        stats.committed += client.committed;
        stats.aborted += client.aborted;
        stats.rejected += client.rejected;
    }

    let accounts: Vec<Value> = (0..*ACCOUNTS).map(|index| account(index).into()).collect();
    let balance = registry.call(PROC_BALANCE, &accounts).await?;

    info!(
        committed = stats.committed,
        aborted = stats.aborted,
        rejected = stats.rejected,
        total = ?balance.field("total"),
        "transfer workload finished"
    );

    if balance.field("total") != Some(&Value::Integer(INITIAL_BALANCE * *ACCOUNTS as i64)) {
        error!("total balance is not preserved");
        return Err("total balance is not preserved".into());
    }

    Ok(())
}
