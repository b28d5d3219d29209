use crate::settings::AppConfig;
use anyhow::{Context, Result};
use clap::Subcommand;
use namereg_registry::{
    Clock, Domain, FeeKind, Identity, KeyDeriver, RegisterRequest, RegistryService, RegistryStore,
    RenewRequest, SetDataRequest, SystemClock, TransferRequest,
};
use namereg_storage::SledRegistryStore;
use namereg_treasury::{InMemoryAccountLedger, LedgerTreasury};
use serde_json::json;
use std::convert::Infallible;
use std::io::Write;
use std::str::FromStr;
use tracing::info;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Register a new name for one year
    Register {
        name: String,
        /// Owner of the new record (hex identity or label)
        #[arg(long, value_parser = parse_identity)]
        caller: Identity,
        /// Account paying the fee, defaults to the caller
        #[arg(long, value_parser = parse_identity)]
        payer: Option<Identity>,
    },
    /// Replace the data stored under a name
    SetData {
        name: String,
        data: String,
        #[arg(long, value_parser = parse_identity)]
        caller: Identity,
    },
    /// Transfer a name to a new owner
    Transfer {
        name: String,
        #[arg(value_parser = parse_identity)]
        new_owner: Identity,
        #[arg(long, value_parser = parse_identity)]
        caller: Identity,
    },
    /// Extend a name by one year
    Renew {
        name: String,
        #[arg(long, value_parser = parse_identity)]
        caller: Identity,
        #[arg(long, value_parser = parse_identity)]
        payer: Option<Identity>,
    },
    /// Show the record of a name
    Get { name: String },
    /// List every record, optionally only those of one owner
    List {
        #[arg(long, value_parser = parse_identity)]
        owner: Option<Identity>,
    },
    /// Walk through a full lifecycle against a throwaway store
    Demo,
}

/// A 64-character hex string is taken as-is; anything else is a label that
/// is hashed into an identity.
pub fn parse_identity(value: &str) -> std::result::Result<Identity, Infallible> {
    Ok(Identity::from_str(value).unwrap_or_else(|_| Identity::from_label(value)))
}

type CliTreasury = LedgerTreasury<InMemoryAccountLedger>;

fn treasury(config: &AppConfig, funded: &[Identity]) -> CliTreasury {
    let ledger = InMemoryAccountLedger::funded(funded, config.faucet_balance);
    LedgerTreasury::new(ledger, config.treasury_account, config.price_schedule)
}

fn print_json<W: Write>(out: &mut W, value: &serde_json::Value) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn receipt_json(treasury: &CliTreasury, kind: FeeKind, payer: &Identity) -> Result<serde_json::Value> {
    Ok(json!({
        "kind": kind,
        "amount": treasury.price(kind),
        "payer": payer,
        "payer_balance": treasury.balance(payer)?,
    }))
}

/// Execute `command` against the store in `config.data_dir`
pub fn run<W: Write>(command: Commands, config: &AppConfig, out: &mut W) -> Result<()> {
    if command == Commands::Demo {
        return demo(config, out);
    }

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("failed to create data dir {}", config.data_dir.display())
    })?;
    let store = SledRegistryStore::open(config.db_path())
        .with_context(|| format!("failed to open store at {}", config.db_path().display()))?;
    let result = execute(command, config, &store, &SystemClock, out);
    store.flush()?;
    result
}

fn execute<S, C, W>(command: Commands, config: &AppConfig, store: &S, clock: &C, out: &mut W) -> Result<()>
where
    S: RegistryStore,
    C: Clock,
    W: Write,
{
    let deriver = KeyDeriver::new(config.registry_id);
    let funded: Vec<Identity> = match &command {
        Commands::Register { caller, payer, .. } | Commands::Renew { caller, payer, .. } => {
            vec![payer.unwrap_or(*caller)]
        }
        _ => Vec::new(),
    };
    let treasury = treasury(config, &funded);
    let service = RegistryService::new(store, &treasury, clock).with_deriver(deriver);

    match command {
        Commands::Register {
            name,
            caller,
            payer,
        } => {
            let payer = payer.unwrap_or(caller);
            let domain = service.register(RegisterRequest::new(name, caller).paid_by(payer))?;
            print_json(
                out,
                &json!({
                    "domain": domain,
                    "fee": receipt_json(&treasury, FeeKind::Registration, &payer)?,
                }),
            )?;
        }
        Commands::SetData { name, data, caller } => {
            let domain = service.set_data(SetDataRequest::new(name, caller, data))?;
            print_json(out, &json!({ "domain": domain }))?;
        }
        Commands::Transfer {
            name,
            new_owner,
            caller,
        } => {
            let domain = service.transfer(TransferRequest::new(name, caller, new_owner))?;
            print_json(out, &json!({ "domain": domain }))?;
        }
        Commands::Renew {
            name,
            caller,
            payer,
        } => {
            let payer = payer.unwrap_or(caller);
            let domain = service.renew(RenewRequest::new(name, caller).paid_by(payer))?;
            print_json(
                out,
                &json!({
                    "domain": domain,
                    "fee": receipt_json(&treasury, FeeKind::Renewal, &payer)?,
                }),
            )?;
        }
        Commands::Get { name } => {
            let domain = service.get(&name)?;
            let now = clock.now();
            let expired = domain.is_expired(now);
            let remaining = domain.remaining(now);
            print_json(
                out,
                &json!({
                    "key": service.key_for(&name).to_string(),
                    "domain": domain,
                    "expired": expired,
                    "remaining_secs": remaining,
                }),
            )?;
        }
        Commands::List { owner } => {
            let domains: Vec<Domain> = match owner {
                Some(owner) => service.list_owned_by(&owner)?,
                None => service.list()?,
            };
            print_json(out, &json!({ "count": domains.len(), "domains": domains }))?;
        }
        Commands::Demo => demo(config, out)?,
    }
    Ok(())
}

/// Register, update, transfer, and renew `mysite1` in a temporary store.
fn demo<W: Write>(config: &AppConfig, out: &mut W) -> Result<()> {
    let store = SledRegistryStore::temporary()?;
    let alice = Identity::from_label("alice");
    let bob = Identity::from_label("bob");
    let treasury = treasury(config, &[alice, bob]);
    let clock = SystemClock;
    let service = RegistryService::new(&store, &treasury, &clock)
        .with_deriver(KeyDeriver::new(config.registry_id));

    info!("Running demo lifecycle for mysite1");

    let registered = service.register(RegisterRequest::new("mysite1", alice))?;
    print_json(out, &json!({ "step": "register", "domain": registered }))?;

    let updated = service.set_data(SetDataRequest::new("mysite1", alice, "https://alice.example"))?;
    print_json(out, &json!({ "step": "set-data", "domain": updated }))?;

    let transferred = service.transfer(TransferRequest::new("mysite1", alice, bob))?;
    print_json(out, &json!({ "step": "transfer", "domain": transferred }))?;

    let rejected = service
        .set_data(SetDataRequest::new("mysite1", alice, "https://stale.example"))
        .err()
        .map(|err| err.to_string());
    print_json(out, &json!({ "step": "set-data as previous owner", "error": rejected }))?;

    let renewed = service.renew(RenewRequest::new("mysite1", bob))?;
    print_json(out, &json!({ "step": "renew", "domain": renewed }))?;

    print_json(
        out,
        &json!({
            "step": "treasury",
            "stats": treasury.statistics(),
            "treasury_balance": treasury.balance(&config.treasury_account)?,
        }),
    )?;
    Ok(())
}
