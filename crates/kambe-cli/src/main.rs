use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use kambe_paywall::{
    redirect, Clock, DataSnapshot, FinalizeOutcome, PaymentMethod, PaymentOverride, Paywall,
    PaywallConfig, Reference, SecureIds, SettingsPatch, SimulatedGateway, Stores, SystemClock,
};
use kambe_store::{ExpiringStore, FileStore, KeyValueStore};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DURABLE_FILE: &str = "durable.json";

fn method_arg() -> Arg {
    Arg::new("method")
        .long("method")
        .value_parser(|s: &str| s.parse::<PaymentMethod>())
        .help("Payment method: Mynita, Amanata or Cash")
}

fn build_cli() -> Command {
    Command::new("kambegoye")
        .version(kambe_paywall::VERSION)
        .about("Kambegoye paywall and ledger operator tool")
        .subcommand_required(true)
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .global(true)
                .default_value("kambegoye-data")
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding the durable store"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run a payment through the simulated gateway")
                .arg(
                    Arg::new("phone")
                        .long("phone")
                        .required(true)
                        .help("Payer phone number"),
                )
                .arg(method_arg().default_value("Mynita"))
                .arg(
                    Arg::new("amount")
                        .long("amount")
                        .value_parser(value_parser!(u64))
                        .help("Amount in FCFA (defaults to the consultation price)"),
                )
                .arg(
                    Arg::new("details")
                        .long("details")
                        .help("Free-text description, e.g. cart contents"),
                )
                .arg(
                    Arg::new("cancel")
                        .long("cancel")
                        .action(ArgAction::SetTrue)
                        .help("Cancel on the gateway page instead of confirming"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Force-validate a payment that was not confirmed automatically")
                .arg(Arg::new("reference").required(true).help("Payment reference"))
                .arg(method_arg().default_value("Cash"))
                .arg(
                    Arg::new("amount")
                        .long("amount")
                        .required(true)
                        .value_parser(value_parser!(u64)),
                )
                .arg(Arg::new("phone").long("phone").default_value(""))
                .arg(Arg::new("actor").long("actor").default_value("admin")),
        )
        .subcommand(
            Command::new("report")
                .about("Revenue report")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("ledger")
                .about("Inspect or clear the transaction ledger")
                .subcommand_required(true)
                .subcommand(
                    Command::new("list")
                        .arg(method_arg())
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        ),
                )
                .subcommand(
                    Command::new("clear").arg(
                        Arg::new("yes")
                            .long("yes")
                            .action(ArgAction::SetTrue)
                            .help("Confirm deletion"),
                    ),
                ),
        )
        .subcommand(
            Command::new("settings")
                .about("Show or change system settings")
                .subcommand_required(true)
                .subcommand(Command::new("show"))
                .subcommand(
                    Command::new("price").arg(
                        Arg::new("amount")
                            .required(true)
                            .value_parser(value_parser!(u64))
                            .help("New consultation price"),
                    ),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export workers, transactions and settings as JSON")
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write to file instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Import a JSON export")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("reset")
                .about("Wipe durable data and restore defaults")
                .arg(Arg::new("yes").long("yes").action(ArgAction::SetTrue)),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

struct App {
    paywall: Paywall,
    gateway: Arc<SimulatedGateway>,
}

fn open(matches: &ArgMatches) -> Result<App> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            PaywallConfig::from_toml_str(&raw)?
        }
        None => PaywallConfig::default(),
    };

    let data_dir = matches
        .get_one::<PathBuf>("data-dir")
        .context("missing --data-dir")?;
    let durable_path = data_dir.join(DURABLE_FILE);
    let durable: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(&durable_path)
            .with_context(|| format!("opening store {}", durable_path.display()))?,
    );
    let ephemeral: Arc<dyn KeyValueStore> = Arc::new(ExpiringStore::new(config.pending_ttl()));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gateway = Arc::new(SimulatedGateway::new(
        Arc::clone(&ephemeral),
        Arc::new(SecureIds::new()),
        Arc::clone(&clock),
        config.base_url.clone(),
    ));
    let paywall = Paywall::new(
        config,
        Stores::new(durable, ephemeral),
        gateway.clone(),
        clock,
    );
    paywall.ensure_seeded()?;
    tracing::debug!(store = %durable_path.display(), "paywall ready");

    Ok(App { paywall, gateway })
}

fn describe(outcome: &FinalizeOutcome) -> String {
    match outcome {
        FinalizeOutcome::Unlocked(tx) => {
            format!("recorded {} via {}, access unlocked", tx.amount, tx.method)
        }
        FinalizeOutcome::Recorded(tx) => format!("recorded {} via {}", tx.amount, tx.method),
        FinalizeOutcome::AlreadyRecorded => "already recorded".to_string(),
        FinalizeOutcome::NotConfirmed(status) => format!("not confirmed ({status:?})"),
        FinalizeOutcome::NotRecorded => "confirmed but could not be recorded".to_string(),
    }
}

async fn run(matches: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let app = open(matches)?;
    let paywall = &app.paywall;
    let currency = paywall.config().currency.clone();

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let phone = args.get_one::<String>("phone").context("missing --phone")?;
            let method = *args
                .get_one::<PaymentMethod>("method")
                .context("missing --method")?;
            let amount = match args.get_one::<u64>("amount") {
                Some(amount) => *amount,
                None => paywall.settings().consultation_price(),
            };
            let details = args.get_one::<String>("details").cloned();

            let init = paywall.initiate(amount, method, phone, details).await?;
            writeln!(out, "Reference: {}", init.reference)?;
            writeln!(out, "Gateway:   {}", init.redirect_target)?;

            let query = redirect::parse_simulation(&init.redirect_target)?;
            let outcome = if args.get_flag("cancel") {
                let target = app.gateway.cancel(&query.reference)?;
                writeln!(out, "Return:    {target}")?;
                paywall.finalize(&init.reference, None).await
            } else {
                let callback = app.gateway.confirm(&query)?;
                writeln!(out, "Return:    {callback}")?;
                paywall
                    .finalize_callback(&redirect::parse_callback(&callback)?)
                    .await
            };

            writeln!(out, "Outcome:   {}", describe(&outcome))?;
            match paywall.remaining_secs() {
                0 => writeln!(out, "Session:   locked")?,
                secs => writeln!(out, "Session:   unlocked, {secs}s remaining")?,
            }
        }
        Some(("validate", args)) => {
            let reference = Reference::new(
                args.get_one::<String>("reference")
                    .context("missing reference")?
                    .as_str(),
            );
            let amount = *args.get_one::<u64>("amount").context("missing --amount")?;
            let method = *args
                .get_one::<PaymentMethod>("method")
                .context("missing --method")?;
            let phone = args.get_one::<String>("phone").cloned().unwrap_or_default();
            let actor = args
                .get_one::<String>("actor")
                .map_or("admin", String::as_str);

            let outcome = paywall
                .force_validate(&reference, PaymentOverride::new(amount, method, phone), actor)
                .await;
            writeln!(out, "{reference}: {}", describe(&outcome))?;
            if !outcome.is_success() {
                bail!("payment {reference} was not recorded");
            }
        }
        Some(("report", args)) => {
            let report = paywall.revenue_report();
            if args.get_flag("json") {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else {
                writeln!(out, "Revenue Report")?;
                writeln!(out, "==============")?;
                writeln!(out)?;
                writeln!(out, "Today:        {} {currency}", report.revenue_daily)?;
                writeln!(out, "Last 7 days:  {} {currency}", report.revenue_weekly)?;
                writeln!(out, "This month:   {} {currency}", report.revenue_monthly)?;
                writeln!(out, "All time:     {} {currency}", report.total_revenue)?;
                writeln!(out, "Transactions: {}", report.total_transactions)?;
                writeln!(out)?;
                writeln!(out, "By method:")?;
                for (method, count) in &report.payment_methods {
                    writeln!(out, "  {method:<8} {count}")?;
                }
                writeln!(out)?;
                writeln!(out, "Most viewed workers ({} total):", report.total_workers)?;
                for worker in &report.top_workers {
                    writeln!(out, "  {:<24} {} views", worker.display_name(), worker.views)?;
                }
            }
        }
        Some(("ledger", args)) => match args.subcommand() {
            Some(("list", list)) => {
                let mut transactions = match list.get_one::<PaymentMethod>("method") {
                    Some(method) => paywall.ledger().list_by_method(*method),
                    None => paywall.ledger().list_all(),
                };
                if let Some(limit) = list.get_one::<usize>("limit") {
                    transactions.truncate(*limit);
                }
                for tx in transactions {
                    writeln!(
                        out,
                        "{}  {}  {:>7} {currency}  {:<8} {}  {}",
                        tx.timestamp.format("%Y-%m-%d %H:%M"),
                        tx.id,
                        tx.amount,
                        tx.method,
                        tx.client_phone,
                        tx.details.unwrap_or_default()
                    )?;
                }
            }
            Some(("clear", clear)) => {
                if !clear.get_flag("yes") {
                    bail!("refusing to clear the ledger without --yes");
                }
                paywall.ledger().clear()?;
                writeln!(out, "Ledger cleared")?;
            }
            _ => unreachable!("subcommand required"),
        },
        Some(("settings", args)) => match args.subcommand() {
            Some(("show", _)) => {
                writeln!(out, "{}", serde_json::to_string_pretty(&paywall.settings().get())?)?;
            }
            Some(("price", price)) => {
                let amount = *price.get_one::<u64>("amount").context("missing amount")?;
                let settings = paywall.settings().update(SettingsPatch::price(amount))?;
                writeln!(out, "Consultation price: {} {currency}", settings.consultation_price)?;
            }
            _ => unreachable!("subcommand required"),
        },
        Some(("export", args)) => {
            let json = paywall.export_snapshot().to_json()?;
            match args.get_one::<PathBuf>("out") {
                Some(path) => {
                    std::fs::write(path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    writeln!(out, "Exported to {}", path.display())?;
                }
                None => writeln!(out, "{json}")?,
            }
        }
        Some(("import", args)) => {
            let path = args.get_one::<PathBuf>("file").context("missing file")?;
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let snapshot = DataSnapshot::from_json(&raw)
                .with_context(|| format!("parsing {}", path.display()))?;
            paywall.import_snapshot(snapshot)?;
            writeln!(out, "Imported {}", path.display())?;
        }
        Some(("reset", args)) => {
            if !args.get_flag("yes") {
                bail!("refusing to reset without --yes");
            }
            paywall.factory_reset()?;
            writeln!(out, "Data reset to defaults")?;
        }
        _ => unreachable!("subcommand required"),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let mut stdout = std::io::stdout().lock();
    run(&matches, &mut stdout).await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exec(dir: &std::path::Path, args: &[&str]) -> Result<String> {
        let mut argv = vec!["kambegoye", "--data-dir", dir.to_str().unwrap()];
        argv.extend_from_slice(args);
        let matches = build_cli().try_get_matches_from(argv)?;
        let mut out = Vec::new();
        run(&matches, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn rejects_unknown_method() {
        let result = build_cli().try_get_matches_from([
            "kambegoye",
            "simulate",
            "--phone",
            "90000000",
            "--method",
            "Orange",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn simulate_then_report() {
        let dir = tempfile::tempdir().unwrap();

        let output = exec(dir.path(), &["simulate", "--phone", "90000000"]).await.unwrap();
        assert!(output.contains("/payment/simulation?ref="));
        assert!(output.contains("access unlocked"));
        assert!(output.contains("unlocked, 300s remaining"));

        let report = exec(dir.path(), &["report", "--json"]).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(json["totalTransactions"], 1);
        assert_eq!(json["totalRevenue"], 200);
    }

    #[tokio::test]
    async fn shop_sale_and_cancelled_payment() {
        let dir = tempfile::tempdir().unwrap();

        let output = exec(
            dir.path(),
            &["simulate", "--phone", "90000000", "--amount", "15000", "--method", "amanata"],
        )
        .await
        .unwrap();
        assert!(output.contains("recorded 15000 via Amanata"));
        assert!(output.contains("Session:   locked"));

        let output = exec(dir.path(), &["simulate", "--phone", "90000000", "--cancel"])
            .await
            .unwrap();
        assert!(output.contains("/payment?error=cancel"));
        assert!(output.contains("not confirmed (Failed)"));

        let listing = exec(dir.path(), &["ledger", "list"]).await.unwrap();
        assert_eq!(listing.lines().count(), 1);
    }

    #[tokio::test]
    async fn ledger_clear_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        exec(dir.path(), &["simulate", "--phone", "90000000"]).await.unwrap();

        assert!(exec(dir.path(), &["ledger", "clear"]).await.is_err());
        exec(dir.path(), &["ledger", "clear", "--yes"]).await.unwrap();
        assert!(exec(dir.path(), &["ledger", "list"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn price_change_persists() {
        let dir = tempfile::tempdir().unwrap();
        exec(dir.path(), &["settings", "price", "350"]).await.unwrap();

        let output = exec(dir.path(), &["simulate", "--phone", "90000000"]).await.unwrap();
        assert!(output.contains("amount=350"));
        assert!(output.contains("access unlocked"));
    }

    #[tokio::test]
    async fn force_validate_records_payment() {
        let dir = tempfile::tempdir().unwrap();
        let output = exec(
            dir.path(),
            &["validate", "ref-42", "--amount", "200", "--phone", "90000000", "--actor", "awa"],
        )
        .await
        .unwrap();
        assert!(output.contains("ref-42: recorded 200 via Cash"));

        let listing = exec(dir.path(), &["ledger", "list", "--method", "cash"]).await.unwrap();
        assert!(listing.contains("validated by awa"));
    }

    #[tokio::test]
    async fn export_import_and_reset() {
        let source = tempfile::tempdir().unwrap();
        exec(source.path(), &["simulate", "--phone", "90000000"]).await.unwrap();
        let backup = source.path().join("backup.json");
        exec(source.path(), &["export", "--out", backup.to_str().unwrap()])
            .await
            .unwrap();

        let target = tempfile::tempdir().unwrap();
        exec(target.path(), &["import", backup.to_str().unwrap()]).await.unwrap();
        let listing = exec(target.path(), &["ledger", "list"]).await.unwrap();
        assert_eq!(listing.lines().count(), 1);

        assert!(exec(target.path(), &["reset"]).await.is_err());
        exec(target.path(), &["reset", "--yes"]).await.unwrap();
        assert!(exec(target.path(), &["ledger", "list"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("kambegoye.toml");
        std::fs::write(&config, "session_duration_secs = 0\n").unwrap();

        let err = exec(
            dir.path(),
            &["--config", config.to_str().unwrap(), "settings", "show"],
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("session_duration_secs"));
    }
}
