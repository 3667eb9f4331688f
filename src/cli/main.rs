use yubca::audit::{self, AuditConfig, LogDestination};
use yubca::codec;
use yubca::ledger::JsonLedger;
use yubca::platform::software::SoftwareToken;
use yubca::platform::HumanPrompt;
use yubca::{CAConfig, CAError, IssuanceEngine, Issued, LeafOptions, Slot};

use yubca::reexports::log;

use clap::{crate_description, crate_name, crate_version, Arg, ArgAction, ArgMatches, Command};
use std::path::Path;

/// PIN used by a token that was never personalized.
const DEFAULT_PIN: &str = "123456";

/// Exit code for an invalid configuration file.
const EXIT_CONFIGURATION: i32 = 2;

/// Exit code when a certificate was issued but could not be recorded.
const EXIT_LEDGER: i32 = 3;

/// Prompts on the controlling terminal.
struct TerminalPrompt;

impl HumanPrompt for TerminalPrompt {
    fn pin(&self) -> Result<String, CAError> {
        let pin = rpassword::prompt_password("PIN (leave blank for default): ")?;
        let pin = pin.trim();
        if pin.is_empty() {
            Ok(DEFAULT_PIN.to_string())
        } else {
            Ok(pin.to_string())
        }
    }

    fn touch(&self) {
        eprintln!("Please touch your YubiKey...\n");
    }
}

type Engine = IssuanceEngine<SoftwareToken, JsonLedger>;

fn open_engine(matches: &ArgMatches) -> Result<Engine, CAError> {
    let token_dir = matches
        .get_one::<String>("token-dir")
        .ok_or(CAError::UsageError("Missing token directory"))?;
    let token = SoftwareToken::open(token_dir)?;

    let ledger = matches
        .get_one::<String>("db")
        .filter(|path| !path.is_empty())
        .map(JsonLedger::new);

    Ok(IssuanceEngine::new(token, ledger, Box::new(TerminalPrompt)))
}

fn read_config(matches: &ArgMatches) -> Result<CAConfig, CAError> {
    let path = matches
        .get_one::<String>("config")
        .ok_or(CAError::UsageError("Missing configuration file"))?;
    CAConfig::from_file(Path::new(path))
}

fn config_slot(config: &CAConfig) -> Result<Slot, CAError> {
    config.slot.parse()
}

/// Print the PEM and turn a ledger failure into an error after the fact.
fn emit(issued: Issued) -> Result<(), CAError> {
    print!("{}", issued.pem);
    match issued.ledger_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn start() -> Result<(), CAError> {
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .arg(
            Arg::new("debug")
                .short('d')
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Prints debugging information"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .default_value("ca.json")
                .global(true)
                .help("Path to the certificate authority JSON configuration"),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .value_name("FILE")
                .global(true)
                .help("Path to the JSON ledger of issued certificates"),
        )
        .arg(
            Arg::new("token-dir")
                .long("token-dir")
                .value_name("DIR")
                .default_value(".yubca-token")
                .global(true)
                .help("Directory of the software token"),
        )
        .arg(
            Arg::new("audit")
                .long("audit")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Enable structured audit logging (JSON to stderr)"),
        )
        .arg(
            Arg::new("audit-file")
                .long("audit-file")
                .value_name("FILE")
                .global(true)
                .help("Write audit logs to FILE instead of stderr"),
        )
        .subcommand(
            Command::new("init").about("Generate a CA key on the token and self-sign its certificate"),
        )
        .subcommand(Command::new("inspect").about("View metadata about the certificate authority"))
        .subcommand(
            Command::new("export")
                .about("Export the certificate authority certificate or public key")
                .arg(
                    Arg::new("ca")
                        .long("ca")
                        .action(ArgAction::SetTrue)
                        .help("Export the certificate authority certificate"),
                )
                .arg(
                    Arg::new("public-key")
                        .long("public-key")
                        .action(ArgAction::SetTrue)
                        .help("Export the certificate authority public key"),
                ),
        )
        .subcommand(
            Command::new("sign")
                .about("Sign a certificate signing request")
                .arg(
                    Arg::new("csr")
                        .long("csr")
                        .value_name("FILE")
                        .default_value("csr.pem")
                        .help("Path to the certificate signing request"),
                )
                .arg(
                    Arg::new("ca")
                        .long("ca")
                        .action(ArgAction::SetTrue)
                        .help("Issue an intermediate certificate authority"),
                )
                .arg(
                    Arg::new("server")
                        .long("server")
                        .action(ArgAction::SetTrue)
                        .help("Enable server authentication usage"),
                )
                .arg(
                    Arg::new("client")
                        .long("client")
                        .action(ArgAction::SetTrue)
                        .help("Enable client authentication usage"),
                )
                .arg(
                    Arg::new("validity")
                        .long("validity")
                        .value_name("DURATION")
                        .default_value("8766h")
                        .help("Maximum period before the certificate expires"),
                ),
        )
        .subcommand(Command::new("issued").about("List certificates recorded in the ledger"))
        .subcommand(Command::new("version").about("Print version information"))
        .get_matches();

    let debug = matches.get_flag("debug");
    let audit_enabled = matches.get_flag("audit");
    let audit_file = matches.get_one::<String>("audit-file").map(|s| s.as_str());

    env_logger::builder()
        .format_timestamp(None)
        .format_level(false)
        .format_module_path(false)
        .format_target(false)
        .filter_level(if debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    if audit_enabled || audit_file.is_some() {
        let destination = match audit_file {
            Some(path) => LogDestination::File(path.to_string()),
            None => LogDestination::Stderr,
        };
        audit::init(AuditConfig {
            enabled: true,
            destination,
            ..Default::default()
        })?;
    }

    if matches.subcommand_matches("version").is_some() {
        println!("Version:  {}", crate_version!());
        println!("Revision: {}", env!("YUBCA_REVISION"));
    } else if matches.subcommand_matches("init").is_some() {
        let config = read_config(&matches)?;
        let engine = open_engine(&matches)?;
        log::debug!("using {}", yubca::SigningOracle::name(engine.oracle()));
        let issued = engine.initialize(&config)?;
        log::info!("Done!");
        if let Some(e) = issued.ledger_error {
            return Err(e);
        }
    } else if matches.subcommand_matches("inspect").is_some() {
        let config = read_config(&matches)?;
        let engine = open_engine(&matches)?;
        let ca = engine.ca_certificate(config_slot(&config)?)?;
        print!("{}", codec::describe(&ca));
    } else if let Some(sub) = matches.subcommand_matches("export") {
        let config = read_config(&matches)?;
        let engine = open_engine(&matches)?;
        let slot = config_slot(&config)?;
        // Checked before printing anything so a missing CA fails cleanly.
        engine.ca_certificate(slot)?;
        if sub.get_flag("ca") {
            print!("{}", engine.export_ca_pem(slot)?);
        }
        if sub.get_flag("public-key") {
            print!("{}", engine.export_public_key_pem(slot)?);
        }
    } else if let Some(sub) = matches.subcommand_matches("sign") {
        let config = read_config(&matches)?;
        let engine = open_engine(&matches)?;
        let csr_path = sub
            .get_one::<String>("csr")
            .ok_or(CAError::UsageError("Missing certificate request"))?;
        let validity = sub
            .get_one::<String>("validity")
            .ok_or(CAError::UsageError("Missing validity"))?;
        let csr = std::fs::read(csr_path)?;
        let options = LeafOptions {
            is_ca: sub.get_flag("ca"),
            server_auth: sub.get_flag("server"),
            client_auth: sub.get_flag("client"),
        };
        emit(engine.sign_csr(&config.slot, &csr, validity, options)?)?;
    } else if matches.subcommand_matches("issued").is_some() {
        let db = matches
            .get_one::<String>("db")
            .filter(|path| !path.is_empty())
            .ok_or(CAError::UsageError("--db is required to list issued certificates"))?;
        for record in JsonLedger::new(db).records()? {
            println!(
                "{}  {}  {} .. {}",
                record.serial,
                record.common_name.as_deref().unwrap_or("-"),
                record.not_before,
                record.not_after
            );
        }
    } else {
        return Err(CAError::UsageError("No subcommand specified"));
    }
    Ok(())
}

fn exit_code(e: &CAError) -> i32 {
    match e {
        CAError::InvalidConfiguration { .. } => EXIT_CONFIGURATION,
        CAError::Ledger(_) => EXIT_LEDGER,
        _ => 1,
    }
}

fn main() -> Result<(), CAError> {
    let res = start();
    match res {
        Ok(_) => {}
        Err(e) => {
            match &e {
                CAError::InvalidConfiguration {
                    field,
                    message,
                    help,
                } => {
                    eprintln!("Invalid Configuration!");
                    eprintln!("Field: {field}");
                    eprintln!("Message: {message}");
                    eprintln!("Help: {help}");
                }
                other => eprintln!("{other}"),
            }
            std::process::exit(exit_code(&e));
        }
    }
    Ok(())
}
