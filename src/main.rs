// ir-manager - keeps the IR codes you learned so you don't have to learn them twice
//
// This is the main entry point. Parses CLI args and dispatches to handlers.

use anyhow::{bail, Context};
use ir_manager_lib::{
    db::{CodeInput, IrCode},
    Config, IrCodec, IrError, IrRecordStore,
};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = env::args().collect();

    let verbose = args.iter().any(|arg| arg == "-v" || arg == "--verbose");
    args.retain(|arg| arg != "-v" && arg != "--verbose");
    init_logging(verbose);

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "add" => handle_add(rest).await,
        "get" => handle_get(rest).await,
        "list" => handle_list(rest).await,
        "devices" => handle_devices().await,
        "search" => handle_search(rest).await,
        "update" => handle_update(rest).await,
        "delete" => handle_delete(rest).await,
        "convert" => handle_convert(rest),
        "validate" => handle_validate(rest),
        "stats" => handle_stats().await,
        "export" => handle_export(rest).await,
        "import" => handle_import(rest).await,
        "version" | "--version" => {
            println!("ir-manager v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "-h" | "--help" => {
            print_usage();
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

async fn handle_add(args: &[String]) -> anyhow::Result<()> {
    let [name, device, command, wire_code, notes @ ..] = args else {
        bail!("usage: ir-manager add <name> <device> <command> <wire_code> [notes]");
    };

    let store = open_store().await?;
    let input = CodeInput::new(name, device, command, wire_code).with_notes(notes.join(" "));

    match store.add(input).await {
        Ok(id) => {
            println!("✓ Saved as {}", id);
            Ok(())
        }
        Err(e) => bail!(e.user_message()),
    }
}

async fn handle_get(args: &[String]) -> anyhow::Result<()> {
    let Some(id) = args.first() else {
        bail!("usage: ir-manager get <id>");
    };

    let store = open_store().await?;
    match store.get(id).await {
        Some(code) => println!("{}", serde_json::to_string_pretty(&code)?),
        None => println!("No code with id '{}'", id),
    }

    Ok(())
}

async fn handle_list(args: &[String]) -> anyhow::Result<()> {
    let store = open_store().await?;

    let codes = match args.first() {
        Some(device) => store.get_by_device(device).await,
        None => store.get_all().await,
    };

    print_codes(&codes, "Stored codes");
    Ok(())
}

async fn handle_devices() -> anyhow::Result<()> {
    let store = open_store().await?;
    let devices = store.get_devices().await;

    if devices.is_empty() {
        println!("No devices yet.");
    } else {
        for device in devices {
            println!("{}", device);
        }
    }

    Ok(())
}

async fn handle_search(args: &[String]) -> anyhow::Result<()> {
    if args.is_empty() {
        eprintln!("Error: No search query provided");
        return Ok(());
    }

    let query = args.join(" ");
    let store = open_store().await?;
    let results = store.search(&query).await;

    if results.is_empty() {
        println!("No codes found matching '{}'", query);
    } else {
        print_codes(&results, &format!("Codes matching '{}'", query));
    }

    Ok(())
}

async fn handle_update(args: &[String]) -> anyhow::Result<()> {
    let [id, assignments @ ..] = args else {
        bail!("usage: ir-manager update <id> <field>=<value>...");
    };

    let mut fields = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let (field, value) = assignment
            .split_once('=')
            .ok_or_else(|| IrError::Generic(format!("expected field=value, got '{}'", assignment)))?;
        fields.push((field.to_string(), value.to_string()));
    }

    let store = open_store().await?;
    if store.update_fields(id, fields).await? {
        println!("✓ Updated {}", id);
    } else {
        println!("✗ {} was not updated (unknown id or invalid wire code)", id);
    }

    Ok(())
}

async fn handle_delete(args: &[String]) -> anyhow::Result<()> {
    let Some(id) = args.first() else {
        bail!("usage: ir-manager delete <id>");
    };

    let store = open_store().await?;
    if store.delete(id).await? {
        println!("✓ Deleted {}", id);
    } else {
        println!("No code with id '{}'", id);
    }

    Ok(())
}

fn handle_convert(args: &[String]) -> anyhow::Result<()> {
    let Some(wire_code) = args.first() else {
        bail!("usage: ir-manager convert <wire_code>");
    };

    let converted = IrCodec::new()
        .convert(wire_code)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!("Interchange: {}", converted.interchange_code);
    println!("Frequency:   {} Hz", converted.frequency);
    Ok(())
}

fn handle_validate(args: &[String]) -> anyhow::Result<()> {
    let text = args.join(" ");
    let codec = IrCodec::new();

    if codec.validate_interchange(&text) {
        println!("✓ Valid ({} Hz)", codec.frequency_of(&text));
    } else {
        println!("✗ Not a valid learned interchange code");
    }

    Ok(())
}

async fn handle_stats() -> anyhow::Result<()> {
    let store = open_store().await?;
    let stats = store.statistics().await;

    println!("\nir-manager Status");
    println!("{}", "=".repeat(60));
    println!("  Store:    {}", store.path().display());
    println!("  Codes:    {}", stats.total_codes);
    println!("  Devices:  {}", stats.total_devices);

    for (device, count) in &stats.codes_by_device {
        println!("    {:<30} {}", device, count);
    }
    println!("{}", "=".repeat(60));

    Ok(())
}

async fn handle_export(args: &[String]) -> anyhow::Result<()> {
    let Some(path) = args.first() else {
        bail!("usage: ir-manager export <path>");
    };

    let store = open_store().await?;
    if !store.export_to(path).await {
        bail!("export to {} failed", path);
    }

    println!("✓ Exported to {}", path);
    Ok(())
}

async fn handle_import(args: &[String]) -> anyhow::Result<()> {
    let Some(path) = args.first() else {
        bail!("usage: ir-manager import <path>");
    };

    let store = open_store().await?;
    if !store.import_from(path).await {
        bail!("import from {} failed", path);
    }

    println!("✓ Imported from {}", path);
    Ok(())
}

fn print_codes(codes: &[IrCode], title: &str) {
    if codes.is_empty() {
        println!("No codes found.");
        return;
    }

    println!("\n{}:", title);
    println!("{}", "=".repeat(60));
    for (i, code) in codes.iter().enumerate() {
        println!(
            "{:3}. {} [{}] {} / {} ({} Hz)",
            i + 1,
            code.id,
            code.name,
            code.device,
            code.command,
            code.frequency
        );
    }
    println!("{}", "=".repeat(60));
}

async fn open_store() -> anyhow::Result<IrRecordStore> {
    let config = Config::from_env()?;
    IrRecordStore::open(&config.store_path, IrCodec::new())
        .await
        .with_context(|| format!("could not open {}", config.store_path.display()))
}

fn print_usage() {
    println!(
        r#"ir-manager v{} - Learned IR codes, converted and kept

USAGE:
    ir-manager [-v] <COMMAND> [ARGS]

COMMANDS:
    add <name> <device> <command> <wire_code> [notes]
                           Convert and save a code
    get <id>               Show one code
    list [device]          List codes, optionally for one device
    devices                List device names
    search <query>         Search name, device, command and notes
    update <id> <field>=<value>...
                           Change name, device, command, wire_code or notes
    delete <id>            Remove a code
    convert <wire_code>    Print the interchange form of a wire code
    validate <interchange> Check interchange hex text
    stats                  Show store statistics
    export <path>          Write all codes to a file
    import <path>          Merge codes from an export file
    version                Show version
    help                   Show this help

ENVIRONMENT:
    IR_MANAGER_DB          Store file (default: ~/.ir-manager/ir_codes.json)
    IR_MANAGER_TIMEOUT     Learning timeout in seconds (default: 30)
    RUST_LOG               Log filter (default: warn)

EXAMPLES:
    ir-manager add "Power On" "TV Samsung" power_on JgAcAB0dHB44...
    ir-manager search samsung
    ir-manager update tv_samsung_power_on notes="front panel"
"#,
        env!("CARGO_PKG_VERSION")
    );
}
