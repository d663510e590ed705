use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use nvoptions::control::{AttributeControl, ControlSnapshot};
use nvoptions::settings::SettingsStore;
use nvoptions::{Attribute, AttributeBackend, BackendKind, DisplayHandle, create_backend, picker};

#[derive(Parser)]
#[command(name = "nvoptctl", version, about = "NVIDIA display option control", long_about = None)]
struct Cli {
    /// Driver path to use
    #[arg(long, value_enum, default_value = "auto", global = true)]
    backend: BackendKind,

    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List displays the backend reports
    Displays,
    /// List the attribute families this tool can drive
    Attributes,
    /// Show the full option table for an attribute on a display
    Query {
        /// Display index or connector name (e.g. 0 or DP-0)
        display: String,
        attribute: Attribute,
    },
    /// Show the current value of an attribute
    Get {
        display: String,
        attribute: Attribute,
    },
    /// Apply an option by selector position or by value name
    Set {
        display: String,
        attribute: Attribute,
        /// Selector position, as listed by `query`
        #[arg(long, conflicts_with = "value")]
        position: Option<usize>,
        /// Value by name or number, e.g. ycbcr444 or 2
        #[arg(long)]
        value: Option<String>,
    },
    /// Choose an option interactively
    Pick {
        display: String,
        attribute: Attribute,
    },
    /// Save and restore option profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Capture the current options of every display into a profile
    Save { name: String },
    /// Re-apply a saved profile, skipping values no longer valid
    Apply { name: String },
    /// List saved profiles
    List,
    /// Print one profile
    Show { name: String },
    /// Delete a profile
    Delete { name: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Table,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {e:#}", style("Error:").red().bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Displays => {
            let backend = connect(cli.backend)?;
            let displays = backend.list_displays()?;
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&displays)?),
                _ => {
                    println!("Detected {} display(s):", displays.len());
                    for d in &displays {
                        println!("  [{}] {} ({})", d.id, d.name, d.kind);
                    }
                }
            }
        }
        Command::Attributes => match cli.format {
            OutputFormat::Json => {
                let list: Vec<serde_json::Value> = Attribute::all()
                    .iter()
                    .map(|a| {
                        serde_json::json!({
                            "name": a,
                            "description": a.description(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&list)?);
            }
            _ => {
                println!("Attribute families:");
                for attribute in Attribute::all() {
                    println!("  {:<18} {}", attribute.to_string(), attribute.description());
                }
            }
        },
        Command::Query { display, attribute } => {
            let backend = connect(cli.backend)?;
            let handle = resolve_display(backend.as_ref(), &display)?;
            let control = AttributeControl::probe(backend.as_ref(), handle.id, attribute)?;
            let snapshot = control.snapshot(backend.as_ref());
            render_snapshot(&snapshot, &handle, cli.format)?;
        }
        Command::Get { display, attribute } => {
            let backend = connect(cli.backend)?;
            let handle = resolve_display(backend.as_ref(), &display)?;
            let control = AttributeControl::probe(backend.as_ref(), handle.id, attribute)?;
            if !control.is_supported() {
                bail!("{attribute} is not selectable on {}", handle.name);
            }
            let snapshot = control.snapshot(backend.as_ref());
            match cli.format {
                OutputFormat::Human => {
                    let value = snapshot.current_value.with_context(|| {
                        format!("could not read {attribute} on {}", handle.name)
                    })?;
                    println!(
                        "{} on {}: {} (value {})",
                        attribute,
                        handle.name,
                        attribute.label(value),
                        value
                    );
                }
                _ => render_snapshot(&snapshot, &handle, cli.format)?,
            }
        }
        Command::Set {
            display,
            attribute,
            position,
            value,
        } => {
            let backend = connect(cli.backend)?;
            let handle = resolve_display(backend.as_ref(), &display)?;
            let control = AttributeControl::probe(backend.as_ref(), handle.id, attribute)?;
            let applied = match (position, value) {
                (Some(pos), None) => control.select(backend.as_ref(), pos)?,
                (None, Some(ref input)) => {
                    let parsed = attribute.parse_value(input).with_context(|| {
                        format!("'{input}' is not a known {attribute} value")
                    })?;
                    control.select_value(backend.as_ref(), parsed)?
                }
                _ => bail!("pass exactly one of --position or --value"),
            };
            println!(
                "{} on {} set to {} (value {})",
                attribute,
                handle.name,
                attribute.label(applied),
                applied
            );
        }
        Command::Pick { display, attribute } => {
            let backend = connect(cli.backend)?;
            let handle = resolve_display(backend.as_ref(), &display)?;
            let control = AttributeControl::probe(backend.as_ref(), handle.id, attribute)?;
            if !control.is_supported() {
                bail!("{attribute} is not selectable on {}", handle.name);
            }
            let snapshot = control.snapshot(backend.as_ref());
            let initial = snapshot.current_position.unwrap_or(0);
            let title = format!("{} on {}", attribute, handle.name);
            match picker::pick_option(&title, &snapshot.options, initial)? {
                Some(pos) => {
                    let applied = control.select(backend.as_ref(), pos)?;
                    println!(
                        "{} on {} set to {}",
                        attribute,
                        handle.name,
                        attribute.label(applied)
                    );
                }
                None => println!("Cancelled, nothing changed."),
            }
        }
        Command::Profile { action } => match action {
            ProfileAction::Save { name } => {
                let backend = connect(cli.backend)?;
                let store =
                    SettingsStore::new().context("could not open the profile directory")?;
                let profile = store.capture(&name, backend.as_ref())?;
                println!(
                    "Saved profile '{}' with {} setting(s) to {}",
                    profile.name,
                    profile.settings.len(),
                    store.profiles_dir().display()
                );
            }
            ProfileAction::Apply { name } => {
                let backend = connect(cli.backend)?;
                let store =
                    SettingsStore::new().context("could not open the profile directory")?;
                let profile = store.load(&name)?;
                let skipped = store.apply(&name, backend.as_ref())?;
                for warning in &skipped {
                    eprintln!("  {} {warning}", style("skipped:").yellow().bold());
                }
                println!(
                    "Applied profile '{}' ({} of {} setting(s))",
                    name,
                    profile.settings.len() - skipped.len(),
                    profile.settings.len()
                );
            }
            ProfileAction::List => {
                let store =
                    SettingsStore::new().context("could not open the profile directory")?;
                let names = store.list();
                if names.is_empty() {
                    println!("No profiles saved in {}", store.profiles_dir().display());
                } else {
                    println!("Profiles in {}:", store.profiles_dir().display());
                    for name in names {
                        println!("  {name}");
                    }
                }
            }
            ProfileAction::Show { name } => {
                let store =
                    SettingsStore::new().context("could not open the profile directory")?;
                let profile = store.load(&name)?;
                match cli.format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&profile)?)
                    }
                    _ => {
                        println!(
                            "{} (saved {})",
                            style(&profile.name).cyan().bold(),
                            profile.created_at.format("%Y-%m-%d %H:%M UTC")
                        );
                        for s in &profile.settings {
                            println!(
                                "  {}: {} = {} (value {})",
                                s.display, s.attribute, s.label, s.value
                            );
                        }
                    }
                }
            }
            ProfileAction::Delete { name } => {
                let store =
                    SettingsStore::new().context("could not open the profile directory")?;
                store.delete(&name)?;
                println!("Deleted profile '{name}'");
            }
        },
    }
    Ok(())
}

fn connect(kind: BackendKind) -> anyhow::Result<nvoptions::SharedAttributeBackend> {
    create_backend(kind).context("no usable attribute backend")
}

/// Accept a display either by backend index or by connector name.
fn resolve_display(backend: &dyn AttributeBackend, wanted: &str) -> anyhow::Result<DisplayHandle> {
    let displays = backend
        .list_displays()
        .context("failed to enumerate displays")?;
    if let Ok(id) = wanted.parse::<u32>() {
        if let Some(d) = displays.iter().find(|d| d.id == id) {
            return Ok(d.clone());
        }
    }
    displays
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(wanted))
        .cloned()
        .with_context(|| format!("no display matching '{wanted}' (try `nvoptctl displays`)"))
}

fn render_snapshot(
    snapshot: &ControlSnapshot,
    handle: &DisplayHandle,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(snapshot)?),
        OutputFormat::Human => {
            println!(
                "{} on {}:",
                style(snapshot.attribute.to_string()).cyan().bold(),
                handle.name
            );
            if !snapshot.supported {
                println!("  not selectable on this display");
                return Ok(());
            }
            if snapshot.degraded {
                println!(
                    "  {}",
                    style("valid-values query failed; showing the safe default only").yellow()
                );
            }
            for entry in &snapshot.options {
                let marker = if entry.current { "*" } else { " " };
                println!(
                    "  {marker} [{}] {} (value {})",
                    entry.position, entry.label, entry.value
                );
            }
        }
        OutputFormat::Table => {
            println!("┌──────────┬───────┬──────────────────────────────┬─────────┐");
            println!("│ Position │ Value │ Label                        │ Current │");
            println!("├──────────┼───────┼──────────────────────────────┼─────────┤");
            for entry in &snapshot.options {
                println!(
                    "│ {:<8} │ {:<5} │ {:<28} │ {:<7} │",
                    entry.position,
                    entry.value,
                    entry.label,
                    if entry.current { "yes" } else { "" }
                );
            }
            println!("└──────────┴───────┴──────────────────────────────┴─────────┘");
        }
    }
    Ok(())
}
