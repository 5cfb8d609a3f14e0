//! CLI entry point for `qwkpack`.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use qwkpack::config::{self, Config};
use qwkpack::export::{ExportReport, ExportSettings, PacketBuilder};
use qwkpack::format::{self, index, Manifest};
use qwkpack::import::{self, ImportSummary, ReplyReader};
use qwkpack::session::{AbortFlag, AddressPick, ExportContext, ImportContext, Prompt};
use qwkpack::store::{CommandArchiver, LocalBoard, LocalDirectory};

#[derive(Parser)]
#[command(
    name = "qwkpack",
    version,
    about = "QWK offline mail packets for a bulletin board",
    long_about = "Export unread messages and mail as a .QWK packet, and import .REP reply packets back into the board."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Act as this user instead of the configured one
    #[arg(short, long, global = true, value_name = "NAME")]
    user: Option<String>,

    /// Answer yes to every question
    #[arg(short, long, global = true, conflicts_with = "no")]
    yes: bool,

    /// Answer no to every question
    #[arg(short, long, global = true)]
    no: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a packet of new messages and send it
    Export {
        /// Export the newest PERCENT% of every area instead of unread messages
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        percent: Option<u8>,
        /// Directory the packet is sent to
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Import a reply packet
    Import {
        /// Reply archive to import instead of picking one up from the transfer directory
        #[arg(short, long)]
        archive: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// List the contents of an unpacked QWK packet directory
    Inspect {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Create the board file from a TOML description
    Seed {
        path: PathBuf,
        /// Board file to write (defaults to the configured one)
        #[arg(short, long)]
        board: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = config::load_config();
    if let Some(user) = &cli.user {
        config.user.name = user.clone();
    }

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let answer = match (cli.yes, cli.no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    let mut prompt = ConsolePrompt { answer };

    match cli.command {
        Commands::Export {
            percent,
            output,
            json,
        } => cmd_export(&config, &mut prompt, percent, output, json),
        Commands::Import { archive, json } => cmd_import(&config, &mut prompt, archive, json),
        Commands::Inspect { path, json } => cmd_inspect(&path, json),
        Commands::Seed { path, board } => cmd_seed(&config, &path, board),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "qwkpack.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Answers questions from the terminal, or uses `--yes`/`--no`.
struct ConsolePrompt {
    answer: Option<bool>,
}

impl ConsolePrompt {
    fn ask(&self, question: &str) -> Option<String> {
        eprint!("  {question} ");
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn confirm(&self, question: &str, default: bool) -> bool {
        if let Some(answer) = self.answer {
            return answer;
        }
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        match self.ask(&format!("{question} {hint}")) {
            Some(reply) if reply.eq_ignore_ascii_case("y") || reply.eq_ignore_ascii_case("yes") => {
                true
            }
            Some(reply) if reply.eq_ignore_ascii_case("n") || reply.eq_ignore_ascii_case("no") => {
                false
            }
            _ => default,
        }
    }
}

impl Prompt for ConsolePrompt {
    fn keep_partial(&mut self) -> bool {
        self.confirm("Export was interrupted. Keep the partial packet?", true)
    }

    fn route_private_to_mailbox(&mut self, title: &str, to: &str, area: u16) -> bool {
        self.confirm(
            &format!("\"{title}\" to {to} is private but addressed to area {area}. Send it as mail?"),
            true,
        )
    }

    fn choose_address(&mut self, record_to: &str, embedded: &str) -> AddressPick {
        let use_embedded = self.confirm(
            &format!("Reply is addressed to {record_to} but the text says {embedded}. Use {embedded}?"),
            false,
        );
        if use_embedded {
            AddressPick::Embedded
        } else {
            AddressPick::Record
        }
    }

    fn retry_transfer(&mut self) -> bool {
        // Retrying forever under --yes would never end.
        if self.answer.is_some() {
            return false;
        }
        self.confirm("Packet transfer failed. Try again?", false)
    }

    fn redirect_post(&mut self, title: &str, area: u16) -> Option<u16> {
        if self.answer.is_some() {
            return None;
        }
        self.ask(&format!(
            "Cannot post \"{title}\" to area {area}. Post to which area? (empty to skip)"
        ))
        .and_then(|reply| reply.parse().ok())
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Build a packet and send it to the transfer directory.
fn cmd_export(
    config: &Config,
    prompt: &mut ConsolePrompt,
    percent: Option<u8>,
    output: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let board_path = config::board_file_path(config);
    let mut board = LocalBoard::open(&board_path, &config.user.name)?;
    let archiver = CommandArchiver::new(&config.archive);
    let mut transport = LocalDirectory::new(output.unwrap_or_else(|| config::transfer_dir(config)));

    let settings = ExportSettings {
        percent,
        ..ExportSettings::from_config(config)
    };

    let pb = spinner("Scanning");
    let progress = |label: &str, count: u32| {
        pb.set_message(format!("{label}: {count} message(s)"));
    };
    let start = Instant::now();

    let ctx = ExportContext {
        board: &mut board,
        archiver: &archiver,
        transport: &mut transport,
        prompt,
        abort: AbortFlag::new(),
    };
    let report = PacketBuilder::new(ctx, config, config::work_dir(config))
        .with_settings(settings)
        .with_progress(&progress)
        .run();
    pb.finish_and_clear();
    let report = report?;
    board.save()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_export_report(&report, start.elapsed());
    }
    Ok(())
}

/// Import a reply packet into the board.
fn cmd_import(
    config: &Config,
    prompt: &mut ConsolePrompt,
    archive: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let board_path = config::board_file_path(config);
    let mut board = LocalBoard::open(&board_path, &config.user.name)?;
    let archiver = CommandArchiver::new(&config.archive);
    let mut transport = LocalDirectory::new(config::transfer_dir(config));

    let mut ctx = ImportContext {
        board: &mut board,
        archiver: &archiver,
        transport: Some(&mut transport),
        prompt,
    };
    let result = import::import_reply_packet(&mut ctx, config, &config::work_dir(config), archive);

    // Whatever went out before a failure stays posted.
    board.save()?;
    let Some(summary) = result? else {
        println!("  No reply packet found.");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_import_summary(&summary);
    }
    Ok(())
}

/// One message found in `MESSAGES.DAT`.
#[derive(serde::Serialize)]
struct PacketMessage {
    record: u64,
    conference: u16,
    number: Option<u32>,
    status: char,
    from: String,
    to: String,
    subject: String,
    date: String,
    blocks: usize,
}

/// Show what an unpacked packet directory holds.
fn cmd_inspect(dir: &Path, json: bool) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }

    let control = dir.join(format::control::CONTROL_FILE);
    let manifest = match std::fs::read_to_string(&control) {
        Ok(text) => Some(Manifest::parse(&text)?),
        Err(_) => None,
    };

    let mut messages = Vec::new();
    let mut reader = ReplyReader::open(dir.join(format::MESSAGES_FILE))?;
    while let Some(raw) = reader.next_reply()? {
        messages.push(PacketMessage {
            record: raw.record,
            conference: raw.header.conf_num,
            number: raw.header.msgnum(),
            status: char::from(raw.header.status),
            from: raw.header.from_text(),
            to: raw.header.to_text(),
            subject: raw.header.subject_text(),
            date: raw.header.timestamp_text(),
            blocks: raw.body.len() / format::RECORD_SIZE + 1,
        });
    }

    let mut indices: Vec<(String, usize)> = Vec::new();
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.to_ascii_uppercase().ends_with(".NDX"))
        .collect();
    names.sort();
    for name in names {
        let entries = index::read_index(&dir.join(&name))?;
        indices.push((name, entries.len()));
    }

    if json {
        let output = serde_json::json!({
            "packet": manifest.as_ref().map(|m| serde_json::json!({
                "name": m.packet_name,
                "sysop": m.sysop,
                "user": m.user_name,
                "generated": m.generated.format("%Y-%m-%d %H:%M:%S").to_string(),
                "areas": m.areas.iter().map(|(n, name)| serde_json::json!({
                    "number": n,
                    "name": name,
                })).collect::<Vec<_>>(),
            })),
            "message_count": messages.len(),
            "messages": messages,
            "indices": indices.iter().map(|(name, count)| serde_json::json!({
                "file": name,
                "entries": count,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    if let Some(m) = &manifest {
        println!("  {:<20} {}", "Packet", m.packet_name);
        println!("  {:<20} {}", "Sysop", m.sysop);
        println!("  {:<20} {}", "User", m.user_name);
        println!(
            "  {:<20} {}",
            "Generated",
            m.generated.format("%Y-%m-%d %H:%M:%S")
        );
        println!("  {:<20} {}", "Areas", m.areas.len());
    }
    println!("  {:<20} {}", "Messages", messages.len());
    for (name, count) in &indices {
        println!("  {:<20} {} entries", name, count);
    }
    println!();

    if messages.is_empty() {
        return Ok(());
    }
    println!(
        "  {:<5} {:<7} {:<1} {:<14} {:<20} {:<20} {:<25}",
        "Conf", "Number", "S", "Date", "From", "To", "Subject"
    );
    println!("  {}", "-".repeat(98));
    for m in &messages {
        println!(
            "  {:<5} {:<7} {:<1} {:<14} {:<20} {:<20} {:<25}",
            m.conference,
            m.number.map(|n| n.to_string()).unwrap_or_default(),
            m.status,
            m.date,
            m.from.chars().take(19).collect::<String>(),
            m.to.chars().take(19).collect::<String>(),
            m.subject
        );
    }
    println!();
    Ok(())
}

/// Write the board file from a TOML description.
fn cmd_seed(config: &Config, path: &Path, board: Option<PathBuf>) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let board_path = board.unwrap_or_else(|| config::board_file_path(config));
    let data = qwkpack::store::seed_board(path, &board_path)?;

    let posts: usize = data.areas.iter().map(|a| a.posts.len()).sum();
    println!();
    println!("  {:<20} {}", "Board file", board_path.display());
    println!("  {:<20} {}", "Areas", data.areas.len());
    println!("  {:<20} {}", "Posts", posts);
    println!("  {:<20} {}", "Mail", data.mail.len());
    println!("  {:<20} {}", "Users", data.users.len());
    println!();
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "qwkpack", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print an export summary in a human-readable table.
fn print_export_report(report: &ExportReport, elapsed: Duration) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Packet", report.packet_name);
    println!("  {:<20} {:?}", "Outcome", report.outcome);
    println!("  {:<20} {:?}", "Scan", report.stop);
    if let Some(path) = &report.packet_path {
        println!("  {:<20} {}", "Sent to", path.display());
        println!(
            "  {:<20} {}",
            "Size",
            format_size(report.packet_size, BINARY)
        );
    }
    println!("  {:<20} {}", "Messages", report.messages);
    println!("  {:<20} {}", "Mail", report.mail);
    if report.disk_exhausted {
        println!("  {:<20} yes", "Disk full");
    }
    println!("  {:<20} {:.2?}", "Time", elapsed);

    if !report.areas.is_empty() {
        println!();
        println!("  {:<5} {:<30} {:>8} {:>8}", "#", "Area", "Total", "Sent");
        println!("  {}", "-".repeat(54));
        for area in &report.areas {
            let name: String = area.name.chars().take(29).collect();
            println!(
                "  {:<5} {:<30} {:>8} {:>8}{}",
                area.number,
                name,
                area.total,
                area.exported,
                if area.truncated { " (limit)" } else { "" }
            );
        }
    }
    println!();
}

/// Print an import summary.
fn print_import_summary(summary: &ImportSummary) {
    println!();
    println!("  {:<20} {}", "Posted", summary.posted);
    println!("  {:<20} {}", "Mailed", summary.mailed);
    println!("  {:<20} {}", "Skipped (empty)", summary.skipped);
    println!("  {:<20} {}", "Declined", summary.declined);
    println!("  {:<20} {}", "Rejected", summary.rejected);
    println!();
}
