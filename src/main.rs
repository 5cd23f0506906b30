use anyhow::Context;
use clap::Parser;
use container_fs::config::cli::Command;
use container_fs::core::transfer;
use container_fs::domain::ports::ConfigProvider;
use container_fs::utils::error::ErrorSeverity;
use container_fs::utils::monitor::SystemMonitor;
use container_fs::utils::{logger, validation, validation::Validate};
use container_fs::{CliConfig, FileSystem, FsError, FsOptions, TomlConfig};
use std::io::{Read, Write};
use std::path::Path;

fn main() {
    let cli = CliConfig::parse();

    let file_config = match &cli.config {
        Some(path) => match TomlConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path.display(), e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        },
        None => TomlConfig::default(),
    };

    if file_config.json_logs() {
        logger::init_json_logger(cli.verbose, file_config.log_level());
    } else {
        logger::init_cli_logger(cli.verbose, file_config.log_level());
    }
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = file_config.validate() {
        fail(&e);
    }

    let options = FsOptions::from_providers(&[&file_config as &dyn ConfigProvider, &cli]);
    if let Err(e) = options.validate() {
        fail(&e);
    }

    let container = cli
        .container_path()
        .or_else(|| file_config.container_path())
        .map(str::to_string);
    let container = match validation::validate_required_field("container.path", &container) {
        Ok(path) => path.clone(),
        Err(e) => fail(&e),
    };

    let monitor = SystemMonitor::new(cli.monitor);
    if let Err(e) = run(&cli, &container, &options, &monitor) {
        match e.downcast_ref::<FsError>() {
            Some(fs_error) => fail(fs_error),
            None => {
                tracing::error!("❌ {:#}", e);
                eprintln!("❌ {:#}", e);
                std::process::exit(1);
            }
        }
    }
    monitor.log_final_stats();
}

fn fail(e: &FsError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

fn read_input(from: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    match from {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut buffer = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buffer)
                .context("reading stdin")?;
            Ok(buffer)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(
    cli: &CliConfig,
    container: &str,
    options: &FsOptions,
    monitor: &SystemMonitor,
) -> anyhow::Result<()> {
    let mut fs = FileSystem::open_with(container, options)?;

    match &cli.command {
        Command::Mkdir { path, parents } => {
            if *parents {
                fs.create_directories(path)?;
            } else {
                fs.create_directory(path)?;
            }
        }
        Command::Ls { path } => {
            let names = fs.directory_contents(path)?;
            if cli.json {
                print_json(&names)?;
            } else {
                for name in names {
                    println!("{}", name);
                }
            }
        }
        Command::Rmdir { path } => fs.remove_directory(path)?,
        Command::Touch { path } => fs.create_file(path)?,
        Command::Rm { path, recursive } => {
            if *recursive {
                fs.remove_tree(path)?;
            } else {
                fs.remove_file(path)?;
            }
        }
        Command::Mv { path, destination } => fs.move_to(path, destination)?,
        Command::Rename { path, new_name } => fs.rename(path, new_name)?,
        Command::Write { path, from } => {
            let contents = read_input(from.as_deref())?;
            fs.write_file(path, &contents)?;
        }
        Command::Append { path, from } => {
            let contents = read_input(from.as_deref())?;
            fs.append_file(path, &contents)?;
        }
        Command::Cat { path } => {
            let contents = fs.read_file(path)?;
            std::io::stdout().write_all(&contents)?;
        }
        Command::Stat { path } => {
            let metadata = fs.metadata(path)?;
            if cli.json {
                print_json(&metadata)?;
            } else {
                println!("kind:     {}", metadata.kind);
                println!("size:     {}", metadata.size);
                println!("blocks:   {}", metadata.blocks);
                println!("entries:  {}", metadata.entries);
                println!("created:  {}", metadata.created_at.to_rfc3339());
                println!("modified: {}", metadata.modified_at.to_rfc3339());
            }
        }
        Command::Size { path } => println!("{}", fs.file_size(path)?),
        Command::Tree { path } => {
            let listing = fs.walk(path)?;
            if cli.json {
                print_json(&listing)?;
            } else {
                for (entry, kind) in listing {
                    println!("{:<9} {}", kind, entry);
                }
            }
        }
        Command::Defrag => {
            monitor.log_stats("Before defragment");
            let report = fs.defragment()?;
            monitor.log_stats("After defragment");
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "✅ Moved {} blocks, reclaimed {}, container is now {} bytes",
                    report.moved_blocks, report.reclaimed_blocks, report.container_len
                );
            }
        }
        Command::Stats => {
            let stats = fs.stats()?;
            if cli.json {
                print_json(&stats)?;
            } else {
                println!("block size:   {}", stats.block_size);
                println!("header:       {} / {} bytes", stats.header_len, stats.header_size);
                println!(
                    "blocks:       {} ({} used, {} free)",
                    stats.block_count, stats.used_blocks, stats.free_blocks
                );
                println!("directories:  {}", stats.directories);
                println!("files:        {}", stats.files);
                println!("container:    {} bytes", stats.container_len);
            }
        }
        Command::Import {
            source,
            destination,
        } => {
            monitor.log_stats("Before import");
            fs.create_directories(destination)?;
            let summary = transfer::import_dir(&mut fs, source, destination)?;
            monitor.log_stats("After import");
            println!(
                "✅ Imported {} files ({} bytes), {} directories",
                summary.files, summary.bytes, summary.directories
            );
        }
        Command::Export {
            source,
            destination,
            zip,
        } => {
            monitor.log_stats("Before export");
            let summary = if *zip {
                let file = std::fs::File::create(destination)
                    .with_context(|| format!("creating {}", destination.display()))?;
                let (_, summary) = transfer::export_zip(&mut fs, source, file)?;
                summary
            } else {
                transfer::export_dir(&mut fs, source, destination)?
            };
            monitor.log_stats("After export");
            println!(
                "✅ Exported {} files ({} bytes) to {}",
                summary.files,
                summary.bytes,
                destination.display()
            );
        }
    }

    fs.close()?;
    Ok(())
}
