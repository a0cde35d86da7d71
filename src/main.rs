use clap::{Parser, Subcommand};
use plume::{config, generate, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plume")]
#[command(about = "Static site build pipeline with templates and embed plugins")]
#[command(long_about = "\
Static site build pipeline with templates and embed plugins

The project directory is the site. Markdown and HTML files are rendered
through a shared layout; everything else is copied as-is.

Project structure:

  site/
  ├── .plume/
  │   ├── config.toml              # Site config (optional)
  │   ├── layout.html              # Layout template, receives {{ body }}
  │   ├── plugins/                 # plume-mime-<name> executables
  │   └── deploy/                  # Output (wiped on every build)
  ├── .plume.yml                   # Directory metadata (inherited by subdirs)
  ├── index.md                     # Page → deploy/index.md
  ├── docs/
  │   ├── .plume.yml               # Overrides the root for docs/
  │   └── guide.html               # Page → deploy/docs/guide.html
  └── static/logo.png              # Copied byte-for-byte

Entries starting with '.' are never deployed.

Templates see: body, title, path, url, permalink, language, page,
directory, site, get(key), config(path).

Embeds: <embed src=\"graph.dot\" type=\"text/vnd.graphviz\"> runs the plugin
mapped to the type under [mimetypes] with the src as its argument and splices
its stdout in place of the marker.

Run 'plume gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Debug-level diagnostics (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render the project into the deployment directory
    Build,
    /// Validate config, layout and directory metadata without writing
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build => {
            let report = generate::build(&cli.source)?;
            output::print_build_output(&report);
            if !report.is_success() {
                return Err(format!("{} file(s) failed to render", report.failed.len()).into());
            }
        }
        Command::Check => {
            let report = generate::check(&cli.source)?;
            output::print_check_output(&report);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Diagnostics go to stderr so stdout stays the report.
fn init_tracing(verbose: bool) {
    let level = if verbose { "plume=debug" } else { "plume=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
