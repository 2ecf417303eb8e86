use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use hamforge::config::{Config, InstallMode};
use hamforge::pipeline::Pipeline;
use hamforge::version::Version;
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(default_value_t = Level::INFO, global = true, long)]
    level: Level,

    #[arg(global = true, long, short)]
    config: Option<PathBuf>,

    #[arg(global = true, long)]
    workdir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, extract and build the newest release of each program
    Run {
        #[arg(long = "program", short)]
        programs: Vec<String>,

        #[arg(default_value_t = false, long)]
        no_build: bool,

        #[arg(long)]
        install: Option<InstallMode>,

        #[arg(long, short)]
        jobs: Option<usize>,

        /// Exit non-zero when any program failed
        #[arg(default_value_t = false, long)]
        strict: bool,
    },

    /// Print the newest release listed for a program
    Latest { program: String },

    /// Download and extract a release without building it
    Fetch {
        program: String,

        /// Release to fetch instead of the newest one
        #[arg(long)]
        release: Option<String>,
    },

    /// List configured programs
    Programs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut subscriber = tracing_subscriber::FmtSubscriber::builder().with_max_level(cli.level);

    // when we run the command with `TRACE` or `DEBUG` level, we want to see
    // the file and line number...
    if [Level::DEBUG, Level::TRACE].contains(&cli.level) {
        subscriber = subscriber.with_file(true).with_line_number(true);
    }

    let subscriber = subscriber.finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = Config::resolve(cli.config.as_deref()).await?;

    if let Some(workdir) = cli.workdir {
        config.workdir = workdir;
    }

    match cli.command {
        Command::Run {
            programs,
            no_build,
            install,
            jobs,
            strict,
        } => {
            let mut config = config.select(&programs)?;

            if no_build {
                config.build = false;
            }

            if let Some(install) = install {
                config.install = install;
            }

            if let Some(jobs) = jobs {
                config.jobs = jobs;
            }

            config.validate()?;

            tokio::fs::create_dir_all(&config.workdir).await?;

            let pipeline = Pipeline::system(&config)?;
            let report = pipeline.run(&config).await?;

            for outcome in &report.outcomes {
                match &outcome.result {
                    Ok(build) => match &build.package {
                        Some(package) => info!(
                            "{} {}: {}",
                            outcome.program,
                            build.version,
                            package.display()
                        ),
                        None => info!(
                            "{} {}: {}",
                            outcome.program,
                            build.version,
                            build.source_dir.display()
                        ),
                    },
                    Err(err) => info!("{}: failed: {}", outcome.program, err),
                }
            }

            if strict && !report.is_success() {
                bail!("{} program(s) failed", report.failures().count());
            }
        }

        Command::Latest { program } => {
            let source = config.program(&program)?.clone();
            let pipeline = Pipeline::system(&config)?;
            let version = pipeline.resolve(&program, &source).await?;

            println!("{}", version);
        }

        Command::Fetch { program, release } => {
            let source = config.program(&program)?.clone();
            let pipeline = Pipeline::system(&config)?;

            let version = match release {
                Some(release) => Version::parse(&release)?,
                None => pipeline.resolve(&program, &source).await?,
            };

            tokio::fs::create_dir_all(&config.workdir).await?;

            let (_, source_dir) = pipeline.fetch(&config, &program, &source, &version).await?;

            println!("{}", source_dir.display());
        }

        Command::Programs => {
            for (name, source) in &config.programs {
                println!("{}\t{}\t{}", name, source.base_url, source.index_url());
            }
        }
    }

    Ok(())
}
