//! Script runner CLI.
//!
//! Detects the language runtime a script needs, resolves an interpreter that
//! satisfies an optional version constraint and runs the script, forwarding
//! its output and exit code.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand};

use scriptrun::core::language::parse_runtime_spec;
use scriptrun::core::platform::HostPlatform;
use scriptrun::exit_codes;
use scriptrun::io::cache::RuntimeCache;
use scriptrun::io::config::{ScriptrunConfig, default_home, load_config, write_config};
use scriptrun::io::installer::{CommandInstaller, NoInstaller, RuntimeInstaller};
use scriptrun::logging;
use scriptrun::run::{ScriptRequest, execute_script};
use scriptrun::runtimes::{RunContext, RunResult};

#[derive(Parser)]
#[command(
    name = "scriptrun",
    version,
    about = "Run Python, Node.js, Java and PowerShell scripts with a matching runtime"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` wins.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file; defaults to `<home>/config.toml`.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script file, an inline script or an `npx:` package.
    Run(RunArgs),
    /// Show the interpreter that would be used for a runtime.
    Which {
        /// Runtime spec, e.g. `python` or `node@>=18`.
        runtime: String,
    },
    /// Inspect or reset the detected-runtime cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// Manage the config file.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Script path (`.py`, `.js`, `.ts`, `.java`, `.jar`, `.class`, `.ps1`) or `npx:<package>`.
    script: Option<String>,

    /// Arguments passed to the script.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Inline script text (requires --runtime).
    #[arg(short = 'e', long = "script", value_name = "CODE")]
    inline: Option<String>,

    /// Runtime spec `language[@version]`, e.g. `python@3.11`.
    #[arg(long)]
    runtime: Option<String>,

    /// Version constraint, overriding `@version` in --runtime.
    #[arg(long = "version", value_name = "CONSTRAINT")]
    runtime_version: Option<String>,

    /// Kill the script after this long (`30s`, `1.5s`, `5m`, `1h30m`, `250ms`, `100us`).
    #[arg(long)]
    timeout: Option<String>,

    /// Working directory for the script.
    #[arg(long, value_name = "DIR")]
    working_dir: Option<PathBuf>,

    /// Extra environment variable (repeatable).
    #[arg(long = "env", value_name = "KEY=VALUE")]
    env: Vec<String>,

    /// Always install script dependencies.
    #[arg(long, conflicts_with = "no_install")]
    install: bool,

    /// Never install script dependencies.
    #[arg(long)]
    no_install: bool,

    /// Print the run result as JSON instead of raw output.
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn into_request(self) -> ScriptRequest {
        let install_deps = match (self.install, self.no_install) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        let (script, args) = match (self.inline.is_some(), self.script) {
            // With -e every positional belongs to the script.
            (true, Some(first)) => {
                let mut args = self.args;
                args.insert(0, first);
                (None, args)
            }
            (_, script) => (script, self.args),
        };
        ScriptRequest {
            script,
            inline: self.inline,
            runtime: self.runtime,
            version: self.runtime_version,
            timeout: self.timeout,
            working_dir: self.working_dir,
            env: self.env,
            install_deps,
            args,
        }
    }
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Print cached runtimes.
    Show,
    /// Forget every cached runtime.
    Clear,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write the default config file if missing.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective config.
    Show,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

/// Resolved state directory and loaded config.
struct Env {
    home: PathBuf,
    config: ScriptrunConfig,
}

impl Env {
    fn load(home: PathBuf, config_path: &Path) -> Result<Self> {
        let config = load_config(config_path)?;
        Ok(Self { home, config })
    }

    fn cache_path(&self) -> PathBuf {
        self.config.cache_path_in(&self.home)
    }

    fn open_cache(&self) -> Result<RuntimeCache> {
        RuntimeCache::open(&self.cache_path())
    }

    fn installer(&self) -> Box<dyn RuntimeInstaller> {
        if self.config.install.command.is_empty() {
            Box::new(NoInstaller)
        } else {
            Box::new(CommandInstaller {
                command: self.config.install.command.clone(),
                timeout: self.config.install_timeout(),
            })
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let home = default_home()?;
    let config_path = cli.config.unwrap_or_else(|| home.join("config.toml"));
    match cli.command {
        // Runs without loading so it can replace a config that no longer parses.
        Command::Config {
            command: ConfigCommand::Init { force },
        } => cmd_config_init(&config_path, force),
        command => {
            let env = Env::load(home, &config_path)?;
            match command {
                Command::Run(args) => cmd_run(&env, args),
                Command::Which { runtime } => cmd_which(&env, &runtime),
                Command::Cache { command } => cmd_cache(&env, command),
                Command::Config { .. } => cmd_config_show(&env),
            }
        }
    }
}

fn cmd_run(env: &Env, args: RunArgs) -> Result<i32> {
    let json = args.json;
    let cache = env.open_cache()?;
    let installer = env.installer();
    let ctx = RunContext::new(&env.config, &cache, installer.as_ref());
    let result = execute_script(&ctx, &args.into_request())?;

    if json {
        let payload = serde_json::to_string_pretty(&result).context("serialize run result")?;
        println!("{payload}");
    } else {
        forward_output(&result)?;
        if result.timed_out {
            eprintln!("scriptrun: script timed out");
        }
    }
    Ok(exit_code(&result))
}

fn forward_output(result: &RunResult) -> Result<()> {
    write_output(
        result,
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    )
}

/// Copy the script's raw output bytes to our own streams.
fn write_output(result: &RunResult, stdout: &mut impl Write, stderr: &mut impl Write) -> Result<()> {
    stdout
        .write_all(&result.stdout_bytes)
        .context("write stdout")?;
    stdout.flush().context("flush stdout")?;
    stderr
        .write_all(&result.stderr_bytes)
        .context("write stderr")?;
    Ok(())
}

/// Script exit code, `TIMEOUT` when killed on timeout, `INVALID` on signals.
fn exit_code(result: &RunResult) -> i32 {
    if result.timed_out {
        return exit_codes::TIMEOUT;
    }
    result.exit_code.unwrap_or(exit_codes::INVALID)
}

fn cmd_which(env: &Env, runtime: &str) -> Result<i32> {
    let (language, constraint) = parse_runtime_spec(runtime)?;
    let cache = env.open_cache()?;
    let detector = RunContext::new(&env.config, &cache, &NoInstaller).detector(language);
    let info = detector.detect(&cache)?;
    if let Some(constraint) = &constraint
        && !detector.check_constraint(&info.version, constraint)?
    {
        bail!(
            "{language} {} at {} does not satisfy {constraint}",
            info.version,
            info.path.display()
        );
    }
    println!("path: {}", info.path.display());
    println!("version: {}", info.version);
    println!("platform: {}", HostPlatform::current());
    Ok(exit_codes::OK)
}

fn cmd_cache(env: &Env, command: CacheCommand) -> Result<i32> {
    match command {
        CacheCommand::Show => {
            let entries = env.open_cache()?.entries()?;
            if entries.is_empty() {
                println!("runtime cache is empty");
            }
            for (language, info) in entries {
                println!("{language}\t{}\t{}", info.version, info.path.display());
            }
        }
        CacheCommand::Clear => {
            let path = env.cache_path();
            RuntimeCache::discard(&path).clear()?;
            println!("cleared {}", path.display());
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_config_init(config_path: &Path, force: bool) -> Result<i32> {
    if config_path.exists() && !force {
        println!("{} already exists", config_path.display());
        return Ok(exit_codes::OK);
    }
    write_config(config_path, &ScriptrunConfig::default())?;
    println!("wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_config_show(env: &Env) -> Result<i32> {
    let rendered = toml::to_string_pretty(&env.config).context("serialize config toml")?;
    print!("{rendered}");
    Ok(exit_codes::OK)
}
