use std::env;
use std::process::ExitCode;

use rdsh::core::config::Config;
use rdsh::error::ShellError;
use rdsh::flags::Flags;
use rdsh::highlight::SyntaxHighlighter;
use rdsh::logging;
use rdsh::process::signal;
use rdsh::remote::{self, Client, Server, ServerConfig};
use rdsh::shell::{LocalSession, RemoteSession, Shell};
use tracing::warn;

const PROMPT: &str = "rdsh> ";

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            eprintln!("rdsh: {}", e);
            ExitCode::from(e.exit_code().clamp(0, 255) as u8)
        }
    }
}

fn run() -> Result<i32, ShellError> {
    let mut flags = Flags::new();
    let args: Vec<String> = env::args().skip(1).collect();
    flags.parse(&args)?;

    if flags.is_set("help") {
        flags.print_help();
        return Ok(0);
    }

    if flags.is_set("version") {
        println!("rdsh {}", env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }

    logging::init(logging::default_level(
        flags.is_set("quiet"),
        flags.is_set("debug"),
    ));

    if flags.is_set("server") && flags.is_set("client") {
        return Err(ShellError::FlagError(
            "--server and --client cannot be combined".to_string(),
        ));
    }

    let mut config = Config::new()?;
    if let Some(path) = flags.get_value("config") {
        config = config.with_rc_path(path);
    }
    config.load()?;

    if flags.is_set("server") {
        run_server(&flags)
    } else if flags.is_set("client") {
        run_client(&flags)
    } else {
        run_local(&config)
    }
}

fn run_server(flags: &Flags) -> Result<i32, ShellError> {
    let spec = flags.get_argument("server");
    let (interface, port) = remote::parse_address(spec, remote::DEFAULT_INTERFACE)
        .ok_or_else(|| ShellError::InvalidAddress(spec.unwrap_or_default().to_string()))?;

    let server = Server::bind(ServerConfig {
        interface,
        port,
        threaded: flags.is_set("threaded"),
        ..ServerConfig::default()
    })?;
    let _signals = server.register_signals()?;
    server.run()?;
    Ok(0)
}

fn run_client(flags: &Flags) -> Result<i32, ShellError> {
    let spec = flags.get_argument("client");
    let (host, port) = remote::parse_address(spec, remote::DEFAULT_CLIENT_HOST)
        .ok_or_else(|| ShellError::InvalidAddress(spec.unwrap_or_default().to_string()))?;

    let client = Client::connect((host.as_str(), port))?;
    let prompt = format!("rdsh@{}:{}> ", host, port);
    let mut shell = Shell::new(
        RemoteSession::new(client),
        &prompt,
        None,
        SyntaxHighlighter::new(),
    )?;
    shell.run()
}

fn run_local(config: &Config) -> Result<i32, ShellError> {
    if let Err(e) = signal::ignore_interrupts() {
        warn!(error = %e, "cannot install interrupt handler");
    }

    let highlighter = SyntaxHighlighter::new();
    let mut shell = Shell::new(
        LocalSession::new(highlighter),
        PROMPT,
        Some(config.paths().history_path.clone()),
        highlighter,
    )?;
    shell.run()
}
