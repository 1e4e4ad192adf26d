//! Command-line parsing

use std::fmt;
use std::path::PathBuf;

use brickline_protocol::{InputPort, Mailbox, OutputPort};

pub const USAGE: &str = "\
Usage: brickline [--device <path>] [--config <path>] <command> [args]

Commands:
  battery              Print the battery voltage
  version              Print protocol and firmware versions
  tone <hz> [ms]       Play a tone (200-3000 Hz)
  cycle <port>         Run a motor forward, then back, then stop (a, b, c)
  sync                 Run the configured motor pair in lock-step
  input <port>         Read the sensor on an input port (1-4)
  run <program>        Start a program stored on the brick
  current              Print the running program
  mailbox <box> <text> Post a message to a mailbox (1-10)
  keepalive            Reset the sleep timer and print its limit
  decode <hex>         Decode captured frame bytes without a brick
  help                 Show this help";

/// What to do
#[derive(Debug, Clone, PartialEq)]
pub enum Subcommand {
    Battery,
    Version,
    Tone { frequency: u16, duration_ms: u16 },
    Cycle { port: OutputPort },
    Sync,
    Input { port: InputPort },
    Run { program: String },
    Current,
    Mailbox { mailbox: Mailbox, text: String },
    KeepAlive,
    Decode { bytes: Vec<u8> },
    Help,
}

impl Subcommand {
    /// Whether the command talks to a brick
    pub fn needs_device(&self) -> bool {
        !matches!(self, Subcommand::Decode { .. } | Subcommand::Help)
    }
}

/// Parsed command line
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    pub device: Option<String>,
    pub config: Option<PathBuf>,
    pub command: Subcommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgsError {
    /// A required argument is absent
    Missing(&'static str),
    /// Unknown command or option
    Unknown(String),
    /// An argument did not parse
    Invalid { what: &'static str, value: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::Missing(what) => write!(f, "missing {}\n\n{}", what, USAGE),
            ArgsError::Unknown(arg) => write!(f, "unknown argument '{}'\n\n{}", arg, USAGE),
            ArgsError::Invalid { what, value } => write!(f, "invalid {} '{}'", what, value),
        }
    }
}

impl std::error::Error for ArgsError {}

fn invalid(what: &'static str, value: &str) -> ArgsError {
    ArgsError::Invalid {
        what,
        value: value.to_string(),
    }
}

/// Output port by letter: `a`, `b`, `c` or `all`
pub fn parse_output_port(text: &str) -> Result<OutputPort, ArgsError> {
    match text.to_ascii_lowercase().as_str() {
        "a" => Ok(OutputPort::A),
        "b" => Ok(OutputPort::B),
        "c" => Ok(OutputPort::C),
        "all" => Ok(OutputPort::All),
        _ => Err(invalid("output port", text)),
    }
}

fn parse_number<T: std::str::FromStr>(what: &'static str, text: &str) -> Result<T, ArgsError> {
    text.parse().map_err(|_| invalid(what, text))
}

/// Hex bytes, optionally separated by spaces, colons or dashes
pub fn parse_hex(text: &str) -> Result<Vec<u8>, ArgsError> {
    let digits: String = text
        .chars()
        .filter(|c| !matches!(c, ' ' | ':' | '-'))
        .collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);
    if !digits.is_ascii() || digits.len() % 2 != 0 {
        return Err(invalid("hex string", text));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid("hex string", text))
        })
        .collect()
}

/// Parse `std::env::args()` (program name first)
pub fn parse<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let mut device = None;
    let mut config = None;

    let name = loop {
        match args.next() {
            Some(flag) if flag == "--device" || flag == "-d" => {
                device = Some(args.next().ok_or(ArgsError::Missing("device path"))?);
            }
            Some(flag) if flag == "--config" || flag == "-c" => {
                config = Some(PathBuf::from(
                    args.next().ok_or(ArgsError::Missing("config path"))?,
                ));
            }
            Some(flag) if flag == "--help" || flag == "-h" => break "help".to_string(),
            Some(flag) if flag.starts_with('-') => return Err(ArgsError::Unknown(flag)),
            Some(name) => break name,
            None => return Err(ArgsError::Missing("command")),
        }
    };

    let mut next = |what: &'static str| args.next().ok_or(ArgsError::Missing(what));

    let command = match name.as_str() {
        "battery" => Subcommand::Battery,
        "version" => Subcommand::Version,
        "tone" => {
            let frequency = parse_number("frequency", &next("frequency")?)?;
            let duration_ms = match next("duration") {
                Ok(ms) => parse_number("duration", &ms)?,
                Err(_) => brickline_protocol::commands::PlayTone::DEFAULT_DURATION_MS,
            };
            Subcommand::Tone {
                frequency,
                duration_ms,
            }
        }
        "cycle" => Subcommand::Cycle {
            port: parse_output_port(&next("output port")?)?,
        },
        "sync" => Subcommand::Sync,
        "input" => {
            let label = next("input port")?;
            let port = parse_number::<u8>("input port", &label)
                .and_then(|n| InputPort::new(n).map_err(|_| invalid("input port", &label)))?;
            Subcommand::Input { port }
        }
        "run" => Subcommand::Run {
            program: next("program name")?,
        },
        "current" => Subcommand::Current,
        "mailbox" => {
            let label = next("mailbox")?;
            let mailbox = parse_number::<u8>("mailbox", &label)
                .and_then(|n| Mailbox::new(n).map_err(|_| invalid("mailbox", &label)))?;
            Subcommand::Mailbox {
                mailbox,
                text: next("message text")?,
            }
        }
        "keepalive" => Subcommand::KeepAlive,
        "decode" => {
            let hex: Vec<String> = std::iter::from_fn(|| next("hex").ok()).collect();
            if hex.is_empty() {
                return Err(ArgsError::Missing("hex bytes"));
            }
            Subcommand::Decode {
                bytes: parse_hex(&hex.join(" "))?,
            }
        }
        "help" => Subcommand::Help,
        _ => return Err(ArgsError::Unknown(name.clone())),
    };

    Ok(Args {
        device,
        config,
        command,
    })
}
