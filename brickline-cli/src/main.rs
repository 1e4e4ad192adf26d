//! Command-line tool for an NXT brick
//!
//! Talks to the brick over a serial tty or a bound RFCOMM device node.
//!
//! Usage: brickline [--device <path>] [--config <path>] <command> [args]

mod args;
mod config;

use std::fs::File;
use std::time::Duration;

use brickline_core::{find_brick, routine, Connection, LinkConfig, LinkError};
use brickline_hal::IoStream;
use brickline_protocol::commands::{
    GetCurrentProgramName, GetVersion, KeepAlive, MessageWrite, PlayTone, StartProgram,
};
use brickline_protocol::replies::{CurrentProgramName, SleepTimeout};
use brickline_protocol::{FrameParser, Message, ProtocolError, Reported, Status};
use embedded_hal::delay::DelayNs;

use args::{Args, Subcommand, USAGE};
use config::Config;

type Link = Connection<IoStream<File>>;

/// Blocking delay backed by `std::thread::sleep`
struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns as u64));
    }
}

fn open(path: &str) -> Result<IoStream<File>, LinkError> {
    log::info!("opening {}", path);
    Ok(IoStream::open(path)?)
}

/// Open the configured device, or probe the candidates for one
fn connect(config: &LinkConfig) -> Result<Link, LinkError> {
    log::debug!("serial line settings: {:?}", config.serial);
    match config.device.as_deref() {
        Some(path) if !config.probe_on_connect => Ok(Connection::new(open(path)?)),
        _ => find_brick(config.search_paths(), open),
    }
}

fn protocol(e: ProtocolError) -> LinkError {
    LinkError::Protocol(e)
}

/// Print every frame in a captured byte dump
fn decode(bytes: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    let mut parser = FrameParser::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let (payload, used) = parser.feed_bytes(rest).map_err(LinkError::Frame)?;
        rest = &rest[used..];
        let Some(payload) = payload else { break };

        let msg = Message::from_payload(&payload).map_err(protocol)?;
        println!("{}:", msg.kind().name());
        match msg.body() {
            Some(body) => println!("  {:#?}", body),
            None => println!("  raw {:02X?}", msg.payload()),
        }
        if let Some(error) = msg.error() {
            println!("  error: {}", error);
        }
    }
    if !parser.is_idle() {
        log::warn!("capture ends in the middle of a frame");
    }
    Ok(())
}

fn run(args: Args, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    if !args.command.needs_device() {
        match args.command {
            Subcommand::Decode { bytes } => return decode(&bytes),
            _ => {
                println!("{}", USAGE);
                return Ok(());
            }
        }
    }

    let mut link_config = config.link;
    if let Some(device) = &args.device {
        link_config.set_device(device)?;
    }
    let mut conn = connect(&link_config)?;

    match args.command {
        Subcommand::Battery => {
            let volts = routine::get_voltage(&mut conn)?;
            println!("{:.2} V", volts);
        }
        Subcommand::Version => {
            let Some(msg) = conn.request(&GetVersion)? else {
                return Ok(());
            };
            match (msg.status(), msg.telegram()) {
                (Some(status), _) if !status.is_success() => {
                    return Err(LinkError::DeviceStatus(status).into())
                }
                (_, [_, proto_minor, proto_major, fw_minor, fw_major, ..]) => {
                    println!("protocol {}.{}", proto_major, proto_minor);
                    println!("firmware {}.{}", fw_major, fw_minor);
                }
                (_, raw) => println!("raw reply {:02X?}", raw),
            }
        }
        Subcommand::Tone {
            frequency,
            duration_ms,
        } => {
            conn.send(&PlayTone::new(frequency, duration_ms).map_err(protocol)?)?;
        }
        Subcommand::Cycle { port } => {
            routine::cycle_motor(&mut conn, &mut StdDelay, port)?;
        }
        Subcommand::Sync => {
            let ports = config.sync.output_ports()?;
            routine::sync_motors(
                &mut conn,
                &mut StdDelay,
                ports,
                config.sync.power,
                config.sync.duration_ms,
            )?;
        }
        Subcommand::Input { port } => {
            let values = routine::read_input(&mut conn, port)?;
            println!("port:             {}", values.port.label());
            println!("valid:            {}", values.valid);
            println!("calibrated:       {}", values.calibrated);
            match values.sensor_type {
                Reported::Known(sensor) => println!("sensor type:      {:?}", sensor),
                Reported::Unknown(raw) => println!("sensor type:      unknown (0x{:02X})", raw),
            }
            println!("sensor mode:      {:?}", values.sensor_mode());
            println!("raw value:        {}", values.raw_value);
            println!("normalized value: {}", values.normalized_value);
            println!("scaled value:     {}", values.scaled_value);
            println!("calibrated value: {}", values.calibrated_value);
        }
        Subcommand::Run { program } => {
            conn.send(&StartProgram::new(&program).map_err(protocol)?)?;
        }
        Subcommand::Current => {
            match conn.query::<_, CurrentProgramName>(&GetCurrentProgramName) {
                Ok(reply) => println!("{}", reply.filename),
                Err(LinkError::DeviceStatus(Status::NO_ACTIVE_PROGRAM)) => {
                    println!("no program running")
                }
                Err(e) => return Err(e.into()),
            }
        }
        Subcommand::Mailbox { mailbox, text } => {
            conn.send(&MessageWrite::new(mailbox, &text).map_err(protocol)?)?;
        }
        Subcommand::KeepAlive => {
            let reply: SleepTimeout = conn.query(&KeepAlive)?;
            match reply.timeout_ms {
                0 => println!("sleep timer disabled"),
                ms => println!("sleeps after {} min", ms / 60_000),
            }
        }
        Subcommand::Decode { .. } | Subcommand::Help => {}
    }

    conn.close()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = match args::parse(std::env::args()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    let config = Config::load(args.config.as_deref())?;

    run(args, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_capture() {
        let capture = [
            0x02, 0x00, 0x00, 0x0B, // battery request
            0x05, 0x00, 0x02, 0x0B, 0x00, 0x50, 0x00, // battery reply
            0x03, 0x00, 0x02, 0x42, 0x00, // unknown code
        ];
        assert!(decode(&capture).is_ok());
    }

    #[test]
    fn test_decode_oversized_frame() {
        assert!(decode(&[0x41, 0x00]).is_err());
    }

    #[test]
    fn test_decode_truncated_capture() {
        assert!(decode(&[0x05, 0x00, 0x02]).is_ok());
    }

    #[test]
    fn test_help_needs_no_device() {
        let args = args::parse(["brickline", "help"].map(String::from)).unwrap();
        assert!(run(args, Config::default()).is_ok());
    }
}
