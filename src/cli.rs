use core::fmt::Write;

use embassy_nrf::uarte;
use embedded_cli::cli::CliBuilder;
use embedded_cli::{Command, codes};
use log::{error, warn};
use qn8027::RfPower;
use qn8027::settings::parse_pi_code;
use rds_scheduler::MessageText;
use static_cell::ConstStaticCell;

use crate::console;
use crate::events::{self, MessageEdit, SystemEvent};

pub const DEL: u8 = 127; // Delete character

#[derive(Debug, Command)]
enum BaseCommand<'a> {
    /// Radio text messages
    Msg {
        #[command(subcommand)]
        command: MsgCommand<'a>,
    },
    /// Carrier on or off
    Radio {
        #[command(subcommand)]
        command: Switch,
    },
    /// Set carrier frequency
    Freq {
        /// Frequency in MHz (87.5-108.0)
        frequency: f32,
    },
    /// Set RDS program identification code
    Pi {
        /// Hex code, e.g. 0x6400
        code: &'a str,
    },
    /// Set RDS program type
    Pty {
        /// Program type (0-31)
        code: u8,
    },
    /// Set RDS program service name
    Psn {
        /// 4 to 8 characters
        name: &'a str,
    },
    /// RF output power
    Power {
        #[command(subcommand)]
        command: PowerLevel,
    },
    /// Mute audio
    Mute {
        #[command(subcommand)]
        command: Switch,
    },
    /// Mono audio
    Mono {
        #[command(subcommand)]
        command: Switch,
    },
    /// Test tone mode, suspends radio text rotation
    Test {
        #[command(subcommand)]
        command: Switch,
    },
    /// Save settings and messages to flash
    Save,
    /// Show transmitter and radio text status
    Status,
}

#[derive(Debug, Command)]
enum MsgCommand<'a> {
    /// Add a message
    Add {
        /// Message name
        name: &'a str,
        /// Text to send, defaults to the name
        text: Option<&'a str>,
    },
    /// Delete a message
    Del {
        name: &'a str,
    },
    /// Rename a message
    Rename {
        from: &'a str,
        to: &'a str,
    },
    /// Put a message into rotation
    Enable {
        name: &'a str,
    },
    /// Take a message out of rotation
    Disable {
        name: &'a str,
    },
    /// Set display duration
    Duration {
        name: &'a str,
        /// Seconds (5-900)
        seconds: u16,
    },
    /// List messages
    List,
}

#[derive(Debug, Command)]
enum Switch {
    On,
    Off,
}

impl Switch {
    fn is_on(&self) -> bool {
        matches!(self, Switch::On)
    }
}

#[derive(Debug, Command)]
enum PowerLevel {
    Low,
    Medium,
    High,
}

fn text(value: &str) -> Result<MessageText, &'static str> {
    MessageText::try_from(value).map_err(|_| "Text is longer than 64 characters")
}

fn message_edit(command: MsgCommand<'_>) -> Result<MessageEdit, &'static str> {
    Ok(match command {
        MsgCommand::Add { name, text: body } => MessageEdit::Add {
            name: text(name)?,
            text: text(body.unwrap_or(name))?,
        },
        MsgCommand::Del { name } => MessageEdit::Remove(text(name)?),
        MsgCommand::Rename { from, to } => MessageEdit::Rename {
            from: text(from)?,
            to: text(to)?,
        },
        MsgCommand::Enable { name } => MessageEdit::Enable(text(name)?, true),
        MsgCommand::Disable { name } => MessageEdit::Enable(text(name)?, false),
        MsgCommand::Duration { name, seconds } => MessageEdit::Duration(text(name)?, seconds),
        MsgCommand::List => MessageEdit::List,
    })
}

fn system_event(command: BaseCommand<'_>) -> Result<SystemEvent, &'static str> {
    Ok(match command {
        BaseCommand::Msg { command } => SystemEvent::Message(message_edit(command)?),
        BaseCommand::Radio { command } => SystemEvent::Carrier(command.is_on()),
        BaseCommand::Freq { frequency } => SystemEvent::Frequency(frequency),
        BaseCommand::Pi { code } => {
            SystemEvent::PiCode(parse_pi_code(code).map_err(|_| "PI code must be hexadecimal")?)
        }
        BaseCommand::Pty { code } => SystemEvent::PtyCode(code),
        BaseCommand::Psn { name } => SystemEvent::StationName(text(name)?),
        BaseCommand::Power { command } => SystemEvent::RfPower(match command {
            PowerLevel::Low => RfPower::Low,
            PowerLevel::Medium => RfPower::Medium,
            PowerLevel::High => RfPower::High,
        }),
        BaseCommand::Mute { command } => SystemEvent::Mute(command.is_on()),
        BaseCommand::Mono { command } => SystemEvent::Mono(command.is_on()),
        BaseCommand::Test { command } => SystemEvent::TestMode(command.is_on()),
        BaseCommand::Save => SystemEvent::Save,
        BaseCommand::Status => SystemEvent::Status,
    })
}

#[embassy_executor::task]
pub async fn console_task(mut rx: uarte::UarteRx<'static>) {
    static COMMAND_BUFFER: ConstStaticCell<[u8; 96]> = ConstStaticCell::new([0; 96]);
    static HISTORY_BUFFER: ConstStaticCell<[u8; 128]> = ConstStaticCell::new([0; 128]);

    let Ok(mut cli) = CliBuilder::default()
        .writer(console::stdout_get())
        .command_buffer(COMMAND_BUFFER.take().as_mut_slice())
        .history_buffer(HISTORY_BUFFER.take().as_mut_slice())
        .build()
    else {
        error!("Console could not be started");
        return;
    };

    loop {
        let buffer = &mut [0u8; 1];
        if let Err(e) = rx.read(buffer).await {
            warn!("Console read failed: {:?}", e);
            continue;
        }
        if buffer[0] == DEL { // Currently CLI does not handle DEL
            buffer[0] = codes::BACKSPACE;
        }

        // Commands only parse and validate their arguments here; the
        // control loop applies them.
        let _ = cli.process_byte::<BaseCommand, _>(
            buffer[0],
            &mut BaseCommand::processor(|cli, command| {
                match system_event(command) {
                    Ok(event) => {
                        if !events::event_try_send(event) {
                            let _ = cli.writer().write_str("Busy, try again");
                        }
                    }
                    Err(message) => {
                        let _ = cli.writer().write_str(message);
                    }
                }
                Ok(())
            }),
        );
    }
}
