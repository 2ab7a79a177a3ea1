//! Common command-line surface of the reader tools.
//!
//! Every tool reads bytes on standard input and writes either pretty
//! diagnostics (default) or raw extracted payload to standard output. With
//! a payload flag active, diagnostics are suppressed unless `-m` routes
//! them to standard error.

use std::io::Write;

use clap::{Arg, ArgAction, ArgMatches, Command};

/// Raw payload a tool can be asked to emit instead of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadOut {
    L6,
    E6b,
    Inav,
    B2b,
    L1s,
    Rtcm,
    Lnav,
}

impl PayloadOut {
    fn flag(self) -> (&'static str, char, &'static str) {
        match self {
            PayloadOut::L6 => ("l6", 'l', "write raw QZSS L6 frames to stdout"),
            PayloadOut::E6b => ("e6b", 'e', "write raw Galileo E6B pages to stdout"),
            PayloadOut::Inav => ("inav", 'i', "write raw Galileo I/NAV pages to stdout"),
            PayloadOut::B2b => ("b2b", 'b', "write raw BeiDou B2b frames to stdout"),
            PayloadOut::L1s => ("l1s", '\0', "write raw QZSS L1S messages to stdout"),
            PayloadOut::Rtcm => ("rtcm", 'r', "write RTCM frames to stdout"),
            PayloadOut::Lnav => ("qzss-lnav", 'q', "write raw QZSS LNAV subframes to stdout"),
        }
    }
}

/// Build the shared command skeleton. `payloads` lists the extraction
/// flags this tool supports.
pub fn command(name: &'static str, about: &'static str, payloads: &[PayloadOut]) -> Command {
    let mut cmd = Command::new(name)
        .about(about)
        .arg(
            Arg::new("monitor")
                .short('m')
                .long("monitor")
                .action(ArgAction::SetTrue)
                .help("show diagnostics on stderr even when a payload flag is given"),
        )
        .arg(
            Arg::new("detail")
                .short('t')
                .long("detail")
                .value_parser(["1", "2"])
                .help("display detail: 1 per-subtype, 2 adds bit-image hex dumps"),
        )
        .arg(
            Arg::new("color")
                .short('c')
                .long("color")
                .action(ArgAction::SetTrue)
                .help("force ANSI color even when stdout is not a terminal"),
        )
        .arg(
            Arg::new("prn")
                .short('p')
                .long("prn")
                .value_parser(clap::value_parser!(u16))
                .help("restrict to one satellite PRN"),
        )
        .arg(
            Arg::new("dup-dcr")
                .short('d')
                .long("dup-dcr")
                .action(ArgAction::SetTrue)
                .help("duplicate DC Report messages as NMEA sentences"),
        );
    for payload in payloads {
        let (long, short, help) = payload.flag();
        let mut arg = Arg::new(long).long(long).action(ArgAction::SetTrue).help(help);
        if short != '\0' {
            arg = arg.short(short);
        }
        cmd = cmd.arg(arg);
    }
    cmd
}

/// Parsed common options.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub payload: Option<PayloadOut>,
    pub monitor: bool,
    pub detail: u8,
    pub force_color: bool,
    pub prn: Option<u16>,
    pub dup_dcr: bool,
}

impl Options {
    pub fn from_matches(matches: &ArgMatches, payloads: &[PayloadOut]) -> Self {
        let payload = payloads
            .iter()
            .copied()
            .find(|p| matches.get_flag(p.flag().0));
        let detail = matches
            .get_one::<String>("detail")
            .map(|s| s.parse().unwrap_or(0))
            .unwrap_or(0);
        Self {
            payload,
            monitor: matches.get_flag("monitor"),
            detail,
            force_color: matches.get_flag("color"),
            prn: matches.get_one::<u16>("prn").copied(),
            dup_dcr: matches.get_flag("dup-dcr"),
        }
    }

    /// Whether diagnostics should be printed, and where.
    pub fn diagnostics(&self) -> Diagnostics {
        match (self.payload, self.monitor) {
            (None, _) => Diagnostics::Stdout,
            (Some(_), true) => Diagnostics::Stderr,
            (Some(_), false) => Diagnostics::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostics {
    Stdout,
    Stderr,
    Off,
}

impl Diagnostics {
    pub fn emit(self, line: &str) {
        match self {
            Diagnostics::Stdout => println!("{line}"),
            Diagnostics::Stderr => eprintln!("{line}"),
            Diagnostics::Off => {},
        }
    }
}

/// Write raw payload bytes to stdout. A closed pipe ends the stream
/// cleanly rather than erroring.
pub fn write_payload(bytes: &[u8]) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(bytes)
}
